//! In-memory playbook catalog and execution ledger.
//!
//! Both stores are plain data; the [`PlaybookManager`](super::PlaybookManager)
//! owns them behind `tokio::sync::RwLock`s.

use crate::event::TriggerType;
use crate::playbook::execution::{ExecutionStatus, PlaybookExecution};
use crate::playbook::model::Playbook;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Registered playbooks, keyed by id, in registration order.
#[derive(Debug, Default)]
pub struct PlaybookCatalog {
    order: Vec<String>,
    by_id: HashMap<String, Arc<Playbook>>,
}

impl PlaybookCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a playbook. Re-registering an id replaces it in place.
    pub fn insert(&mut self, playbook: Playbook) -> Option<Arc<Playbook>> {
        let id = playbook.id.clone();
        let previous = self.by_id.insert(id.clone(), Arc::new(playbook));
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    pub fn get(&self, playbook_id: &str) -> Option<Arc<Playbook>> {
        self.by_id.get(playbook_id).cloned()
    }

    /// Playbooks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Playbook>> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.by_id.clear();
    }
}

/// Execution records in creation order, indexed by execution id.
#[derive(Debug, Default)]
pub struct ExecutionLedger {
    entries: Vec<PlaybookExecution>,
    index: HashMap<Uuid, usize>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot of the execution.
    ///
    /// A stored `cancelled` status wins over any incoming status; the caller's
    /// copy is re-finished as cancelled so the running loop observes it.
    pub fn upsert(&mut self, execution: &mut PlaybookExecution) {
        match self.index.get(&execution.execution_id) {
            Some(&position) => {
                let stored = &mut self.entries[position];
                if stored.status == ExecutionStatus::Cancelled
                    && execution.status != ExecutionStatus::Cancelled
                {
                    execution.completed_at = stored.completed_at;
                    execution.finish(ExecutionStatus::Cancelled);
                }
                *stored = execution.clone();
            }
            None => {
                self.index
                    .insert(execution.execution_id, self.entries.len());
                self.entries.push(execution.clone());
            }
        }
    }

    pub fn get(&self, execution_id: &Uuid) -> Option<&PlaybookExecution> {
        self.index
            .get(execution_id)
            .and_then(|&position| self.entries.get(position))
    }

    pub fn get_mut(&mut self, execution_id: &Uuid) -> Option<&mut PlaybookExecution> {
        match self.index.get(execution_id) {
            Some(&position) => self.entries.get_mut(position),
            None => None,
        }
    }

    pub fn all(&self) -> &[PlaybookExecution] {
        &self.entries
    }

    /// Executions started by the given event.
    pub fn for_trigger(&self, trigger_type: TriggerType, id: &str) -> Vec<PlaybookExecution> {
        self.entries
            .iter()
            .filter(|e| e.triggered_by.trigger_type == trigger_type && e.triggered_by.id == id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
