//! Read-only metrics rollup computed from the engine's ledgers.

use crate::playbook::{ExecutionStatus, PlaybookExecution};
use rw_actions::{AutomationLevel, ResponseAction};
use serde::{Deserialize, Serialize};

/// Playbook counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybookMetrics {
    /// Distinct playbook ids registered. Re-registering an id replaces it,
    /// so the count only grows until the catalog is cleared.
    pub total: usize,
    pub executions: usize,
    pub successful: usize,
    pub failed: usize,
    pub running: usize,
    pub cancelled: usize,
}

/// Action ledger counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionMetrics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub automated: usize,
    pub manual: usize,
}

/// Engine automation state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutomationState {
    pub running: bool,
    pub level: AutomationLevel,
    pub enabled: bool,
    pub playbook_execution_enabled: bool,
}

/// Snapshot returned by [`SoarEngine::metrics`](crate::SoarEngine::metrics).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoarMetrics {
    pub playbooks: PlaybookMetrics,
    pub actions: ActionMetrics,
    pub automation: AutomationState,
}

impl SoarMetrics {
    /// Builds the rollup from ledger snapshots.
    pub fn compute(
        playbook_count: usize,
        executions: &[PlaybookExecution],
        actions: &[ResponseAction],
        automation: AutomationState,
    ) -> Self {
        let with_status = |status: ExecutionStatus| {
            executions
                .iter()
                .filter(|execution| execution.status == status)
                .count()
        };

        let successful_actions = actions.iter().filter(|action| action.success).count();
        let automated_actions = actions.iter().filter(|action| action.automated).count();

        Self {
            playbooks: PlaybookMetrics {
                total: playbook_count,
                executions: executions.len(),
                successful: with_status(ExecutionStatus::Completed),
                failed: with_status(ExecutionStatus::Failed),
                running: with_status(ExecutionStatus::Running) + with_status(ExecutionStatus::Queued),
                cancelled: with_status(ExecutionStatus::Cancelled),
            },
            actions: ActionMetrics {
                total: actions.len(),
                successful: successful_actions,
                failed: actions.len() - successful_actions,
                automated: automated_actions,
                manual: actions.len() - automated_actions,
            },
            automation,
        }
    }
}
