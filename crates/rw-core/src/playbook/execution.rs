//! Execution records for playbook runs.
//!
//! A [`PlaybookExecution`] is created `queued`, moves to `running`, and ends
//! in exactly one terminal status. Every attempt at a step, retries included,
//! appends its own [`StepExecution`] row.

use crate::event::{SecurityEventContext, TriggerType};
use crate::playbook::model::{PlaybookStep, StepType};
use crate::playbook::validation::PlaybookValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a playbook execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one step attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step attempt was carried out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    Automated,
    Manual,
}

/// The event that started an execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRef {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub id: String,
}

impl From<&SecurityEventContext> for TriggerRef {
    fn from(context: &SecurityEventContext) -> Self {
        Self {
            trigger_type: context.trigger_type,
            id: context.event_id.clone(),
        }
    }
}

/// One attempt at one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepExecution {
    pub step_id: String,
    pub step_type: StepType,
    /// 1 for the first attempt.
    pub attempt: u32,
    /// Retries left after this attempt fails.
    pub retries_remaining: u32,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<ExecutionPath>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ledger ids of the actions this attempt produced.
    #[serde(default)]
    pub action_ids: Vec<Uuid>,
}

impl StepExecution {
    /// Starts a new attempt row.
    pub fn start(step: &PlaybookStep, attempt: u32, retries_remaining: u32) -> Self {
        Self {
            step_id: step.id.clone(),
            step_type: step.step_type,
            attempt,
            retries_remaining,
            status: StepStatus::Running,
            path: None,
            started_at: Utc::now(),
            completed_at: None,
            output: None,
            error: None,
            action_ids: Vec::new(),
        }
    }

    pub fn complete(&mut self, output: impl Into<String>) {
        self.status = StepStatus::Completed;
        self.output = Some(output.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = StepStatus::Skipped;
        self.output = Some(reason.into());
        self.completed_at = Some(Utc::now());
    }
}

/// Outcome flags derived from the executed steps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResults {
    pub containment_successful: bool,
    pub threat_neutralized: bool,
    pub systems_restored: bool,
    pub evidence_collected: bool,
}

/// Counters for an execution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionMetrics {
    /// Attempts that ran on the automated path.
    pub automated_steps: u32,
    /// Attempts that waited for an analyst.
    pub manual_steps: u32,
    pub total_duration_ms: u64,
    /// Completed attempts over all recorded attempts; 0 when none ran.
    pub success_rate: f64,
}

/// One run of one playbook against one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybookExecution {
    pub execution_id: Uuid,
    pub playbook_id: String,
    pub triggered_by: TriggerRef,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default)]
    pub executed_steps: Vec<StepExecution>,
    #[serde(default)]
    pub results: ExecutionResults,
    #[serde(default)]
    pub metrics: ExecutionMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlaybookExecution {
    /// Creates a queued execution.
    pub fn new(playbook_id: impl Into<String>, triggered_by: TriggerRef) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            playbook_id: playbook_id.into(),
            triggered_by,
            status: ExecutionStatus::Queued,
            started_at: Utc::now(),
            completed_at: None,
            current_step: None,
            executed_steps: Vec::new(),
            results: ExecutionResults::default(),
            metrics: ExecutionMetrics::default(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Marks the execution as running.
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    /// Moves the execution to a terminal status and computes its metrics.
    ///
    /// `evidence_collected` is owned by the executor and left untouched.
    pub fn finish(&mut self, status: ExecutionStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.current_step = None;
        let completed_at = *self.completed_at.get_or_insert_with(Utc::now);

        self.metrics.total_duration_ms = (completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;

        let attempts = self.executed_steps.len();
        let completed = self.rows_with(StepStatus::Completed).count();
        self.metrics.success_rate = if attempts == 0 {
            0.0
        } else {
            completed as f64 / attempts as f64
        };

        let completed_of = |step_type: StepType| {
            self.executed_steps
                .iter()
                .any(|row| row.step_type == step_type && row.status == StepStatus::Completed)
        };
        let containment = completed_of(StepType::Containment);
        let eradication = completed_of(StepType::Eradication);
        let recovery = completed_of(StepType::Recovery);

        self.results.containment_successful = containment;
        self.results.threat_neutralized =
            eradication || (containment && status == ExecutionStatus::Completed);
        self.results.systems_restored = recovery;
    }

    /// Records the path a step attempt took in the counters.
    pub fn count_path(&mut self, path: ExecutionPath) {
        match path {
            ExecutionPath::Automated => self.metrics.automated_steps += 1,
            ExecutionPath::Manual => self.metrics.manual_steps += 1,
        }
    }

    fn rows_with(&self, status: StepStatus) -> impl Iterator<Item = &StepExecution> {
        self.executed_steps
            .iter()
            .filter(move |row| row.status == status)
    }

    /// All action ids produced by this execution, in step order.
    pub fn action_ids(&self) -> Vec<Uuid> {
        self.executed_steps
            .iter()
            .flat_map(|row| row.action_ids.iter().copied())
            .collect()
    }

    /// Checks the record's internal consistency.
    pub fn validate(&self) -> Result<(), PlaybookValidationError> {
        let invalid = |reason: String| PlaybookValidationError::InvalidExecution {
            execution_id: self.execution_id,
            reason,
        };

        if self.playbook_id.trim().is_empty() {
            return Err(invalid("playbook id is empty".to_string()));
        }
        if self.triggered_by.id.trim().is_empty() {
            return Err(invalid("trigger id is empty".to_string()));
        }
        match (self.status.is_terminal(), self.completed_at) {
            (true, None) => {
                return Err(invalid(format!(
                    "{} execution has no completion time",
                    self.status
                )))
            }
            (false, Some(_)) => {
                return Err(invalid(format!(
                    "{} execution has a completion time",
                    self.status
                )))
            }
            (true, Some(completed_at)) if completed_at < self.started_at => {
                return Err(invalid("completed before it started".to_string()))
            }
            _ => {}
        }
        if !(0.0..=1.0).contains(&self.metrics.success_rate) {
            return Err(invalid(format!(
                "success rate {} outside [0, 1]",
                self.metrics.success_rate
            )));
        }
        for row in &self.executed_steps {
            if row.attempt == 0 {
                return Err(invalid(format!("step {} has attempt 0", row.step_id)));
            }
            if row.status == StepStatus::Failed && row.error.is_none() {
                return Err(invalid(format!(
                    "failed step {} carries no error",
                    row.step_id
                )));
            }
        }

        Ok(())
    }
}
