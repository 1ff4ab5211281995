//! Response action executor for Response Warden.
//!
//! The executor resolves an action name against the closed set of
//! [`ResponseActionType`]s, hands the request to the configured
//! [`ActionInvoker`], and appends the outcome to an in-memory ledger.
//!
//! Outcomes are recorded in-band: an unknown action, an invoker error or a
//! timeout all produce a [`ResponseAction`] with `success == false` rather
//! than an `Err`. The executor never deduplicates; the same action against
//! the same target runs every time it is requested.

use crate::action_type::ResponseActionType;
use crate::invoker::{ActionInvoker, ActionRequest, SimulatedActionInvoker};
use chrono::{DateTime, Utc};
use rw_observability::SoarMetricsRecorder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Identity recorded on actions run without a human.
pub const AUTOMATED_EXECUTOR: &str = "response-warden";
/// Identity recorded on actions performed by an analyst.
pub const MANUAL_EXECUTOR: &str = "analyst";

/// Errors that can occur during action execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Unknown action type: {0}")]
    UnknownActionType(String),

    #[error("Integration error: {0}")]
    IntegrationError(String),

    #[error("Timeout: action did not complete within {0} ms")]
    Timeout(u64),

    #[error("Malformed action record: {0}")]
    MalformedRecord(String),
}

/// Audit record of one action invocation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseAction {
    /// Unique action ID.
    pub action_id: Uuid,
    /// Requested action name. Kept verbatim so unknown requests are auditable.
    pub action_type: String,
    /// Target identifier.
    pub target: String,
    /// Parameters passed to the invoker.
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Whether the action ran without a human.
    pub automated: bool,
    /// When the action was executed.
    pub executed_at: DateTime<Utc>,
    /// Who executed it.
    pub executed_by: String,
    /// Whether the action succeeded.
    pub success: bool,
    /// Output reported by the invoker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error message if the action failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl ResponseAction {
    /// Parses the recorded action name, if it is a known kind.
    pub fn kind(&self) -> Option<ResponseActionType> {
        self.action_type.parse().ok()
    }

    /// Checks the record's internal consistency.
    pub fn validate(&self) -> Result<(), ActionError> {
        if self.target.trim().is_empty() {
            return Err(ActionError::MalformedRecord(format!(
                "action {} has an empty target",
                self.action_id
            )));
        }
        if self.action_type.trim().is_empty() {
            return Err(ActionError::MalformedRecord(format!(
                "action {} has an empty action type",
                self.action_id
            )));
        }
        match (self.success, &self.error) {
            (true, Some(error)) => Err(ActionError::MalformedRecord(format!(
                "successful action {} carries an error: {}",
                self.action_id, error
            ))),
            (false, None) => Err(ActionError::MalformedRecord(format!(
                "failed action {} carries no error",
                self.action_id
            ))),
            _ => Ok(()),
        }
    }
}

/// Executes response actions and keeps the append-only action ledger.
pub struct ResponseActionExecutor {
    invoker: Arc<dyn ActionInvoker>,
    ledger: RwLock<Vec<ResponseAction>>,
    action_timeout: Duration,
    metrics: Option<SoarMetricsRecorder>,
}

impl ResponseActionExecutor {
    /// Default upper bound for a single invocation.
    pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates an executor that delegates to the given invoker.
    pub fn new(invoker: Arc<dyn ActionInvoker>) -> Self {
        Self {
            invoker,
            ledger: RwLock::new(Vec::new()),
            action_timeout: Self::DEFAULT_ACTION_TIMEOUT,
            metrics: None,
        }
    }

    /// Creates an executor backed by the simulated invoker.
    pub fn simulated(delay: Duration) -> Self {
        Self::new(Arc::new(SimulatedActionInvoker::new(delay)))
    }

    /// Sets the per-invocation timeout.
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Enables metrics recording.
    pub fn with_metrics(mut self, metrics: SoarMetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Executes an action without parameters.
    pub async fn execute_response_action(
        &self,
        action_type: &str,
        target: &str,
        automated: bool,
    ) -> ResponseAction {
        self.execute_with_parameters(action_type, target, automated, HashMap::new())
            .await
    }

    /// Executes an action, records the outcome and returns the record.
    #[instrument(skip(self, parameters), fields(action = %action_type, target = %target))]
    pub async fn execute_with_parameters(
        &self,
        action_type: &str,
        target: &str,
        automated: bool,
        parameters: HashMap<String, serde_json::Value>,
    ) -> ResponseAction {
        let executed_at = Utc::now();
        let start = Instant::now();

        let outcome = match action_type.parse::<ResponseActionType>() {
            Ok(kind) => {
                let request = ActionRequest {
                    action_type: kind,
                    target: target.to_string(),
                    parameters: parameters.clone(),
                };
                match tokio::time::timeout(self.action_timeout, self.invoker.invoke(&request)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ActionError::Timeout(self.action_timeout.as_millis() as u64)),
                }
            }
            Err(name) => Err(ActionError::UnknownActionType(name)),
        };

        let duration = start.elapsed();
        let (success, output, error) = match outcome {
            Ok(output) => {
                info!(action = %action_type, target = %target, "{}", output.message);
                (true, Some(output.message), None)
            }
            Err(e) => {
                warn!(action = %action_type, target = %target, error = %e, "Response action failed");
                (false, None, Some(e.to_string()))
            }
        };

        let record = ResponseAction {
            action_id: Uuid::new_v4(),
            action_type: action_type.to_string(),
            target: target.to_string(),
            parameters,
            automated,
            executed_at,
            executed_by: if automated {
                AUTOMATED_EXECUTOR.to_string()
            } else {
                MANUAL_EXECUTOR.to_string()
            },
            success,
            output,
            error,
            duration_ms: duration.as_millis() as u64,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_action(action_type, success, automated, duration.as_secs_f64());
        }

        self.ledger.write().await.push(record.clone());
        record
    }

    /// Records an action an analyst performed outside the invoker.
    ///
    /// Unknown action names are recorded as failures, as with invoked actions.
    pub async fn record_manual_action(
        &self,
        action_type: &str,
        target: &str,
        note: &str,
        parameters: HashMap<String, serde_json::Value>,
    ) -> ResponseAction {
        let (success, output, error) = match action_type.parse::<ResponseActionType>() {
            Ok(_) => (true, Some(note.to_string()), None),
            Err(name) => (
                false,
                None,
                Some(ActionError::UnknownActionType(name).to_string()),
            ),
        };

        let record = ResponseAction {
            action_id: Uuid::new_v4(),
            action_type: action_type.to_string(),
            target: target.to_string(),
            parameters,
            automated: false,
            executed_at: Utc::now(),
            executed_by: MANUAL_EXECUTOR.to_string(),
            success,
            output,
            error,
            duration_ms: 0,
        };

        info!(action = %action_type, target = %target, success, "Manual action recorded");
        if let Some(metrics) = &self.metrics {
            metrics.record_action(action_type, success, false, 0.0);
        }

        self.ledger.write().await.push(record.clone());
        record
    }

    /// Returns a snapshot of the ledger in execution order.
    pub async fn response_actions(&self) -> Vec<ResponseAction> {
        self.ledger.read().await.clone()
    }

    /// Empties the ledger.
    pub async fn clear_response_actions(&self) {
        self.ledger.write().await.clear();
    }
}

impl Default for ResponseActionExecutor {
    fn default() -> Self {
        Self::new(Arc::new(SimulatedActionInvoker::default()))
    }
}
