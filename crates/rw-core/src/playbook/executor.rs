//! Playbook store and executor.
//!
//! The [`PlaybookManager`] owns the playbook catalog and the execution
//! ledger, matches playbooks to events, and runs them step by step:
//!
//! - steps run strictly in list order, each awaited before the next;
//! - a step with guard conditions consults the injected
//!   [`StepConditionEvaluator`] and is skipped when they do not hold;
//! - automated steps run their actions through the shared
//!   [`ResponseActionExecutor`] under the step's timeout;
//! - manual steps are handed to a [`ManualTaskHandler`];
//! - a failed attempt is retried while the per-execution budget lasts, and a
//!   containment or eradication step that exhausts it fails the execution.
//!
//! No store lock is held while a step is running.

use crate::config::SoarConfig;
use crate::event::{SecurityEventContext, TriggerType};
use crate::playbook::catalog::builtin_playbooks;
use crate::playbook::conditions::{
    trigger_conditions_hold, ContextConditionEvaluator, StepConditionEvaluator,
};
use crate::playbook::execution::{
    ExecutionPath, ExecutionStatus, PlaybookExecution, StepExecution, TriggerRef,
};
use crate::playbook::model::{Playbook, PlaybookStep};
use crate::playbook::store::{ExecutionLedger, PlaybookCatalog};
use crate::playbook::validation::PlaybookValidationError;
use async_trait::async_trait;
use rw_actions::{AutomationLevel, ResponseActionExecutor, ResponseActionType};
use rw_observability::SoarMetricsRecorder;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Errors surfaced by the playbook manager.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybookError {
    #[error("Playbook not found: {0}")]
    NotFound(String),

    #[error("Invalid playbook: {0}")]
    Invalid(#[from] PlaybookValidationError),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("Execution {0} has already finished")]
    ExecutionFinished(Uuid),

    #[error("Step '{step}' depends on '{dependency}', which has not run")]
    UnresolvedDependency { step: String, dependency: String },
}

/// Why a step attempt failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Action {action} failed: {error}")]
    ActionFailed { action: String, error: String },

    #[error("Step timed out after {0} s")]
    Timeout(u64),

    #[error("Manual task failed: {0}")]
    ManualTaskFailed(String),
}

/// Completes steps that need a human.
#[async_trait]
pub trait ManualTaskHandler: Send + Sync {
    /// Waits for the analyst to finish the step and returns their note.
    async fn perform(
        &self,
        step: &PlaybookStep,
        context: &SecurityEventContext,
    ) -> Result<String, StepError>;
}

/// Stand-in for an analyst: waits, then reports the step as done.
///
/// The wait is the configured delay, capped at the step's timeout.
#[derive(Debug, Clone)]
pub struct SimulatedManualHandler {
    delay: Duration,
}

impl SimulatedManualHandler {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedManualHandler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl ManualTaskHandler for SimulatedManualHandler {
    async fn perform(
        &self,
        step: &PlaybookStep,
        context: &SecurityEventContext,
    ) -> Result<String, StepError> {
        let wait = self.delay.min(step.timeout());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        Ok(format!(
            "Manual step '{}' completed by analyst for {}",
            step.name, context.event_id
        ))
    }
}

/// The subset of configuration the executor acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPolicy {
    pub automated_response: bool,
    pub max_automation_level: AutomationLevel,
    pub notification_channels: Vec<String>,
}

impl From<&SoarConfig> for ExecutionPolicy {
    fn from(config: &SoarConfig) -> Self {
        Self {
            automated_response: config.automation.enable_automated_response,
            max_automation_level: config.automation.max_automation_level,
            notification_channels: config
                .notifications
                .enabled_channels()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::from(&SoarConfig::default())
    }
}

/// Builds the parameters handed to an action run on behalf of an event.
pub(crate) fn action_parameters(
    kind: Option<ResponseActionType>,
    context: &SecurityEventContext,
    channels: &[String],
) -> HashMap<String, serde_json::Value> {
    let mut parameters = HashMap::new();
    parameters.insert("event_id".to_string(), serde_json::json!(context.event_id));
    parameters.insert(
        "severity".to_string(),
        serde_json::json!(context.severity.as_str()),
    );
    if kind == Some(ResponseActionType::NotifyStakeholders) {
        parameters.insert("channels".to_string(), serde_json::json!(channels));
    }
    parameters
}

/// What the step loop should do next.
#[derive(Debug, Clone, PartialEq)]
enum StepFlow {
    Continue,
    Abort(String),
}

/// Side results of one step attempt.
#[derive(Debug, Default)]
struct AttemptRecord {
    action_ids: Vec<Uuid>,
    evidence_collected: bool,
}

/// Owns the playbook catalog and execution ledger, and runs playbooks.
pub struct PlaybookManager {
    catalog: RwLock<PlaybookCatalog>,
    executions: RwLock<ExecutionLedger>,
    actions: Arc<ResponseActionExecutor>,
    policy: ExecutionPolicy,
    condition_evaluator: Arc<dyn StepConditionEvaluator>,
    manual_handler: Arc<dyn ManualTaskHandler>,
    metrics: Option<SoarMetricsRecorder>,
}

impl PlaybookManager {
    /// Creates a manager with an empty catalog and default policy.
    pub fn new(actions: Arc<ResponseActionExecutor>) -> Self {
        Self {
            catalog: RwLock::new(PlaybookCatalog::new()),
            executions: RwLock::new(ExecutionLedger::new()),
            actions,
            policy: ExecutionPolicy::default(),
            condition_evaluator: Arc::new(ContextConditionEvaluator),
            manual_handler: Arc::new(SimulatedManualHandler::default()),
            metrics: None,
        }
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_condition_evaluator(mut self, evaluator: Arc<dyn StepConditionEvaluator>) -> Self {
        self.condition_evaluator = evaluator;
        self
    }

    pub fn with_manual_handler(mut self, handler: Arc<dyn ManualTaskHandler>) -> Self {
        self.manual_handler = handler;
        self
    }

    pub fn with_metrics(mut self, metrics: SoarMetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seeds the built-in playbooks.
    pub fn with_builtin_playbooks(mut self) -> Result<Self, PlaybookError> {
        let catalog = self.catalog.get_mut();
        for playbook in builtin_playbooks() {
            playbook.check()?;
            catalog.insert(playbook);
        }
        Ok(self)
    }

    /// The shared action executor.
    pub fn actions(&self) -> &Arc<ResponseActionExecutor> {
        &self.actions
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Validates and registers a playbook, replacing any with the same id.
    pub async fn register_playbook(&self, playbook: Playbook) -> Result<(), PlaybookError> {
        playbook.check()?;
        let id = playbook.id.clone();
        let replaced = self.catalog.write().await.insert(playbook).is_some();
        info!(playbook = %id, replaced, "Playbook registered");
        Ok(())
    }

    pub async fn get_playbook(&self, playbook_id: &str) -> Option<Arc<Playbook>> {
        self.catalog.read().await.get(playbook_id)
    }

    /// Snapshot of the catalog in registration order.
    pub async fn get_playbooks(&self) -> Vec<Arc<Playbook>> {
        self.catalog.read().await.iter().cloned().collect()
    }

    pub async fn playbook_count(&self) -> usize {
        self.catalog.read().await.len()
    }

    pub async fn clear_playbooks(&self) {
        self.catalog.write().await.clear();
    }

    /// Playbooks with a trigger clause for `trigger_type` whose conditions
    /// all hold, by descending priority. Ties keep catalog order.
    pub async fn find_applicable_playbooks(
        &self,
        trigger_type: TriggerType,
        context: &SecurityEventContext,
    ) -> Vec<Arc<Playbook>> {
        let mut matches: Vec<Arc<Playbook>> = self
            .catalog
            .read()
            .await
            .iter()
            .filter(|playbook| {
                playbook
                    .triggers_for(trigger_type)
                    .any(|trigger| trigger_conditions_hold(&trigger.conditions, context))
            })
            .cloned()
            .collect();

        // Stable sort keeps catalog order among equal priorities.
        matches.sort_by(|a, b| b.priority.cmp(&a.priority));
        debug!(
            trigger = %trigger_type,
            event = %context.event_id,
            matched = matches.len(),
            "Applicable playbooks resolved"
        );
        matches
    }

    // ------------------------------------------------------------------
    // Execution ledger
    // ------------------------------------------------------------------

    /// Snapshot of all executions in creation order.
    pub async fn get_executions(&self) -> Vec<PlaybookExecution> {
        self.executions.read().await.all().to_vec()
    }

    pub async fn get_execution(&self, execution_id: &Uuid) -> Option<PlaybookExecution> {
        self.executions.read().await.get(execution_id).cloned()
    }

    /// Executions started by the given event.
    pub async fn executions_for_trigger(
        &self,
        trigger_type: TriggerType,
        id: &str,
    ) -> Vec<PlaybookExecution> {
        self.executions.read().await.for_trigger(trigger_type, id)
    }

    pub async fn clear_executions(&self) {
        self.executions.write().await.clear();
    }

    /// Cancels a non-terminal execution. The step in flight finishes; no
    /// further steps start.
    pub async fn cancel_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<PlaybookExecution, PlaybookError> {
        let mut ledger = self.executions.write().await;
        let execution = ledger
            .get_mut(execution_id)
            .ok_or(PlaybookError::ExecutionNotFound(*execution_id))?;
        if execution.is_terminal() {
            return Err(PlaybookError::ExecutionFinished(*execution_id));
        }
        execution.finish(ExecutionStatus::Cancelled);
        info!(execution_id = %execution_id, playbook = %execution.playbook_id, "Execution cancelled");
        Ok(execution.clone())
    }

    async fn record(&self, execution: &mut PlaybookExecution) {
        self.executions.write().await.upsert(execution);
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Runs a registered playbook by id.
    pub async fn execute_playbook_by_id(
        &self,
        playbook_id: &str,
        context: &SecurityEventContext,
    ) -> Result<PlaybookExecution, PlaybookError> {
        let playbook = self
            .get_playbook(playbook_id)
            .await
            .ok_or_else(|| PlaybookError::NotFound(playbook_id.to_string()))?;
        Ok(self.execute_playbook(&playbook, context).await)
    }

    /// Runs a playbook against an event and returns the terminal execution.
    ///
    /// Never fails: step and execution failures are recorded on the returned
    /// record.
    #[instrument(skip(self, playbook, context), fields(playbook = %playbook.id, event = %context.event_id))]
    pub async fn execute_playbook(
        &self,
        playbook: &Playbook,
        context: &SecurityEventContext,
    ) -> PlaybookExecution {
        let mut execution = PlaybookExecution::new(playbook.id.clone(), TriggerRef::from(context));
        self.record(&mut execution).await;

        execution.start();
        self.record(&mut execution).await;
        info!(
            execution_id = %execution.execution_id,
            steps = playbook.steps.len(),
            "Playbook execution started"
        );

        let flow = self.run_steps(playbook, context, &mut execution).await;
        // Picks up a cancellation that landed during the last step.
        self.record(&mut execution).await;

        let status = match flow {
            _ if execution.status == ExecutionStatus::Cancelled => ExecutionStatus::Cancelled,
            Ok(StepFlow::Continue) => ExecutionStatus::Completed,
            Ok(StepFlow::Abort(reason)) => {
                execution.error = Some(reason);
                ExecutionStatus::Failed
            }
            Err(e) => {
                error!(execution_id = %execution.execution_id, error = %e, "Playbook execution aborted");
                execution.error = Some(e.to_string());
                ExecutionStatus::Failed
            }
        };

        execution.finish(status);
        self.record(&mut execution).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_playbook_execution(
                &playbook.id,
                status.as_str(),
                execution.metrics.total_duration_ms as f64 / 1000.0,
            );
        }
        info!(
            execution_id = %execution.execution_id,
            status = %execution.status,
            success_rate = execution.metrics.success_rate,
            duration_ms = execution.metrics.total_duration_ms,
            "Playbook execution finished"
        );

        execution
    }

    async fn run_steps(
        &self,
        playbook: &Playbook,
        context: &SecurityEventContext,
        execution: &mut PlaybookExecution,
    ) -> Result<StepFlow, PlaybookError> {
        for step in &playbook.steps {
            self.record(execution).await;
            if execution.is_terminal() {
                info!(execution_id = %execution.execution_id, "Execution cancelled, remaining steps not started");
                return Ok(StepFlow::Continue);
            }
            if let StepFlow::Abort(reason) = self.execute_step(step, context, execution).await? {
                return Ok(StepFlow::Abort(reason));
            }
        }
        Ok(StepFlow::Continue)
    }

    /// Runs one step, including its retries. Every attempt appends a row.
    async fn execute_step(
        &self,
        step: &PlaybookStep,
        context: &SecurityEventContext,
        execution: &mut PlaybookExecution,
    ) -> Result<StepFlow, PlaybookError> {
        for dependency in &step.dependencies {
            if !execution
                .executed_steps
                .iter()
                .any(|row| &row.step_id == dependency)
            {
                return Err(PlaybookError::UnresolvedDependency {
                    step: step.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        let mut attempt = 1;
        let mut retries_remaining = step.retries;

        loop {
            execution.current_step = Some(step.id.clone());
            execution
                .executed_steps
                .push(StepExecution::start(step, attempt, retries_remaining));
            let row = execution.executed_steps.len() - 1;
            self.record(execution).await;
            if execution.is_terminal() {
                execution.executed_steps.pop();
                info!(step = %step.id, attempt, "Execution cancelled, attempt not started");
                return Ok(StepFlow::Continue);
            }

            if !step.conditions.is_empty() && !self.condition_evaluator.evaluate(step, context) {
                info!(step = %step.id, "Step conditions not met, skipping");
                execution.executed_steps[row].skip("Step conditions not met");
                return Ok(StepFlow::Continue);
            }

            let path = self.path_for(step);
            execution.executed_steps[row].path = Some(path);
            execution.count_path(path);

            let mut record = AttemptRecord::default();
            let outcome = match path {
                ExecutionPath::Automated => {
                    self.run_automated(step, context, &mut record).await
                }
                ExecutionPath::Manual => self.run_manual(step, context, &mut record).await,
            };

            if record.evidence_collected {
                execution.results.evidence_collected = true;
            }
            execution.executed_steps[row].action_ids = record.action_ids;

            let error = match outcome {
                Ok(output) => {
                    execution.executed_steps[row].complete(output);
                    debug!(step = %step.id, attempt, "Step completed");
                    return Ok(StepFlow::Continue);
                }
                Err(error) => error,
            };
            execution.executed_steps[row].fail(error.to_string());
            self.record(execution).await;

            if retries_remaining > 0 && !execution.is_terminal() {
                warn!(
                    step = %step.id,
                    attempt,
                    retries_remaining,
                    error = %error,
                    "Step failed, retrying"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_step_retry(step.step_type.as_str());
                }
                retries_remaining -= 1;
                attempt += 1;
                continue;
            }

            if step.step_type.is_critical() {
                error!(step = %step.id, step_type = %step.step_type, error = %error, "Critical step failed");
                return Ok(StepFlow::Abort(format!(
                    "Critical step '{}' failed: {}",
                    step.id, error
                )));
            }

            warn!(step = %step.id, step_type = %step.step_type, error = %error, "Step failed, continuing");
            return Ok(StepFlow::Continue);
        }
    }

    /// Automated only when the step asks for it, automation is enabled, and
    /// none of its known actions exceed the allowed impact.
    fn path_for(&self, step: &PlaybookStep) -> ExecutionPath {
        let within_level = step
            .actions
            .iter()
            .filter_map(|action| action.parse::<ResponseActionType>().ok())
            .all(|kind| kind.impact() <= self.policy.max_automation_level);

        if step.automated && self.policy.automated_response && within_level {
            ExecutionPath::Automated
        } else {
            if step.automated {
                info!(step = %step.id, "Automation not permitted, routing step to an analyst");
            }
            ExecutionPath::Manual
        }
    }

    async fn run_automated(
        &self,
        step: &PlaybookStep,
        context: &SecurityEventContext,
        record: &mut AttemptRecord,
    ) -> Result<String, StepError> {
        let timeout = step.timeout();
        match tokio::time::timeout(timeout, self.run_actions(step, context, record)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout(step.timeout_secs)),
        }
    }

    async fn run_actions(
        &self,
        step: &PlaybookStep,
        context: &SecurityEventContext,
        record: &mut AttemptRecord,
    ) -> Result<String, StepError> {
        let mut outputs = Vec::with_capacity(step.actions.len());

        for action_name in &step.actions {
            let kind = action_name.parse::<ResponseActionType>().ok();
            let target = context.target_for(kind);
            let parameters = action_parameters(kind, context, &self.policy.notification_channels);

            let action = self
                .actions
                .execute_with_parameters(action_name, &target, true, parameters)
                .await;
            record.action_ids.push(action.action_id);

            if !action.success {
                return Err(StepError::ActionFailed {
                    action: action_name.clone(),
                    error: action.error.unwrap_or_default(),
                });
            }
            if kind.is_some_and(|k| k.is_evidence_gathering()) {
                record.evidence_collected = true;
            }
            if let Some(output) = action.output {
                outputs.push(output);
            }
        }

        if outputs.is_empty() {
            Ok(format!("Step '{}' completed", step.name))
        } else {
            Ok(outputs.join("; "))
        }
    }

    /// Hands the step to an analyst, then records the catalogued actions they
    /// performed. Actions outside the catalog are only mentioned in the output.
    async fn run_manual(
        &self,
        step: &PlaybookStep,
        context: &SecurityEventContext,
        record: &mut AttemptRecord,
    ) -> Result<String, StepError> {
        info!(
            step = %step.id,
            actions = ?step.actions,
            timeout_secs = step.timeout_secs,
            "Step requires human action"
        );
        let note = self.manual_handler.perform(step, context).await?;

        let mut uncatalogued = Vec::new();
        for action_name in &step.actions {
            let Ok(kind) = action_name.parse::<ResponseActionType>() else {
                uncatalogued.push(action_name.as_str());
                continue;
            };
            let target = context.target_for(Some(kind));
            let parameters =
                action_parameters(Some(kind), context, &self.policy.notification_channels);
            let action = self
                .actions
                .record_manual_action(action_name, &target, &note, parameters)
                .await;
            record.action_ids.push(action.action_id);
            if kind.is_evidence_gathering() {
                record.evidence_collected = true;
            }
        }

        if uncatalogued.is_empty() {
            Ok(note)
        } else {
            Ok(format!("{} (also performed: {})", note, uncatalogued.join(", ")))
        }
    }
}
