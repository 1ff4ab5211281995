//! Orchestration engine for Response Warden.
//!
//! The engine gates processing on its lifecycle, normalizes each event into
//! a [`SecurityEventContext`], runs every applicable playbook sequentially,
//! and fires the fixed escalation sequences for critical incidents and
//! confident threats.
//!
//! ## Escalation
//!
//! Escalation runs after the playbooks and regardless of what they did, so a
//! critical incident always ends with `escalate_incident`,
//! `notify_stakeholders` and `collect_evidence` in the action ledger.

use crate::config::SoarConfig;
use crate::event::{
    SecurityEvent, SecurityEventContext, SecurityIncident, Severity, ThreatDetection, ThreatType,
    Vulnerability,
};
use crate::metrics::{AutomationState, SoarMetrics};
use crate::playbook::executor::action_parameters;
use crate::playbook::{
    ContextConditionEvaluator, ExecutionPolicy, ManualTaskHandler, Playbook, PlaybookError,
    PlaybookExecution, PlaybookManager, SimulatedManualHandler, StepConditionEvaluator,
};
use rw_actions::{
    ActionInvoker, ResponseAction, ResponseActionExecutor, ResponseActionType,
    SimulatedActionInvoker,
};
use rw_observability::{event_span, SoarMetricsRecorder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn, Instrument};
use uuid::Uuid;

/// Errors that can occur in the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine is not running")]
    NotRunning,

    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Playbook error: {0}")]
    Playbook(#[from] PlaybookError),
}

/// Actions fired for every critical incident.
pub const INCIDENT_ESCALATION: [ResponseActionType; 3] = [
    ResponseActionType::EscalateIncident,
    ResponseActionType::NotifyStakeholders,
    ResponseActionType::CollectEvidence,
];

/// The fixed action sequence for a threat type.
pub fn threat_escalation(threat_type: ThreatType) -> &'static [ResponseActionType] {
    match threat_type {
        ThreatType::BruteForce | ThreatType::RateLimitAbuse => &[ResponseActionType::BlockIp],
        ThreatType::SqlInjectionAttempt | ThreatType::XssAttempt => &[
            ResponseActionType::BlockIp,
            ResponseActionType::CollectEvidence,
        ],
        ThreatType::PrivilegeEscalation => &[
            ResponseActionType::QuarantineUser,
            ResponseActionType::CollectEvidence,
            ResponseActionType::EscalateIncident,
        ],
        _ => &[ResponseActionType::CollectEvidence],
    }
}

/// Collaborators and timings that are not part of the YAML configuration.
#[derive(Clone)]
pub struct EngineOptions {
    pub invoker: Arc<dyn ActionInvoker>,
    pub condition_evaluator: Arc<dyn StepConditionEvaluator>,
    pub manual_handler: Arc<dyn ManualTaskHandler>,
    pub action_timeout: Duration,
    pub seed_builtin_playbooks: bool,
}

impl EngineOptions {
    /// Simulated collaborators that never sleep. Suited to tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            invoker: Arc::new(SimulatedActionInvoker::instant()),
            manual_handler: Arc::new(SimulatedManualHandler::new(Duration::ZERO)),
            ..Self::default()
        }
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn ActionInvoker>) -> Self {
        self.invoker = invoker;
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

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Starts with an empty catalog instead of the built-in playbooks.
    pub fn without_builtin_playbooks(mut self) -> Self {
        self.seed_builtin_playbooks = false;
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            invoker: Arc::new(SimulatedActionInvoker::default()),
            condition_evaluator: Arc::new(ContextConditionEvaluator),
            manual_handler: Arc::new(SimulatedManualHandler::default()),
            action_timeout: ResponseActionExecutor::DEFAULT_ACTION_TIMEOUT,
            seed_builtin_playbooks: true,
        }
    }
}

/// The SOAR orchestration engine.
pub struct SoarEngine {
    config: Arc<SoarConfig>,
    playbooks: PlaybookManager,
    actions: Arc<ResponseActionExecutor>,
    running: RwLock<bool>,
    metrics: SoarMetricsRecorder,
}

impl SoarEngine {
    /// Creates a stopped engine with simulated collaborators.
    pub fn new(config: SoarConfig) -> Result<Self, EngineError> {
        Self::with_options(config, EngineOptions::default())
    }

    /// Creates a stopped engine with the given collaborators.
    pub fn with_options(config: SoarConfig, options: EngineOptions) -> Result<Self, EngineError> {
        config
            .check()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        let metrics = SoarMetricsRecorder::new();
        let actions = Arc::new(
            ResponseActionExecutor::new(options.invoker)
                .with_action_timeout(options.action_timeout)
                .with_metrics(metrics),
        );

        let mut playbooks = PlaybookManager::new(Arc::clone(&actions))
            .with_policy(ExecutionPolicy::from(&config))
            .with_condition_evaluator(options.condition_evaluator)
            .with_manual_handler(options.manual_handler)
            .with_metrics(metrics);
        if options.seed_builtin_playbooks {
            playbooks = playbooks.with_builtin_playbooks()?;
        }

        info!(
            automated_response = config.automation.enable_automated_response,
            playbook_execution = config.automation.enable_playbook_execution,
            max_automation_level = %config.automation.max_automation_level,
            "SOAR engine created"
        );

        Ok(Self {
            config: Arc::new(config),
            playbooks,
            actions,
            running: RwLock::new(false),
            metrics,
        })
    }

    pub fn config(&self) -> &SoarConfig {
        &self.config
    }

    /// The playbook store and executor.
    pub fn playbooks(&self) -> &PlaybookManager {
        &self.playbooks
    }

    /// The response action executor.
    pub fn actions(&self) -> &ResponseActionExecutor {
        &self.actions
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Starts the engine.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut running = self.running.write().await;
        if *running {
            return Err(EngineError::AlreadyRunning);
        }
        *running = true;
        info!("SOAR engine started");
        Ok(())
    }

    /// Stops the engine.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), EngineError> {
        let mut running = self.running.write().await;
        *running = false;
        info!("SOAR engine stopped");
        Ok(())
    }

    /// Stops the engine and clears the catalog and both ledgers.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        *self.running.write().await = false;
        self.playbooks.clear_executions().await;
        self.playbooks.clear_playbooks().await;
        self.actions.clear_response_actions().await;
        info!("SOAR engine shut down");
    }

    async fn ensure_running(&self) -> Result<(), EngineError> {
        if self.is_running().await {
            Ok(())
        } else {
            Err(EngineError::NotRunning)
        }
    }

    /// Registers an additional playbook.
    pub async fn register_playbook(&self, playbook: Playbook) -> Result<(), EngineError> {
        Ok(self.playbooks.register_playbook(playbook).await?)
    }

    /// Processes a confirmed incident.
    pub async fn process_incident(
        &self,
        incident: &SecurityIncident,
    ) -> Result<Vec<PlaybookExecution>, EngineError> {
        self.ensure_running().await?;
        let context = SecurityEventContext::from(incident);

        let executions = async {
            let executions = self.run_playbooks(&context).await;
            if incident.severity == Severity::Critical
                && self.config.automation.enable_automated_response
            {
                self.escalate(&context, &INCIDENT_ESCALATION).await;
            }
            executions
        }
        .instrument(event_span!(context.event_id.as_str(), trigger = "incident"))
        .await;

        Ok(executions)
    }

    /// Processes a threat detection.
    pub async fn process_threat(
        &self,
        threat: &ThreatDetection,
    ) -> Result<Vec<PlaybookExecution>, EngineError> {
        self.ensure_running().await?;
        let context = SecurityEventContext::from(threat);

        let executions = async {
            let executions = self.run_playbooks(&context).await;
            let confident = context.confidence >= self.config.thresholds.automated_response;
            if (threat.severity == Severity::Critical || confident)
                && self.config.automation.enable_automated_response
            {
                self.escalate(&context, threat_escalation(threat.threat_type))
                    .await;
            }
            executions
        }
        .instrument(event_span!(context.event_id.as_str(), trigger = "threat"))
        .await;

        Ok(executions)
    }

    /// Processes a vulnerability finding. Only playbooks respond.
    pub async fn process_vulnerability(
        &self,
        vulnerability: &Vulnerability,
    ) -> Result<Vec<PlaybookExecution>, EngineError> {
        self.ensure_running().await?;
        let context = SecurityEventContext::from(vulnerability);

        let executions = self
            .run_playbooks(&context)
            .instrument(event_span!(
                context.event_id.as_str(),
                trigger = "vulnerability"
            ))
            .await;

        Ok(executions)
    }

    /// Dispatches any event to the matching `process_*` method.
    pub async fn process_event(
        &self,
        event: &SecurityEvent,
    ) -> Result<Vec<PlaybookExecution>, EngineError> {
        match event {
            SecurityEvent::Incident(incident) => self.process_incident(incident).await,
            SecurityEvent::Threat(threat) => self.process_threat(threat).await,
            SecurityEvent::Vulnerability(vulnerability) => {
                self.process_vulnerability(vulnerability).await
            }
        }
    }

    /// Cancels a running execution.
    pub async fn cancel_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<PlaybookExecution, EngineError> {
        Ok(self.playbooks.cancel_execution(execution_id).await?)
    }

    /// Executions from all processed events.
    pub async fn executions(&self) -> Vec<PlaybookExecution> {
        self.playbooks.get_executions().await
    }

    /// The action ledger.
    pub async fn response_actions(&self) -> Vec<ResponseAction> {
        self.actions.response_actions().await
    }

    /// Ledger-derived rollup.
    pub async fn metrics(&self) -> SoarMetrics {
        let playbook_count = self.playbooks.playbook_count().await;
        let executions = self.playbooks.get_executions().await;
        let actions = self.actions.response_actions().await;

        SoarMetrics::compute(
            playbook_count,
            &executions,
            &actions,
            AutomationState {
                running: self.is_running().await,
                level: self.config.automation.max_automation_level,
                enabled: self.config.automation.enable_automated_response,
                playbook_execution_enabled: self.config.automation.enable_playbook_execution,
            },
        )
    }

    async fn run_playbooks(&self, context: &SecurityEventContext) -> Vec<PlaybookExecution> {
        self.metrics
            .record_event(context.trigger_type.as_str(), context.severity.as_str());

        if !self.config.automation.enable_playbook_execution {
            info!(event = %context.event_id, "Playbook execution disabled, skipping playbooks");
            return Vec::new();
        }

        let applicable = self
            .playbooks
            .find_applicable_playbooks(context.trigger_type, context)
            .await;

        let mut executions = Vec::with_capacity(applicable.len());
        for playbook in applicable {
            if !self.config.playbooks.is_enabled(playbook.category) {
                info!(
                    playbook = %playbook.id,
                    category = %playbook.category,
                    "Playbook category disabled, skipping"
                );
                continue;
            }
            executions.push(self.playbooks.execute_playbook(&playbook, context).await);
        }

        info!(
            event = %context.event_id,
            trigger = %context.trigger_type,
            executions = executions.len(),
            "Event processed"
        );
        executions
    }

    /// Runs a fixed escalation sequence, in order, against the event.
    async fn escalate(
        &self,
        context: &SecurityEventContext,
        sequence: &[ResponseActionType],
    ) -> Vec<ResponseAction> {
        warn!(
            event = %context.event_id,
            severity = %context.severity,
            actions = sequence.len(),
            "Escalating event"
        );
        self.metrics.record_escalation(context.trigger_type.as_str());

        let channels = &self.playbooks.policy().notification_channels;
        let mut records = Vec::with_capacity(sequence.len());
        for kind in sequence {
            let target = context.target_for(Some(*kind));
            let mut parameters = action_parameters(Some(*kind), context, channels);
            parameters.insert("trigger".to_string(), serde_json::json!("escalation"));

            records.push(
                self.actions
                    .execute_with_parameters(kind.as_str(), &target, true, parameters)
                    .await,
            );
        }
        records
    }
}
