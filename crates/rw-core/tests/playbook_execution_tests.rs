//! Integration tests for step execution: retries, critical failures,
//! timeouts, condition evaluation and cancellation.

use async_trait::async_trait;
use chrono::Utc;
use rw_actions::{
    ActionError, ActionInvoker, ActionOutput, ActionRequest, ResponseActionExecutor,
    ResponseActionType,
};
use rw_core::event::IncidentType;
use rw_core::playbook::{
    ExecutionPath, ManualTaskHandler, PlaybookCategory, PlaybookManager,
    ProbabilisticConditionEvaluator, Priority, SimulatedManualHandler, StepError, Trigger,
};
use rw_core::{
    ExecutionStatus, Playbook, PlaybookStep, SecurityEventContext, SecurityIncident, Severity,
    StepStatus, StepType, TriggerType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fails the first `failures` invocations of one action kind.
struct FlakyInvoker {
    failing: ResponseActionType,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyInvoker {
    fn new(failing: ResponseActionType, failures: usize) -> Self {
        Self {
            failing,
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ActionInvoker for FlakyInvoker {
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        if request.action_type == self.failing
            && self.calls.fetch_add(1, Ordering::SeqCst) < self.failures
        {
            return Err(ActionError::IntegrationError(format!(
                "{} integration unavailable",
                request.action_type
            )));
        }
        Ok(ActionOutput::new(format!("{} ok", request.action_type)))
    }
}

/// Takes longer than any step timeout used here.
struct StalledInvoker;

#[async_trait]
impl ActionInvoker for StalledInvoker {
    async fn invoke(&self, _request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(ActionOutput::new("finally"))
    }
}

/// Fails every invocation after a delay.
struct SlowFailingInvoker {
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl ActionInvoker for SlowFailingInvoker {
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(ActionError::IntegrationError(format!(
            "{} backend rejected the request",
            request.action_type
        )))
    }
}

/// Analyst that always reports failure.
struct UnavailableAnalyst;

#[async_trait]
impl ManualTaskHandler for UnavailableAnalyst {
    async fn perform(
        &self,
        step: &PlaybookStep,
        _context: &SecurityEventContext,
    ) -> Result<String, StepError> {
        Err(StepError::ManualTaskFailed(format!(
            "nobody on call for {}",
            step.id
        )))
    }
}

fn manager_with(invoker: Arc<dyn ActionInvoker>) -> PlaybookManager {
    PlaybookManager::new(Arc::new(ResponseActionExecutor::new(invoker)))
        .with_manual_handler(Arc::new(SimulatedManualHandler::new(Duration::ZERO)))
}

fn manager() -> PlaybookManager {
    manager_with(Arc::new(FlakyInvoker::new(ResponseActionType::BlockIp, 0)))
}

fn context() -> SecurityEventContext {
    SecurityEventContext::from(&SecurityIncident {
        incident_id: "INC-500".to_string(),
        incident_type: IncidentType::Malware,
        severity: Severity::High,
        created_at: Utc::now(),
        affected_systems: vec!["build-agent-2".to_string()],
    })
}

fn playbook(steps: Vec<PlaybookStep>) -> Playbook {
    let mut playbook = Playbook::new(
        "test-playbook",
        "Test playbook",
        PlaybookCategory::IncidentResponse,
        Priority::Medium,
    )
    .with_trigger(Trigger::new(TriggerType::Incident));
    playbook.steps = steps;
    playbook
}

fn automated(id: &str, step_type: StepType, actions: &[&str]) -> PlaybookStep {
    PlaybookStep::new(id, id, step_type)
        .with_automated(true)
        .with_actions(actions.iter().copied())
        .with_timeout_secs(30)
}

#[tokio::test]
async fn test_all_automated_playbook_completes() {
    let manager = manager();
    let playbook = playbook(vec![
        automated("detect", StepType::Detection, &["validate_detection"]),
        automated("analyze", StepType::Analysis, &["analyze_indicators", "correlate_events"]),
        automated("recover", StepType::Recovery, &["restore_system"]),
    ]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.executed_steps.len(), playbook.steps.len());
    assert_eq!(execution.metrics.success_rate, 1.0);
    assert!(execution.results.systems_restored);
    assert!(execution.completed_at.unwrap() >= execution.started_at);
    assert!(execution.current_step.is_none());
    assert_eq!(execution.action_ids().len(), 4);

    let stored = manager.get_execution(&execution.execution_id).await.unwrap();
    assert_eq!(stored, execution);
}

#[tokio::test]
async fn test_failed_containment_fails_execution() {
    let manager = manager_with(Arc::new(FlakyInvoker::new(ResponseActionType::BlockIp, 1)));
    let playbook = playbook(vec![
        automated("contain", StepType::Containment, &["block_ip"]),
        automated("notify", StepType::Notification, &["notify_stakeholders"]),
    ]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.completed_at.is_some());
    // Remaining steps are not started.
    assert_eq!(execution.executed_steps.len(), 1);
    assert_eq!(execution.executed_steps[0].status, StepStatus::Failed);
    assert!(execution.error.as_ref().unwrap().contains("contain"));
    assert!(!execution.results.containment_successful);
}

#[tokio::test]
async fn test_failed_notification_does_not_fail_execution() {
    let manager = manager_with(Arc::new(FlakyInvoker::new(
        ResponseActionType::NotifyStakeholders,
        1,
    )));
    let playbook = playbook(vec![
        automated("notify", StepType::Notification, &["notify_stakeholders"]),
        automated("document", StepType::Documentation, &["document_incident"]),
    ]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.executed_steps[0].status, StepStatus::Failed);
    assert!(execution.executed_steps[0]
        .error
        .as_ref()
        .unwrap()
        .contains("integration unavailable"));
    assert_eq!(execution.executed_steps[1].status, StepStatus::Completed);
    assert_eq!(execution.metrics.success_rate, 0.5);
}

#[tokio::test]
async fn test_unknown_action_aborts_step() {
    let manager = manager();
    let playbook = playbook(vec![automated(
        "contain",
        StepType::Eradication,
        &["teleport_attacker", "block_ip"],
    )]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    let row = &execution.executed_steps[0];
    assert!(row.error.as_ref().unwrap().contains("Unknown action type"));
    // The failing action aborted the step before block_ip ran.
    let actions = manager.actions().response_actions().await;
    assert_eq!(actions.len(), 1);
    assert!(!actions[0].success);
}

#[tokio::test]
async fn test_retry_appends_rows_and_recovers() {
    let manager = manager_with(Arc::new(FlakyInvoker::new(ResponseActionType::BlockIp, 2)));
    let playbook = playbook(vec![
        automated("contain", StepType::Containment, &["block_ip"]).with_retries(2)
    ]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let statuses: Vec<StepStatus> = execution.executed_steps.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Failed, StepStatus::Failed, StepStatus::Completed]
    );
    let attempts: Vec<u32> = execution.executed_steps.iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(execution.executed_steps[2].retries_remaining, 0);
    assert!((execution.metrics.success_rate - 1.0 / 3.0).abs() < 1e-9);
    assert!(execution.results.containment_successful);
}

#[tokio::test]
async fn test_retry_budget_is_per_execution() {
    let invoker = Arc::new(FlakyInvoker::new(ResponseActionType::BlockIp, usize::MAX));
    let manager = manager_with(invoker.clone());
    manager
        .register_playbook(playbook(vec![
            automated("contain", StepType::Containment, &["block_ip"]).with_retries(1)
        ]))
        .await
        .unwrap();

    for _ in 0..3 {
        let execution = manager
            .execute_playbook_by_id("test-playbook", &context())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.executed_steps.len(), 2);
    }

    assert_eq!(invoker.calls.load(Ordering::SeqCst), 6);
    let stored = manager.get_playbook("test-playbook").await.unwrap();
    assert_eq!(stored.steps[0].retries, 1);
}

#[tokio::test]
async fn test_step_timeout_is_enforced() {
    let manager = manager_with(Arc::new(StalledInvoker));
    let playbook = playbook(vec![
        automated("contain", StepType::Containment, &["isolate_system"]).with_timeout_secs(1)
    ]);

    let started = std::time::Instant::now();
    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.executed_steps[0]
        .error
        .as_ref()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn test_unmet_conditions_skip_step_without_failing() {
    let manager = manager();
    let playbook = playbook(vec![
        automated("contain", StepType::Containment, &["block_ip"]).with_condition("source_ip exists"),
        automated("document", StepType::Documentation, &["document_incident"]),
    ]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.executed_steps[0].status, StepStatus::Skipped);
    assert!(execution.executed_steps[0].error.is_none());
    assert_eq!(execution.executed_steps[1].status, StepStatus::Completed);
    assert_eq!(execution.metrics.automated_steps, 1);
}

#[tokio::test]
async fn test_probabilistic_evaluator_only_guards_conditional_steps() {
    let manager = manager().with_condition_evaluator(Arc::new(
        ProbabilisticConditionEvaluator::new(0.0),
    ));
    let playbook = playbook(vec![
        automated("guarded", StepType::Analysis, &["assess_impact"]).with_condition("anything"),
        automated("unguarded", StepType::Analysis, &["assess_impact"]),
    ]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.executed_steps[0].status, StepStatus::Skipped);
    assert_eq!(execution.executed_steps[1].status, StepStatus::Completed);
}

#[tokio::test]
async fn test_manual_step_failure_is_retried() {
    let manager = manager().with_manual_handler(Arc::new(UnavailableAnalyst));
    let playbook = playbook(vec![PlaybookStep::new("patch", "Patch", StepType::Eradication)
        .with_action("patch_vulnerability")
        .with_retries(1)]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.executed_steps.len(), 2);
    assert!(execution
        .executed_steps
        .iter()
        .all(|row| row.path == Some(ExecutionPath::Manual)));
    assert_eq!(execution.metrics.manual_steps, 2);
    assert!(manager.actions().response_actions().await.is_empty());
}

#[tokio::test]
async fn test_manual_step_records_analyst_actions() {
    let manager = manager();
    let playbook = playbook(vec![PlaybookStep::new("doc", "Document", StepType::Documentation)
        .with_actions(["collect_evidence", "call_legal"])]);

    let execution = manager.execute_playbook(&playbook, &context()).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let row = &execution.executed_steps[0];
    assert!(row.output.as_ref().unwrap().contains("call_legal"));
    assert_eq!(row.action_ids.len(), 1);
    assert!(execution.results.evidence_collected);

    let actions = manager.actions().response_actions().await;
    assert_eq!(actions.len(), 1);
    assert!(!actions[0].automated);
    assert_eq!(actions[0].executed_by, rw_actions::MANUAL_EXECUTOR);
}

#[tokio::test]
async fn test_cancellation_stops_further_steps() {
    let manager = Arc::new(
        manager().with_manual_handler(Arc::new(SimulatedManualHandler::new(
            Duration::from_millis(300),
        ))),
    );
    let manual = |id: &str| {
        PlaybookStep::new(id, id, StepType::Verification)
            .with_action("verify_integrity")
            .with_timeout_secs(5)
    };
    let playbook = playbook(vec![manual("one"), manual("two"), manual("three")]);

    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.execute_playbook(&playbook, &context()).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let running = manager.get_executions().await;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].status, ExecutionStatus::Running);

    let cancelled = manager
        .cancel_execution(&running[0].execution_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);

    let execution = runner.await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    // The in-flight step finishes; nothing after it starts.
    assert_eq!(execution.executed_steps.len(), 1);
    assert_eq!(execution.executed_steps[0].status, StepStatus::Completed);
    assert!(execution.completed_at.is_some());
}

#[tokio::test]
async fn test_cancellation_stops_retries() {
    let invoker = Arc::new(SlowFailingInvoker {
        delay: Duration::from_millis(200),
        calls: AtomicUsize::new(0),
    });
    let manager = Arc::new(manager_with(invoker.clone()));
    let playbook = playbook(vec![
        automated("assess", StepType::Analysis, &["assess_impact"]).with_retries(3),
    ]);

    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.execute_playbook(&playbook, &context()).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let running = manager.get_executions().await;
    manager
        .cancel_execution(&running[0].execution_id)
        .await
        .unwrap();

    let execution = runner.await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    // The failed attempt in flight is recorded; no retry starts.
    assert_eq!(execution.executed_steps.len(), 1);
    assert_eq!(execution.executed_steps[0].status, StepStatus::Failed);
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);

    let stored = manager.get_execution(&execution.execution_id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Cancelled);
    assert_eq!(stored.executed_steps.len(), 1);
}

#[tokio::test]
async fn test_clear_executions_and_playbooks() {
    let manager = manager().with_builtin_playbooks().unwrap();
    assert_eq!(manager.playbook_count().await, 4);

    manager
        .execute_playbook_by_id("critical-incident-response", &context())
        .await
        .unwrap();
    assert_eq!(manager.get_executions().await.len(), 1);

    manager.clear_executions().await;
    manager.clear_playbooks().await;
    assert!(manager.get_executions().await.is_empty());
    assert!(manager.get_playbooks().await.is_empty());
}
