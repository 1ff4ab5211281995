//! Integration tests for the response action executor and its ledger.

use async_trait::async_trait;
use rw_actions::{
    ActionError, ActionInvoker, ActionOutput, ActionRequest, ResponseActionExecutor,
    ResponseActionType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Invoker that fails every request for one action kind and counts calls.
struct FlakyInvoker {
    failing: ResponseActionType,
    calls: AtomicUsize,
}

#[async_trait]
impl ActionInvoker for FlakyInvoker {
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.action_type == self.failing {
            return Err(ActionError::IntegrationError(
                "firewall API unavailable".to_string(),
            ));
        }
        Ok(ActionOutput::new(format!(
            "{} done for {}",
            request.action_type, request.target
        )))
    }
}

fn executor() -> ResponseActionExecutor {
    ResponseActionExecutor::simulated(Duration::ZERO)
}

#[tokio::test]
async fn test_block_ip_succeeds_and_grows_ledger_by_one() {
    let executor = executor();
    let before = executor.response_actions().await.len();

    let action = executor
        .execute_response_action("block_ip", "203.0.113.5", true)
        .await;

    assert!(action.success);
    assert_eq!(action.action_type, "block_ip");
    assert_eq!(action.target, "203.0.113.5");
    assert!(action.error.is_none());
    assert_eq!(executor.response_actions().await.len(), before + 1);
}

#[tokio::test]
async fn test_unknown_action_is_recorded_as_failure() {
    let executor = executor();

    let action = executor
        .execute_response_action("not_a_real_action", "x", true)
        .await;

    assert!(!action.success);
    let error = action.error.clone().expect("error should be populated");
    assert!(error.contains("Unknown action type"));
    assert!(error.contains("not_a_real_action"));
    assert!(action.kind().is_none());

    let ledger = executor.response_actions().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0], action);
}

#[tokio::test]
async fn test_duplicate_actions_are_not_suppressed() {
    let executor = executor();

    let first = executor.execute_response_action("block_ip", "198.51.100.7", true).await;
    let second = executor.execute_response_action("block_ip", "198.51.100.7", true).await;

    assert!(first.success && second.success);
    assert_ne!(first.action_id, second.action_id);
    assert_eq!(executor.response_actions().await.len(), 2);
}

#[tokio::test]
async fn test_invoker_error_is_recorded() {
    let invoker = Arc::new(FlakyInvoker {
        failing: ResponseActionType::BlockIp,
        calls: AtomicUsize::new(0),
    });
    let executor = ResponseActionExecutor::new(invoker.clone());

    let blocked = executor.execute_response_action("block_ip", "10.9.9.9", true).await;
    let evidence = executor
        .execute_response_action("collect_evidence", "10.9.9.9", true)
        .await;

    assert!(!blocked.success);
    assert!(blocked.error.unwrap().contains("firewall API unavailable"));
    assert!(evidence.success);
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unknown_action_never_reaches_invoker() {
    let invoker = Arc::new(FlakyInvoker {
        failing: ResponseActionType::BlockIp,
        calls: AtomicUsize::new(0),
    });
    let executor = ResponseActionExecutor::new(invoker.clone());

    executor.execute_response_action("wipe_everything", "host-1", true).await;

    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_parameters_are_passed_and_recorded() {
    let executor = executor();
    let mut parameters = HashMap::new();
    parameters.insert("channels".to_string(), serde_json::json!(["pagerduty"]));

    let action = executor
        .execute_with_parameters("notify_stakeholders", "INC-42", true, parameters)
        .await;

    assert!(action.success);
    assert!(action.output.unwrap().contains("pagerduty"));
    assert_eq!(action.parameters["channels"], serde_json::json!(["pagerduty"]));
}

#[tokio::test]
async fn test_clear_response_actions() {
    let executor = executor();
    executor.execute_response_action("scan_network", "host-3", true).await;
    executor.execute_response_action("assess_impact", "INC-3", false).await;
    assert_eq!(executor.response_actions().await.len(), 2);

    executor.clear_response_actions().await;
    assert!(executor.response_actions().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_executions_all_land_in_ledger() {
    let executor = Arc::new(executor());
    let mut handles = Vec::new();
    for i in 0..16 {
        let executor = Arc::clone(&executor);
        handles.push(tokio::spawn(async move {
            executor
                .execute_response_action("block_ip", &format!("10.0.0.{}", i), true)
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }
    assert_eq!(executor.response_actions().await.len(), 16);
}
