//! Integration tests for the SOAR engine: lifecycle, playbook selection,
//! escalation and the metrics rollup.

use chrono::Utc;
use rw_core::event::{
    GeoLocation, IncidentType, ThreatSource, ThreatTarget, VulnerabilityLocation,
};
use rw_core::playbook::catalog::{
    CRITICAL_INCIDENT_RESPONSE, DATA_BREACH_RESPONSE, THREAT_AUTO_CONTAINMENT,
    VULNERABILITY_REMEDIATION,
};
use rw_core::playbook::{PlaybookCategory, Priority, Trigger};
use rw_core::{
    EngineError, EngineOptions, ExecutionStatus, Playbook, PlaybookStep, SecurityEvent,
    SecurityEventContext, SecurityIncident, Severity, SoarConfig, SoarEngine, StepStatus,
    StepType, ThreatDetection, ThreatType, TriggerType, Vulnerability,
};
use std::sync::Arc;

fn incident(id: &str, severity: Severity, incident_type: IncidentType) -> SecurityIncident {
    SecurityIncident {
        incident_id: id.to_string(),
        incident_type,
        severity,
        created_at: Utc::now(),
        affected_systems: vec!["app-server-3".to_string()],
    }
}

fn threat(threat_type: ThreatType, severity: Severity, confidence: f64) -> ThreatDetection {
    ThreatDetection {
        threat_id: "THR-2024-001".to_string(),
        threat_type,
        severity,
        confidence,
        ml_score: None,
        detected_at: Utc::now(),
        source: ThreatSource {
            ip: "198.51.100.23".to_string(),
            user_agent: Some("python-requests/2.31".to_string()),
            location: Some(GeoLocation {
                country: Some("US".to_string()),
                region: None,
                city: None,
            }),
        },
        target: ThreatTarget {
            endpoint: "/admin/users".to_string(),
            method: "POST".to_string(),
        },
        indicators: vec!["role_change".to_string()],
        blocked: false,
    }
}

fn vulnerability(severity: Severity) -> Vulnerability {
    Vulnerability {
        id: "VULN-314".to_string(),
        severity,
        confidence: 0.9,
        detected_at: Utc::now(),
        location: VulnerabilityLocation {
            file: Some("src/handlers/search.rs".to_string()),
            endpoint: Some("/api/search".to_string()),
        },
        evidence: vec!["reflected parameter".to_string()],
        title: "Reflected XSS".to_string(),
        description: "Query parameter echoed without encoding".to_string(),
        impact: "Session theft".to_string(),
        recommendation: "Encode output".to_string(),
        mitigated: false,
    }
}

async fn running_engine(config: SoarConfig) -> SoarEngine {
    let engine = SoarEngine::with_options(config, EngineOptions::immediate()).unwrap();
    engine.start().await.unwrap();
    engine
}

fn action_types(actions: &[rw_actions::ResponseAction]) -> Vec<&str> {
    actions.iter().map(|a| a.action_type.as_str()).collect()
}

#[tokio::test]
async fn test_processing_before_start_is_rejected() {
    let engine = SoarEngine::with_options(SoarConfig::default(), EngineOptions::immediate()).unwrap();

    let result = engine
        .process_incident(&incident("INC-1", Severity::Critical, IncidentType::Malware))
        .await;
    assert_eq!(result, Err(EngineError::NotRunning));
    assert!(engine
        .process_threat(&threat(ThreatType::BruteForce, Severity::High, 0.9))
        .await
        .is_err());
    assert!(engine.process_vulnerability(&vulnerability(Severity::High)).await.is_err());

    // No partial work.
    assert!(engine.executions().await.is_empty());
    assert!(engine.response_actions().await.is_empty());
}

#[tokio::test]
async fn test_processing_after_shutdown_is_rejected() {
    let engine = running_engine(SoarConfig::default()).await;
    engine
        .process_incident(&incident("INC-2", Severity::Critical, IncidentType::Malware))
        .await
        .unwrap();

    engine.shutdown().await;

    assert!(!engine.is_running().await);
    assert!(engine.executions().await.is_empty());
    assert!(engine.response_actions().await.is_empty());
    assert_eq!(engine.metrics().await.playbooks.total, 0);
    assert_eq!(
        engine
            .process_incident(&incident("INC-3", Severity::Low, IncidentType::Other))
            .await,
        Err(EngineError::NotRunning)
    );
}

#[tokio::test]
async fn test_double_start_fails() {
    let engine = running_engine(SoarConfig::default()).await;
    assert_eq!(engine.start().await, Err(EngineError::AlreadyRunning));
    engine.stop().await.unwrap();
    engine.start().await.unwrap();
}

#[tokio::test]
async fn test_critical_incident_runs_seed_playbook_and_escalates() {
    let engine = running_engine(SoarConfig::default()).await;

    let executions = engine
        .process_incident(&incident(
            "INC-100",
            Severity::Critical,
            IncidentType::UnauthorizedAccess,
        ))
        .await
        .unwrap();

    assert_eq!(executions.len(), 2);
    let execution = &executions[0];
    assert_eq!(execution.playbook_id, CRITICAL_INCIDENT_RESPONSE);
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.executed_steps.len(), 3);
    assert_eq!(execution.metrics.success_rate, 1.0);
    assert_eq!(execution.metrics.automated_steps, 3);
    assert!(execution.results.containment_successful);
    assert!(execution.results.evidence_collected);
    assert_eq!(execution.triggered_by.trigger_type, TriggerType::Incident);
    assert_eq!(execution.triggered_by.id, "INC-100");
    assert!(execution.validate().is_ok());

    // The breach playbook matches on severity alone; its guarded steps skip.
    let breach = &executions[1];
    assert_eq!(breach.playbook_id, DATA_BREACH_RESPONSE);
    assert_eq!(breach.status, ExecutionStatus::Completed);
    assert_eq!(breach.executed_steps.len(), 4);
    assert!(breach
        .executed_steps
        .iter()
        .all(|row| row.status == StepStatus::Skipped));
    assert!(breach.action_ids().is_empty());

    let actions = engine.response_actions().await;
    assert_eq!(
        action_types(&actions),
        vec![
            "validate_detection",
            "collect_initial_evidence",
            "isolate_system",
            "block_ip",
            "quarantine_user",
            "notify_stakeholders",
            "create_ticket",
            "escalate_incident",
            "notify_stakeholders",
            "collect_evidence",
        ]
    );
    assert!(actions.iter().all(|a| a.success && a.automated));
    assert_eq!(actions[2].target, "app-server-3");
    assert_eq!(actions[7].target, "INC-100");
}

#[tokio::test]
async fn test_escalation_requires_automated_response() {
    let mut config = SoarConfig::default();
    config.automation.enable_automated_response = false;
    let engine = running_engine(config).await;

    let executions = engine
        .process_incident(&incident("INC-7", Severity::Critical, IncidentType::Malware))
        .await
        .unwrap();

    // The playbook still runs, entirely on the manual path.
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
    assert_eq!(executions[0].metrics.manual_steps, 3);

    // Threat escalation is gated the same way, even for critical threats.
    engine
        .process_threat(&threat(ThreatType::PrivilegeEscalation, Severity::Critical, 0.99))
        .await
        .unwrap();

    let actions = engine.response_actions().await;
    assert!(actions.iter().all(|a| !a.automated));
    assert!(!action_types(&actions).contains(&"escalate_incident"));
}

#[tokio::test]
async fn test_privilege_escalation_fires_fixed_sequence_in_order() {
    let engine = running_engine(SoarConfig::default()).await;

    // Medium severity: no built-in playbook matches, escalation still fires.
    let executions = engine
        .process_threat(&threat(ThreatType::PrivilegeEscalation, Severity::Medium, 0.8))
        .await
        .unwrap();
    assert!(executions.is_empty());

    let actions = engine.response_actions().await;
    assert_eq!(
        action_types(&actions),
        vec!["quarantine_user", "collect_evidence", "escalate_incident"]
    );
    assert_eq!(actions[0].target, "THR-2024-001");
}

#[tokio::test]
async fn test_escalation_follows_playbook_actions() {
    let engine = running_engine(SoarConfig::default()).await;

    let executions = engine
        .process_threat(&threat(ThreatType::PrivilegeEscalation, Severity::High, 0.95))
        .await
        .unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].playbook_id, THREAT_AUTO_CONTAINMENT);

    let actions = engine.response_actions().await;
    let tail: Vec<&str> = action_types(&actions).into_iter().rev().take(3).rev().collect();
    assert_eq!(tail, vec!["quarantine_user", "collect_evidence", "escalate_incident"]);
}

#[tokio::test]
async fn test_brute_force_blocks_source_ip() {
    let engine = running_engine(SoarConfig::default()).await;
    engine
        .process_threat(&threat(ThreatType::BruteForce, Severity::Critical, 0.2))
        .await
        .unwrap();

    let actions = engine.response_actions().await;
    let last = actions.last().unwrap();
    assert_eq!(last.action_type, "block_ip");
    assert_eq!(last.target, "198.51.100.23");
}

#[tokio::test]
async fn test_confidence_threshold_is_configurable() {
    let mut config = SoarConfig::default();
    config.thresholds.automated_response = 0.5;
    let engine = running_engine(config).await;

    engine
        .process_threat(&threat(ThreatType::SqlInjectionAttempt, Severity::Low, 0.6))
        .await
        .unwrap();

    assert_eq!(
        action_types(&engine.response_actions().await),
        vec!["block_ip", "collect_evidence"]
    );
}

#[tokio::test]
async fn test_vulnerability_runs_remediation_playbook() {
    let engine = running_engine(SoarConfig::default()).await;

    let executions = engine
        .process_vulnerability(&vulnerability(Severity::High))
        .await
        .unwrap();

    assert_eq!(executions.len(), 1);
    let execution = &executions[0];
    assert_eq!(execution.playbook_id, VULNERABILITY_REMEDIATION);
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.metrics.manual_steps, 1);
    assert_eq!(execution.metrics.automated_steps, 3);
    assert!(execution.results.threat_neutralized);

    let actions = engine.response_actions().await;
    assert!(!action_types(&actions).contains(&"escalate_incident"));
}

#[tokio::test]
async fn test_disabled_category_is_skipped() {
    let mut config = SoarConfig::default();
    config.playbooks.vulnerability_management = false;
    let engine = running_engine(config).await;

    let executions = engine
        .process_vulnerability(&vulnerability(Severity::Critical))
        .await
        .unwrap();
    assert!(executions.is_empty());
}

#[tokio::test]
async fn test_data_breach_runs_both_incident_playbooks_by_priority() {
    let engine = running_engine(SoarConfig::default()).await;

    let executions = engine
        .process_incident(&incident("INC-55", Severity::Critical, IncidentType::DataBreach))
        .await
        .unwrap();

    let ids: Vec<&str> = executions.iter().map(|e| e.playbook_id.as_str()).collect();
    assert_eq!(ids, vec![CRITICAL_INCIDENT_RESPONSE, DATA_BREACH_RESPONSE]);

    let breach = &executions[1];
    assert!(breach
        .executed_steps
        .iter()
        .all(|row| row.status == StepStatus::Completed));
    assert_eq!(breach.action_ids().len(), 7);
    assert!(breach.results.containment_successful);
}

#[tokio::test]
async fn test_medium_severity_trigger_matches_low_incident() {
    let engine = running_engine(SoarConfig::default()).await;
    let playbook = Playbook::new(
        "medium-floor",
        "Medium floor",
        PlaybookCategory::IncidentResponse,
        Priority::Low,
    )
    .with_trigger(Trigger::new(TriggerType::Incident).with_condition("severity=medium"))
    .with_step(
        PlaybookStep::new("doc", "Document", StepType::Documentation)
            .with_automated(true)
            .with_action("document_incident"),
    );
    engine.register_playbook(playbook).await.unwrap();

    // Only severity=critical, severity=high and confidence>N filter triggers.
    let executions = engine
        .process_incident(&incident("INC-12", Severity::Low, IncidentType::Phishing))
        .await
        .unwrap();

    let ids: Vec<&str> = executions.iter().map(|e| e.playbook_id.as_str()).collect();
    assert_eq!(ids, vec!["medium-floor"]);
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_find_applicable_playbooks_sorted_by_priority() {
    let engine = running_engine(SoarConfig::default()).await;
    let low = Playbook::new("low-critical", "Low", PlaybookCategory::Compliance, Priority::Low)
        .with_trigger(Trigger::new(TriggerType::Incident).with_condition("severity=critical"))
        .with_step(
            PlaybookStep::new("doc", "Document", StepType::Documentation)
                .with_automated(true)
                .with_action("document_incident"),
        );
    let high = Playbook::new("high-critical", "High", PlaybookCategory::Compliance, Priority::High)
        .with_trigger(Trigger::new(TriggerType::Incident).with_condition("severity=critical"))
        .with_step(
            PlaybookStep::new("doc", "Document", StepType::Documentation)
                .with_automated(true)
                .with_action("document_incident"),
        );
    engine.register_playbook(low).await.unwrap();
    engine.register_playbook(high).await.unwrap();

    let context = SecurityEventContext::from(&incident(
        "INC-9",
        Severity::Critical,
        IncidentType::Phishing,
    ));
    let matched = engine
        .playbooks()
        .find_applicable_playbooks(TriggerType::Incident, &context)
        .await;

    let ids: Vec<&str> = matched.iter().map(|p| p.id.as_str()).collect();
    assert!(ids.contains(&CRITICAL_INCIDENT_RESPONSE));
    assert_eq!(
        ids,
        vec![
            CRITICAL_INCIDENT_RESPONSE,
            DATA_BREACH_RESPONSE,
            "high-critical",
            "low-critical"
        ]
    );
    assert!(matched.windows(2).all(|w| w[0].priority >= w[1].priority));

    // Wrong trigger type never matches.
    assert!(engine
        .playbooks()
        .find_applicable_playbooks(TriggerType::Threat, &context)
        .await
        .iter()
        .all(|p| p.id != CRITICAL_INCIDENT_RESPONSE));
}

#[tokio::test]
async fn test_metrics_reflect_ledgers() {
    let engine = running_engine(SoarConfig::default()).await;
    engine
        .process_incident(&incident("INC-11", Severity::Critical, IncidentType::Malware))
        .await
        .unwrap();
    engine
        .process_threat(&threat(ThreatType::XssAttempt, Severity::High, 0.9))
        .await
        .unwrap();

    let metrics = engine.metrics().await;
    assert_eq!(
        metrics.playbooks.total,
        engine.playbooks().get_playbooks().await.len()
    );
    assert_eq!(metrics.playbooks.executions, engine.executions().await.len());
    // Critical incident response, the skipped breach playbook and threat
    // containment.
    assert_eq!(metrics.playbooks.successful, 3);
    assert_eq!(metrics.playbooks.failed, 0);
    assert_eq!(metrics.actions.total, engine.response_actions().await.len());
    assert_eq!(metrics.actions.failed, 0);
    assert!(metrics.automation.running);
    assert!(metrics.automation.enabled);
}

#[tokio::test]
async fn test_process_event_dispatches() {
    let engine = running_engine(SoarConfig::default()).await;
    let event = SecurityEvent::Threat(threat(ThreatType::BruteForce, Severity::High, 0.95));

    let executions = engine.process_event(&event).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(
        engine
            .playbooks()
            .executions_for_trigger(TriggerType::Threat, "THR-2024-001")
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_events_share_ledgers() {
    let engine = Arc::new(running_engine(SoarConfig::default()).await);
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .process_incident(&incident(
                    &format!("INC-C{}", i),
                    Severity::Critical,
                    IncidentType::Malware,
                ))
                .await
        }));
    }
    for handle in handles {
        let executions = handle.await.unwrap().unwrap();
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
    }

    // Critical response plus the guarded breach playbook per incident.
    assert_eq!(engine.executions().await.len(), 16);
    // 7 playbook actions plus 3 escalation actions per incident.
    assert_eq!(engine.response_actions().await.len(), 80);
}
