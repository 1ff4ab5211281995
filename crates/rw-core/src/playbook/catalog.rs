//! Playbooks seeded into every engine at construction.

use crate::event::TriggerType;
use crate::playbook::model::{
    Playbook, PlaybookCategory, PlaybookStep, Priority, StepType, Trigger,
};

pub const CRITICAL_INCIDENT_RESPONSE: &str = "critical-incident-response";
pub const THREAT_AUTO_CONTAINMENT: &str = "threat-auto-containment";
pub const VULNERABILITY_REMEDIATION: &str = "vulnerability-remediation";
pub const DATA_BREACH_RESPONSE: &str = "data-breach-response";

const BREACH_GUARD: &str = "type=data_breach";

/// Returns the built-in playbooks, in registration order.
pub fn builtin_playbooks() -> Vec<Playbook> {
    vec![
        critical_incident_response(),
        threat_auto_containment(),
        vulnerability_remediation(),
        data_breach_response(),
    ]
}

/// Detect, contain and notify for critical incidents.
pub fn critical_incident_response() -> Playbook {
    Playbook::new(
        CRITICAL_INCIDENT_RESPONSE,
        "Critical Incident Response",
        PlaybookCategory::IncidentResponse,
        Priority::Critical,
    )
    .with_description("Validates, contains and escalates critical security incidents")
    .with_trigger(Trigger::new(TriggerType::Incident).with_condition("severity=critical"))
    .with_step(
        PlaybookStep::new("detect-validate", "Detect and validate", StepType::Detection)
            .with_automated(true)
            .with_actions(["validate_detection", "collect_initial_evidence"])
            .with_timeout_secs(300)
            .with_retries(2)
            .with_output("validated_detection"),
    )
    .with_step(
        PlaybookStep::new(
            "immediate-containment",
            "Immediate containment",
            StepType::Containment,
        )
        .with_automated(true)
        .with_actions(["isolate_system", "block_ip", "quarantine_user"])
        .with_timeout_secs(600)
        .with_retries(1)
        .with_dependency("detect-validate")
        .with_output("containment_status"),
    )
    .with_step(
        PlaybookStep::new(
            "stakeholder-notification",
            "Stakeholder notification",
            StepType::Notification,
        )
        .with_automated(true)
        .with_actions(["notify_stakeholders", "create_ticket"])
        .with_timeout_secs(120)
        .with_retries(3)
        .with_dependency("immediate-containment"),
    )
    .with_permission("incident:respond")
    .with_estimated_duration_secs(1020)
}

/// Blocks the source of confident, high-severity threats.
pub fn threat_auto_containment() -> Playbook {
    Playbook::new(
        THREAT_AUTO_CONTAINMENT,
        "Threat Auto-Containment",
        PlaybookCategory::ThreatResponse,
        Priority::High,
    )
    .with_description("Analyzes and blocks the source of high-confidence threats")
    .with_trigger(
        Trigger::new(TriggerType::Threat)
            .with_condition("severity=high")
            .with_condition("confidence>0.8"),
    )
    .with_step(
        PlaybookStep::new("analyze-threat", "Analyze threat", StepType::Analysis)
            .with_automated(true)
            .with_actions(["analyze_indicators", "correlate_events"])
            .with_timeout_secs(180)
            .with_retries(1),
    )
    .with_step(
        PlaybookStep::new("block-source", "Block source", StepType::Containment)
            .with_automated(true)
            .with_condition("source_ip exists")
            .with_action("block_ip")
            .with_timeout_secs(60)
            .with_retries(2)
            .with_dependency("analyze-threat"),
    )
    .with_step(
        PlaybookStep::new("record-threat", "Record threat", StepType::Documentation)
            .with_automated(true)
            .with_action("document_incident")
            .with_timeout_secs(60),
    )
    .with_permission("threat:contain")
    .with_estimated_duration_secs(300)
}

/// Assesses and patches high-severity findings. Patching needs a human.
pub fn vulnerability_remediation() -> Playbook {
    Playbook::new(
        VULNERABILITY_REMEDIATION,
        "Vulnerability Remediation",
        PlaybookCategory::VulnerabilityManagement,
        Priority::Medium,
    )
    .with_description("Assesses, patches and verifies high-severity vulnerabilities")
    .with_trigger(Trigger::new(TriggerType::Vulnerability).with_condition("severity=high"))
    .with_step(
        PlaybookStep::new("assess-impact", "Assess impact", StepType::Analysis)
            .with_automated(true)
            .with_action("assess_impact")
            .with_timeout_secs(300),
    )
    .with_step(
        PlaybookStep::new("apply-patch", "Apply patch", StepType::Eradication)
            .with_action("patch_vulnerability")
            .with_timeout_secs(3600)
            .with_dependency("assess-impact"),
    )
    .with_step(
        PlaybookStep::new("verify-fix", "Verify fix", StepType::Verification)
            .with_automated(true)
            .with_action("verify_integrity")
            .with_timeout_secs(300)
            .with_retries(1)
            .with_dependency("apply-patch"),
    )
    .with_step(
        PlaybookStep::new("open-ticket", "Open tracking ticket", StepType::Documentation)
            .with_automated(true)
            .with_action("create_ticket")
            .with_timeout_secs(60),
    )
    .with_permission("vulnerability:remediate")
    .with_estimated_duration_secs(4260)
}

/// Scopes, contains and documents data breaches.
pub fn data_breach_response() -> Playbook {
    Playbook::new(
        DATA_BREACH_RESPONSE,
        "Data Breach Response",
        PlaybookCategory::IncidentResponse,
        Priority::High,
    )
    .with_description("Contains credential exposure and documents data breaches")
    .with_trigger(Trigger::new(TriggerType::Incident).with_condition("severity=high"))
    // Triggers cannot filter on incident type, so every step is guarded.
    .with_step(
        PlaybookStep::new("scope-breach", "Scope breach", StepType::Analysis)
            .with_automated(true)
            .with_condition(BREACH_GUARD)
            .with_actions(["assess_impact", "check_compromised_accounts"])
            .with_timeout_secs(600)
            .with_retries(1),
    )
    .with_step(
        PlaybookStep::new("contain-access", "Contain access", StepType::Containment)
            .with_automated(true)
            .with_condition(BREACH_GUARD)
            .with_actions(["revoke_sessions", "rotate_credentials"])
            .with_timeout_secs(300)
            .with_retries(1)
            .with_dependency("scope-breach"),
    )
    .with_step(
        PlaybookStep::new("notify-breach", "Notify stakeholders", StepType::Notification)
            .with_automated(true)
            .with_condition(BREACH_GUARD)
            .with_action("notify_stakeholders")
            .with_timeout_secs(120)
            .with_retries(2),
    )
    .with_step(
        PlaybookStep::new(
            "breach-documentation",
            "Breach documentation",
            StepType::Documentation,
        )
        .with_condition(BREACH_GUARD)
        .with_actions(["document_incident", "generate_report"])
        .with_timeout_secs(1800)
        .with_dependency("contain-access"),
    )
    .with_permission("incident:respond")
    .with_permission("compliance:report")
    .with_estimated_duration_secs(2820)
}
