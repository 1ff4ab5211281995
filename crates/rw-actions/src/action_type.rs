//! The closed set of response action kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How disruptive an action is, and correspondingly how much automation the
/// engine must be allowed before running it without a human.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AutomationLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl AutomationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationLevel::Low => "low",
            AutomationLevel::Medium => "medium",
            AutomationLevel::High => "high",
        }
    }
}

impl fmt::Display for AutomationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every response action the executor knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseActionType {
    // Containment
    BlockIp,
    RateLimitIp,
    QuarantineUser,
    DisableAccount,
    IsolateSystem,
    RevokeSessions,
    UpdateFirewallRules,
    // Eradication
    PatchVulnerability,
    RotateCredentials,
    ResetPassword,
    // Recovery
    BackupData,
    RestoreSystem,
    // Communication
    NotifyStakeholders,
    EscalateIncident,
    CreateTicket,
    // Forensics and analysis
    CollectEvidence,
    ValidateDetection,
    CollectInitialEvidence,
    AnalyzeIndicators,
    CorrelateEvents,
    ScanNetwork,
    CheckCompromisedAccounts,
    AssessImpact,
    VerifyIntegrity,
    // Documentation
    DocumentIncident,
    GenerateReport,
}

impl ResponseActionType {
    /// All known action kinds, in declaration order.
    pub const ALL: [ResponseActionType; 26] = [
        ResponseActionType::BlockIp,
        ResponseActionType::RateLimitIp,
        ResponseActionType::QuarantineUser,
        ResponseActionType::DisableAccount,
        ResponseActionType::IsolateSystem,
        ResponseActionType::RevokeSessions,
        ResponseActionType::UpdateFirewallRules,
        ResponseActionType::PatchVulnerability,
        ResponseActionType::RotateCredentials,
        ResponseActionType::ResetPassword,
        ResponseActionType::BackupData,
        ResponseActionType::RestoreSystem,
        ResponseActionType::NotifyStakeholders,
        ResponseActionType::EscalateIncident,
        ResponseActionType::CreateTicket,
        ResponseActionType::CollectEvidence,
        ResponseActionType::ValidateDetection,
        ResponseActionType::CollectInitialEvidence,
        ResponseActionType::AnalyzeIndicators,
        ResponseActionType::CorrelateEvents,
        ResponseActionType::ScanNetwork,
        ResponseActionType::CheckCompromisedAccounts,
        ResponseActionType::AssessImpact,
        ResponseActionType::VerifyIntegrity,
        ResponseActionType::DocumentIncident,
        ResponseActionType::GenerateReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseActionType::BlockIp => "block_ip",
            ResponseActionType::RateLimitIp => "rate_limit_ip",
            ResponseActionType::QuarantineUser => "quarantine_user",
            ResponseActionType::DisableAccount => "disable_account",
            ResponseActionType::IsolateSystem => "isolate_system",
            ResponseActionType::RevokeSessions => "revoke_sessions",
            ResponseActionType::UpdateFirewallRules => "update_firewall_rules",
            ResponseActionType::PatchVulnerability => "patch_vulnerability",
            ResponseActionType::RotateCredentials => "rotate_credentials",
            ResponseActionType::ResetPassword => "reset_password",
            ResponseActionType::BackupData => "backup_data",
            ResponseActionType::RestoreSystem => "restore_system",
            ResponseActionType::NotifyStakeholders => "notify_stakeholders",
            ResponseActionType::EscalateIncident => "escalate_incident",
            ResponseActionType::CreateTicket => "create_ticket",
            ResponseActionType::CollectEvidence => "collect_evidence",
            ResponseActionType::ValidateDetection => "validate_detection",
            ResponseActionType::CollectInitialEvidence => "collect_initial_evidence",
            ResponseActionType::AnalyzeIndicators => "analyze_indicators",
            ResponseActionType::CorrelateEvents => "correlate_events",
            ResponseActionType::ScanNetwork => "scan_network",
            ResponseActionType::CheckCompromisedAccounts => "check_compromised_accounts",
            ResponseActionType::AssessImpact => "assess_impact",
            ResponseActionType::VerifyIntegrity => "verify_integrity",
            ResponseActionType::DocumentIncident => "document_incident",
            ResponseActionType::GenerateReport => "generate_report",
        }
    }

    /// Impact of running this action unattended.
    pub fn impact(&self) -> AutomationLevel {
        match self {
            ResponseActionType::DisableAccount
            | ResponseActionType::IsolateSystem
            | ResponseActionType::RotateCredentials
            | ResponseActionType::ResetPassword
            | ResponseActionType::RestoreSystem => AutomationLevel::High,
            ResponseActionType::BlockIp
            | ResponseActionType::RateLimitIp
            | ResponseActionType::QuarantineUser
            | ResponseActionType::RevokeSessions
            | ResponseActionType::UpdateFirewallRules
            | ResponseActionType::PatchVulnerability => AutomationLevel::Medium,
            _ => AutomationLevel::Low,
        }
    }

    /// Whether the action gathers evidence for later forensics.
    pub fn is_evidence_gathering(&self) -> bool {
        matches!(
            self,
            ResponseActionType::CollectEvidence | ResponseActionType::CollectInitialEvidence
        )
    }

    /// Whether the action targets a network address rather than a host or identity.
    pub fn targets_network_address(&self) -> bool {
        matches!(
            self,
            ResponseActionType::BlockIp
                | ResponseActionType::RateLimitIp
                | ResponseActionType::UpdateFirewallRules
        )
    }

    /// Whether the action targets a host.
    pub fn targets_system(&self) -> bool {
        matches!(
            self,
            ResponseActionType::IsolateSystem
                | ResponseActionType::ScanNetwork
                | ResponseActionType::VerifyIntegrity
                | ResponseActionType::BackupData
                | ResponseActionType::RestoreSystem
        )
    }

    /// Whether the action targets a user identity.
    pub fn targets_identity(&self) -> bool {
        matches!(
            self,
            ResponseActionType::QuarantineUser
                | ResponseActionType::DisableAccount
                | ResponseActionType::RevokeSessions
                | ResponseActionType::RotateCredentials
                | ResponseActionType::ResetPassword
        )
    }
}

impl fmt::Display for ResponseActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResponseActionType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
