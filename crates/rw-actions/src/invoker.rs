//! The seam between the executor and the systems that carry actions out.
//!
//! Production deployments implement [`ActionInvoker`] over their firewall,
//! identity provider and ticketing APIs. [`SimulatedActionInvoker`] stands in
//! for those integrations with a fixed delay and a descriptive output line.

use crate::action_type::ResponseActionType;
use crate::executor::ActionError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// A single request handed to an invoker.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// The action to perform.
    pub action_type: ResponseActionType,
    /// Target identifier: IP, user, host, vulnerability id, ...
    pub target: String,
    /// Free-form parameters.
    pub parameters: HashMap<String, serde_json::Value>,
}

impl ActionRequest {
    pub fn new(action_type: ResponseActionType, target: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
            parameters: HashMap::new(),
        }
    }

    /// Sets a parameter.
    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    /// Gets a parameter as a list of strings.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// What an invoker reports back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    /// Human-readable description of what was done.
    pub message: String,
}

impl ActionOutput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Performs the side effect behind a response action.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    /// Carries out the requested action.
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionOutput, ActionError>;
}

/// Stand-in invoker that waits a fixed delay and describes the action.
#[derive(Debug, Clone)]
pub struct SimulatedActionInvoker {
    delay: Duration,
}

impl SimulatedActionInvoker {
    /// Delay used when none is configured.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// An invoker that completes immediately.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    fn describe(request: &ActionRequest) -> String {
        let target = &request.target;
        match request.action_type {
            ResponseActionType::BlockIp => format!("IP address {} blocked at perimeter firewall", target),
            ResponseActionType::RateLimitIp => format!("Rate limit applied to IP address {}", target),
            ResponseActionType::QuarantineUser => {
                format!("User {} quarantined with restricted access", target)
            }
            ResponseActionType::DisableAccount => format!("Account {} disabled", target),
            ResponseActionType::IsolateSystem => {
                format!("System {} isolated from the network", target)
            }
            ResponseActionType::RevokeSessions => {
                format!("All active sessions revoked for {}", target)
            }
            ResponseActionType::UpdateFirewallRules => {
                format!("Firewall rules updated for {}", target)
            }
            ResponseActionType::PatchVulnerability => {
                format!("Patch deployment scheduled for {}", target)
            }
            ResponseActionType::RotateCredentials => format!("Credentials rotated for {}", target),
            ResponseActionType::ResetPassword => format!("Password reset forced for {}", target),
            ResponseActionType::BackupData => format!("Backup snapshot taken for {}", target),
            ResponseActionType::RestoreSystem => {
                format!("System {} restored from last known good state", target)
            }
            ResponseActionType::NotifyStakeholders => {
                let channels = request.get_string_list("channels");
                if channels.is_empty() {
                    format!("Stakeholders notified about {}", target)
                } else {
                    format!(
                        "Stakeholders notified about {} via {}",
                        target,
                        channels.join(", ")
                    )
                }
            }
            ResponseActionType::EscalateIncident => {
                format!("{} escalated to the security operations lead", target)
            }
            ResponseActionType::CreateTicket => format!("Ticket opened for {}", target),
            ResponseActionType::CollectEvidence => {
                format!("Evidence collected and preserved for {}", target)
            }
            ResponseActionType::ValidateDetection => format!("Detection {} validated", target),
            ResponseActionType::CollectInitialEvidence => {
                format!("Initial evidence snapshot captured for {}", target)
            }
            ResponseActionType::AnalyzeIndicators => {
                format!("Indicators of compromise analyzed for {}", target)
            }
            ResponseActionType::CorrelateEvents => {
                format!("Related events correlated for {}", target)
            }
            ResponseActionType::ScanNetwork => format!("Network scan completed from {}", target),
            ResponseActionType::CheckCompromisedAccounts => {
                format!("Account compromise check completed for {}", target)
            }
            ResponseActionType::AssessImpact => format!("Impact assessment completed for {}", target),
            ResponseActionType::VerifyIntegrity => {
                format!("Integrity verification passed for {}", target)
            }
            ResponseActionType::DocumentIncident => format!("Incident record updated for {}", target),
            ResponseActionType::GenerateReport => format!("Response report generated for {}", target),
        }
    }
}

impl Default for SimulatedActionInvoker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl ActionInvoker for SimulatedActionInvoker {
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let message = Self::describe(request);
        debug!(action = %request.action_type, target = %request.target, "{}", message);
        Ok(ActionOutput::new(message))
    }
}
