//! YAML configuration for the Response Warden engine.
//!
//! Every section has defaults, so an empty document is a valid configuration.
//! `${VAR}` references are substituted from the environment before parsing.

use crate::playbook::PlaybookCategory;
use regex::Regex;
use rw_actions::AutomationLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use validator::Validate;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Configuration failed validation: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct SoarConfig {
    /// Automation switches.
    pub automation: AutomationConfig,
    /// Per-category playbook toggles.
    pub playbooks: PlaybookCategoryConfig,
    /// Notification channels.
    pub notifications: NotificationConfig,
    /// Decision thresholds.
    #[validate(nested)]
    pub thresholds: ThresholdConfig,
}

/// Automation switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutomationConfig {
    /// Allow actions to run without a human.
    pub enable_automated_response: bool,
    /// Run matching playbooks for processed events.
    pub enable_playbook_execution: bool,
    /// Highest action impact that may run automatically.
    pub max_automation_level: AutomationLevel,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enable_automated_response: true,
            enable_playbook_execution: true,
            max_automation_level: AutomationLevel::High,
        }
    }
}

/// Per-category playbook toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybookCategoryConfig {
    pub incident_response: bool,
    pub threat_response: bool,
    pub vulnerability_management: bool,
    pub compliance: bool,
}

impl PlaybookCategoryConfig {
    /// Whether playbooks of the given category may run.
    pub fn is_enabled(&self, category: PlaybookCategory) -> bool {
        match category {
            PlaybookCategory::IncidentResponse => self.incident_response,
            PlaybookCategory::ThreatResponse => self.threat_response,
            PlaybookCategory::VulnerabilityManagement => self.vulnerability_management,
            PlaybookCategory::Compliance => self.compliance,
        }
    }
}

impl Default for PlaybookCategoryConfig {
    fn default() -> Self {
        Self {
            incident_response: true,
            threat_response: true,
            vulnerability_management: true,
            compliance: true,
        }
    }
}

/// Notification channels stakeholders are reached through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub email: bool,
    pub slack: bool,
    pub pagerduty: bool,
    pub webhook: bool,
}

impl NotificationConfig {
    /// Names of the enabled channels, in a stable order.
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        [
            ("email", self.email),
            ("slack", self.slack),
            ("pagerduty", self.pagerduty),
            ("webhook", self.webhook),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email: true,
            slack: true,
            pagerduty: false,
            webhook: false,
        }
    }
}

/// Decision thresholds, all in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub critical_incident: f64,
    /// Threat confidence at or above which immediate actions fire.
    #[validate(range(min = 0.0, max = 1.0))]
    pub automated_response: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub escalation: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            critical_incident: 0.9,
            automated_response: 0.8,
            escalation: 0.7,
        }
    }
}

impl SoarConfig {
    /// Parses and validates a YAML document, substituting `${VAR}` references.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;
        let config: SoarConfig = serde_yaml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Runs field validation plus the checks the derive cannot express.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let thresholds = [
            ("critical_incident", self.thresholds.critical_incident),
            ("automated_response", self.thresholds.automated_response),
            ("escalation", self.thresholds.escalation),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue(format!(
                    "thresholds.{} must be a finite number",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Non-fatal observations about a valid configuration.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.automation.enable_automated_response && self.automation.enable_playbook_execution {
            warnings.push(
                "Automated response is disabled; every playbook step will wait for an analyst"
                    .to_string(),
            );
        }
        if !self.automation.enable_playbook_execution {
            warnings.push("Playbook execution is disabled; events will only be escalated".to_string());
        }
        if self.notifications.enabled_channels().is_empty() {
            warnings.push("No notification channels are enabled".to_string());
        }
        if self.thresholds.escalation > self.thresholds.critical_incident {
            warnings.push(format!(
                "Escalation threshold {} is above the critical incident threshold {}",
                self.thresholds.escalation, self.thresholds.critical_incident
            ));
        }
        let disabled: Vec<&str> = PlaybookCategory::ALL
            .iter()
            .filter(|category| !self.playbooks.is_enabled(**category))
            .map(|category| category.as_str())
            .collect();
        if !disabled.is_empty() {
            warnings.push(format!("Playbook categories disabled: {}", disabled.join(", ")));
        }

        warnings
    }
}

/// Substitutes `${VAR_NAME}` patterns with environment variable values.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result.into_owned())
}

/// Loads and validates the engine configuration from a YAML file.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use rw_core::config::load_config;
///
/// let config = load_config(Path::new("config/response-warden.yaml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<SoarConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    SoarConfig::from_yaml_str(&content)
}
