//! Playbook data structures for Response Warden.
//!
//! A playbook is an ordered list of steps plus the triggers that select it.
//! Playbooks are immutable once registered; per-run state such as remaining
//! retries lives on the execution, never on the definition.

use crate::event::TriggerType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use validator::Validate;

/// Selection priority. Higher priorities run first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational area a playbook belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookCategory {
    IncidentResponse,
    ThreatResponse,
    VulnerabilityManagement,
    Compliance,
}

impl PlaybookCategory {
    pub const ALL: [PlaybookCategory; 4] = [
        PlaybookCategory::IncidentResponse,
        PlaybookCategory::ThreatResponse,
        PlaybookCategory::VulnerabilityManagement,
        PlaybookCategory::Compliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybookCategory::IncidentResponse => "incident_response",
            PlaybookCategory::ThreatResponse => "threat_response",
            PlaybookCategory::VulnerabilityManagement => "vulnerability_management",
            PlaybookCategory::Compliance => "compliance",
        }
    }
}

impl fmt::Display for PlaybookCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the response a step belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Detection,
    Analysis,
    Containment,
    Eradication,
    Recovery,
    Notification,
    Documentation,
    Verification,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Detection => "detection",
            StepType::Analysis => "analysis",
            StepType::Containment => "containment",
            StepType::Eradication => "eradication",
            StepType::Recovery => "recovery",
            StepType::Notification => "notification",
            StepType::Documentation => "documentation",
            StepType::Verification => "verification",
        }
    }

    /// A failed critical step aborts the whole execution.
    pub fn is_critical(&self) -> bool {
        matches!(self, StepType::Containment | StepType::Eradication)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects a playbook for events of one type. All conditions must hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            conditions: Vec::new(),
        }
    }

    /// Adds a condition.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }
}

/// A single step in a playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybookStep {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Whether the step may run without a human.
    #[serde(default)]
    pub automated: bool,
    /// Guard conditions; a step with none always proceeds.
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Action names, executed in order.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Upper bound for the whole step, in seconds.
    pub timeout_secs: u64,
    /// Additional attempts after the first failure.
    #[serde(default)]
    pub retries: u32,
    /// Ids of steps that must have run before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Names of the outputs this step produces.
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl PlaybookStep {
    /// Default step timeout.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    pub fn new(id: impl Into<String>, name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type,
            automated: false,
            conditions: Vec::new(),
            actions: Vec::new(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            retries: 0,
            dependencies: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Sets whether the step may run without a human.
    pub fn with_automated(mut self, automated: bool) -> Self {
        self.automated = automated;
        self
    }

    /// Adds an action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Sets the actions.
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a guard condition.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Adds a dependency on an earlier step.
    pub fn with_dependency(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }

    /// Adds a named output.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A response playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Playbook {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1))]
    pub version: String,
    pub priority: Priority,
    pub category: PlaybookCategory,
    #[validate(length(min = 1))]
    pub steps: Vec<PlaybookStep>,
    #[validate(length(min = 1))]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub required_permissions: Vec<String>,
    /// Expected wall-clock duration, in seconds.
    #[serde(default)]
    pub estimated_duration_secs: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
}

impl Playbook {
    /// Creates an empty playbook at version 1.0.0.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: PlaybookCategory,
        priority: Priority,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: "1.0.0".to_string(),
            priority,
            category,
            steps: Vec::new(),
            triggers: Vec::new(),
            required_permissions: Vec::new(),
            estimated_duration_secs: 0,
            created_by: "system".to_string(),
            created_at: Utc::now(),
            approved_by: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds a step.
    pub fn with_step(mut self, step: PlaybookStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Adds a trigger.
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Adds a required permission.
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    pub fn with_estimated_duration_secs(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn with_approved_by(mut self, approved_by: impl Into<String>) -> Self {
        self.approved_by = Some(approved_by.into());
        self
    }

    /// Finds a step by id.
    pub fn step(&self, step_id: &str) -> Option<&PlaybookStep> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    /// Triggers registered for the given event type.
    pub fn triggers_for(&self, trigger_type: TriggerType) -> impl Iterator<Item = &Trigger> {
        self.triggers
            .iter()
            .filter(move |trigger| trigger.trigger_type == trigger_type)
    }
}
