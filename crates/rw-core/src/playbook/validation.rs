//! Structural validation for playbooks and execution records.

use crate::playbook::model::Playbook;
use rw_actions::ResponseActionType;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Reasons a playbook or execution record is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybookValidationError {
    #[error("Playbook fields are invalid: {0}")]
    InvalidFields(String),

    #[error("Playbook {playbook} declares step '{step}' more than once")]
    DuplicateStepId { playbook: String, step: String },

    #[error("Step '{step}' depends on '{dependency}', which is not an earlier step")]
    InvalidDependency { step: String, dependency: String },

    #[error("Step '{step}' has a zero timeout")]
    ZeroTimeout { step: String },

    #[error("Automated step '{step}' uses unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    #[error("Step '{step}' has an empty id or name")]
    EmptyStep { step: String },

    #[error("Execution {execution_id} is inconsistent: {reason}")]
    InvalidExecution { execution_id: Uuid, reason: String },
}

impl Playbook {
    /// Checks that the playbook can be registered and executed.
    ///
    /// Field lengths are checked through `validator`; the cross-field rules
    /// are: unique step ids, dependencies on earlier steps only, non-zero
    /// timeouts, and known actions on automated steps.
    pub fn check(&self) -> Result<(), PlaybookValidationError> {
        Validate::validate(self)
            .map_err(|e| PlaybookValidationError::InvalidFields(e.to_string()))?;

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() || step.name.trim().is_empty() {
                return Err(PlaybookValidationError::EmptyStep {
                    step: step.id.clone(),
                });
            }
            for dependency in &step.dependencies {
                if !seen.contains(dependency.as_str()) {
                    return Err(PlaybookValidationError::InvalidDependency {
                        step: step.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            if !seen.insert(step.id.as_str()) {
                return Err(PlaybookValidationError::DuplicateStepId {
                    playbook: self.id.clone(),
                    step: step.id.clone(),
                });
            }
            if step.timeout_secs == 0 {
                return Err(PlaybookValidationError::ZeroTimeout {
                    step: step.id.clone(),
                });
            }
            if step.automated {
                if let Some(action) = step
                    .actions
                    .iter()
                    .find(|action| action.parse::<ResponseActionType>().is_err())
                {
                    return Err(PlaybookValidationError::UnknownAction {
                        step: step.id.clone(),
                        action: action.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
