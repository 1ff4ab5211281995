//! Configuration validation for Response Warden.
//!
//! Collects every error and warning for a configuration file instead of
//! stopping at the first problem, so `response-warden validate` can report
//! them together.

use colored::Colorize;
use rw_actions::{AutomationLevel, ResponseActionType};
use rw_core::{load_config, SoarConfig};
use serde::Serialize;
use std::path::Path;

/// Result of configuration validation.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    /// Problems that make the configuration unusable.
    pub errors: Vec<String>,
    /// Observations that should be reviewed but do not block the engine.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates engine configuration.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Loads and validates a configuration file. Load failures are reported
    /// as errors and yield no configuration.
    pub fn validate_file(path: &Path) -> (Option<SoarConfig>, ValidationResult) {
        match load_config(path) {
            Ok(config) => {
                let result = Self::validate(&config);
                (Some(config), result)
            }
            Err(e) => {
                let mut result = ValidationResult::new();
                result.add_error(e.to_string());
                (None, result)
            }
        }
    }

    /// Runs every check against an already parsed configuration.
    pub fn validate(config: &SoarConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = config.check() {
            result.add_error(e.to_string());
        }
        for warning in config.warnings() {
            result.add_warning(warning);
        }
        Self::validate_automation_level(config, &mut result);

        result
    }

    fn validate_automation_level(config: &SoarConfig, result: &mut ValidationResult) {
        let automation = &config.automation;
        if !automation.enable_automated_response
            || automation.max_automation_level != AutomationLevel::High
        {
            return;
        }

        let high_impact: Vec<&str> = ResponseActionType::ALL
            .iter()
            .filter(|kind| kind.impact() == AutomationLevel::High)
            .map(|kind| kind.as_str())
            .collect();
        if !high_impact.is_empty() {
            result.add_warning(format!(
                "High-impact actions run without approval: {}",
                high_impact.join(", ")
            ));
        }
    }
}
