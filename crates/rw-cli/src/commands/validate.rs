//! `response-warden validate`: check a configuration file.

use crate::validator::ConfigValidator;
use crate::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub fn cmd_validate(config_path: PathBuf, format: OutputFormat) -> Result<()> {
    let (config, validation_result) = ConfigValidator::validate_file(&config_path);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&validation_result)?);
        if validation_result.has_errors() {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!(
        "Validating configuration: {}",
        config_path.display().to_string().cyan()
    );
    validation_result.print();

    if let Some(config) = &config {
        println!();
        println!("{}", "Configuration Summary".bold());
        println!("─────────────────────");
        println!(
            "  Automated response: {}",
            config.automation.enable_automated_response
        );
        println!(
            "  Playbook execution: {}",
            config.automation.enable_playbook_execution
        );
        println!(
            "  Max automation level: {}",
            config.automation.max_automation_level
        );
        println!(
            "  Notification channels: {}",
            config.notifications.enabled_channels().join(", ")
        );
        println!(
            "  Thresholds: critical {} / automated {} / escalation {}",
            config.thresholds.critical_incident,
            config.thresholds.automated_response,
            config.thresholds.escalation
        );
    }

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}
