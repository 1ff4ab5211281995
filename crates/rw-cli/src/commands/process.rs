//! `response-warden process`: run one event file through the engine.

use crate::OutputFormat;
use anyhow::{Context, Result};
use colored::Colorize;
use rw_actions::ResponseAction;
use rw_core::playbook::ProbabilisticConditionEvaluator;
use rw_core::{
    EngineOptions, ExecutionStatus, PlaybookExecution, SecurityEvent, SecurityIncident, SoarConfig,
    SoarEngine, SoarMetrics, ThreatDetection, TriggerType, Vulnerability,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Arguments of the process subcommand.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub kind: TriggerType,
    pub file: PathBuf,
    pub immediate: bool,
    pub pass_probability: Option<f64>,
}

#[derive(Serialize)]
struct ProcessReport {
    executions: Vec<PlaybookExecution>,
    actions: Vec<ResponseAction>,
    metrics: SoarMetrics,
}

/// Reads an event of the given kind from a JSON or YAML file.
pub fn read_event(kind: TriggerType, path: &Path) -> Result<SecurityEvent> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let event = match kind {
        TriggerType::Incident => {
            SecurityEvent::Incident(parse::<SecurityIncident>(&content, is_yaml)?)
        }
        TriggerType::Threat => SecurityEvent::Threat(parse::<ThreatDetection>(&content, is_yaml)?),
        TriggerType::Vulnerability => {
            SecurityEvent::Vulnerability(parse::<Vulnerability>(&content, is_yaml)?)
        }
    };
    Ok(event)
}

fn parse<T: DeserializeOwned>(content: &str, is_yaml: bool) -> Result<T> {
    if is_yaml {
        serde_yaml::from_str(content).context("Invalid YAML event")
    } else {
        serde_json::from_str(content).context("Invalid JSON event")
    }
}

pub async fn cmd_process(
    config: SoarConfig,
    options: ProcessOptions,
    format: OutputFormat,
) -> Result<()> {
    let event = read_event(options.kind, &options.file)?;

    let mut engine_options = if options.immediate {
        EngineOptions::immediate()
    } else {
        EngineOptions::default()
    };
    if let Some(probability) = options.pass_probability {
        engine_options = engine_options
            .with_condition_evaluator(Arc::new(ProbabilisticConditionEvaluator::new(probability)));
    }

    let engine = SoarEngine::with_options(config, engine_options)?;
    engine.start().await?;
    debug!(kind = %options.kind, file = %options.file.display(), "Processing event file");

    let executions = engine.process_event(&event).await?;
    let report = ProcessReport {
        executions,
        actions: engine.response_actions().await,
        metrics: engine.metrics().await,
    };
    engine.stop().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &ProcessReport) {
    println!("{}", "Playbook Executions".bold());
    println!("───────────────────");
    if report.executions.is_empty() {
        println!("  No playbook matched this event.");
    }
    for execution in &report.executions {
        let status = match execution.status {
            ExecutionStatus::Completed => execution.status.as_str().green(),
            ExecutionStatus::Failed => execution.status.as_str().red(),
            _ => execution.status.as_str().yellow(),
        };
        println!(
            "  {} [{}] {} steps, {} actions, success rate {:.0}%, {} ms",
            execution.playbook_id.cyan(),
            status,
            execution.executed_steps.len(),
            execution.action_ids().len(),
            execution.metrics.success_rate * 100.0,
            execution.metrics.total_duration_ms
        );
        for step in &execution.executed_steps {
            println!(
                "    - {} (attempt {}): {}",
                step.step_id, step.attempt, step.status
            );
        }
        if let Some(error) = &execution.error {
            println!("    {} {}", "error:".red(), error);
        }
    }

    println!();
    println!("{}", "Response Actions".bold());
    println!("────────────────");
    for action in &report.actions {
        let marker = if action.success { "✓".green() } else { "✗".red() };
        let mode = if action.automated { "auto" } else { "manual" };
        println!(
            "  {} {} -> {} ({})",
            marker, action.action_type, action.target, mode
        );
    }

    let metrics = &report.metrics;
    println!();
    println!(
        "Executions: {} ({} successful, {} failed)  Actions: {} ({} failed)",
        metrics.playbooks.executions,
        metrics.playbooks.successful,
        metrics.playbooks.failed,
        metrics.actions.total,
        metrics.actions.failed
    );
}
