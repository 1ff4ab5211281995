//! `response-warden playbooks` and `response-warden actions`.

use crate::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use rw_actions::{AutomationLevel, ResponseActionType};
use rw_core::{Playbook, SoarConfig, SoarEngine, TriggerType};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PlaybookSummary {
    id: String,
    name: String,
    category: String,
    priority: String,
    steps: usize,
    triggers: Vec<String>,
    enabled: bool,
}

impl PlaybookSummary {
    fn new(playbook: &Playbook, config: &SoarConfig) -> Self {
        Self {
            id: playbook.id.clone(),
            name: playbook.name.clone(),
            category: playbook.category.as_str().to_string(),
            priority: playbook.priority.as_str().to_string(),
            steps: playbook.steps.len(),
            triggers: playbook
                .triggers
                .iter()
                .map(|trigger| {
                    if trigger.conditions.is_empty() {
                        trigger.trigger_type.to_string()
                    } else {
                        format!("{} [{}]", trigger.trigger_type, trigger.conditions.join(", "))
                    }
                })
                .collect(),
            enabled: config.playbooks.is_enabled(playbook.category),
        }
    }
}

#[derive(Debug, Serialize)]
struct ActionSummary {
    name: &'static str,
    impact: AutomationLevel,
    target: &'static str,
}

impl From<ResponseActionType> for ActionSummary {
    fn from(kind: ResponseActionType) -> Self {
        let target = if kind.targets_network_address() {
            "source_ip"
        } else if kind.targets_system() {
            "system"
        } else if kind.targets_identity() {
            "user"
        } else {
            "event"
        };
        Self {
            name: kind.as_str(),
            impact: kind.impact(),
            target,
        }
    }
}

pub async fn cmd_playbooks(
    config: SoarConfig,
    trigger: Option<TriggerType>,
    format: OutputFormat,
) -> Result<()> {
    let engine = SoarEngine::new(config)?;
    let summaries: Vec<PlaybookSummary> = engine
        .playbooks()
        .get_playbooks()
        .await
        .iter()
        .filter(|playbook| match trigger {
            Some(trigger_type) => playbook.triggers_for(trigger_type).next().is_some(),
            None => true,
        })
        .map(|playbook| PlaybookSummary::new(playbook, engine.config()))
        .collect();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{}", "Playbooks".bold());
    println!("─────────");
    for summary in &summaries {
        let state = if summary.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!(
            "  {} ({}) [{}]",
            summary.id.cyan(),
            summary.name,
            state
        );
        println!(
            "    category: {}  priority: {}  steps: {}",
            summary.category, summary.priority, summary.steps
        );
        for trigger in &summary.triggers {
            println!("    trigger: {}", trigger);
        }
    }

    Ok(())
}

pub fn cmd_actions(format: OutputFormat) -> Result<()> {
    let summaries: Vec<ActionSummary> = ResponseActionType::ALL
        .iter()
        .copied()
        .map(ActionSummary::from)
        .collect();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{}", "Response Actions".bold());
    println!("────────────────");
    for summary in &summaries {
        let padded = format!("{:<8}", summary.impact.as_str());
        let impact = match summary.impact {
            AutomationLevel::High => padded.red(),
            AutomationLevel::Medium => padded.yellow(),
            AutomationLevel::Low => padded.green(),
        };
        println!("  {:<28} {} {}", summary.name, impact, summary.target);
    }

    Ok(())
}
