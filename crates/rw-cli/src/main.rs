//! Response Warden CLI
//!
//! Command-line interface for driving the SOAR engine from event files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rw_core::{load_config, SoarConfig, TriggerType};
use rw_observability::{LogFormat, LoggingConfig};
use std::path::PathBuf;

mod commands;
mod validator;

use commands::{cmd_actions, cmd_playbooks, cmd_process, cmd_validate, ProcessOptions};

#[derive(Parser)]
#[command(name = "response-warden")]
#[command(author = "Response Warden Team")]
#[command(version)]
#[command(about = "Automated security incident response and playbook orchestration", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log format (text, json)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process an event file through the engine
    Process {
        /// Event kind (incident, threat, vulnerability)
        kind: TriggerType,

        /// Event file (JSON or YAML)
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Run simulated actions without delay
        #[arg(long)]
        immediate: bool,

        /// Evaluate step conditions randomly with this pass probability
        #[arg(long, value_name = "P")]
        pass_probability: Option<f64>,
    },

    /// List the playbook catalog
    Playbooks {
        /// Only show playbooks with a trigger of this kind
        #[arg(short, long)]
        trigger: Option<TriggerType>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate (defaults to --config)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// List the known response actions
    Actions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    rw_observability::init_logging_with_config(LoggingConfig {
        level: log_level,
        format: cli.log_format,
        ..Default::default()
    });

    match cli.command {
        Commands::Process {
            kind,
            file,
            immediate,
            pass_probability,
        } => {
            let config = resolve_config(cli.config.as_ref(), cli.verbose)?;
            cmd_process(
                config,
                ProcessOptions {
                    kind,
                    file,
                    immediate,
                    pass_probability,
                },
                cli.format,
            )
            .await
        }
        Commands::Playbooks { trigger } => {
            let config = resolve_config(cli.config.as_ref(), cli.verbose)?;
            cmd_playbooks(config, trigger, cli.format).await
        }
        Commands::Validate { file } => match file.or(cli.config) {
            Some(path) => cmd_validate(path, cli.format),
            None => {
                anyhow::bail!("No configuration file given; pass one to validate or use --config")
            }
        },
        Commands::Actions => cmd_actions(cli.format),
    }
}

/// Loads the configuration named on the command line, or the defaults.
fn resolve_config(path: Option<&PathBuf>, verbose: bool) -> Result<SoarConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            if verbose {
                eprintln!("Using default configuration (no config file given)");
            }
            Ok(SoarConfig::default())
        }
    }
}
