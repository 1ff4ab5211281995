//! # rw-core
//!
//! Core engine for Response Warden.
//!
//! This crate provides:
//! - The security event model and its normalization into a single context
//! - Playbook definitions, trigger matching and step execution
//! - The SOAR engine that ties playbooks, escalation and metrics together
//! - YAML configuration loading

pub mod config;
pub mod engine;
pub mod event;
pub mod metrics;
pub mod playbook;

pub use config::{load_config, ConfigError, SoarConfig};
pub use engine::{EngineError, EngineOptions, SoarEngine};
pub use event::{
    SecurityEvent, SecurityEventContext, SecurityIncident, Severity, ThreatDetection, ThreatType,
    TriggerType, Vulnerability,
};
pub use metrics::SoarMetrics;
pub use playbook::{
    ExecutionStatus, Playbook, PlaybookExecution, PlaybookManager, PlaybookStep, StepStatus,
    StepType,
};
