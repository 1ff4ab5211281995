//! # rw-observability
//!
//! Logging and metrics infrastructure for Response Warden.
//!
//! This crate provides structured logging with tracing and a thin recorder
//! over the `metrics` facade for playbook and response action telemetry.
//! Exporters are installed by the embedding process; without one, every
//! recording call is a no-op.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LogFormat, LoggingConfig};
pub use metrics::SoarMetricsRecorder;
