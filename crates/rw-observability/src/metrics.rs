//! Metrics collection for Response Warden.
//!
//! This module records playbook and action telemetry through the `metrics`
//! facade. The in-process rollup returned by the engine is computed from its
//! ledgers; this recorder only feeds whatever exporter the host installs.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::Once;

static REGISTER: Once = Once::new();

/// Records SOAR telemetry through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoarMetricsRecorder;

impl SoarMetricsRecorder {
    /// Creates a recorder, registering metric descriptions on first use.
    pub fn new() -> Self {
        REGISTER.call_once(Self::register_metrics);
        Self
    }

    /// Registers metric descriptions.
    fn register_metrics() {
        describe_counter!(
            "rw_events_processed_total",
            "Total number of security events processed by the engine"
        );
        describe_counter!(
            "rw_escalations_total",
            "Total number of unconditional escalation sequences fired"
        );
        describe_counter!(
            "rw_playbook_executions_total",
            "Total number of playbook executions by terminal status"
        );
        describe_counter!(
            "rw_actions_executed_total",
            "Total number of response actions executed"
        );
        describe_counter!(
            "rw_step_retries_total",
            "Total number of playbook step retries"
        );

        describe_histogram!(
            "rw_playbook_duration_seconds",
            "Wall-clock duration of a playbook execution"
        );
        describe_histogram!(
            "rw_action_duration_seconds",
            "Duration of a single response action"
        );
    }

    /// Records a security event entering the engine.
    pub fn record_event(&self, trigger: &str, severity: &str) {
        counter!(
            "rw_events_processed_total",
            "trigger" => trigger.to_string(),
            "severity" => severity.to_string()
        )
        .increment(1);
    }

    /// Records an escalation sequence being fired.
    pub fn record_escalation(&self, trigger: &str) {
        counter!("rw_escalations_total", "trigger" => trigger.to_string()).increment(1);
    }

    /// Records a playbook execution reaching a terminal status.
    pub fn record_playbook_execution(&self, playbook_id: &str, status: &str, duration_secs: f64) {
        counter!(
            "rw_playbook_executions_total",
            "playbook" => playbook_id.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!("rw_playbook_duration_seconds", "playbook" => playbook_id.to_string())
            .record(duration_secs);
    }

    /// Records a response action outcome.
    pub fn record_action(&self, action: &str, success: bool, automated: bool, duration_secs: f64) {
        let result = if success { "success" } else { "failure" };
        let mode = if automated { "automated" } else { "manual" };
        counter!(
            "rw_actions_executed_total",
            "action" => action.to_string(),
            "result" => result,
            "mode" => mode
        )
        .increment(1);
        histogram!("rw_action_duration_seconds", "action" => action.to_string())
            .record(duration_secs);
    }

    /// Records a step retry.
    pub fn record_step_retry(&self, step_type: &str) {
        counter!("rw_step_retries_total", "step_type" => step_type.to_string()).increment(1);
    }
}
