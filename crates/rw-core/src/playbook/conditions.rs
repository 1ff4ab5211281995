//! Condition evaluation for playbook triggers and step guards.
//!
//! Conditions are short strings such as `severity=high`, `confidence>0.8`,
//! `type=brute_force` or `source_ip exists`. Anything the grammar does not
//! recognize is kept as [`TriggerCondition::Unrecognized`] and evaluates to
//! true, so playbooks written against richer condition languages still match.
//!
//! Playbook triggers use a narrower grammar than step guards: only
//! `severity=critical`, `severity=high` and `confidence>N` can disqualify a
//! playbook. Every other trigger condition is treated as unrecognized.

use crate::event::{SecurityEventContext, Severity, USER_KEY};
use crate::playbook::model::PlaybookStep;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Comparison operators for numeric conditions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn apply(&self, actual: f64, expected: f64) -> bool {
        match self {
            CompareOp::Eq => (actual - expected).abs() < f64::EPSILON,
            CompareOp::Gt => actual > expected,
            CompareOp::Gte => actual >= expected,
            CompareOp::Lt => actual < expected,
            CompareOp::Lte => actual <= expected,
        }
    }

    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "==" => Some(CompareOp::Eq),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            _ => None,
        }
    }
}

/// Numeric fields of the event context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumericField {
    Confidence,
    RiskScore,
}

/// Optional fields whose presence can be tested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PresenceField {
    SourceIp,
    Endpoint,
    AffectedSystems,
    User,
}

/// A parsed condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TriggerCondition {
    /// `severity=<level>`: severity is at least the given level.
    SeverityAtLeast(Severity),
    /// `confidence>0.8`, `risk_score>=70`, ...
    Numeric {
        field: NumericField,
        op: CompareOp,
        value: f64,
    },
    /// `type=<subtype>`: the incident or threat subtype matches.
    EventType(String),
    /// `<field> exists`.
    Exists(PresenceField),
    /// Anything else. Always holds.
    Unrecognized(String),
}

impl TriggerCondition {
    /// Parses a condition string. Never fails.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();

        if let Some(field) = text.strip_suffix(" exists") {
            return match field.trim() {
                "source_ip" => TriggerCondition::Exists(PresenceField::SourceIp),
                "endpoint" => TriggerCondition::Exists(PresenceField::Endpoint),
                "affected_systems" => TriggerCondition::Exists(PresenceField::AffectedSystems),
                "user" => TriggerCondition::Exists(PresenceField::User),
                _ => TriggerCondition::Unrecognized(raw.to_string()),
            };
        }

        let Some((field, op, value)) = split_comparison(text) else {
            return TriggerCondition::Unrecognized(raw.to_string());
        };

        match (field, op) {
            ("severity", CompareOp::Eq) => value
                .parse::<Severity>()
                .map(TriggerCondition::SeverityAtLeast)
                .unwrap_or_else(|_| TriggerCondition::Unrecognized(raw.to_string())),
            ("type", CompareOp::Eq) if !value.is_empty() => {
                TriggerCondition::EventType(value.to_lowercase())
            }
            ("confidence", op) | ("risk_score", op) => {
                let numeric = if field == "confidence" {
                    NumericField::Confidence
                } else {
                    NumericField::RiskScore
                };
                match value.parse::<f64>() {
                    Ok(value) if value.is_finite() => TriggerCondition::Numeric {
                        field: numeric,
                        op,
                        value,
                    },
                    _ => TriggerCondition::Unrecognized(raw.to_string()),
                }
            }
            _ => TriggerCondition::Unrecognized(raw.to_string()),
        }
    }

    /// Parses a playbook trigger condition. Only the severity floors `high`
    /// and `critical` and strict confidence floors are kept.
    pub fn parse_trigger(raw: &str) -> Self {
        match Self::parse(raw) {
            condition @ TriggerCondition::SeverityAtLeast(Severity::High | Severity::Critical) => {
                condition
            }
            condition @ TriggerCondition::Numeric {
                field: NumericField::Confidence,
                op: CompareOp::Gt,
                ..
            } => condition,
            _ => TriggerCondition::Unrecognized(raw.to_string()),
        }
    }

    /// Evaluates the condition against an event context.
    pub fn evaluate(&self, context: &SecurityEventContext) -> bool {
        match self {
            TriggerCondition::SeverityAtLeast(level) => context.severity >= *level,
            TriggerCondition::Numeric { field, op, value } => {
                let actual = match field {
                    NumericField::Confidence => context.confidence,
                    NumericField::RiskScore => context.risk_score,
                };
                op.apply(actual, *value)
            }
            TriggerCondition::EventType(expected) => context
                .event_type()
                .map(|actual| actual.eq_ignore_ascii_case(expected))
                .unwrap_or(false),
            TriggerCondition::Exists(field) => match field {
                PresenceField::SourceIp => context.source_ip.is_some(),
                PresenceField::Endpoint => context.endpoint.is_some(),
                PresenceField::AffectedSystems => !context.affected_systems.is_empty(),
                PresenceField::User => context.metadata_str(USER_KEY).is_some(),
            },
            TriggerCondition::Unrecognized(raw) => {
                debug!(condition = %raw, "Unrecognized condition treated as satisfied");
                true
            }
        }
    }
}

/// Splits `field<op>value` at the first operator character.
fn split_comparison(text: &str) -> Option<(&str, CompareOp, &str)> {
    let start = text.find(['<', '>', '='])?;
    let rest = &text[start..];
    let op_len = if rest.len() > 1 && rest[1..].starts_with('=') { 2 } else { 1 };
    let op = CompareOp::parse(&rest[..op_len])?;
    let field = text[..start].trim();
    let value = rest[op_len..].trim();
    if field.is_empty() {
        return None;
    }
    Some((field, op, value))
}

/// Evaluates a list of step guard conditions conjunctively. An empty list
/// holds.
pub fn all_conditions_hold(conditions: &[String], context: &SecurityEventContext) -> bool {
    conditions
        .iter()
        .all(|condition| TriggerCondition::parse(condition).evaluate(context))
}

/// Evaluates the conditions of one trigger clause conjunctively with the
/// trigger grammar. An empty list holds.
pub fn trigger_conditions_hold(conditions: &[String], context: &SecurityEventContext) -> bool {
    conditions
        .iter()
        .all(|condition| TriggerCondition::parse_trigger(condition).evaluate(context))
}

/// Decides whether a step's guard conditions allow it to run.
///
/// The executor only consults the evaluator for steps that declare at least
/// one condition.
pub trait StepConditionEvaluator: Send + Sync {
    fn evaluate(&self, step: &PlaybookStep, context: &SecurityEventContext) -> bool;
}

/// Evaluates step guards with the trigger condition grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextConditionEvaluator;

impl StepConditionEvaluator for ContextConditionEvaluator {
    fn evaluate(&self, step: &PlaybookStep, context: &SecurityEventContext) -> bool {
        all_conditions_hold(&step.conditions, context)
    }
}

/// Lets guarded steps through with a fixed probability. For chaos drills.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilisticConditionEvaluator {
    pass_probability: f64,
}

impl ProbabilisticConditionEvaluator {
    pub const DEFAULT_PASS_PROBABILITY: f64 = 0.9;

    /// Creates an evaluator; the probability is clamped to [0, 1].
    pub fn new(pass_probability: f64) -> Self {
        let pass_probability = if pass_probability.is_finite() {
            pass_probability.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_PASS_PROBABILITY
        };
        Self { pass_probability }
    }

    pub fn pass_probability(&self) -> f64 {
        self.pass_probability
    }
}

impl Default for ProbabilisticConditionEvaluator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PASS_PROBABILITY)
    }
}

impl StepConditionEvaluator for ProbabilisticConditionEvaluator {
    fn evaluate(&self, step: &PlaybookStep, _context: &SecurityEventContext) -> bool {
        let passed = rand::thread_rng().gen_bool(self.pass_probability);
        debug!(step = %step.id, passed, "Probabilistic condition check");
        passed
    }
}
