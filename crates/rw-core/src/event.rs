//! Security event data models for Response Warden.
//!
//! Upstream detectors hand the engine one of three shapes: a confirmed
//! [`SecurityIncident`], a [`ThreatDetection`], or a [`Vulnerability`]
//! finding. Each is normalized exactly once into a [`SecurityEventContext`],
//! which is what trigger matching, step conditions and escalation look at.

use chrono::{DateTime, Utc};
use rw_actions::ResponseActionType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity levels for security events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Risk score assigned to a severity band when no model score is available.
    pub fn baseline_risk_score(&self) -> f64 {
        match self {
            Severity::Critical => 95.0,
            Severity::High => 80.0,
            Severity::Medium => 60.0,
            Severity::Low => 30.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("Invalid severity: {}", other)),
        }
    }
}

/// The kind of event that triggered a playbook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Incident,
    Threat,
    Vulnerability,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Incident => "incident",
            TriggerType::Threat => "threat",
            TriggerType::Vulnerability => "vulnerability",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incident" => Ok(TriggerType::Incident),
            "threat" => Ok(TriggerType::Threat),
            "vulnerability" => Ok(TriggerType::Vulnerability),
            other => Err(format!("Invalid trigger type: {}", other)),
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Category of a confirmed incident.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    DataBreach,
    Malware,
    UnauthorizedAccess,
    Phishing,
    DenialOfService,
    InsiderThreat,
    PolicyViolation,
    #[serde(other)]
    Other,
}

impl IncidentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::DataBreach => "data_breach",
            IncidentType::Malware => "malware",
            IncidentType::UnauthorizedAccess => "unauthorized_access",
            IncidentType::Phishing => "phishing",
            IncidentType::DenialOfService => "denial_of_service",
            IncidentType::InsiderThreat => "insider_threat",
            IncidentType::PolicyViolation => "policy_violation",
            IncidentType::Other => "other",
        }
    }
}

/// A confirmed security incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIncident {
    pub incident_id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub affected_systems: Vec<String>,
}

/// Class of a detected threat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    BruteForce,
    RateLimitAbuse,
    SqlInjectionAttempt,
    XssAttempt,
    PrivilegeEscalation,
    CredentialStuffing,
    DataExfiltration,
    SuspiciousActivity,
    AnomalousBehavior,
    #[serde(other)]
    Unknown,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatType::BruteForce => "brute_force",
            ThreatType::RateLimitAbuse => "rate_limit_abuse",
            ThreatType::SqlInjectionAttempt => "sql_injection_attempt",
            ThreatType::XssAttempt => "xss_attempt",
            ThreatType::PrivilegeEscalation => "privilege_escalation",
            ThreatType::CredentialStuffing => "credential_stuffing",
            ThreatType::DataExfiltration => "data_exfiltration",
            ThreatType::SuspiciousActivity => "suspicious_activity",
            ThreatType::AnomalousBehavior => "anomalous_behavior",
            ThreatType::Unknown => "unknown",
        }
    }
}

/// Coarse location of a network peer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Where a threat came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatSource {
    pub ip: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
}

/// What a threat was aimed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatTarget {
    pub endpoint: String,
    pub method: String,
}

/// A threat reported by an upstream detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatDetection {
    pub threat_id: String,
    #[serde(rename = "type")]
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub confidence: f64,
    /// Model score in [0, 1], when the detector is model-backed.
    #[serde(default)]
    pub ml_score: Option<f64>,
    pub detected_at: DateTime<Utc>,
    pub source: ThreatSource,
    pub target: ThreatTarget,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub blocked: bool,
}

/// Where a vulnerability was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnerabilityLocation {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// A vulnerability finding from a scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub severity: Severity,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub location: VulnerabilityLocation,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub mitigated: bool,
}

/// Any of the three inputs the engine accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "lowercase")]
pub enum SecurityEvent {
    Incident(SecurityIncident),
    Threat(ThreatDetection),
    Vulnerability(Vulnerability),
}

impl SecurityEvent {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            SecurityEvent::Incident(_) => TriggerType::Incident,
            SecurityEvent::Threat(_) => TriggerType::Threat,
            SecurityEvent::Vulnerability(_) => TriggerType::Vulnerability,
        }
    }

    pub fn to_context(&self) -> SecurityEventContext {
        match self {
            SecurityEvent::Incident(incident) => incident.into(),
            SecurityEvent::Threat(threat) => threat.into(),
            SecurityEvent::Vulnerability(vulnerability) => vulnerability.into(),
        }
    }
}

// ============================================================================
// Canonical context
// ============================================================================

/// Source label recorded on incident contexts.
pub const INCIDENT_SOURCE: &str = "incident_manager";
/// Source label recorded on threat contexts.
pub const THREAT_SOURCE: &str = "threat_detector";
/// Source label recorded on vulnerability contexts.
pub const VULNERABILITY_SOURCE: &str = "vulnerability_scanner";

/// Canonical description of any triggering event. Never mutated once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityEventContext {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub trigger_type: TriggerType,
    pub severity: Severity,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    /// Derived risk in [0, 100].
    pub risk_score: f64,
    #[serde(default)]
    pub affected_systems: Vec<String>,
    #[serde(default)]
    pub affected_assets: Vec<String>,
    #[serde(default)]
    pub affected_services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeoLocation>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Metadata key holding the incident or threat subtype.
pub const EVENT_TYPE_KEY: &str = "event_type";
/// Metadata key holding an affected user identity.
pub const USER_KEY: &str = "user";

impl SecurityEventContext {
    /// Picks the identifier an action should be aimed at for this event.
    ///
    /// Network actions use the source address, host actions the first
    /// affected system, identity actions the `user` metadata entry; anything
    /// else, or a missing field, falls back to the event id.
    pub fn target_for(&self, action: Option<ResponseActionType>) -> String {
        let resolved = match action {
            Some(kind) if kind.targets_network_address() => self.source_ip.clone(),
            Some(kind) if kind.targets_system() => self.affected_systems.first().cloned(),
            Some(kind) if kind.targets_identity() => self.metadata_str(USER_KEY).map(String::from),
            _ => None,
        };
        resolved.unwrap_or_else(|| self.event_id.clone())
    }

    /// Gets a metadata entry as a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// The incident or threat subtype, if the source carried one.
    pub fn event_type(&self) -> Option<&str> {
        self.metadata_str(EVENT_TYPE_KEY)
    }
}

/// Scales a model score in [0, 1] to the 0–100 risk range.
fn scaled_model_score(score: f64) -> Option<f64> {
    score.is_finite().then(|| (score * 100.0).clamp(0.0, 100.0))
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl From<&SecurityIncident> for SecurityEventContext {
    fn from(incident: &SecurityIncident) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            EVENT_TYPE_KEY.to_string(),
            serde_json::json!(incident.incident_type.as_str()),
        );

        Self {
            event_id: incident.incident_id.clone(),
            timestamp: incident.created_at,
            source: INCIDENT_SOURCE.to_string(),
            trigger_type: TriggerType::Incident,
            severity: incident.severity,
            // Incidents are confirmed by the time they reach the engine.
            confidence: 1.0,
            risk_score: incident.severity.baseline_risk_score(),
            affected_systems: incident.affected_systems.clone(),
            affected_assets: Vec::new(),
            affected_services: Vec::new(),
            source_ip: None,
            endpoint: None,
            method: None,
            user_agent: None,
            geolocation: None,
            metadata,
        }
    }
}

impl From<&ThreatDetection> for SecurityEventContext {
    fn from(threat: &ThreatDetection) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            EVENT_TYPE_KEY.to_string(),
            serde_json::json!(threat.threat_type.as_str()),
        );
        metadata.insert("indicators".to_string(), serde_json::json!(threat.indicators));
        metadata.insert("blocked".to_string(), serde_json::json!(threat.blocked));
        if let Some(score) = threat.ml_score {
            metadata.insert("ml_score".to_string(), serde_json::json!(score));
        }

        Self {
            event_id: threat.threat_id.clone(),
            timestamp: threat.detected_at,
            source: THREAT_SOURCE.to_string(),
            trigger_type: TriggerType::Threat,
            severity: threat.severity,
            confidence: clamp_confidence(threat.confidence),
            risk_score: threat
                .ml_score
                .and_then(scaled_model_score)
                .unwrap_or_else(|| threat.severity.baseline_risk_score()),
            affected_systems: Vec::new(),
            affected_assets: Vec::new(),
            affected_services: vec![threat.target.endpoint.clone()],
            source_ip: Some(threat.source.ip.clone()),
            endpoint: Some(threat.target.endpoint.clone()),
            method: Some(threat.target.method.clone()),
            user_agent: threat.source.user_agent.clone(),
            geolocation: threat.source.location.clone(),
            metadata,
        }
    }
}

impl From<&Vulnerability> for SecurityEventContext {
    fn from(vulnerability: &Vulnerability) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("title".to_string(), serde_json::json!(vulnerability.title));
        metadata.insert(
            "description".to_string(),
            serde_json::json!(vulnerability.description),
        );
        metadata.insert("impact".to_string(), serde_json::json!(vulnerability.impact));
        metadata.insert(
            "recommendation".to_string(),
            serde_json::json!(vulnerability.recommendation),
        );
        metadata.insert("evidence".to_string(), serde_json::json!(vulnerability.evidence));
        metadata.insert(
            "mitigated".to_string(),
            serde_json::json!(vulnerability.mitigated),
        );

        Self {
            event_id: vulnerability.id.clone(),
            timestamp: vulnerability.detected_at,
            source: VULNERABILITY_SOURCE.to_string(),
            trigger_type: TriggerType::Vulnerability,
            severity: vulnerability.severity,
            confidence: clamp_confidence(vulnerability.confidence),
            risk_score: vulnerability.severity.baseline_risk_score(),
            affected_systems: Vec::new(),
            affected_assets: vulnerability.location.file.iter().cloned().collect(),
            affected_services: vulnerability.location.endpoint.iter().cloned().collect(),
            source_ip: None,
            endpoint: vulnerability.location.endpoint.clone(),
            method: None,
            user_agent: None,
            geolocation: None,
            metadata,
        }
    }
}
