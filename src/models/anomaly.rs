//! Anomaly model - a behavioral alert raised by the detector.
//!
//! Maps to the `snmp_anomalies` table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Alert severity. Ordering follows escalation, so the most severe of a
/// set of fired rules can be picked with `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Anomaly {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub source_ip: Option<String>,
    pub description: String,
    pub severity: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
}

/// An anomaly about to be persisted; produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnomaly {
    pub source_ip: Option<String>,
    pub description: String,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
}
