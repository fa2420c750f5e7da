//! Metric model - one observed varbind value from a RESPONSE PDU.
//!
//! Maps to the `snmp_metrics` table. Rows are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Metric {
    pub id: i64,
    pub ts: DateTime<Utc>,
    /// Responding agent.
    pub source_ip: String,
    pub device_id: Option<i64>,
    pub oid: String,
    pub value_raw: String,
    /// Populated iff `value_raw` parses as a finite decimal number.
    pub value_num: Option<f64>,
    /// Request/response latency when the correlator matched a pair.
    pub latency_ms: Option<i64>,
}

/// A metric row about to be inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetric {
    pub ts: DateTime<Utc>,
    pub source_ip: String,
    pub device_id: Option<i64>,
    pub oid: String,
    pub value_raw: String,
    pub value_num: Option<f64>,
    pub latency_ms: Option<i64>,
}
