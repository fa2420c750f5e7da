//! Trap model - an unsolicited notification from an agent.
//!
//! Maps to the `snmp_traps` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trap {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub source_ip: String,
    pub device_id: Option<i64>,
    /// Protocol version as text ("v1", "v2c", "v3").
    pub version: String,
    pub community_or_user: String,
    /// Enterprise OID from the TRAPv1 header, when present.
    pub enterprise_oid: Option<String>,
    pub severity: String,
    /// `oid:value` pairs joined by `;`.
    pub varbinds: String,
}

/// A trap row about to be inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrap {
    pub ts: DateTime<Utc>,
    pub source_ip: String,
    pub device_id: Option<i64>,
    pub version: String,
    pub community_or_user: String,
    pub enterprise_oid: Option<String>,
    pub severity: String,
    pub varbinds: String,
}
