//! Device model - an operator-registered piece of equipment.
//!
//! Maps to the `devices` table. Metrics and traps reference devices
//! through a nullable foreign key; most observed traffic comes from
//! hosts nobody registered, so a missing device is the common case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i64,
    pub name: String,
    /// Unique per device.
    pub ip_address: String,
    pub location: Option<String>,
    /// Comma-separated free-form tags.
    pub tags: Option<String>,
    pub enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}
