//! Data models: database rows and in-flight packet/statistics types.
//!
//! Row types map to the SQLite tables and use SQLx for query binding and
//! Serde for JSON serialization.

pub mod anomaly;
pub mod device;
pub mod metric;
pub mod packet;
pub mod statistics;
pub mod trap;

pub use anomaly::{Anomaly, NewAnomaly, Severity};
pub use device::Device;
pub use metric::{Metric, NewMetric};
pub use packet::DecodedPacket;
pub use statistics::CaptureStats;
pub use trap::{NewTrap, Trap};
