//! snmpscope - SNMP Traffic Analyzer and Probe
//!
//! Passively captures SNMP v1/v2c/v3 traffic on the wire, correlates
//! requests with responses, flags behavioral anomalies, and records
//! observations in a local SQLite database. A separate probe engine
//! crafts and sends GET/SET/GETNEXT/GETBULK/TRAP requests, sweeps
//! networks for SNMP agents, and polls devices on a schedule.

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod snmp;

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default SNMP agent port.
pub const DEFAULT_SNMP_PORT: u16 = 161;

/// Default SNMP notification (trap) port.
pub const DEFAULT_TRAP_PORT: u16 = 162;

/// BPF filter selecting SNMP traffic on both well-known ports.
pub const SNMP_FILTER: &str = "udp port 161 or udp port 162";
