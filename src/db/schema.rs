//! Table definitions for the observation store.
//!
//! Executed in order at startup; every statement is idempotent so an
//! existing database is left untouched.

pub const CREATE_DEVICES: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    ip_address TEXT NOT NULL UNIQUE,
    location TEXT,
    tags TEXT,
    enabled INTEGER DEFAULT 1,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"#;

pub const CREATE_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS snmp_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    source_ip TEXT NOT NULL,
    device_id INTEGER,
    oid TEXT NOT NULL,
    value_raw TEXT,
    value_num REAL,
    latency_ms INTEGER,
    FOREIGN KEY(device_id) REFERENCES devices(id) ON DELETE SET NULL
)"#;

pub const CREATE_TRAPS: &str = r#"
CREATE TABLE IF NOT EXISTS snmp_traps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    source_ip TEXT,
    device_id INTEGER,
    version TEXT,
    community_or_user TEXT,
    enterprise_oid TEXT,
    severity TEXT,
    varbinds TEXT,
    FOREIGN KEY(device_id) REFERENCES devices(id) ON DELETE SET NULL
)"#;

pub const CREATE_ANOMALIES: &str = r#"
CREATE TABLE IF NOT EXISTS snmp_anomalies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    source_ip TEXT,
    description TEXT,
    severity TEXT,
    type TEXT
)"#;

/// All table statements, dependency order first.
pub const ALL_TABLES: &[&str] = &[CREATE_DEVICES, CREATE_METRICS, CREATE_TRAPS, CREATE_ANOMALIES];
