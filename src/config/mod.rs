//! Configuration - environment-driven settings.
//!
//! Every key is optional; built-in defaults cover a workable local setup.
//! Values are read once at startup and passed explicitly; there is no
//! mid-run reload.

use crate::error::{Error, Result};

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DatabaseConfig,
    pub snmp: SnmpConfig,
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    /// Log filter directive, fed to the tracing subscriber.
    pub log_level: String,
}

/// Local SQLite database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub db_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: "snmp_local.db".into(),
        }
    }
}

/// Defaults applied to outgoing SNMP requests.
#[derive(Debug, Clone)]
pub struct SnmpConfig {
    pub community: String,
    /// Per-attempt reply timeout in seconds.
    pub timeout_s: f64,
    pub retries: u32,
    pub port: u16,
    pub trap_port: u16,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: "public".into(),
            timeout_s: 2.0,
            retries: 1,
            port: crate::DEFAULT_SNMP_PORT,
            trap_port: crate::DEFAULT_TRAP_PORT,
        }
    }
}

/// Live capture settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Interface name; `None` lets the OS pick the default.
    pub interface: Option<String>,
    pub buffer_size: i32,
    pub promiscuous: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            buffer_size: 65536,
            promiscuous: false,
        }
    }
}

/// Anomaly detection thresholds.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Per-source message count above which a flood anomaly fires.
    pub max_requests_per_min: u64,
    /// Correlated response latency (seconds) above which a slow-response
    /// anomaly fires.
    pub alert_response_time_s: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_requests_per_min: 100,
            alert_response_time_s: 5.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db: DatabaseConfig::default(),
            snmp: SnmpConfig::default(),
            capture: CaptureConfig::default(),
            analysis: AnalysisConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from defaults plus environment overrides.
    ///
    /// An unparsable value is fatal: startup is the only point where a bad
    /// setting can be reported next to its cause.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DB_PATH") {
            config.db.db_path = v;
        }
        if let Ok(v) = std::env::var("SNMP_COMMUNITY") {
            config.snmp.community = v;
        }
        if let Ok(v) = std::env::var("SNMP_TIMEOUT") {
            config.snmp.timeout_s = parse_env("SNMP_TIMEOUT", &v)?;
        }
        if let Ok(v) = std::env::var("SNMP_RETRIES") {
            config.snmp.retries = parse_env("SNMP_RETRIES", &v)?;
        }
        if let Ok(v) = std::env::var("SNMP_PORT") {
            config.snmp.port = parse_env("SNMP_PORT", &v)?;
        }
        if let Ok(v) = std::env::var("SNMP_TRAP_PORT") {
            config.snmp.trap_port = parse_env("SNMP_TRAP_PORT", &v)?;
        }
        if let Ok(v) = std::env::var("CAPTURE_INTERFACE") {
            config.capture.interface = Some(v);
        }
        if let Ok(v) = std::env::var("CAPTURE_BUFFER_SIZE") {
            config.capture.buffer_size = parse_env("CAPTURE_BUFFER_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("CAPTURE_PROMISCUOUS") {
            config.capture.promiscuous = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Ok(v) = std::env::var("MAX_REQUESTS_PER_MIN") {
            config.analysis.max_requests_per_min = parse_env("MAX_REQUESTS_PER_MIN", &v)?;
        }
        if let Ok(v) = std::env::var("ALERT_RESPONSE_TIME") {
            config.analysis.alert_response_time_s = parse_env("ALERT_RESPONSE_TIME", &v)?;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::config(format!("invalid value for {}: {:?}", key, raw)))
}
