//! Unit tests for environment-driven configuration.

use serial_test::serial;

use snmpscope::config::AppConfig;

const ALL_KEYS: &[&str] = &[
    "DB_PATH",
    "SNMP_COMMUNITY",
    "SNMP_TIMEOUT",
    "SNMP_RETRIES",
    "SNMP_PORT",
    "SNMP_TRAP_PORT",
    "CAPTURE_INTERFACE",
    "CAPTURE_BUFFER_SIZE",
    "CAPTURE_PROMISCUOUS",
    "MAX_REQUESTS_PER_MIN",
    "ALERT_RESPONSE_TIME",
    "LOG_LEVEL",
];

fn clear_env() {
    for key in ALL_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();
    let config = AppConfig::from_env().expect("config");

    assert_eq!(config.db.db_path, "snmp_local.db");
    assert_eq!(config.snmp.community, "public");
    assert_eq!(config.snmp.timeout_s, 2.0);
    assert_eq!(config.snmp.retries, 1);
    assert_eq!(config.snmp.port, 161);
    assert_eq!(config.snmp.trap_port, 162);
    assert!(config.capture.interface.is_none());
    assert_eq!(config.capture.buffer_size, 65536);
    assert!(!config.capture.promiscuous);
    assert_eq!(config.analysis.max_requests_per_min, 100);
    assert_eq!(config.analysis.alert_response_time_s, 5.0);
    assert_eq!(config.log_level, "info");
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("DB_PATH", "/tmp/observations.db");
    std::env::set_var("SNMP_COMMUNITY", "not-public");
    std::env::set_var("SNMP_TIMEOUT", "0.5");
    std::env::set_var("SNMP_RETRIES", "3");
    std::env::set_var("SNMP_PORT", "10161");
    std::env::set_var("SNMP_TRAP_PORT", "10162");
    std::env::set_var("CAPTURE_INTERFACE", "eth1");
    std::env::set_var("CAPTURE_PROMISCUOUS", "true");
    std::env::set_var("MAX_REQUESTS_PER_MIN", "250");
    std::env::set_var("ALERT_RESPONSE_TIME", "1.5");
    std::env::set_var("LOG_LEVEL", "debug");

    let config = AppConfig::from_env().expect("config");
    clear_env();

    assert_eq!(config.db.db_path, "/tmp/observations.db");
    assert_eq!(config.snmp.community, "not-public");
    assert_eq!(config.snmp.timeout_s, 0.5);
    assert_eq!(config.snmp.retries, 3);
    assert_eq!(config.snmp.port, 10161);
    assert_eq!(config.snmp.trap_port, 10162);
    assert_eq!(config.capture.interface.as_deref(), Some("eth1"));
    assert!(config.capture.promiscuous);
    assert_eq!(config.analysis.max_requests_per_min, 250);
    assert_eq!(config.analysis.alert_response_time_s, 1.5);
    assert_eq!(config.log_level, "debug");
}

#[test]
#[serial]
fn test_invalid_number_is_fatal() {
    clear_env();
    std::env::set_var("SNMP_PORT", "not-a-port");
    let result = AppConfig::from_env();
    clear_env();

    let err = result.expect_err("must fail");
    assert!(err.to_string().contains("SNMP_PORT"));
    assert!(err.is_fatal());
}

#[test]
#[serial]
fn test_promiscuous_accepts_one() {
    clear_env();
    std::env::set_var("CAPTURE_PROMISCUOUS", "1");
    let config = AppConfig::from_env().expect("config");
    clear_env();
    assert!(config.capture.promiscuous);
}
