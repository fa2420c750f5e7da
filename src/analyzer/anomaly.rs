//! Anomaly detection.
//!
//! A fixed, ordered rule table applied to every decoded packet between
//! decode and storage. Rate accounting uses a tumbling one-minute
//! window of per-source counters. Rules fire independently; everything
//! that fired on one packet is combined into a single anomaly record
//! with pipe-joined descriptions, carrying the severity and type of the
//! most severe rule.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::AnalysisConfig;
use crate::models::{DecodedPacket, NewAnomaly, Severity};

/// Community strings that ship as vendor defaults.
const DEFAULT_COMMUNITIES: &[&str] = &["public", "private", "community"];

/// Everything a rule predicate may look at.
struct RuleInput<'a> {
    packet: &'a DecodedPacket,
    /// True only on the packet that pushed its source over the flood
    /// threshold within the current window.
    flood_crossed: bool,
    slow_threshold: Duration,
}

struct Rule {
    kind: &'static str,
    severity: Severity,
    predicate: fn(&RuleInput<'_>) -> Option<String>,
}

/// Ordered rule table; add entries here, the pipeline needs no change.
const RULES: &[Rule] = &[
    Rule {
        kind: "flood",
        severity: Severity::Warn,
        predicate: |input| {
            input
                .flood_crossed
                .then(|| format!("Flood potentiel depuis {}", input.packet.source_ip))
        },
    },
    Rule {
        kind: "weak_community",
        severity: Severity::Info,
        predicate: |input| {
            let community = input.packet.community_or_user.to_lowercase();
            DEFAULT_COMMUNITIES
                .contains(&community.as_str())
                .then(|| "Community string par défaut détectée".to_string())
        },
    },
    Rule {
        kind: "external_trap",
        severity: Severity::Warn,
        predicate: |input| {
            (input.packet.pdu_kind.is_trap() && !input.packet.source_ip.is_loopback())
                .then(|| "Trap depuis source externe".to_string())
        },
    },
    Rule {
        kind: "slow_response",
        severity: Severity::Warn,
        predicate: |input| {
            input
                .packet
                .response_time
                .filter(|latency| *latency > input.slow_threshold)
                .map(|latency| {
                    format!(
                        "Temps de réponse élevé depuis {} ({} ms)",
                        input.packet.source_ip,
                        latency.as_millis()
                    )
                })
        },
    },
];

#[derive(Debug)]
struct WindowState {
    counts: HashMap<IpAddr, u64>,
    window_start: DateTime<Utc>,
}

/// Per-source rate accounting plus the rule table.
#[derive(Debug)]
pub struct AnomalyDetector {
    flood_threshold: u64,
    slow_threshold: Duration,
    state: Mutex<WindowState>,
}

impl AnomalyDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            flood_threshold: config.max_requests_per_min,
            slow_threshold: Duration::from_secs_f64(config.alert_response_time_s),
            state: Mutex::new(WindowState {
                counts: HashMap::new(),
                window_start: Utc::now(),
            }),
        }
    }

    /// Analyze one packet. Returns the combined anomaly when at least one
    /// rule fired.
    pub fn analyze(&self, packet: &DecodedPacket) -> Option<NewAnomaly> {
        let flood_crossed = self.account(packet);

        let input = RuleInput {
            packet,
            flood_crossed,
            slow_threshold: self.slow_threshold,
        };

        let mut descriptions = Vec::new();
        let mut worst: Option<(&'static str, Severity)> = None;
        for rule in RULES {
            if let Some(description) = (rule.predicate)(&input) {
                descriptions.push(description);
                let beats = worst.map_or(true, |(_, severity)| rule.severity > severity);
                if beats {
                    worst = Some((rule.kind, rule.severity));
                }
            }
        }

        let (kind, severity) = worst?;
        Some(NewAnomaly {
            source_ip: Some(packet.source_ip.to_string()),
            description: descriptions.join(" | "),
            severity,
            kind: kind.to_string(),
        })
    }

    /// Bump the source's counter inside the tumbling window. Returns true
    /// exactly once per (source, window): on the packet that crosses the
    /// threshold.
    fn account(&self, packet: &DecodedPacket) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = packet.timestamp;
        if now - state.window_start > chrono::Duration::minutes(1) {
            state.counts.clear();
            state.window_start = now;
        }

        let count = state.counts.entry(packet.source_ip).or_insert(0);
        *count += 1;
        *count == self.flood_threshold + 1
    }
}
