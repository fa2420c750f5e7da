//! Active SNMP probe engine.
//!
//! Builds and sends GET / SET / GETNEXT / GETBULK / TRAP PDUs over UDP,
//! parses replies with the shared codec, and keeps a running journal of
//! results and counters for the CLI's statistics block and JSON export.
//! Higher-level operations - subtree walk, discovery sweep, periodic
//! polling - are composed from the single-shot requests.

use std::collections::{BTreeMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SnmpConfig;
use crate::error::Error;
use crate::db::Store;
use crate::models::NewMetric;
use crate::snmp::codec::{
    self, numeric_value, Pdu, PduKind, SnmpValue, SnmpVersion, Varbind,
};
use crate::snmp::oids;

/// Delay between attempts of a retried GET.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Pause between walk iterations, so a walk does not read as a flood.
const WALK_PAUSE: Duration = Duration::from_millis(10);

/// Running counters across all operations of one prober.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeStats {
    pub sent: u64,
    pub received: u64,
    pub timeouts: u64,
    pub errors: u64,
}

/// Outcome of a single probe operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub timestamp: DateTime<Utc>,
    pub target: String,
    /// Operation name (GET, SET, GETNEXT, GETBULK, TRAP).
    pub op: String,
    pub community: String,
    pub success: bool,
    /// End-to-end duration in seconds, including retries.
    pub response_time: Option<f64>,
    /// Rendered varbind values keyed by OID.
    pub values: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl ProbeResult {
    fn new(target: IpAddr, op: &str, community: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            target: target.to_string(),
            op: op.to_string(),
            community: community.to_string(),
            success: false,
            response_time: None,
            values: BTreeMap::new(),
            error: None,
        }
    }
}

/// Value for a SET varbind, typed by runtime inspection of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetValue {
    Int(i64),
    Text(String),
}

impl SetValue {
    /// Integral inputs become INTEGER, everything else OCTET STRING.
    pub fn infer(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(v) => SetValue::Int(v),
            Err(_) => SetValue::Text(raw.to_string()),
        }
    }

    fn to_snmp(&self) -> SnmpValue {
        match self {
            SetValue::Int(v) => SnmpValue::Integer(*v),
            SetValue::Text(s) => SnmpValue::OctetString(s.clone().into_bytes()),
        }
    }
}

/// SNMP request engine. One prober carries the community, timeout,
/// retry count and ports for all operations it performs.
#[derive(Debug)]
pub struct Prober {
    community: String,
    timeout: Duration,
    retries: u32,
    port: u16,
    trap_port: u16,
    started: Instant,
    stats: Mutex<ProbeStats>,
    results: Mutex<Vec<ProbeResult>>,
}

// recover from a panicked holder rather than cascading the poison
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Prober {
    pub fn new(config: &SnmpConfig) -> Self {
        Self {
            community: config.community.clone(),
            timeout: Duration::from_secs_f64(config.timeout_s),
            retries: config.retries,
            port: config.port,
            trap_port: config.trap_port,
            started: Instant::now(),
            stats: Mutex::new(ProbeStats::default()),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn stats(&self) -> ProbeStats {
        lock(&self.stats).clone()
    }

    fn record(&self, result: ProbeResult) -> ProbeResult {
        lock(&self.results).push(result.clone());
        result
    }

    fn next_request_id() -> i32 {
        rand::random::<u16>() as i32
    }

    fn open_socket(&self, target: IpAddr, port: u16) -> std::io::Result<UdpSocket> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.connect((target, port))?;
        Ok(socket)
    }

    /// Send a request and wait one timeout for a decodable reply.
    /// Returns `Ok(None)` on timeout.
    fn exchange(&self, socket: &UdpSocket, frame: &[u8]) -> std::io::Result<Option<Pdu>> {
        lock(&self.stats).sent += 1;
        socket.send(frame)?;

        let mut buf = vec![0u8; 65535];
        match socket.recv(&mut buf) {
            Ok(len) => match codec::decode_message(&buf[..len]) {
                Ok(msg) => {
                    lock(&self.stats).received += 1;
                    Ok(msg.pdu)
                }
                Err(e) => {
                    debug!("undecodable reply: {}", e);
                    Ok(None)
                }
            },
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // ==================== GET ====================

    /// SNMP GET with one varbind per OID. Retries with a fixed
    /// inter-attempt delay; the per-attempt timeout is the configured one.
    pub fn get(&self, target: IpAddr, oids: &[String]) -> ProbeResult {
        self.get_with_retries(target, oids, self.retries)
    }

    pub fn get_with_retries(&self, target: IpAddr, oids: &[String], retries: u32) -> ProbeResult {
        debug!("GET {} oids={}", target, oids.len());
        let mut result = ProbeResult::new(target, "GET", &self.community);

        let pdu = Pdu::Request {
            kind: PduKind::Get,
            request_id: Self::next_request_id(),
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|o| Varbind::null(o.as_str())).collect(),
        };
        let frame = codec::encode_community_message(SnmpVersion::V2c, &self.community, &pdu);

        let start = Instant::now();
        let reply = (|| -> std::io::Result<Option<Pdu>> {
            let socket = self.open_socket(target, self.port)?;
            for attempt in 0..=retries {
                if let Some(pdu) = self.exchange(&socket, &frame)? {
                    return Ok(Some(pdu));
                }
                if attempt < retries {
                    debug!("retry {}/{} for {}", attempt + 1, retries, target);
                    std::thread::sleep(RETRY_DELAY);
                }
            }
            Ok(None)
        })();
        result.response_time = Some(start.elapsed().as_secs_f64());

        match reply {
            Ok(Some(pdu)) => {
                result.success = true;
                for vb in pdu.varbinds() {
                    result.values.insert(vb.oid.clone(), vb.value.render());
                }
                if let Some(status) = pdu.error_status().filter(|s| *s != 0) {
                    result.error = Some(Error::Snmp(status).to_string());
                    lock(&self.stats).errors += 1;
                }
            }
            Ok(None) => {
                lock(&self.stats).timeouts += 1;
                result.error = Some(Error::Timeout.to_string());
                warn!("no reply from {}", target);
            }
            Err(e) => {
                lock(&self.stats).errors += 1;
                result.error = Some(e.to_string());
                warn!("GET to {} failed: {}", target, e);
            }
        }

        self.record(result)
    }

    // ==================== SET ====================

    /// SNMP SET. Single attempt; succeeds iff the agent reports error
    /// status zero.
    pub fn set(&self, target: IpAddr, oid_values: &[(String, SetValue)]) -> ProbeResult {
        debug!("SET {} varbinds={}", target, oid_values.len());
        let mut result = ProbeResult::new(target, "SET", &self.community);

        let pdu = Pdu::Request {
            kind: PduKind::Set,
            request_id: Self::next_request_id(),
            error_status: 0,
            error_index: 0,
            varbinds: oid_values
                .iter()
                .map(|(oid, v)| Varbind::new(oid.clone(), v.to_snmp()))
                .collect(),
        };
        let frame = codec::encode_community_message(SnmpVersion::V2c, &self.community, &pdu);

        let start = Instant::now();
        let reply = self
            .open_socket(target, self.port)
            .and_then(|socket| self.exchange(&socket, &frame));
        result.response_time = Some(start.elapsed().as_secs_f64());

        match reply {
            Ok(Some(pdu)) => match pdu.error_status() {
                Some(0) | None => result.success = true,
                Some(status) => {
                    result.error = Some(Error::Snmp(status).to_string());
                    lock(&self.stats).errors += 1;
                }
            },
            Ok(None) => {
                lock(&self.stats).timeouts += 1;
                result.error = Some(Error::Timeout.to_string());
            }
            Err(e) => {
                lock(&self.stats).errors += 1;
                result.error = Some(e.to_string());
            }
        }

        self.record(result)
    }

    // ==================== GETNEXT walk ====================

    /// Iterative GETNEXT walk from `start_oid`. The cursor advances to
    /// each returned OID and the walk stops after `max_repetitions`
    /// steps, on a missed reply, or as soon as the agent leaves the
    /// subtree of `start_oid`.
    pub fn getnext_walk(
        &self,
        target: IpAddr,
        start_oid: &str,
        max_repetitions: u32,
    ) -> ProbeResult {
        debug!("GETNEXT walk {} from {}", target, start_oid);
        let mut result = ProbeResult::new(target, "GETNEXT", &self.community);

        let start = Instant::now();
        let outcome = (|| -> std::io::Result<()> {
            let socket = self.open_socket(target, self.port)?;
            let mut current = start_oid.to_string();

            for _ in 0..max_repetitions {
                let pdu = Pdu::Request {
                    kind: PduKind::GetNext,
                    request_id: Self::next_request_id(),
                    error_status: 0,
                    error_index: 0,
                    varbinds: vec![Varbind::null(current.as_str())],
                };
                let frame =
                    codec::encode_community_message(SnmpVersion::V2c, &self.community, &pdu);

                let Some(reply) = self.exchange(&socket, &frame)? else {
                    break;
                };
                let Some(vb) = reply.varbinds().first() else {
                    break;
                };
                if vb.value == SnmpValue::EndOfMibView {
                    break;
                }
                if !oids::in_subtree(&vb.oid, start_oid) {
                    break;
                }

                result.values.insert(vb.oid.clone(), vb.value.render());
                current = vb.oid.clone();
                std::thread::sleep(WALK_PAUSE);
            }
            Ok(())
        })();
        result.response_time = Some(start.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                result.success = !result.values.is_empty();
                info!(
                    "walk of {} finished: {} OIDs",
                    target,
                    result.values.len()
                );
            }
            Err(e) => {
                lock(&self.stats).errors += 1;
                result.error = Some(e.to_string());
            }
        }

        self.record(result)
    }

    // ==================== GETBULK ====================

    /// SNMPv2c GETBULK. Single attempt; collects every returned varbind.
    pub fn getbulk(
        &self,
        target: IpAddr,
        oids: &[String],
        non_repeaters: i64,
        max_repetitions: i64,
    ) -> ProbeResult {
        debug!("GETBULK {} oids={}", target, oids.len());
        let mut result = ProbeResult::new(target, "GETBULK", &self.community);

        let pdu = Pdu::Bulk {
            request_id: Self::next_request_id(),
            non_repeaters,
            max_repetitions,
            varbinds: oids.iter().map(|o| Varbind::null(o.as_str())).collect(),
        };
        let frame = codec::encode_community_message(SnmpVersion::V2c, &self.community, &pdu);

        let start = Instant::now();
        let reply = self
            .open_socket(target, self.port)
            .and_then(|socket| self.exchange(&socket, &frame));
        result.response_time = Some(start.elapsed().as_secs_f64());

        match reply {
            Ok(Some(pdu)) => {
                result.success = true;
                for vb in pdu.varbinds() {
                    result.values.insert(vb.oid.clone(), vb.value.render());
                }
            }
            Ok(None) => {
                lock(&self.stats).timeouts += 1;
                result.error = Some(Error::Timeout.to_string());
            }
            Err(e) => {
                lock(&self.stats).errors += 1;
                result.error = Some(e.to_string());
            }
        }

        self.record(result)
    }

    // ==================== TRAP ====================

    /// Send an SNMPv2c trap. Fire-and-forget: success means the datagram
    /// left the socket. The standard sysUpTime.0 and snmpTrapOID.0
    /// varbinds are prepended to the caller's.
    pub fn trap(
        &self,
        target: IpAddr,
        enterprise_oid: &str,
        varbinds: &[(String, String)],
    ) -> ProbeResult {
        debug!("TRAP to {} enterprise={}", target, enterprise_oid);
        let mut result = ProbeResult::new(target, "TRAP", &self.community);

        let uptime_ticks = (self.started.elapsed().as_millis() / 10) as u32;
        let mut vbs = vec![
            Varbind::new(oids::SYS_UPTIME, SnmpValue::TimeTicks(uptime_ticks)),
            Varbind::new(
                oids::SNMP_TRAP_OID,
                SnmpValue::Oid(enterprise_oid.to_string()),
            ),
        ];
        for (oid, value) in varbinds {
            let oid: &str = oids::lookup(oid).unwrap_or(oid.as_str());
            vbs.push(Varbind::new(
                oid.to_string(),
                SnmpValue::OctetString(value.clone().into_bytes()),
            ));
        }

        let pdu = Pdu::Request {
            kind: PduKind::TrapV2,
            request_id: Self::next_request_id(),
            error_status: 0,
            error_index: 0,
            varbinds: vbs,
        };
        let frame = codec::encode_community_message(SnmpVersion::V2c, &self.community, &pdu);

        match self
            .open_socket(target, self.trap_port)
            .and_then(|socket| socket.send(&frame))
        {
            Ok(_) => {
                lock(&self.stats).sent += 1;
                result.success = true;
                info!("trap sent to {}", target);
            }
            Err(e) => {
                lock(&self.stats).errors += 1;
                result.error = Some(e.to_string());
                warn!("trap to {} failed: {}", target, e);
            }
        }

        self.record(result)
    }

    // ==================== Discovery ====================

    /// Sweep the host range of a network with one-shot sysDescr GETs,
    /// `worker_count` workers in parallel and zero retries. Returns the
    /// responding addresses in octet order.
    pub fn discovery_scan(
        &self,
        network: Ipv4Network,
        worker_count: usize,
        cancel: &AtomicBool,
    ) -> Vec<Ipv4Addr> {
        let hosts = host_range(network);
        let total = hosts.len();
        info!("discovery sweep of {} ({} hosts)", network, total);

        let queue = Mutex::new(hosts.into_iter().collect::<VecDeque<_>>());
        let active = Mutex::new(Vec::new());
        let sys_descr = [oids::SYS_DESCR.to_string()];

        std::thread::scope(|scope| {
            for _ in 0..worker_count.max(1) {
                scope.spawn(|| loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let Some(ip) = lock(&queue).pop_front() else {
                        break;
                    };
                    let result = self.get_with_retries(IpAddr::V4(ip), &sys_descr, 0);
                    if result.success {
                        info!("SNMP agent found: {}", ip);
                        lock(&active).push(ip);
                    }
                });
            }
        });

        let mut found = lock(&active).clone();
        found.sort();
        info!("discovery finished: {} active hosts", found.len());
        found
    }

    // ==================== Polling ====================

    /// Poll `oids` on `target` every `interval` until `duration` elapses
    /// or `cancel` is raised. The cycle's own wall-clock time is
    /// subtracted from the sleep, floored at zero. With a store attached,
    /// every successful cycle inserts one metric row per returned
    /// varbind.
    pub async fn poll(
        &self,
        target: IpAddr,
        poll_oids: &[String],
        interval: Duration,
        duration: Duration,
        store: Option<&Store>,
        cancel: &AtomicBool,
    ) -> Result<u64> {
        info!(
            "polling {} every {:?} for {:?} ({} OIDs)",
            target,
            interval,
            duration,
            poll_oids.len()
        );

        let started = Instant::now();
        let mut polls = 0u64;

        while started.elapsed() < duration && !cancel.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let result = self.get(target, poll_oids);
            polls += 1;

            if result.success {
                info!("poll #{}: {} values", polls, result.values.len());
                if let Some(store) = store {
                    self.persist_poll(store, target, &result).await?;
                }
            } else {
                warn!(
                    "poll #{} failed: {}",
                    polls,
                    result.error.as_deref().unwrap_or("unknown")
                );
            }

            let sleep = interval.saturating_sub(cycle_start.elapsed());
            if !sleep.is_zero() {
                tokio::time::sleep(sleep).await;
            }
        }

        info!("polling finished after {} cycles", polls);
        Ok(polls)
    }

    async fn persist_poll(&self, store: &Store, target: IpAddr, result: &ProbeResult) -> Result<()> {
        let source_ip = target.to_string();
        let device_id = store
            .device_id_by_ip(&source_ip)
            .await
            .context("device lookup failed")?;
        let latency_ms = result.response_time.map(|s| (s * 1000.0) as i64);

        for (oid, value) in &result.values {
            store
                .insert_metric(&NewMetric {
                    ts: result.timestamp,
                    source_ip: source_ip.clone(),
                    device_id,
                    oid: oid.clone(),
                    value_raw: value.clone(),
                    value_num: numeric_value(value),
                    latency_ms,
                })
                .await
                .context("metric insert failed")?;
        }
        Ok(())
    }

    // ==================== Reporting ====================

    /// Write `{statistics, results}` as pretty JSON.
    pub fn export_results(&self, path: &Path) -> Result<()> {
        let results = lock(&self.results).clone();
        let export = serde_json::json!({
            "statistics": self.stats(),
            "results": results,
        });
        let body = serde_json::to_string_pretty(&export)?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("results exported to {}", path.display());
        Ok(())
    }

    /// Multi-line statistics block for the CLI.
    pub fn statistics_report(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "sent: {}\nreceived: {}\ntimeouts: {}\nerrors: {}\n",
            stats.sent, stats.received, stats.timeouts, stats.errors
        );
        if stats.sent > 0 {
            out.push_str(&format!(
                "success rate: {:.1}%\n",
                stats.received as f64 / stats.sent as f64 * 100.0
            ));
        }
        let times: Vec<f64> = lock(&self.results)
            .iter()
            .filter_map(|r| r.response_time)
            .collect();
        if !times.is_empty() {
            let avg = times.iter().sum::<f64>() / times.len() as f64;
            let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = times.iter().cloned().fold(0.0f64, f64::max);
            out.push_str(&format!(
                "response time avg/min/max: {:.1}ms / {:.1}ms / {:.1}ms\n",
                avg * 1000.0,
                min * 1000.0,
                max * 1000.0
            ));
        }
        out
    }
}

/// Host addresses of a network, excluding the network and broadcast
/// addresses for prefixes shorter than /31.
fn host_range(network: Ipv4Network) -> Vec<Ipv4Addr> {
    let all: Vec<Ipv4Addr> = network.iter().collect();
    if network.prefix() >= 31 || all.len() <= 2 {
        all
    } else {
        all[1..all.len() - 1].to_vec()
    }
}
