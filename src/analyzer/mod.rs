//! Pipeline driver.
//!
//! Consumes captured datagrams, decodes them, runs correlation and
//! anomaly detection, persists traps/metrics/anomalies, and keeps the
//! live statistics. Storage failures are logged and counted; they never
//! stop the pipeline.

pub mod anomaly;
pub mod correlator;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::capture::CapturedDatagram;
use crate::config::AppConfig;
use crate::db::Store;
use crate::models::{CaptureStats, DecodedPacket, NewAnomaly, NewMetric, NewTrap};
use crate::snmp::codec::{self, numeric_value};
use crate::snmp::PduKind;

pub use anomaly::AnomalyDetector;
pub use correlator::Correlator;

/// Log a statistics snapshot every this many packets.
const STATS_EVERY: u64 = 10;

/// The passive analysis pipeline: codec → correlator → detector → store.
pub struct Pipeline {
    store: Option<Store>,
    correlator: Arc<Correlator>,
    detector: AnomalyDetector,
    stats: Mutex<CaptureStats>,
    /// Shared with the capture thread, which counts its own drops.
    dropped: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn new(config: &AppConfig, store: Option<Store>, dropped: Arc<AtomicU64>) -> Self {
        Self {
            store,
            correlator: Arc::new(Correlator::new()),
            detector: AnomalyDetector::new(&config.analysis),
            stats: Mutex::new(CaptureStats::default()),
            dropped,
        }
    }

    /// Handle to the pending-request table, for the cleanup task.
    pub fn correlator(&self) -> Arc<Correlator> {
        Arc::clone(&self.correlator)
    }

    /// Drain the capture channel until it closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<CapturedDatagram>) {
        while let Some(datagram) = rx.recv().await {
            self.handle_datagram(datagram).await;
        }
        self.log_final_stats();
    }

    /// Process one captured datagram end to end.
    pub async fn handle_datagram(&self, datagram: CapturedDatagram) {
        let message = match codec::decode_message(&datagram.payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(
                    "discarding frame from {}: {}",
                    datagram.source_ip, e
                );
                self.lock_stats().decode_errors += 1;
                return;
            }
        };

        let mut packet = DecodedPacket::from_message(
            message,
            datagram.timestamp,
            datagram.source_ip,
            datagram.dest_ip,
            datagram.source_port,
            datagram.dest_port,
            datagram.frame_len,
        );

        self.correlator.observe(&mut packet);

        debug!(
            "{} {}:{} -> {}:{} {} ({} bytes)",
            packet.pdu_kind,
            packet.source_ip,
            packet.source_port,
            packet.dest_ip,
            packet.dest_port,
            packet.version,
            packet.packet_size
        );

        let anomaly = self.detector.analyze(&packet);
        if let Some(anomaly) = &anomaly {
            warn!(
                "anomaly [{}/{}]: {}",
                anomaly.kind, anomaly.severity, anomaly.description
            );
        }

        self.persist(&packet, anomaly).await;

        let total = {
            let mut stats = self.lock_stats();
            stats.record(&packet);
            stats.total_packets
        };
        if total % STATS_EVERY == 0 {
            self.log_snapshot();
        }
    }

    async fn persist(&self, packet: &DecodedPacket, anomaly: Option<NewAnomaly>) {
        let Some(store) = &self.store else {
            return;
        };

        let device_id = match store.device_id_by_ip(&packet.source_ip.to_string()).await {
            Ok(id) => id,
            Err(e) => {
                warn!("device lookup failed: {}", e);
                None
            }
        };

        if packet.pdu_kind.is_trap() {
            let trap = NewTrap {
                ts: packet.timestamp,
                source_ip: packet.source_ip.to_string(),
                device_id,
                version: packet.version.to_string(),
                community_or_user: packet.community_or_user.clone(),
                enterprise_oid: packet.enterprise_oid.clone(),
                // placeholder until severity is derived from generic_trap
                severity: "info".to_string(),
                varbinds: packet.varbinds_serialized(),
            };
            if let Err(e) = store.insert_trap(&trap).await {
                error!("trap insert failed: {}", e);
                self.lock_stats().store_errors += 1;
            }
        } else if packet.pdu_kind == PduKind::Response {
            self.persist_response_metrics(store, packet, device_id).await;
        }

        if let Some(anomaly) = anomaly {
            if let Err(e) = store.insert_anomaly(&anomaly).await {
                error!("anomaly insert failed: {}", e);
                self.lock_stats().store_errors += 1;
            }
        }
    }

    /// Only RESPONSE varbinds become metrics, and only when the agent
    /// reported no error and the value is an actual observation.
    async fn persist_response_metrics(
        &self,
        store: &Store,
        packet: &DecodedPacket,
        device_id: Option<i64>,
    ) {
        if packet.error_status.is_some_and(|s| s != 0) {
            return;
        }
        let latency_ms = packet.latency_ms();
        for vb in packet.oids.iter().filter(|vb| vb.value.is_concrete()) {
            let value_raw = vb.value.render();
            let metric = NewMetric {
                ts: packet.timestamp,
                source_ip: packet.source_ip.to_string(),
                device_id,
                oid: vb.oid.clone(),
                value_num: numeric_value(&value_raw),
                value_raw,
                latency_ms,
            };
            if let Err(e) = store.insert_metric(&metric).await {
                error!("metric insert failed: {}", e);
                self.lock_stats().store_errors += 1;
            }
        }
    }

    pub fn stats_snapshot(&self) -> CaptureStats {
        let mut stats = self.lock_stats().clone();
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }

    fn log_snapshot(&self) {
        info!("stats: {}", self.stats_snapshot().summary());
    }

    pub fn log_final_stats(&self) {
        info!("final stats: {}", self.stats_snapshot().summary());
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, CaptureStats> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Background task pruning the correlator's pending table.
pub async fn run_cleanup(correlator: Arc<Correlator>) {
    let mut ticker = tokio::time::interval(correlator::CLEANUP_INTERVAL);
    // the first tick fires immediately; skip it
    ticker.tick().await;
    loop {
        ticker.tick().await;
        correlator.purge_expired(chrono::Utc::now());
    }
}
