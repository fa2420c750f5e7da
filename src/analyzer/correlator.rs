//! Request/response correlation.
//!
//! Keeps a table of pending requests keyed by the ordered
//! (requester, responder) address pair. A RESPONSE from B to A matches
//! the entry inserted for the request from A to B; the key direction
//! matters so bidirectional agents cannot correlate unrelated traffic.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::DecodedPacket;
use crate::snmp::PduKind;

/// Pending entries older than this are dropped by the cleanup task;
/// there is no retroactive correlation.
pub const PENDING_TTL: Duration = Duration::from_secs(30);

/// Interval between cleanup sweeps.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Pending-request table shared between the pipeline and the cleanup task.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Mutex<HashMap<(IpAddr, IpAddr), DateTime<Utc>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded packet through the table. Requests upsert their
    /// (src, dst) entry; a RESPONSE consumes the reverse entry and gains
    /// a `response_time`. A response seen before its request (reorder)
    /// matches nothing and stays latency-free.
    pub fn observe(&self, packet: &mut DecodedPacket) {
        if packet.pdu_kind.is_request() {
            self.lock()
                .insert((packet.source_ip, packet.dest_ip), packet.timestamp);
        } else if packet.pdu_kind == PduKind::Response {
            let key = (packet.dest_ip, packet.source_ip);
            if let Some(requested_at) = self.lock().remove(&key) {
                packet.response_time = (packet.timestamp - requested_at).to_std().ok();
            }
        }
    }

    /// Drop entries older than `PENDING_TTL` relative to `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now
            - chrono::Duration::from_std(PENDING_TTL).unwrap_or(chrono::Duration::seconds(30));
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, requested_at| *requested_at > cutoff);
        let removed = before - pending.len();
        if removed > 0 {
            debug!("expired {} pending requests", removed);
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(IpAddr, IpAddr), DateTime<Utc>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
