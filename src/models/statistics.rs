//! Live capture statistics.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::models::packet::DecodedPacket;
use crate::snmp::PduKind;

/// Counters maintained by the pipeline driver while capturing.
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub total_packets: u64,
    pub get_requests: u64,
    pub getnext_requests: u64,
    pub getbulk_requests: u64,
    pub set_requests: u64,
    pub get_responses: u64,
    pub traps: u64,
    pub unknown_pdus: u64,
    /// Packets carrying a non-zero SNMP error status.
    pub errors: u64,
    /// Frames rejected by the codec.
    pub decode_errors: u64,
    /// Rows lost to storage failures.
    pub store_errors: u64,
    /// Datagrams dropped on channel backpressure.
    pub dropped: u64,
    pub unique_sources: HashSet<IpAddr>,
    pub unique_destinations: HashSet<IpAddr>,
}

impl CaptureStats {
    /// Account for one decoded packet.
    pub fn record(&mut self, packet: &DecodedPacket) {
        self.total_packets += 1;
        self.unique_sources.insert(packet.source_ip);
        self.unique_destinations.insert(packet.dest_ip);

        match packet.pdu_kind {
            PduKind::Get => self.get_requests += 1,
            PduKind::GetNext => self.getnext_requests += 1,
            PduKind::GetBulk => self.getbulk_requests += 1,
            PduKind::Set => self.set_requests += 1,
            PduKind::Response => self.get_responses += 1,
            PduKind::TrapV1 | PduKind::TrapV2 => self.traps += 1,
            PduKind::Unknown => self.unknown_pdus += 1,
        }

        if packet.error_status.is_some_and(|s| s != 0) {
            self.errors += 1;
        }
    }

    /// One-line snapshot for periodic logging.
    pub fn summary(&self) -> String {
        format!(
            "total={} get={} getnext={} getbulk={} set={} responses={} traps={} \
             errors={} decode_errors={} store_errors={} dropped={} sources={} destinations={}",
            self.total_packets,
            self.get_requests,
            self.getnext_requests,
            self.getbulk_requests,
            self.set_requests,
            self.get_responses,
            self.traps,
            self.errors,
            self.decode_errors,
            self.store_errors,
            self.dropped,
            self.unique_sources.len(),
            self.unique_destinations.len(),
        )
    }
}
