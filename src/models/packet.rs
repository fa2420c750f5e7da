//! Decoded packet - the transient record a captured SNMP datagram
//! becomes on its way through the pipeline.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::snmp::{PduKind, SnmpMessage, SnmpVersion, Varbind};

/// One decoded SNMP datagram plus its transport context.
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    pub timestamp: DateTime<Utc>,
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub source_port: u16,
    pub dest_port: u16,
    pub version: SnmpVersion,
    pub community_or_user: String,
    pub pdu_kind: PduKind,
    pub oids: Vec<Varbind>,
    /// TRAPv1 enterprise OID.
    pub enterprise_oid: Option<String>,
    /// Error status for the PDU layouts that carry one.
    pub error_status: Option<i64>,
    /// Captured frame length in bytes.
    pub packet_size: usize,
    /// Filled by the correlator when a matching request was seen.
    pub response_time: Option<Duration>,
}

impl DecodedPacket {
    /// Build from a decoded message and the datagram's transport 5-tuple.
    pub fn from_message(
        msg: SnmpMessage,
        timestamp: DateTime<Utc>,
        source_ip: IpAddr,
        dest_ip: IpAddr,
        source_port: u16,
        dest_port: u16,
        packet_size: usize,
    ) -> Self {
        let (pdu_kind, oids, enterprise_oid, error_status) = match msg.pdu {
            Some(pdu) => (
                pdu.kind(),
                pdu.varbinds().to_vec(),
                pdu.enterprise_oid().map(str::to_string),
                pdu.error_status(),
            ),
            // encrypted v3 payload: recorded opaquely
            None => (PduKind::Unknown, Vec::new(), None, None),
        };

        Self {
            timestamp,
            source_ip,
            dest_ip,
            source_port,
            dest_port,
            version: msg.version,
            community_or_user: msg.identity,
            pdu_kind,
            oids,
            enterprise_oid,
            error_status,
            packet_size,
            response_time: None,
        }
    }

    pub fn latency_ms(&self) -> Option<i64> {
        self.response_time.map(|d| d.as_millis() as i64)
    }

    /// Serialize varbinds as `oid:value` pairs joined by `;`.
    pub fn varbinds_serialized(&self) -> String {
        self.oids
            .iter()
            .map(|vb| format!("{}:{}", vb.oid, vb.value.render()))
            .collect::<Vec<_>>()
            .join(";")
    }
}
