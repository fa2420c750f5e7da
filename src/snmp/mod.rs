//! SNMP wire protocol support.
//!
//! `ber` holds the raw BER primitives, `codec` the message-level
//! encoder/decoder shared by the passive analyzer and the active probe,
//! `oids` the well-known OID tables, and `probe` the request engine.

pub mod ber;
pub mod codec;
pub mod oids;
pub mod probe;

pub use codec::{Pdu, PduKind, SnmpMessage, SnmpValue, SnmpVersion, Varbind};
pub use probe::{ProbeResult, ProbeStats, Prober};
