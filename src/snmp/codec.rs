//! SNMP message codec.
//!
//! Decodes raw UDP payloads into an [`SnmpMessage`] and encodes
//! community-based (v1/v2c) messages back to bytes. The same codec feeds
//! the passive capture pipeline and parses the probe's replies, so a PDU
//! built here always round-trips through its own decoder.
//!
//! SNMPv3 handling is deliberately shallow: the message header and USM
//! security parameters are parsed for the user identity and auth/priv
//! flags, but an encrypted scoped PDU is recorded opaquely.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::DecodeError;
use crate::snmp::ber::{self, BerReader};

type Result<T> = std::result::Result<T, DecodeError>;

/// SNMP protocol version, as carried in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            0 => Ok(SnmpVersion::V1),
            1 => Ok(SnmpVersion::V2c),
            3 => Ok(SnmpVersion::V3),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    pub fn wire_value(self) -> i64 {
        match self {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
            SnmpVersion::V3 => 3,
        }
    }
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpVersion::V1 => write!(f, "v1"),
            SnmpVersion::V2c => write!(f, "v2c"),
            SnmpVersion::V3 => write!(f, "v3"),
        }
    }
}

// PDU tags (RFC 1157 / RFC 1905)
pub const PDU_GET: u8 = 0xa0;
pub const PDU_GETNEXT: u8 = 0xa1;
pub const PDU_RESPONSE: u8 = 0xa2;
pub const PDU_SET: u8 = 0xa3;
pub const PDU_TRAP_V1: u8 = 0xa4;
pub const PDU_GETBULK: u8 = 0xa5;
pub const PDU_TRAP_V2: u8 = 0xa7;

/// Kind of SNMP operation a PDU carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    Get,
    GetNext,
    Response,
    Set,
    TrapV1,
    GetBulk,
    TrapV2,
    Unknown,
}

impl PduKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            PDU_GET => PduKind::Get,
            PDU_GETNEXT => PduKind::GetNext,
            PDU_RESPONSE => PduKind::Response,
            PDU_SET => PduKind::Set,
            PDU_TRAP_V1 => PduKind::TrapV1,
            PDU_GETBULK => PduKind::GetBulk,
            PDU_TRAP_V2 => PduKind::TrapV2,
            _ => PduKind::Unknown,
        }
    }

    /// True for the four request kinds the correlator tracks.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            PduKind::Get | PduKind::GetNext | PduKind::GetBulk | PduKind::Set
        )
    }

    pub fn is_trap(self) -> bool {
        matches!(self, PduKind::TrapV1 | PduKind::TrapV2)
    }
}

impl fmt::Display for PduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PduKind::Get => "GET",
            PduKind::GetNext => "GETNEXT",
            PduKind::Response => "RESPONSE",
            PduKind::Set => "SET",
            PduKind::TrapV1 => "TRAPv1",
            PduKind::GetBulk => "GETBULK",
            PduKind::TrapV2 => "TRAPv2",
            PduKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A varbind value, tagged with its ASN.1 nature so rendering and numeric
/// extraction can be exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    OctetString(Vec<u8>),
    Oid(String),
    IpAddress(Ipv4Addr),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Opaque(Vec<u8>),
}

impl SnmpValue {
    /// Textual rendering, as stored in `value_raw`.
    pub fn render(&self) -> String {
        match self {
            SnmpValue::Integer(v) => v.to_string(),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                v.to_string()
            }
            SnmpValue::Counter64(v) => v.to_string(),
            SnmpValue::OctetString(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(_) => render_hex(bytes),
            },
            SnmpValue::Oid(oid) => oid.clone(),
            SnmpValue::IpAddress(addr) => addr.to_string(),
            SnmpValue::Null => "null".to_string(),
            SnmpValue::NoSuchObject => "noSuchObject".to_string(),
            SnmpValue::NoSuchInstance => "noSuchInstance".to_string(),
            SnmpValue::EndOfMibView => "endOfMibView".to_string(),
            SnmpValue::Opaque(bytes) => render_hex(bytes),
        }
    }

    /// True when the value is an actual observation rather than a NULL
    /// placeholder or a v2c exception sentinel.
    pub fn is_concrete(&self) -> bool {
        !matches!(
            self,
            SnmpValue::Null
                | SnmpValue::NoSuchObject
                | SnmpValue::NoSuchInstance
                | SnmpValue::EndOfMibView
        )
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            SnmpValue::Integer(v) => ber::encode_integer(*v),
            SnmpValue::Counter32(v) => ber::encode_unsigned(ber::TAG_COUNTER32, *v as u64),
            SnmpValue::Gauge32(v) => ber::encode_unsigned(ber::TAG_GAUGE32, *v as u64),
            SnmpValue::TimeTicks(v) => ber::encode_unsigned(ber::TAG_TIMETICKS, *v as u64),
            SnmpValue::Counter64(v) => ber::encode_unsigned(ber::TAG_COUNTER64, *v),
            SnmpValue::OctetString(bytes) => ber::encode_octet_string(bytes),
            SnmpValue::Oid(oid) => ber::encode_oid(oid).unwrap_or_else(ber::encode_null),
            SnmpValue::IpAddress(addr) => ber::encode_ip(*addr),
            SnmpValue::Null => ber::encode_null(),
            SnmpValue::NoSuchObject => ber::wrap(ber::TAG_NO_SUCH_OBJECT, &[]),
            SnmpValue::NoSuchInstance => ber::wrap(ber::TAG_NO_SUCH_INSTANCE, &[]),
            SnmpValue::EndOfMibView => ber::wrap(ber::TAG_END_OF_MIB_VIEW, &[]),
            SnmpValue::Opaque(bytes) => ber::wrap(ber::TAG_OPAQUE, bytes),
        }
    }

    fn decode(tag: u8, content: &[u8]) -> Result<Self> {
        Ok(match tag {
            ber::TAG_INTEGER => SnmpValue::Integer(ber::decode_integer(content)?),
            ber::TAG_COUNTER32 => SnmpValue::Counter32(decode_u32(content)?),
            ber::TAG_GAUGE32 => SnmpValue::Gauge32(decode_u32(content)?),
            ber::TAG_TIMETICKS => SnmpValue::TimeTicks(decode_u32(content)?),
            ber::TAG_COUNTER64 => SnmpValue::Counter64(ber::decode_unsigned(content)?),
            ber::TAG_OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
            ber::TAG_OID => SnmpValue::Oid(ber::decode_oid(content)?),
            ber::TAG_IP_ADDRESS => {
                if content.len() != 4 {
                    return Err(DecodeError::Malformed);
                }
                SnmpValue::IpAddress(Ipv4Addr::new(
                    content[0], content[1], content[2], content[3],
                ))
            }
            ber::TAG_NULL => SnmpValue::Null,
            ber::TAG_NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
            ber::TAG_NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
            ber::TAG_END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
            _ => SnmpValue::Opaque(content.to_vec()),
        })
    }
}

fn decode_u32(content: &[u8]) -> Result<u32> {
    let v = ber::decode_unsigned(content)?;
    u32::try_from(v).map_err(|_| DecodeError::Malformed)
}

fn render_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Extract a numeric reading from a rendered value.
///
/// Populated iff the text parses as a finite decimal number; thousands
/// separators are not recognized.
pub fn numeric_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A single (OID, value) pair from a varbind list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: String,
    pub value: SnmpValue,
}

impl Varbind {
    pub fn new(oid: impl Into<String>, value: SnmpValue) -> Self {
        Self {
            oid: oid.into(),
            value,
        }
    }

    /// A request varbind: OID with a NULL placeholder value.
    pub fn null(oid: impl Into<String>) -> Self {
        Self::new(oid, SnmpValue::Null)
    }
}

/// Decoded PDU body.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    /// GET / GETNEXT / RESPONSE / SET / TRAPv2 (all share this layout).
    Request {
        kind: PduKind,
        request_id: i32,
        error_status: i64,
        error_index: i64,
        varbinds: Vec<Varbind>,
    },
    /// GETBULK: error fields are repurposed as repetition controls.
    Bulk {
        request_id: i32,
        non_repeaters: i64,
        max_repetitions: i64,
        varbinds: Vec<Varbind>,
    },
    /// SNMPv1 trap with its dedicated header.
    TrapV1 {
        enterprise: String,
        agent_addr: Ipv4Addr,
        generic_trap: i64,
        specific_trap: i64,
        time_stamp: u32,
        varbinds: Vec<Varbind>,
    },
    /// Unrecognized PDU tag; contents are skipped.
    Unknown { tag: u8 },
}

impl Pdu {
    pub fn kind(&self) -> PduKind {
        match self {
            Pdu::Request { kind, .. } => *kind,
            Pdu::Bulk { .. } => PduKind::GetBulk,
            Pdu::TrapV1 { .. } => PduKind::TrapV1,
            Pdu::Unknown { .. } => PduKind::Unknown,
        }
    }

    pub fn varbinds(&self) -> &[Varbind] {
        match self {
            Pdu::Request { varbinds, .. }
            | Pdu::Bulk { varbinds, .. }
            | Pdu::TrapV1 { varbinds, .. } => varbinds,
            Pdu::Unknown { .. } => &[],
        }
    }

    pub fn error_status(&self) -> Option<i64> {
        match self {
            Pdu::Request { error_status, .. } => Some(*error_status),
            _ => None,
        }
    }

    pub fn enterprise_oid(&self) -> Option<&str> {
        match self {
            Pdu::TrapV1 { enterprise, .. } => Some(enterprise),
            _ => None,
        }
    }
}

/// SNMPv3 header fields recorded for profile metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Header {
    pub msg_id: i64,
    pub security_model: i64,
    pub auth: bool,
    pub privacy: bool,
}

/// A decoded SNMP message: version, community or USM user, and PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpMessage {
    pub version: SnmpVersion,
    /// Community string (v1/v2c) or `msgUserName` (v3), lossily decoded.
    pub identity: String,
    /// `None` when a v3 scoped PDU is encrypted.
    pub pdu: Option<Pdu>,
    pub v3: Option<V3Header>,
}

// ==================== Decoding ====================

/// Decode a raw UDP payload as an SNMP message.
pub fn decode_message(payload: &[u8]) -> Result<SnmpMessage> {
    let mut outer = BerReader::new(payload);
    let mut msg = outer.enter(ber::TAG_SEQUENCE)?;

    let version = SnmpVersion::from_wire(msg.read_integer()?)?;
    match version {
        SnmpVersion::V1 | SnmpVersion::V2c => {
            let community = String::from_utf8_lossy(msg.read_octet_string()?).into_owned();
            let pdu = decode_pdu(&mut msg)?;
            Ok(SnmpMessage {
                version,
                identity: community,
                pdu: Some(pdu),
                v3: None,
            })
        }
        SnmpVersion::V3 => decode_v3(&mut msg),
    }
}

fn decode_v3(msg: &mut BerReader<'_>) -> Result<SnmpMessage> {
    // msgGlobalData: msgID, msgMaxSize, msgFlags, msgSecurityModel
    let mut global = msg.enter(ber::TAG_SEQUENCE)?;
    let msg_id = global.read_integer()?;
    let _msg_max_size = global.read_integer()?;
    let flags = global.read_octet_string()?;
    let flags = flags.first().copied().unwrap_or(0);
    let security_model = global.read_integer()?;

    let auth = flags & 0x01 != 0;
    let privacy = flags & 0x02 != 0;

    // msgSecurityParameters is an OCTET STRING; for USM (model 3) it wraps
    // a BER sequence carrying the user name in position four
    let sec_params = msg.read_octet_string()?;
    let user = if security_model == 3 {
        decode_usm_user(sec_params)?
    } else {
        String::new()
    };

    // scopedPDU: plaintext unless the priv flag is set; no decryption here
    let pdu = if privacy {
        None
    } else {
        let mut scoped = msg.enter(ber::TAG_SEQUENCE)?;
        let _context_engine_id = scoped.read_octet_string()?;
        let _context_name = scoped.read_octet_string()?;
        Some(decode_pdu(&mut scoped)?)
    };

    Ok(SnmpMessage {
        version: SnmpVersion::V3,
        identity: user,
        pdu,
        v3: Some(V3Header {
            msg_id,
            security_model,
            auth,
            privacy,
        }),
    })
}

fn decode_usm_user(params: &[u8]) -> Result<String> {
    let mut outer = BerReader::new(params);
    let mut usm = outer.enter(ber::TAG_SEQUENCE)?;
    let _engine_id = usm.read_octet_string()?;
    let _engine_boots = usm.read_integer()?;
    let _engine_time = usm.read_integer()?;
    let user = usm.read_octet_string()?;
    Ok(String::from_utf8_lossy(user).into_owned())
}

fn decode_pdu(msg: &mut BerReader<'_>) -> Result<Pdu> {
    let (tag, content) = msg.read_tlv()?;
    let mut body = BerReader::new(content);

    match PduKind::from_tag(tag) {
        PduKind::Get
        | PduKind::GetNext
        | PduKind::Response
        | PduKind::Set
        | PduKind::TrapV2 => {
            let request_id = body.read_integer()? as i32;
            let error_status = body.read_integer()?;
            let error_index = body.read_integer()?;
            let varbinds = decode_varbinds(&mut body)?;
            Ok(Pdu::Request {
                kind: PduKind::from_tag(tag),
                request_id,
                error_status,
                error_index,
                varbinds,
            })
        }
        PduKind::GetBulk => {
            let request_id = body.read_integer()? as i32;
            let non_repeaters = body.read_integer()?;
            let max_repetitions = body.read_integer()?;
            let varbinds = decode_varbinds(&mut body)?;
            Ok(Pdu::Bulk {
                request_id,
                non_repeaters,
                max_repetitions,
                varbinds,
            })
        }
        PduKind::TrapV1 => {
            let enterprise = body.read_oid()?;
            let (addr_tag, addr) = body.read_tlv()?;
            if addr_tag != ber::TAG_IP_ADDRESS || addr.len() != 4 {
                return Err(DecodeError::Malformed);
            }
            let agent_addr = Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]);
            let generic_trap = body.read_integer()?;
            let specific_trap = body.read_integer()?;
            let (ticks_tag, ticks) = body.read_tlv()?;
            if ticks_tag != ber::TAG_TIMETICKS && ticks_tag != ber::TAG_INTEGER {
                return Err(DecodeError::Malformed);
            }
            let time_stamp = decode_u32(ticks)?;
            let varbinds = decode_varbinds(&mut body)?;
            Ok(Pdu::TrapV1 {
                enterprise,
                agent_addr,
                generic_trap,
                specific_trap,
                time_stamp,
                varbinds,
            })
        }
        _ => Ok(Pdu::Unknown { tag }),
    }
}

fn decode_varbinds(body: &mut BerReader<'_>) -> Result<Vec<Varbind>> {
    let mut list = body.enter(ber::TAG_SEQUENCE)?;
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = list.enter(ber::TAG_SEQUENCE)?;
        let oid = vb.read_oid()?;
        let (tag, content) = vb.read_tlv()?;
        varbinds.push(Varbind::new(oid, SnmpValue::decode(tag, content)?));
    }
    Ok(varbinds)
}

// ==================== Encoding ====================

/// Encode a community-based (v1/v2c) message. The probe emits v2c for
/// every operation it supports.
pub fn encode_community_message(version: SnmpVersion, community: &str, pdu: &Pdu) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&ber::encode_integer(version.wire_value()));
    content.extend_from_slice(&ber::encode_octet_string(community.as_bytes()));
    content.extend_from_slice(&encode_pdu(pdu));
    ber::wrap(ber::TAG_SEQUENCE, &content)
}

fn encode_pdu(pdu: &Pdu) -> Vec<u8> {
    match pdu {
        Pdu::Request {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        } => {
            let tag = match kind {
                PduKind::Get => PDU_GET,
                PduKind::GetNext => PDU_GETNEXT,
                PduKind::Response => PDU_RESPONSE,
                PduKind::Set => PDU_SET,
                PduKind::TrapV2 => PDU_TRAP_V2,
                // remaining kinds use the other Pdu variants
                _ => PDU_GET,
            };
            let mut content = Vec::new();
            content.extend_from_slice(&ber::encode_integer(*request_id as i64));
            content.extend_from_slice(&ber::encode_integer(*error_status));
            content.extend_from_slice(&ber::encode_integer(*error_index));
            content.extend_from_slice(&encode_varbinds(varbinds));
            ber::wrap(tag, &content)
        }
        Pdu::Bulk {
            request_id,
            non_repeaters,
            max_repetitions,
            varbinds,
        } => {
            let mut content = Vec::new();
            content.extend_from_slice(&ber::encode_integer(*request_id as i64));
            content.extend_from_slice(&ber::encode_integer(*non_repeaters));
            content.extend_from_slice(&ber::encode_integer(*max_repetitions));
            content.extend_from_slice(&encode_varbinds(varbinds));
            ber::wrap(PDU_GETBULK, &content)
        }
        Pdu::TrapV1 {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        } => {
            let mut content = Vec::new();
            content.extend_from_slice(&ber::encode_oid(enterprise).unwrap_or_else(ber::encode_null));
            content.extend_from_slice(&ber::encode_ip(*agent_addr));
            content.extend_from_slice(&ber::encode_integer(*generic_trap));
            content.extend_from_slice(&ber::encode_integer(*specific_trap));
            content.extend_from_slice(&ber::encode_unsigned(
                ber::TAG_TIMETICKS,
                *time_stamp as u64,
            ));
            content.extend_from_slice(&encode_varbinds(varbinds));
            ber::wrap(PDU_TRAP_V1, &content)
        }
        Pdu::Unknown { tag } => ber::wrap(*tag, &[]),
    }
}

fn encode_varbinds(varbinds: &[Varbind]) -> Vec<u8> {
    let mut list = Vec::new();
    for vb in varbinds {
        let mut entry = Vec::new();
        entry.extend_from_slice(&ber::encode_oid(&vb.oid).unwrap_or_else(ber::encode_null));
        entry.extend_from_slice(&vb.value.encode());
        list.extend_from_slice(&ber::wrap(ber::TAG_SEQUENCE, &entry));
    }
    ber::wrap(ber::TAG_SEQUENCE, &list)
}
