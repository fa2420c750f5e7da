//! Unit tests for frame slicing in the capture source.

use chrono::Utc;
use etherparse::PacketBuilder;

use snmpscope::capture::slice_datagram;
use snmpscope::snmp::codec::{self, Pdu, PduKind, SnmpVersion, Varbind};

fn snmp_payload() -> Vec<u8> {
    codec::encode_community_message(
        SnmpVersion::V2c,
        "public",
        &Pdu::Request {
            kind: PduKind::Get,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![Varbind::null("1.3.6.1.2.1.1.1.0")],
        },
    )
}

#[test]
fn test_udp_frame_sliced() {
    let payload = snmp_payload();
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4([10, 0, 0, 5], [10, 0, 0, 1], 64)
        .udp(50000, 161);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).expect("build frame");

    let datagram = slice_datagram(&frame, Utc::now()).expect("sliced");
    assert_eq!(datagram.source_ip.to_string(), "10.0.0.5");
    assert_eq!(datagram.dest_ip.to_string(), "10.0.0.1");
    assert_eq!(datagram.source_port, 50000);
    assert_eq!(datagram.dest_port, 161);
    assert_eq!(datagram.frame_len, frame.len());
    assert_eq!(datagram.payload, payload);

    // the payload decodes with the message codec
    let msg = codec::decode_message(&datagram.payload).expect("decode");
    assert_eq!(msg.pdu.expect("pdu").kind(), PduKind::Get);
}

#[test]
fn test_non_udp_frame_ignored() {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4([10, 0, 0, 5], [10, 0, 0, 1], 64)
        .tcp(50000, 161, 0, 1024);
    let mut frame = Vec::new();
    builder.write(&mut frame, &[]).expect("build frame");

    assert!(slice_datagram(&frame, Utc::now()).is_none());
}

#[test]
fn test_garbage_frame_ignored() {
    assert!(slice_datagram(&[0x00, 0x01, 0x02], Utc::now()).is_none());
}
