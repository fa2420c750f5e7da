//! Unit tests for request/response correlation.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};

use snmpscope::analyzer::Correlator;
use snmpscope::models::DecodedPacket;
use snmpscope::snmp::{PduKind, SnmpVersion};

fn packet(kind: PduKind, src: &str, dst: &str, ts: DateTime<Utc>) -> DecodedPacket {
    DecodedPacket {
        timestamp: ts,
        source_ip: src.parse::<IpAddr>().expect("src"),
        dest_ip: dst.parse::<IpAddr>().expect("dst"),
        source_port: 50000,
        dest_port: 161,
        version: SnmpVersion::V2c,
        community_or_user: "public".to_string(),
        pdu_kind: kind,
        oids: vec![],
        enterprise_oid: None,
        error_status: Some(0),
        packet_size: 90,
        response_time: None,
    }
}

#[test]
fn test_matched_pair_yields_latency() {
    let correlator = Correlator::new();
    let t0 = Utc::now();

    let mut request = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", t0);
    correlator.observe(&mut request);
    assert_eq!(correlator.pending_count(), 1);

    let mut response = packet(
        PduKind::Response,
        "10.0.0.1",
        "10.0.0.5",
        t0 + Duration::milliseconds(42),
    );
    correlator.observe(&mut response);

    let latency = response.response_time.expect("latency");
    assert_eq!(latency.as_millis(), 42);
    assert_eq!(response.latency_ms(), Some(42));
    // the entry is consumed
    assert_eq!(correlator.pending_count(), 0);
}

#[test]
fn test_all_request_kinds_tracked() {
    let correlator = Correlator::new();
    let t0 = Utc::now();
    for (i, kind) in [PduKind::Get, PduKind::Set, PduKind::GetNext, PduKind::GetBulk]
        .into_iter()
        .enumerate()
    {
        let src = format!("10.0.1.{}", i + 1);
        let mut request = packet(kind, &src, "10.0.0.1", t0);
        correlator.observe(&mut request);
    }
    assert_eq!(correlator.pending_count(), 4);
}

#[test]
fn test_response_before_request_gets_no_latency() {
    let correlator = Correlator::new();
    let t0 = Utc::now();

    let mut response = packet(PduKind::Response, "10.0.0.1", "10.0.0.5", t0);
    correlator.observe(&mut response);
    assert!(response.response_time.is_none());

    // no retroactive correlation for the late-arriving request either
    let mut request = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", t0 + Duration::milliseconds(5));
    correlator.observe(&mut request);
    assert_eq!(correlator.pending_count(), 1);
}

#[test]
fn test_key_direction_matters() {
    let correlator = Correlator::new();
    let t0 = Utc::now();

    let mut request = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", t0);
    correlator.observe(&mut request);

    // a response flowing the same way as the request must not match
    let mut response = packet(
        PduKind::Response,
        "10.0.0.5",
        "10.0.0.1",
        t0 + Duration::milliseconds(10),
    );
    correlator.observe(&mut response);
    assert!(response.response_time.is_none());
    assert_eq!(correlator.pending_count(), 1);
}

#[test]
fn test_purge_drops_only_stale_entries() {
    let correlator = Correlator::new();
    let now = Utc::now();

    let mut stale = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", now - Duration::seconds(45));
    correlator.observe(&mut stale);
    let mut fresh = packet(PduKind::Get, "10.0.0.6", "10.0.0.1", now - Duration::seconds(5));
    correlator.observe(&mut fresh);

    let removed = correlator.purge_expired(now);
    assert_eq!(removed, 1);
    assert_eq!(correlator.pending_count(), 1);
}

#[test]
fn test_expired_entry_no_longer_matches() {
    let correlator = Correlator::new();
    let now = Utc::now();

    let mut request = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", now - Duration::seconds(40));
    correlator.observe(&mut request);
    correlator.purge_expired(now);

    let mut response = packet(PduKind::Response, "10.0.0.1", "10.0.0.5", now);
    correlator.observe(&mut response);
    assert!(response.response_time.is_none());
}

#[test]
fn test_request_upsert_refreshes_timestamp() {
    let correlator = Correlator::new();
    let t0 = Utc::now();

    let mut first = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", t0);
    correlator.observe(&mut first);
    let mut second = packet(PduKind::Get, "10.0.0.5", "10.0.0.1", t0 + Duration::seconds(1));
    correlator.observe(&mut second);
    assert_eq!(correlator.pending_count(), 1);

    let mut response = packet(
        PduKind::Response,
        "10.0.0.1",
        "10.0.0.5",
        t0 + Duration::milliseconds(1100),
    );
    correlator.observe(&mut response);
    // latency is measured from the most recent request
    assert_eq!(response.latency_ms(), Some(100));
}
