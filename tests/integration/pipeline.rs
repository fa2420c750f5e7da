//! Integration tests for the passive pipeline: decode → correlate →
//! detect → persist.

use std::net::IpAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use snmpscope::analyzer::Pipeline;
use snmpscope::capture::CapturedDatagram;
use snmpscope::config::AppConfig;
use snmpscope::db::Store;
use snmpscope::snmp::codec::{self, Pdu, PduKind, SnmpValue, SnmpVersion, Varbind};

async fn pipeline_with_store() -> (TempDir, Store, Pipeline) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("observations.db");
    let store = Store::open(path.to_str().expect("utf8 path"))
        .await
        .expect("open store");
    let pipeline = Pipeline::new(
        &AppConfig::default(),
        Some(store.clone()),
        Arc::new(AtomicU64::new(0)),
    );
    (dir, store, pipeline)
}

fn datagram(
    payload: Vec<u8>,
    src: &str,
    dst: &str,
    ts: DateTime<Utc>,
) -> CapturedDatagram {
    CapturedDatagram {
        timestamp: ts,
        source_ip: src.parse::<IpAddr>().expect("src"),
        dest_ip: dst.parse::<IpAddr>().expect("dst"),
        source_port: 50000,
        dest_port: 161,
        payload,
        frame_len: 120,
    }
}

fn get_frame(community: &str, oid: &str) -> Vec<u8> {
    codec::encode_community_message(
        SnmpVersion::V2c,
        community,
        &Pdu::Request {
            kind: PduKind::Get,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![Varbind::null(oid)],
        },
    )
}

fn response_frame(community: &str, error_status: i64, varbinds: Vec<Varbind>) -> Vec<u8> {
    codec::encode_community_message(
        SnmpVersion::V2c,
        community,
        &Pdu::Request {
            kind: PduKind::Response,
            request_id: 1,
            error_status,
            error_index: 0,
            varbinds,
        },
    )
}

// ==================== Matched GET/RESPONSE ====================

#[tokio::test]
async fn test_matched_response_produces_metric_with_latency() {
    let (_dir, store, pipeline) = pipeline_with_store().await;
    let t0 = Utc::now();

    pipeline
        .handle_datagram(datagram(
            get_frame("ops", "1.3.6.1.2.1.1.1.0"),
            "10.0.0.5",
            "10.0.0.1",
            t0,
        ))
        .await;
    pipeline
        .handle_datagram(datagram(
            response_frame(
                "ops",
                0,
                vec![Varbind::new(
                    "1.3.6.1.2.1.1.1.0",
                    SnmpValue::OctetString(b"Linux 6.1".to_vec()),
                )],
            ),
            "10.0.0.1",
            "10.0.0.5",
            t0 + Duration::milliseconds(42),
        ))
        .await;

    let rows = store.recent_metrics(10).await.expect("read");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.source_ip, "10.0.0.1");
    assert_eq!(row.oid, "1.3.6.1.2.1.1.1.0");
    assert_eq!(row.value_raw, "Linux 6.1");
    assert_eq!(row.value_num, None);
    assert_eq!(row.latency_ms, Some(42));
}

#[tokio::test]
async fn test_requests_do_not_produce_metrics() {
    let (_dir, store, pipeline) = pipeline_with_store().await;
    let t0 = Utc::now();

    for (kind, oid) in [
        (PduKind::Get, "1.3.6.1.2.1.1.1.0"),
        (PduKind::GetNext, "1.3.6.1.2.1.2.2"),
        (PduKind::Set, "1.3.6.1.2.1.1.6.0"),
    ] {
        let frame = codec::encode_community_message(
            SnmpVersion::V2c,
            "ops",
            &Pdu::Request {
                kind,
                request_id: 1,
                error_status: 0,
                error_index: 0,
                varbinds: vec![Varbind::null(oid)],
            },
        );
        pipeline
            .handle_datagram(datagram(frame, "10.0.0.5", "10.0.0.1", t0))
            .await;
    }

    assert!(store.recent_metrics(10).await.expect("read").is_empty());
}

#[tokio::test]
async fn test_error_response_produces_no_metrics() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    // noSuchName: varbinds echo the request with NULL values
    pipeline
        .handle_datagram(datagram(
            response_frame("ops", 2, vec![Varbind::null("1.3.6.1.2.1.1.1.0")]),
            "10.0.0.1",
            "10.0.0.5",
            Utc::now(),
        ))
        .await;

    assert!(store.recent_metrics(10).await.expect("read").is_empty());
    assert_eq!(pipeline.stats_snapshot().errors, 1);
}

#[tokio::test]
async fn test_sentinel_varbinds_skipped_concrete_kept() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    pipeline
        .handle_datagram(datagram(
            response_frame(
                "ops",
                0,
                vec![
                    Varbind::new("1.3.6.1.2.1.1.3.0", SnmpValue::TimeTicks(8675309)),
                    Varbind::new("1.3.6.1.2.1.1.8.0", SnmpValue::NoSuchObject),
                    Varbind::new("1.3.6.1.2.1.1.9.0", SnmpValue::Null),
                ],
            ),
            "10.0.0.1",
            "10.0.0.5",
            Utc::now(),
        ))
        .await;

    let rows = store.recent_metrics(10).await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].oid, "1.3.6.1.2.1.1.3.0");
    assert_eq!(rows[0].value_num, Some(8675309.0));
}

// ==================== Traps ====================

#[tokio::test]
async fn test_trapv2_persisted_with_placeholder_severity() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    let frame = codec::encode_community_message(
        SnmpVersion::V2c,
        "ops",
        &Pdu::Request {
            kind: PduKind::TrapV2,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![
                Varbind::new("1.3.6.1.2.1.1.3.0", SnmpValue::TimeTicks(100)),
                Varbind::new(
                    "1.3.6.1.6.3.1.1.4.1.0",
                    SnmpValue::Oid("1.3.6.1.4.1.8072.2.3.0.1".to_string()),
                ),
            ],
        },
    );
    pipeline
        .handle_datagram(datagram(frame, "192.0.2.7", "10.0.0.1", Utc::now()))
        .await;

    let rows = store.recent_traps(10).await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_ip, "192.0.2.7");
    assert_eq!(rows[0].version, "v2c");
    assert_eq!(rows[0].severity, "info");
    assert_eq!(
        rows[0].varbinds,
        "1.3.6.1.2.1.1.3.0:100;1.3.6.1.6.3.1.1.4.1.0:1.3.6.1.4.1.8072.2.3.0.1"
    );
    // traps never become metrics
    assert!(store.recent_metrics(10).await.expect("m").is_empty());
}

#[tokio::test]
async fn test_trapv1_records_enterprise_oid() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    let frame = codec::encode_community_message(
        SnmpVersion::V1,
        "ops",
        &Pdu::TrapV1 {
            enterprise: "1.3.6.1.4.1.9".to_string(),
            agent_addr: "192.0.2.7".parse().expect("addr"),
            generic_trap: 6,
            specific_trap: 1,
            time_stamp: 0,
            varbinds: vec![],
        },
    );
    pipeline
        .handle_datagram(datagram(frame, "192.0.2.7", "10.0.0.1", Utc::now()))
        .await;

    let rows = store.recent_traps(10).await.expect("read");
    assert_eq!(rows[0].enterprise_oid.as_deref(), Some("1.3.6.1.4.1.9"));
    assert_eq!(rows[0].version, "v1");
}

#[tokio::test]
async fn test_local_trap_fires_no_external_anomaly() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    let frame = codec::encode_community_message(
        SnmpVersion::V2c,
        "ops",
        &Pdu::Request {
            kind: PduKind::TrapV2,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![],
        },
    );
    pipeline
        .handle_datagram(datagram(frame, "127.0.0.1", "127.0.0.1", Utc::now()))
        .await;

    assert_eq!(store.recent_traps(10).await.expect("t").len(), 1);
    assert!(store.recent_anomalies(10).await.expect("a").is_empty());
}

// ==================== Anomalies ====================

#[tokio::test]
async fn test_flood_scenario_single_anomaly_row() {
    let (_dir, store, pipeline) = pipeline_with_store().await;
    let t0 = Utc::now();

    for i in 0..101 {
        pipeline
            .handle_datagram(datagram(
                get_frame("ops", "1.3.6.1.2.1.1.1.0"),
                "10.0.0.9",
                "10.0.0.1",
                t0 + Duration::milliseconds(i * 200),
            ))
            .await;
    }

    let rows = store.recent_anomalies(100).await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "flood");
    assert_eq!(rows[0].severity, "warn");
    assert!(rows[0].description.contains("10.0.0.9"));
}

#[tokio::test]
async fn test_weak_community_anomaly_persisted() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    pipeline
        .handle_datagram(datagram(
            get_frame("public", "1.3.6.1.2.1.1.1.0"),
            "10.0.0.5",
            "10.0.0.1",
            Utc::now(),
        ))
        .await;

    let rows = store.recent_anomalies(10).await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "weak_community");
    assert_eq!(rows[0].severity, "info");
}

// ==================== Decode Errors ====================

#[tokio::test]
async fn test_undecodable_frame_counted_and_discarded() {
    let (_dir, store, pipeline) = pipeline_with_store().await;

    pipeline
        .handle_datagram(datagram(
            vec![0xde, 0xad, 0xbe, 0xef],
            "10.0.0.5",
            "10.0.0.1",
            Utc::now(),
        ))
        .await;

    let stats = pipeline.stats_snapshot();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.total_packets, 0);
    assert!(store.recent_metrics(10).await.expect("m").is_empty());
    assert!(store.recent_anomalies(10).await.expect("a").is_empty());
}

#[tokio::test]
async fn test_unsupported_version_counted_and_discarded() {
    use snmpscope::snmp::ber;

    let (_dir, store, pipeline) = pipeline_with_store().await;

    let mut content = Vec::new();
    content.extend_from_slice(&ber::encode_integer(7));
    content.extend_from_slice(&ber::encode_octet_string(b"public"));
    content.extend_from_slice(&ber::wrap(0xa0, &[]));
    let frame = ber::wrap(ber::TAG_SEQUENCE, &content);

    pipeline
        .handle_datagram(datagram(frame, "10.0.0.5", "10.0.0.1", Utc::now()))
        .await;

    let stats = pipeline.stats_snapshot();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.total_packets, 0);
    assert!(store.recent_traps(10).await.expect("t").is_empty());
}

// ==================== Statistics ====================

#[tokio::test]
async fn test_stats_track_kinds_and_uniques() {
    let (_dir, _store, pipeline) = pipeline_with_store().await;
    let t0 = Utc::now();

    pipeline
        .handle_datagram(datagram(
            get_frame("ops", "1.3.6.1.2.1.1.1.0"),
            "10.0.0.5",
            "10.0.0.1",
            t0,
        ))
        .await;
    pipeline
        .handle_datagram(datagram(
            get_frame("ops", "1.3.6.1.2.1.1.1.0"),
            "10.0.0.6",
            "10.0.0.1",
            t0,
        ))
        .await;
    pipeline
        .handle_datagram(datagram(
            response_frame(
                "ops",
                0,
                vec![Varbind::new(
                    "1.3.6.1.2.1.1.1.0",
                    SnmpValue::OctetString(b"x".to_vec()),
                )],
            ),
            "10.0.0.1",
            "10.0.0.5",
            t0 + Duration::milliseconds(5),
        ))
        .await;

    let stats = pipeline.stats_snapshot();
    assert_eq!(stats.total_packets, 3);
    assert_eq!(stats.get_requests, 2);
    assert_eq!(stats.get_responses, 1);
    assert_eq!(stats.unique_sources.len(), 3);
    assert_eq!(stats.unique_destinations.len(), 2);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_pipeline_without_store() {
    let pipeline = Pipeline::new(&AppConfig::default(), None, Arc::new(AtomicU64::new(0)));

    pipeline
        .handle_datagram(datagram(
            get_frame("public", "1.3.6.1.2.1.1.1.0"),
            "10.0.0.5",
            "10.0.0.1",
            Utc::now(),
        ))
        .await;

    assert_eq!(pipeline.stats_snapshot().total_packets, 1);
}
