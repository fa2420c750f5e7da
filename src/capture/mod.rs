//! Live capture source.
//!
//! Opens a pcap handle on the configured interface with a BPF filter
//! selecting SNMP traffic, slices the Ethernet/IP/UDP headers off each
//! delivered frame, and hands the UDP payload plus transport 5-tuple to
//! the pipeline over a bounded channel. The capture loop is blocking and
//! meant to run on its own thread; a full channel drops the datagram and
//! bumps the shared drop counter so backpressure stays visible.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;

/// One UDP datagram lifted off the wire.
#[derive(Debug, Clone)]
pub struct CapturedDatagram {
    pub timestamp: DateTime<Utc>,
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub source_port: u16,
    pub dest_port: u16,
    pub payload: Vec<u8>,
    /// Length of the captured frame, link layer included.
    pub frame_len: usize,
}

/// Run the capture loop until `shutdown` is raised, `count` datagrams
/// have been delivered (0 = unlimited), or the handle fails.
pub fn run_capture(
    config: &CaptureConfig,
    tx: mpsc::Sender<CapturedDatagram>,
    shutdown: Arc<AtomicBool>,
    count: u64,
    dropped: Arc<AtomicU64>,
) -> Result<()> {
    let device = match &config.interface {
        Some(name) => pcap::Device::list()
            .context("failed to enumerate capture devices")?
            .into_iter()
            .find(|d| d.name == *name)
            .with_context(|| format!("no such capture interface: {}", name))?,
        None => pcap::Device::lookup()
            .context("failed to look up default capture device")?
            .context("no default capture device")?,
    };
    info!("capturing on {}", device.name);

    let mut cap = pcap::Capture::from_device(device)
        .context("failed to open capture device")?
        .promisc(config.promiscuous)
        .buffer_size(config.buffer_size)
        // short poll so the shutdown flag is observed promptly
        .timeout(1000)
        .open()
        .context("failed to activate capture")?;
    cap.filter(crate::SNMP_FILTER, true)
        .context("failed to install BPF filter")?;

    let mut delivered = 0u64;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("capture interrupted");
            break;
        }
        match cap.next_packet() {
            Ok(packet) => {
                let ts = Utc
                    .timestamp_opt(
                        packet.header.ts.tv_sec as i64,
                        (packet.header.ts.tv_usec as u32).saturating_mul(1000),
                    )
                    .single()
                    .unwrap_or_else(Utc::now);
                let Some(datagram) = slice_datagram(packet.data, ts) else {
                    continue;
                };
                match tx.try_send(datagram) {
                    Ok(()) => {
                        delivered += 1;
                        if count > 0 && delivered >= count {
                            info!("capture stopped after {} packets", delivered);
                            break;
                        }
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("pipeline backpressure, datagram dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!("pipeline gone, stopping capture");
                        break;
                    }
                }
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                return Err(anyhow::anyhow!("capture failed: {}", e));
            }
        }
    }

    Ok(())
}

/// Slice a captured Ethernet frame down to its UDP payload. Non-UDP and
/// unparsable frames yield `None`; the BPF filter makes those rare.
pub fn slice_datagram(frame: &[u8], timestamp: DateTime<Utc>) -> Option<CapturedDatagram> {
    let sliced = SlicedPacket::from_ethernet(frame).ok()?;

    let (source_ip, dest_ip) = match sliced.net? {
        NetSlice::Ipv4(ipv4) => (
            IpAddr::V4(ipv4.header().source_addr()),
            IpAddr::V4(ipv4.header().destination_addr()),
        ),
        NetSlice::Ipv6(ipv6) => (
            IpAddr::V6(ipv6.header().source_addr()),
            IpAddr::V6(ipv6.header().destination_addr()),
        ),
    };

    let udp = match sliced.transport? {
        TransportSlice::Udp(udp) => udp,
        _ => return None,
    };

    Some(CapturedDatagram {
        timestamp,
        source_ip,
        dest_ip,
        source_port: udp.source_port(),
        dest_port: udp.destination_port(),
        payload: udp.payload().to_vec(),
        frame_len: frame.len(),
    })
}
