//! analyzer: passive SNMP capture daemon.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snmpscope::analyzer::Pipeline;
use snmpscope::capture;
use snmpscope::config::AppConfig;
use snmpscope::db::Store;

#[derive(Parser)]
#[command(name = "analyzer", about = "Passive SNMP traffic analyzer", version)]
struct Cli {
    /// Network interface to monitor (default: OS choice)
    #[arg(short, long)]
    interface: Option<String>,

    /// Number of packets to capture (0 = unlimited)
    #[arg(short, long, default_value_t = 0)]
    count: u64,

    /// Capture duration in seconds (0 = unlimited)
    #[arg(short, long, default_value_t = 0)]
    duration: u64,

    /// Disable database persistence
    #[arg(long)]
    no_db: bool,

    /// Path to the SQLite database file
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("configuration error")?;
    if let Some(interface) = cli.interface.clone() {
        config.capture.interface = Some(interface);
    }
    if let Some(db_path) = cli.db_path.clone() {
        config.db.db_path = db_path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).context("invalid LOG_LEVEL")?,
        )
        .init();

    info!("snmpscope {} analyzer starting", snmpscope::VERSION);

    let store = if cli.no_db {
        None
    } else {
        Some(Store::open(&config.db.db_path).await?)
    };

    let dropped = Arc::new(AtomicU64::new(0));
    let shutdown = Arc::new(AtomicBool::new(false));
    let pipeline = Arc::new(Pipeline::new(&config, store, Arc::clone(&dropped)));

    // capture thread → bounded channel → pipeline task
    let (tx, rx) = mpsc::channel(1024);
    let capture_config = config.capture.clone();
    let capture_shutdown = Arc::clone(&shutdown);
    let capture_dropped = Arc::clone(&dropped);
    let count = cli.count;
    let capture_task = tokio::task::spawn_blocking(move || {
        capture::run_capture(
            &capture_config,
            tx,
            capture_shutdown,
            count,
            capture_dropped,
        )
    });

    let pipeline_task = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(rx).await })
    };

    let cleanup_task = tokio::spawn(snmpscope::analyzer::run_cleanup(pipeline.correlator()));

    // Ctrl-C and the optional duration timer both raise the shutdown flag;
    // the capture loop notices within its poll timeout.
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }
    if cli.duration > 0 {
        let shutdown = Arc::clone(&shutdown);
        let duration = cli.duration;
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(duration)).await;
            info!("capture stopped after {}s", duration);
            shutdown.store(true, Ordering::Relaxed);
        });
    }

    // capture ends first (flag, count, or error); dropping its sender
    // closes the channel and lets the pipeline drain
    let capture_result = capture_task.await.context("capture thread panicked")?;
    pipeline_task.await.context("pipeline task panicked")?;
    cleanup_task.abort();

    if let Err(e) = capture_result {
        error!("fatal: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
