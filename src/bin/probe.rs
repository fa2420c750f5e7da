//! probe: craft and send SNMP requests from the CLI.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use ipnetwork::Ipv4Network;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snmpscope::config::AppConfig;
use snmpscope::db::Store;
use snmpscope::snmp::oids;
use snmpscope::snmp::probe::{ProbeResult, Prober, SetValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
enum OpType {
    Get,
    Set,
    Getnext,
    Getbulk,
    Trap,
}

#[derive(Parser)]
#[command(name = "probe", about = "SNMP request generator", version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["op", "discovery", "poll", "sysinfo"])
))]
struct Cli {
    /// Target IP, or network in CIDR form for --discovery
    target: String,

    /// Community string
    #[arg(short, long)]
    community: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Number of retries (GET only)
    #[arg(short, long)]
    retries: Option<u32>,

    /// Standard SNMP request type
    #[arg(long = "type", value_enum)]
    op: Option<OpType>,

    /// Sweep a network for SNMP agents
    #[arg(long)]
    discovery: bool,

    /// Poll the target on an interval
    #[arg(long)]
    poll: bool,

    /// Shortcut for GET with the sysinfo preset
    #[arg(long)]
    sysinfo: bool,

    /// OID or symbolic name (sysName, ifDescr, ...); repeatable
    #[arg(long = "oid")]
    oids: Vec<String>,

    /// Predefined OID group (sysinfo, interfaces, host_resources)
    #[arg(long)]
    preset: Option<String>,

    /// For SET: OID=value; repeatable
    #[arg(long = "value")]
    values: Vec<String>,

    /// For TRAP: OID=value; repeatable
    #[arg(long = "varbind")]
    varbinds: Vec<String>,

    /// Starting OID for GETNEXT
    #[arg(long)]
    start_oid: Option<String>,

    /// non-repeaters for GETBULK
    #[arg(long, default_value_t = 0)]
    non_repeaters: i64,

    /// max-repetitions for GETNEXT/GETBULK
    #[arg(long, default_value_t = 10)]
    max_repetitions: i64,

    /// Polling interval in seconds
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Polling duration in seconds
    #[arg(long, default_value_t = 3600)]
    duration: u64,

    /// Worker count for --discovery
    #[arg(long, default_value_t = 10)]
    threads: usize,

    /// Export results to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Path to the SQLite database file (used by --poll)
    #[arg(long)]
    db_path: Option<String>,

    /// Disable database persistence
    #[arg(long)]
    no_db: bool,
}

/// Argument problems clap cannot express exit with the same code clap
/// uses for parse errors.
fn usage_error(msg: &str) -> ! {
    eprintln!("error: {}", msg);
    std::process::exit(2);
}

fn parse_pairs(items: &[String], flag: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for item in items {
        match item.split_once('=') {
            Some((oid, value)) => {
                let oid = oids::lookup(oid).unwrap_or(oid);
                pairs.push((oid.to_string(), value.to_string()));
            }
            None => usage_error(&format!("invalid {} (expected OID=value): {}", flag, item)),
        }
    }
    pairs
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("configuration error")?;
    if let Some(community) = cli.community.clone() {
        config.snmp.community = community;
    }
    if let Some(timeout) = cli.timeout {
        config.snmp.timeout_s = timeout;
    }
    if let Some(retries) = cli.retries {
        config.snmp.retries = retries;
    }
    if let Some(db_path) = cli.db_path.clone() {
        config.db.db_path = db_path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).context("invalid LOG_LEVEL")?,
        )
        .init();

    let prober = Arc::new(Prober::new(&config.snmp));
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    if cli.discovery {
        run_discovery(&cli, &prober, &cancel).await?;
    } else if cli.poll {
        run_poll(&cli, &config, &prober, &cancel).await?;
    } else if cli.sysinfo {
        run_sysinfo(&cli, &prober)?;
    } else {
        run_request(&cli, &prober)?;
    }

    if let Some(path) = &cli.export {
        prober.export_results(path)?;
    }

    print!("\n=== STATISTICS ===\n{}", prober.statistics_report());
    Ok(())
}

fn target_ip(cli: &Cli) -> IpAddr {
    match cli.target.parse() {
        Ok(ip) => ip,
        Err(_) => usage_error(&format!("invalid target IP: {}", cli.target)),
    }
}

fn run_request(cli: &Cli, prober: &Prober) -> Result<()> {
    let target = target_ip(cli);
    let resolved = oids::resolve_oids(&cli.oids, cli.preset.as_deref());

    let result = match cli.op {
        Some(OpType::Get) => {
            if resolved.is_empty() {
                usage_error("GET requires at least one --oid or --preset");
            }
            prober.get(target, &resolved)
        }
        Some(OpType::Set) => {
            let pairs = parse_pairs(&cli.values, "--value");
            if pairs.is_empty() {
                usage_error("SET requires at least one --value OID=value");
            }
            let typed: Vec<(String, SetValue)> = pairs
                .into_iter()
                .map(|(oid, raw)| (oid, SetValue::infer(&raw)))
                .collect();
            prober.set(target, &typed)
        }
        Some(OpType::Getnext) => {
            let start = cli
                .start_oid
                .clone()
                .or_else(|| resolved.first().cloned())
                .unwrap_or_else(|| usage_error("GETNEXT requires --start-oid or an --oid"));
            prober.getnext_walk(target, &start, cli.max_repetitions.max(0) as u32)
        }
        Some(OpType::Getbulk) => {
            if resolved.is_empty() {
                usage_error("GETBULK requires at least one --oid or --preset");
            }
            prober.getbulk(target, &resolved, cli.non_repeaters, cli.max_repetitions)
        }
        Some(OpType::Trap) => {
            let pairs = parse_pairs(&cli.varbinds, "--varbind");
            prober.trap(target, "1.3.6.1.4.1.8072.2.3.0.1", &pairs)
        }
        None => unreachable!("clap group guarantees a mode"),
    };

    print_result(&result);
    Ok(())
}

fn print_result(result: &ProbeResult) {
    println!("\n=== RESULT ===");
    println!("type     : {}", result.op);
    println!("target   : {}", result.target);
    println!("success  : {}", result.success);
    if let Some(seconds) = result.response_time {
        println!("time     : {:.1} ms", seconds * 1000.0);
    }
    if let Some(error) = &result.error {
        println!("error    : {}", error);
    }
    if !result.values.is_empty() {
        println!("values   :");
        for (oid, value) in &result.values {
            println!("  {} = {}", oid, value);
        }
    }
}

fn run_sysinfo(cli: &Cli, prober: &Prober) -> Result<()> {
    let target = target_ip(cli);
    let resolved = oids::resolve_oids(&[], Some("sysinfo"));
    let result = prober.get(target, &resolved);

    if result.values.is_empty() {
        println!("\nno system information received from {}", cli.target);
    } else {
        println!("\nsystem information for {}:", cli.target);
        for (oid, value) in &result.values {
            let name = oids::name_of(oid).unwrap_or(oid);
            println!("  {}: {}", name, value);
        }
    }
    Ok(())
}

async fn run_discovery(cli: &Cli, prober: &Arc<Prober>, cancel: &Arc<AtomicBool>) -> Result<()> {
    let network: Ipv4Network = match cli.target.parse() {
        Ok(net) => net,
        Err(_) => usage_error(&format!("invalid network: {}", cli.target)),
    };

    let prober = Arc::clone(prober);
    let cancel = Arc::clone(cancel);
    let threads = cli.threads;
    let hosts = tokio::task::spawn_blocking(move || {
        prober.discovery_scan(network, threads, &cancel)
    })
    .await
    .context("discovery task panicked")?;

    println!("\nactive SNMP hosts ({}):", hosts.len());
    for host in hosts {
        println!("  {}", host);
    }
    Ok(())
}

async fn run_poll(
    cli: &Cli,
    config: &AppConfig,
    prober: &Prober,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let target = target_ip(cli);
    let resolved = oids::resolve_oids(&cli.oids, cli.preset.as_deref());
    if resolved.is_empty() {
        usage_error("--poll requires at least one --oid or --preset");
    }

    let store = if cli.no_db {
        None
    } else {
        Some(Store::open(&config.db.db_path).await?)
    };

    prober
        .poll(
            target,
            &resolved,
            Duration::from_secs(cli.interval),
            Duration::from_secs(cli.duration),
            store.as_ref(),
            cancel,
        )
        .await?;
    Ok(())
}
