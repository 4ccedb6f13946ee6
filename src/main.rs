use anyhow::{Result, anyhow};
use clap::Parser;
use std::io::{self, Write};
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use rping::cli::Args;
use rping::config::Config;
use rping::error::PingError;
use rping::export::{export_json, write_fallback, write_header, write_probe, write_summary};
use rping::ping::{ProbeEvent, ProbeSession};
use rping::prefs::Prefs;
use rping::probe::RawSocketFactory;
use rping::state::Target;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the stderr log subscriber (RUST_LOG wins over --verbose)
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let prefs = Prefs::load();
    let config = Config::resolve(&args, &prefs);
    debug!("Configuration: {:?}", config);

    let target = Target::resolve(&args.target, config.family)?;
    let name = target.original.clone();

    // Ctrl+C stops the session after the probe in flight
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    let json = args.json;
    let session = ProbeSession::new(config, target, RawSocketFactory).with_cancel(cancel);
    let session_name = name.clone();

    // Raw socket I/O blocks; keep it off the async workers
    let (stats, destination) = tokio::task::spawn_blocking(move || {
        let mut destination: Option<IpAddr> = None;
        let stats = session.run(|event| {
            if let ProbeEvent::Started { destination: addr, .. } = event {
                destination = Some(addr);
            }
            if !json && let Err(e) = print_event(&session_name, &event) {
                warn!("Failed to write output: {}", e);
            }
        })?;
        Ok::<_, PingError>((stats, destination))
    })
    .await
    .map_err(|e| anyhow!("Probe session task failed: {}", e))??;

    let stdout = io::stdout();
    if json {
        export_json(&name, destination, &stats, stdout.lock())?;
    } else {
        write_summary(stdout.lock(), &name, &stats)?;
    }

    Ok(())
}

fn print_event(target: &str, event: &ProbeEvent) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match event {
        ProbeEvent::Started { destination, .. } => write_header(&mut stdout, target, *destination)?,
        ProbeEvent::Probe(result) => write_probe(&mut stdout, result)?,
        ProbeEvent::Fallback { reason } => write_fallback(&mut stdout, reason)?,
    }
    stdout.flush()
}
