//! dns-failover binary entry point.

use clap::Parser;
use dns_failover::records::DryRunRecordClient;
use dns_failover::{http, telemetry, Config, Decision, FailoverEngine, FailoverError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

/// Swap a DNS failover record pair in response to a health alarm notification.
#[derive(Parser, Debug)]
#[command(name = "dns-failover")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "dns-failover.toml")]
    config: PathBuf,

    /// Notification envelope to handle (JSON). Read from stdin when omitted.
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Log the record change instead of submitting it.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    if let Err(e) = config.failover.validate() {
        error!("Invalid configuration: {}", e);
        telemetry::shutdown();
        return Err(e.into());
    }

    info!(
        config_file = %args.config.display(),
        record_name = %config.failover.record_name,
        primary = %config.failover.primary.label,
        secondary = %config.failover.secondary.label,
        dry_run = args.dry_run,
        "Starting dns-failover"
    );

    let raw = read_event(args.event.as_ref()).await?;

    let (metric_source, record_client) = http::clients(&config.backends);
    let failover = Arc::new(config.failover);
    let result = if args.dry_run {
        FailoverEngine::new(failover, metric_source, DryRunRecordClient)
            .handle_envelope(&raw)
            .await
    } else {
        FailoverEngine::new(failover, metric_source, record_client)
            .handle_envelope(&raw)
            .await
    };

    let outcome = match result {
        Ok(decision) => {
            report(&decision);
            Ok(())
        }
        Err(e) => {
            error!("Failover error: {}", e);
            Err(e.into())
        }
    };

    telemetry::shutdown();
    outcome
}

async fn read_event(path: Option<&PathBuf>) -> Result<Vec<u8>, FailoverError> {
    let raw = match path {
        Some(path) => tokio::fs::read(path).await?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
    };
    Ok(raw)
}

fn report(decision: &Decision) {
    match decision {
        Decision::SwitchedToSecondary(change) | Decision::RevertedToPrimary(change) => info!(
            decision = decision.kind(),
            change_id = %change.id,
            status = %change.status,
            "dns-failover finished"
        ),
        _ => info!(decision = decision.kind(), "dns-failover finished"),
    }
}
