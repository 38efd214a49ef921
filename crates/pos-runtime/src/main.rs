//! # Receiptless POS Runtime
//!
//! Runs one scripted sale against the session host and prints what happened.
//!
//! ## Startup Sequence
//!
//! 1. Initialise telemetry (tracing subscriber, metrics registry)
//! 2. Load configuration from the environment
//! 3. Build the receipt issuer: the signed HTTP gateway, or a scripted issuer
//!    when `RL_SCRIPTED_ISSUER` is set. Missing backend settings are not
//!    papered over; issuance fails with a config code and prints paper
//! 4. Pick storage: RocksDB when built with `rocksdb` and `RL_DATA_DIR` is set
//! 5. Drive the demo sale until it settles, the deadline passes or Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use pos_runtime::{run_demo, DemoReport, HostPorts, RuntimeConfig, SessionHost};
use pos_telemetry::{gather_metrics, init_telemetry, TelemetryConfig};
use rl_04_receipt_gateway::ReceiptIssuer;

/// Upper bound on one demo sale, payment delay included.
const DEMO_DEADLINE: Duration = Duration::from_secs(30);

fn build_issuer(config: &RuntimeConfig) -> Result<Arc<dyn ReceiptIssuer>> {
    let issuer = config
        .receipt_issuer()
        .context("building receipt issuer")?;
    if config.scripted_issuer {
        warn!("RL_SCRIPTED_ISSUER is set; receipts are issued locally");
    } else if let Err(e) = config.gateway.validate_for_issuance() {
        warn!(code = e.code(), "Receipt backend incomplete, issuance will fall back to paper: {}", e);
    } else {
        info!(timeout_ms = config.gateway.timeout.as_millis() as u64, "Using receipt backend");
    }
    Ok(issuer)
}

fn build_ports(config: &RuntimeConfig, issuer: Arc<dyn ReceiptIssuer>) -> Result<HostPorts> {
    let ports = HostPorts::in_memory(issuer, config.channel_capacity);

    #[cfg(feature = "rocksdb")]
    {
        use pos_runtime::adapters::storage::{RocksDbConfig, RocksDbStorage};

        if let Some(dir) = &config.storage.data_dir {
            let storage = Arc::new(
                RocksDbStorage::open(RocksDbConfig::at(dir))
                    .with_context(|| format!("opening RocksDB at {}", dir.display()))?,
            );
            info!(path = %dir.display(), "Using RocksDB storage");
            return Ok(ports.with_store(storage.clone()).with_log(storage));
        }
    }

    #[cfg(not(feature = "rocksdb"))]
    {
        if config.storage.data_dir.is_some() {
            warn!("RL_DATA_DIR is set but this build has no rocksdb feature; using memory");
        }
    }

    Ok(ports)
}

fn print_report(report: &DemoReport) {
    let view = &report.final_view;
    println!("Session    {} ({})", report.session.session_code, report.session.session_id);
    println!("Customer   {}", report.customer_url);
    for status in &report.statuses {
        println!("  > {}", status);
    }
    println!(
        "Result     stage={} payment={:?} issuance={:?} scan={:?}",
        view.flow.stage.as_str(),
        view.flow.payment_state,
        view.flow.issuance_state,
        view.scan.state
    );
    println!(
        "Cart       subtotal={} vat={} total={} {}",
        view.cart.subtotal, view.cart.vat_total, view.cart.total, view.cart.currency
    );
    if let Some(receipt) = &view.receipt {
        println!("Receipt    {} {}", receipt.token_id, receipt.public_url);
    }
    if let Some(reason) = view.fallback.reason.filter(|_| view.fallback.printed) {
        println!("Fallback   paper receipt printed ({})", reason.as_str());
    }
    if report.health.is_degraded() {
        println!(
            "Storage    degraded: {} snapshot / {} event write failures",
            report.health.failed_snapshot_writes, report.health.failed_event_appends
        );
    }
    if report.timed_out {
        println!("Warning    sale did not settle before the deadline");
    }
    println!("History ({} events)", report.history.len());
    for event in &report.history {
        println!(
            "  #{:<4} {} {}",
            event.id,
            event.created_at.format("%H:%M:%S%.3f"),
            event.event_type
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("runtime"))
        .await
        .context("initialising telemetry")?;

    let config = RuntimeConfig::from_env().context("loading configuration")?;
    info!(
        enabled = config.enabled,
        retailer_id = %config.terminal.retailer_id,
        store_id = %config.terminal.store_id,
        terminal_id = %config.terminal.terminal_id,
        "Configuration loaded"
    );

    let issuer = build_issuer(&config)?;
    let ports = build_ports(&config, issuer)?;
    let host = SessionHost::new(config, ports);

    tokio::select! {
        result = run_demo(&host, DEMO_DEADLINE) => {
            let report = result.context("demo sale failed")?;
            print_report(&report);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    host.shutdown().await;
    match gather_metrics() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!("Metrics unavailable: {}", e),
    }
    info!("Shutdown complete");
    Ok(())
}
