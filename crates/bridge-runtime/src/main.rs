//! # Wallet Bridge Runtime
//!
//! Runs a host connector against an in-process wallet context.
//!
//! ```text
//!  Host (Connector)                          Wallet (Responder)
//!        │  ◄──────────── READY ─────────────────  │
//!        │  ── START_SESSION (ephemeral SPKI) ──►  │
//!        │  ◄── signed success (wallet SPKI) ────  │
//!        │  ══ session-bound signed requests ══►   │
//!        │  ◄═ signed success / error envelope ══  │
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialise telemetry from `BRIDGE_*` environment variables
//! 2. Load configuration (`BRIDGE_CONFIG`, then env overrides)
//! 3. Spawn both endpoints
//! 4. Run the self-check
//! 5. Wait for Ctrl+C, then destroy the connector

use anyhow::{Context, Result};
use bridge_runtime::{BridgeRuntime, RuntimeConfig};
use bridge_telemetry::{gather_metrics, init_telemetry, TelemetryConfig};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialise telemetry")?;

    let config = RuntimeConfig::load().context("Failed to load configuration")?;

    info!("===========================================");
    info!("  Wallet Bridge Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let runtime = BridgeRuntime::start(config)?;

    match runtime.self_check().await {
        Ok(()) => info!("Self-check passed, session is ready"),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Self-check failed");
            runtime.shutdown().await;
            return Err(e);
        }
    }
    match gather_metrics() {
        Ok(metrics) => debug!(metrics = %metrics, "Metrics after self-check"),
        Err(e) => error!(error = %e, "Failed to gather metrics"),
    }

    info!("Bridge is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
