//! Endpoint wiring.

use anyhow::{Context, Result};
use shared_bus::{in_memory_channel, Endpoint, SourceId};
use shared_types::{DeviceIdentity, StaticDeviceIdentity, SystemTimeSource, TimeSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wb_03_connector::{Connector, ConnectorHandle, ConnectorPorts};
use wb_04_wallet::{spawn_wallet_in_memory, HandlerRegistry, InMemoryKeyStorage, WalletResponder};

use crate::config::RuntimeConfig;

/// How long to wait for the wallet task after the connector stops.
const WALLET_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A host connector and an in-process wallet context.
pub struct BridgeRuntime {
    connector: ConnectorHandle,
    wallet: JoinHandle<()>,
}

impl BridgeRuntime {
    /// Spawn both endpoints. Must be called from within a tokio runtime.
    pub fn start(config: RuntimeConfig) -> Result<Self> {
        Self::start_with_clock(config, Arc::new(SystemTimeSource))
    }

    /// Spawn both endpoints sharing `clock`.
    pub fn start_with_clock(config: RuntimeConfig, clock: Arc<dyn TimeSource>) -> Result<Self> {
        config.validate().context("Invalid runtime configuration")?;

        let device: Arc<dyn DeviceIdentity> = Arc::new(StaticDeviceIdentity::new(&config.device_id));
        let (host, wallet) = in_memory_channel(
            Endpoint::new(&config.host_origin, SourceId::new(&config.wallet.host_source)),
            Endpoint::new(
                &config.connector.wallet_origin,
                SourceId::new(&config.connector.wallet_source),
            ),
        );

        let handlers = HandlerRegistry::with_defaults(Arc::new(InMemoryKeyStorage::new()));
        let responder = WalletResponder::new(config.wallet, device.as_ref(), clock.clone(), handlers)
            .context("Failed to create wallet responder")?;
        let wallet = spawn_wallet_in_memory(Arc::new(responder), wallet);

        let connector = Connector::spawn(config.connector, ConnectorPorts::in_memory(host, device, clock))
            .context("Failed to start connector")?;

        info!(
            device_id = %config.device_id,
            host_origin = %config.host_origin,
            "Bridge endpoints started"
        );
        Ok(Self { connector, wallet })
    }

    /// Handle for submitting operations.
    pub fn connector(&self) -> &ConnectorHandle {
        &self.connector
    }

    /// Exercise the session end to end.
    ///
    /// Waits for the handshake, reads the status, applies a theme and
    /// checks a device-key signature.
    pub async fn self_check(&self) -> Result<()> {
        let connector = &self.connector;
        connector.wait_ready().await.context("Handshake did not complete")?;

        let status = connector.get_status().await.context("GET_STATUS failed")?;
        info!(status = %status, "Wallet status");

        let applied = connector.set_theme("dark").await.context("SET_THEME failed")?;
        info!(applied, "Theme change requested");

        let device_key = connector
            .generate_device_key()
            .await
            .context("GENERATE_DEVICE_KEY failed")?;
        let challenge = b"wallet-bridge self-check".to_vec();
        let signature = connector
            .sign_data(challenge.clone())
            .await
            .context("SIGN_DATA failed")?;
        anyhow::ensure!(
            device_key.verify(&challenge, &signature),
            "device key signature did not verify"
        );
        info!(
            device_key = %device_key.fingerprint(),
            signature = %hex::encode(&signature[..8.min(signature.len())]),
            "Device key signature verified"
        );
        Ok(())
    }

    /// Stop the connector and wait for the wallet context to exit.
    pub async fn shutdown(self) {
        info!("Shutting down bridge");
        self.connector.destroy().await;
        drop(self.connector);
        match tokio::time::timeout(WALLET_STOP_TIMEOUT, self.wallet).await {
            Ok(Ok(())) => info!("Wallet context stopped"),
            Ok(Err(e)) => warn!(error = %e, "Wallet task failed"),
            Err(_) => warn!("Wallet context did not stop in time"),
        }
    }
}
