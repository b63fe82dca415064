//! # Bridge Fixture
//!
//! Wires a [`Connector`] to a [`WalletResponder`] over the in-memory
//! channel with recording ports on both directions, so scenarios can
//! inspect, replay and tamper with traffic.

use parking_lot::Mutex;
use shared_bus::{
    in_memory_channel, ChannelError, ChannelPort, Endpoint, MessagePort, SourceId, WalletSide,
};
use shared_types::{
    DeviceIdentity, MessageType, StaticDeviceIdentity, SystemTimeSource, TimeSource, WireEnvelope,
};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use wb_03_connector::{Connector, ConnectorConfig, ConnectorHandle, ConnectorPorts};
use wb_04_wallet::{
    spawn_wallet, HandlerRegistry, InMemoryKeyStorage, WalletConfig, WalletResponder,
};

pub const DEVICE: &str = "integration-device";
pub const HOST_ORIGIN: &str = "https://host.localhost";
pub const WALLET_ORIGIN: &str = "https://wallet.localhost";
pub const HOST_SOURCE: &str = "host";
pub const WALLET_SOURCE: &str = "wallet";

/// Fail the test if `future` takes longer than five seconds.
pub async fn within<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(5), future).await {
        Ok(output) => output,
        Err(_) => panic!("scenario timed out"),
    }
}

// =============================================================================
// RECORDING PORT
// =============================================================================

/// Forwards envelopes and keeps a copy of each.
///
/// Can be armed to corrupt the signature of the next N `START_SESSION`
/// requests passing through it.
pub struct RecordingPort {
    inner: ChannelPort,
    sent: Mutex<Vec<WireEnvelope>>,
    corrupt_handshakes: AtomicU32,
}

impl RecordingPort {
    pub fn new(inner: ChannelPort) -> Self {
        Self {
            inner,
            sent: Mutex::new(Vec::new()),
            corrupt_handshakes: AtomicU32::new(0),
        }
    }

    /// Corrupt the next `count` handshake requests.
    pub fn corrupt_handshakes(&self, count: u32) {
        self.corrupt_handshakes.store(count, Ordering::SeqCst);
    }

    /// Everything posted so far.
    pub fn sent(&self) -> Vec<WireEnvelope> {
        self.sent.lock().clone()
    }

    /// Last envelope posted for `operation`.
    pub fn last(&self, operation: MessageType) -> Option<WireEnvelope> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|e| e.operation() == Some(operation))
            .cloned()
    }

    /// Envelope answering `request_id`, if one was posted.
    pub fn answer_to(&self, request_id: &str) -> Option<WireEnvelope> {
        self.sent
            .lock()
            .iter()
            .find(|e| e.kind.is_some() && e.request_id.as_deref() == Some(request_id))
            .cloned()
    }

    /// Error envelope answering `request_id`, if one was posted.
    pub fn error_for(&self, request_id: &str) -> Option<WireEnvelope> {
        self.sent
            .lock()
            .iter()
            .find(|e| e.is_error() && e.request_id.as_deref() == Some(request_id))
            .cloned()
    }

    fn take_corruption(&self) -> bool {
        self.corrupt_handshakes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl MessagePort for RecordingPort {
    fn post(&self, envelope: &WireEnvelope) -> Result<(), ChannelError> {
        let mut envelope = envelope.clone();
        let is_handshake_request =
            envelope.operation() == Some(MessageType::StartSession) && envelope.kind.is_none();
        if is_handshake_request && self.take_corruption() {
            if let Some(byte) = envelope.signature.as_mut().and_then(|s| s.last_mut()) {
                *byte ^= 0xff;
            }
        }
        self.sent.lock().push(envelope.clone());
        self.inner.post(&envelope)
    }
}

// =============================================================================
// BRIDGE
// =============================================================================

/// Both endpoints plus the handles scenarios need.
pub struct Bridge {
    pub connector: ConnectorHandle,
    pub responder: Arc<WalletResponder>,
    /// Host to wallet traffic.
    pub host_sent: Arc<RecordingPort>,
    /// Wallet to host traffic.
    pub wallet_sent: Arc<RecordingPort>,
    /// Raw host port, for replays and impersonation.
    pub host_port: ChannelPort,
    wallet_side: Option<WalletSide>,
    wallet_task: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Spawn the connector only. Call [`Bridge::start_wallet`] to bring the
    /// wallet context up.
    pub fn new(connector_config: ConnectorConfig, wallet_config: WalletConfig) -> Self {
        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let device: Arc<dyn DeviceIdentity> = Arc::new(StaticDeviceIdentity::new(DEVICE));

        let (host, wallet) = in_memory_channel(
            Endpoint::new(HOST_ORIGIN, SourceId::new(HOST_SOURCE)),
            Endpoint::new(WALLET_ORIGIN, SourceId::new(WALLET_SOURCE)),
        );
        let host_port = host.port.clone();
        let host_sent = Arc::new(RecordingPort::new(host.port));
        let wallet_sent = Arc::new(RecordingPort::new(wallet.port.clone()));

        let handlers = HandlerRegistry::with_defaults(Arc::new(InMemoryKeyStorage::new()));
        let responder = WalletResponder::new(wallet_config, device.as_ref(), clock.clone(), handlers)
            .unwrap_or_else(|e| panic!("wallet config rejected: {e}"));

        let ports = ConnectorPorts {
            device,
            port: host_sent.clone(),
            control: Arc::new(host.control),
            inbox: host.inbox,
            clock,
        };
        let connector = Connector::spawn(connector_config, ports)
            .unwrap_or_else(|e| panic!("connector config rejected: {e}"));

        Self {
            connector,
            responder: Arc::new(responder),
            host_sent,
            wallet_sent,
            host_port,
            wallet_side: Some(wallet),
            wallet_task: None,
        }
    }

    /// Default configuration on both ends.
    pub fn with_defaults() -> Self {
        Self::new(connector_config(), wallet_config())
    }

    /// Default configuration, wallet running, session established.
    pub async fn ready() -> Self {
        let mut bridge = Self::with_defaults();
        bridge.start_wallet();
        within(bridge.connector.wait_ready())
            .await
            .unwrap_or_else(|e| panic!("handshake failed: {e}"));
        bridge
    }

    /// Spawn the wallet context (it announces `READY` at once).
    pub fn start_wallet(&mut self) {
        if let Some(side) = self.wallet_side.take() {
            self.wallet_task = Some(spawn_wallet(
                self.responder.clone(),
                self.wallet_sent.clone(),
                side.inbox,
            ));
        }
    }

    /// Wait until the wallet has answered `request_id`.
    pub async fn wallet_answer(&self, request_id: &str) -> WireEnvelope {
        self.wait_for(|port| port.answer_to(request_id)).await
    }

    /// Wait until the wallet has rejected `request_id`.
    pub async fn wallet_error(&self, request_id: &str) -> WireEnvelope {
        self.wait_for(|port| port.error_for(request_id)).await
    }

    async fn wait_for(
        &self,
        find: impl Fn(&RecordingPort) -> Option<WireEnvelope>,
    ) -> WireEnvelope {
        within(async {
            loop {
                if let Some(answer) = find(&self.wallet_sent) {
                    return answer;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
    }

    /// Destroy the connector and wait for the wallet loop to exit.
    pub async fn shutdown(mut self) {
        self.connector.destroy().await;
        drop(self.connector);
        drop(self.host_sent);
        drop(self.host_port);
        if let Some(task) = self.wallet_task.take() {
            within(task).await.unwrap_or_else(|e| panic!("wallet task failed: {e}"));
        }
    }
}

pub fn connector_config() -> ConnectorConfig {
    ConnectorConfig {
        wallet_origin: WALLET_ORIGIN.to_string(),
        wallet_source: WALLET_SOURCE.to_string(),
        ..ConnectorConfig::default()
    }
}

pub fn wallet_config() -> WalletConfig {
    WalletConfig {
        allowed_origins: vec![HOST_ORIGIN.to_string()],
        host_source: HOST_SOURCE.to_string(),
        ..WalletConfig::default()
    }
}
