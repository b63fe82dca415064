//! # Connector Tests
//!
//! The wallet end is scripted by hand so each test controls exactly what
//! the connector sees.

use super::*;
use shared_bus::{in_memory_channel, ChannelError, Endpoint, RestartHandle, WalletSide};
use shared_crypto::PublicKey;
use shared_types::{FixedTimeSource, StaticDeviceIdentity};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wb_01_session::SessionIssuer;

const NOW: u64 = 1_700_000_000_000;
const DEVICE: &str = "device-1";
const HOST_ORIGIN: &str = "https://host.example";
const WALLET_ORIGIN: &str = "https://wallet.example";

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

struct ScriptedWallet {
    side: WalletSide,
    clock: Arc<FixedTimeSource>,
    issuer: Arc<SessionIssuer>,
    session: Option<Session>,
}

impl ScriptedWallet {
    fn builder(&self, operation: MessageType) -> EnvelopeBuilder {
        EnvelopeBuilder::new(operation, DEVICE, self.clock.as_ref())
    }

    fn send(&self, envelope: &WireEnvelope) {
        self.side.port.post(envelope).unwrap();
    }

    fn ready(&self) {
        self.send(&self.builder(MessageType::Ready).request(Payload::Empty));
    }

    async fn next_event(&mut self) -> ChannelEvent {
        within(self.side.inbox.recv()).await.expect("channel closed")
    }

    async fn next_request(&mut self) -> WireEnvelope {
        match self.next_event().await {
            ChannelEvent::Message(message) => message.decode().unwrap(),
            other => panic!("expected a message, got {other:?}"),
        }
    }

    async fn expect_restart(&mut self) {
        assert_eq!(self.next_event().await, ChannelEvent::Restart);
    }

    fn nothing_sent(&mut self) -> bool {
        matches!(self.side.inbox.try_recv(), Ok(None))
    }

    fn accept(&mut self, request: &WireEnvelope) {
        let response = self.handshake_answer(request);
        self.send(&response);
    }

    /// Signed `START_SESSION` success for `request`; keeps the new session.
    fn handshake_answer(&mut self, request: &WireEnvelope) -> WireEnvelope {
        let spki = request.payload.as_ref().and_then(Payload::as_bytes).unwrap();
        let remote = PublicKey::from_spki(spki).unwrap();
        assert!(remote.verify(
            &request.signing_input().unwrap(),
            request.signature.as_deref().unwrap()
        ));

        let session = Session::create(remote, &self.issuer).unwrap();
        let response = self
            .builder(MessageType::StartSession)
            .with_request_id(request.request_id.clone().unwrap())
            .success(Payload::Bytes(session.local_public_key().to_spki().unwrap()))
            .with_session(session.session_id())
            .sign(session.local_key())
            .unwrap();
        self.session = Some(session);
        response
    }

    fn reject(&self, request: &WireEnvelope, label: &str, terminate: Option<TerminationScope>) {
        let response = self
            .builder(request.operation().unwrap())
            .with_request_id(request.request_id.clone().unwrap())
            .error(label, terminate);
        self.send(&response);
    }

    fn answer(&self, request: &WireEnvelope, payload: Payload) -> WireEnvelope {
        let session = self.session.as_ref().unwrap();
        assert_eq!(request.session_id.as_deref(), Some(session.session_id()));
        assert!(session.remote_key().verify(
            &request.signing_input().unwrap(),
            request.signature.as_deref().unwrap()
        ));
        self.builder(request.operation().unwrap())
            .with_request_id(request.request_id.clone().unwrap())
            .success(payload)
            .with_session(session.session_id())
            .sign(session.local_key())
            .unwrap()
    }

    fn reply(&self, request: &WireEnvelope, payload: Payload) {
        let response = self.answer(request, payload);
        self.send(&response);
    }

    async fn handshake(&mut self) {
        self.ready();
        let request = self.next_request().await;
        assert_eq!(request.operation(), Some(MessageType::StartSession));
        self.accept(&request);
    }

    async fn fail_handshake(&mut self) {
        self.ready();
        let request = self.next_request().await;
        assert_eq!(request.operation(), Some(MessageType::StartSession));
        self.reject(&request, "INVALID START_SESSION SIGNATURE", None);
    }
}

fn config() -> ConnectorConfig {
    ConnectorConfig {
        wallet_origin: WALLET_ORIGIN.to_string(),
        wallet_source: "wallet".to_string(),
        ..ConnectorConfig::default()
    }
}

fn setup_with(config: ConnectorConfig) -> (ConnectorHandle, ScriptedWallet) {
    let clock = Arc::new(FixedTimeSource::new(NOW));
    let (host, wallet) = in_memory_channel(
        Endpoint::new(HOST_ORIGIN, SourceId::new("host")),
        Endpoint::new(WALLET_ORIGIN, SourceId::new("wallet")),
    );
    let handle = Connector::spawn(
        config,
        ConnectorPorts::in_memory(
            host,
            Arc::new(StaticDeviceIdentity::new(DEVICE)),
            clock.clone(),
        ),
    )
    .unwrap();
    let wallet = ScriptedWallet {
        side: wallet,
        issuer: Arc::new(SessionIssuer::new(clock.clone())),
        clock,
        session: None,
    };
    (handle, wallet)
}

fn setup() -> (ConnectorHandle, ScriptedWallet) {
    setup_with(config())
}

/// Refuses the first `refusals` restart requests, then forwards.
struct FlakyControl {
    inner: RestartHandle,
    refusals: AtomicU32,
    calls: AtomicU32,
}

impl ContextControl for FlakyControl {
    fn restart(&self) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChannelError::Full);
        }
        self.inner.restart()
    }
}

fn setup_flaky(refusals: u32) -> (ConnectorHandle, ScriptedWallet, Arc<FlakyControl>) {
    let mut config = config();
    config.anomaly.rps_window_ms = 10;
    let clock = Arc::new(FixedTimeSource::new(NOW));
    let (host, wallet) = in_memory_channel(
        Endpoint::new(HOST_ORIGIN, SourceId::new("host")),
        Endpoint::new(WALLET_ORIGIN, SourceId::new("wallet")),
    );
    let control = Arc::new(FlakyControl {
        inner: host.control,
        refusals: AtomicU32::new(refusals),
        calls: AtomicU32::new(0),
    });
    let ports = ConnectorPorts {
        device: Arc::new(StaticDeviceIdentity::new(DEVICE)),
        port: Arc::new(host.port),
        control: control.clone(),
        inbox: host.inbox,
        clock: clock.clone(),
    };
    let handle = Connector::spawn(config, ports).unwrap();
    let wallet = ScriptedWallet {
        side: wallet,
        issuer: Arc::new(SessionIssuer::new(clock.clone())),
        clock,
        session: None,
    };
    (handle, wallet, control)
}

// =============================================================================
// HANDSHAKE
// =============================================================================

#[tokio::test]
async fn test_handshake_reaches_ready() {
    let (handle, mut wallet) = setup();
    assert_eq!(handle.status(), ConnectorStatus::Loading);

    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();
    assert_eq!(handle.status(), ConnectorStatus::Ready);
}

#[tokio::test]
async fn test_nothing_is_sent_before_ready() {
    let (handle, mut wallet) = setup();
    let caller = handle.clone();
    let pending = tokio::spawn(async move { caller.get_status().await });
    settle().await;

    assert!(wallet.nothing_sent());

    wallet.handshake().await;
    let request = wallet.next_request().await;
    assert_eq!(request.operation(), Some(MessageType::GetStatus));
    wallet.reply(&request, Payload::Json(serde_json::json!({ "locked": false })));

    let status = within(pending).await.unwrap().unwrap();
    assert_eq!(status["locked"], false);
}

#[tokio::test]
async fn test_backup_queue_drains_in_submission_order() {
    let (handle, mut wallet) = setup();

    let mut callers = Vec::new();
    for (operation, payload) in [
        (MessageType::GetStatus, Payload::Empty),
        (MessageType::SetTheme, Payload::Text("dark".into())),
        (MessageType::SignData, Payload::Bytes(vec![1, 2, 3])),
    ] {
        let caller = handle.clone();
        callers.push(tokio::spawn(async move { caller.request(operation, payload).await }));
        settle().await;
    }

    wallet.handshake().await;

    let mut seen = Vec::new();
    let mut nonces = std::collections::HashSet::new();
    for _ in 0..3 {
        let request = wallet.next_request().await;
        assert!(nonces.insert(request.nonce.clone().unwrap()));
        seen.push(request.operation().unwrap());
        wallet.reply(&request, Payload::Bytes(vec![9]));
    }
    assert_eq!(
        seen,
        vec![MessageType::GetStatus, MessageType::SetTheme, MessageType::SignData]
    );

    for caller in callers {
        assert_eq!(within(caller).await.unwrap(), Ok(Payload::Bytes(vec![9])));
    }
}

#[tokio::test]
async fn test_five_failures_then_success() {
    let (handle, mut wallet) = setup();

    for _ in 0..5 {
        wallet.fail_handshake().await;
        wallet.expect_restart().await;
    }
    wallet.handshake().await;

    within(handle.wait_ready()).await.unwrap();
}

#[tokio::test]
async fn test_sixth_failure_is_terminal() {
    let (handle, mut wallet) = setup();
    let caller = handle.clone();
    let queued = tokio::spawn(async move { caller.get_status().await });
    settle().await;

    for _ in 0..5 {
        wallet.fail_handshake().await;
        wallet.expect_restart().await;
    }
    wallet.fail_handshake().await;

    assert_eq!(
        within(handle.wait_ready()).await,
        Err(ConnectorError::HandshakeFailed)
    );
    assert_eq!(handle.status(), ConnectorStatus::Failed);
    assert_eq!(
        within(queued).await.unwrap(),
        Err(ConnectorError::HandshakeFailed)
    );
    assert_eq!(
        within(handle.get_status()).await,
        Err(ConnectorError::HandshakeFailed)
    );
}

#[tokio::test]
async fn test_failures_are_counted() {
    let failed_before = HANDSHAKES_FAILED.get();
    let exhausted_before = CONNECTOR_FAILURES.get();
    let (handle, mut wallet) = setup();

    for _ in 0..5 {
        wallet.fail_handshake().await;
        wallet.expect_restart().await;
    }
    wallet.fail_handshake().await;
    assert_eq!(
        within(handle.wait_ready()).await,
        Err(ConnectorError::HandshakeFailed)
    );

    // Other tests share the global counters, so only a lower bound holds.
    assert!(HANDSHAKES_FAILED.get() >= failed_before + 6);
    assert!(CONNECTOR_FAILURES.get() >= exhausted_before + 1);
}

#[tokio::test]
async fn test_refused_restart_is_retried() {
    let (handle, mut wallet, control) = setup_flaky(3);

    wallet.fail_handshake().await;
    wallet.expect_restart().await;
    assert!(control.calls.load(Ordering::SeqCst) >= 4);
    assert!(handle.status().is_loading());

    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();
}

#[tokio::test]
async fn test_refused_restart_recovers_on_spontaneous_ready() {
    let (handle, mut wallet, control) = setup_flaky(u32::MAX);

    wallet.fail_handshake().await;
    settle().await;
    assert!(control.calls.load(Ordering::SeqCst) >= 2);
    assert!(wallet.nothing_sent());

    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    // Retrying stops once the wallet is back.
    let calls = control.calls.load(Ordering::SeqCst);
    settle().await;
    assert_eq!(control.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_success_resets_retry_counter() {
    let (handle, mut wallet) = setup();

    for _ in 0..4 {
        wallet.fail_handshake().await;
        wallet.expect_restart().await;
    }
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    // A wallet reload re-handshakes; five more failures are tolerated.
    for _ in 0..5 {
        wallet.fail_handshake().await;
        wallet.expect_restart().await;
    }
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();
}

#[tokio::test]
async fn test_handshake_operations_cannot_be_submitted() {
    let (handle, _wallet) = setup();
    assert_eq!(
        within(handle.request(MessageType::StartSession, Payload::Empty)).await,
        Err(ConnectorError::Rejected("UNSUPPORTED START_SESSION".into()))
    );
}

// =============================================================================
// RESPONSES
// =============================================================================

#[tokio::test]
async fn test_typed_helpers() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let caller = handle.clone();
    let theme = tokio::spawn(async move { caller.set_theme("dark").await });
    let request = wallet.next_request().await;
    assert_eq!(request.payload, Some(Payload::Text("dark".into())));
    wallet.reply(&request, Payload::Bool(true));
    assert_eq!(within(theme).await.unwrap(), Ok(true));

    let device_key = KeyPair::generate().public_key();
    let caller = handle.clone();
    let key = tokio::spawn(async move { caller.get_existed_device_public_key().await });
    let request = wallet.next_request().await;
    wallet.reply(&request, Payload::Bytes(device_key.to_spki().unwrap()));
    assert_eq!(within(key).await.unwrap(), Ok(device_key));
}

#[tokio::test]
async fn test_wallet_error_rejects_only_that_operation() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let caller = handle.clone();
    let signed = tokio::spawn(async move { caller.sign_data(vec![1]).await });
    let request = wallet.next_request().await;
    wallet.reject(&request, "UNSUPPORTED SIGN_DATA", None);

    assert_eq!(
        within(signed).await.unwrap(),
        Err(ConnectorError::Rejected("UNSUPPORTED SIGN_DATA".into()))
    );
    assert_eq!(handle.status(), ConnectorStatus::Ready);
}

#[tokio::test]
async fn test_forged_response_leaves_operation_outstanding() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let caller = handle.clone();
    let status = tokio::spawn(async move { caller.get_status().await });
    let request = wallet.next_request().await;

    // Same envelope, delivered from a foreign origin.
    let forged = wallet.answer(&request, Payload::Json(serde_json::json!({ "forged": true })));
    let rogue = wallet.side.port.impersonate(Endpoint::new(
        "https://evil.example",
        SourceId::new("wallet"),
    ));
    rogue.post(&forged).unwrap();
    settle().await;
    assert!(!status.is_finished());

    wallet.reply(&request, Payload::Json(serde_json::json!({ "forged": false })));
    let value = within(status).await.unwrap().unwrap();
    assert_eq!(value["forged"], false);
}

#[tokio::test]
async fn test_forged_handshake_answer_leaves_handshake_pending() {
    let (handle, mut wallet) = setup();
    wallet.ready();
    let request = wallet.next_request().await;
    assert_eq!(request.operation(), Some(MessageType::StartSession));

    // More forgeries than the retry budget, fewer than the breaker allows.
    let rogue = wallet.side.port.impersonate(Endpoint::new(
        "https://evil.example",
        SourceId::new("wallet"),
    ));
    for _ in 0..6 {
        let forged = wallet.handshake_answer(&request);
        rogue.post(&forged).unwrap();
    }
    settle().await;
    assert_eq!(handle.status(), ConnectorStatus::Handshaking);
    assert!(wallet.nothing_sent());

    wallet.accept(&request);
    within(handle.wait_ready()).await.unwrap();
    assert_eq!(handle.status(), ConnectorStatus::Ready);
    assert!(wallet.nothing_sent());
}

#[tokio::test]
async fn test_response_signed_by_wrong_key_is_ignored() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let caller = handle.clone();
    let signed = tokio::spawn(async move { caller.sign_transaction(vec![0x84]).await });
    let request = wallet.next_request().await;

    let session_id = wallet.session.as_ref().unwrap().session_id().to_string();
    let bogus = wallet
        .builder(MessageType::SignTransaction)
        .with_request_id(request.request_id.clone().unwrap())
        .success(Payload::Bytes(vec![0xEE]))
        .with_session(session_id)
        .sign(&KeyPair::generate())
        .unwrap();
    wallet.send(&bogus);
    settle().await;
    assert!(!signed.is_finished());

    wallet.reply(&request, Payload::Bytes(vec![0xAA]));
    assert_eq!(within(signed).await.unwrap(), Ok(vec![0xAA]));
}

// =============================================================================
// TERMINATION
// =============================================================================

#[tokio::test]
async fn test_terminate_session_rehandshakes() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let caller = handle.clone();
    let theme = tokio::spawn(async move { caller.set_theme("light").await });
    let request = wallet.next_request().await;
    wallet.reject(&request, "INVALID SESSION ID", Some(TerminationScope::Session));

    assert_eq!(
        within(theme).await.unwrap(),
        Err(ConnectorError::Rejected("INVALID SESSION ID".into()))
    );
    wallet.expect_restart().await;
    assert!(handle.status().is_loading());

    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();
}

#[tokio::test]
async fn test_terminate_full_destroys_connector() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let caller = handle.clone();
    let status = tokio::spawn(async move { caller.get_status().await });
    let request = wallet.next_request().await;
    wallet.reject(&request, "ANOMALY DETECTED", Some(TerminationScope::Full));

    assert_eq!(
        within(status).await.unwrap(),
        Err(ConnectorError::Rejected("ANOMALY DETECTED".into()))
    );
    assert_eq!(
        within(handle.wait_ready()).await,
        Err(ConnectorError::Destroyed)
    );
    assert_eq!(
        within(handle.get_status()).await,
        Err(ConnectorError::Destroyed)
    );
}

#[tokio::test]
async fn test_unsolicited_termination_is_ignored() {
    let (handle, mut wallet) = setup();
    wallet.handshake().await;
    within(handle.wait_ready()).await.unwrap();

    let stray = wallet
        .builder(MessageType::GetStatus)
        .error("INVALID SESSION ID", Some(TerminationScope::Full));
    wallet.send(&stray);
    settle().await;

    assert_eq!(handle.status(), ConnectorStatus::Ready);
}

#[tokio::test]
async fn test_destroy_rejects_queued_operations() {
    let (handle, _wallet) = setup();
    let caller = handle.clone();
    let queued = tokio::spawn(async move { caller.get_status().await });
    settle().await;

    within(handle.destroy()).await;

    assert_eq!(within(queued).await.unwrap(), Err(ConnectorError::Destroyed));
    assert_eq!(handle.status(), ConnectorStatus::Destroyed);
}

#[tokio::test]
async fn test_garbage_trips_anomaly_breaker() {
    let mut config = config();
    config.anomaly.max_error_count = 2;
    let (handle, wallet) = setup_with(config);

    wallet.side.port.post_raw(b"not json".to_vec()).unwrap();
    wallet.side.port.post_raw(b"{\"type\":\"NOPE\"}".to_vec()).unwrap();

    assert_eq!(
        within(handle.wait_ready()).await,
        Err(ConnectorError::Destroyed)
    );
}

#[tokio::test]
async fn test_spawn_rejects_invalid_config() {
    let (host, _wallet) = in_memory_channel(
        Endpoint::new(HOST_ORIGIN, SourceId::new("host")),
        Endpoint::new(WALLET_ORIGIN, SourceId::new("wallet")),
    );
    let config = ConnectorConfig {
        wallet_origin: String::new(),
        ..ConnectorConfig::default()
    };
    let ports = ConnectorPorts::in_memory(
        host,
        Arc::new(StaticDeviceIdentity::new(DEVICE)),
        Arc::new(FixedTimeSource::new(NOW)),
    );
    assert!(Connector::spawn(config, ports).is_err());
}
