//! Connector actor.
//!
//! One task owns every piece of mutable connector state and serializes
//! three event sources:
//!
//! - commands from [`ConnectorHandle`]s (submit, destroy)
//! - envelopes and channel closure from the wallet inbox
//! - the anomaly request-window tick

use bridge_telemetry::{
    metric_inc, ANOMALY_TRIPS, CONNECTOR_FAILURES, ENVELOPES_RECEIVED, ENVELOPES_SENT,
    HANDSHAKES_COMPLETED, HANDSHAKES_FAILED, TERMINATIONS, VALIDATION_FAILURES,
};
use shared_bus::{
    ChannelEvent, ChannelMessage, ContextControl, HostSide, Inbox, MessagePort, SourceId,
};
use shared_crypto::KeyPair;
use shared_types::{
    ConfigError, DeviceIdentity, EnvelopeBuilder, MessageType, Payload, ReplayRegistries,
    TerminationScope, TimeSource, ValidationPolicy, WireEnvelope,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wb_01_session::{Session, SessionSlot};
use wb_02_validator::{
    request_spec, resolve_spki, response_spec, success_spec, validate, validate_envelope,
    AnomalyAnalyzer, GuardedError, ValidationContext, VerifiedEnvelope,
};

use crate::config::ConnectorConfig;
use crate::domain::errors::ConnectorError;
use crate::domain::queue::{BackupQueue, OutstandingOperations, QueuedOperation, Reply};
use crate::domain::retry::{HandshakeRetry, RetryDecision};
use crate::domain::status::ConnectorStatus;
use crate::handle::ConnectorHandle;

const SIDE: &str = "host";

/// Requests from handles to the actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Send (or queue) an operation.
    Submit {
        operation: MessageType,
        payload: Payload,
        reply: Reply,
    },
    /// Stop the connector and reject every caller.
    Destroy { done: oneshot::Sender<()> },
}

/// Collaborators the connector runs against.
pub struct ConnectorPorts {
    /// Stable device identifier placed in every envelope.
    pub device: Arc<dyn DeviceIdentity>,
    /// Posts envelopes to the wallet context.
    pub port: Arc<dyn MessagePort>,
    /// Reloads the wallet context.
    pub control: Arc<dyn ContextControl>,
    /// Envelopes from the wallet context.
    pub inbox: Inbox,
    /// Clock for timestamps and freshness.
    pub clock: Arc<dyn TimeSource>,
}

impl ConnectorPorts {
    /// Ports over the host end of an in-memory channel.
    pub fn in_memory(
        host: HostSide,
        device: Arc<dyn DeviceIdentity>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            device,
            port: Arc::new(host.port),
            control: Arc::new(host.control),
            inbox: host.inbox,
            clock,
        }
    }
}

/// Entry point for starting a connector.
pub struct Connector;

impl Connector {
    /// Validate `config` and spawn the connector task.
    ///
    /// Must be called from within a tokio runtime. The connector starts in
    /// [`ConnectorStatus::Loading`] and waits for the wallet's `READY`.
    pub fn spawn(
        config: ConnectorConfig,
        ports: ConnectorPorts,
    ) -> Result<ConnectorHandle, ConfigError> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (status_tx, status_rx) = watch::channel(ConnectorStatus::Loading);
        let ConnectorPorts {
            device,
            port,
            control,
            inbox,
            clock,
        } = ports;

        let service = ConnectorService {
            device_id: device.device_id(),
            allowed_origins: vec![config.wallet_origin.clone()],
            expected_source: SourceId::new(config.wallet_source.clone()),
            policy: config.policy,
            retry: HandshakeRetry::new(config.max_handshake_retries),
            analyzer: AnomalyAnalyzer::new(config.anomaly.clone()),
            port,
            control,
            clock,
            registries: ReplayRegistries::new(),
            slot: SessionSlot::new(),
            pending_handshake: None,
            restart_pending: false,
            backup: BackupQueue::new(),
            outstanding: OutstandingOperations::new(),
            status: status_tx,
        };

        info!(
            wallet_origin = %config.wallet_origin,
            max_handshake_retries = config.max_handshake_retries,
            "Connector starting"
        );
        tokio::spawn(service.run(command_rx, inbox));

        Ok(ConnectorHandle::new(command_tx, status_rx))
    }
}

/// Whether the actor loop keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// `START_SESSION` sent, answer not yet received.
struct PendingHandshake {
    request_id: String,
    key: KeyPair,
}

struct ConnectorService {
    device_id: String,
    allowed_origins: Vec<String>,
    expected_source: SourceId,
    policy: ValidationPolicy,
    retry: HandshakeRetry,
    analyzer: AnomalyAnalyzer,
    port: Arc<dyn MessagePort>,
    control: Arc<dyn ContextControl>,
    clock: Arc<dyn TimeSource>,
    registries: ReplayRegistries,
    slot: SessionSlot,
    pending_handshake: Option<PendingHandshake>,
    restart_pending: bool,
    backup: BackupQueue,
    outstanding: OutstandingOperations,
    status: watch::Sender<ConnectorStatus>,
}

impl ConnectorService {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut inbox: Inbox) {
        let mut ticker = tokio::time::interval(self.analyzer.config().rps_window());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let flow = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit { operation, payload, reply }) => {
                        self.submit(QueuedOperation { operation, payload, reply });
                        Flow::Continue
                    }
                    Some(Command::Destroy { done }) => {
                        info!("Connector destroyed by caller");
                        self.shutdown(ConnectorStatus::Destroyed, ConnectorError::Destroyed);
                        let _ = done.send(());
                        Flow::Stop
                    }
                    None => {
                        debug!("Every connector handle dropped");
                        self.shutdown(ConnectorStatus::Destroyed, ConnectorError::Destroyed);
                        Flow::Stop
                    }
                },
                event = inbox.recv() => match event {
                    Some(ChannelEvent::Message(message)) => self.on_message(message),
                    Some(ChannelEvent::Restart) => {
                        debug!("Ignoring restart signal on host inbox");
                        Flow::Continue
                    }
                    None => {
                        warn!("Wallet channel closed");
                        self.shutdown(ConnectorStatus::Destroyed, ConnectorError::Channel);
                        Flow::Stop
                    }
                },
                _ = ticker.tick() => {
                    self.analyzer.tick();
                    if self.restart_pending {
                        self.request_restart();
                    }
                    Flow::Continue
                }
            };
            if flow == Flow::Stop {
                break;
            }
        }

        inbox.close();
        debug!(status = %self.current_status(), "Connector stopped");
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    fn submit(&mut self, operation: QueuedOperation) {
        if operation.operation.is_handshake() {
            let label = format!("UNSUPPORTED {}", operation.operation);
            operation.resolve(Err(ConnectorError::Rejected(label)));
            return;
        }
        if self.current_status() == ConnectorStatus::Ready {
            self.send_operation(operation);
        } else {
            self.backup.push(operation);
        }
    }

    /// Build, sign and post a session-bound request.
    fn send_operation(&mut self, operation: QueuedOperation) {
        let Some(session) = self.slot.current() else {
            self.backup.push(operation);
            return;
        };

        let builder = EnvelopeBuilder::new(operation.operation, &self.device_id, self.clock.as_ref());
        let request_id = builder.request_id().to_string();
        let envelope = match builder
            .request(operation.payload.clone())
            .with_session(session.session_id())
            .sign(session.local_key())
        {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(operation = %operation.operation, error = %e, "Failed to sign request");
                operation.resolve(Err(ConnectorError::Signing));
                return;
            }
        };

        if !self.post(&envelope) {
            operation.resolve(Err(ConnectorError::Channel));
            return;
        }
        self.outstanding
            .register(request_id, operation.operation, operation.reply);
    }

    fn post(&self, envelope: &WireEnvelope) -> bool {
        match self.port.post(envelope) {
            Ok(()) => {
                metric_inc!(ENVELOPES_SENT, &[SIDE, envelope.message_type.as_str()]);
                true
            }
            Err(e) => {
                warn!(message_type = %envelope.message_type, error = %e, "Failed to post envelope");
                false
            }
        }
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    fn on_message(&mut self, message: ChannelMessage) -> Flow {
        let message_type = message.message_type();
        let Ok(operation) = message_type.parse::<MessageType>() else {
            warn!(message_type = %message_type, origin = %message.origin, "Dropping envelope of unknown type");
            return self.count_unknown();
        };

        if operation == MessageType::Ready {
            return self.on_ready(&message);
        }

        let session = self.slot.current();
        let ctx = self.context(session.as_deref());
        let result = self.analyzer.apply_to_validator(|| match message.decode() {
            Ok(envelope) => validate_envelope(
                &response_spec(operation, &envelope),
                &ctx,
                &message.origin,
                &message.source,
                &envelope,
            ),
            Err(_) => validate(&success_spec(operation), &ctx, &message),
        });

        match result {
            Ok(verified) => {
                metric_inc!(ENVELOPES_RECEIVED, &[SIDE, operation.as_str()]);
                if operation == MessageType::StartSession {
                    self.on_handshake_response(verified)
                } else {
                    self.on_response(verified)
                }
            }
            Err(GuardedError::Anomaly(_)) => self.trip(),
            Err(GuardedError::Inner(err)) => {
                metric_inc!(VALIDATION_FAILURES, &[SIDE, err.metric_label()]);
                debug!(
                    operation = %operation,
                    origin = %message.origin,
                    error = %err,
                    "Dropping invalid response"
                );
                // Whatever it claimed to answer stays pending.
                Flow::Continue
            }
        }
    }

    fn on_ready(&mut self, message: &ChannelMessage) -> Flow {
        let ctx = self.context(None);
        let result = self
            .analyzer
            .apply_to_validator(|| validate(&request_spec(MessageType::Ready), &ctx, message));

        match result {
            Ok(_) => {
                metric_inc!(ENVELOPES_RECEIVED, &[SIDE, MessageType::Ready.as_str()]);
                self.restart_pending = false;
                self.start_handshake()
            }
            Err(GuardedError::Anomaly(_)) => self.trip(),
            Err(GuardedError::Inner(err)) => {
                metric_inc!(VALIDATION_FAILURES, &[SIDE, err.metric_label()]);
                Flow::Continue
            }
        }
    }

    fn count_unknown(&mut self) -> Flow {
        let result = self.analyzer.apply_to_validator(|| Err::<(), _>(()));
        match result {
            Err(GuardedError::Anomaly(_)) => self.trip(),
            _ => Flow::Continue,
        }
    }

    fn context<'a>(&'a self, session: Option<&'a Session>) -> ValidationContext<'a> {
        ValidationContext {
            expected_device_id: &self.device_id,
            allowed_origins: &self.allowed_origins,
            expected_source: &self.expected_source,
            session,
            registries: &self.registries,
            clock: self.clock.as_ref(),
            policy: &self.policy,
        }
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    fn start_handshake(&mut self) -> Flow {
        if self.pending_handshake.is_some() {
            debug!("Superseding pending handshake");
        }

        let key = KeyPair::generate();
        let builder = EnvelopeBuilder::new(
            MessageType::StartSession,
            &self.device_id,
            self.clock.as_ref(),
        );
        let request_id = builder.request_id().to_string();
        let envelope = key
            .public_key()
            .to_spki()
            .and_then(|spki| builder.request(Payload::Bytes(spki)).sign(&key));
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Failed to build handshake request");
                return self.handshake_failed("SIGNING FAILED");
            }
        };

        if !self.post(&envelope) {
            return self.handshake_failed("CHANNEL UNAVAILABLE");
        }

        info!(
            request_id = %request_id,
            key = %key.public_key().fingerprint(),
            attempt = self.retry.attempts() + 1,
            "Handshake started"
        );
        self.pending_handshake = Some(PendingHandshake { request_id, key });
        self.set_status(ConnectorStatus::Handshaking);
        Flow::Continue
    }

    fn on_handshake_response(&mut self, verified: VerifiedEnvelope) -> Flow {
        let matches = self
            .pending_handshake
            .as_ref()
            .is_some_and(|pending| pending.request_id == verified.request_id);
        if !matches {
            warn!(request_id = %verified.request_id, "Unsolicited handshake response dropped");
            return Flow::Continue;
        }
        let Some(pending) = self.pending_handshake.take() else {
            return Flow::Continue;
        };

        if let Some(label) = verified.message {
            return self.handshake_failed(&label);
        }

        let (Some(remote), Some(session_id)) =
            (resolve_spki(&verified.payload), verified.session_id)
        else {
            return self.handshake_failed("INVALID START_SESSION SCHEMA");
        };

        let session = Session::establish(pending.key, remote, session_id);
        self.slot.replace(session);
        self.retry.reset();
        metric_inc!(HANDSHAKES_COMPLETED, &[SIDE]);
        info!(
            remote = %remote.fingerprint(),
            queued = self.backup.len(),
            "Handshake completed"
        );
        self.set_status(ConnectorStatus::Ready);

        for operation in self.backup.drain() {
            self.send_operation(operation);
        }
        Flow::Continue
    }

    fn handshake_failed(&mut self, reason: &str) -> Flow {
        self.pending_handshake = None;
        metric_inc!(HANDSHAKES_FAILED);

        match self.retry.record_failure() {
            RetryDecision::Restart { attempt } => {
                warn!(reason = %reason, attempt, "Handshake failed, restarting wallet context");
                self.set_status(ConnectorStatus::Loading);
                self.request_restart();
                Flow::Continue
            }
            RetryDecision::GiveUp { attempts } => {
                error!(reason = %reason, attempts, "Handshake retries exhausted");
                metric_inc!(CONNECTOR_FAILURES);
                self.shutdown(ConnectorStatus::Failed, ConnectorError::HandshakeFailed);
                Flow::Stop
            }
        }
    }

    // =========================================================================
    // RESPONSES
    // =========================================================================

    fn on_response(&mut self, verified: VerifiedEnvelope) -> Flow {
        let VerifiedEnvelope {
            operation,
            request_id,
            payload,
            message,
            terminate,
            ..
        } = verified;

        let Some(label) = message else {
            if !self.outstanding.complete(&request_id, operation, Ok(payload)) {
                debug!(request_id = %request_id, operation = %operation, "Response for unknown request dropped");
            }
            return Flow::Continue;
        };

        // Only an error answering one of our requests may terminate anything.
        if !self
            .outstanding
            .complete(&request_id, operation, Err(ConnectorError::Rejected(label.clone())))
        {
            debug!(request_id = %request_id, label = %label, "Unsolicited error envelope dropped");
            return Flow::Continue;
        }
        debug!(request_id = %request_id, label = %label, "Operation rejected by wallet");

        match terminate {
            None => Flow::Continue,
            Some(TerminationScope::Session) => {
                metric_inc!(TERMINATIONS, &[SIDE, "session"]);
                self.terminate_session(&label);
                Flow::Continue
            }
            Some(TerminationScope::Full) => {
                metric_inc!(TERMINATIONS, &[SIDE, "full"]);
                warn!(label = %label, "Wallet terminated the connector");
                self.shutdown(ConnectorStatus::Destroyed, ConnectorError::Terminated);
                Flow::Stop
            }
        }
    }

    /// Drop the session and re-handshake.
    fn terminate_session(&mut self, label: &str) {
        if self.slot.clear().is_none() {
            return;
        }
        let rejected = self.outstanding.reject_all(&ConnectorError::SessionTerminated);
        warn!(label = %label, rejected, "Session terminated by wallet, re-handshaking");
        self.set_status(ConnectorStatus::Loading);
        self.request_restart();
    }

    /// Ask for a wallet reload. A refused request is retried every tick
    /// until it goes through or the wallet announces `READY` on its own.
    fn request_restart(&mut self) {
        match self.control.restart() {
            Ok(()) => self.restart_pending = false,
            Err(e) => {
                if !self.restart_pending {
                    warn!(error = %e, "Wallet restart request failed, retrying on next tick");
                }
                self.restart_pending = true;
            }
        }
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    fn trip(&mut self) -> Flow {
        metric_inc!(ANOMALY_TRIPS, &[SIDE]);
        error!(snapshot = ?self.analyzer.snapshot(), "Anomaly breaker tripped, destroying connector");
        self.shutdown(ConnectorStatus::Destroyed, ConnectorError::Anomaly);
        Flow::Stop
    }

    fn shutdown(&mut self, status: ConnectorStatus, error: ConnectorError) {
        self.pending_handshake = None;
        self.restart_pending = false;
        self.slot.clear();
        let queued = self.backup.reject_all(&error);
        let oldest_ms = self
            .outstanding
            .oldest_age()
            .map_or(0, |age| age.as_millis() as u64);
        let outstanding = self.outstanding.reject_all(&error);
        info!(
            status = %status,
            reason = %error,
            queued,
            outstanding,
            oldest_ms,
            "Connector shut down"
        );
        self.set_status(status);
    }

    fn current_status(&self) -> ConnectorStatus {
        *self.status.borrow()
    }

    fn set_status(&self, status: ConnectorStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(from = %previous, to = %status, "Connector status changed");
        }
    }
}

#[cfg(test)]
mod tests;
