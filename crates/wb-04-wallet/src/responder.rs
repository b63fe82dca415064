//! Wallet responder: validates every inbound envelope and builds the reply.

use bridge_telemetry::{
    metric_inc, ANOMALY_TRIPS, ENVELOPES_RECEIVED, HANDSHAKES_COMPLETED, TERMINATIONS,
    VALIDATION_FAILURES,
};
use shared_bus::{ChannelMessage, SourceId};
use shared_crypto::CryptoError;
use shared_types::{
    ConfigError, DeviceIdentity, EnvelopeBuilder, MessageType, Payload, ReplayRegistries,
    TerminationScope, TimeSource, ValidationError, ValidationPolicy, WireEnvelope,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wb_01_session::{Session, SessionIssuer, SessionSlot};
use wb_02_validator::{
    request_spec, resolve_spki, validate, AnomalyAnalyzer, GuardedError,
    ValidationContext, VerifiedEnvelope,
};

use crate::config::WalletConfig;
use crate::domain::errors::WalletError;
use crate::domain::handlers::HandlerRegistry;

const SIDE: &str = "wallet";

/// Wallet end of the protocol.
///
/// Holds the session issuer, the single live session, the replay
/// registries and the breaker. Safe to share between tasks.
pub struct WalletResponder {
    device_id: String,
    allowed_origins: Vec<String>,
    expected_source: SourceId,
    policy: ValidationPolicy,
    clock: Arc<dyn TimeSource>,
    issuer: Arc<SessionIssuer>,
    slot: SessionSlot,
    registries: ReplayRegistries,
    analyzer: AnomalyAnalyzer,
    handlers: HandlerRegistry,
}

impl WalletResponder {
    /// Create a responder after validating `config`.
    pub fn new(
        config: WalletConfig,
        device: &dyn DeviceIdentity,
        clock: Arc<dyn TimeSource>,
        handlers: HandlerRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            device_id: device.device_id(),
            expected_source: SourceId::new(config.host_source),
            allowed_origins: config.allowed_origins,
            policy: config.policy,
            issuer: Arc::new(SessionIssuer::new(clock.clone())),
            clock,
            slot: SessionSlot::new(),
            registries: ReplayRegistries::new(),
            analyzer: AnomalyAnalyzer::new(config.anomaly),
            handlers,
        })
    }

    /// The `READY` announcement.
    pub fn ready_signal(&self) -> WireEnvelope {
        self.builder(MessageType::Ready).request(Payload::Empty)
    }

    /// Answer one inbound message.
    ///
    /// Returns `None` when nothing should be sent back: messages of unknown
    /// type and stray `READY`s.
    pub async fn handle(&self, message: &ChannelMessage) -> Option<WireEnvelope> {
        let message_type = message.message_type();
        let Ok(operation) = message_type.parse::<MessageType>() else {
            warn!(message_type = %message_type, origin = %message.origin, "Dropping envelope of unknown type");
            if let Err(GuardedError::Anomaly(_)) =
                self.analyzer.apply_to_validator(|| Err::<(), _>(()))
            {
                self.trip();
            }
            return None;
        };

        match operation {
            MessageType::Ready => {
                debug!("Ignoring READY from host");
                None
            }
            MessageType::StartSession => Some(self.accept_handshake(message)),
            _ => Some(self.serve(operation, message).await),
        }
    }

    /// Forget the session (context reload).
    pub fn reload(&self) {
        if self.slot.clear().is_some() {
            info!("Wallet context reloaded, session dropped");
        }
    }

    /// Reset the breaker's request window.
    pub fn tick(&self) {
        self.analyzer.tick();
    }

    /// Request window configured for the breaker.
    pub fn tick_interval(&self) -> std::time::Duration {
        self.analyzer.config().rps_window()
    }

    /// Token of the live session.
    pub fn session_id(&self) -> Option<String> {
        self.slot.current().map(|s| s.session_id().to_string())
    }

    /// Whether the breaker tripped.
    pub fn is_destroyed(&self) -> bool {
        self.analyzer.is_destroyed()
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    fn accept_handshake(&self, message: &ChannelMessage) -> WireEnvelope {
        let operation = MessageType::StartSession;
        let verified = match self.guarded(operation, message, None) {
            Ok(verified) => verified,
            Err(reply) => return reply,
        };

        let Some(remote) = resolve_spki(&verified.payload) else {
            let err = ValidationError::InvalidSchema { operation };
            return self.error_reply(operation, Some(verified.request_id), &err.to_string(), None);
        };

        let reply = Session::create(remote, &self.issuer)
            .map_err(|e| {
                error!(error = %e, "Failed to create session");
                CryptoError::SigningFailed
            })
            .and_then(|session| {
                let spki = session.local_public_key().to_spki()?;
                let reply = self
                    .builder(operation)
                    .with_request_id(verified.request_id.clone())
                    .success(Payload::Bytes(spki))
                    .with_session(session.session_id())
                    .sign(session.local_key())?;
                Ok((session, reply))
            });

        match reply {
            Ok((session, reply)) => {
                info!(
                    remote = %remote.fingerprint(),
                    local = %session.local_public_key().fingerprint(),
                    "Handshake accepted"
                );
                self.slot.replace(session);
                metric_inc!(HANDSHAKES_COMPLETED, &[SIDE]);
                reply
            }
            Err(e) => {
                error!(error = %e, "Failed to answer handshake");
                self.error_reply(operation, Some(verified.request_id), "SIGNING FAILED", None)
            }
        }
    }

    // =========================================================================
    // SESSION-BOUND REQUESTS
    // =========================================================================

    async fn serve(&self, operation: MessageType, message: &ChannelMessage) -> WireEnvelope {
        let session = self.slot.current();
        let verified = match self.guarded(operation, message, session.as_deref()) {
            Ok(verified) => verified,
            Err(reply) => return reply,
        };

        let Some(handler) = self.handlers.get(operation) else {
            let err = WalletError::Unsupported(operation);
            debug!(operation = %operation, "No handler registered");
            return self.error_reply(operation, Some(verified.request_id), &err.to_string(), None);
        };

        let request_id = verified.request_id;
        match handler.handle(verified.payload).await {
            Ok(payload) => {
                let reply = session
                    .as_deref()
                    .ok_or(CryptoError::SigningFailed)
                    .and_then(|session| {
                        self.builder(operation)
                            .with_request_id(request_id.clone())
                            .success(payload)
                            .with_session(session.session_id())
                            .sign(session.local_key())
                    });
                match reply {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(operation = %operation, error = %e, "Failed to sign response");
                        self.error_reply(operation, Some(request_id), "SIGNING FAILED", None)
                    }
                }
            }
            Err(e) => {
                warn!(operation = %operation, error = ?e, "Operation failed");
                self.error_reply(operation, Some(request_id), &e.to_string(), None)
            }
        }
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Validate under the breaker, or produce the error reply.
    fn guarded(
        &self,
        operation: MessageType,
        message: &ChannelMessage,
        session: Option<&Session>,
    ) -> Result<VerifiedEnvelope, WireEnvelope> {
        let ctx = self.context(session);
        let spec = request_spec(operation);
        match self
            .analyzer
            .apply_to_validator(|| validate(&spec, &ctx, message))
        {
            Ok(verified) => {
                metric_inc!(ENVELOPES_RECEIVED, &[SIDE, operation.as_str()]);
                Ok(verified)
            }
            Err(GuardedError::Anomaly(anomaly)) => {
                self.trip();
                Err(self.error_reply(
                    operation,
                    echo_request_id(message),
                    &anomaly.to_string(),
                    Some(TerminationScope::Full),
                ))
            }
            Err(GuardedError::Inner(err)) => {
                metric_inc!(VALIDATION_FAILURES, &[SIDE, err.metric_label()]);
                let terminate = (err == ValidationError::InvalidSessionId)
                    .then_some(TerminationScope::Session);
                if terminate.is_some() {
                    metric_inc!(TERMINATIONS, &[SIDE, "session"]);
                }
                Err(self.error_reply(
                    operation,
                    echo_request_id(message),
                    &err.to_string(),
                    terminate,
                ))
            }
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

    fn trip(&self) {
        if self.slot.clear().is_some() {
            debug!("Session dropped by anomaly breaker");
        }
        metric_inc!(ANOMALY_TRIPS, &[SIDE]);
        error!(snapshot = ?self.analyzer.snapshot(), "Anomaly breaker tripped, refusing further requests");
    }

    // =========================================================================
    // REPLIES
    // =========================================================================

    fn builder(&self, operation: MessageType) -> EnvelopeBuilder {
        EnvelopeBuilder::new(operation, &self.device_id, self.clock.as_ref())
    }

    fn error_reply(
        &self,
        operation: MessageType,
        request_id: Option<String>,
        label: &str,
        terminate: Option<TerminationScope>,
    ) -> WireEnvelope {
        let builder = self.builder(operation);
        let builder = match request_id {
            Some(id) => builder.with_request_id(id),
            None => builder,
        };
        builder.error(label, terminate)
    }
}

/// Request id of an envelope that may not have passed validation.
fn echo_request_id(message: &ChannelMessage) -> Option<String> {
    message.decode().ok().and_then(|envelope| envelope.request_id)
}
