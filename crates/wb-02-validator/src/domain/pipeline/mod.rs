//! The ordered validation pipeline.
//!
//! Checks run in a fixed order and stop at the first failure. Only two
//! checks have side effects: the nonce (step 4) and the request id (step 11)
//! are registered as soon as their own check passes, even if a later check
//! fails. A rejected envelope's nonce is therefore spent; the sender must
//! mint a new one.

use shared_bus::{ChannelMessage, SourceId};
use shared_types::{
    is_uuid_v4, validate_timestamp, DecodeError, MessageType, Payload, ReplayRegistries,
    TerminationScope, TimeSource, ValidationError, ValidationPolicy, WireEnvelope,
};
use tracing::{debug, warn};
use wb_01_session::Session;

use super::shape::{EnvelopeShape, KeySource, ValidatorSpec};

/// Ambient state a validation runs against.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Device id every envelope must carry.
    pub expected_device_id: &'a str,
    /// Origins the peer may post from.
    pub allowed_origins: &'a [String],
    /// Identity of the peer context.
    pub expected_source: &'a SourceId,
    /// Live session snapshot (session-bound shapes).
    pub session: Option<&'a Session>,
    /// Nonce and request-id registries of this endpoint.
    pub registries: &'a ReplayRegistries,
    /// Clock for the freshness check.
    pub clock: &'a dyn TimeSource,
    /// Freshness tolerance.
    pub policy: &'a ValidationPolicy,
}

/// An envelope that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEnvelope {
    /// Operation it was validated as.
    pub operation: MessageType,
    /// Request id (echoed by responses).
    pub request_id: String,
    /// Payload; `Payload::Empty` for error responses.
    pub payload: Payload,
    /// Session id, if the shape carries one.
    pub session_id: Option<String>,
    /// Error label (error responses).
    pub message: Option<String>,
    /// Termination scope (error responses).
    pub terminate: Option<TerminationScope>,
}

/// Decode and validate a delivered channel message.
///
/// A decode failure is reported as `INVALID <OP> TYPE` when the `type` field
/// names a different operation, and as `INVALID <OP> SCHEMA` otherwise.
pub fn validate(
    spec: &ValidatorSpec,
    ctx: &ValidationContext<'_>,
    message: &ChannelMessage,
) -> Result<VerifiedEnvelope, ValidationError> {
    let envelope = match message.decode() {
        Ok(envelope) => envelope,
        Err(DecodeError::Malformed { message_type }) => {
            let err = if message_type == spec.operation.as_str() {
                ValidationError::InvalidSchema {
                    operation: spec.operation,
                }
            } else {
                ValidationError::InvalidType {
                    operation: spec.operation,
                }
            };
            warn!(operation = %spec.operation, label = %err, "Undecodable envelope rejected");
            return Err(err);
        }
    };
    validate_envelope(spec, ctx, &message.origin, &message.source, &envelope)
}

/// Run the ordered checks on a decoded envelope.
pub fn validate_envelope(
    spec: &ValidatorSpec,
    ctx: &ValidationContext<'_>,
    origin: &str,
    source: &SourceId,
    envelope: &WireEnvelope,
) -> Result<VerifiedEnvelope, ValidationError> {
    let result = run_checks(spec, ctx, origin, source, envelope);
    match &result {
        Ok(_) => debug!(
            operation = %spec.operation,
            shape = ?spec.shape,
            "Envelope verified"
        ),
        Err(err) => warn!(
            operation = %spec.operation,
            shape = ?spec.shape,
            label = %err,
            "Envelope rejected"
        ),
    }
    result
}

fn run_checks(
    spec: &ValidatorSpec,
    ctx: &ValidationContext<'_>,
    origin: &str,
    source: &SourceId,
    envelope: &WireEnvelope,
) -> Result<VerifiedEnvelope, ValidationError> {
    let op = spec.operation;
    let schema = ValidationError::InvalidSchema { operation: op };

    // 1. Type
    if envelope.message_type != op.as_str() {
        return Err(ValidationError::InvalidType { operation: op });
    }

    // 2. Structure
    let (Some(request_id), Some(timestamp), Some(device_id), Some(nonce)) = (
        envelope.request_id.as_deref(),
        envelope.timestamp,
        envelope.device_id.as_deref(),
        envelope.nonce.as_deref(),
    ) else {
        return Err(schema);
    };
    if envelope.kind != spec.shape.expected_kind() {
        return Err(schema);
    }
    if spec.shape.is_signed() && envelope.signature.is_none() {
        return Err(schema);
    }
    if spec.shape.requires_session_id() && envelope.session_id.is_none() {
        return Err(schema);
    }
    let payload = if spec.shape == EnvelopeShape::ErrorResponse {
        if envelope.message.is_none() {
            return Err(schema);
        }
        Payload::Empty
    } else {
        let Some(payload) = envelope.payload.clone() else {
            return Err(schema);
        };

        // 3. Payload shape
        if !(spec.payload_check)(&payload) {
            return Err(schema);
        }
        payload
    };

    // 4. Nonce
    if !ctx.registries.nonces.check_and_insert(nonce) {
        return Err(ValidationError::InvalidNonce);
    }

    // 5. Freshness
    if !validate_timestamp(timestamp, ctx.clock.now_ms(), ctx.policy.timestamp_tolerance_ms) {
        return Err(ValidationError::InvalidTimestamp);
    }

    // 6. Origin
    if !ctx.allowed_origins.iter().any(|o| o == origin) {
        return Err(ValidationError::InvalidOrigin);
    }

    // 7. Source
    if source != ctx.expected_source {
        return Err(ValidationError::InvalidSource);
    }

    // 8. Device
    if device_id != ctx.expected_device_id {
        return Err(ValidationError::InvalidDeviceId);
    }

    // 9. Session binding
    if spec.shape.is_session_bound() {
        let bound = match (ctx.session, envelope.session_id.as_deref()) {
            (Some(session), Some(candidate)) => session.verify_session_id(candidate),
            _ => false,
        };
        if !bound {
            return Err(ValidationError::InvalidSessionId);
        }
    }

    // 10. Signature
    if spec.shape.is_signed() {
        let key = match spec.key_source {
            KeySource::Session => ctx.session.map(|s| *s.remote_key()),
            KeySource::Resolver(resolve) => resolve(&payload),
            KeySource::None => None,
        };
        let verified = match (key, envelope.signature.as_deref(), envelope.signing_input()) {
            (Some(key), Some(signature), Some(input)) => key.verify(&input, signature),
            _ => false,
        };
        if !verified {
            return Err(ValidationError::InvalidSignature);
        }
    }

    // 11. Request id
    if spec.shape.is_request()
        && !(is_uuid_v4(request_id) && ctx.registries.request_ids.check_and_insert(request_id))
    {
        return Err(ValidationError::InvalidRequestId);
    }

    Ok(VerifiedEnvelope {
        operation: op,
        request_id: request_id.to_string(),
        payload,
        session_id: envelope.session_id.clone(),
        message: envelope.message.clone(),
        terminate: envelope.terminate,
    })
}
