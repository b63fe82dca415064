//! Validator specs for every known operation.
//!
//! The handshake runs on `Base`/`NoSession` shapes; everything else is
//! session-bound.

use shared_crypto::PublicKey;
use shared_types::{MessageType, Payload, WireEnvelope};

use super::shape::{EnvelopeShape, ValidatorSpec};

/// Public key carried as SPKI bytes in the payload.
pub fn resolve_spki(payload: &Payload) -> Option<PublicKey> {
    PublicKey::from_spki(payload.as_bytes()?).ok()
}

fn spki(payload: &Payload) -> bool {
    resolve_spki(payload).is_some()
}

fn empty(payload: &Payload) -> bool {
    matches!(payload, Payload::Empty)
}

fn text(payload: &Payload) -> bool {
    matches!(payload, Payload::Text(t) if !t.is_empty())
}

fn bytes(payload: &Payload) -> bool {
    matches!(payload, Payload::Bytes(b) if !b.is_empty())
}

fn empty_or_json(payload: &Payload) -> bool {
    matches!(payload, Payload::Empty | Payload::Json(_))
}

fn json(payload: &Payload) -> bool {
    matches!(payload, Payload::Json(_))
}

fn flag(payload: &Payload) -> bool {
    matches!(payload, Payload::Bool(_))
}

/// Spec for an incoming request of `operation`.
pub fn request_spec(operation: MessageType) -> ValidatorSpec {
    use MessageType::*;
    match operation {
        Ready => ValidatorSpec::new(EnvelopeShape::BaseRequest, operation).with_payload_check(empty),
        StartSession => ValidatorSpec::new(EnvelopeShape::NoSessionRequest, operation)
            .with_payload_check(spki)
            .with_resolver(resolve_spki),
        SetTheme => safety_request(operation).with_payload_check(text),
        SignTransaction | SignData | CreateOrAddSeed | EnterPin => {
            safety_request(operation).with_payload_check(bytes)
        }
        PrepareForTrading => safety_request(operation).with_payload_check(empty_or_json),
        GenerateDeviceKey | GetStatus | RemoveSeed | GetExistedDevicePublicKey | GetWalletInfo => {
            safety_request(operation).with_payload_check(empty)
        }
    }
}

/// Spec for a success response to `operation`.
pub fn success_spec(operation: MessageType) -> ValidatorSpec {
    use MessageType::*;
    match operation {
        Ready => ValidatorSpec::new(EnvelopeShape::BaseSuccessResponse, operation),
        StartSession => ValidatorSpec::new(EnvelopeShape::NoSessionResponse, operation)
            .with_payload_check(spki)
            .with_resolver(resolve_spki),
        GetStatus | GetWalletInfo => safety_response(operation).with_payload_check(json),
        SetTheme => safety_response(operation).with_payload_check(flag),
        GenerateDeviceKey | GetExistedDevicePublicKey => {
            safety_response(operation).with_payload_check(spki)
        }
        SignData | SignTransaction => safety_response(operation).with_payload_check(bytes),
        PrepareForTrading | CreateOrAddSeed | EnterPin | RemoveSeed => safety_response(operation),
    }
}

/// Spec for an error response to `operation`.
pub fn error_spec(operation: MessageType) -> ValidatorSpec {
    ValidatorSpec::new(EnvelopeShape::ErrorResponse, operation)
}

/// Success or error spec, chosen by the envelope's `kind`.
pub fn response_spec(operation: MessageType, envelope: &WireEnvelope) -> ValidatorSpec {
    if envelope.is_error() {
        error_spec(operation)
    } else {
        success_spec(operation)
    }
}

fn safety_request(operation: MessageType) -> ValidatorSpec {
    ValidatorSpec::new(EnvelopeShape::SafetyRequest, operation)
}

fn safety_response(operation: MessageType) -> ValidatorSpec {
    ValidatorSpec::new(EnvelopeShape::SafetySuccessResponse, operation)
}
