//! # Wire Envelope
//!
//! The unit exchanged over the message channel in both directions.
//!
//! ## Shape
//!
//! Every envelope carries `type`, `requestId`, `timestamp`, `deviceId` and
//! `nonce`. Signed envelopes add `signature`, session-bound envelopes add
//! `sessionId`, responses add `kind` plus either `payload` or `message`
//! (and optionally `terminate`).
//!
//! The struct keeps every field optional on purpose: presence is a property
//! checked by the validator for the expected shape, not by deserialization.
//!
//! ## Signature Binding
//!
//! A signature never covers the raw payload alone. It covers
//! `payload · timestamp · deviceId · requestId · nonce` (see
//! [`signing_input`]), so a valid signature cannot be replayed under a
//! different timestamp, request id, nonce or device.

use crate::errors::DecodeError;
use crate::security::TimeSource;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use shared_crypto::{CryptoError, KeyPair};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Operation names carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Wallet context finished loading and can accept a handshake.
    Ready,
    /// Ephemeral key exchange.
    StartSession,
    /// Warm up the wallet before trading flows.
    PrepareForTrading,
    /// Switch the wallet UI theme.
    SetTheme,
    /// Sign a CBOR-encoded transaction.
    SignTransaction,
    /// Sign arbitrary data with the device key.
    SignData,
    /// Create and persist a device key pair.
    GenerateDeviceKey,
    /// Query wallet status.
    GetStatus,
    /// Create a seed or add one to the wallet.
    CreateOrAddSeed,
    /// Unlock with a PIN.
    EnterPin,
    /// Delete the stored seed.
    RemoveSeed,
    /// Read back the persisted device public key.
    GetExistedDevicePublicKey,
    /// Query wallet metadata.
    GetWalletInfo,
}

impl MessageType {
    /// Every known operation.
    pub const ALL: [MessageType; 13] = [
        MessageType::Ready,
        MessageType::StartSession,
        MessageType::PrepareForTrading,
        MessageType::SetTheme,
        MessageType::SignTransaction,
        MessageType::SignData,
        MessageType::GenerateDeviceKey,
        MessageType::GetStatus,
        MessageType::CreateOrAddSeed,
        MessageType::EnterPin,
        MessageType::RemoveSeed,
        MessageType::GetExistedDevicePublicKey,
        MessageType::GetWalletInfo,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Ready => "READY",
            MessageType::StartSession => "START_SESSION",
            MessageType::PrepareForTrading => "PREPARE_FOR_TRADING",
            MessageType::SetTheme => "SET_THEME",
            MessageType::SignTransaction => "SIGN_TRANSACTION",
            MessageType::SignData => "SIGN_DATA",
            MessageType::GenerateDeviceKey => "GENERATE_DEVICE_KEY",
            MessageType::GetStatus => "GET_STATUS",
            MessageType::CreateOrAddSeed => "CREATE_OR_ADD_SEED",
            MessageType::EnterPin => "ENTER_PIN",
            MessageType::RemoveSeed => "REMOVE_SEED",
            MessageType::GetExistedDevicePublicKey => "GET_EXISTED_DEVICE_PUBLIC_KEY",
            MessageType::GetWalletInfo => "GET_WALLET_INFO",
        }
    }

    /// Handshake-phase operations that precede any session.
    pub fn is_handshake(&self) -> bool {
        matches!(self, MessageType::Ready | MessageType::StartSession)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Response outcome discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Carries `payload`.
    Success,
    /// Carries `message` and optionally `terminate`.
    Error,
}

/// How much state an error response invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationScope {
    /// Drop the current session; the connector survives.
    Session,
    /// Tear down the whole connector.
    Full,
}

impl fmt::Display for TerminationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationScope::Session => write!(f, "session"),
            TerminationScope::Full => write!(f, "full"),
        }
    }
}

/// Operation payload.
///
/// The validator never inspects it beyond the per-operation shape check; it
/// only needs its signing bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// No payload.
    Empty,
    /// UTF-8 text.
    Text(String),
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Number(i64),
    /// Raw bytes (keys, CBOR, signatures, sealed containers).
    Bytes(Vec<u8>),
    /// Structured value.
    Json(serde_json::Value),
}

impl Payload {
    /// Bytes covered by a signature.
    ///
    /// Structured values use their JSON encoding, primitives are stringified.
    pub fn signing_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Empty => Vec::new(),
            Payload::Text(s) => s.as_bytes().to_vec(),
            Payload::Bool(b) => b.to_string().into_bytes(),
            Payload::Number(n) => n.to_string().into_bytes(),
            Payload::Bytes(b) => b.clone(),
            Payload::Json(v) => serde_json::to_vec(v).unwrap_or_default(),
        }
    }

    /// Borrow the bytes of a `Bytes` payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow the text of a `Text` payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Assemble the exact bytes a signature covers.
pub fn signing_input(
    payload: &Payload,
    timestamp: u64,
    device_id: &str,
    request_id: &str,
    nonce: &str,
) -> Vec<u8> {
    let mut out = payload.signing_bytes();
    out.extend_from_slice(timestamp.to_string().as_bytes());
    out.extend_from_slice(device_id.as_bytes());
    out.extend_from_slice(request_id.as_bytes());
    out.extend_from_slice(nonce.as_bytes());
    out
}

/// The envelope as it travels over the channel.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireEnvelope {
    /// Operation name (validated against the expected operation).
    #[serde(rename = "type")]
    pub message_type: String,
    /// Version-4 UUID. Responses echo the request's id.
    pub request_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: Option<u64>,
    /// Caller-supplied stable device identifier.
    pub device_id: Option<String>,
    /// Single-use random token.
    pub nonce: Option<String>,
    /// ECDSA signature over [`WireEnvelope::signing_input`].
    pub signature: Option<Vec<u8>>,
    /// Session token issued by the wallet during the handshake.
    pub session_id: Option<String>,
    /// Present on responses only.
    pub kind: Option<ResponseKind>,
    /// Request or success payload.
    pub payload: Option<Payload>,
    /// Error label on error responses.
    pub message: Option<String>,
    /// Termination scope on error responses.
    pub terminate: Option<TerminationScope>,
}

impl WireEnvelope {
    /// Parse the operation name.
    pub fn operation(&self) -> Option<MessageType> {
        self.message_type.parse().ok()
    }

    /// True for `kind: "error"` responses.
    pub fn is_error(&self) -> bool {
        self.kind == Some(ResponseKind::Error)
    }

    /// True for `kind: "success"` responses.
    pub fn is_success(&self) -> bool {
        self.kind == Some(ResponseKind::Success)
    }

    /// Bytes the signature must cover, if every bound field is present.
    pub fn signing_input(&self) -> Option<Vec<u8>> {
        Some(signing_input(
            self.payload.as_ref()?,
            self.timestamp?,
            self.device_id.as_deref()?,
            self.request_id.as_deref()?,
            self.nonce.as_deref()?,
        ))
    }

    /// Sign with `key`, replacing any previous signature.
    pub fn sign(mut self, key: &KeyPair) -> Result<Self, CryptoError> {
        let input = self.signing_input().ok_or(CryptoError::SigningFailed)?;
        self.signature = Some(key.sign(&input)?);
        Ok(self)
    }

    /// Bind to a session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from JSON.
    ///
    /// The `type` field is read first so a decode failure can still be
    /// attributed to an operation name.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| DecodeError::Malformed {
                message_type: String::new(),
            })?;
        let message_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        serde_json::from_value(value).map_err(|_| DecodeError::Malformed { message_type })
    }
}

/// Builds the common header of an outgoing envelope.
///
/// Each builder mints a fresh nonce and captures the timestamp when it is
/// created, so envelopes must be built at send time rather than cached.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    message_type: MessageType,
    request_id: String,
    device_id: String,
    timestamp: u64,
    nonce: String,
}

impl EnvelopeBuilder {
    /// Start a new envelope with a fresh request id and nonce.
    pub fn new(message_type: MessageType, device_id: impl Into<String>, clock: &dyn TimeSource) -> Self {
        Self {
            message_type,
            request_id: Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            timestamp: clock.now_ms(),
            nonce: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Reuse an existing request id (responses echo the request's id).
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// The request id this envelope will carry.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    fn header(self) -> WireEnvelope {
        WireEnvelope {
            message_type: self.message_type.as_str().to_string(),
            request_id: Some(self.request_id),
            timestamp: Some(self.timestamp),
            device_id: Some(self.device_id),
            nonce: Some(self.nonce),
            ..WireEnvelope::default()
        }
    }

    /// Finish as a request.
    pub fn request(self, payload: Payload) -> WireEnvelope {
        WireEnvelope {
            payload: Some(payload),
            ..self.header()
        }
    }

    /// Finish as a success response.
    pub fn success(self, payload: Payload) -> WireEnvelope {
        WireEnvelope {
            kind: Some(ResponseKind::Success),
            payload: Some(payload),
            ..self.header()
        }
    }

    /// Finish as an error response.
    pub fn error(self, message: impl Into<String>, terminate: Option<TerminationScope>) -> WireEnvelope {
        WireEnvelope {
            kind: Some(ResponseKind::Error),
            message: Some(message.into()),
            terminate,
            ..self.header()
        }
    }
}
