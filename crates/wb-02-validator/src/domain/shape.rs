//! Envelope shapes and validator descriptors.

use shared_crypto::PublicKey;
use shared_types::{MessageType, Payload, ResponseKind};

/// Operation-specific payload shape check.
pub type PayloadCheck = fn(&Payload) -> bool;

/// Derives the verification key from the payload (handshake only).
pub type KeyResolver = fn(&Payload) -> Option<PublicKey>;

/// The closed set of envelope shapes.
///
/// Shapes grow stricter from `Base*` (unsigned, no session) through
/// `NoSession*` (signed, precedes a session) to `Safety*` (signed and bound
/// to the live session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeShape {
    /// Unsigned request without a session (`READY`).
    BaseRequest,
    /// Unsigned success response without a session.
    BaseSuccessResponse,
    /// Signed request preceding a session (handshake request).
    NoSessionRequest,
    /// Signed success response preceding a session (handshake response).
    ///
    /// Carries the freshly minted `sessionId`, which the receiver adopts
    /// rather than verifies.
    NoSessionResponse,
    /// Signed, session-bound request.
    SafetyRequest,
    /// Signed, session-bound success response.
    SafetySuccessResponse,
    /// Error response (unsigned, never session-verified).
    ErrorResponse,
}

impl EnvelopeShape {
    /// Requests (as opposed to responses).
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            EnvelopeShape::BaseRequest | EnvelopeShape::NoSessionRequest | EnvelopeShape::SafetyRequest
        )
    }

    /// Shapes that must carry a signature.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            EnvelopeShape::NoSessionRequest
                | EnvelopeShape::NoSessionResponse
                | EnvelopeShape::SafetyRequest
                | EnvelopeShape::SafetySuccessResponse
        )
    }

    /// Shapes whose `sessionId` is checked against the live session.
    pub fn is_session_bound(&self) -> bool {
        matches!(
            self,
            EnvelopeShape::SafetyRequest | EnvelopeShape::SafetySuccessResponse
        )
    }

    /// Shapes that must carry a `sessionId` field.
    pub fn requires_session_id(&self) -> bool {
        self.is_session_bound() || *self == EnvelopeShape::NoSessionResponse
    }

    /// Required `kind`, or `None` for requests.
    pub fn expected_kind(&self) -> Option<ResponseKind> {
        match self {
            EnvelopeShape::BaseSuccessResponse
            | EnvelopeShape::NoSessionResponse
            | EnvelopeShape::SafetySuccessResponse => Some(ResponseKind::Success),
            EnvelopeShape::ErrorResponse => Some(ResponseKind::Error),
            _ => None,
        }
    }
}

/// Where the signature verification key comes from.
#[derive(Clone, Copy)]
pub enum KeySource {
    /// Unsigned shape.
    None,
    /// The live session's remote key.
    Session,
    /// Derived from the payload (self-certifying handshake).
    Resolver(KeyResolver),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::None => write!(f, "None"),
            KeySource::Session => write!(f, "Session"),
            KeySource::Resolver(_) => write!(f, "Resolver"),
        }
    }
}

fn any_payload(_: &Payload) -> bool {
    true
}

/// Declarative description of one validator.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorSpec {
    /// Expected envelope shape.
    pub shape: EnvelopeShape,
    /// Expected operation name.
    pub operation: MessageType,
    /// Operation-specific payload check.
    pub payload_check: PayloadCheck,
    /// Verification key source for signed shapes.
    pub key_source: KeySource,
}

impl ValidatorSpec {
    /// A spec accepting any payload.
    ///
    /// Session-bound shapes verify against the session key; other signed
    /// shapes need a resolver set with [`ValidatorSpec::with_resolver`].
    pub fn new(shape: EnvelopeShape, operation: MessageType) -> Self {
        let key_source = if shape.is_session_bound() {
            KeySource::Session
        } else {
            KeySource::None
        };
        Self {
            shape,
            operation,
            payload_check: any_payload,
            key_source,
        }
    }

    /// Restrict the payload shape.
    #[must_use]
    pub fn with_payload_check(mut self, check: PayloadCheck) -> Self {
        self.payload_check = check;
        self
    }

    /// Resolve the verification key from the payload.
    #[must_use]
    pub fn with_resolver(mut self, resolver: KeyResolver) -> Self {
        self.key_source = KeySource::Resolver(resolver);
        self
    }
}
