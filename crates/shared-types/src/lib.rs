//! # Shared Types Crate
//!
//! This crate contains the wire envelope exchanged between the host
//! application and the wallet context, together with everything both sides
//! need to agree on before any validation can happen.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Operation names, payload encodings and error
//!   labels are defined once here.
//! - **Signature Binding**: The bytes a signature covers are derived by
//!   [`WireEnvelope::signing_input`], never assembled ad hoc by callers.
//! - **Stable Labels**: Every rejection surfaces as one of the fixed labels of
//!   [`ValidationError`]; no internal detail crosses the trust boundary.
//! - **Injectable State**: Replay registries and the clock are explicit
//!   objects so each endpoint (and each test) owns its own.

pub mod device;
pub mod envelope;
pub mod errors;
pub mod security;

pub use device::{DeviceIdentity, FingerprintDeviceIdentity, StaticDeviceIdentity};
pub use envelope::{
    signing_input, EnvelopeBuilder, MessageType, Payload, ResponseKind, TerminationScope,
    WireEnvelope,
};
pub use errors::{ConfigError, DecodeError, ErrorCategory, ValidationError};
pub use security::{
    current_timestamp_ms, is_uuid_v4, validate_timestamp, FixedTimeSource, ReplayRegistries,
    ReplayRegistry, SystemTimeSource, TimeSource, ValidationPolicy, TIMESTAMP_TOLERANCE_MS,
};
