//! # Validator Subsystem (WB-02)
//!
//! One validation algorithm for every envelope shape, plus the circuit
//! breaker consulted around it.
//!
//! ## Architecture
//!
//! - **Shapes** (`domain/shape.rs`): closed set of envelope shapes and the
//!   declarative [`ValidatorSpec`] built from them.
//! - **Pipeline** (`domain/pipeline/`): the ordered checks. The first
//!   failing check decides the label.
//! - **Catalog** (`domain/catalog.rs`): request/response specs per operation.
//! - **Anomaly** (`domain/anomaly.rs`): per-endpoint circuit breaker.
//!
//! ## Check Order
//!
//! | # | Check | Label |
//! |---|-------|-------|
//! | 1 | `type` equals the operation | `INVALID <OP> TYPE` |
//! | 2 | fields required by the shape | `INVALID <OP> SCHEMA` |
//! | 3 | payload shape | `INVALID <OP> SCHEMA` |
//! | 4 | nonce unseen (registered on pass) | `INVALID NONCE` |
//! | 5 | timestamp fresh | `INVALID TIMESTAMP` |
//! | 6 | origin allowed | `INVALID ORIGIN` |
//! | 7 | source expected | `INVALID SOURCE` |
//! | 8 | device id expected | `INVALID DEVICE ID` |
//! | 9 | session token live (session-bound shapes) | `INVALID SESSION ID` |
//! | 10 | signature (signed shapes) | `INVALID SIGNATURE` |
//! | 11 | request id well-formed and unseen (requests) | `INVALID REQUEST ID` |

pub mod domain;

pub use domain::anomaly::{AnomalyAnalyzer, AnomalyConfig, AnomalySnapshot};
pub use domain::catalog::{error_spec, request_spec, resolve_spki, response_spec, success_spec};
pub use domain::errors::{AnomalyError, GuardedError};
pub use domain::pipeline::{validate, validate_envelope, ValidationContext, VerifiedEnvelope};
pub use domain::shape::{EnvelopeShape, KeyResolver, KeySource, PayloadCheck, ValidatorSpec};
