//! Domain layer: pure session logic, no I/O.

pub mod errors;
pub mod issuer;
pub mod session;
pub mod slot;
