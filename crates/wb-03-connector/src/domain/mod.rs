//! Connector domain: errors, status, retry policy and operation bookkeeping.

pub mod errors;
pub mod queue;
pub mod retry;
pub mod status;
