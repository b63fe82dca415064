//! Domain layer: validation rules and breaker state, no I/O.

pub mod anomaly;
pub mod catalog;
pub mod errors;
pub mod pipeline;
pub mod shape;
