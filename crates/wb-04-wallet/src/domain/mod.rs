//! Wallet domain: handler errors and the built-in operation handlers.

pub mod errors;
pub mod handlers;
