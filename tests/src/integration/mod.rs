//! Integration scenarios.

pub mod harness;

#[cfg(test)]
mod handshake;
#[cfg(test)]
mod operations;
#[cfg(test)]
mod replay;
#[cfg(test)]
mod termination;
