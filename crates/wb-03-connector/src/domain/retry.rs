//! Bounded handshake retry.
//!
//! ```text
//! [attempts: 0] ──failure──► [attempts: n+1] ──n+1 <= max──► restart wallet, await READY
//!       ▲                          │
//!       │                          └──n+1 > max──► give up (terminal)
//!       └──────── handshake success ────────┘
//! ```
//!
//! With a ceiling of 5, five consecutive failures still lead to a restart;
//! the sixth is terminal.

/// What to do after a failed handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reload the wallet context and wait for `READY` again.
    Restart {
        /// Consecutive failures so far.
        attempt: u32,
    },
    /// Stop for good.
    GiveUp {
        /// Consecutive failures, including this one.
        attempts: u32,
    },
}

/// Consecutive handshake failure counter.
#[derive(Debug)]
pub struct HandshakeRetry {
    attempts: u32,
    max_retries: u32,
    exhausted: bool,
}

impl HandshakeRetry {
    /// Create a counter allowing `max_retries` restarts.
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempts: 0,
            max_retries,
            exhausted: false,
        }
    }

    /// Record one failed handshake.
    ///
    /// Once exhausted, every further call returns `GiveUp`.
    pub fn record_failure(&mut self) -> RetryDecision {
        if self.exhausted {
            return RetryDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        if self.attempts > self.max_retries {
            self.exhausted = true;
            RetryDecision::GiveUp {
                attempts: self.attempts,
            }
        } else {
            RetryDecision::Restart {
                attempt: self.attempts,
            }
        }
    }

    /// Handshake succeeded.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consecutive failures since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the ceiling was passed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
