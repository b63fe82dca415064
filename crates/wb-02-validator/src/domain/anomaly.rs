//! Anomaly analyzer: a per-endpoint circuit breaker.
//!
//! ```text
//! ┌──────────┐  error_count >= max_error_count   ┌───────────┐
//! │  ACTIVE  │ ────────────────────────────────► │ DESTROYED │
//! │          │  rps_count >= max_rps             │ (terminal)│
//! └──────────┘ ────────────────────────────────► └───────────┘
//!      ▲  │
//!      └──┘ tick(): rps_count = 0
//! ```
//!
//! Counters increment before the guarded call is evaluated, so malformed
//! traffic counts toward the ceilings exactly like genuine failures. The
//! request counter only resets on [`AnomalyAnalyzer::tick`]; there is no
//! proportional leak.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::ConfigError;
use std::time::Duration;
use tracing::{error, trace};

use super::errors::{AnomalyError, GuardedError};

/// Breaker ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Failures tolerated before tripping (the call reaching it trips).
    pub max_error_count: u32,
    /// Requests per window tolerated before tripping.
    pub max_rps: u32,
    /// Request counter reset period in milliseconds.
    pub rps_window_ms: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            max_error_count: 10,
            max_rps: 50,
            rps_window_ms: 1_000,
        }
    }
}

impl AnomalyConfig {
    /// Request counter reset period.
    pub fn rps_window(&self) -> Duration {
        Duration::from_millis(self.rps_window_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_error_count == 0 {
            return Err(ConfigError::Invalid("max_error_count cannot be 0".into()));
        }
        if self.max_rps == 0 {
            return Err(ConfigError::Invalid("max_rps cannot be 0".into()));
        }
        if self.rps_window_ms == 0 {
            return Err(ConfigError::Invalid("rps_window_ms cannot be 0".into()));
        }
        Ok(())
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnomalySnapshot {
    /// Failures since creation.
    pub error_count: u32,
    /// Requests since the last tick.
    pub rps_count: u32,
    /// Whether the breaker tripped.
    pub destroyed: bool,
}

/// Circuit breaker bounding error rate and request rate.
#[derive(Debug)]
pub struct AnomalyAnalyzer {
    config: AnomalyConfig,
    state: Mutex<AnomalySnapshot>,
}

impl AnomalyAnalyzer {
    /// Create an active analyzer.
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AnomalySnapshot::default()),
        }
    }

    /// Count one request.
    ///
    /// Trips when the count reaches `max_rps`.
    pub fn assert_request(&self) -> Result<(), AnomalyError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(AnomalyError);
        }
        state.rps_count += 1;
        if state.rps_count >= self.config.max_rps {
            state.destroyed = true;
            error!(
                rps_count = state.rps_count,
                max_rps = self.config.max_rps,
                "Anomaly breaker tripped: request ceiling reached"
            );
            return Err(AnomalyError);
        }
        Ok(())
    }

    /// Count one failure.
    ///
    /// Trips when the count reaches `max_error_count`.
    pub fn assert_error(&self) -> Result<(), AnomalyError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(AnomalyError);
        }
        state.error_count += 1;
        if state.error_count >= self.config.max_error_count {
            state.destroyed = true;
            error!(
                error_count = state.error_count,
                max_error_count = self.config.max_error_count,
                "Anomaly breaker tripped: error ceiling reached"
            );
            return Err(AnomalyError);
        }
        Ok(())
    }

    /// Run `validate` under the breaker.
    ///
    /// Counts a request first; if `validate` fails, counts an error and
    /// returns the original failure, unless that error tripped the breaker,
    /// in which case the anomaly is returned instead.
    pub fn apply_to_validator<T, E>(
        &self,
        validate: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, GuardedError<E>> {
        self.assert_request()?;
        match validate() {
            Ok(value) => Ok(value),
            Err(err) => {
                self.assert_error()?;
                Err(GuardedError::Inner(err))
            }
        }
    }

    /// Reset the request counter (periodic).
    pub fn tick(&self) {
        let mut state = self.state.lock();
        if !state.destroyed && state.rps_count > 0 {
            trace!(rps_count = state.rps_count, "Anomaly request window reset");
            state.rps_count = 0;
        }
    }

    /// Trip the breaker unconditionally.
    pub fn destroy(&self) {
        self.state.lock().destroyed = true;
    }

    /// Whether the breaker tripped.
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Current counters.
    pub fn snapshot(&self) -> AnomalySnapshot {
        *self.state.lock()
    }

    /// Configured ceilings.
    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }
}
