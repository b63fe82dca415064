use thiserror::Error;

/// The analyzer tripped (or had already tripped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ANOMALY DETECTED")]
pub struct AnomalyError;

/// Failure from a call guarded by [`AnomalyAnalyzer::apply_to_validator`].
///
/// [`AnomalyAnalyzer::apply_to_validator`]: crate::AnomalyAnalyzer::apply_to_validator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardedError<E> {
    /// The breaker rejected the call, before or after running it.
    #[error(transparent)]
    Anomaly(#[from] AnomalyError),
    /// The guarded call failed and the breaker stayed closed.
    #[error(transparent)]
    Inner(E),
}

impl<E> GuardedError<E> {
    /// True if the breaker rejected the call.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, GuardedError::Anomaly(_))
    }
}
