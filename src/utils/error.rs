//! Error taxonomy for the decision core.
//!
//! Every per-cycle error is caught at the cycle boundary and converted into
//! a HOLD decision record; none of these terminate the scheduling loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// An opportunity, price, or regime source failed and no cached or
    /// default value was available.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Allocation or sizing inputs are degenerate: all candidate scores are
    /// zero, or Kelly inputs have an undefined win/loss ratio.
    #[error("invalid allocation input: {0}")]
    InvalidAllocationInput(String),

    /// A deliberate safety HOLD, recorded with the triggering conditions.
    #[error("circuit breaker tripped: {0}")]
    CircuitBreakerTripped(String),

    /// Reported by the external executor; feeds consecutive-loss tracking.
    #[error("execution failure: {0}")]
    ExecutionFailure(String),
}
