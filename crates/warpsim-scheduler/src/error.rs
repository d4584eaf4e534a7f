//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur during admission or sweeping.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no load balancers configured")]
    NoLoadBalancer,

    #[error("invalid lifetime distribution: {0}")]
    Lifetime(String),

    #[error("fleet state error: {0}")]
    State(#[from] warpsim_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
