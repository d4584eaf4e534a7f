//! Session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] warpsim_core::ConfigError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] warpsim_scheduler::SchedulerError),

    #[error("fleet state error: {0}")]
    State(#[from] warpsim_state::StateError),
}

pub type SimResult<T> = Result<T, SimError>;
