//! Configuration error types.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A fleet configuration that cannot be simulated.
///
/// Raised once by [`FleetConfig::validate`](crate::FleetConfig::validate)
/// before a session starts, never mid-run.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("scale-down threshold {down} must be below scale-up threshold {up}")]
    ThresholdOrder { down: f64, up: f64 },

    #[error("{name} threshold {value} must be within [0, 1]")]
    ThresholdRange { name: &'static str, value: f64 },

    #[error("min_servers ({min}) exceeds num_servers ({initial})")]
    MinServersAboveInitial { min: usize, initial: usize },

    #[error("ewma_alpha {0} must be within (0, 1]")]
    Alpha(f64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid client lifetime distribution: {0}")]
    Lifetime(String),

    #[error("unknown admission policy: {0} (expected queue or reject)")]
    UnknownPolicy(String),

    #[error("invalid arrival wave: {0}")]
    Arrivals(String),
}
