pub mod config;
pub mod error;
pub mod types;

pub use config::{AdmissionPolicy, ArrivalConfig, FleetConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
