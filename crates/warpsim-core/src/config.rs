//! Fleet configuration parser.
//!
//! Every field has a default, so a partial `fleet.toml` (or none at all)
//! yields a runnable configuration. Call [`FleetConfig::validate`] before
//! building a simulation from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// What to do with a candidate when the fleet is saturated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Push the candidate onto the FIFO client queue.
    #[default]
    Queue,
    /// Refuse the candidate with a log entry.
    Reject,
}

impl std::str::FromStr for AdmissionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(AdmissionPolicy::Queue),
            "reject" => Ok(AdmissionPolicy::Reject),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

impl std::fmt::Display for AdmissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionPolicy::Queue => write!(f, "queue"),
            AdmissionPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// How many clients arrive per simulation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ArrivalConfig {
    /// A fixed number of arrivals every step.
    Constant { clients_per_step: usize },
    /// A sinusoidal arrival rate:
    /// `offset + amplitude * sin(2π * frequency * step)`, clamped at zero.
    Wave {
        amplitude: f64,
        frequency: f64,
        offset: f64,
    },
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        ArrivalConfig::Constant {
            clients_per_step: 5,
        }
    }
}

impl ArrivalConfig {
    /// Number of clients to admit at `step`.
    pub fn clients_at(&self, step: u64) -> usize {
        match *self {
            ArrivalConfig::Constant { clients_per_step } => clients_per_step,
            ArrivalConfig::Wave {
                amplitude,
                frequency,
                offset,
            } => {
                let phase = std::f64::consts::TAU * frequency * step as f64;
                let rate = offset + amplitude * phase.sin();
                rate.round().max(0.0) as usize
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Clients admitted at step zero.
    pub initial_clients: usize,
    /// Number of simulation steps.
    pub num_steps: u64,
    pub arrivals: ArrivalConfig,
    /// Reset the topology and re-admit the initial clients after the last step.
    pub reset_clients: bool,

    /// Servers at startup.
    pub num_servers: usize,
    /// Floor the autoscaler never goes below.
    pub min_servers: usize,
    /// Maximum attached clients per server.
    pub max_connections: usize,
    /// Fixed number of load balancers.
    pub num_load_balancers: usize,
    /// Size of the addressable client universe.
    pub client_pool_size: usize,
    /// Mean client lifetime in ticks.
    pub client_lifetime_mean: f64,
    pub client_lifetime_stddev: f64,

    /// Samples retained for the EWMA.
    pub pressure_history_len: usize,
    pub ewma_alpha: f64,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    /// Run the autoscaler after every step.
    pub autoscale: bool,
    pub admission_policy: AdmissionPolicy,

    /// Entries kept in the rolling event log.
    pub log_tail: usize,
    /// Seed for a reproducible run; entropy-seeded when absent.
    pub seed: Option<u64>,
    /// Pacing between steps in the daemon.
    pub refresh_interval_ms: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            initial_clients: 30,
            num_steps: 100,
            arrivals: ArrivalConfig::default(),
            reset_clients: false,
            num_servers: 5,
            min_servers: 1,
            max_connections: 10,
            num_load_balancers: 1,
            client_pool_size: 50,
            client_lifetime_mean: 100.0,
            client_lifetime_stddev: 2.0,
            pressure_history_len: 20,
            ewma_alpha: 0.3,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.3,
            autoscale: true,
            admission_policy: AdmissionPolicy::Queue,
            log_tail: 40,
            seed: None,
            refresh_interval_ms: 1000,
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Total attachable clients with the initial server count.
    pub fn initial_capacity(&self) -> usize {
        self.num_servers * self.max_connections
    }

    /// Check every constraint the simulation relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("scale-up", self.scale_up_threshold),
            ("scale-down", self.scale_down_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdRange { name, value });
            }
        }
        if self.scale_down_threshold >= self.scale_up_threshold {
            return Err(ConfigError::ThresholdOrder {
                down: self.scale_down_threshold,
                up: self.scale_up_threshold,
            });
        }
        if self.min_servers > self.num_servers {
            return Err(ConfigError::MinServersAboveInitial {
                min: self.min_servers,
                initial: self.num_servers,
            });
        }
        // Zero servers means zero capacity and zero pressure; the fleet
        // could never scale back up.
        if self.min_servers == 0 {
            return Err(ConfigError::Zero("min_servers"));
        }
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(ConfigError::Alpha(self.ewma_alpha));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Zero("max_connections"));
        }
        if self.num_load_balancers == 0 {
            return Err(ConfigError::Zero("num_load_balancers"));
        }
        if self.pressure_history_len == 0 {
            return Err(ConfigError::Zero("pressure_history_len"));
        }
        if !self.client_lifetime_mean.is_finite() {
            return Err(ConfigError::Lifetime(format!(
                "mean {} is not finite",
                self.client_lifetime_mean
            )));
        }
        if !self.client_lifetime_stddev.is_finite() || self.client_lifetime_stddev < 0.0 {
            return Err(ConfigError::Lifetime(format!(
                "stddev {} must be finite and non-negative",
                self.client_lifetime_stddev
            )));
        }
        if let ArrivalConfig::Wave {
            amplitude,
            frequency,
            offset,
        } = self.arrivals
            && !(amplitude.is_finite() && frequency.is_finite() && offset.is_finite())
        {
            return Err(ConfigError::Arrivals(
                "amplitude, frequency and offset must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FleetConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_file_keeps_defaults() {
        let toml_str = r#"
num_servers = 2
max_connections = 4
admission_policy = "reject"

[arrivals]
mode = "wave"
amplitude = 3.0
frequency = 0.05
offset = 4.0
"#;
        let config: FleetConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.num_servers, 2);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.admission_policy, AdmissionPolicy::Reject);
        assert_eq!(config.client_pool_size, 50);
        assert!(matches!(config.arrivals, ArrivalConfig::Wave { .. }));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, "initial_clients = 7\nseed = 42\n").unwrap();

        let config = FleetConfig::from_file(&path).unwrap();
        assert_eq!(config.initial_clients, 7);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn toml_output_parses_back() {
        let config = FleetConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("scale_up_threshold"));
        let parsed: FleetConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = FleetConfig {
            scale_down_threshold: 0.8,
            scale_up_threshold: 0.8,
            ..FleetConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn rejects_min_servers_above_initial() {
        let config = FleetConfig {
            num_servers: 2,
            min_servers: 3,
            ..FleetConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MinServersAboveInitial { min: 3, initial: 2 })
        );
    }

    #[test]
    fn rejects_bad_alpha_and_zero_sizes() {
        let config = FleetConfig {
            ewma_alpha: 0.0,
            ..FleetConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Alpha(0.0)));

        let config = FleetConfig {
            max_connections: 0,
            ..FleetConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("max_connections")));

        let config = FleetConfig {
            num_load_balancers: 0,
            ..FleetConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("num_load_balancers"))
        );
    }

    #[test]
    fn rejects_empty_server_floor() {
        let config = FleetConfig {
            num_servers: 2,
            min_servers: 0,
            ..FleetConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("min_servers")));

        let config = FleetConfig {
            num_servers: 0,
            min_servers: 0,
            ..FleetConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("min_servers")));

        let config = FleetConfig {
            num_servers: 0,
            min_servers: 1,
            ..FleetConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MinServersAboveInitial { min: 1, initial: 0 })
        );
    }

    #[test]
    fn rejects_negative_stddev() {
        let config = FleetConfig {
            client_lifetime_stddev: -1.0,
            ..FleetConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Lifetime(_))));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let config = FleetConfig {
            scale_up_threshold: 1.5,
            ..FleetConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdRange { name: "scale-up", .. })
        ));
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("queue".parse::<AdmissionPolicy>(), Ok(AdmissionPolicy::Queue));
        assert_eq!(" Reject ".parse::<AdmissionPolicy>(), Ok(AdmissionPolicy::Reject));
        assert_eq!(
            "drop".parse::<AdmissionPolicy>(),
            Err(ConfigError::UnknownPolicy("drop".to_string()))
        );
        assert_eq!(AdmissionPolicy::Reject.to_string(), "reject");
    }

    #[test]
    fn constant_arrivals() {
        let arrivals = ArrivalConfig::Constant {
            clients_per_step: 3,
        };
        assert_eq!(arrivals.clients_at(0), 3);
        assert_eq!(arrivals.clients_at(99), 3);
    }

    #[test]
    fn wave_arrivals_clamp_at_zero() {
        let arrivals = ArrivalConfig::Wave {
            amplitude: 10.0,
            frequency: 0.25,
            offset: 2.0,
        };
        // sin(0) = 0, sin(π/2) = 1, sin(3π/2) = -1
        assert_eq!(arrivals.clients_at(0), 2);
        assert_eq!(arrivals.clients_at(1), 12);
        assert_eq!(arrivals.clients_at(3), 0);
    }
}
