//! A simulation session owns a fleet and drives it tick by tick.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use warpsim_autoscale::{Autoscaler, ScaleDecision};
use warpsim_core::FleetConfig;
use warpsim_metrics::PressureReading;
use warpsim_scheduler::{Admission, AdmissionController, LifecycleSweeper, SweepReport};
use warpsim_state::{Fleet, FleetSnapshot};

use crate::error::SimResult;

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub step: u64,
    pub admissions: Vec<Admission>,
    pub sweep: SweepReport,
    /// `None` when autoscaling is disabled.
    pub scale: Option<ScaleDecision>,
    /// The fleet was reset after the final step.
    pub reset: bool,
    /// The tick changed observable state (and raised the change signal).
    pub changed: bool,
}

impl TickReport {
    pub fn connected(&self) -> usize {
        self.admissions.iter().filter(|a| a.is_connected()).count()
    }
}

pub struct Simulation<R = StdRng> {
    config: FleetConfig,
    fleet: Fleet,
    admission: AdmissionController,
    sweeper: LifecycleSweeper,
    autoscaler: Autoscaler,
    rng: R,
}

impl Simulation<StdRng> {
    /// Build a session seeded from `config.seed`, or from entropy.
    pub fn new(config: FleetConfig) -> SimResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Simulation<R> {
    /// Validate `config` and build the initial fleet.
    pub fn with_rng(config: FleetConfig, rng: R) -> SimResult<Self> {
        config.validate()?;
        let fleet = Fleet::new(&config);
        let admission = AdmissionController::new(&config)?;
        let autoscaler = Autoscaler::new(&config);
        info!(
            servers = config.num_servers,
            load_balancers = config.num_load_balancers,
            capacity = config.initial_capacity(),
            policy = %config.admission_policy,
            "simulation session created"
        );
        Ok(Self {
            config,
            fleet,
            admission,
            sweeper: LifecycleSweeper::new(),
            autoscaler,
            rng,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Shared handle for observers.
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        self.fleet.snapshot()
    }

    /// Current and smoothed pressure, without recording a sample.
    pub fn pressure(&self) -> PressureReading {
        self.autoscaler.monitor().reading(&self.fleet)
    }

    /// Run one simulation step: admission, sweep, pressure sample,
    /// autoscale, and the end-of-run reset when configured. Raises the change signal at most
    /// once.
    pub fn tick(&mut self, step: u64) -> SimResult<TickReport> {
        let batch = self.fleet.batch();

        let arrivals = if step == 0 {
            self.config.initial_clients
        } else {
            self.config.arrivals.clients_at(step)
        };
        let admissions = self
            .admission
            .admit_batch(&self.fleet, arrivals, &mut self.rng)?;
        let sweep = self.sweeper.sweep(&self.fleet)?;

        // Pressure is recorded every tick; only the scaling action is optional.
        let scale = {
            let mut state = self.fleet.lock();
            self.autoscaler.monitor().sample(&mut state);
            if self.config.autoscale {
                Some(self.autoscaler.decide_locked(&mut state)?)
            } else {
                None
            }
        };

        let reset = self.config.reset_clients && step + 1 == self.config.num_steps;
        if reset {
            self.reset_fleet()?;
        }

        let changed = self.fleet.lock().is_changed();
        drop(batch);

        debug!(
            step,
            arrivals,
            evicted = sweep.evicted.len(),
            ?scale,
            "tick complete"
        );
        Ok(TickReport {
            step,
            admissions,
            sweep,
            scale,
            reset,
            changed,
        })
    }

    /// Run every configured step.
    pub fn run_to_end(&mut self) -> SimResult<Vec<TickReport>> {
        (0..self.config.num_steps).map(|step| self.tick(step)).collect()
    }

    /// Drop all clients, restore the initial servers and re-admit the
    /// initial clients.
    pub fn reset(&mut self) -> SimResult<()> {
        let _batch = self.fleet.batch();
        self.reset_fleet()
    }

    fn reset_fleet(&mut self) -> SimResult<()> {
        self.fleet.lock().reset();
        self.admission
            .admit_batch(&self.fleet, self.config.initial_clients, &mut self.rng)?;
        info!(clients = self.config.initial_clients, "fleet reset");
        Ok(())
    }
}
