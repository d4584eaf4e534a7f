//! Autoscaler — hysteresis-based server scaling.
//!
//! Each evaluation appends one pressure sample to the fleet's history,
//! computes the EWMA and compares it against the scale-up and scale-down
//! thresholds. At most one server is added or removed per evaluation.

use tracing::{debug, info};

use warpsim_core::{ClientId, FleetConfig, ServerId};
use warpsim_metrics::PressureMonitor;
use warpsim_state::{Fleet, FleetState, StateResult};

/// The action taken by one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// A server was added.
    ScaleUp(ServerId),
    /// The oldest server was retired along with its attached clients.
    ScaleDown {
        server: ServerId,
        evicted: Vec<ClientId>,
    },
    /// Inside the dead band, or already at the server floor.
    NoChange,
}

pub struct Autoscaler {
    monitor: PressureMonitor,
    scale_up_threshold: f64,
    scale_down_threshold: f64,
    min_servers: usize,
}

impl Autoscaler {
    pub fn new(config: &FleetConfig) -> Self {
        Self {
            monitor: PressureMonitor::from_config(config),
            scale_up_threshold: config.scale_up_threshold,
            scale_down_threshold: config.scale_down_threshold,
            min_servers: config.min_servers,
        }
    }

    pub fn monitor(&self) -> &PressureMonitor {
        &self.monitor
    }

    /// Sample, smooth and act, then publish the change.
    pub fn evaluate(&self, fleet: &Fleet) -> StateResult<ScaleDecision> {
        let decision = {
            let mut state = fleet.lock();
            self.evaluate_locked(&mut state)?
        };
        fleet.publish();
        Ok(decision)
    }

    /// [`evaluate`](Self::evaluate) with the lock already held.
    pub fn evaluate_locked(&self, state: &mut FleetState) -> StateResult<ScaleDecision> {
        self.monitor.sample(state);
        self.decide_locked(state)
    }

    /// Act on the pressure history as it stands, without sampling.
    ///
    /// For callers that record a sample every tick whether or not
    /// scaling is enabled.
    pub fn decide_locked(&self, state: &mut FleetState) -> StateResult<ScaleDecision> {
        let current = state.pressure_history().latest().copied().unwrap_or_default();
        let smoothed = self.monitor.ewma(state);

        if smoothed > self.scale_up_threshold {
            debug!(current, smoothed, threshold = self.scale_up_threshold, "scaling up");
            return Ok(ScaleDecision::ScaleUp(self.add_server_locked(state)));
        }

        if smoothed < self.scale_down_threshold {
            debug!(current, smoothed, threshold = self.scale_down_threshold, "scaling down");
            return Ok(match self.remove_server_locked(state)? {
                Some((server, evicted)) => ScaleDecision::ScaleDown { server, evicted },
                None => ScaleDecision::NoChange,
            });
        }

        Ok(ScaleDecision::NoChange)
    }

    /// Add one server and publish the change.
    pub fn add_server(&self, fleet: &Fleet) -> ServerId {
        let server = self.add_server_locked(&mut fleet.lock());
        fleet.publish();
        server
    }

    pub fn add_server_locked(&self, state: &mut FleetState) -> ServerId {
        let server = state.add_server();
        info!(%server, servers = state.servers().len(), "server added");
        server
    }

    /// Retire the oldest server unless the fleet is at its floor.
    ///
    /// Returns the retired server and the clients evicted with it.
    pub fn remove_server(&self, fleet: &Fleet) -> StateResult<Option<(ServerId, Vec<ClientId>)>> {
        let removed = self.remove_server_locked(&mut fleet.lock())?;
        fleet.publish();
        Ok(removed)
    }

    pub fn remove_server_locked(
        &self,
        state: &mut FleetState,
    ) -> StateResult<Option<(ServerId, Vec<ClientId>)>> {
        if state.servers().len() <= self.min_servers {
            debug!(min_servers = self.min_servers, "at server floor, not scaling down");
            return Ok(None);
        }
        let Some(server) = state.oldest_server().cloned() else {
            return Ok(None);
        };
        let evicted = state.remove_server(&server)?;
        info!(
            %server,
            evicted = evicted.len(),
            servers = state.servers().len(),
            "server removed"
        );
        Ok(Some((server, evicted)))
    }
}
