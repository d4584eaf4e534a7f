//! Instantaneous fleet utilization and its EWMA.

use serde::Serialize;
use tracing::trace;

use warpsim_core::FleetConfig;
use warpsim_state::{Fleet, FleetState};

/// Current and smoothed pressure, both within [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PressureReading {
    pub current: f64,
    pub ewma: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PressureMonitor {
    alpha: f64,
}

impl PressureMonitor {
    /// `alpha` must be within (0, 1]; validated with the fleet config.
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(config.ewma_alpha)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Attached clients over total capacity, or 0 with no capacity.
    pub fn pressure(state: &FleetState) -> f64 {
        let capacity = state.capacity();
        if capacity == 0 {
            return 0.0;
        }
        (state.attached_total() as f64 / capacity as f64).clamp(0.0, 1.0)
    }

    /// Measure pressure and append it to the history. Caller holds the lock.
    pub fn sample(&self, state: &mut FleetState) -> f64 {
        let pressure = Self::pressure(state);
        state.pressure_history_mut().push(pressure);
        trace!(pressure, "pressure sampled");
        pressure
    }

    /// EWMA over the state's pressure history.
    pub fn ewma(&self, state: &FleetState) -> f64 {
        ewma(state.pressure_history().iter().copied(), self.alpha)
    }

    /// Read current pressure and EWMA without appending a sample.
    pub fn reading(&self, fleet: &Fleet) -> PressureReading {
        self.reading_locked(&fleet.lock())
    }

    /// [`reading`](Self::reading) with the lock already held, so it can be
    /// taken together with a snapshot.
    pub fn reading_locked(&self, state: &FleetState) -> PressureReading {
        PressureReading {
            current: Self::pressure(state),
            ewma: self.ewma(state),
        }
    }
}

/// Exponentially weighted moving average of `samples` (oldest first).
///
/// The newest sample has weight `alpha`, each step back multiplies the
/// weight by `1 - alpha`, and the sum is normalized by
/// `1 - (1 - alpha)^n` so a short history is not diluted toward zero.
/// Returns 0 for an empty history.
pub fn ewma<I>(samples: I, alpha: f64) -> f64
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut total = 0.0;
    let mut weight = 1.0;
    let mut seen = false;
    for pressure in samples.into_iter().rev() {
        total += alpha * weight * pressure;
        weight *= 1.0 - alpha;
        seen = true;
    }
    if !seen {
        return 0.0;
    }
    total / (1.0 - weight)
}
