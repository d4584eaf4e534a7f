//! Fleet — the shared handle to one simulation's state.
//!
//! `Fleet` is `Clone` + `Send` + `Sync` (backed by `Arc`). All mutation
//! happens through [`Fleet::lock`]; snapshot queries take the same lock
//! only for the duration of the copy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use warpsim_core::{ClientId, FleetConfig, LoadBalancerId, NodeKind, ServerId};

use crate::notifier::ChangeNotifier;
use crate::snapshot::FleetSnapshot;
use crate::store::FleetState;

struct Inner {
    state: Mutex<FleetState>,
    notifier: ChangeNotifier,
    /// Open batches; publishing is deferred while non-zero.
    batches: AtomicUsize,
}

#[derive(Clone)]
pub struct Fleet {
    inner: Arc<Inner>,
}

impl Fleet {
    pub fn new(config: &FleetConfig) -> Self {
        Self::from_state(FleetState::new(config))
    }

    pub fn from_state(state: FleetState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                notifier: ChangeNotifier::new(),
                batches: AtomicUsize::new(0),
            }),
        }
    }

    /// Acquire the fleet lock.
    pub fn lock(&self) -> MutexGuard<'_, FleetState> {
        self.inner.state.lock()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    /// Raise the change signal if the state changed since the last publish.
    ///
    /// Deferred (returns false) while a batch is open; the batch publishes
    /// when it closes.
    pub fn publish(&self) -> bool {
        if self.inner.batches.load(Ordering::Acquire) > 0 {
            return false;
        }
        let changed = self.lock().take_changed();
        if changed {
            trace!("fleet change published");
            self.inner.notifier.notify();
        }
        changed
    }

    /// Open a batch: changes made until the guard drops raise the signal
    /// at most once.
    pub fn batch(&self) -> BatchGuard {
        self.inner.batches.fetch_add(1, Ordering::AcqRel);
        BatchGuard {
            fleet: self.clone(),
        }
    }

    // ── Snapshot queries ───────────────────────────────────────────

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot::capture(&self.lock())
    }

    /// Attached clients per server, in creation order.
    pub fn server_connections(&self) -> Vec<(ServerId, usize)> {
        self.lock()
            .servers()
            .iter()
            .map(|s| (s.id.clone(), s.attached.len()))
            .collect()
    }

    /// Connected clients per load balancer.
    pub fn load_balancer_connections(&self) -> Vec<(LoadBalancerId, usize)> {
        let state = self.lock();
        let topology = state.topology();
        state
            .load_balancers()
            .iter()
            .map(|lb| (lb.clone(), topology.neighbors_of_kind(lb, NodeKind::Client).len()))
            .collect()
    }

    /// Remaining lifetime per online client, sorted by id.
    pub fn client_lifetimes(&self) -> Vec<(ClientId, u32)> {
        self.lock()
            .lifetimes()
            .iter()
            .map(|(c, t)| (c.clone(), *t))
            .collect()
    }

    pub fn queue_depth(&self) -> usize {
        self.lock().queue_depth()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.lock().log().to_vec()
    }

    pub fn pressure_history(&self) -> Vec<f64> {
        self.lock().pressure_history().to_vec()
    }
}

/// Closes a batch opened by [`Fleet::batch`].
pub struct BatchGuard {
    fleet: Fleet,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.fleet.inner.batches.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.fleet.publish();
        }
    }
}
