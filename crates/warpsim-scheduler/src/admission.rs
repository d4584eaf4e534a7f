//! Admission: connecting offline pool members to the fleet.
//!
//! Admission runs in two phases. The first holds the fleet lock: it
//! checks capacity, applies the saturation policy and connects the client
//! to a random load balancer. The second re-acquires the lock and routes
//! the client to a random server with spare degree. Capacity can change
//! between the phases; a client left connected but unrouted is a valid
//! transient state that the sweeper resolves on a later tick.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use warpsim_core::{AdmissionPolicy, ClientId, FleetConfig, LoadBalancerId, ServerId};
use warpsim_state::{Fleet, StateError};

use crate::error::{SchedulerError, SchedulerResult};
use crate::lifetime::LifetimeSampler;

/// Outcome of one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Online and linked to a load balancer. `server` is `None` when no
    /// server had spare degree at routing time.
    Connected {
        client: ClientId,
        load_balancer: LoadBalancerId,
        server: Option<ServerId>,
    },
    /// Fleet saturated; the candidate waits in the queue.
    Queued { client: ClientId, depth: usize },
    /// Fleet saturated; the candidate was refused.
    Rejected { client: ClientId },
}

impl Admission {
    pub fn is_connected(&self) -> bool {
        matches!(self, Admission::Connected { .. })
    }
}

pub struct AdmissionController {
    policy: AdmissionPolicy,
    lifetimes: LifetimeSampler,
}

impl AdmissionController {
    pub fn new(config: &FleetConfig) -> SchedulerResult<Self> {
        Ok(Self {
            policy: config.admission_policy,
            lifetimes: LifetimeSampler::new(
                config.client_lifetime_mean,
                config.client_lifetime_stddev,
            )?,
        })
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Admit a specific pool member.
    ///
    /// Admitting a client that is already online is a contract violation
    /// and fails with [`StateError::AlreadyOnline`] without touching state.
    pub fn admit<R: Rng + ?Sized>(
        &self,
        fleet: &Fleet,
        candidate: &str,
        rng: &mut R,
    ) -> SchedulerResult<Admission> {
        let outcome = self.admit_candidate(fleet, candidate, false, rng);
        fleet.publish();
        outcome
    }

    /// Admit the oldest queued candidate, or else a uniformly random
    /// offline pool member. Returns `None` when both are empty.
    pub fn admit_random<R: Rng + ?Sized>(
        &self,
        fleet: &Fleet,
        rng: &mut R,
    ) -> SchedulerResult<Option<Admission>> {
        let outcome = self.admit_next(fleet, rng);
        fleet.publish();
        outcome
    }

    /// Run up to `count` [`admit_random`](Self::admit_random) attempts,
    /// raising the change signal at most once.
    pub fn admit_batch<R: Rng + ?Sized>(
        &self,
        fleet: &Fleet,
        count: usize,
        rng: &mut R,
    ) -> SchedulerResult<Vec<Admission>> {
        let _batch = fleet.batch();
        let mut outcomes = Vec::with_capacity(count);
        for _ in 0..count {
            match self.admit_next(fleet, rng)? {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        Ok(outcomes)
    }

    fn admit_next<R: Rng + ?Sized>(
        &self,
        fleet: &Fleet,
        rng: &mut R,
    ) -> SchedulerResult<Option<Admission>> {
        let (candidate, from_queue) = {
            let mut state = fleet.lock();
            match state.dequeue() {
                Some(client) => (client, true),
                None => match state.offline_clients().choose(rng) {
                    Some(client) => (client.clone(), false),
                    None => return Ok(None),
                },
            }
        };
        self.admit_candidate(fleet, &candidate, from_queue, rng)
            .map(Some)
    }

    fn admit_candidate<R: Rng + ?Sized>(
        &self,
        fleet: &Fleet,
        candidate: &str,
        from_queue: bool,
        rng: &mut R,
    ) -> SchedulerResult<Admission> {
        let load_balancer = {
            let mut state = fleet.lock();

            if state.is_online(candidate) {
                warn!(client = %candidate, "admission of an online client refused");
                return Err(StateError::AlreadyOnline(candidate.to_string()).into());
            }
            if !state.in_pool(candidate) {
                return Err(StateError::NotInPool(candidate.to_string()).into());
            }

            if state.is_saturated() {
                return Ok(match self.policy {
                    AdmissionPolicy::Queue => {
                        if from_queue {
                            state.enqueue_front(candidate);
                        } else {
                            state.enqueue_back(candidate);
                        }
                        state.log_event(format!(
                            "{candidate} connection refused: network full - queueing..."
                        ));
                        debug!(client = %candidate, depth = state.queue_depth(), "fleet saturated, queued");
                        Admission::Queued {
                            client: candidate.to_string(),
                            depth: state.queue_depth(),
                        }
                    }
                    AdmissionPolicy::Reject => {
                        state.log_event(format!("{candidate} connection refused: network full"));
                        debug!(client = %candidate, "fleet saturated, rejected");
                        Admission::Rejected {
                            client: candidate.to_string(),
                        }
                    }
                });
            }

            if !from_queue {
                state.remove_from_queue(candidate);
            }
            let load_balancer = state
                .load_balancers()
                .choose(rng)
                .cloned()
                .ok_or(SchedulerError::NoLoadBalancer)?;
            let lifetime = self.lifetimes.sample(rng);
            state.connect_client(candidate, &load_balancer, lifetime)?;
            if from_queue {
                state.log_event(format!("{candidate} connected from queue"));
            }
            load_balancer
        };

        let server = route_to_spare_server(fleet, candidate, rng)?;
        Ok(Admission::Connected {
            client: candidate.to_string(),
            load_balancer,
            server,
        })
    }
}

/// Second admission phase: route `client` to a uniformly random server
/// whose degree is below `max_connections`.
fn route_to_spare_server<R: Rng + ?Sized>(
    fleet: &Fleet,
    client: &str,
    rng: &mut R,
) -> SchedulerResult<Option<ServerId>> {
    let mut state = fleet.lock();
    // Evicted between the phases.
    if !state.is_online(client) {
        return Ok(None);
    }
    let available = state.available_servers();
    let Some(server) = available.choose(rng) else {
        debug!(%client, "no server with spare capacity, client left unrouted");
        return Ok(None);
    };
    state.route_client(client, server)?;
    Ok(Some(server.clone()))
}
