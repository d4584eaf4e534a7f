//! Ages connected clients and evicts the expired ones.
//!
//! One sweep holds the fleet lock for the whole pass, so observers see
//! either none or all of a tick's evictions.

use tracing::{debug, info};

use warpsim_core::{ClientId, ServerId};
use warpsim_state::{Fleet, FleetState};

use crate::error::SchedulerResult;

/// What a sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Clients whose lifetime reached zero, in id order.
    pub evicted: Vec<ClientId>,
    /// Expired clients that had no server route when evicted.
    pub unrouted_evictions: usize,
    /// Previously unrouted clients attached to a server during this pass.
    pub rerouted: Vec<(ClientId, ServerId)>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleSweeper;

impl LifecycleSweeper {
    pub fn new() -> Self {
        Self
    }

    /// Run one sweep under the fleet lock and publish the change.
    pub fn sweep(&self, fleet: &Fleet) -> SchedulerResult<SweepReport> {
        let report = {
            let mut state = fleet.lock();
            self.sweep_locked(&mut state)?
        };
        fleet.publish();
        Ok(report)
    }

    /// Sweep with the lock already held.
    ///
    /// 1. Decrement every online client's lifetime.
    /// 2. Evict each client at zero: server route, attached-list entry,
    ///    load balancer edge, node and lifetime entry.
    /// 3. Attach any connected-but-unrouted clients to the least loaded
    ///    server with spare degree.
    pub fn sweep_locked(&self, state: &mut FleetState) -> SchedulerResult<SweepReport> {
        let mut report = SweepReport::default();

        for client in state.decrement_lifetimes() {
            let removed = state.disconnect_client(&client)?;
            if removed.server.is_none() {
                report.unrouted_evictions += 1;
            }
            report.evicted.push(client);
        }

        for client in state.unrouted_clients() {
            let Some(server) = least_loaded(state) else {
                break;
            };
            state.route_client(&client, &server)?;
            report.rerouted.push((client, server));
        }

        if !report.evicted.is_empty() {
            info!(
                evicted = report.evicted.len(),
                online = state.online_count(),
                "clients expired"
            );
        }
        if !report.rerouted.is_empty() {
            debug!(rerouted = report.rerouted.len(), "unrouted clients attached");
        }
        Ok(report)
    }
}

/// Server with spare degree and the fewest edges; creation order breaks ties.
fn least_loaded(state: &FleetState) -> Option<ServerId> {
    state
        .available_servers()
        .into_iter()
        .min_by_key(|s| state.topology().degree(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpsim_core::FleetConfig;

    fn fleet(servers: usize, max: usize) -> Fleet {
        Fleet::new(&FleetConfig {
            num_servers: servers,
            min_servers: 1,
            max_connections: max,
            client_pool_size: 8,
            ..FleetConfig::default()
        })
    }

    fn connect(fleet: &Fleet, client: &str, lifetime: u32, server: Option<&str>) {
        let mut state = fleet.lock();
        state.connect_client(client, "LoadBalancer_1", lifetime).unwrap();
        if let Some(server) = server {
            state.route_client(client, server).unwrap();
        }
    }

    #[test]
    fn expired_clients_are_fully_removed() {
        let fleet = fleet(2, 2);
        connect(&fleet, "Client_00", 1, Some("Server_A"));
        connect(&fleet, "Client_01", 3, Some("Server_B"));

        let report = LifecycleSweeper::new().sweep(&fleet).unwrap();
        assert_eq!(report.evicted, vec!["Client_00".to_string()]);
        assert_eq!(report.unrouted_evictions, 0);

        let state = fleet.lock();
        assert!(!state.topology().contains("Client_00"));
        assert!(state.server("Server_A").unwrap().attached.is_empty());
        assert_eq!(state.topology().degree("Server_A"), 0);
        assert_eq!(state.lifetime("Client_01"), Some(2));
        assert!(state.invariant_violations().is_empty());
    }

    #[test]
    fn unrouted_expiry_is_logged_and_completed() {
        let fleet = fleet(1, 2);
        connect(&fleet, "Client_00", 1, None);

        // Eviction runs before re-routing, so the client leaves unrouted.
        let report = LifecycleSweeper::new().sweep(&fleet).unwrap();
        assert_eq!(report.evicted, vec!["Client_00".to_string()]);
        assert_eq!(report.unrouted_evictions, 1);

        let state = fleet.lock();
        assert_eq!(state.online_count(), 0);
        assert!(!state.topology().contains("Client_00"));
        assert!(state
            .log()
            .iter()
            .any(|l| l == "LoadBalancer_1 failed to disconnect Client_00 from server"));
    }

    #[test]
    fn stragglers_routed_to_least_loaded_server() {
        let fleet = fleet(2, 2);
        connect(&fleet, "Client_00", 5, Some("Server_A"));
        connect(&fleet, "Client_01", 5, None);

        let report = LifecycleSweeper::new().sweep(&fleet).unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(
            report.rerouted,
            vec![("Client_01".to_string(), "Server_B".to_string())]
        );
        assert!(fleet.lock().invariant_violations().is_empty());
    }

    #[test]
    fn sweep_with_no_clients_changes_nothing() {
        let fleet = fleet(1, 1);
        let report = LifecycleSweeper::new().sweep(&fleet).unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(!fleet.notifier().is_set());
    }

    #[test]
    fn eviction_raises_signal() {
        let fleet = fleet(1, 1);
        connect(&fleet, "Client_00", 1, Some("Server_A"));
        fleet.publish();
        fleet.notifier().clear();

        LifecycleSweeper::new().sweep(&fleet).unwrap();
        assert!(fleet.notifier().is_set());
    }
}
