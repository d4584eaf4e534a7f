//! Read-only copies of the fleet state for observers.

use serde::Serialize;

use warpsim_core::{ClientId, LoadBalancerId, NodeKind, ServerId};

use crate::store::FleetState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerLoad {
    pub id: ServerId,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancerLoad {
    pub id: LoadBalancerId,
    pub clients: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientLifetime {
    pub id: ClientId,
    pub remaining: u32,
}

/// Everything a dashboard shows, copied in one lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSnapshot {
    /// Creation order.
    pub servers: Vec<ServerLoad>,
    pub load_balancers: Vec<BalancerLoad>,
    /// Sorted by client id.
    pub clients: Vec<ClientLifetime>,
    pub online: usize,
    pub pool_size: usize,
    pub queue_depth: usize,
    /// Servers with at least one edge.
    pub active_servers: usize,
    pub total_servers: usize,
    pub capacity: usize,
    /// Oldest to newest.
    pub pressure_history: Vec<f64>,
    pub log: Vec<String>,
}

impl FleetSnapshot {
    pub fn capture(state: &FleetState) -> Self {
        let topology = state.topology();
        let servers: Vec<ServerLoad> = state
            .servers()
            .iter()
            .map(|s| ServerLoad {
                id: s.id.clone(),
                connections: s.attached.len(),
            })
            .collect();
        let active_servers = state
            .servers()
            .iter()
            .filter(|s| topology.degree(&s.id) > 0)
            .count();

        Self {
            load_balancers: state
                .load_balancers()
                .iter()
                .map(|lb| BalancerLoad {
                    id: lb.clone(),
                    clients: topology.neighbors_of_kind(lb, NodeKind::Client).len(),
                })
                .collect(),
            clients: state
                .lifetimes()
                .iter()
                .map(|(id, remaining)| ClientLifetime {
                    id: id.clone(),
                    remaining: *remaining,
                })
                .collect(),
            online: state.online_count(),
            pool_size: state.pool().len(),
            queue_depth: state.queue_depth(),
            active_servers,
            total_servers: servers.len(),
            capacity: state.capacity(),
            pressure_history: state.pressure_history().to_vec(),
            log: state.log().to_vec(),
            servers,
        }
    }
}
