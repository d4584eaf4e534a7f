//! FleetState — the single owned aggregate behind the fleet lock.
//!
//! Holds the topology, client lifetimes, per-server attached lists, the
//! client pool and queue, the pressure history and the event log. All
//! methods assume the caller holds the lock (they take `&mut self`); the
//! policy decisions (which balancer, which server, when to scale) live in
//! the scheduler and autoscaler crates.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use warpsim_core::{
    client_name, load_balancer_name, server_name, ClientId, FleetConfig, LoadBalancerId,
    NodeKind, ServerId,
};

use crate::buffer::RollingBuffer;
use crate::error::{StateError, StateResult};
use crate::topology::Topology;

/// A server and the clients currently attached to it, in attach order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSlot {
    pub id: ServerId,
    pub attached: Vec<ClientId>,
}

/// What [`FleetState::disconnect_client`] removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub client: ClientId,
    pub load_balancer: Option<LoadBalancerId>,
    /// `None` when the client was connected but not routed to any server.
    pub server: Option<ServerId>,
}

#[derive(Debug, Clone)]
pub struct FleetState {
    topology: Topology,
    lifetimes: BTreeMap<ClientId, u32>,
    /// Creation order; the first slot is the oldest server.
    servers: Vec<ServerSlot>,
    load_balancers: Vec<LoadBalancerId>,
    pool: Vec<ClientId>,
    queue: VecDeque<ClientId>,
    pressure: RollingBuffer<f64>,
    log: RollingBuffer<String>,
    max_connections: usize,
    min_servers: usize,
    initial_servers: usize,
    next_server_seq: usize,
    changed: bool,
}

impl FleetState {
    /// Build the initial fleet: servers, load balancers and an empty pool.
    pub fn new(config: &FleetConfig) -> Self {
        let mut state = Self {
            topology: Topology::new(),
            lifetimes: BTreeMap::new(),
            servers: Vec::with_capacity(config.num_servers),
            load_balancers: (0..config.num_load_balancers)
                .map(load_balancer_name)
                .collect(),
            pool: (0..config.client_pool_size).map(client_name).collect(),
            queue: VecDeque::new(),
            pressure: RollingBuffer::new(config.pressure_history_len),
            log: RollingBuffer::new(config.log_tail),
            max_connections: config.max_connections,
            min_servers: config.min_servers,
            initial_servers: config.num_servers,
            next_server_seq: 0,
            changed: false,
        };
        state.build_topology();
        state
    }

    fn build_topology(&mut self) {
        self.topology = Topology::new();
        self.servers.clear();
        self.next_server_seq = 0;
        for lb in &self.load_balancers {
            // Names are unique by construction.
            let _ = self.topology.add_node(lb, NodeKind::LoadBalancer);
        }
        for _ in 0..self.initial_servers {
            self.allocate_server();
        }
    }

    fn allocate_server(&mut self) -> ServerId {
        // Skip any name still present; sequence numbers are never reused.
        let id = loop {
            let candidate = server_name(self.next_server_seq);
            self.next_server_seq += 1;
            if !self.topology.contains(&candidate) {
                break candidate;
            }
        };
        let _ = self.topology.add_node(&id, NodeKind::Server);
        self.servers.push(ServerSlot {
            id: id.clone(),
            attached: Vec::with_capacity(self.max_connections),
        });
        id
    }

    /// Restore the initial servers and load balancers and drop every
    /// client, queued candidate, pressure sample and log line.
    pub fn reset(&mut self) {
        self.lifetimes.clear();
        self.queue.clear();
        self.pressure.clear();
        self.log.clear();
        self.build_topology();
        self.changed = true;
        debug!(servers = self.servers.len(), "fleet reset");
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn lifetimes(&self) -> &BTreeMap<ClientId, u32> {
        &self.lifetimes
    }

    pub fn lifetime(&self, client: &str) -> Option<u32> {
        self.lifetimes.get(client).copied()
    }

    pub fn servers(&self) -> &[ServerSlot] {
        &self.servers
    }

    pub fn server(&self, id: &str) -> Option<&ServerSlot> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn load_balancers(&self) -> &[LoadBalancerId] {
        &self.load_balancers
    }

    pub fn pool(&self) -> &[ClientId] {
        &self.pool
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn min_servers(&self) -> usize {
        self.min_servers
    }

    pub fn pressure_history(&self) -> &RollingBuffer<f64> {
        &self.pressure
    }

    pub fn pressure_history_mut(&mut self) -> &mut RollingBuffer<f64> {
        self.changed = true;
        &mut self.pressure
    }

    pub fn log(&self) -> &RollingBuffer<String> {
        &self.log
    }

    /// Append a human-readable line to the rolling event log.
    pub fn log_event(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
        self.changed = true;
    }

    // ── Capacity ───────────────────────────────────────────────────

    pub fn online_count(&self) -> usize {
        self.lifetimes.len()
    }

    pub fn is_online(&self, client: &str) -> bool {
        self.lifetimes.contains_key(client)
    }

    pub fn in_pool(&self, client: &str) -> bool {
        self.pool.iter().any(|c| c == client)
    }

    /// `num_servers * max_connections`.
    pub fn capacity(&self) -> usize {
        self.servers.len() * self.max_connections
    }

    pub fn is_saturated(&self) -> bool {
        self.online_count() >= self.capacity()
    }

    /// Clients attached to any server.
    pub fn attached_total(&self) -> usize {
        self.servers.iter().map(|s| s.attached.len()).sum()
    }

    /// Servers whose degree is below `max_connections`, in creation order.
    pub fn available_servers(&self) -> Vec<ServerId> {
        self.servers
            .iter()
            .filter(|s| self.topology.degree(&s.id) < self.max_connections)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Pool members that are neither online nor queued.
    pub fn offline_clients(&self) -> Vec<ClientId> {
        self.pool
            .iter()
            .filter(|c| !self.is_online(c) && !self.is_queued(c))
            .cloned()
            .collect()
    }

    /// Online clients with a load balancer edge but no server route.
    pub fn unrouted_clients(&self) -> Vec<ClientId> {
        self.lifetimes
            .keys()
            .filter(|c| self.topology.routes_tagged(c) == 0)
            .cloned()
            .collect()
    }

    // ── Queue ──────────────────────────────────────────────────────

    pub fn queue(&self) -> &VecDeque<ClientId> {
        &self.queue
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, client: &str) -> bool {
        self.queue.iter().any(|c| c == client)
    }

    pub fn enqueue_back(&mut self, client: &str) {
        if !self.is_queued(client) {
            self.queue.push_back(client.to_string());
            self.changed = true;
        }
    }

    /// Put a drained candidate back at the head of the queue.
    pub fn enqueue_front(&mut self, client: &str) {
        if !self.is_queued(client) {
            self.queue.push_front(client.to_string());
            self.changed = true;
        }
    }

    /// Pop the oldest queued candidate.
    pub fn dequeue(&mut self) -> Option<ClientId> {
        let client = self.queue.pop_front();
        if client.is_some() {
            self.changed = true;
        }
        client
    }

    pub fn remove_from_queue(&mut self, client: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|c| c != client);
        let removed = self.queue.len() != before;
        self.changed |= removed;
        removed
    }

    // ── Clients ────────────────────────────────────────────────────

    /// Create the client node, link it to `load_balancer` and store its
    /// lifetime. The client is online but not yet routed to a server.
    pub fn connect_client(
        &mut self,
        client: &str,
        load_balancer: &str,
        lifetime: u32,
    ) -> StateResult<()> {
        if !self.in_pool(client) {
            return Err(StateError::NotInPool(client.to_string()));
        }
        if self.is_online(client) || self.topology.contains(client) {
            return Err(StateError::AlreadyOnline(client.to_string()));
        }
        if self.topology.kind(load_balancer) != Some(NodeKind::LoadBalancer) {
            return Err(StateError::UnknownNode(load_balancer.to_string()));
        }

        self.topology.add_node(client, NodeKind::Client)?;
        if let Err(e) = self.topology.link(client, load_balancer) {
            let _ = self.topology.remove_node(client);
            return Err(e);
        }
        self.lifetimes.insert(client.to_string(), lifetime.max(1));
        self.log_event(format!("{client} connected to {load_balancer}"));
        debug!(%client, %load_balancer, lifetime, "client connected");
        Ok(())
    }

    /// Add the tagged load balancer ↔ server edge for an online client and
    /// attach it to the server.
    pub fn route_client(&mut self, client: &str, server: &str) -> StateResult<LoadBalancerId> {
        if !self.is_online(client) {
            return Err(StateError::UnknownNode(client.to_string()));
        }
        if self.topology.routes_tagged(client) > 0 {
            return Err(StateError::AlreadyRouted(client.to_string()));
        }
        let slot = self
            .servers
            .iter()
            .position(|s| s.id == server)
            .ok_or_else(|| StateError::UnknownNode(server.to_string()))?;
        if self.topology.degree(server) >= self.max_connections {
            return Err(StateError::ServerFull(server.to_string()));
        }

        let load_balancer = self.topology.load_balancer_of(client)?;
        self.topology.add_route(&load_balancer, server, client)?;
        self.servers[slot].attached.push(client.to_string());
        self.log_event(format!("... {load_balancer} connected {client} to {server}"));
        debug!(%client, %load_balancer, %server, "client routed");
        Ok(load_balancer)
    }

    /// Decrement every online client's lifetime and return the expired ones.
    pub fn decrement_lifetimes(&mut self) -> Vec<ClientId> {
        let mut expired = Vec::new();
        for (client, remaining) in self.lifetimes.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                expired.push(client.clone());
            }
        }
        if !self.lifetimes.is_empty() {
            self.changed = true;
        }
        expired
    }

    /// Unwire and remove a client: its server route, its attached-list
    /// entry, its load balancer edge, its node and its lifetime entry.
    ///
    /// A client without a resolvable server is logged as an inconsistency
    /// and still removed completely.
    pub fn disconnect_client(&mut self, client: &str) -> StateResult<Disconnect> {
        if !self.is_online(client) && !self.topology.contains(client) {
            return Err(StateError::UnknownNode(client.to_string()));
        }

        let load_balancer = match self.topology.load_balancer_of(client) {
            Ok(lb) => Some(lb),
            Err(e) => {
                warn!(%client, error = %e, "client has no unique load balancer");
                None
            }
        };
        let server = load_balancer
            .as_deref()
            .and_then(|lb| self.topology.server_for(lb, client));

        match (&load_balancer, &server) {
            (Some(lb), Some(server)) => {
                self.topology.remove_route(lb, server, client);
                self.log_event(format!("... {lb} disconnected {client} from {server}"));
            }
            (Some(lb), None) => {
                warn!(%client, load_balancer = %lb, "expired client was not routed to a server");
                self.log_event(format!("{lb} failed to disconnect {client} from server"));
            }
            (None, _) => {
                self.log_event(format!("failed to resolve load balancer for {client}"));
            }
        }

        for slot in &mut self.servers {
            slot.attached.retain(|c| c != client);
        }
        if self.topology.contains(client) {
            self.topology.remove_node(client)?;
        }
        self.lifetimes.remove(client);
        match &load_balancer {
            Some(lb) => self.log_event(format!("{client} disconnected from {lb}")),
            None => self.log_event(format!("{client} disconnected")),
        }
        debug!(%client, ?server, "client disconnected");

        Ok(Disconnect {
            client: client.to_string(),
            load_balancer,
            server,
        })
    }

    // ── Servers ────────────────────────────────────────────────────

    /// Allocate the next server name and add it to the fleet.
    pub fn add_server(&mut self) -> ServerId {
        let id = self.allocate_server();
        self.log_event(format!("Added new server: {id}"));
        id
    }

    /// The server created first among those still running.
    pub fn oldest_server(&self) -> Option<&ServerId> {
        self.servers.first().map(|s| &s.id)
    }

    /// Evict every client attached to `server`, then remove the server.
    ///
    /// Returns the evicted clients. Does not enforce the server floor.
    pub fn remove_server(&mut self, server: &str) -> StateResult<Vec<ClientId>> {
        let slot = self
            .servers
            .iter()
            .position(|s| s.id == server)
            .ok_or_else(|| StateError::UnknownNode(server.to_string()))?;

        let attached = self.servers[slot].attached.clone();
        for client in &attached {
            self.disconnect_client(client)?;
        }
        self.topology.remove_node(server)?;
        self.servers.remove(slot);
        self.log_event(format!("Spun down server: {server}"));
        Ok(attached)
    }

    // ── Change tracking ────────────────────────────────────────────

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Clear and return the changed flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Structural invariant violations, empty when consistent.
    ///
    /// Checks that lifetimes, client nodes and attached lists agree, that
    /// no server exceeds `max_connections`, and that every client has one
    /// load balancer edge and at most one route.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        let clients = self.topology.count(NodeKind::Client);
        let attached = self.attached_total();
        if self.lifetimes.len() != clients || clients != attached {
            out.push(format!(
                "lifetimes={} client_nodes={} attached={}",
                self.lifetimes.len(),
                clients,
                attached
            ));
        }
        for slot in &self.servers {
            let degree = self.topology.degree(&slot.id);
            if degree > self.max_connections {
                out.push(format!("{} degree {} exceeds max", slot.id, degree));
            }
            if degree != slot.attached.len() {
                out.push(format!(
                    "{} degree {} != attached {}",
                    slot.id,
                    degree,
                    slot.attached.len()
                ));
            }
        }
        for client in self.lifetimes.keys() {
            if let Err(e) = self.topology.load_balancer_of(client) {
                out.push(e.to_string());
            }
            if self.topology.routes_tagged(client) > 1 {
                out.push(format!("{client} has several routes"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(servers: usize, max: usize) -> FleetConfig {
        FleetConfig {
            num_servers: servers,
            min_servers: 1,
            max_connections: max,
            client_pool_size: 10,
            ..FleetConfig::default()
        }
    }

    fn connect_and_route(state: &mut FleetState, client: &str, server: &str) {
        state.connect_client(client, "LoadBalancer_1", 5).unwrap();
        state.route_client(client, server).unwrap();
    }

    #[test]
    fn initial_fleet_layout() {
        let state = FleetState::new(&config(3, 2));
        let ids: Vec<_> = state.servers().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Server_A", "Server_B", "Server_C"]);
        assert_eq!(state.load_balancers(), &["LoadBalancer_1".to_string()]);
        assert_eq!(state.capacity(), 6);
        assert_eq!(state.offline_clients().len(), 10);
        assert!(state.invariant_violations().is_empty());
    }

    #[test]
    fn connect_rejects_online_and_unknown_clients() {
        let mut state = FleetState::new(&config(1, 2));
        state.connect_client("Client_00", "LoadBalancer_1", 3).unwrap();
        assert_eq!(
            state.connect_client("Client_00", "LoadBalancer_1", 3),
            Err(StateError::AlreadyOnline("Client_00".to_string()))
        );
        assert_eq!(
            state.connect_client("Client_99", "LoadBalancer_1", 3),
            Err(StateError::NotInPool("Client_99".to_string()))
        );
        assert_eq!(state.online_count(), 1);
    }

    #[test]
    fn route_respects_capacity() {
        let mut state = FleetState::new(&config(1, 1));
        connect_and_route(&mut state, "Client_00", "Server_A");
        state.connect_client("Client_01", "LoadBalancer_1", 3).unwrap();

        assert_eq!(
            state.route_client("Client_01", "Server_A"),
            Err(StateError::ServerFull("Server_A".to_string()))
        );
        assert!(state.available_servers().is_empty());
        assert_eq!(state.unrouted_clients(), vec!["Client_01".to_string()]);
    }

    #[test]
    fn route_twice_is_rejected() {
        let mut state = FleetState::new(&config(2, 2));
        connect_and_route(&mut state, "Client_00", "Server_A");
        assert_eq!(
            state.route_client("Client_00", "Server_B"),
            Err(StateError::AlreadyRouted("Client_00".to_string()))
        );
    }

    #[test]
    fn disconnect_frees_server_slot() {
        let mut state = FleetState::new(&config(1, 2));
        connect_and_route(&mut state, "Client_00", "Server_A");

        let d = state.disconnect_client("Client_00").unwrap();
        assert_eq!(d.server.as_deref(), Some("Server_A"));
        assert_eq!(d.load_balancer.as_deref(), Some("LoadBalancer_1"));
        assert_eq!(state.online_count(), 0);
        assert!(state.server("Server_A").unwrap().attached.is_empty());
        assert_eq!(state.topology().degree("Server_A"), 0);
        assert!(state.invariant_violations().is_empty());
    }

    #[test]
    fn disconnect_unrouted_client_still_removes_it() {
        let mut state = FleetState::new(&config(1, 2));
        state.connect_client("Client_00", "LoadBalancer_1", 3).unwrap();

        let d = state.disconnect_client("Client_00").unwrap();
        assert_eq!(d.server, None);
        assert!(!state.topology().contains("Client_00"));
        assert!(!state.is_online("Client_00"));
        assert!(state
            .log()
            .iter()
            .any(|l| l.contains("failed to disconnect Client_00")));
    }

    #[test]
    fn lifetimes_expire_at_zero() {
        let mut state = FleetState::new(&config(1, 3));
        state.connect_client("Client_00", "LoadBalancer_1", 1).unwrap();
        state.connect_client("Client_01", "LoadBalancer_1", 2).unwrap();

        assert_eq!(state.decrement_lifetimes(), vec!["Client_00".to_string()]);
        assert_eq!(state.lifetime("Client_01"), Some(1));
    }

    #[test]
    fn removing_server_evicts_only_its_clients() {
        let mut state = FleetState::new(&config(2, 2));
        connect_and_route(&mut state, "Client_00", "Server_A");
        connect_and_route(&mut state, "Client_01", "Server_A");
        connect_and_route(&mut state, "Client_02", "Server_B");

        let evicted = state.remove_server("Server_A").unwrap();
        assert_eq!(evicted, vec!["Client_00".to_string(), "Client_01".to_string()]);
        assert_eq!(state.online_count(), 1);
        assert!(state.is_online("Client_02"));
        assert!(!state.topology().contains("Server_A"));
        assert!(state.invariant_violations().is_empty());
    }

    #[test]
    fn server_names_are_never_reused() {
        let mut state = FleetState::new(&config(2, 2));
        state.remove_server("Server_A").unwrap();
        assert_eq!(state.add_server(), "Server_C");
        assert_eq!(state.oldest_server().map(String::as_str), Some("Server_B"));
    }

    #[test]
    fn queue_is_fifo_without_duplicates() {
        let mut state = FleetState::new(&config(1, 1));
        state.enqueue_back("Client_00");
        state.enqueue_back("Client_01");
        state.enqueue_back("Client_00");
        assert_eq!(state.queue_depth(), 2);
        assert_eq!(state.dequeue().as_deref(), Some("Client_00"));
        state.enqueue_front("Client_00");
        assert_eq!(state.queue().front().map(String::as_str), Some("Client_00"));
        assert!(state.remove_from_queue("Client_01"));
        assert_eq!(state.queue_depth(), 1);
        assert!(!state.offline_clients().contains(&"Client_00".to_string()));
    }

    #[test]
    fn reset_restores_initial_servers() {
        let mut state = FleetState::new(&config(2, 2));
        connect_and_route(&mut state, "Client_00", "Server_A");
        state.add_server();
        state.enqueue_back("Client_05");
        state.pressure_history_mut().push(0.5);
        state.take_changed();

        state.reset();
        assert!(state.is_changed());
        assert_eq!(state.servers().len(), 2);
        assert_eq!(state.online_count(), 0);
        assert_eq!(state.queue_depth(), 0);
        assert!(state.pressure_history().is_empty());
        assert_eq!(state.add_server(), "Server_C");
    }

    #[test]
    fn take_changed_clears_flag() {
        let mut state = FleetState::new(&config(1, 1));
        assert!(!state.is_changed());
        state.log_event("hello");
        assert!(state.take_changed());
        assert!(!state.take_changed());
    }
}
