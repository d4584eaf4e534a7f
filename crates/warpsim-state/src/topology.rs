//! Typed nodes and the edges between them.
//!
//! An explicit adjacency structure in place of a general multigraph.
//! Client ↔ load balancer edges are plain links. Load balancer ↔ server
//! edges are *routes*: one per routed client, stored in a side map keyed
//! by `(load_balancer, server)` whose value is the set of client tags.
//! The number of parallel edges between a load balancer and a server is
//! the size of that set.

use std::collections::{BTreeMap, BTreeSet};

use warpsim_core::{ClientId, LoadBalancerId, NodeId, NodeKind, ServerId};

use crate::error::{StateError, StateResult};

#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, NodeKind>,
    /// Untagged client ↔ load balancer edges, stored on both endpoints.
    links: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Tagged load balancer ↔ server edges.
    routes: BTreeMap<(LoadBalancerId, ServerId), BTreeSet<ClientId>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ──────────────────────────────────────────────────────

    pub fn add_node(&mut self, id: &str, kind: NodeKind) -> StateResult<()> {
        if self.nodes.contains_key(id) {
            return Err(StateError::DuplicateNode(id.to_string()));
        }
        self.nodes.insert(id.to_string(), kind);
        Ok(())
    }

    /// Remove a node and every edge incident to it.
    ///
    /// Routes *tagged* with a removed client stay in place; they connect a
    /// load balancer and a server, and the caller removes them explicitly.
    pub fn remove_node(&mut self, id: &str) -> StateResult<NodeKind> {
        let kind = self
            .nodes
            .remove(id)
            .ok_or_else(|| StateError::UnknownNode(id.to_string()))?;

        if let Some(peers) = self.links.remove(id) {
            for peer in peers {
                if let Some(set) = self.links.get_mut(&peer) {
                    set.remove(id);
                    if set.is_empty() {
                        self.links.remove(&peer);
                    }
                }
            }
        }
        self.routes.retain(|(lb, server), _| lb != id && server != id);
        Ok(kind)
    }

    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.nodes.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes of the given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|k| **k == kind).count()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn expect_kind(&self, id: &str, expected: NodeKind) -> StateResult<()> {
        match self.kind(id) {
            None => Err(StateError::UnknownNode(id.to_string())),
            Some(found) if found != expected => Err(StateError::WrongKind {
                id: id.to_string(),
                expected,
                found,
            }),
            Some(_) => Ok(()),
        }
    }

    // ── Edges ──────────────────────────────────────────────────────

    /// Add the client ↔ load balancer edge.
    pub fn link(&mut self, client: &str, load_balancer: &str) -> StateResult<()> {
        self.expect_kind(client, NodeKind::Client)?;
        self.expect_kind(load_balancer, NodeKind::LoadBalancer)?;
        self.links
            .entry(client.to_string())
            .or_default()
            .insert(load_balancer.to_string());
        self.links
            .entry(load_balancer.to_string())
            .or_default()
            .insert(client.to_string());
        Ok(())
    }

    /// Remove the client ↔ load balancer edge. Returns true if it existed.
    pub fn unlink(&mut self, client: &str, load_balancer: &str) -> bool {
        let mut existed = false;
        for (a, b) in [(client, load_balancer), (load_balancer, client)] {
            if let Some(set) = self.links.get_mut(a) {
                existed |= set.remove(b);
                if set.is_empty() {
                    self.links.remove(a);
                }
            }
        }
        existed
    }

    /// Add a load balancer ↔ server edge carrying `client`'s traffic.
    pub fn add_route(&mut self, load_balancer: &str, server: &str, client: &str) -> StateResult<()> {
        self.expect_kind(load_balancer, NodeKind::LoadBalancer)?;
        self.expect_kind(server, NodeKind::Server)?;
        self.routes
            .entry((load_balancer.to_string(), server.to_string()))
            .or_default()
            .insert(client.to_string());
        Ok(())
    }

    /// Remove the route tagged with `client`. Returns true if it existed.
    pub fn remove_route(&mut self, load_balancer: &str, server: &str, client: &str) -> bool {
        let key = (load_balancer.to_string(), server.to_string());
        let Some(tags) = self.routes.get_mut(&key) else {
            return false;
        };
        let existed = tags.remove(client);
        if tags.is_empty() {
            self.routes.remove(&key);
        }
        existed
    }

    /// Client tags on the edges between a load balancer and a server.
    pub fn route_tags(&self, load_balancer: &str, server: &str) -> Vec<ClientId> {
        self.routes
            .get(&(load_balancer.to_string(), server.to_string()))
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Distinct neighbors of a node, sorted.
    pub fn neighbors(&self, id: &str) -> Vec<NodeId> {
        let mut out: BTreeSet<NodeId> = self.links.get(id).cloned().unwrap_or_default();
        for (lb, server) in self.routes.keys() {
            if lb == id {
                out.insert(server.clone());
            } else if server == id {
                out.insert(lb.clone());
            }
        }
        out.into_iter().collect()
    }

    pub fn neighbors_of_kind(&self, id: &str, kind: NodeKind) -> Vec<NodeId> {
        self.neighbors(id)
            .into_iter()
            .filter(|n| self.kind(n) == Some(kind))
            .collect()
    }

    /// Number of edges incident to a node, counting parallel routes.
    pub fn degree(&self, id: &str) -> usize {
        let links = self.links.get(id).map_or(0, BTreeSet::len);
        let routes: usize = self
            .routes
            .iter()
            .filter(|((lb, server), _)| lb == id || server == id)
            .map(|(_, tags)| tags.len())
            .sum();
        links + routes
    }

    /// The single load balancer a client is connected to.
    ///
    /// Zero or several load balancer neighbors break the topology
    /// invariant and are reported as an error.
    pub fn load_balancer_of(&self, client: &str) -> StateResult<LoadBalancerId> {
        self.expect_kind(client, NodeKind::Client)?;
        let mut lbs = self.neighbors_of_kind(client, NodeKind::LoadBalancer);
        if lbs.len() != 1 {
            return Err(StateError::LoadBalancerInvariant {
                client: client.to_string(),
                count: lbs.len(),
            });
        }
        Ok(lbs.remove(0))
    }

    /// Find the server carrying `client`'s traffic by scanning the load
    /// balancer's server neighbors for an edge tagged with the client.
    pub fn server_for(&self, load_balancer: &str, client: &str) -> Option<ServerId> {
        self.neighbors_of_kind(load_balancer, NodeKind::Server)
            .into_iter()
            .find(|server| {
                self.routes
                    .get(&(load_balancer.to_string(), server.clone()))
                    .is_some_and(|tags| tags.contains(client))
            })
    }

    /// Number of routes tagged with `client` anywhere in the topology.
    pub fn routes_tagged(&self, client: &str) -> usize {
        self.routes.values().filter(|tags| tags.contains(client)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Topology {
        let mut t = Topology::new();
        t.add_node("LoadBalancer_1", NodeKind::LoadBalancer).unwrap();
        t.add_node("Server_A", NodeKind::Server).unwrap();
        t.add_node("Server_B", NodeKind::Server).unwrap();
        t.add_node("Client_00", NodeKind::Client).unwrap();
        t.add_node("Client_01", NodeKind::Client).unwrap();
        t
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut t = small();
        assert_eq!(
            t.add_node("Server_A", NodeKind::Server),
            Err(StateError::DuplicateNode("Server_A".to_string()))
        );
    }

    #[test]
    fn parallel_routes_count_toward_degree() {
        let mut t = small();
        t.link("Client_00", "LoadBalancer_1").unwrap();
        t.link("Client_01", "LoadBalancer_1").unwrap();
        t.add_route("LoadBalancer_1", "Server_A", "Client_00").unwrap();
        t.add_route("LoadBalancer_1", "Server_A", "Client_01").unwrap();

        assert_eq!(t.degree("Server_A"), 2);
        assert_eq!(t.degree("Server_B"), 0);
        // two client links + two parallel routes
        assert_eq!(t.degree("LoadBalancer_1"), 4);
        assert_eq!(t.degree("Client_00"), 1);
        assert_eq!(
            t.route_tags("LoadBalancer_1", "Server_A"),
            vec!["Client_00".to_string(), "Client_01".to_string()]
        );
    }

    #[test]
    fn server_lookup_by_tag() {
        let mut t = small();
        t.link("Client_00", "LoadBalancer_1").unwrap();
        t.add_route("LoadBalancer_1", "Server_B", "Client_00").unwrap();

        assert_eq!(
            t.server_for("LoadBalancer_1", "Client_00"),
            Some("Server_B".to_string())
        );
        assert_eq!(t.server_for("LoadBalancer_1", "Client_01"), None);
    }

    #[test]
    fn load_balancer_invariant_checked() {
        let mut t = small();
        assert_eq!(
            t.load_balancer_of("Client_00"),
            Err(StateError::LoadBalancerInvariant {
                client: "Client_00".to_string(),
                count: 0,
            })
        );

        t.add_node("LoadBalancer_2", NodeKind::LoadBalancer).unwrap();
        t.link("Client_00", "LoadBalancer_1").unwrap();
        assert_eq!(t.load_balancer_of("Client_00").unwrap(), "LoadBalancer_1");

        t.link("Client_00", "LoadBalancer_2").unwrap();
        assert!(matches!(
            t.load_balancer_of("Client_00"),
            Err(StateError::LoadBalancerInvariant { count: 2, .. })
        ));
    }

    #[test]
    fn link_checks_kinds() {
        let mut t = small();
        assert!(matches!(
            t.link("Server_A", "LoadBalancer_1"),
            Err(StateError::WrongKind { .. })
        ));
        assert_eq!(
            t.add_route("LoadBalancer_1", "Server_Z", "Client_00"),
            Err(StateError::UnknownNode("Server_Z".to_string()))
        );
    }

    #[test]
    fn removing_server_drops_its_routes() {
        let mut t = small();
        t.link("Client_00", "LoadBalancer_1").unwrap();
        t.add_route("LoadBalancer_1", "Server_A", "Client_00").unwrap();

        assert_eq!(t.remove_node("Server_A").unwrap(), NodeKind::Server);
        assert_eq!(t.routes_tagged("Client_00"), 0);
        assert_eq!(t.neighbors("LoadBalancer_1"), vec!["Client_00".to_string()]);
    }

    #[test]
    fn removing_client_keeps_tagged_route() {
        let mut t = small();
        t.link("Client_00", "LoadBalancer_1").unwrap();
        t.add_route("LoadBalancer_1", "Server_A", "Client_00").unwrap();

        t.remove_node("Client_00").unwrap();
        assert_eq!(t.degree("LoadBalancer_1"), 1);
        assert!(t.remove_route("LoadBalancer_1", "Server_A", "Client_00"));
        assert_eq!(t.degree("LoadBalancer_1"), 0);
    }

    #[test]
    fn unlink_reports_existence() {
        let mut t = small();
        t.link("Client_00", "LoadBalancer_1").unwrap();
        assert!(t.unlink("Client_00", "LoadBalancer_1"));
        assert!(!t.unlink("Client_00", "LoadBalancer_1"));
        assert_eq!(t.count(NodeKind::Client), 2);
        assert_eq!(t.count(NodeKind::Server), 2);
    }
}
