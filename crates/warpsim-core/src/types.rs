//! Node identities and naming for the simulated fleet.

use serde::{Deserialize, Serialize};

/// Unique identifier for any node in the topology.
pub type NodeId = String;

/// Identifier of a client in the pool.
pub type ClientId = NodeId;

/// Identifier of a server in the fleet.
pub type ServerId = NodeId;

/// Identifier of a load balancer.
pub type LoadBalancerId = NodeId;

/// What a topology node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Client,
    Server,
    LoadBalancer,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Client => write!(f, "client"),
            NodeKind::Server => write!(f, "server"),
            NodeKind::LoadBalancer => write!(f, "load_balancer"),
        }
    }
}

/// Name of the `index`-th client in the pool: `Client_00`, `Client_01`, ...
pub fn client_name(index: usize) -> ClientId {
    format!("Client_{index:02}")
}

/// Name of the `index`-th load balancer: `LoadBalancer_1`, `LoadBalancer_2`, ...
pub fn load_balancer_name(index: usize) -> LoadBalancerId {
    format!("LoadBalancer_{}", index + 1)
}

/// Name of the server allocated with sequence number `seq`.
///
/// Letters run `A..Z`, then `AA, AB, ...` in spreadsheet-column order,
/// so every sequence number maps to a distinct name.
pub fn server_name(seq: usize) -> ServerId {
    let mut n = seq + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("Server_{}", String::from_utf8_lossy(&letters))
}
