//! Error types for fleet state operations.

use thiserror::Error;

use warpsim_core::{ClientId, NodeId, NodeKind};

/// Result type alias for fleet state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Contract violations against the fleet state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("client already online: {0}")]
    AlreadyOnline(ClientId),

    #[error("client not in pool: {0}")]
    NotInPool(ClientId),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("node already exists: {0}")]
    DuplicateNode(NodeId),

    #[error("expected {expected} node, found {found}: {id}")]
    WrongKind {
        id: NodeId,
        expected: NodeKind,
        found: NodeKind,
    },

    #[error("client {client} has {count} load balancer edges, expected exactly one")]
    LoadBalancerInvariant { client: ClientId, count: usize },

    #[error("client {0} is already routed to a server")]
    AlreadyRouted(ClientId),

    #[error("server {0} is at capacity")]
    ServerFull(NodeId),
}
