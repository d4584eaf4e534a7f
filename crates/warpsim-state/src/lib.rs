//! warpsim-state — shared fleet state for WarpSim.
//!
//! Owns the topology (clients, load balancers, servers and the edges
//! between them), the per-client lifetime counters, the client queue,
//! the pressure history and the rolling event log. Everything lives in
//! one [`FleetState`] aggregate behind a single lock.
//!
//! # Architecture
//!
//! ```text
//! Fleet (Clone, Arc)
//!   ├── Mutex<FleetState>
//!   │   ├── Topology (adjacency + client-tagged routes)
//!   │   ├── lifetimes: client → ticks remaining
//!   │   ├── servers: creation-ordered attached-client lists
//!   │   ├── queue (FIFO)
//!   │   ├── RollingBuffer<f64> (pressure history)
//!   │   └── RollingBuffer<String> (event log)
//!   └── ChangeNotifier (auto-reset signal for observers)
//! ```
//!
//! Mutators take the lock through [`Fleet::lock`]; observers use the
//! snapshot queries, which copy under the lock and release it.

pub mod buffer;
pub mod error;
pub mod fleet;
pub mod notifier;
pub mod snapshot;
pub mod store;
pub mod topology;

pub use buffer::RollingBuffer;
pub use error::{StateError, StateResult};
pub use fleet::{BatchGuard, Fleet};
pub use notifier::ChangeNotifier;
pub use snapshot::FleetSnapshot;
pub use store::{Disconnect, FleetState, ServerSlot};
pub use topology::Topology;
