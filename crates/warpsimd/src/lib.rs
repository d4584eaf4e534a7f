//! warpsimd — the WarpSim session and its observers.
//!
//! A [`Simulation`] owns one fleet and drives it one tick at a time:
//!
//! ```text
//! tick(step)
//!   ├── admit   (initial clients at step 0, arrival schedule afterwards)
//!   ├── sweep   (age and evict)
//!   ├── evaluate (sample pressure, EWMA, scale up/down)
//!   └── publish (change signal raised at most once)
//! ```
//!
//! The [`Dashboard`] runs on its own thread, waits on the change signal
//! and renders read-only snapshots.

pub mod dashboard;
pub mod error;
pub mod session;

pub use dashboard::Dashboard;
pub use error::{SimError, SimResult};
pub use session::{Simulation, TickReport};
