//! warpsim-scheduler — admission and lifecycle for simulated clients.
//!
//! The scheduler decides which offline pool member joins the fleet,
//! which load balancer it connects through and which server carries its
//! traffic, and ages connected clients until they leave.
//!
//! # Architecture
//!
//! ```text
//! AdmissionController
//!   ├── phase 1 (under lock): capacity check → queue / reject / connect
//!   │     └── LifetimeSampler (Gaussian, floored at 1)
//!   └── phase 2 (lock re-acquired): route to a random server with spare degree
//!
//! LifecycleSweeper
//!   └── one lock for the whole pass: decrement → evict expired → re-route stragglers
//! ```

pub mod admission;
pub mod error;
pub mod lifetime;
pub mod sweeper;

pub use admission::{Admission, AdmissionController};
pub use error::{SchedulerError, SchedulerResult};
pub use lifetime::LifetimeSampler;
pub use sweeper::{LifecycleSweeper, SweepReport};
