//! warpsim-autoscale — pressure-driven server scaling.
//!
//! Samples fleet pressure, smooths it with an EWMA, and adds or removes
//! one server per evaluation.
//!
//! # Scaling Algorithm
//!
//! ```text
//! history.push(attached / capacity)
//! smoothed = ewma(history, alpha)
//!
//! if smoothed > scale_up_threshold:
//!     add_server()
//! elif smoothed < scale_down_threshold and servers > min_servers:
//!     remove_server(oldest)   // evicts its attached clients
//! ```
//!
//! The gap between the two thresholds is a dead band: no action is taken
//! inside it, which keeps the fleet from oscillating around one value.

pub mod scaler;

pub use scaler::{Autoscaler, ScaleDecision};
