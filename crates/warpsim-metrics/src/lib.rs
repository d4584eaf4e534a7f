//! warpsim-metrics — fleet pressure for WarpSim.
//!
//! Pressure is the fraction of total server capacity in use. The monitor
//! samples it into the fleet's bounded history and smooths the history
//! with an exponentially weighted moving average before the autoscaler
//! looks at it.
//!
//! # Architecture
//!
//! ```text
//! PressureMonitor
//!   ├── pressure() ← attached clients / (servers * max_connections)
//!   ├── sample()   → appends to FleetState's pressure history
//!   └── ewma()     → newest sample weighted alpha, decaying by (1 - alpha)
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain gauges for a snapshot
//! ```

pub mod pressure;
pub mod prometheus;

pub use pressure::{ewma, PressureMonitor, PressureReading};
pub use prometheus::render_prometheus;
