//! Plain-text dashboard driven by the fleet's change signal.
//!
//! Runs on its own thread. Each wake-up takes one frame (snapshot and
//! pressure reading from a single lock acquisition) and renders a
//! plain-text status block.

use std::io::{self, Write};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use warpsim_core::{ArrivalConfig, FleetConfig};
use warpsim_metrics::{PressureMonitor, PressureReading};
use warpsim_state::{Fleet, FleetSnapshot};

pub struct Dashboard {
    fleet: Fleet,
    config: FleetConfig,
    monitor: PressureMonitor,
    /// Upper bound on one wait, so shutdown is noticed without a change.
    poll: Duration,
}

impl Dashboard {
    pub fn new(fleet: Fleet, config: &FleetConfig) -> Self {
        Self {
            fleet,
            config: config.clone(),
            monitor: PressureMonitor::from_config(config),
            poll: Duration::from_millis(250),
        }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Snapshot and pressure reading, copied under one lock.
    pub fn frame(&self) -> (FleetSnapshot, PressureReading) {
        let state = self.fleet.lock();
        (
            FleetSnapshot::capture(&state),
            self.monitor.reading_locked(&state),
        )
    }

    /// Render once per change signal until `shutdown` flips to true.
    ///
    /// Returns the number of frames written.
    pub fn run<W: Write>(&self, out: &mut W, shutdown: watch::Receiver<bool>) -> io::Result<usize> {
        let mut frames = 0;
        while !*shutdown.borrow() {
            if !self.fleet.notifier().wait_timeout(self.poll) {
                continue;
            }
            let (snapshot, pressure) = self.frame();
            out.write_all(render(&snapshot, &pressure, &self.config).as_bytes())?;
            out.flush()?;
            frames += 1;
        }
        debug!(frames, "dashboard stopped");
        Ok(frames)
    }
}

/// Render a snapshot as a plain-text status block.
pub fn render(snapshot: &FleetSnapshot, pressure: &PressureReading, config: &FleetConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "== Network Status ==\nActive Clients: {} | Total known users: {} | Active Servers: {} | Total Servers: {}\n",
        snapshot.online, snapshot.pool_size, snapshot.active_servers, snapshot.total_servers
    ));
    out.push_str(&format!(
        "== Metrics ==\nServer Pressure: {:.2}% | EWMA Server Pressure: {:.2}% | Client Queue Depth: {}\n",
        pressure.current * 100.0,
        pressure.ewma * 100.0,
        snapshot.queue_depth
    ));

    out.push_str("== Server Status ==\n");
    for s in &snapshot.servers {
        let status = if s.connections > 0 { "active" } else { "idle" };
        out.push_str(&format!(
            "{} is {} with {} connected client(s)\n",
            s.id, status, s.connections
        ));
    }

    out.push_str("== Load Balancer Status ==\n");
    for lb in &snapshot.load_balancers {
        out.push_str(&format!("{} has {} connected client(s)\n", lb.id, lb.clients));
    }

    out.push_str("== Client Lifetimes ==\n");
    for c in &snapshot.clients {
        out.push_str(&format!("{}: {}\n", c.id, c.remaining));
    }

    out.push_str("== Logs ==\n");
    for line in &snapshot.log {
        out.push_str(line);
        out.push('\n');
    }

    out.push_str(&render_settings(config));
    out
}

/// The active configuration as a short settings panel.
pub fn render_settings(config: &FleetConfig) -> String {
    let arrivals = match &config.arrivals {
        ArrivalConfig::Constant { clients_per_step } => format!("{clients_per_step}/step"),
        ArrivalConfig::Wave {
            amplitude,
            frequency,
            offset,
        } => format!("wave {offset} ± {amplitude} @ {frequency}"),
    };
    format!(
        "== Active Settings ==\n\
         servers: {} (min {}) x {} connections | load balancers: {} | client pool: {}\n\
         lifetime: {} ± {} | arrivals: {} | policy: {}\n\
         autoscale: {} | scale up > {} | scale down < {} | ewma alpha: {} | history: {}\n",
        config.num_servers,
        config.min_servers,
        config.max_connections,
        config.num_load_balancers,
        config.client_pool_size,
        config.client_lifetime_mean,
        config.client_lifetime_stddev,
        arrivals,
        config.admission_policy,
        if config.autoscale { "on" } else { "off" },
        config.scale_up_threshold,
        config.scale_down_threshold,
        config.ewma_alpha,
        config.pressure_history_len,
    )
}
