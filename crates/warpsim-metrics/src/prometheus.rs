//! Prometheus text exposition format.
//!
//! Renders a fleet snapshot and pressure reading as gauges, for scraping
//! or for dumping at the end of a run.

use warpsim_state::FleetSnapshot;

use crate::pressure::PressureReading;

/// Render fleet gauges in Prometheus text format.
///
/// Per-server and per-load-balancer gauges carry `server` / `load_balancer`
/// labels; fleet-wide gauges carry none.
pub fn render_prometheus(snapshot: &FleetSnapshot, pressure: &PressureReading) -> String {
    let mut out = String::new();

    gauge(&mut out, "warpsim_pressure", "Fraction of fleet capacity in use.");
    out.push_str(&format!("warpsim_pressure {:.4}\n", pressure.current));

    gauge(&mut out, "warpsim_pressure_ewma", "Smoothed fleet pressure.");
    out.push_str(&format!("warpsim_pressure_ewma {:.4}\n", pressure.ewma));

    gauge(&mut out, "warpsim_online_clients", "Clients currently online.");
    out.push_str(&format!("warpsim_online_clients {}\n", snapshot.online));

    gauge(&mut out, "warpsim_queue_depth", "Clients waiting for capacity.");
    out.push_str(&format!("warpsim_queue_depth {}\n", snapshot.queue_depth));

    gauge(&mut out, "warpsim_servers", "Servers in the fleet.");
    out.push_str(&format!("warpsim_servers {}\n", snapshot.total_servers));

    gauge(
        &mut out,
        "warpsim_server_connections",
        "Clients attached to each server.",
    );
    for s in &snapshot.servers {
        out.push_str(&format!(
            "warpsim_server_connections{{server=\"{}\"}} {}\n",
            s.id, s.connections
        ));
    }

    gauge(
        &mut out,
        "warpsim_load_balancer_clients",
        "Clients connected through each load balancer.",
    );
    for lb in &snapshot.load_balancers {
        out.push_str(&format!(
            "warpsim_load_balancer_clients{{load_balancer=\"{}\"}} {}\n",
            lb.id, lb.clients
        ));
    }

    out
}

fn gauge(out: &mut String, name: &str, help: &str) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
}
