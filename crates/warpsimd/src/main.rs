//! warpsimd — the WarpSim daemon.
//!
//! Runs a simulated load-balanced fleet: clients join through load
//! balancers, servers fill up, clients expire, and the autoscaler adds or
//! removes servers as pressure moves. A text dashboard follows along.
//!
//! # Usage
//!
//! ```text
//! warpsimd run --config fleet.toml --steps 200 --seed 7
//! warpsimd validate --config fleet.toml
//! warpsimd config > fleet.toml
//! ```

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use warpsim_core::{AdmissionPolicy, FleetConfig};
use warpsim_metrics::{render_prometheus, PressureReading};
use warpsim_state::FleetSnapshot;
use warpsimd::{dashboard, Dashboard, Simulation};

#[derive(Parser)]
#[command(name = "warpsimd", about = "WarpSim daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulation.
    Run {
        /// Fleet config file (TOML). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the number of steps.
        #[arg(long)]
        steps: Option<u64>,

        /// Override the RNG seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Override the saturation policy: queue or reject.
        #[arg(long)]
        policy: Option<AdmissionPolicy>,

        /// Disable the autoscaler.
        #[arg(long)]
        no_autoscale: bool,

        /// Override the pacing between steps, in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Do not render the live dashboard.
        #[arg(long)]
        quiet: bool,

        /// Final report format: text, json or prometheus.
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Validate a fleet config file.
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the default fleet config as TOML.
    Config,
}

#[derive(Serialize)]
struct FinalReport {
    snapshot: FleetSnapshot,
    pressure: PressureReading,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dashboard output owns stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warpsimd=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            steps,
            seed,
            policy,
            no_autoscale,
            interval_ms,
            quiet,
            format,
        } => {
            let mut fleet_config = load_config(config.as_deref())?;
            if let Some(steps) = steps {
                fleet_config.num_steps = steps;
            }
            if seed.is_some() {
                fleet_config.seed = seed;
            }
            if let Some(policy) = policy {
                fleet_config.admission_policy = policy;
            }
            if no_autoscale {
                fleet_config.autoscale = false;
            }
            if let Some(interval_ms) = interval_ms {
                fleet_config.refresh_interval_ms = interval_ms;
            }
            run_simulation(fleet_config, !quiet, &format).await
        }
        Command::Validate { config } => {
            let fleet_config = FleetConfig::from_file(&config)?;
            fleet_config.validate()?;
            println!("{}: ok", config.display());
            Ok(())
        }
        Command::Config => {
            print!("{}", FleetConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<FleetConfig> {
    match path {
        Some(path) => {
            let config = FleetConfig::from_file(path)?;
            info!(path = ?path, "fleet config loaded");
            Ok(config)
        }
        None => Ok(FleetConfig::default()),
    }
}

async fn run_simulation(config: FleetConfig, live: bool, format: &str) -> anyhow::Result<()> {
    if !matches!(format, "text" | "json" | "prometheus") {
        anyhow::bail!("unknown format: {format} (expected text, json or prometheus)");
    }

    let mut sim = Simulation::new(config.clone())?;
    info!(
        steps = config.num_steps,
        seed = ?config.seed,
        interval_ms = config.refresh_interval_ms,
        "simulation starting"
    );

    // ── Observer ───────────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let observer = live.then(|| {
        let dashboard = Dashboard::new(sim.fleet().clone(), &config);
        thread::spawn(move || {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            dashboard.run(&mut out, shutdown_rx)
        })
    });

    // ── Driver ─────────────────────────────────────────────────

    let mut interval =
        tokio::time::interval(Duration::from_millis(config.refresh_interval_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for step in 0..config.num_steps {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                info!(step, "shutdown signal received");
                break;
            }
        }
        sim.tick(step)?;
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = observer {
        match handle.join() {
            Ok(Ok(frames)) => info!(frames, "dashboard finished"),
            Ok(Err(e)) => warn!(error = %e, "dashboard write failed"),
            Err(_) => warn!("dashboard thread panicked"),
        }
    }

    // ── Final report ───────────────────────────────────────────

    let report = FinalReport {
        snapshot: sim.snapshot(),
        pressure: sim.pressure(),
    };
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "prometheus" => print!("{}", render_prometheus(&report.snapshot, &report.pressure)),
        _ => print!("{}", dashboard::render(&report.snapshot, &report.pressure, &config)),
    }

    info!("WarpSim simulation finished");
    Ok(())
}
