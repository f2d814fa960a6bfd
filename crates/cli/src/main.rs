mod cli;
mod config;
mod workloads;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use tracing::info;

use framebal::{BalancerMetrics, BalancerRegistry, RegistryConfig};

use crate::cli::{CliArgs, Command, SimulateArgs};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    match args.command {
        Command::Simulate(sim) => simulate(&sim),
        Command::Presets => {
            let toml = RegistryConfig::presets()
                .to_toml()
                .context("failed to serialize presets")?;
            print!("{toml}");
            Ok(())
        }
    }
}

fn simulate(args: &SimulateArgs) -> Result<()> {
    anyhow::ensure!(
        args.fps.is_finite() && args.fps > 0.0,
        "--fps must be a positive number, got {}",
        args.fps
    );

    let config = config::load(args.config.as_deref())?;
    let registry = BalancerRegistry::from_config(&config).context("failed to build balancers")?;
    let admitted = workloads::populate(&registry, args.agents)?;
    info!(agents = args.agents, admitted, frames = args.frames, fps = args.fps, "Starting simulation");

    let dt = 1.0 / args.fps;
    let started = Instant::now();
    let mut deferred_frames = 0u64;
    for frame in 0..args.frames {
        let now = frame as f64 * dt;
        let reports = registry.tick_all(now);
        if reports.iter().any(|(_, r)| r.overflowed()) {
            deferred_frames += 1;
        }
    }
    info!(
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        deferred_frames,
        "Simulation finished"
    );

    let metrics = registry.metrics();
    if args.json {
        let json = serde_json::to_string_pretty(&metrics).context("failed to serialize metrics")?;
        println!("{json}");
    } else {
        log_metrics(&metrics);
    }
    Ok(())
}

fn log_metrics(metrics: &IndexMap<String, BalancerMetrics>) {
    for (name, m) in metrics {
        info!(
            balancer = %name,
            ticks = m.ticks,
            executed = m.items_executed,
            retired = m.retired,
            cancelled = m.cancelled,
            rejected = m.rejected,
            faults = m.faults,
            budget = %format!("{}/{}", m.current_budget, m.base_budget),
            growths = m.budget_growths,
            decays = m.budget_decays,
            live = m.queue_len,
            avg_tick_us = m.avg_tick_duration.as_micros() as u64,
            "Balancer metrics"
        );
    }
}
