use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Frame-budgeted scheduler simulator.
///
/// Drives the balancer registry with synthetic agent workloads at a fixed
/// frame rate and reports per-balancer metrics.
#[derive(Parser, Debug)]
#[command(name = "framebal", about = "Frame-budgeted scheduler simulator")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run synthetic workloads through the balancers
    Simulate(SimulateArgs),
    /// Print the preset balancer configuration as TOML
    Presets,
}

#[derive(clap::Args, Debug)]
pub struct SimulateArgs {
    /// Balancer config file (TOML). Uses the presets if not set.
    #[arg(long, env = "FRAMEBAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of frames to simulate
    #[arg(long, default_value = "600")]
    pub frames: u64,

    /// Simulated frames per second
    #[arg(long, default_value = "60")]
    pub fps: f64,

    /// Number of simulated agents
    #[arg(long, default_value = "50")]
    pub agents: usize,

    /// Print metrics as JSON instead of a log table
    #[arg(long)]
    pub json: bool,
}
