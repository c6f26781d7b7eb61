use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::units::Metres;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: read a planning request, optimize the pump schedule,
    /// and write the outcome.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),

    /// Development tool: evaluate the tank geometry at a given level.
    #[clap(name = "tank")]
    Tank(TankArgs),
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Planning request in JSON, `-` for standard input.
    #[clap(default_value = "-")]
    pub request_path: PathBuf,

    /// Write the outcome as JSON here instead of standard output.
    #[clap(long = "output", env = "AHTI_OUTPUT")]
    pub output_path: Option<PathBuf>,

    /// Wall-clock solver budget in seconds, unbounded when omitted.
    #[clap(long = "budget-secs", env = "AHTI_BUDGET_SECS")]
    pub budget_secs: Option<u64>,

    /// Linearization passes over the level trajectory.
    #[clap(long, default_value = "2", env = "AHTI_PASSES")]
    pub passes: usize,

    /// Skip rendering the schedule tables.
    #[clap(long)]
    pub no_tables: bool,
}

#[derive(Parser)]
pub struct TankArgs {
    /// Tunnel radius in metres.
    #[clap(long = "radius-metres", default_value = "7.05", env = "TANK_RADIUS_METRES")]
    pub radius: Metres,

    /// Tunnel length in metres.
    #[clap(long = "length-metres", default_value = "1446.0", env = "TANK_LENGTH_METRES")]
    pub length: Metres,

    /// Water level in metres.
    pub level: Metres,
}
