mod cli;
mod forecast;
mod model;
mod optimizer;
mod prelude;
mod pump;
mod request;
mod schedule;
mod solver;
mod tables;
mod tunnel;
mod units;

use std::{
    fs,
    io::Read as _,
    path::Path,
    time::Duration,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Args, Command, PlanArgs, TankArgs},
    prelude::*,
    request::OptimizationRequest,
    tunnel::TunnelGeometry,
};

fn main() -> Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Plan(args) => run_plan(&args),
        Command::Tank(args) => run_tank(&args),
    }
}

fn run_plan(args: &PlanArgs) -> Result {
    let request = read_request(&args.request_path)?;
    let budget = args.budget_secs.map(Duration::from_secs);
    let outcome = optimizer::plan(&request, budget, args.passes)?;

    if let Some(result) = outcome.result() {
        let final_level =
            result.schedule.last().map_or(result.initial_water_level_m, |entry| {
                entry.water_level_end_m
            });
        info!(
            total_cost_eur = result.total_cost_eur.0,
            initial_level_m = result.initial_water_level_m.0,
            final_level_m = final_level.0,
            "planned",
        );
        if !args.no_tables {
            let horizon_minutes =
                u64::try_from(result.schedule.len())? * u64::from(request.interval_minutes);
            eprintln!(
                "{}",
                tables::build_schedule_table(
                    result,
                    request.low_level_threshold_m,
                    request.max_level_m,
                ),
            );
            eprintln!(
                "{}",
                tables::build_pumps_table(&request.pumps, &result.pumps, horizon_minutes),
            );
        }
    } else {
        warn!("no feasible schedule for this request");
    }

    let rendered = serde_json::to_string_pretty(&outcome)?;
    match &args.output_path {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write the outcome to `{}`", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn run_tank(args: &TankArgs) -> Result {
    let tank = TunnelGeometry { radius: args.radius, length: args.length };
    let volume = tank.volume_from_height(args.level)?;
    let level = tank.height_from_volume(volume)?;
    info!(
        crown_m = tank.crown().0,
        capacity_m3 = tank.capacity().0,
        volume_m3 = volume.0,
        round_trip_level_m = level.0,
        "gauged",
    );
    Ok(())
}

fn read_request(path: &Path) -> Result<OptimizationRequest> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("failed to read standard input")?;
        buffer
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read the request from `{}`", path.display()))?
    };
    serde_json::from_str(&raw).context("failed to parse the planning request")
}
