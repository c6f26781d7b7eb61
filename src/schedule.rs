use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    pump::{PlanningState, PumpId},
    request::OptimizationRequest,
    solver::Assignment,
    units::{CubicMetres, Euro, EuroPerKilowattHour, Kilowatts, Metres},
};

/// Tolerance for cross-checking the exporter's volume walk against the
/// solver's trajectory.
const CONSISTENCY_TOLERANCE_M3: f64 = 0.5;

/// The constraint family suspected of causing an infeasibility.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintFamily {
    ForcedOverrides,
    MinimumDwell,
    EmptyTankDeadline,
}

/// One planned interval. Field names and units are a stable contract:
/// dashboards and persistence downstream parse them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub interval: usize,
    pub start_time: NaiveDateTime,
    pub active_pumps: Vec<PumpId>,
    pub water_level_start_m: Metres,
    pub water_level_end_m: Metres,
    pub volume_start_m3: CubicMetres,
    pub volume_end_m3: CubicMetres,
    pub inflow_m3: CubicMetres,
    pub outflow_m3: CubicMetres,
    pub electricity_price_eur_per_kwh: EuroPerKilowattHour,
    pub interval_cost_eur: Euro,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub total_cost_eur: Euro,
    pub initial_water_level_m: Metres,
    pub initial_volume_m3: CubicMetres,
    pub schedule: Vec<ScheduleEntry>,

    /// The next cycle's [`PlanningState`]: locks decremented, usage
    /// incremented, states flipped where the plan switches.
    pub pumps: PlanningState,
}

/// What one planning cycle produced. Infeasibility is a first-class
/// outcome, distinct from a crash.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PlanOutcome {
    /// Proven cost-optimal schedule.
    Optimal(OptimizationResult),

    /// Feasible schedule that is not proven optimal: the budget ran out
    /// mid-refinement and an earlier incumbent was kept.
    BestEffort(OptimizationResult),

    /// No assignment satisfies the constraints (or the budget ran out
    /// before any was found).
    Infeasible {
        #[serde(skip_serializing_if = "Option::is_none")]
        suspected: Option<ConstraintFamily>,
    },
}

impl PlanOutcome {
    pub const fn result(&self) -> Option<&OptimizationResult> {
        match self {
            Self::Optimal(result) | Self::BestEffort(result) => Some(result),
            Self::Infeasible { .. } => None,
        }
    }

    pub const fn is_infeasible(&self) -> bool {
        matches!(self, Self::Infeasible { .. })
    }
}

/// Walk the solved assignment in interval order, recomputing the level and
/// volume trajectory through the geometry model and the balance equation.
/// The walk must reproduce the solver's own trajectory — a mismatch means
/// the model and the exporter disagree, which is fatal.
pub fn export(
    request: &OptimizationRequest,
    assignment: &Assignment,
    outflows_m3: &[Vec<f64>],
    proven_optimal: bool,
) -> Result<PlanOutcome> {
    let n = request.horizon();
    let interval_minutes = request.interval_minutes;
    let dwell_minutes = u32::try_from(request.dwell_intervals)? * interval_minutes;
    let initial_volume = request.tank.volume_from_height(request.initial_level_m)?;
    let max_volume = request.tank.volume_from_height(request.max_level_m)?;

    let mut pumps = request.pumps.clone();
    let mut previous_state: Vec<bool> = pumps.0.iter().map(|pump| pump.is_on).collect();
    let mut entries = Vec::with_capacity(n);
    let mut total_cost = Euro::ZERO;
    let mut volume = initial_volume;

    for (t, forecast) in request.intervals.iter().take(n).enumerate() {
        let mut outflow = CubicMetres::ZERO;
        let mut power = Kilowatts::ZERO;
        let mut active_pumps = Vec::new();

        for (p, pump) in pumps.0.iter_mut().enumerate() {
            let is_active = assignment.active[p][t];
            if is_active != previous_state[p] {
                // An edge re-arms the lock for the full dwell:
                pump.lock_minutes_remaining = dwell_minutes;
            }
            pump.lock_minutes_remaining =
                pump.lock_minutes_remaining.saturating_sub(interval_minutes);
            if is_active {
                outflow += CubicMetres(outflows_m3[p][t]);
                power += pump.category.power();
                pump.usage_minutes += u64::from(interval_minutes);
                active_pumps.push(pump.id.clone());
            }
            previous_state[p] = is_active;
        }

        let next_volume = volume + forecast.inflow_m3 - outflow;
        let solver_volume = CubicMetres(assignment.volumes_m3[t + 1]);
        ensure!(
            (next_volume - solver_volume).0.abs() <= CONSISTENCY_TOLERANCE_M3,
            "volume mismatch at interval {t}: recomputed {next_volume} m³, solved {solver_volume} m³",
        );
        // Absorb backend round-off so the level conversion stays in range:
        let next_volume = next_volume.clamp(CubicMetres::ZERO, max_volume);

        let interval_cost = power * request.interval_hours() * forecast.price_eur_per_kwh;
        total_cost += interval_cost;

        entries.push(ScheduleEntry {
            interval: t,
            start_time: forecast.start_time,
            active_pumps,
            water_level_start_m: request.tank.height_from_volume(volume)?,
            water_level_end_m: request.tank.height_from_volume(next_volume)?,
            volume_start_m3: volume,
            volume_end_m3: next_volume,
            inflow_m3: forecast.inflow_m3,
            outflow_m3: outflow,
            electricity_price_eur_per_kwh: forecast.price_eur_per_kwh,
            interval_cost_eur: interval_cost,
        });
        volume = next_volume;
    }

    for (pump, state) in pumps.0.iter_mut().zip(previous_state) {
        pump.is_on = state;
    }

    let result = OptimizationResult {
        total_cost_eur: total_cost,
        initial_water_level_m: request.initial_level_m,
        initial_volume_m3: initial_volume,
        schedule: entries,
        pumps,
    };
    Ok(if proven_optimal {
        PlanOutcome::Optimal(result)
    } else {
        PlanOutcome::BestEffort(result)
    })
}
