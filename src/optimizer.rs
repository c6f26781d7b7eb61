use std::time::{Duration, Instant};

use crate::{
    model::{FAIRNESS_WEIGHT, ModelInput, ModelPump, SCORE_WEIGHT},
    prelude::*,
    request::OptimizationRequest,
    schedule::{self, ConstraintFamily, PlanOutcome},
    solver::{self, Assignment, SolveOutcome},
    units::{CubicMetres, EuroPerKilowattHour, Metres},
};

/// Linearization passes: the first evaluates pump flows at the initial
/// level, every further pass re-evaluates them against the previous pass's
/// start-of-interval levels.
pub const DEFAULT_PASSES: usize = 2;

/// Lower bound on the price entering the pumping score. Keeps the weighted
/// bonus strictly below any real per-interval energy cost difference, even
/// on free-electricity intervals.
const SCORE_PRICE_FLOOR: f64 = 1e-3;

/// Plan one cycle: a pure function of the request, holding no state across
/// calls. Independent requests may run in parallel.
#[instrument(name = "Planning…", skip_all, fields(horizon = request.horizon()))]
pub fn plan(
    request: &OptimizationRequest,
    budget: Option<Duration>,
    passes: usize,
) -> Result<PlanOutcome> {
    request.validate()?;
    let started = Instant::now();
    let deadline_active = request.deadline_active();
    if deadline_active {
        info!("the must-nearly-empty rule applies this cycle");
    }

    let mut levels = vec![request.initial_level_m; request.horizon()];
    let mut incumbent: Option<(Assignment, Vec<Vec<f64>>)> = None;
    let mut proven_optimal = false;

    for pass in 0..passes.max(1) {
        let remaining = budget.map(|budget| budget.saturating_sub(started.elapsed()));
        if remaining.is_some_and(|remaining| remaining.is_zero()) {
            if incumbent.is_none() {
                // A timeout without any incumbent is reported the same way
                // as infeasibility:
                return Ok(PlanOutcome::Infeasible { suspected: None });
            }
            proven_optimal = false;
            break;
        }

        let outflows = linearized_outflows(request, &levels);
        let input = build_model_input(request, &outflows, deadline_active)?;
        match solver::solve(input, remaining)? {
            SolveOutcome::Solved(assignment) => {
                debug!(pass, objective_eur = assignment.objective_eur, "solved");
                levels = start_levels(request, &assignment)?;
                incumbent = Some((assignment, outflows));
                proven_optimal = true;
            }
            SolveOutcome::Infeasible => {
                if incumbent.is_none() {
                    return Ok(PlanOutcome::Infeasible {
                        suspected: diagnose(request, deadline_active),
                    });
                }
                warn!(pass, "infeasible refinement pass, keeping the previous plan");
                proven_optimal = false;
                break;
            }
            SolveOutcome::TimedOut => {
                if incumbent.is_none() {
                    return Ok(PlanOutcome::Infeasible { suspected: None });
                }
                warn!(pass, "refinement ran out of budget, keeping the previous plan");
                proven_optimal = false;
                break;
            }
        }
    }

    let (assignment, outflows) =
        incumbent.context("no linearization pass produced an assignment")?;
    schedule::export(request, &assignment, &outflows, proven_optimal)
}

/// Per-pump, per-interval outflow volumes evaluated against a fixed level
/// trajectory — the sequential linearization that breaks the level↔flow
/// circular dependency.
fn linearized_outflows(request: &OptimizationRequest, levels: &[Metres]) -> Vec<Vec<f64>> {
    request
        .pumps
        .0
        .iter()
        .map(|pump| {
            levels
                .iter()
                .map(|&level| {
                    (pump.category.flow_at_level(level) * request.interval_hours()).0
                })
                .collect()
        })
        .collect()
}

fn start_levels(request: &OptimizationRequest, assignment: &Assignment) -> Result<Vec<Metres>> {
    let capacity = request.tank.capacity();
    (0..request.horizon())
        .map(|t| {
            let volume =
                CubicMetres(assignment.volumes_m3[t]).clamp(CubicMetres::ZERO, capacity);
            request.tank.height_from_volume(volume)
        })
        .collect()
}

fn build_model_input(
    request: &OptimizationRequest,
    outflows_m3: &[Vec<f64>],
    deadline_active: bool,
) -> Result<ModelInput> {
    let n = request.horizon();
    let interval_hours = request.interval_hours();
    let low_volume_m3 = if deadline_active {
        Some(request.tank.volume_from_height(request.low_level_threshold_m)?.0)
    } else {
        None
    };

    let pumps = request
        .pumps
        .0
        .iter()
        .zip(outflows_m3)
        .map(|(pump, pump_outflows)| {
            let usage_gap =
                request.pumps.max_usage_minutes(pump.category) - pump.usage_minutes;
            #[expect(clippy::cast_precision_loss)]
            let fairness_eur = FAIRNESS_WEIGHT * usage_gap as f64;
            let bonus_eur = request
                .intervals
                .iter()
                .take(n)
                .map(|interval| {
                    let price = EuroPerKilowattHour(
                        interval.price_eur_per_kwh.0.max(SCORE_PRICE_FLOOR),
                    );
                    let score = pump.category.pumping_score(request.initial_level_m, price);
                    fairness_eur + SCORE_WEIGHT * score
                })
                .collect();
            let forced = request
                .intervals
                .iter()
                .take(n)
                .map(|interval| interval.forced.get(&pump.id).copied())
                .collect();
            ModelPump {
                power_kw: pump.category.power().0,
                nominal_interval_m3: (pump.category.nominal_flow() * interval_hours).0,
                interval_outflow_m3: pump_outflows.clone(),
                initial_on: pump.is_on,
                locked_intervals: pump.locked_intervals(request.interval_minutes),
                forced,
                bonus_eur,
            }
        })
        .collect();

    Ok(ModelInput::builder()
        .n_intervals(n)
        .dwell_intervals(request.dwell_intervals)
        .interval_hours(interval_hours.0)
        .initial_volume_m3(request.tank.volume_from_height(request.initial_level_m)?.0)
        .min_volume_m3(request.tank.volume_from_height(Metres::ZERO)?.0)
        .max_volume_m3(request.tank.volume_from_height(request.max_level_m)?.0)
        .maybe_low_volume_m3(low_volume_m3)
        .deadline_window(request.deadline_window_intervals)
        .max_flow_per_interval_m3(request.max_flow_per_interval_m3.0)
        .inflow_m3(request.intervals.iter().take(n).map(|interval| interval.inflow_m3.0).collect())
        .price_eur_per_kwh(
            request.intervals.iter().take(n).map(|interval| interval.price_eur_per_kwh.0).collect(),
        )
        .pumps(pumps)
        .build())
}

/// Cheap arithmetic checks that point at the constraint family most likely
/// behind an infeasibility. Heuristic by design: the solver has already
/// proven infeasibility, this only annotates it.
fn diagnose(request: &OptimizationRequest, deadline_active: bool) -> Option<ConstraintFamily> {
    let n = request.horizon();

    // Every pump forced off leaves nothing to satisfy at-least-one-active:
    for interval in request.intervals.iter().take(n) {
        if request.pumps.0.iter().all(|pump| interval.forced.get(&pump.id) == Some(&false)) {
            return Some(ConstraintFamily::ForcedOverrides);
        }
    }

    // An override contradicting an inherited lock:
    for pump in &request.pumps.0 {
        let locked = pump.locked_intervals(request.interval_minutes).min(n);
        for interval in request.intervals.iter().take(locked) {
            if interval.forced.get(&pump.id).is_some_and(|&forced| forced != pump.is_on) {
                return Some(ConstraintFamily::ForcedOverrides);
            }
        }
    }

    // Overrides demanding a flip faster than the dwell allows:
    for pump in &request.pumps.0 {
        let mut last: Option<(usize, bool)> = None;
        for (t, interval) in request.intervals.iter().take(n).enumerate() {
            if let Some(&forced) = interval.forced.get(&pump.id) {
                if let Some((last_t, last_forced)) = last
                    && forced != last_forced
                    && t - last_t < request.dwell_intervals
                {
                    return Some(ConstraintFamily::MinimumDwell);
                }
                last = Some((t, forced));
            }
        }
    }

    // A first deadline no legal outflow can make:
    if deadline_active && n >= request.deadline_window_intervals {
        let window = request.deadline_window_intervals;
        let initial = request.tank.volume_from_height(request.initial_level_m).ok()?;
        let low = request.tank.volume_from_height(request.low_level_threshold_m).ok()?;
        let window_inflow: CubicMetres =
            request.intervals.iter().take(window).map(|interval| interval.inflow_m3).sum();
        #[expect(clippy::cast_precision_loss)]
        let max_outflow = request.max_flow_per_interval_m3 * window as f64;
        if initial + window_inflow - max_outflow > low {
            return Some(ConstraintFamily::EmptyTankDeadline);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        forecast::IntervalForecast,
        pump::{PlanningState, PumpCategory, PumpState},
        tunnel::TunnelGeometry,
    };

    /// A small planning problem: short horizon, few pumps, so the backend
    /// solves it in milliseconds while the property under test survives.
    fn test_request(pumps: Vec<PumpState>, n_intervals: usize) -> OptimizationRequest {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        OptimizationRequest {
            tank: TunnelGeometry::default(),
            max_level_m: Metres(8.0),
            low_level_threshold_m: Metres(0.5),
            interval_minutes: 15,
            dwell_intervals: 4,
            max_flow_per_interval_m3: CubicMetres(4000.0),
            empty_tank_threshold_m3: CubicMetres(144_000.0),
            deadline_window_intervals: 96,
            horizon_intervals: None,
            initial_level_m: Metres(3.0),
            pumps: PlanningState(pumps),
            intervals: (0..n_intervals)
                .map(|index| {
                    IntervalForecast::new(
                        start + chrono::TimeDelta::minutes(15 * index as i64),
                        CubicMetres(40.0),
                        EuroPerKilowattHour(0.10),
                    )
                })
                .collect(),
        }
    }

    fn small_and_big() -> Vec<PumpState> {
        vec![
            PumpState::new("1.1".into(), PumpCategory::Small),
            PumpState::new("1.2".into(), PumpCategory::Big),
        ]
    }

    /// Scenario A: flat inflow and price, deadline waived — a stable
    /// schedule tracking the inflow with the cheapest pump, no churn.
    #[test]
    fn test_flat_forecast_runs_the_cheap_pump() -> Result {
        let mut request = test_request(small_and_big(), 12);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO; // waives the rule
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;

        for entry in &result.schedule {
            // At least one pump per interval, and the small one is enough:
            assert_eq!(entry.active_pumps, vec!["1.1".into()]);
            // Levels stay within bounds:
            assert!(entry.water_level_end_m >= Metres::ZERO);
            assert!(entry.water_level_end_m <= request.max_level_m);
        }
        let recomputed: f64 =
            result.schedule.iter().map(|entry| entry.interval_cost_eur.0).sum();
        approx::assert_abs_diff_eq!(result.total_cost_eur.0, recomputed, epsilon = 1e-9);
        Ok(())
    }

    /// Scenario B: the deadline is active — a draw-down phase where the
    /// outflow beats the inflow until the level dips below the threshold
    /// inside the first window.
    #[test]
    fn test_deadline_forces_draw_down() -> Result {
        let mut request = test_request(
            vec![
                PumpState::new("1.2".into(), PumpCategory::Big),
                PumpState::new("1.3".into(), PumpCategory::Big),
            ],
            8,
        );
        request.initial_level_m = Metres(1.0);
        request.deadline_window_intervals = 6;
        request.dwell_intervals = 2;
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;

        let reached = result.schedule[..6]
            .iter()
            .position(|entry| entry.water_level_end_m <= Metres(0.501));
        let reached = reached.context("the level never dipped below the threshold")?;
        // Until the dip, the tank is drained faster than it fills:
        for entry in &result.schedule[..=reached] {
            assert!(entry.outflow_m3 > entry.inflow_m3);
        }
        Ok(())
    }

    /// A single free-electricity interval must not pull in extra pumps: the
    /// dwell would drag them into the expensive intervals that follow, and
    /// the score bonus is too small to outweigh that.
    #[test]
    fn test_free_interval_does_not_drag_extra_pumps() -> Result {
        let mut request = test_request(small_and_big(), 6);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        request.intervals[0].price_eur_per_kwh = EuroPerKilowattHour::ZERO;
        for interval in &mut request.intervals[1..] {
            interval.price_eur_per_kwh = EuroPerKilowattHour(5.0);
        }
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;
        for entry in &result.schedule[1..] {
            assert!(
                !entry.active_pumps.contains(&"1.2".into()),
                "the big pump was dragged into an expensive interval",
            );
        }
        Ok(())
    }

    /// The must-nearly-empty rule rolls: after the first dip, the level has
    /// to come back down within every further window of the horizon.
    #[test]
    fn test_deadline_repeats_across_windows() -> Result {
        let mut request = test_request(
            vec![
                PumpState::new("1.2".into(), PumpCategory::Big),
                PumpState::new("1.3".into(), PumpCategory::Big),
            ],
            12,
        );
        request.initial_level_m = Metres(0.7);
        request.deadline_window_intervals = 6;
        request.dwell_intervals = 2;
        for interval in &mut request.intervals {
            interval.inflow_m3 = CubicMetres(900.0);
        }
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;

        let dips: Vec<bool> = result
            .schedule
            .iter()
            .map(|entry| entry.water_level_end_m <= Metres(0.501))
            .collect();
        assert!(
            dips.iter().filter(|&&dip| dip).count() >= 2,
            "expected dips in both windows: {dips:?}",
        );
        // Every consecutive window of the horizon contains a dip:
        for window in dips.windows(request.deadline_window_intervals) {
            assert!(window.contains(&true), "a window passed without a dip: {dips:?}");
        }
        Ok(())
    }

    /// Scenario C: a pump locked on for 90 minutes stays on through the
    /// first six intervals regardless of price.
    #[test]
    fn test_inherited_lock_is_honoured() -> Result {
        let mut pumps = small_and_big();
        pumps[0].is_on = true;
        pumps[0].lock_minutes_remaining = 90;
        let mut request = test_request(pumps, 8);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        // Make running anything as unattractive as possible:
        for interval in &mut request.intervals {
            interval.price_eur_per_kwh = EuroPerKilowattHour(5.0);
        }
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;
        for entry in &result.schedule[..6] {
            assert!(entry.active_pumps.contains(&"1.1".into()));
        }
        Ok(())
    }

    /// Scenario D: symmetric prices over several cycles — cumulative usage
    /// between redundant pumps converges toward equality.
    #[test]
    fn test_usage_converges_across_cycles() -> Result {
        let mut pumps = vec![
            PumpState::new("1.1".into(), PumpCategory::Small),
            PumpState::new("2.1".into(), PumpCategory::Small),
        ];
        pumps[0].usage_minutes = 300;
        let mut request = test_request(pumps, 8);
        request.dwell_intervals = 8;
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;

        let mut first_cycle_pump = None;
        for _ in 0..4 {
            let outcome = plan(&request, None, 1)?;
            let result = outcome.result().context("expected a schedule")?;
            first_cycle_pump
                .get_or_insert_with(|| result.schedule[0].active_pumps.clone());
            request.pumps = result.pumps.clone();
        }

        // The first cycle picks the fresh pump:
        assert_eq!(first_cycle_pump, Some(vec!["2.1".into()]));
        // Four cycles later the gap is under one cycle's worth of runtime:
        let gap = request.pumps.0[0].usage_minutes.abs_diff(request.pumps.0[1].usage_minutes);
        assert!(gap <= 120, "usage gap {gap} min did not converge");
        Ok(())
    }

    /// Forced per-interval overrides are honoured exactly.
    #[test]
    fn test_forced_override_is_honoured() -> Result {
        let mut request = test_request(small_and_big(), 8);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        request.dwell_intervals = 2;
        for interval in &mut request.intervals[2..6] {
            interval.forced.insert("1.2".into(), true);
        }
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;
        for entry in &result.schedule[2..6] {
            assert!(entry.active_pumps.contains(&"1.2".into()));
        }
        Ok(())
    }

    /// The summed nominal flow of active pumps never exceeds the cap.
    #[test]
    fn test_flow_cap_is_respected() -> Result {
        let mut request = test_request(
            vec![
                PumpState::new("1.2".into(), PumpCategory::Big),
                PumpState::new("1.3".into(), PumpCategory::Big),
            ],
            8,
        );
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        // Two big pumps at 750 m³ nominal each per interval do not fit:
        request.max_flow_per_interval_m3 = CubicMetres(800.0);
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;
        for entry in &result.schedule {
            assert!(entry.active_pumps.len() <= 1);
        }
        Ok(())
    }

    /// The dwell invariant holds on the exported schedule: once a pump
    /// switches, it holds the new state for the configured stretch.
    #[test]
    fn test_dwell_invariant_on_schedule() -> Result {
        let mut request = test_request(small_and_big(), 16);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        let result = outcome.result().context("expected a schedule")?;

        for pump in &request.pumps.0 {
            let states: Vec<bool> = result
                .schedule
                .iter()
                .map(|entry| entry.active_pumps.contains(&pump.id))
                .collect();
            let mut last_edge = None;
            for t in 1..states.len() {
                if states[t] != states[t - 1] {
                    if let Some(last_edge) = last_edge {
                        assert!(
                            t - last_edge >= request.dwell_intervals,
                            "pump {} flipped after {} intervals",
                            pump.id,
                            t - last_edge,
                        );
                    }
                    last_edge = Some(t);
                }
            }
        }
        Ok(())
    }

    /// An override that contradicts a lock makes the cycle infeasible, and
    /// the overrides family is pointed at.
    #[test]
    fn test_conflicting_override_is_infeasible() -> Result {
        let mut pumps = small_and_big();
        pumps[0].is_on = true;
        pumps[0].lock_minutes_remaining = 90;
        let mut request = test_request(pumps, 8);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        request.intervals[1].forced.insert("1.1".into(), false);

        let outcome = plan(&request, None, DEFAULT_PASSES)?;
        assert_eq!(
            outcome,
            PlanOutcome::Infeasible {
                suspected: Some(ConstraintFamily::ForcedOverrides),
            },
        );
        Ok(())
    }

    /// A spent budget with no incumbent reports like infeasibility.
    #[test]
    fn test_zero_budget_without_incumbent() -> Result {
        let mut request = test_request(small_and_big(), 8);
        request.empty_tank_threshold_m3 = CubicMetres::ZERO;
        let outcome = plan(&request, Some(Duration::ZERO), DEFAULT_PASSES)?;
        assert!(outcome.is_infeasible());
        Ok(())
    }
}
