use good_lp::{Expression, Variable};

use crate::model::ModelInput;

/// Euro per minute of in-category usage gap, per active interval. Small
/// enough that the summed fairness bonus can never outweigh a real cost
/// difference — it only breaks ties between otherwise equal plans.
pub const FAIRNESS_WEIGHT: f64 = 1e-9;

/// Euro per pumping-score unit, per active interval. One order below the
/// fairness term: the score ranks categories only after wear levelling.
pub const SCORE_WEIGHT: f64 = 1e-11;

/// Minimize electricity cost, tie-broken by the dominated per-pump bonus:
/// `Σ_t Σ_p run[p][t] · (price[t] · power[p] · Δt − bonus[p][t])`.
pub fn build(input: &ModelInput, runs: &[Vec<Variable>]) -> Expression {
    let mut objective = Expression::from(0);
    for (pump, pump_runs) in input.pumps.iter().zip(runs) {
        for (t, run) in pump_runs.iter().enumerate().take(input.n_intervals) {
            let cost =
                input.price_eur_per_kwh[t] * pump.power_kw * input.interval_hours;
            objective += (cost - pump.bonus_eur[t]) * *run;
        }
    }
    objective
}

/// The objective value of a concrete assignment, recomputed from the model
/// input. Used instead of querying the backend so the figure is independent
/// of solver tolerances.
pub fn evaluate(input: &ModelInput, active: &[Vec<bool>]) -> f64 {
    let mut total = 0.0;
    for (pump, pump_active) in input.pumps.iter().zip(active) {
        for (t, &is_active) in pump_active.iter().enumerate().take(input.n_intervals) {
            if is_active {
                total += input.price_eur_per_kwh[t] * pump.power_kw * input.interval_hours
                    - pump.bonus_eur[t];
            }
        }
    }
    total
}
