use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable};

use crate::model::ModelInput;

/// Encode every hard constraint family into `out`.
pub fn apply_all(
    input: &ModelInput,
    builder: &mut ProblemVariables,
    runs: &[Vec<Variable>],
    volumes: &[Variable],
    out: &mut Vec<Constraint>,
) {
    apply_initial_volume(input, volumes, out);
    apply_water_balance(input, runs, volumes, out);
    apply_at_least_one_active(input, runs, out);
    apply_flow_cap(input, runs, out);
    apply_overrides_and_locks(input, runs, out);
    apply_minimum_dwell(input, runs, out);
    apply_rolling_deadline(input, builder, volumes, out);
}

fn apply_initial_volume(input: &ModelInput, volumes: &[Variable], out: &mut Vec<Constraint>) {
    out.push(constraint!(volumes[0] == input.initial_volume_m3));
}

/// `volume[t+1] = volume[t] + inflow[t] − Σ_p outflow[p][t] · run[p][t]`,
/// with the per-pump outflow volumes already linearized against a fixed
/// level trajectory — never a free unknown of the same solve.
fn apply_water_balance(
    input: &ModelInput,
    runs: &[Vec<Variable>],
    volumes: &[Variable],
    out: &mut Vec<Constraint>,
) {
    for t in 0..input.n_intervals {
        let mut outflow = Expression::from(0);
        for (pump, pump_runs) in input.pumps.iter().zip(runs) {
            outflow += pump.interval_outflow_m3[t] * pump_runs[t];
        }
        out.push(constraint!(
            volumes[t + 1] == volumes[t] + input.inflow_m3[t] - outflow
        ));
    }
}

fn apply_at_least_one_active(
    input: &ModelInput,
    runs: &[Vec<Variable>],
    out: &mut Vec<Constraint>,
) {
    for t in 0..input.n_intervals {
        let mut active = Expression::from(0);
        for pump_runs in runs {
            active += pump_runs[t];
        }
        out.push(constraint!(active >= 1));
    }
}

/// The cap is written against nominal rated flows to stay linear.
fn apply_flow_cap(input: &ModelInput, runs: &[Vec<Variable>], out: &mut Vec<Constraint>) {
    for t in 0..input.n_intervals {
        let mut nominal_flow = Expression::from(0);
        for (pump, pump_runs) in input.pumps.iter().zip(runs) {
            nominal_flow += pump.nominal_interval_m3 * pump_runs[t];
        }
        out.push(constraint!(nominal_flow <= input.max_flow_per_interval_m3));
    }
}

/// Forced overrides and the inherited lock both pin decision variables to
/// constants. They are added independently: a conflict between them is a
/// genuine infeasibility, not something to resolve silently.
fn apply_overrides_and_locks(
    input: &ModelInput,
    runs: &[Vec<Variable>],
    out: &mut Vec<Constraint>,
) {
    for (pump, pump_runs) in input.pumps.iter().zip(runs) {
        let locked_state = f64::from(pump.initial_on);
        for t in 0..pump.locked_intervals.min(input.n_intervals) {
            out.push(constraint!(pump_runs[t] == locked_state));
        }
        for (t, forced) in pump.forced.iter().enumerate().take(input.n_intervals) {
            if let Some(forced) = forced {
                out.push(constraint!(pump_runs[t] == f64::from(*forced)));
            }
        }
    }
}

/// Once a pump switches between `t−1` and `t`, the new state must hold for
/// the following `dwell−1` intervals (truncated at the horizon). The edge
/// at `t = 0` is taken against the incoming pump state.
fn apply_minimum_dwell(input: &ModelInput, runs: &[Vec<Variable>], out: &mut Vec<Constraint>) {
    let n = input.n_intervals;
    for (pump, pump_runs) in input.pumps.iter().zip(runs) {
        for dt in 1..input.dwell_intervals.min(n) {
            if pump.initial_on {
                // A switch-off at 0 must stick:
                out.push(constraint!(pump_runs[dt] <= pump_runs[0]));
            } else {
                // A switch-on at 0 must stick:
                out.push(constraint!(pump_runs[dt] >= pump_runs[0]));
            }
        }
        for t in 1..n {
            for dt in 1..input.dwell_intervals.min(n - t) {
                // Switched on at t ⟹ still on at t + dt:
                out.push(constraint!(
                    pump_runs[t] - pump_runs[t - 1] <= pump_runs[t + dt]
                ));
                // Switched off at t ⟹ still off at t + dt:
                out.push(constraint!(
                    pump_runs[t - 1] - pump_runs[t] + pump_runs[t + dt] <= 1
                ));
            }
        }
    }
}

/// The rolling must-nearly-empty rule: a binary «below threshold» indicator
/// per interval boundary, linked to the volume by big-M, and one covering
/// constraint per sliding window of `deadline_window` boundaries.
fn apply_rolling_deadline(
    input: &ModelInput,
    builder: &mut ProblemVariables,
    volumes: &[Variable],
    out: &mut Vec<Constraint>,
) {
    let Some(low_volume) = input.low_volume_m3 else {
        return; // Waived for this cycle.
    };
    let n = input.n_intervals;
    let window = input.deadline_window;
    if n < window {
        return; // The horizon ends before the first deadline.
    }

    // below[t - 1] corresponds to boundary t ∈ 1..=n. Setting the
    // indicator forces the volume below the threshold; the solver only
    // raises it where a window needs covering.
    let big_m = input.max_volume_m3 - low_volume;
    let below: Vec<Variable> = (1..=n)
        .map(|t| {
            let indicator = builder.add(variable().binary());
            out.push(constraint!(volumes[t] + big_m * indicator <= low_volume + big_m));
            indicator
        })
        .collect();

    for start in 0..=(n - window) {
        let mut covered = Expression::from(0);
        for indicator in &below[start..start + window] {
            covered += *indicator;
        }
        out.push(constraint!(covered >= 1));
    }
}
