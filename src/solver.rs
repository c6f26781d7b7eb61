use std::{sync::mpsc, thread, time::Duration};

use good_lp::{ResolutionError, Solution, SolverModel, default_solver};

use crate::{
    model::{ModelInput, PumpModel, objective},
    prelude::*,
};

/// A concrete solved assignment, extracted into plain data.
#[derive(Clone, Debug)]
pub struct Assignment {
    /// `active[pump][interval]`.
    pub active: Vec<Vec<bool>>,

    /// Volume at every interval boundary, `0..=n`.
    pub volumes_m3: Vec<f64>,

    /// Objective value including the tie-break bonus.
    pub objective_eur: f64,
}

#[derive(Clone, Debug)]
pub enum SolveOutcome {
    Solved(Assignment),

    /// No assignment satisfies the constraints — a reportable planning
    /// outcome, not an error.
    Infeasible,

    /// The wall-clock budget ran out before the backend finished.
    TimedOut,
}

/// Solve the model, optionally bounded by a wall-clock budget.
///
/// The backend search cannot be interrupted mid-flight, so the budgeted
/// variant runs it on a detached worker thread and simply stops waiting
/// once the budget is spent.
#[instrument(skip_all, fields(n_intervals = input.n_intervals, n_pumps = input.pumps.len()))]
pub fn solve(input: ModelInput, budget: Option<Duration>) -> Result<SolveOutcome> {
    let Some(budget) = budget else {
        return solve_blocking(&input);
    };
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(solve_blocking(&input));
    });
    match receiver.recv_timeout(budget) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!("the solver budget is exhausted");
            Ok(SolveOutcome::TimedOut)
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => bail!("the solver thread panicked"),
    }
}

fn solve_blocking(input: &ModelInput) -> Result<SolveOutcome> {
    let PumpModel { variables, runs, volumes, constraints, objective } = input.assemble();
    debug!(n_constraints = constraints.len(), "assembled");

    let mut problem = variables.minimise(objective).using(default_solver);
    for constraint in constraints {
        problem = problem.with(constraint);
    }
    match problem.solve() {
        Ok(solution) => {
            let active: Vec<Vec<bool>> = runs
                .iter()
                .map(|pump_runs| {
                    pump_runs.iter().map(|&run| solution.value(run) > 0.5).collect()
                })
                .collect();
            let volumes_m3 = volumes.iter().map(|&volume| solution.value(volume)).collect();
            let objective_eur = objective::evaluate(input, &active);
            Ok(SolveOutcome::Solved(Assignment { active, volumes_m3, objective_eur }))
        }
        Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
        Err(error) => Err(Error::from(error).context("the solver backend failed")),
    }
}
