use bon::Builder;
use good_lp::{Constraint, Expression, ProblemVariables, Variable, variable, variables};

pub use self::objective::{FAIRNESS_WEIGHT, SCORE_WEIGHT};

mod constraints;
pub mod objective;

/// One pump as the model sees it: plain numbers, detached from the request.
#[derive(Clone, Debug)]
pub struct ModelPump {
    pub power_kw: f64,

    /// Nominal rated volume per interval, the flow-cap coefficient.
    pub nominal_interval_m3: f64,

    /// Linearized outflow volume per interval, evaluated against a fixed
    /// level trajectory.
    pub interval_outflow_m3: Vec<f64>,

    pub initial_on: bool,

    /// Leading intervals frozen to `initial_on` by the inherited lock.
    pub locked_intervals: usize,

    /// Per-interval forced on/off override, `None` when unconstrained.
    pub forced: Vec<Option<bool>>,

    /// Per-interval tie-break bonus (fairness + pumping score), strictly
    /// dominated by any real cost difference.
    pub bonus_eur: Vec<f64>,
}

/// The owned input of one solve: assembling it is infallible and the result
/// can cross a thread boundary.
#[derive(Builder, Clone, Debug)]
pub struct ModelInput {
    pub n_intervals: usize,
    pub dwell_intervals: usize,
    pub interval_hours: f64,
    pub initial_volume_m3: f64,
    pub min_volume_m3: f64,
    pub max_volume_m3: f64,

    /// Volume at the low-level threshold; `None` waives the whole rolling
    /// deadline family for this cycle.
    pub low_volume_m3: Option<f64>,

    pub deadline_window: usize,
    pub max_flow_per_interval_m3: f64,
    pub inflow_m3: Vec<f64>,
    pub price_eur_per_kwh: Vec<f64>,
    pub pumps: Vec<ModelPump>,
}

/// The assembled MILP: decision variables, constraints and objective, ready
/// for the backend.
pub struct PumpModel {
    pub variables: ProblemVariables,

    /// `runs[pump][interval]` — the boolean «pump active» decisions.
    pub runs: Vec<Vec<Variable>>,

    /// `volumes[t]` for every interval boundary `t = 0..=n`.
    pub volumes: Vec<Variable>,

    pub constraints: Vec<Constraint>,
    pub objective: Expression,
}

impl ModelInput {
    pub fn assemble(&self) -> PumpModel {
        let mut builder = variables!();

        let runs: Vec<Vec<Variable>> = self
            .pumps
            .iter()
            .map(|_| (0..self.n_intervals).map(|_| builder.add(variable().binary())).collect())
            .collect();
        let volumes: Vec<Variable> = (0..=self.n_intervals)
            .map(|_| builder.add(variable().min(self.min_volume_m3).max(self.max_volume_m3)))
            .collect();

        let mut constraints = Vec::new();
        constraints::apply_all(self, &mut builder, &runs, &volumes, &mut constraints);
        let objective = objective::build(self, &runs);

        PumpModel { variables: builder, runs, volumes, constraints, objective }
    }
}
