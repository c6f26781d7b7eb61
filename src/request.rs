use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    forecast::IntervalForecast,
    prelude::*,
    pump::PlanningState,
    tunnel::TunnelGeometry,
    units::{CubicMetres, Hours, Metres},
};

/// Everything one planning cycle needs: tank, station state and forecasts.
///
/// Constructed fresh each cycle by the external caller; the engine never
/// holds state across calls. All parameter defaults are the original
/// station constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    #[serde(default)]
    pub tank: TunnelGeometry,

    /// Highest admissible water level.
    #[serde(default = "OptimizationRequest::default_max_level")]
    pub max_level_m: Metres,

    /// The «nearly empty» level the rolling deadline targets.
    #[serde(default = "OptimizationRequest::default_low_level_threshold")]
    pub low_level_threshold_m: Metres,

    /// Planning resolution.
    #[serde(default = "OptimizationRequest::default_interval_minutes")]
    pub interval_minutes: u32,

    /// Minimum dwell after a switch, in intervals (2 h at 15-minute
    /// resolution).
    #[serde(default = "OptimizationRequest::default_dwell_intervals")]
    pub dwell_intervals: usize,

    /// System-wide cap on the summed nominal flow per interval.
    #[serde(default = "OptimizationRequest::default_max_flow_per_interval")]
    pub max_flow_per_interval_m3: CubicMetres,

    /// 24-hour forecast inflow above which the must-nearly-empty rule is
    /// waived for the cycle.
    #[serde(default = "OptimizationRequest::default_empty_tank_threshold")]
    pub empty_tank_threshold_m3: CubicMetres,

    /// Longest allowed stretch, in intervals, between two nearly-empty
    /// events.
    #[serde(default = "OptimizationRequest::default_deadline_window")]
    pub deadline_window_intervals: usize,

    /// Number of leading forecast intervals to plan. Defaults to the whole
    /// forecast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_intervals: Option<usize>,

    /// Water level at the start of the horizon.
    pub initial_level_m: Metres,

    /// Station state persisted from the previous cycle.
    pub pumps: PlanningState,

    /// Ordered forecast, one entry per interval.
    pub intervals: Vec<IntervalForecast>,
}

impl OptimizationRequest {
    fn default_max_level() -> Metres {
        Metres(8.0)
    }

    fn default_low_level_threshold() -> Metres {
        Metres(0.5)
    }

    const fn default_interval_minutes() -> u32 {
        15
    }

    const fn default_dwell_intervals() -> usize {
        8
    }

    fn default_max_flow_per_interval() -> CubicMetres {
        CubicMetres(4000.0)
    }

    fn default_empty_tank_threshold() -> CubicMetres {
        CubicMetres(144_000.0)
    }

    const fn default_deadline_window() -> usize {
        96
    }

    /// Horizon length in intervals.
    pub fn horizon(&self) -> usize {
        self.horizon_intervals.unwrap_or(self.intervals.len())
    }

    pub fn interval_hours(&self) -> Hours {
        Hours::from_minutes(f64::from(self.interval_minutes))
    }

    /// Whether the must-nearly-empty rule applies this cycle: it is waived
    /// entirely when the first 24 hours of forecast inflow exceed the
    /// threshold. The whole forecast counts here, even the part beyond the
    /// planning horizon.
    pub fn deadline_active(&self) -> bool {
        let day_intervals = (24 * 60 / self.interval_minutes) as usize;
        let day_inflow: CubicMetres = self
            .intervals
            .iter()
            .take(day_intervals)
            .map(|interval| interval.inflow_m3)
            .sum();
        day_inflow <= self.empty_tank_threshold_m3
    }

    /// Reject contract violations before any model is built. Nothing is
    /// ever silently clamped.
    pub fn validate(&self) -> Result {
        ensure!(self.horizon() > 0, "the planning horizon is empty");
        ensure!(
            self.intervals.len() >= self.horizon(),
            "the forecast covers {} intervals but the horizon needs {}",
            self.intervals.len(),
            self.horizon(),
        );
        ensure!(self.interval_minutes > 0, "the interval duration must be positive");
        ensure!(self.dwell_intervals >= 1, "the minimum dwell must be at least one interval");
        ensure!(
            self.deadline_window_intervals >= 1,
            "the deadline window must be at least one interval",
        );
        ensure!(
            self.max_flow_per_interval_m3 > CubicMetres::ZERO,
            "the per-interval flow cap must be positive",
        );
        ensure!(
            self.max_level_m <= self.tank.crown(),
            "the maximal level {} m exceeds the tank crown {} m",
            self.max_level_m,
            self.tank.crown(),
        );
        ensure!(
            Metres::ZERO <= self.low_level_threshold_m
                && self.low_level_threshold_m < self.max_level_m,
            "the low-level threshold {} m must lie below the maximal level {} m",
            self.low_level_threshold_m,
            self.max_level_m,
        );
        ensure!(
            Metres::ZERO <= self.initial_level_m && self.initial_level_m <= self.max_level_m,
            "the initial level {} m is outside [0, {} m]",
            self.initial_level_m,
            self.max_level_m,
        );

        ensure!(!self.pumps.0.is_empty(), "the station has no pumps");
        let mut seen_ids = BTreeSet::new();
        for pump in &self.pumps.0 {
            ensure!(seen_ids.insert(&pump.id), "duplicate pump id {}", pump.id);
        }

        for (index, interval) in self.intervals.iter().take(self.horizon()).enumerate() {
            ensure!(
                interval.inflow_m3 >= CubicMetres::ZERO,
                "interval {index}: negative forecast inflow {}",
                interval.inflow_m3,
            );
            ensure!(
                interval.price_eur_per_kwh.0 >= 0.0,
                "interval {index}: negative electricity price {}",
                interval.price_eur_per_kwh,
            );
            for pump_id in interval.forced.keys() {
                ensure!(
                    seen_ids.contains(pump_id),
                    "interval {index}: forced override for unknown pump {pump_id}",
                );
            }
        }
        Ok(())
    }
}
