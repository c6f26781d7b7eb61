use serde::{Deserialize, Serialize};

use crate::units::{CubicMetresPerHour, EuroPerKilowattHour, Kilowatts, Metres};

/// Pump identifier, `<group>.<position>` in the original station naming,
/// for example `1.1` or `2.4`.
#[derive(
    Clone,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct PumpId(pub String);

impl From<&str> for PumpId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// The station runs two symmetric groups of four pumps: one small pump and
/// three big ones per group.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpCategory {
    Small,
    Big,
}

impl PumpCategory {
    /// Rated electrical power draw.
    pub const fn power(self) -> Kilowatts {
        match self {
            Self::Small => Kilowatts(185.0),
            Self::Big => Kilowatts(350.0),
        }
    }

    /// Nominal rated flow, the figure the per-interval flow cap is written
    /// against.
    pub const fn nominal_flow(self) -> CubicMetresPerHour {
        match self {
            Self::Small => CubicMetresPerHour(1500.0),
            Self::Big => CubicMetresPerHour(3000.0),
        }
    }

    /// Delivered flow at the given water level: an affine ramp between the
    /// minimum and maximum rated flow over a bounded level range.
    pub fn flow_at_level(self, level: Metres) -> CubicMetresPerHour {
        match self {
            Self::Small => {
                CubicMetresPerHour(1150.0 + 600.0 * level.0.clamp(0.0, 4.0) / 4.0)
            }
            Self::Big => {
                CubicMetresPerHour(2500.0 + 1000.0 * level.0.clamp(0.0, 5.0) / 5.0)
            }
        }
    }

    /// Comparative pumping score: delivered volume per euro, higher is
    /// better. A ranking signal only — it never acts as a constraint.
    pub fn pumping_score(self, level: Metres, price: EuroPerKilowattHour) -> f64 {
        self.flow_at_level(level).0 / price.0
    }
}

/// Per-pump state carried between planning cycles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PumpState {
    pub id: PumpId,
    pub category: PumpCategory,

    /// Whether the pump is running right now.
    #[serde(default)]
    pub is_on: bool,

    /// Minutes during which the current on/off state may not be changed.
    #[serde(default)]
    pub lock_minutes_remaining: u32,

    /// Cumulative running minutes, the wear-levelling input.
    #[serde(default)]
    pub usage_minutes: u64,
}

impl PumpState {
    pub const fn new(id: PumpId, category: PumpCategory) -> Self {
        Self { id, category, is_on: false, lock_minutes_remaining: 0, usage_minutes: 0 }
    }

    /// Number of leading intervals still covered by the lock countdown.
    pub fn locked_intervals(&self, interval_minutes: u32) -> usize {
        self.lock_minutes_remaining.div_ceil(interval_minutes) as usize
    }
}

/// The mutable-between-cycles record of the whole station: passed in by
/// value with the request and returned updated with the result. Never
/// mutated in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningState(pub Vec<PumpState>);

impl PlanningState {
    /// The original station: groups 1 and 2, position 1 small, 2–4 big.
    pub fn default_station() -> Self {
        let mut pumps = Vec::with_capacity(8);
        for group in 1..=2 {
            for position in 1..=4 {
                let category =
                    if position == 1 { PumpCategory::Small } else { PumpCategory::Big };
                pumps.push(PumpState::new(PumpId(format!("{group}.{position}")), category));
            }
        }
        Self(pumps)
    }

    /// The highest cumulative usage among pumps of the given category.
    pub fn max_usage_minutes(&self, category: PumpCategory) -> u64 {
        self.0
            .iter()
            .filter(|pump| pump.category == category)
            .map(|pump| pump.usage_minutes)
            .max()
            .unwrap_or_default()
    }
}
