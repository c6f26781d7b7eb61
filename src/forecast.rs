use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    pump::PumpId,
    units::{CubicMetres, EuroPerKilowattHour},
};

/// One forecast slice of the planning horizon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalForecast {
    /// Interval start.
    pub start_time: NaiveDateTime,

    /// Forecast inflow volume over the interval.
    pub inflow_m3: CubicMetres,

    /// Forecast day-ahead electricity price.
    pub price_eur_per_kwh: EuroPerKilowattHour,

    /// Externally forced pump states for this interval. Pumps that are not
    /// listed are unconstrained.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub forced: BTreeMap<PumpId, bool>,
}

impl IntervalForecast {
    pub const fn new(
        start_time: NaiveDateTime,
        inflow_m3: CubicMetres,
        price_eur_per_kwh: EuroPerKilowattHour,
    ) -> Self {
        Self { start_time, inflow_m3, price_eur_per_kwh, forced: BTreeMap::new() }
    }
}
