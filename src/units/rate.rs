use serde::{Deserialize, Serialize};

/// Electricity tariff in euros per kilowatt-hour.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    PartialEq,
    PartialOrd,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::Display,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
pub struct EuroPerKilowattHour(pub f64);

impl EuroPerKilowattHour {
    pub const ZERO: Self = Self(0.0);
}
