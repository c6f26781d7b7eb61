use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::units::{Euro, EuroPerKilowattHour};

/// Consumed energy in kilowatt-hours.
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
pub struct KilowattHours(pub f64);

impl Mul<EuroPerKilowattHour> for KilowattHours {
    type Output = Euro;

    fn mul(self, rhs: EuroPerKilowattHour) -> Self::Output {
        Euro(self.0 * rhs.0)
    }
}
