use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::units::{CubicMetres, Hours};

/// Pumping rate in cubic metres per hour.
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
pub struct CubicMetresPerHour(pub f64);

impl Mul<Hours> for CubicMetresPerHour {
    type Output = CubicMetres;

    fn mul(self, rhs: Hours) -> Self::Output {
        CubicMetres(self.0 * rhs.0)
    }
}
