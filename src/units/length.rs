use std::ops::Mul;

use serde::{Deserialize, Serialize};

/// Fill height or linear tank dimension in metres.
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
pub struct Metres(pub f64);

impl Metres {
    pub const ZERO: Self = Self(0.0);
}

impl Mul<f64> for Metres {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}
