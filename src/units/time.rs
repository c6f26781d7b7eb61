use serde::{Deserialize, Serialize};

/// Elapsed time in hours.
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
pub struct Hours(pub f64);

impl Hours {
    pub fn from_minutes(minutes: f64) -> Self {
        Self(minutes / 60.0)
    }

    pub fn into_minutes(self) -> f64 {
        self.0 * 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_round_trip() {
        assert_eq!(Hours::from_minutes(15.0), Hours(0.25));
        assert_eq!(Hours(0.25).into_minutes(), 15.0);
    }
}
