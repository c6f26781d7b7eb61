use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    units::{CubicMetres, Metres},
};

/// Bisection stops once the bracket is narrower than this (1 mm).
const HEIGHT_TOLERANCE: f64 = 1e-3;

/// Horizontal-cylinder («tunnel») storage tank.
///
/// The fill height to volume relation follows the circular-segment formula:
/// `V(h) = L · r² · (θ − sin θ) / 2` with `θ = 2·arccos((r − h) / r)`.
/// The relation is monotonic but has no closed-form inverse, so
/// [`TunnelGeometry::height_from_volume`] bisects over the fill height.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TunnelGeometry {
    /// Bore radius.
    #[serde(default = "TunnelGeometry::default_radius")]
    pub radius: Metres,

    /// Tunnel length.
    #[serde(default = "TunnelGeometry::default_length")]
    pub length: Metres,
}

impl Default for TunnelGeometry {
    fn default() -> Self {
        Self { radius: Self::default_radius(), length: Self::default_length() }
    }
}

impl TunnelGeometry {
    fn default_radius() -> Metres {
        Metres(7.05)
    }

    fn default_length() -> Metres {
        Metres(1446.0)
    }

    /// Maximal fill height: the crown of the bore.
    pub fn crown(self) -> Metres {
        self.radius * 2.0
    }

    /// Volume at the crown.
    pub fn capacity(self) -> CubicMetres {
        CubicMetres(std::f64::consts::PI * self.radius.0.powi(2) * self.length.0)
    }

    /// Stored volume at the given fill height.
    pub fn volume_from_height(self, height: Metres) -> Result<CubicMetres> {
        ensure!(
            height >= Metres::ZERO && height <= self.crown(),
            "fill height {height} m is outside the tank range [0, {} m]",
            self.crown(),
        );
        Ok(CubicMetres(self.segment_volume(height.0)))
    }

    /// Fill height at the given stored volume, to within 1 mm.
    ///
    /// Fails with a range error when the volume does not fit the tank.
    pub fn height_from_volume(self, volume: CubicMetres) -> Result<Metres> {
        ensure!(
            volume >= CubicMetres::ZERO && volume <= self.capacity(),
            "volume {volume} m³ is outside the tank capacity [0, {} m³]",
            self.capacity(),
        );
        let (mut low, mut high) = (0.0, self.crown().0);
        while high - low > HEIGHT_TOLERANCE {
            let mid = (low + high) / 2.0;
            if self.segment_volume(mid) < volume.0 {
                low = mid;
            } else {
                high = mid;
            }
        }
        Ok(Metres((low + high) / 2.0))
    }

    /// The circular-segment volume, assuming `0 ≤ height ≤ 2r`.
    fn segment_volume(self, height: f64) -> f64 {
        let radius = self.radius.0;
        let theta = 2.0 * ((radius - height) / radius).clamp(-1.0, 1.0).acos();
        self.length.0 * radius.powi(2) * (theta - theta.sin()) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_empty_and_full() -> Result {
        let tank = TunnelGeometry::default();
        assert_abs_diff_eq!(tank.volume_from_height(Metres::ZERO)?.0, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(
            tank.volume_from_height(tank.crown())?.0,
            tank.capacity().0,
            epsilon = 1e-6,
        );
        Ok(())
    }

    #[test]
    fn test_volume_is_monotonic() -> Result {
        let tank = TunnelGeometry::default();
        let mut previous = CubicMetres::ZERO;
        for step in 1..=100 {
            let height = tank.crown() * (f64::from(step) / 100.0);
            let volume = tank.volume_from_height(height)?;
            assert!(volume > previous, "V({height}) = {volume} did not grow");
            previous = volume;
        }
        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result {
        let tank = TunnelGeometry::default();
        for step in 0..=141 {
            let height = Metres(f64::from(step) / 10.0);
            let round_trip = tank.height_from_volume(tank.volume_from_height(height)?)?;
            assert_abs_diff_eq!(round_trip.0, height.0, epsilon = 1e-3);
        }
        Ok(())
    }

    #[test]
    fn test_height_out_of_range() {
        let tank = TunnelGeometry::default();
        assert!(tank.volume_from_height(Metres(-0.1)).is_err());
        assert!(tank.volume_from_height(Metres(14.2)).is_err());
    }

    #[test]
    fn test_volume_out_of_range() {
        let tank = TunnelGeometry::default();
        assert!(tank.height_from_volume(CubicMetres(-1.0)).is_err());
        assert!(tank.height_from_volume(tank.capacity() + CubicMetres::ONE).is_err());
    }
}
