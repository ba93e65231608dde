//! Conversion of reference-space coordinates to atlas voxel indices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::Point3D;
use crate::atlas::VoxelIndex;

/// How a scaled coordinate that falls between voxels is rounded.
///
/// The choice decides which neighbour a coordinate exactly halfway between
/// two voxel centres lands in, so it can change region assignment at
/// boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Ties go to the even neighbour (2.5 -> 2, 3.5 -> 4)
    #[default]
    HalfEven,
    /// Ties go up (2.5 -> 3, -2.5 -> -2)
    HalfUp,
}

impl RoundingMode {
    pub fn round(self, value: f64) -> f64 {
        match self {
            RoundingMode::HalfEven => value.round_ties_even(),
            RoundingMode::HalfUp => (value + 0.5).floor(),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingMode::HalfEven => write!(f, "half-even"),
            RoundingMode::HalfUp => write!(f, "half-up"),
        }
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "half-even" | "even" | "bankers" => Ok(RoundingMode::HalfEven),
            "half-up" | "up" => Ok(RoundingMode::HalfUp),
            other => Err(format!(
                "unknown rounding mode '{}' (expected half-even or half-up)",
                other
            )),
        }
    }
}

/// Scale `point`, expressed in voxels of `source_um` microns, to the voxel
/// grid of an atlas with voxel size `voxel_um` and round to an index.
///
/// A 10 um coordinate looked up in a 25 um atlas is divided by 2.5. Returns
/// `None` when a scaled coordinate is not finite, as no voxel holds it.
pub fn to_voxel_index(
    point: &Point3D,
    source_um: f64,
    voxel_um: [f64; 3],
    rounding: RoundingMode,
) -> Option<VoxelIndex> {
    let coords = point.to_array();
    let mut index = [0i64; 3];
    for (axis, slot) in index.iter_mut().enumerate() {
        let scaled = rounding.round(coords[axis] * source_um / voxel_um[axis]);
        if !scaled.is_finite() {
            return None;
        }
        *slot = scaled as i64;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_even_ties() {
        let mode = RoundingMode::HalfEven;
        assert_eq!(mode.round(2.5), 2.0);
        assert_eq!(mode.round(3.5), 4.0);
        assert_eq!(mode.round(-2.5), -2.0);
        assert_eq!(mode.round(2.6), 3.0);
    }

    #[test]
    fn test_half_up_ties() {
        let mode = RoundingMode::HalfUp;
        assert_eq!(mode.round(2.5), 3.0);
        assert_eq!(mode.round(3.5), 4.0);
        assert_eq!(mode.round(-2.5), -2.0);
        assert_eq!(mode.round(2.4), 2.0);
    }

    #[test]
    fn test_parse_rounding_mode() {
        assert_eq!("half-even".parse(), Ok(RoundingMode::HalfEven));
        assert_eq!("HALF_UP".parse(), Ok(RoundingMode::HalfUp));
        assert!("nearest".parse::<RoundingMode>().is_err());
        assert_eq!(RoundingMode::HalfUp.to_string(), "half-up");
    }

    #[test]
    fn test_ten_to_twenty_five_micron_scaling() {
        let point = Point3D::new(500.0, 300.0, 400.0);
        let index = to_voxel_index(&point, 10.0, [25.0; 3], RoundingMode::HalfEven);
        assert_eq!(index, Some([200, 120, 160]));
    }

    #[test]
    fn test_same_resolution_is_identity() {
        let point = Point3D::new(17.0, 3.0, 1139.0);
        let index = to_voxel_index(&point, 10.0, [10.0; 3], RoundingMode::HalfEven);
        assert_eq!(index, Some([17, 3, 1139]));
    }

    #[test]
    fn test_rounding_mode_changes_boundary_voxel() {
        // 25 um -> 10 um multiplies by 2.5, so odd coordinates land on a tie
        let point = Point3D::new(1.0, 3.0, 2.0);
        let even = to_voxel_index(&point, 25.0, [10.0; 3], RoundingMode::HalfEven);
        let up = to_voxel_index(&point, 25.0, [10.0; 3], RoundingMode::HalfUp);
        assert_eq!(even, Some([2, 8, 5]));
        assert_eq!(up, Some([3, 8, 5]));
    }

    #[test]
    fn test_micron_coordinates() {
        let point = Point3D::new(5000.0, 3000.0, 4000.0);
        let index = to_voxel_index(&point, 1.0, [25.0; 3], RoundingMode::HalfEven);
        assert_eq!(index, Some([200, 120, 160]));
    }

    #[test]
    fn test_non_finite_coordinates_have_no_voxel() {
        for point in [
            Point3D::new(f64::NAN, 30.0, 20.0),
            Point3D::new(20.0, f64::INFINITY, 20.0),
            Point3D::new(20.0, 30.0, f64::NEG_INFINITY),
        ] {
            assert_eq!(
                to_voxel_index(&point, 10.0, [10.0; 3], RoundingMode::HalfEven),
                None
            );
        }
    }
}
