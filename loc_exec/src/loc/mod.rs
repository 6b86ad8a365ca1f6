//! # Localisation module
//!
//! This module provides localisation for the vehicle by matching lidar scans against a static
//! reference map. The pose tracker ([`LocMgr`]) owns the running estimate and the error
//! statistics against ground truth.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod error_stats;
mod params;
mod state;
pub mod transform;

pub use error_stats::*;
pub use params::LocMgrParams;
pub use state::*;
pub use transform::{compose, decompose, RigidTransform};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::ops::Sub;

use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and attitude in the map frame) of the vehicle.
///
/// More specifically this represents the Vehicle Body frame in the Map frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    /// The position in the map frame
    pub position_m: Vector3<f64>,

    /// Rotation about the map Z axis
    pub yaw_rad: f64,

    /// Rotation about the body Y axis, after yaw
    #[serde(default)]
    pub pitch_rad: f64,

    /// Rotation about the body X axis, after yaw and pitch
    #[serde(default)]
    pub roll_rad: f64,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Where the pose fed to trajectory control comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocSource {
    /// Use the scan matching estimate
    ScanMatching,

    /// Use the ground truth from the simulation
    GroundTruth,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(position_m: Vector3<f64>, yaw_rad: f64, pitch_rad: f64, roll_rad: f64) -> Self {
        Self {
            position_m,
            yaw_rad,
            pitch_rad,
            roll_rad,
        }
    }

    /// Return the heading (angle to the positive map X axis) of the vehicle in radians.
    pub fn get_heading(&self) -> f64 {
        self.yaw_rad
    }

    /// Distance between this pose and another, ignoring the Z axis.
    pub fn planar_distance(&self, other: &Pose) -> f64 {
        (self.position_m.xy() - other.position_m.xy()).norm()
    }
}

impl Sub for Pose {
    type Output = Pose;

    /// Relative pose, the component-wise difference of position and angles.
    ///
    /// Angle differences are wrapped into `(-pi, pi]`.
    fn sub(self, rhs: Pose) -> Pose {
        Pose {
            position_m: self.position_m - rhs.position_m,
            yaw_rad: wrap_pi(self.yaw_rad - rhs.yaw_rad),
            pitch_rad: wrap_pi(self.pitch_rad - rhs.pitch_rad),
            roll_rad: wrap_pi(self.roll_rad - rhs.roll_rad),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_sub() {
        let a = Pose::new(Vector3::new(3.0, 4.0, 1.0), PI - 0.1, 0.2, 0.0);
        let b = Pose::new(Vector3::new(1.0, 1.0, 1.0), -PI + 0.1, 0.1, 0.0);

        let rel = a - b;
        assert_eq!(rel.position_m, Vector3::new(2.0, 3.0, 0.0));
        assert_abs_diff_eq!(rel.yaw_rad, -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(rel.pitch_rad, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_planar_distance() {
        let a = Pose::new(Vector3::new(3.0, 4.0, 10.0), 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(a.planar_distance(&Pose::default()), 5.0);
    }
}
