//! # Rigid transform utilities
//!
//! Conversions between [`Pose`] and 4x4 homogeneous rigid transforms.
//!
//! Rotations are built as `R = Rz(yaw) * Ry(pitch) * Rx(roll)`, i.e. yaw is applied first, then
//! pitch, then roll, about the moving axes. [`decompose`] inverts exactly this order, so any
//! change to one must be mirrored in the other.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Vector3};
use serde::Serialize;
use std::ops::Mul;

use super::Pose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A homogeneous rigid transform.
///
/// The top-left 3x3 block is always a rotation matrix and the bottom row is `[0, 0, 0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct RigidTransform(Matrix4<f64>);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RigidTransform {
    /// The transform which leaves every point unchanged.
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Build a transform from a rotation matrix and a translation.
    pub fn from_parts(rot: &Matrix3<f64>, trans: &Vector3<f64>) -> Self {
        Self(Matrix4::new(
            rot[(0, 0)], rot[(0, 1)], rot[(0, 2)], trans[0],
            rot[(1, 0)], rot[(1, 1)], rot[(1, 2)], trans[1],
            rot[(2, 0)], rot[(2, 1)], rot[(2, 2)], trans[2],
            0.0, 0.0, 0.0, 1.0,
        ))
    }

    /// Build the transform which places a body at the given pose.
    pub fn from_pose(pose: &Pose) -> Self {
        compose(
            pose.yaw_rad,
            pose.pitch_rad,
            pose.roll_rad,
            pose.position_m[0],
            pose.position_m[1],
            pose.position_m[2],
        )
    }

    /// Extract the pose described by this transform.
    pub fn to_pose(&self) -> Pose {
        decompose(self)
    }

    /// The underlying homogeneous matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// The rotation block.
    pub fn rotation(&self) -> Matrix3<f64> {
        let m = &self.0;
        Matrix3::new(
            m[(0, 0)], m[(0, 1)], m[(0, 2)],
            m[(1, 0)], m[(1, 1)], m[(1, 2)],
            m[(2, 0)], m[(2, 1)], m[(2, 2)],
        )
    }

    /// The translation column.
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.0[(0, 3)], self.0[(1, 3)], self.0[(2, 3)])
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation() * point.coords + self.translation())
    }

    /// The inverse transform, using the orthonormality of the rotation block.
    pub fn inverse(&self) -> Self {
        let rot_t = self.rotation().transpose();
        let trans = -(rot_t * self.translation());
        Self::from_parts(&rot_t, &trans)
    }

    /// Check that the rotation block is orthonormal with a positive determinant, to within the
    /// given tolerance.
    pub fn is_rigid(&self, tolerance: f64) -> bool {
        let rot = self.rotation();
        let ortho_err = (rot.transpose() * rot - Matrix3::identity()).abs().max();
        let det_err = (rot.determinant() - 1.0).abs();
        let bottom_ok = self.0[(3, 0)] == 0.0
            && self.0[(3, 1)] == 0.0
            && self.0[(3, 2)] == 0.0
            && self.0[(3, 3)] == 1.0;

        ortho_err <= tolerance && det_err <= tolerance && bottom_ok
    }

    /// Squared magnitude of the change this transform represents.
    ///
    /// This is the squared translation plus the squared rotation angle, and is used as the
    /// "transform change" measure by the iterative registration strategies.
    pub fn change_sq(&self) -> f64 {
        // Rounding can push the cosine just past 1 for near identity rotations
        let cos_angle = ((self.rotation().trace() - 1.0) * 0.5).max(-1.0).min(1.0);
        let angle = cos_angle.acos();
        self.translation().norm_squared() + angle * angle
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        RigidTransform(self.0 * rhs.0)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build a rigid transform from yaw, pitch, roll (radians) and a translation.
pub fn compose(
    yaw_rad: f64,
    pitch_rad: f64,
    roll_rad: f64,
    tx_m: f64,
    ty_m: f64,
    tz_m: f64,
) -> RigidTransform {
    let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw_rad)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), pitch_rad)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), roll_rad);

    RigidTransform::from_parts(rot.matrix(), &Vector3::new(tx_m, ty_m, tz_m))
}

/// Extract the pose from a rigid transform built by [`compose`].
pub fn decompose(transform: &RigidTransform) -> Pose {
    let m = transform.matrix();

    let yaw_rad = m[(1, 0)].atan2(m[(0, 0)]);
    let pitch_rad = (-m[(2, 0)]).atan2((m[(2, 1)].powi(2) + m[(2, 2)].powi(2)).sqrt());
    let roll_rad = m[(2, 1)].atan2(m[(2, 2)]);

    Pose {
        position_m: transform.translation(),
        yaw_rad,
        pitch_rad,
        roll_rad,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_pose_eq(a: &Pose, b: &Pose) {
        for i in 0..3 {
            assert_abs_diff_eq!(a.position_m[i], b.position_m[i], epsilon = 1e-6);
        }
        assert_abs_diff_eq!(a.yaw_rad, b.yaw_rad, epsilon = 1e-6);
        assert_abs_diff_eq!(a.pitch_rad, b.pitch_rad, epsilon = 1e-6);
        assert_abs_diff_eq!(a.roll_rad, b.roll_rad, epsilon = 1e-6);
    }

    #[test]
    fn test_round_trip() {
        let yaws = [-PI + 1e-3, -2.0, -0.5, 0.0, 0.3, 1.7, 3.0, PI];
        let tilts = [-FRAC_PI_2 + 1e-3, -0.7, 0.0, 0.2, 1.1, FRAC_PI_2 - 1e-3];

        for &yaw in yaws.iter() {
            for &pitch in tilts.iter() {
                for &roll in tilts.iter() {
                    let pose = Pose::new(Vector3::new(1.5, -20.0, 0.25), yaw, pitch, roll);
                    let transform = RigidTransform::from_pose(&pose);

                    assert!(transform.is_rigid(1e-9));
                    assert_pose_eq(&decompose(&transform), &pose);
                }
            }
        }
    }

    #[test]
    fn test_rotation_order() {
        // A quarter turn of yaw followed by a quarter turn of pitch about the new y axis sends
        // the body x axis straight down.
        let t = compose(FRAC_PI_2, FRAC_PI_2, 0.0, 0.0, 0.0, 0.0);
        let x = t.transform_point(&Point3::new(1.0, 0.0, 0.0));

        assert_abs_diff_eq!(x.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x.z, -1.0, epsilon = 1e-12);

        // Yaw only rotates about z
        let t = compose(FRAC_PI_2, 0.0, 0.0, 1.0, 2.0, 3.0);
        let p = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.z, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_and_mul() {
        let a = compose(0.4, -0.1, 0.05, 3.0, -1.0, 0.5);
        let b = compose(-1.2, 0.3, 0.2, -0.5, 4.0, 1.0);

        let ident = a * a.inverse();
        assert_abs_diff_eq!(ident.change_sq(), 0.0, epsilon = 1e-12);

        // Composition applies the right hand side first
        let p = Point3::new(0.3, 0.7, -2.0);
        let ab = (a * b).transform_point(&p);
        let a_b = a.transform_point(&b.transform_point(&p));
        for i in 0..3 {
            assert_abs_diff_eq!(ab[i], a_b[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_change_sq() {
        assert_eq!(RigidTransform::identity().change_sq(), 0.0);
        assert_abs_diff_eq!(
            compose(0.0, 0.0, 0.0, 0.3, 0.4, 0.0).change_sq(),
            0.25,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            compose(0.1, 0.0, 0.0, 0.0, 0.0, 0.0).change_sq(),
            0.01,
            epsilon = 1e-12
        );

        // Trace slightly above 3 from rounding
        let nudged =
            RigidTransform::from_parts(&(Matrix3::identity() * (1.0 + 1e-15)), &Vector3::zeros());
        assert_eq!(nudged.change_sq(), 0.0);
    }
}
