//! # Point cloud module
//!
//! Point clouds used by localisation, both the reference map and the live scans, along with the
//! preprocessing applied to scans before registration.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod voxel;

pub use voxel::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::lidar::LidarPoint;

use crate::loc::RigidTransform;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An unordered set of points.
///
/// The order of points is kept but carries no meaning for any of the algorithms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PointCloud {
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    pub fn push(&mut self, point: Point3) {
        self.points.push(point)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3> {
        self.points.iter()
    }

    /// Return a copy of the cloud with every point moved by the transform.
    pub fn transformed(&self, transform: &RigidTransform) -> PointCloud {
        PointCloud {
            points: self
                .points
                .iter()
                .map(|p| transform.transform_point(p))
                .collect(),
        }
    }

    /// Points as plain arrays, the layout expected by the kd-tree.
    pub fn to_arrays(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| [p.x, p.y, p.z]).collect()
    }
}

impl From<&[LidarPoint]> for PointCloud {
    fn from(points: &[LidarPoint]) -> Self {
        PointCloud {
            points: points.iter().map(|p| Point3::new(p.x, p.y, p.z)).collect(),
        }
    }
}

impl From<Vec<Point3>> for PointCloud {
    fn from(points: Vec<Point3>) -> Self {
        PointCloud::new(points)
    }
}

impl std::iter::FromIterator<Point3> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        PointCloud {
            points: iter.into_iter().collect(),
        }
    }
}
