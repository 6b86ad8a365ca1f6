//! Voxel grid downsampling

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use std::collections::BTreeMap;

use super::{Point3, PointCloud};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Integer index of a cubic cell.
pub type CellIndex = (i64, i64, i64);

/// Replaces every occupied cell of a uniform cubic grid by the centroid of its points.
#[derive(Debug, Clone, Copy)]
pub struct VoxelFilter {
    cell_size_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PclError {
    #[error("Voxel cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VoxelFilter {
    pub fn new(cell_size_m: f64) -> Result<Self, PclError> {
        if !(cell_size_m > 0.0 && cell_size_m.is_finite()) {
            return Err(PclError::InvalidCellSize(cell_size_m));
        }

        Ok(Self { cell_size_m })
    }

    /// Index of the cell containing the point.
    pub fn cell_of(&self, point: &Point3) -> CellIndex {
        cell_index(point, self.cell_size_m)
    }

    /// Downsample the cloud.
    ///
    /// Output points are ordered by cell index, so the output is identical for identical inputs.
    pub fn filter(&self, cloud: &PointCloud) -> PointCloud {
        let mut grid: BTreeMap<CellIndex, (Vector3<f64>, usize)> = BTreeMap::new();

        for point in cloud.iter() {
            let entry = grid
                .entry(self.cell_of(point))
                .or_insert((Vector3::zeros(), 0));
            entry.0 += point.coords;
            entry.1 += 1;
        }

        grid.values()
            .map(|(sum, count)| Point3::from(sum / *count as f64))
            .collect()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Downsample the cloud on a grid of the given cell size.
pub fn downsample(cloud: &PointCloud, cell_size_m: f64) -> Result<PointCloud, PclError> {
    Ok(VoxelFilter::new(cell_size_m)?.filter(cloud))
}

/// Index of the cell of size `cell_size_m` containing the point.
pub fn cell_index(point: &Point3, cell_size_m: f64) -> CellIndex {
    (
        (point.x / cell_size_m).floor() as i64,
        (point.y / cell_size_m).floor() as i64,
        (point.z / cell_size_m).floor() as i64,
    )
}
