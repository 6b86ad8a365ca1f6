//! Localisation manager parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::{EvalParams, LocMgrError};
use crate::pcl::VoxelFilter;
use crate::reg::RegParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the localisation manager.
#[derive(Debug, Clone, Deserialize)]
pub struct LocMgrParams {
    /// Edge length of the voxels scans are downsampled with
    pub voxel_size_m: f64,

    /// Registration strategy and its parameters
    pub reg: RegParams,

    /// Evaluation limits against ground truth
    #[serde(default)]
    pub eval: EvalParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocMgrParams {
    /// Check the parameters, returning the voxel filter they describe.
    pub fn validate(&self) -> Result<VoxelFilter, LocMgrError> {
        let filter = VoxelFilter::new(self.voxel_size_m).map_err(LocMgrError::PclError)?;
        self.reg.validate().map_err(LocMgrError::RegError)?;

        if !self.eval.is_valid() {
            return Err(LocMgrError::InvalidEvalParams(self.eval));
        }

        Ok(filter)
    }
}
