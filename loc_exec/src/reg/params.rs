//! Registration parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::RegError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for scan registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegParams {
    /// Which registration strategy to use
    pub strategy: RegStrategy,

    #[serde(default)]
    pub icp: IcpParams,

    #[serde(default)]
    pub ndt: NdtParams,
}

/// Closest point (ICP) parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IcpParams {
    /// Maximum number of iterations per alignment
    pub max_iterations: usize,

    /// Pairs further apart than this are not considered as correspondences
    pub max_corr_dist_m: f64,

    /// Stop once the squared change of the incremental transform drops below this
    pub trans_epsilon: f64,

    /// Stop once the mean squared correspondence error changes by less than this between two
    /// iterations
    pub fitness_epsilon: f64,

    /// Correspondences further apart than this are outliers. They still take part in the fit.
    pub rejection_threshold_m: f64,

    /// An alignment which settles with more than this fraction of outliers is not converged
    pub max_outlier_fraction: f64,
}

/// Probabilistic grid (NDT) parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NdtParams {
    /// Maximum number of iterations per alignment
    pub max_iterations: usize,

    /// Edge length of the grid cells
    pub resolution_m: f64,

    /// Stop once the norm of the parameter step drops below this
    pub trans_epsilon: f64,

    /// Maximum norm of a single parameter step
    pub step_size: f64,

    /// Expected fraction of scan points which have no counterpart in the map
    pub outlier_ratio: f64,

    /// Cells with fewer points than this are not used
    pub min_points_per_cell: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The available registration strategies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegStrategy {
    Icp,
    Ndt,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RegParams {
    /// Maximum iterations of the selected strategy.
    pub fn max_iterations(&self) -> usize {
        match self.strategy {
            RegStrategy::Icp => self.icp.max_iterations,
            RegStrategy::Ndt => self.ndt.max_iterations,
        }
    }

    /// Check that the selected strategy's parameters are usable.
    pub fn validate(&self) -> Result<(), RegError> {
        match self.strategy {
            RegStrategy::Icp => self.icp.validate(),
            RegStrategy::Ndt => self.ndt.validate(),
        }
    }
}

impl IcpParams {
    pub fn validate(&self) -> Result<(), RegError> {
        if self.max_iterations == 0 {
            return Err(RegError::ZeroIterations);
        }
        positive("icp.max_corr_dist_m", self.max_corr_dist_m)?;
        positive("icp.rejection_threshold_m", self.rejection_threshold_m)?;
        non_negative("icp.trans_epsilon", self.trans_epsilon)?;
        non_negative("icp.fitness_epsilon", self.fitness_epsilon)?;

        if !(self.max_outlier_fraction > 0.0 && self.max_outlier_fraction <= 1.0) {
            return Err(RegError::InvalidParam(
                "icp.max_outlier_fraction",
                self.max_outlier_fraction,
            ));
        }

        Ok(())
    }
}

impl NdtParams {
    pub fn validate(&self) -> Result<(), RegError> {
        if self.max_iterations == 0 {
            return Err(RegError::ZeroIterations);
        }
        positive("ndt.resolution_m", self.resolution_m)?;
        positive("ndt.step_size", self.step_size)?;
        non_negative("ndt.trans_epsilon", self.trans_epsilon)?;

        if !(self.outlier_ratio >= 0.0 && self.outlier_ratio < 1.0) {
            return Err(RegError::InvalidParam("ndt.outlier_ratio", self.outlier_ratio));
        }
        if self.min_points_per_cell < 3 {
            return Err(RegError::InvalidParam(
                "ndt.min_points_per_cell",
                self.min_points_per_cell as f64,
            ));
        }

        Ok(())
    }
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 120,
            max_corr_dist_m: 5.0,
            trans_epsilon: 1e-4,
            fitness_epsilon: 2.0,
            rejection_threshold_m: 0.2,
            max_outlier_fraction: 0.8,
        }
    }
}

impl Default for NdtParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            resolution_m: 5.0,
            trans_epsilon: 1e-3,
            step_size: 0.1,
            outlier_ratio: 0.55,
            min_points_per_cell: 6,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn positive(name: &'static str, value: f64) -> Result<(), RegError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(RegError::InvalidParam(name, value))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), RegError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(RegError::InvalidParam(name, value))
    }
}
