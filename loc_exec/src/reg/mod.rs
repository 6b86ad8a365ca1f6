//! # Scan registration module
//!
//! Registration aligns a (downsampled) scan with the reference map, returning the transform which
//! takes points from the scan frame into the map frame. Two interchangeable strategies are
//! provided behind the [`Registration`] trait:
//!
//! - [`Icp`], closest point iteration. The scan is moved by the seed first and the increment
//!   found by the iteration is composed onto the seed.
//! - [`Ndt`], the normal distributions transform. The map is summarised as a grid of Gaussians
//!   and the full transform is optimised directly, starting from the seed.
//!
//! Both strategies must be seeded with a transform close to the answer, usually the previous
//! pose estimate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod icp;
mod ndt;
mod params;

pub use icp::Icp;
pub use ndt::Ndt;
pub use params::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

use crate::loc::RigidTransform;
use crate::pcl::PointCloud;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A scan registration strategy bound to a reference map.
///
/// Implementors do all map preprocessing on construction, so `align` can be called once per
/// scan without repeating it.
pub trait Registration: Send {
    /// The strategy implemented.
    fn strategy(&self) -> RegStrategy;

    /// Align `source` with the map, starting from `seed`.
    ///
    /// At most `max_iterations` iterations are performed. Failure to converge is reported
    /// through [`RegResult::converged`] rather than as an error, the caller decides what to do
    /// with the returned transform.
    fn align(&self, source: &PointCloud, seed: &RigidTransform, max_iterations: usize)
        -> RegResult;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The outcome of one alignment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegResult {
    /// Transform from the scan frame into the map frame
    pub transform: RigidTransform,

    /// True if one of the convergence criteria was met
    pub converged: bool,

    /// Number of iterations performed
    pub iterations: usize,

    /// Quality of the final alignment, lower is better.
    ///
    /// Mean squared correspondence error for ICP, negative score per point for NDT.
    pub fitness: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegError {
    #[error("The reference map is empty")]
    EmptyTarget,

    #[error("The reference map has no cell with enough points to build a distribution")]
    NoUsableCells,

    #[error("Maximum number of iterations must be greater than zero")]
    ZeroIterations,

    #[error("Invalid registration parameter {0}: {1}")]
    InvalidParam(&'static str, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RegResult {
    /// A failed result which leaves the seed untouched.
    pub(crate) fn not_converged(seed: &RigidTransform, iterations: usize) -> Self {
        Self {
            transform: *seed,
            converged: false,
            iterations,
            fitness: f64::INFINITY,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the configured registration strategy against the given map.
pub fn build(params: &RegParams, target: &PointCloud) -> Result<Box<dyn Registration>, RegError> {
    params.validate()?;

    Ok(match params.strategy {
        RegStrategy::Icp => Box::new(Icp::new(params.icp.clone(), target)?),
        RegStrategy::Ndt => Box::new(Ndt::new(params.ndt.clone(), target)?),
    })
}

/// Align `source` with `target` in one call, using the configured strategy.
///
/// The map preprocessing is redone on every call, prefer [`build`] when aligning many scans
/// against the same map.
pub fn align(
    params: &RegParams,
    source: &PointCloud,
    target: &PointCloud,
    seed: &RigidTransform,
    max_iterations: usize,
) -> Result<RegResult, RegError> {
    if max_iterations == 0 {
        return Err(RegError::ZeroIterations);
    }

    Ok(build(params, target)?.align(source, seed, max_iterations))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pcl::Point3;

    #[test]
    fn test_build() {
        let target: PointCloud = (0..200)
            .map(|i| Point3::new((i % 20) as f64 * 0.5, (i / 20) as f64 * 0.5, 0.0))
            .collect();

        let mut params = RegParams {
            strategy: RegStrategy::Icp,
            icp: IcpParams::default(),
            ndt: NdtParams::default(),
        };
        assert_eq!(build(&params, &target).unwrap().strategy(), RegStrategy::Icp);

        params.strategy = RegStrategy::Ndt;
        assert_eq!(build(&params, &target).unwrap().strategy(), RegStrategy::Ndt);

        assert!(matches!(
            build(&params, &PointCloud::default()),
            Err(RegError::EmptyTarget)
        ));

        params.ndt.step_size = 0.0;
        assert!(matches!(
            build(&params, &target),
            Err(RegError::InvalidParam(_, _))
        ));
    }

    #[test]
    fn test_align_zero_iterations() {
        let target: PointCloud = vec![Point3::origin()].into();
        let params = RegParams {
            strategy: RegStrategy::Icp,
            icp: IcpParams::default(),
            ndt: NdtParams::default(),
        };

        assert!(matches!(
            align(&params, &target, &target, &RigidTransform::identity(), 0),
            Err(RegError::ZeroIterations)
        ));
    }
}
