//! Closest point iteration
//!
//! Every pair within the maximum correspondence distance takes part in the fit. The alignment
//! has settled when the step becomes small or the mean squared pair error stops changing, and is
//! only reported as converged if few enough pairs are further apart than the rejection threshold.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use log::{debug, trace};
use nalgebra::{Matrix3, Vector3};

use super::{IcpParams, RegError, RegResult, RegStrategy, Registration};
use crate::loc::RigidTransform;
use crate::pcl::PointCloud;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Point to point ICP against a fixed map.
pub struct Icp {
    params: IcpParams,

    /// Map points, indexed by the kd-tree items
    target: Vec<[f64; 3]>,

    tree: ImmutableKdTree<f64, u32, 3, 32>,
}

/// A source point paired with its closest map point.
#[derive(Debug, Clone, Copy)]
struct Correspondence {
    source: Vector3<f64>,
    target: Vector3<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Icp {
    pub fn new(params: IcpParams, target: &PointCloud) -> Result<Self, RegError> {
        params.validate()?;

        if target.is_empty() {
            return Err(RegError::EmptyTarget);
        }

        let target = target.to_arrays();
        let tree = ImmutableKdTree::new_from_slice(&target);

        Ok(Self {
            params,
            target,
            tree,
        })
    }

    /// Pair every point with its closest map point, dropping pairs beyond the maximum
    /// correspondence distance.
    fn correspondences(&self, points: &[Vector3<f64>]) -> Vec<Correspondence> {
        let max_dist_sq = self.params.max_corr_dist_m.powi(2);

        points
            .iter()
            .filter_map(|p| {
                let nn = self
                    .tree
                    .nearest_one::<kiddo::SquaredEuclidean>(&[p.x, p.y, p.z]);

                if nn.distance > max_dist_sq {
                    return None;
                }

                let t = self.target[nn.item as usize];
                Some(Correspondence {
                    source: *p,
                    target: Vector3::new(t[0], t[1], t[2]),
                })
            })
            .collect()
    }
}

impl Registration for Icp {
    fn strategy(&self) -> RegStrategy {
        RegStrategy::Icp
    }

    fn align(
        &self,
        source: &PointCloud,
        seed: &RigidTransform,
        max_iterations: usize,
    ) -> RegResult {
        // Work on the scan already moved by the seed, the iteration only finds the increment
        let mut current: Vec<Vector3<f64>> = source
            .iter()
            .map(|p| seed.transform_point(p).coords)
            .collect();
        let mut increment = RigidTransform::identity();
        let mut prev_mse = f64::INFINITY;
        let rejection_sq = self.params.rejection_threshold_m.powi(2);

        for iteration in 1..=max_iterations {
            let corrs = self.correspondences(&current);

            if corrs.len() < 3 {
                debug!(
                    "ICP: only {} correspondences on iteration {}",
                    corrs.len(),
                    iteration
                );
                return RegResult::not_converged(&(increment * *seed), iteration);
            }

            // Error of the pairs as found, before this iteration's step
            let mut mse = 0.0;
            let mut num_outliers = 0;
            for c in corrs.iter() {
                let dist_sq = (c.source - c.target).norm_squared();
                mse += dist_sq;
                if dist_sq > rejection_sq {
                    num_outliers += 1;
                }
            }
            mse /= corrs.len() as f64;
            let outlier_fraction = num_outliers as f64 / corrs.len() as f64;

            let step = match fit_rigid(&corrs) {
                Some(s) => s,
                None => return RegResult::not_converged(&(increment * *seed), iteration),
            };

            // Apply the step
            let rot = step.rotation();
            let trans = step.translation();
            for p in current.iter_mut() {
                *p = rot * *p + trans;
            }
            increment = step * increment;

            let change_sq = step.change_sq();
            let mse_change = (mse - prev_mse).abs();
            prev_mse = mse;

            trace!(
                "ICP iteration {}: {} pairs, {:.1} % outliers, change {:.3e}, mse {:.4}",
                iteration,
                corrs.len(),
                outlier_fraction * 100.0,
                change_sq,
                mse
            );

            if change_sq < self.params.trans_epsilon || mse_change < self.params.fitness_epsilon {
                // Settled, but on pairs too far apart to trust
                if outlier_fraction > self.params.max_outlier_fraction {
                    debug!(
                        "ICP: settled after {} iterations with {:.1} % outliers",
                        iteration,
                        outlier_fraction * 100.0
                    );
                    return RegResult::not_converged(&(increment * *seed), iteration);
                }

                return RegResult {
                    transform: increment * *seed,
                    converged: true,
                    iterations: iteration,
                    fitness: mse,
                };
            }
        }

        RegResult::not_converged(&(increment * *seed), max_iterations)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Least squares rigid transform taking the source points onto their targets.
///
/// Uses the SVD of the cross covariance, with the sign of the smallest singular direction flipped
/// when needed so that the result is a rotation rather than a reflection.
fn fit_rigid(corrs: &[Correspondence]) -> Option<RigidTransform> {
    let n = corrs.len() as f64;
    let src_mean = corrs.iter().fold(Vector3::zeros(), |acc, c| acc + c.source) / n;
    let tgt_mean = corrs.iter().fold(Vector3::zeros(), |acc, c| acc + c.target) / n;

    let h = corrs.iter().fold(Matrix3::zeros(), |acc, c| {
        acc + (c.source - src_mean) * (c.target - tgt_mean).transpose()
    });

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();

    // Singular values are not sorted, so find the weakest direction explicitly
    let mut flip = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        let weakest = svd.singular_values.imin();
        flip[(weakest, weakest)] = -1.0;
    }

    let rot = v * flip * u.transpose();
    let trans = tgt_mean - rot * src_mean;

    Some(RigidTransform::from_parts(&rot, &trans))
}
