//! Normal distributions transform
//!
//! The map is divided into cubic cells of edge `resolution_m`, and the points of each cell are
//! summarised by their mean and covariance. The score of a transformed scan point is a mixture of
//! the Gaussians of nearby cells and a uniform outlier term, approximated as
//! `-d1 * exp(-d2 / 2 * q' C^-1 q)` where `q` is the offset of the point from the cell mean.
//!
//! The transform is parameterised as `[tx, ty, tz, roll, pitch, yaw]` and the summed score is
//! maximised with damped Gauss-Newton steps, limited in length and checked by a backtracking line
//! search.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::{Matrix3, Matrix3x6, Matrix6, SymmetricEigen, Vector3, Vector6};
use std::collections::HashMap;

use super::{NdtParams, RegError, RegResult, RegStrategy, Registration};
use crate::loc::{compose, decompose, RigidTransform};
use crate::pcl::{cell_index, CellIndex, Point3, PointCloud};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Covariance eigenvalues are raised to at least this fraction of the largest one.
const MIN_EIGEN_RATIO: f64 = 0.01;

/// Levenberg style damping added to the diagonal of the Gauss-Newton system.
const DAMPING: f64 = 1e-6;

/// Maximum number of step halvings in the line search.
const MAX_LINE_SEARCH_HALVINGS: usize = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// NDT against a fixed map.
pub struct Ndt {
    params: NdtParams,

    /// Gaussian summary of each usable map cell
    cells: HashMap<CellIndex, NdtCell>,

    /// Score function constants
    d1: f64,
    d2: f64,
}

#[derive(Debug, Clone, Copy)]
struct NdtCell {
    mean: Vector3<f64>,
    inv_cov: Matrix3<f64>,
}

/// Score of the scan at one parameter vector, optionally with its derivatives.
struct Evaluation {
    score: f64,
    gradient: Vector6<f64>,
    hessian: Matrix6<f64>,

    /// Number of point to cell pairs which contributed
    num_pairs: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Ndt {
    pub fn new(params: NdtParams, target: &PointCloud) -> Result<Self, RegError> {
        params.validate()?;

        if target.is_empty() {
            return Err(RegError::EmptyTarget);
        }

        // Group the map points by cell
        let mut groups: HashMap<CellIndex, Vec<Vector3<f64>>> = HashMap::new();
        for p in target.iter() {
            groups
                .entry(cell_index(p, params.resolution_m))
                .or_insert_with(Vec::new)
                .push(p.coords);
        }

        let cells: HashMap<CellIndex, NdtCell> = groups
            .into_iter()
            .filter(|(_, pts)| pts.len() >= params.min_points_per_cell)
            .filter_map(|(idx, pts)| NdtCell::from_points(&pts).map(|c| (idx, c)))
            .collect();

        if cells.is_empty() {
            return Err(RegError::NoUsableCells);
        }

        let (d1, d2) = score_constants(params.outlier_ratio, params.resolution_m);

        debug!(
            "NDT map built: {} cells from {} points (d1 = {:.3}, d2 = {:.3})",
            cells.len(),
            target.len(),
            d1,
            d2
        );

        Ok(Self {
            params,
            cells,
            d1,
            d2,
        })
    }

    /// Cells close enough to the point to contribute to its score.
    fn neighbours<'a>(&'a self, point: &'a Vector3<f64>) -> impl Iterator<Item = &'a NdtCell> + 'a {
        let res = self.params.resolution_m;
        let (cx, cy, cz) = cell_index(&Point3::from(*point), res);

        (-1..=1)
            .flat_map(move |dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| (dx, dy, dz))))
            .filter_map(move |(dx, dy, dz)| self.cells.get(&(cx + dx, cy + dy, cz + dz)))
            .filter(move |cell| (cell.mean - point).norm_squared() <= res * res)
    }

    /// Evaluate the score of the scan at the parameters, with gradient and Hessian
    /// approximation if `derivatives` is set.
    fn evaluate(&self, points: &[Vector3<f64>], params: &Vector6<f64>, derivatives: bool)
        -> Evaluation
    {
        let (rot, jac_ang) = rotation_and_derivatives(params[3], params[4], params[5]);
        let trans = Vector3::new(params[0], params[1], params[2]);

        let mut eval = Evaluation {
            score: 0.0,
            gradient: Vector6::zeros(),
            hessian: Matrix6::zeros(),
            num_pairs: 0,
        };

        let mut jac = Matrix3x6::zeros();
        jac.set_column(0, &Vector3::x());
        jac.set_column(1, &Vector3::y());
        jac.set_column(2, &Vector3::z());

        for x in points {
            let moved = rot * x + trans;

            if derivatives {
                for (i, d) in jac_ang.iter().enumerate() {
                    jac.set_column(3 + i, &(d * x));
                }
            }

            for cell in self.neighbours(&moved) {
                let q = moved - cell.mean;
                let c_q = cell.inv_cov * q;
                let e = (-0.5 * self.d2 * q.dot(&c_q)).exp();

                eval.score -= self.d1 * e;
                eval.num_pairs += 1;

                if derivatives {
                    let weight = self.d1 * self.d2 * e;
                    eval.gradient += weight * (jac.transpose() * c_q);
                    eval.hessian += weight * (jac.transpose() * cell.inv_cov * jac);
                }
            }
        }

        eval
    }
}

impl NdtCell {
    /// Summarise the points of one cell, or `None` if they are all coincident.
    fn from_points(points: &[Vector3<f64>]) -> Option<Self> {
        let n = points.len() as f64;
        let mean = points.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n;
        let cov = points.iter().fold(Matrix3::zeros(), |acc, p| {
            let d = p - mean;
            acc + d * d.transpose()
        }) / (n - 1.0);

        // Flat or linear cells have (near) singular covariances, lift the small eigenvalues
        let eigen = SymmetricEigen::new(cov);
        let max_eigen = eigen.eigenvalues.max();
        if !(max_eigen > 0.0) {
            return None;
        }

        let min_eigen = max_eigen * MIN_EIGEN_RATIO;
        let inv_eigen = Matrix3::from_diagonal(&eigen.eigenvalues.map(|l| 1.0 / l.max(min_eigen)));
        let inv_cov = eigen.eigenvectors * inv_eigen * eigen.eigenvectors.transpose();

        Some(Self { mean, inv_cov })
    }
}

impl Registration for Ndt {
    fn strategy(&self) -> RegStrategy {
        RegStrategy::Ndt
    }

    fn align(
        &self,
        source: &PointCloud,
        seed: &RigidTransform,
        max_iterations: usize,
    ) -> RegResult {
        // The scan is not moved, the seed is the starting parameter vector
        let points: Vec<Vector3<f64>> = source.iter().map(|p| p.coords).collect();
        let mut params = to_params(seed);

        let mut eval = self.evaluate(&points, &params, true);
        if eval.num_pairs == 0 {
            debug!("NDT: the scan does not overlap the map at the seed");
            return RegResult::not_converged(seed, 0);
        }

        for iteration in 1..=max_iterations {
            // Solve (-H + damping) step = g. -H is positive semi-definite, so the step climbs.
            let system = -eval.hessian + Matrix6::identity() * DAMPING;
            let mut step = match system.cholesky() {
                Some(c) => c.solve(&eval.gradient),
                None => match system.lu().solve(&eval.gradient) {
                    Some(s) => s,
                    None => {
                        debug!("NDT: singular system on iteration {}", iteration);
                        return RegResult::not_converged(&from_params(&params), iteration);
                    }
                },
            };

            let step_norm = step.norm();
            if step_norm > self.params.step_size {
                step *= self.params.step_size / step_norm;
            }

            // Backtrack until the score improves
            let mut accepted = None;
            let mut scale = 1.0;
            for _ in 0..=MAX_LINE_SEARCH_HALVINGS {
                let candidate = params + step * scale;
                let cand_eval = self.evaluate(&points, &candidate, false);

                if cand_eval.num_pairs > 0 && cand_eval.score > eval.score {
                    accepted = Some(candidate);
                    break;
                }
                scale *= 0.5;
            }

            let applied_norm = match accepted {
                Some(candidate) => {
                    let norm = (candidate - params).norm();
                    params = candidate;
                    eval = self.evaluate(&points, &params, true);
                    norm
                }
                // No improving step, the score is at a local maximum
                None => 0.0,
            };

            trace!(
                "NDT iteration {}: score {:.3}, {} pairs, step {:.3e}",
                iteration,
                eval.score,
                eval.num_pairs,
                applied_norm
            );

            if applied_norm < self.params.trans_epsilon {
                return RegResult {
                    transform: from_params(&params),
                    converged: true,
                    iterations: iteration,
                    fitness: -eval.score / points.len() as f64,
                };
            }
        }

        RegResult::not_converged(&from_params(&params), max_iterations)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Constants of the Gaussian approximation of the mixed normal and uniform score.
fn score_constants(outlier_ratio: f64, resolution_m: f64) -> (f64, f64) {
    let c1 = 10.0 * (1.0 - outlier_ratio);
    let c2 = outlier_ratio / resolution_m.powi(3);
    let d3 = -c2.ln();
    let d1 = -(c1 + c2).ln() - d3;
    let d2 = -2.0 * ((-(c1 * (-0.5f64).exp() + c2).ln() - d3) / d1).ln();

    (d1, d2)
}

fn to_params(transform: &RigidTransform) -> Vector6<f64> {
    let pose = decompose(transform);
    Vector6::new(
        pose.position_m[0],
        pose.position_m[1],
        pose.position_m[2],
        pose.roll_rad,
        pose.pitch_rad,
        pose.yaw_rad,
    )
}

fn from_params(params: &Vector6<f64>) -> RigidTransform {
    compose(params[5], params[4], params[3], params[0], params[1], params[2])
}

/// The rotation `Rz(yaw) Ry(pitch) Rx(roll)` and its derivatives with respect to roll, pitch and
/// yaw.
fn rotation_and_derivatives(roll: f64, pitch: f64, yaw: f64) -> (Matrix3<f64>, [Matrix3<f64>; 3]) {
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();

    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, cr, -sr, 0.0, sr, cr);
    let ry = Matrix3::new(cp, 0.0, sp, 0.0, 1.0, 0.0, -sp, 0.0, cp);
    let rz = Matrix3::new(cy, -sy, 0.0, sy, cy, 0.0, 0.0, 0.0, 1.0);

    let d_rx = Matrix3::new(0.0, 0.0, 0.0, 0.0, -sr, -cr, 0.0, cr, -sr);
    let d_ry = Matrix3::new(-sp, 0.0, cp, 0.0, 0.0, 0.0, -cp, 0.0, -sp);
    let d_rz = Matrix3::new(-sy, -cy, 0.0, cy, -sy, 0.0, 0.0, 0.0, 0.0);

    (
        rz * ry * rx,
        [rz * ry * d_rx, rz * d_ry * rx, d_rz * ry * rx],
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Three orthogonal planes meeting at the origin, sampled every 0.5 m.
    fn corner() -> PointCloud {
        let mut cloud = PointCloud::default();
        for i in 0..30 {
            for j in 0..30 {
                let a = i as f64 * 0.5;
                let b = j as f64 * 0.5;
                cloud.push(Point3::new(0.0, a, b));
                cloud.push(Point3::new(a, 0.0, b));
                cloud.push(Point3::new(a, b, 0.0));
            }
        }
        cloud
    }

    #[test]
    fn test_score_constants() {
        let (d1, d2) = score_constants(0.55, 5.0);
        assert_abs_diff_eq!(d1, -6.93, epsilon = 0.01);
        assert_abs_diff_eq!(d2, 0.149, epsilon = 0.001);
    }

    #[test]
    fn test_rotation_matches_compose() {
        let (rot, _) = rotation_and_derivatives(0.1, -0.2, 0.7);
        let t = compose(0.7, -0.2, 0.1, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!((rot - t.rotation()).abs().max(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_derivatives() {
        let angles = [0.3, -0.4, 1.1];
        let (_, derivs) = rotation_and_derivatives(angles[0], angles[1], angles[2]);
        let h = 1e-6;

        for k in 0..3 {
            let mut plus = angles;
            let mut minus = angles;
            plus[k] += h;
            minus[k] -= h;
            let (r_plus, _) = rotation_and_derivatives(plus[0], plus[1], plus[2]);
            let (r_minus, _) = rotation_and_derivatives(minus[0], minus[1], minus[2]);
            let numeric = (r_plus - r_minus) / (2.0 * h);

            assert_abs_diff_eq!((numeric - derivs[k]).abs().max(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_flat_cell_regularised() {
        let pts: Vec<Vector3<f64>> = (0..25)
            .map(|i| Vector3::new((i % 5) as f64, (i / 5) as f64, 0.0))
            .collect();
        let cell = NdtCell::from_points(&pts).unwrap();

        // Off-plane offsets are penalised far more than in-plane ones
        let normal = Vector3::z();
        let in_plane = Vector3::x();
        assert!(normal.dot(&(cell.inv_cov * normal)) > 50.0 * in_plane.dot(&(cell.inv_cov * in_plane)));

        let coincident = vec![Vector3::new(1.0, 1.0, 1.0); 8];
        assert!(NdtCell::from_points(&coincident).is_none());
    }

    #[test]
    fn test_displaced_corner() {
        let target = corner();

        // Vehicle displaced by (0.5, 0.3, 0)
        let source = target.transformed(&compose(0.0, 0.0, 0.0, -0.5, -0.3, 0.0));

        let ndt = Ndt::new(NdtParams::default(), &target).unwrap();
        let result = ndt.align(&source, &RigidTransform::identity(), 100);

        assert!(result.converged);

        let pose = decompose(&result.transform);
        assert_abs_diff_eq!(pose.position_m[0], 0.5, epsilon = 0.1);
        assert_abs_diff_eq!(pose.position_m[1], 0.3, epsilon = 0.1);
        assert_abs_diff_eq!(pose.position_m[2], 0.0, epsilon = 0.1);
        assert_abs_diff_eq!(pose.yaw_rad, 0.0, epsilon = 0.02);
    }

    #[test]
    fn test_no_overlap() {
        let target = corner();
        let source = target.transformed(&compose(0.0, 0.0, 0.0, 300.0, 0.0, 0.0));
        let seed = compose(0.1, 0.0, 0.0, 2.0, 1.0, 0.0);

        let ndt = Ndt::new(NdtParams::default(), &target).unwrap();
        let result = ndt.align(&source, &seed, 100);

        assert!(!result.converged);
        assert_eq!(result.transform, seed);
    }

    #[test]
    fn test_sparse_map() {
        let sparse: PointCloud = (0..5).map(|i| Point3::new(i as f64 * 10.0, 0.0, 0.0)).collect();
        assert!(matches!(
            Ndt::new(NdtParams::default(), &sparse),
            Err(RegError::NoUsableCells)
        ));
    }
}
