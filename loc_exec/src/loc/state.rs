//! Localisation manager state
//!
//! The pose tracker. Each scan is downsampled, registered against the map seeded with the
//! current estimate, and on success replaces the estimate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Serialize;

use super::{ErrorStats, EvalParams, LocMgrParams, Pose, RigidTransform, Verdict};
use crate::pcl::{PclError, PointCloud, VoxelFilter};
use crate::reg::{self, RegError, RegStrategy, Registration};
use util::{module::State, params, session::Session};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Localisation manager, tracks the pose of the vehicle in the map.
#[derive(Default)]
pub struct LocMgr {
    inner: Option<Tracker>,
}

/// The configured tracker, only exists once the manager has been initialised.
struct Tracker {
    params: LocMgrParams,
    filter: VoxelFilter,
    reg: Box<dyn Registration>,
    track: TrackState,

    /// First ground truth seen, distances driven are measured from here
    origin: Option<Pose>,

    stats: ErrorStats,
}

/// Data required to initialise the manager.
pub struct InitData {
    /// Parameter file name, relative to the parameters directory
    pub params_file: &'static str,

    /// The reference map
    pub map: PointCloud,

    /// Pose to seed the first registration with
    pub initial_pose: Pose,
}

/// Input to one localisation cycle.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Raw scan in the sensor frame
    pub scan: PointCloud,

    /// Ground truth pose in the map frame, if known
    pub ground_truth: Option<Pose>,
}

/// Output of one localisation cycle.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    /// Current pose estimate
    pub estimate: Pose,

    /// True if this cycle's registration converged and updated the estimate
    pub updated: bool,

    /// The downsampled scan moved into the map frame by the registration, empty if the
    /// registration failed
    pub aligned_scan: PointCloud,

    /// Error statistics, if ground truth has been provided
    pub error_stats: Option<ErrorStats>,
}

/// Status report for localisation processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub strategy: Option<RegStrategy>,
    pub converged: bool,
    pub iterations: usize,
    pub fitness: f64,
    pub num_raw_points: usize,
    pub num_filtered_points: usize,
    pub pose_error_m: Option<f64>,

    /// Set on the cycle the session verdict changed
    pub new_verdict: Option<Verdict>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Tracking state of the manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackState {
    /// No registration has succeeded yet, the seed is the externally supplied initial pose
    Uninitialised { seed: Pose },

    /// At least one registration has succeeded
    Tracking { estimate: Pose },
}

#[derive(Debug, thiserror::Error)]
pub enum LocMgrError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Invalid voxel filter parameters: {0}")]
    PclError(PclError),

    #[error("Could not build the registration: {0}")]
    RegError(RegError),

    #[error("Invalid evaluation limits: {0:?}")]
    InvalidEvalParams(EvalParams),

    #[error("The reference map is empty")]
    EmptyMap,

    #[error("LocMgr has not been initialised")]
    NotInitialised,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrackState {
    /// The pose the next registration is seeded with.
    pub fn pose(&self) -> Pose {
        match self {
            TrackState::Uninitialised { seed } => *seed,
            TrackState::Tracking { estimate } => *estimate,
        }
    }
}

impl LocMgr {
    /// Build an initialised manager directly from parameters.
    pub fn with_params(
        params: LocMgrParams,
        map: &PointCloud,
        initial_pose: Pose,
    ) -> Result<Self, LocMgrError> {
        let filter = params.validate()?;

        if map.is_empty() {
            return Err(LocMgrError::EmptyMap);
        }

        let reg = reg::build(&params.reg, map).map_err(LocMgrError::RegError)?;

        info!(
            "LocMgr using {:?} against a map of {} points, seeded at ({:.2}, {:.2}, {:.2})",
            reg.strategy(),
            map.len(),
            initial_pose.position_m[0],
            initial_pose.position_m[1],
            initial_pose.position_m[2],
        );

        Ok(Self {
            inner: Some(Tracker {
                params,
                filter,
                reg,
                track: TrackState::Uninitialised { seed: initial_pose },
                origin: None,
                stats: ErrorStats::default(),
            }),
        })
    }

    /// Current tracking state, `None` if not initialised.
    pub fn track_state(&self) -> Option<TrackState> {
        self.inner.as_ref().map(|t| t.track)
    }

    /// Current error statistics, `None` if not initialised or no ground truth was ever given.
    pub fn error_stats(&self) -> Option<ErrorStats> {
        self.inner
            .as_ref()
            .and_then(|t| t.origin.map(|_| t.stats))
    }
}

impl State for LocMgr {
    type InitData = InitData;
    type InitError = LocMgrError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = LocMgrError;

    const NAME: &'static str = "LocMgr";

    /// Initialise the LocMgr module.
    ///
    /// Loads the parameters and preprocesses the map for the selected registration strategy.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: LocMgrParams = params::load(init_data.params_file)
            .map_err(LocMgrError::ParamLoadError)?;

        *self = Self::with_params(params, &init_data.map, init_data.initial_pose)?;

        Ok(())
    }

    /// Process one scan.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let tracker = self.inner.as_mut().ok_or(LocMgrError::NotInitialised)?;

        let mut report = StatusReport {
            strategy: Some(tracker.reg.strategy()),
            num_raw_points: input_data.scan.len(),
            ..Default::default()
        };

        // ---- PREPROCESSING ----

        let filtered = tracker.filter.filter(&input_data.scan);
        report.num_filtered_points = filtered.len();

        // ---- REGISTRATION ----

        let seed = RigidTransform::from_pose(&tracker.track.pose());
        let result = tracker.reg.align(&filtered, &seed, tracker.params.reg.max_iterations());

        report.converged = result.converged;
        report.iterations = result.iterations;
        report.fitness = result.fitness;

        let mut output = OutputData::default();

        if result.converged {
            let estimate = result.transform.to_pose();
            tracker.track = TrackState::Tracking { estimate };

            output.updated = true;
            output.aligned_scan = filtered.transformed(&result.transform);

            debug!(
                "Registration converged in {} iterations (fitness {:.4}), pose ({:.3}, {:.3}, \
                 {:.3}) yaw {:.3} rad",
                result.iterations,
                result.fitness,
                estimate.position_m[0],
                estimate.position_m[1],
                estimate.position_m[2],
                estimate.yaw_rad
            );

            // ---- EVALUATION ----

            if let Some(truth) = input_data.ground_truth {
                let origin = *tracker.origin.get_or_insert(truth);

                report.new_verdict =
                    tracker
                        .stats
                        .update(&estimate, &truth, &origin, &tracker.params.eval);
                report.pose_error_m = Some(tracker.stats.pose_error_m);

                if let Some(v) = report.new_verdict {
                    info!(
                        "Localisation verdict: {} (max error {:.3} m, distance {:.1} m)",
                        v, tracker.stats.max_pose_error_m, tracker.stats.distance_driven_m
                    );
                }
            }
        } else {
            warn!(
                "Registration did not converge after {} iterations ({} scan points), keeping the \
                 previous estimate",
                result.iterations,
                filtered.len()
            );
        }

        output.estimate = tracker.track.pose();
        output.error_stats = tracker.origin.map(|_| tracker.stats);

        Ok((output, report))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::compose;
    use crate::pcl::Point3;
    use crate::reg::{IcpParams, NdtParams, RegParams};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    fn lattice() -> PointCloud {
        (0..100)
            .map(|i| Point3::new((i % 10) as f64 * 2.5, (i / 10) as f64 * 2.5, 0.0))
            .collect()
    }

    fn icp_params() -> LocMgrParams {
        LocMgrParams {
            voxel_size_m: 0.5,
            reg: RegParams {
                strategy: RegStrategy::Icp,
                icp: IcpParams::default(),
                ndt: NdtParams::default(),
            },
            eval: EvalParams::default(),
        }
    }

    fn scan_from(map: &PointCloud, x: f64, y: f64) -> PointCloud {
        map.transformed(&compose(0.0, 0.0, 0.0, x, y, 0.0).inverse())
    }

    fn at(x: f64, y: f64) -> Pose {
        Pose::new(Vector3::new(x, y, 0.0), 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_not_initialised() {
        let mut loc = LocMgr::default();
        assert!(loc.track_state().is_none());
        assert!(matches!(
            loc.proc(&InputData::default()),
            Err(LocMgrError::NotInitialised)
        ));
    }

    #[test]
    fn test_tracking() {
        let map = lattice();
        let mut loc = LocMgr::with_params(icp_params(), &map, Pose::default()).unwrap();
        assert_eq!(
            loc.track_state(),
            Some(TrackState::Uninitialised { seed: Pose::default() })
        );

        let input = InputData {
            scan: scan_from(&map, 1.0, 0.0),
            ground_truth: Some(at(1.0, 0.0)),
        };
        let (out, report) = loc.proc(&input).unwrap();

        assert!(out.updated);
        assert!(report.converged);
        assert_eq!(report.num_raw_points, 100);
        assert_abs_diff_eq!(out.estimate.position_m[0], 1.0, epsilon = 1e-2);
        assert_eq!(out.aligned_scan.len(), report.num_filtered_points);
        assert!(matches!(loc.track_state(), Some(TrackState::Tracking { .. })));

        // Ground truth origin is the first ground truth seen
        let stats = out.error_stats.unwrap();
        assert_abs_diff_eq!(stats.distance_driven_m, 0.0, epsilon = 1e-12);
        assert!(stats.pose_error_m < 1e-2);

        // Seeded from the previous estimate, the next step is found from there
        let input = InputData {
            scan: scan_from(&map, 2.0, 0.5),
            ground_truth: Some(at(2.0, 0.5)),
        };
        let (out, _) = loc.proc(&input).unwrap();
        assert_abs_diff_eq!(out.estimate.position_m[0], 2.0, epsilon = 1e-2);
        assert_abs_diff_eq!(out.estimate.position_m[1], 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(
            out.error_stats.unwrap().distance_driven_m,
            (1.0f64 + 0.25).sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_failure_keeps_estimate() {
        let map = lattice();
        let seed = at(3.0, 2.0);
        let mut loc = LocMgr::with_params(icp_params(), &map, seed).unwrap();

        // Scan from somewhere unrelated to the map
        let far = InputData {
            scan: scan_from(&map, -400.0, 0.0),
            ground_truth: Some(at(0.0, 0.0)),
        };
        let (out, report) = loc.proc(&far).unwrap();

        assert!(!report.converged);
        assert!(!out.updated);
        assert!(out.aligned_scan.is_empty());
        assert_eq!(out.estimate, seed);
        assert_eq!(loc.track_state(), Some(TrackState::Uninitialised { seed }));
        assert!(out.error_stats.is_none());

        // Once tracking, a failure keeps the tracked estimate
        let good = InputData {
            scan: scan_from(&map, 3.5, 2.0),
            ground_truth: None,
        };
        let (out, _) = loc.proc(&good).unwrap();
        let estimate = out.estimate;
        assert_abs_diff_eq!(estimate.position_m[0], 3.5, epsilon = 1e-2);

        let (out, _) = loc.proc(&far).unwrap();
        assert_eq!(out.estimate, estimate);
        assert_eq!(loc.track_state(), Some(TrackState::Tracking { estimate }));
    }

    #[test]
    fn test_max_error_never_decreases() {
        let map = lattice();
        let mut loc = LocMgr::with_params(icp_params(), &map, Pose::default()).unwrap();

        // Ground truth deliberately offset from where the scans were taken
        let offsets = [0.4, 0.1, 0.6, 0.0, 0.3];
        let mut prev_max = 0.0;

        for (i, off) in offsets.iter().enumerate() {
            let x = 0.2 * i as f64;
            let input = InputData {
                scan: scan_from(&map, x, 0.0),
                ground_truth: Some(at(x, *off)),
            };
            let (out, _) = loc.proc(&input).unwrap();
            let stats = out.error_stats.unwrap();

            assert!(stats.max_pose_error_m >= prev_max);
            prev_max = stats.max_pose_error_m;
        }

        assert_abs_diff_eq!(prev_max, 0.6, epsilon = 1e-2);
    }

    #[test]
    fn test_invalid_config() {
        let mut params = icp_params();
        params.voxel_size_m = -1.0;
        assert!(matches!(
            LocMgr::with_params(params, &lattice(), Pose::default()),
            Err(LocMgrError::PclError(_))
        ));

        let mut params = icp_params();
        params.reg.icp.max_iterations = 0;
        assert!(matches!(
            LocMgr::with_params(params, &lattice(), Pose::default()),
            Err(LocMgrError::RegError(RegError::ZeroIterations))
        ));

        assert!(matches!(
            LocMgr::with_params(icp_params(), &PointCloud::default(), Pose::default()),
            Err(LocMgrError::EmptyMap)
        ));
    }
}
