//! Localisation error statistics
//!
//! Accumulated over a session by comparing the scan matching estimate against ground truth.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::Pose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Limits the session is evaluated against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalParams {
    /// The session fails once the pose error has exceeded this
    pub max_pose_error_m: f64,

    /// The session passes once the vehicle is this far from its start
    pub target_distance_m: f64,
}

/// Error statistics of the localisation.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ErrorStats {
    /// Planar distance between the estimate and ground truth on the latest update
    pub pose_error_m: f64,

    /// Largest pose error seen so far. Never decreases.
    pub max_pose_error_m: f64,

    /// Planar distance of the ground truth from the session origin on the latest update
    pub distance_driven_m: f64,

    /// Current verdict
    pub verdict: Verdict,

    /// Number of updates
    pub num_updates: u64,

    /// Set once the target distance has been reached
    #[serde(skip)]
    target_reached: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    InProgress,
    Passed,
    Failed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ErrorStats {
    /// Update the statistics with a new estimate.
    ///
    /// `ground_truth` and `origin` are both in the map frame. Returns the new verdict if it has
    /// changed.
    pub fn update(
        &mut self,
        estimate: &Pose,
        ground_truth: &Pose,
        origin: &Pose,
        limits: &EvalParams,
    ) -> Option<Verdict> {
        self.pose_error_m = estimate.planar_distance(ground_truth);
        self.max_pose_error_m = self.max_pose_error_m.max(self.pose_error_m);

        let relative = *ground_truth - *origin;
        self.distance_driven_m = relative.position_m.xy().norm();
        self.num_updates += 1;

        if self.distance_driven_m >= limits.target_distance_m {
            self.target_reached = true;
        }

        let verdict = if self.max_pose_error_m > limits.max_pose_error_m {
            Verdict::Failed
        } else if self.target_reached {
            Verdict::Passed
        } else {
            Verdict::InProgress
        };

        if verdict != self.verdict {
            self.verdict = verdict;
            Some(verdict)
        } else {
            None
        }
    }
}

impl EvalParams {
    pub fn is_valid(&self) -> bool {
        self.max_pose_error_m > 0.0 && self.target_distance_m > 0.0
    }
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            max_pose_error_m: 1.2,
            target_distance_m: 170.0,
        }
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::InProgress
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::InProgress => write!(f, "In progress"),
            Verdict::Passed => write!(f, "Passed!"),
            Verdict::Failed => write!(f, "Try Again"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    fn at(x: f64, y: f64) -> Pose {
        Pose::new(Vector3::new(x, y, 0.0), 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_max_error_monotonic() {
        let mut stats = ErrorStats::default();
        let limits = EvalParams::default();
        let origin = at(0.0, 0.0);

        let errors = [0.3, 0.1, 0.5, 0.2, 0.0, 0.45];
        let mut prev_max = 0.0;

        for (i, err) in errors.iter().enumerate() {
            let truth = at(i as f64, 0.0);
            let estimate = at(i as f64, *err);
            stats.update(&estimate, &truth, &origin, &limits);

            assert!(stats.max_pose_error_m >= prev_max);
            assert!((stats.pose_error_m - err).abs() < 1e-12);
            prev_max = stats.max_pose_error_m;
        }

        assert!((stats.max_pose_error_m - 0.5).abs() < 1e-12);
        assert_eq!(stats.num_updates, errors.len() as u64);
    }

    #[test]
    fn test_distance_from_origin() {
        let mut stats = ErrorStats::default();
        let origin = at(10.0, 10.0);

        stats.update(&at(13.0, 14.0), &at(13.0, 14.0), &origin, &EvalParams::default());
        assert!((stats.distance_driven_m - 5.0).abs() < 1e-12);

        // Recomputed rather than accumulated
        stats.update(&at(10.0, 11.0), &at(10.0, 11.0), &origin, &EvalParams::default());
        assert!((stats.distance_driven_m - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_verdict() {
        let limits = EvalParams {
            max_pose_error_m: 1.0,
            target_distance_m: 10.0,
        };
        let origin = at(0.0, 0.0);

        let mut stats = ErrorStats::default();
        assert_eq!(stats.update(&at(5.0, 0.2), &at(5.0, 0.0), &origin, &limits), None);
        assert_eq!(
            stats.update(&at(10.0, 0.2), &at(10.0, 0.0), &origin, &limits),
            Some(Verdict::Passed)
        );
        // Passing is kept when the vehicle turns back
        assert_eq!(stats.update(&at(9.0, 0.2), &at(9.0, 0.0), &origin, &limits), None);
        assert_eq!(stats.verdict, Verdict::Passed);

        // A large error fails the session for good
        assert_eq!(
            stats.update(&at(9.0, 1.5), &at(9.0, 0.0), &origin, &limits),
            Some(Verdict::Failed)
        );
        assert_eq!(stats.update(&at(12.0, 0.0), &at(12.0, 0.0), &origin, &limits), None);
        assert_eq!(stats.verdict, Verdict::Failed);
        assert_eq!(format!("{}", stats.verdict), "Try Again");
    }
}
