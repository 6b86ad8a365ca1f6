//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Lateral controller proportional gain
    pub lat_k_p: f64,

    /// Lateral controller integral gain
    pub lat_k_i: f64,

    /// Lateral controller derivative gain
    pub lat_k_d: f64,

    /// Steer demand maximum limit
    pub max_steer_dem: f64,

    /// Steer demand minimum limit
    pub min_steer_dem: f64,

    /// A point on the reference line, in the map frame
    pub ref_line_point_m: [f64; 2],

    /// Heading of the reference line in the map frame
    pub ref_line_heading_rad: f64,

    /// Throttle held while following the line
    pub cruise_throttle: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters which cannot be checked by the PID controller itself.
    pub fn cruise_throttle_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.cruise_throttle)
    }

    /// Check the steer limits lie inside the actuator range.
    pub fn steer_limits_valid(&self) -> bool {
        self.min_steer_dem >= -1.0 && self.max_steer_dem <= 1.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_shipped_params() {
        let p: Params = util::params::load_from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/traj_ctrl.toml"
        ))
        .unwrap();

        assert!(p.cruise_throttle_valid());
        assert!(p.steer_limits_valid());
        assert!(p.min_steer_dem <= p.max_steer_dem);
    }
}
