//! Synthetic world: the reference map, the vehicle model and the range sensor model.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;

use nalgebra::Vector3;

use super::SimParams;
use crate::{
    loc::{Pose, RigidTransform},
    pcl::{Point3, PointCloud},
};
use comms_if::eqpt::{lidar::LidarPoint, vehicle::ActuatorState};
use util::maths::{rem_euclid, wrap_pi};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The floor is sampled this many times coarser than the walls.
const FLOOR_PITCH_FACTOR: f64 = 4.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Kinematic bicycle model of the vehicle.
#[derive(Debug, Copy, Clone)]
pub struct VehicleModel {
    /// Pose of the sensor in the map frame
    pub pose: Pose,

    /// Signed forward speed
    pub speed_m_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehicleModel {
    /// Place the vehicle at its starting pose, at rest.
    pub fn new(params: &SimParams) -> Self {
        Self {
            pose: Pose::new(
                Vector3::new(
                    params.start_position_m[0],
                    params.start_position_m[1],
                    params.sensor_height_m,
                ),
                params.start_heading_rad,
                0.0,
                0.0,
            ),
            speed_m_s: 0.0,
        }
    }

    /// Integrate the model over `dt_s` under the given actuator demands.
    pub fn step(&mut self, act: &ActuatorState, params: &SimParams, dt_s: f64) {
        if dt_s <= 0.0 {
            return;
        }

        // First order response towards the throttle's speed
        let target = act.signed_throttle() * params.max_speed_m_s;
        let alpha = (dt_s / params.speed_time_const_s).min(1.0);
        self.speed_m_s += (target - self.speed_m_s) * alpha;

        let decel = act.brake * params.max_brake_decel_m_s2 * dt_s;
        if self.speed_m_s.abs() <= decel {
            self.speed_m_s = 0.0;
        } else {
            self.speed_m_s -= decel * self.speed_m_s.signum();
        }

        let steer_angle = act.steer * params.max_steer_angle_rad;
        let yaw_rate = self.speed_m_s / params.wheelbase_m * steer_angle.tan();

        self.pose.yaw_rad = wrap_pi(self.pose.yaw_rad + yaw_rate * dt_s);
        self.pose.position_m[0] += self.speed_m_s * self.pose.yaw_rad.cos() * dt_s;
        self.pose.position_m[1] += self.speed_m_s * self.pose.yaw_rad.sin() * dt_s;
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the reference map: a straight corridor along X with a floor, two walls and staggered
/// square pillars.
pub fn build_map(params: &SimParams) -> PointCloud {
    let pitch = params.map_pitch_m;
    let hw = params.corridor_half_width_m;
    let mut map = PointCloud::new(Vec::new());

    // Walls
    for x in steps(0.0, params.corridor_length_m, pitch) {
        for z in steps(0.0, params.wall_height_m, pitch) {
            map.push(Point3::new(x, hw, z));
            map.push(Point3::new(x, -hw, z));
        }
    }

    // Floor
    let floor_pitch = pitch * FLOOR_PITCH_FACTOR;
    for x in steps(0.0, params.corridor_length_m, floor_pitch) {
        for y in steps(-hw, hw, floor_pitch) {
            map.push(Point3::new(x, y, 0.0));
        }
    }

    // Pillars, left and right sides offset by half the spacing
    let half = 0.5 * params.pillar_size_m;
    let mut centre_x = 0.5 * params.pillar_spacing_m;
    let mut left = true;
    while centre_x < params.corridor_length_m {
        let cy = if left {
            params.pillar_offset_m
        } else {
            -params.pillar_offset_m
        };

        for t in steps(-half, half, pitch) {
            for z in steps(0.0, params.wall_height_m, pitch) {
                map.push(Point3::new(centre_x + t, cy - half, z));
                map.push(Point3::new(centre_x + t, cy + half, z));
                map.push(Point3::new(centre_x - half, cy + t, z));
                map.push(Point3::new(centre_x + half, cy + t, z));
            }
        }

        centre_x += 0.5 * params.pillar_spacing_m;
        left = !left;
    }

    map
}

/// Map points seen by a sensor at `pose`, expressed in the sensor frame.
///
/// Only points within `range_m` whose azimuth lies in the sector starting at `az_start_rad` and
/// spanning `az_width_rad` are returned.
pub fn visible_points(
    map: &PointCloud,
    pose: &Pose,
    range_m: f64,
    az_start_rad: f64,
    az_width_rad: f64,
) -> Vec<LidarPoint> {
    let map_to_sensor = RigidTransform::from_pose(pose).inverse();
    let range_sq = range_m * range_m;
    let full_turn = az_width_rad >= 2.0 * PI;

    map.iter()
        .filter(|p| (p.coords - pose.position_m).norm_squared() <= range_sq)
        .map(|p| map_to_sensor.transform_point(p))
        .filter(|p| {
            full_turn || {
                let rel = rem_euclid(p.y.atan2(p.x) - az_start_rad, 2.0 * PI);
                rel < az_width_rad
            }
        })
        .map(|p| LidarPoint::new(p.x, p.y, p.z))
        .collect()
}

/// Evenly spaced values from `start` to `end` inclusive.
fn steps(start: f64, end: f64, pitch: f64) -> impl Iterator<Item = f64> {
    let n = ((end - start) / pitch).round().max(0.0) as usize;
    (0..=n).map(move |i| start + i as f64 * pitch)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_map_extent() {
        let params = SimParams {
            corridor_length_m: 20.0,
            ..Default::default()
        };
        let map = build_map(&params);

        assert!(!map.is_empty());
        assert!(map
            .iter()
            .all(|p| p.y.abs() <= params.corridor_half_width_m + 1e-9));
        assert!(map.iter().all(|p| p.x >= -1e-9 && p.x <= 20.0 + 1e-9));
        assert!(map.iter().any(|p| p.y == params.corridor_half_width_m));
        assert!(map.iter().any(|p| p.z == 0.0 && p.y == 0.0));

        // One pillar on each side within 20 m
        assert!(map.iter().any(|p| (p.y - 3.5).abs() < 1e-9 && (p.x - 7.5).abs() < 1e-9));
        assert!(map.iter().any(|p| (p.y + 3.5).abs() < 1e-9 && (p.x - 15.0).abs() < 1e-9));
    }

    #[test]
    fn test_straight_drive() {
        let params = SimParams::default();
        let mut v = VehicleModel::new(&params);
        let act = ActuatorState {
            throttle: 0.5,
            ..Default::default()
        };

        for _ in 0..1000 {
            v.step(&act, &params, 0.01);
        }

        assert!(v.speed_m_s > 4.0 && v.speed_m_s <= 5.0);
        assert!(v.pose.position_m[0] > params.start_position_m[0] + 20.0);
        assert_abs_diff_eq!(v.pose.position_m[1], 0.0);
        assert_abs_diff_eq!(v.pose.position_m[2], params.sensor_height_m);
    }

    #[test]
    fn test_steer_and_reverse() {
        let params = SimParams::default();

        let mut v = VehicleModel::new(&params);
        let act = ActuatorState {
            throttle: 0.3,
            steer: 0.2,
            ..Default::default()
        };
        for _ in 0..100 {
            v.step(&act, &params, 0.01);
        }
        // Positive steer turns left
        assert!(v.pose.yaw_rad > 0.0);
        assert!(v.pose.position_m[1] > 0.0);

        let mut v = VehicleModel::new(&params);
        let act = ActuatorState {
            throttle: 0.3,
            reverse: true,
            ..Default::default()
        };
        for _ in 0..100 {
            v.step(&act, &params, 0.01);
        }
        assert!(v.speed_m_s < 0.0);
        assert!(v.pose.position_m[0] < params.start_position_m[0]);
    }

    #[test]
    fn test_brake_stops() {
        let params = SimParams::default();
        let mut v = VehicleModel::new(&params);
        v.speed_m_s = 5.0;

        let act = ActuatorState {
            brake: 1.0,
            ..Default::default()
        };
        for _ in 0..200 {
            v.step(&act, &params, 0.01);
        }

        assert_eq!(v.speed_m_s, 0.0);
    }

    #[test]
    fn test_visible_points_in_sensor_frame() {
        let params = SimParams {
            corridor_length_m: 100.0,
            ..Default::default()
        };
        let map = build_map(&params);
        let pose = Pose::new(Vector3::new(50.0, 0.0, 1.8), 0.0, 0.0, 0.0);

        let all = visible_points(&map, &pose, 30.0, 0.0, 2.0 * PI);
        assert!(!all.is_empty());
        assert!(all.iter().all(|p| p.range_sq() <= 900.0 + 1e-6));

        // Left wall point directly abeam
        assert!(all
            .iter()
            .any(|p| p.x.abs() < 1e-9 && (p.y - 6.0).abs() < 1e-9 && (p.z + 1.8).abs() < 1e-9));

        // Front quarter only
        let front = visible_points(&map, &pose, 30.0, -PI / 4.0, PI / 2.0);
        assert!(!front.is_empty());
        assert!(front.len() < all.len());
        assert!(front.iter().all(|p| p.x >= 0.0 && p.y.abs() <= p.x + 1e-9));
    }
}
