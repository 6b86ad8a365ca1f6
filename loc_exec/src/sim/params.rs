//! Synthetic world parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::SimError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the synthetic world, vehicle and sensor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    // ---- WORLD ----
    /// Length of the corridor along the map X axis
    pub corridor_length_m: f64,

    /// Distance from the centre line to each wall
    pub corridor_half_width_m: f64,

    pub wall_height_m: f64,

    /// Sample spacing of the map surfaces
    pub map_pitch_m: f64,

    /// Distance between pillars along the corridor
    pub pillar_spacing_m: f64,

    /// Edge length of the square pillars
    pub pillar_size_m: f64,

    /// Distance from the centre line to the pillar centres
    pub pillar_offset_m: f64,

    // ---- VEHICLE ----
    /// Starting position of the vehicle in the map XY plane
    pub start_position_m: [f64; 2],

    pub start_heading_rad: f64,

    pub wheelbase_m: f64,

    /// Steer angle at full steer demand
    pub max_steer_angle_rad: f64,

    /// Speed reached at full throttle
    pub max_speed_m_s: f64,

    /// Time constant of the speed response to throttle
    pub speed_time_const_s: f64,

    /// Deceleration at full brake
    pub max_brake_decel_m_s2: f64,

    // ---- SENSOR ----
    /// Height of the sensor above the floor
    pub sensor_height_m: f64,

    /// Maximum range of the sensor
    pub sensor_range_m: f64,

    /// Rotation rate of the sensor head
    pub sensor_rotation_hz: f64,

    /// Time between two published frames
    pub frame_period_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimParams {
    pub fn validate(&self) -> Result<(), SimError> {
        let positive = [
            ("corridor_length_m", self.corridor_length_m),
            ("corridor_half_width_m", self.corridor_half_width_m),
            ("wall_height_m", self.wall_height_m),
            ("map_pitch_m", self.map_pitch_m),
            ("pillar_spacing_m", self.pillar_spacing_m),
            ("pillar_size_m", self.pillar_size_m),
            ("wheelbase_m", self.wheelbase_m),
            ("max_speed_m_s", self.max_speed_m_s),
            ("speed_time_const_s", self.speed_time_const_s),
            ("sensor_range_m", self.sensor_range_m),
            ("sensor_rotation_hz", self.sensor_rotation_hz),
            ("frame_period_s", self.frame_period_s),
        ];

        for (name, value) in positive.iter() {
            if !(*value > 0.0 && value.is_finite()) {
                return Err(SimError::InvalidParam(*name, *value));
            }
        }

        if !(self.pillar_offset_m.abs() + 0.5 * self.pillar_size_m < self.corridor_half_width_m) {
            return Err(SimError::InvalidParam(
                "pillar_offset_m",
                self.pillar_offset_m,
            ));
        }

        Ok(())
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            corridor_length_m: 200.0,
            corridor_half_width_m: 6.0,
            wall_height_m: 3.0,
            map_pitch_m: 0.25,
            pillar_spacing_m: 15.0,
            pillar_size_m: 1.0,
            pillar_offset_m: 4.0,
            start_position_m: [5.0, 0.0],
            start_heading_rad: 0.0,
            wheelbase_m: 2.9,
            max_steer_angle_rad: std::f64::consts::FRAC_PI_4,
            max_speed_m_s: 10.0,
            speed_time_const_s: 2.0,
            max_brake_decel_m_s2: 8.0,
            sensor_height_m: 1.8,
            sensor_range_m: 30.0,
            sensor_rotation_hz: 10.0,
            frame_period_s: 0.01,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(SimParams::default().validate().is_ok());

        let p = SimParams {
            map_pitch_m: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(SimError::InvalidParam("map_pitch_m", _))
        ));

        let p = SimParams {
            pillar_offset_m: 5.8,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_shipped_params() {
        let p: SimParams = util::params::load_from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/sim.toml"
        ))
        .unwrap();

        assert!(p.validate().is_ok());
    }
}
