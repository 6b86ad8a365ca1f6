//! # Drive telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A change to apply to the vehicle's actuators on one tick.
///
/// Throttle and steer are deltas added to the current actuator state, brake is an absolute
/// demand which replaces the current one.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ControlState {
    /// Change in throttle.
    ///
    /// Positive values drive forwards, negative values drive backwards. Changing the sign with
    /// respect to the current direction switches gear.
    #[serde(default)]
    pub throttle_delta: f64,

    /// Change in steer. Positive values steer to the left.
    #[serde(default)]
    pub steer_delta: f64,

    /// Brake demand in `[0, 1]`.
    #[serde(default)]
    pub brake: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Source of drive demands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveMode {
    /// Demands come from queued drive telecommands.
    Manual,

    /// Demands come from trajectory control following the reference line.
    Auto,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlState {
    pub fn new(throttle_delta: f64, steer_delta: f64, brake: f64) -> Self {
        Self {
            throttle_delta,
            steer_delta,
            brake,
        }
    }
}

impl Default for DriveMode {
    fn default() -> Self {
        DriveMode::Manual
    }
}
