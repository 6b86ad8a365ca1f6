//! # Vehicle Equipment Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Actuator demands dispatched to the vehicle.
///
/// The state is owned by the control loop and only changed through locomotion control, which
/// keeps every field inside its range.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActuatorState {
    /// Throttle demand, in the range `[0, 1]`. The direction is given by `reverse`.
    pub throttle: f64,

    /// Steer demand, in the range `[-1, 1]`. Positive steers to the left.
    pub steer: f64,

    /// Brake demand, in the range `[0, 1]`.
    pub brake: f64,

    /// If true the gearbox is in reverse.
    pub reverse: bool,
}

/// Response from the vehicle to a set of demands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorResponse {
    /// Demands were valid and will be executed
    DemsOk,

    /// Demands were invalid and have been rejected
    DemsInvalid,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActuatorState {
    /// Check that every demand lies inside its range.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.throttle)
            && (-1.0..=1.0).contains(&self.steer)
            && (0.0..=1.0).contains(&self.brake)
    }

    /// Signed throttle, negative when in reverse.
    pub fn signed_throttle(&self) -> f64 {
        if self.reverse {
            -self.throttle
        } else {
            self.throttle
        }
    }
}
