//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands come from an operator's input device or from a
//! drive script, and are encoded as JSON.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Drive telecommands
pub mod drive;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// Internal
use drive::{ControlState, DriveMode};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the vehicle by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Apply a throttle/steer/brake delta to the actuators.
    Drive(ControlState),

    /// Change where drive demands come from.
    SetDriveMode(DriveMode),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        let tc = Tc::from_json(
            r#"{"Drive": {"throttle_delta": 0.1, "steer_delta": -0.02}}"#
        ).unwrap();

        assert_eq!(tc, Tc::Drive(ControlState::new(0.1, -0.02, 0.0)));

        let tc = Tc::from_json(r#"{"SetDriveMode": "Auto"}"#).unwrap();
        assert_eq!(tc, Tc::SetDriveMode(DriveMode::Auto));

        assert!(Tc::from_json(r#"{"Fly": 1.0}"#).is_err());
        assert!(Tc::from_json("not json").is_err());
    }
}
