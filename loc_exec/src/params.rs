//! # Localisation Executable Parameters
//!
//! This module provides parameters for the localisation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::loc::{LocSource, Pose};
use comms_if::tc::drive::DriveMode;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LocExecParams {
    /// Tick interval of the control loop, also the polling interval of the scan wait
    pub cycle_period_s: f64,

    /// A scan is complete once it holds more points than this
    pub scan_threshold: usize,

    /// Sensor points with a squared range at or below this are discarded
    pub min_range_sq_m2: f64,

    /// Give up waiting for a scan after this long
    pub scan_timeout_s: f64,

    /// Drive mode at startup
    #[serde(default)]
    pub drive_mode: DriveMode,

    /// Pose fed to trajectory control
    pub loc_source: LocSource,

    /// Pose the first registration is seeded with, taken from ground truth when not given
    #[serde(default)]
    pub initial_pose: Option<Pose>,

    /// Emit a JSON telemetry line every this many ticks, 0 to disable
    #[serde(default)]
    pub telemetry_every: u64,

    /// End the run once the localisation verdict is decided
    #[serde(default)]
    pub stop_on_verdict: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocExecParamsError {
    #[error("The cycle period must be positive, found {0}")]
    InvalidCyclePeriod(f64),

    #[error("The scan threshold must be greater than zero")]
    ZeroScanThreshold,

    #[error("The minimum sensor range must be non-negative, found {0}")]
    InvalidMinRange(f64),

    #[error("The scan timeout must be at least one cycle period, found {0}")]
    InvalidScanTimeout(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocExecParams {
    pub fn validate(&self) -> Result<(), LocExecParamsError> {
        if !(self.cycle_period_s > 0.0 && self.cycle_period_s.is_finite()) {
            return Err(LocExecParamsError::InvalidCyclePeriod(self.cycle_period_s));
        }
        if self.scan_threshold == 0 {
            return Err(LocExecParamsError::ZeroScanThreshold);
        }
        if !(self.min_range_sq_m2 >= 0.0 && self.min_range_sq_m2.is_finite()) {
            return Err(LocExecParamsError::InvalidMinRange(self.min_range_sq_m2));
        }
        if !(self.scan_timeout_s >= self.cycle_period_s && self.scan_timeout_s.is_finite()) {
            return Err(LocExecParamsError::InvalidScanTimeout(self.scan_timeout_s));
        }

        Ok(())
    }
}
