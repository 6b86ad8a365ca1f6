//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Vector2, Vector3};
use serde::Serialize;

// Internal
use super::{Params, PidController, PidError};
use crate::loc::Pose;
use comms_if::{eqpt::vehicle::ActuatorState, tc::drive::ControlState};
use util::{maths::wrap_pi, module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control, follows the reference line.
#[derive(Default)]
pub struct TrajCtrl {
    params: Option<Params>,

    /// Lateral error controller, its output is the steer demand
    lat_ctrl: PidController,
}

/// Input data to trajectory control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Pose to control, from localisation or ground truth
    pub pose: Pose,

    /// Current actuator state
    pub actuators: ActuatorState,

    /// Time since the previous call
    pub dt_s: f64,
}

/// The status report containing various error flags and monitoring quantities.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// The lateral error to the reference line
    pub lat_error_m: f64,

    /// The heading error to the reference line
    pub head_error_rad: f64,

    /// Steer demand output by the lateral controller
    pub steer_dem: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Invalid controller configuration: {0}")]
    PidError(PidError),

    #[error("Steer limits must lie inside [-1, 1]")]
    InvalidSteerLimits,

    #[error("Cruise throttle must lie inside [0, 1], found {0}")]
    InvalidCruiseThrottle(f64),

    #[error("TrajCtrl has not been initialised")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajCtrl {
    /// Build an initialised module directly from parameters.
    pub fn with_params(params: Params) -> Result<Self, TrajCtrlError> {
        if !params.steer_limits_valid() {
            return Err(TrajCtrlError::InvalidSteerLimits);
        }
        if !params.cruise_throttle_valid() {
            return Err(TrajCtrlError::InvalidCruiseThrottle(params.cruise_throttle));
        }

        let lat_ctrl = PidController::new(
            params.lat_k_p,
            params.lat_k_i,
            params.lat_k_d,
            params.max_steer_dem,
            params.min_steer_dem,
        )
        .map_err(TrajCtrlError::PidError)?;

        Ok(Self {
            params: Some(params),
            lat_ctrl,
        })
    }

    /// Unit vector along the reference line.
    fn line_direction(params: &Params) -> Vector2<f64> {
        Vector2::new(
            params.ref_line_heading_rad.cos(),
            params.ref_line_heading_rad.sin(),
        )
    }

    /// Calculate the lateral error to the reference line.
    ///
    /// Lateral error will be positive if the vehicle is to the "left" of the line, and negative
    /// if it's to the right (following right hand rule).
    pub fn calc_lat_error(params: &Params, pose: &Pose) -> f64 {
        let dir = Self::line_direction(params);
        let rel = Vector2::new(
            pose.position_m[0] - params.ref_line_point_m[0],
            pose.position_m[1] - params.ref_line_point_m[1],
        );

        // Z component of the cross product of the line direction and the offset
        Vector3::new(dir[0], dir[1], 0.0).cross(&Vector3::new(rel[0], rel[1], 0.0))[2]
    }

    /// Calculate the heading error to the reference line, positive if the vehicle points to the
    /// left of the line.
    pub fn calc_head_error(params: &Params, pose: &Pose) -> f64 {
        wrap_pi(pose.get_heading() - params.ref_line_heading_rad)
    }
}

impl State for TrajCtrl {
    type InitData = &'static str;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = ControlState;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    const NAME: &'static str = "TrajCtrl";

    /// Intiailise the TrajCtrl module.
    ///
    /// Expected init data is a path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(init_data).map_err(TrajCtrlError::ParamLoadError)?;

        *self = Self::with_params(params)?;

        Ok(())
    }

    /// Process trajectory control.
    ///
    /// Produces the change to the actuator state which moves the steer to the controller's
    /// demand and holds the throttle at the cruise value.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let params = self.params.as_ref().ok_or(TrajCtrlError::NotInitialised)?;

        let lat_error_m = Self::calc_lat_error(params, &input_data.pose);
        let head_error_rad = Self::calc_head_error(params, &input_data.pose);

        // Being left of the line needs a right (negative) steer, so the error is negated
        self.lat_ctrl
            .update_delta_time(input_data.dt_s)
            .map_err(TrajCtrlError::PidError)?;
        self.lat_ctrl.update_error(-lat_error_m);
        let steer_dem = self.lat_ctrl.total_error();

        let act = &input_data.actuators;

        // A positive throttle delta out of reverse engages forward gear at exactly the delta,
        // while in forward gear it adds to the current throttle. The throttle is never reduced
        // here since a negative delta would select reverse.
        let throttle_delta = if act.reverse {
            params.cruise_throttle
        } else {
            (params.cruise_throttle - act.throttle).max(0.0)
        };

        let cmd = ControlState::new(throttle_delta, steer_dem - act.steer, 0.0);

        trace!(
            "TrajCtrl: lat {:.3} m, head {:.3} rad, steer dem {:.3}",
            lat_error_m,
            head_error_rad,
            steer_dem
        );

        Ok((
            cmd,
            StatusReport {
                lat_error_m,
                head_error_rad,
                steer_dem,
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
