//! # Trajectory control module
//!
//! Trajectory control keeps the vehicle on a straight reference line. The lateral error is the
//! signed distance between the vehicle's position and the line, positive when the vehicle is to
//! the left of the line. A PID controller drives the steer demand to remove this error while the
//! throttle is held at a cruise value.
//!
//! The output is a [`ControlState`](comms_if::tc::drive::ControlState), i.e. a change to the
//! current actuator state, so it passes through locomotion control exactly like a manual drive
//! command.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod pid;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::Params;
pub use pid::*;
pub use state::*;
