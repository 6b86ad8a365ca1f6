//! # Communications interface crate.
//!
//! Provides the interface types exchanged between the localisation core and
//! its collaborators: the range sensor, the vehicle and the operator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands - instructions sent to the vehicle by an operator or a script
pub mod tc;

/// Data and demand definitions for equipment (sensor and vehicle)
pub mod eqpt;
