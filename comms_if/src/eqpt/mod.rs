//! # Equipment Interface
//!
//! This module defines the interface structures exchanged with equipment: points coming from the
//! range sensor and actuator demands going to the vehicle.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod lidar;
pub mod vehicle;
