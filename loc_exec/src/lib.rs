//! # Localisation library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to access items defined
//! inside the localisation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Data store - state owned by the control loop
pub mod data_store;

/// Drive queue - manual drive deltas waiting for the next tick
pub mod drive_queue;

/// Localisation module - provides the vehicle with an idea of where it is in the map
pub mod loc;

/// Locomotion control module - maps control deltas onto the actuator state
pub mod loco_ctrl;

/// Executable parameters
pub mod params;

/// Point cloud module - point clouds and scan downsampling
pub mod pcl;

/// Registration module - aligns scans to the reference map
pub mod reg;

/// Scan buffer - hands scans from the sensor thread to the control loop
pub mod scan_buffer;

/// Synthetic simulation - provides the map, ground truth and sensor frames
pub mod sim;

/// Trajectory control module - keeps the vehicle on the reference line
pub mod traj_ctrl;
