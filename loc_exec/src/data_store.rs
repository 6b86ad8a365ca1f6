//! # Data Store
//!
//! State owned by the control loop. Pose estimate, actuator state and error statistics are only
//! ever modified from the loop thread.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;

use crate::{
    drive_queue::DriveQueue,
    loc::{self, ErrorStats, LocSource, Pose},
    traj_ctrl,
};
use comms_if::{
    eqpt::vehicle::ActuatorState,
    tc::drive::{ControlState, DriveMode},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time
    pub sim_time_s: f64,

    /// Session time of the previous cycle, used for the controller time step
    pub last_cycle_time_s: Option<f64>,

    // Modes
    pub drive_mode: DriveMode,
    pub loc_source: Option<LocSource>,

    // Vehicle
    /// Current actuator demands, only changed through `loco_ctrl::apply`
    pub actuators: ActuatorState,

    /// Manual deltas waiting to be applied
    pub drive_queue: DriveQueue,

    /// Delta applied to the actuators this cycle, if any
    pub control_delta: Option<ControlState>,

    /// Ground truth from the simulation
    pub ground_truth: Option<Pose>,

    /// Age of the scan processed this cycle
    pub scan_age_s: f64,

    // LocMgr
    pub loc_mgr: loc::LocMgr,

    /// Output of the latest localisation cycle, kept across cycles
    pub loc_mgr_output: loc::OutputData,
    pub loc_mgr_status_rpt: loc::StatusReport,

    // TrajCtrl
    pub traj_ctrl: traj_ctrl::TrajCtrl,
    pub traj_ctrl_status_rpt: Option<traj_ctrl::StatusReport>,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive registrations which did not converge
    pub num_consec_reg_failures: u64,
}

/// Telemetry of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Telemetry {
    pub num_cycles: u64,
    pub sim_time_s: f64,
    pub drive_mode: DriveMode,
    pub estimate: Pose,
    pub ground_truth: Option<Pose>,
    pub actuators: ActuatorState,
    pub scan_age_s: f64,
    pub loc: loc::StatusReport,
    pub error_stats: Option<ErrorStats>,
    pub traj_ctrl: Option<traj_ctrl::StatusReport>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Change the drive mode, logging if it changed.
    pub fn set_drive_mode(&mut self, mode: DriveMode) {
        if self.drive_mode != mode {
            info!("Drive mode changed from {:?} to {:?}", self.drive_mode, mode);
            self.drive_mode = mode;
        }
    }

    /// The pose trajectory control follows, depending on the localisation source.
    pub fn control_pose(&self) -> Option<Pose> {
        match self.loc_source {
            Some(LocSource::GroundTruth) => self.ground_truth,
            Some(LocSource::ScanMatching) => Some(self.loc_mgr_output.estimate),
            None => None,
        }
    }

    /// Time elapsed since the previous cycle, zero on the first cycle.
    pub fn cycle_dt_s(&self) -> f64 {
        match self.last_cycle_time_s {
            Some(t) => (self.sim_time_s - t).max(0.0),
            None => 0.0,
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, sim_time_s: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.loc_mgr_status_rpt = loc::StatusReport::default();
        self.traj_ctrl_status_rpt = None;
        self.control_delta = None;

        if self.num_cycles > 0 {
            self.last_cycle_time_s = Some(self.sim_time_s);
        }
        self.sim_time_s = sim_time_s;
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }

    /// Build the telemetry for this cycle.
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            num_cycles: self.num_cycles as u64,
            sim_time_s: self.sim_time_s,
            drive_mode: self.drive_mode,
            estimate: self.loc_mgr_output.estimate,
            ground_truth: self.ground_truth,
            actuators: self.actuators,
            scan_age_s: self.scan_age_s,
            loc: self.loc_mgr_status_rpt,
            error_stats: self.loc_mgr_output.error_stats,
            traj_ctrl: self.traj_ctrl_status_rpt,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_cycle_timing() {
        let mut ds = DataStore::default();

        ds.cycle_start(10.0, 0.0);
        assert!(ds.is_1_hz_cycle);
        assert_eq!(ds.cycle_dt_s(), 0.0);
        ds.cycle_end();

        ds.cycle_start(10.0, 0.25);
        assert!(!ds.is_1_hz_cycle);
        assert!((ds.cycle_dt_s() - 0.25).abs() < 1e-12);
        ds.cycle_end();

        for _ in 0..8 {
            ds.cycle_start(10.0, 0.5);
            ds.cycle_end();
        }
        ds.cycle_start(10.0, 1.0);
        assert!(ds.is_1_hz_cycle);
    }

    #[test]
    fn test_control_pose() {
        let mut ds = DataStore::default();
        let truth = Pose::new(Vector3::new(1.0, 2.0, 0.0), 0.3, 0.0, 0.0);
        ds.ground_truth = Some(truth);

        assert_eq!(ds.control_pose(), None);

        ds.loc_source = Some(LocSource::GroundTruth);
        assert_eq!(ds.control_pose(), Some(truth));

        ds.loc_source = Some(LocSource::ScanMatching);
        assert_eq!(ds.control_pose(), Some(Pose::default()));
    }

    #[test]
    fn test_telemetry_json() {
        let mut ds = DataStore::default();
        ds.set_drive_mode(DriveMode::Auto);

        let json = serde_json::to_string(&ds.telemetry()).unwrap();
        assert!(json.contains("\"drive_mode\":\"Auto\""));
        assert!(json.contains("\"error_stats\":null"));
    }
}
