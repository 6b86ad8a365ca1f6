//! Main localisation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Wait for the next complete scan
//!         - Telecommand processing and handling
//!         - Localisation processing:
//!             - Scan downsampling
//!             - Registration against the map
//!             - Error statistics against ground truth
//!         - Trajectory control processing (Auto mode) or manual delta (Manual mode)
//!         - Locomotion control processing
//!         - Actuator dispatch
//!
//! # Modules
//!
//! All cyclic modules (e.g. `loc`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::{eqpt::vehicle::ActuatorResponse, tc::drive::DriveMode};
use loc_lib::{
    data_store::DataStore,
    loc::{self, Verdict},
    loco_ctrl,
    params::LocExecParams,
    pcl::PointCloud,
    scan_buffer::ScanBuffer,
    sim::{Sim, SimParams},
    traj_ctrl,
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Warn after this many consecutive registrations fail to converge.
const MAX_CONSEC_REG_FAILURES: u64 = 5;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("loc_exec").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Scan Matching Localisation Executable\n");
    info!("Session: {}\n", session.session_id);

    // ---- LOAD PARAMETERS ----

    let exec_params: LocExecParams =
        util::params::load("loc_exec.toml").wrap_err("Could not load exec params")?;
    exec_params
        .validate()
        .wrap_err("Invalid exec parameters")?;

    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    info!("Exec parameters loaded");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let cycle_frequency_hz = 1.0 / exec_params.cycle_period_s;
    let scan_timeout = Duration::from_secs_f64(exec_params.scan_timeout_s);

    // ---- INITIALISE TC SOURCE ----

    // TC source is used to determine whether we're getting TCs from a script or not at all.
    let mut tc_source = TcSource::None;

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    // If we have a single argument use it as the script path
    if args.len() == 2 {
        info!("Loading script from \"{}\"", &args[1]);

        // Load the script interpreter
        let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

        // Display some info
        info!(
            "Loaded script lasts {:.02} s and contains {} TCs\n",
            si.get_duration(),
            si.get_num_tcs()
        );

        // Set the interpreter in the source
        tc_source = TcSource::Script(si);
    } else if args.len() == 1 {
        info!("No script provided, the vehicle is only driven in Auto mode\n");
    } else {
        return Err(eyre!(
            "Expected either zero or one argument, found {}",
            args.len() - 1
        ));
    }

    // ---- SHUTDOWN HANDLER ----

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .wrap_err("Failed to set the Ctrl-C handler")?;
    }

    // ---- INITIALISE SIMULATION ----

    let scan_buffer = Arc::new(
        ScanBuffer::new(exec_params.scan_threshold, exec_params.min_range_sq_m2)
            .wrap_err("Failed to create the scan buffer")?,
    );

    let mut sim =
        Sim::start(sim_params, scan_buffer.clone()).wrap_err("Failed to start the simulation")?;
    info!("Simulation started, map contains {} points", sim.map().len());

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();
    ds.drive_mode = exec_params.drive_mode;
    ds.loc_source = Some(exec_params.loc_source);

    // ---- INITIALISE MODULES ----

    let initial_pose = match exec_params.initial_pose {
        Some(p) => p,
        None => sim
            .ground_truth()
            .ok_or_else(|| eyre!("No initial pose given and no ground truth available"))?,
    };

    ds.loc_mgr
        .init(
            loc::InitData {
                params_file: "loc_mgr.toml",
                map: sim.map().clone(),
                initial_pose,
            },
            &session,
        )
        .wrap_err("Failed to initialise LocMgr")?;
    info!("LocMgr init complete");

    ds.traj_ctrl
        .init("traj_ctrl.toml", &session)
        .wrap_err("Failed to initialise TrajCtrl")?;
    info!("TrajCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // ---- DATA INPUT ----

        // Block until the sensor has completed a scan
        let scan = match scan_buffer
            .wait_scan(cycle_period, scan_timeout, &stop)
            .wrap_err("Failed to acquire a scan")?
        {
            Some(s) => s,
            None => {
                info!("Stop requested");
                break;
            }
        };

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz, session::get_elapsed_seconds());

        ds.scan_age_s = chrono::Utc::now()
            .signed_duration_since(scan.timestamp)
            .num_milliseconds() as f64
            * 0.001;

        ds.ground_truth = sim.ground_truth();

        // ---- TELECOMMAND PROCESSING ----

        if let TcSource::Script(ref mut si) = tc_source {
            match si.get_pending_tcs() {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        tc_processor::exec(&mut ds, tc);
                    }
                }
                // Drop the script once it's over, the loop keeps going
                PendingTcs::EndOfScript => {
                    info!("End of TC script reached");
                    tc_source = TcSource::None;
                }
            }
        }

        // ---- LOCALISATION PROCESSING ----

        let loc_input = loc::InputData {
            scan: PointCloud::from(scan.points.as_slice()),
            ground_truth: ds.ground_truth,
        };

        match ds.loc_mgr.proc(&loc_input) {
            Ok((o, r)) => {
                if r.converged {
                    ds.num_consec_reg_failures = 0;
                } else {
                    ds.num_consec_reg_failures += 1;

                    if ds.num_consec_reg_failures == MAX_CONSEC_REG_FAILURES {
                        warn!(
                            "{} consecutive registrations failed to converge",
                            ds.num_consec_reg_failures
                        );
                    }
                }

                ds.loc_mgr_output = o;
                ds.loc_mgr_status_rpt = r;
            }
            Err(e) => warn!("Error during LocMgr processing: {}", e),
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        // Manual deltas are drained on every tick, but only applied in Manual mode
        let manual_delta = ds.drive_queue.take_latest();

        ds.control_delta = match ds.drive_mode {
            DriveMode::Manual => manual_delta,
            DriveMode::Auto => match ds.control_pose() {
                Some(pose) => {
                    let input = traj_ctrl::InputData {
                        pose,
                        actuators: ds.actuators,
                        dt_s: ds.cycle_dt_s(),
                    };

                    match ds.traj_ctrl.proc(&input) {
                        Ok((cmd, r)) => {
                            ds.traj_ctrl_status_rpt = Some(r);
                            Some(cmd)
                        }
                        Err(e) => {
                            warn!("Error during TrajCtrl processing: {}", e);
                            None
                        }
                    }
                }
                None => {
                    warn!("No pose available for TrajCtrl");
                    None
                }
            },
        };

        // LocoCtrl processing, the actuator state is left alone when there is no delta
        if let Some(delta) = ds.control_delta {
            ds.actuators = loco_ctrl::apply(&delta, &ds.actuators);

            match sim.dispatch(&ds.actuators) {
                ActuatorResponse::DemsOk => (),
                r => warn!("Recieved non-nominal response from the vehicle: {:?}", r),
            }
        }

        // ---- TELEMETRY ----

        if ds.is_1_hz_cycle {
            let e = ds.loc_mgr_output.estimate;
            match ds.loc_mgr_output.error_stats {
                Some(stats) => info!(
                    "Pose ({:.2}, {:.2}) yaw {:.3} rad, error {:.3} m (max {:.3} m), \
                     driven {:.1} m, scan age {:.3} s",
                    e.position_m[0],
                    e.position_m[1],
                    e.yaw_rad,
                    stats.pose_error_m,
                    stats.max_pose_error_m,
                    stats.distance_driven_m,
                    ds.scan_age_s
                ),
                None => info!(
                    "Pose ({:.2}, {:.2}) yaw {:.3} rad, scan age {:.3} s",
                    e.position_m[0], e.position_m[1], e.yaw_rad, ds.scan_age_s
                ),
            }
        }

        if exec_params.telemetry_every > 0
            && ds.num_cycles % (exec_params.telemetry_every as u128) == 0
        {
            match serde_json::to_string(&ds.telemetry()) {
                Ok(s) => info!("TM: {}", s),
                Err(e) => warn!("Could not serialise telemetry: {}", e),
            }
        }

        if exec_params.stop_on_verdict {
            if let Some(stats) = ds.loc_mgr_output.error_stats {
                if stats.verdict != Verdict::InProgress {
                    info!("Localisation verdict decided ({}), stopping", stats.verdict);
                    break;
                }
            }
        }

        if !sim.is_running() {
            warn!("Simulation stopped unexpectedly");
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        ds.cycle_end();
    }

    // ---- SHUTDOWN ----

    sim.stop();

    match ds.loc_mgr.error_stats() {
        Some(stats) => info!(
            "Final localisation verdict: {} (max error {:.3} m over {:.1} m, {} updates)",
            stats.verdict, stats.max_pose_error_m, stats.distance_driven_m, stats.num_updates
        ),
        None => info!("No error statistics were collected"),
    }

    info!("End of execution");
    session.exit();

    Ok(())
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    None,
    Script(ScriptInterpreter),
}
