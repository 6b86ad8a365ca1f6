//! # Synthetic simulation
//!
//! Stands in for the simulated world so that the localisation loop can be driven without an
//! external simulator. The simulation provides:
//!
//! - The reference map of the world - `map`.
//! - The true pose of the vehicle - `ground_truth`.
//! - Range sensor frames, published into a [`ScanBuffer`] from a background thread.
//!
//! Actuator demands are dispatched with `dispatch` and take effect on the next integration step
//! of the background thread, which runs in real time.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod world;

pub use params::SimParams;
pub use world::{build_map, visible_points, VehicleModel};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    f64::consts::PI,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error};

use crate::{
    loc::Pose,
    pcl::PointCloud,
    scan_buffer::{PushOutcome, ScanBuffer},
};
use comms_if::eqpt::{
    lidar::LidarFrame,
    vehicle::{ActuatorResponse, ActuatorState},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the running simulation. The background thread is stopped and joined on drop.
pub struct Sim {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    shared: Arc<Mutex<Shared>>,
    map: Arc<PointCloud>,
}

/// State shared between the front end and the background thread.
struct Shared {
    vehicle: VehicleModel,
    actuators: ActuatorState,
    num_frames: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Invalid simulation parameter {0}: {1}")]
    InvalidParam(&'static str, f64),

    #[error("Could not start the simulation thread: {0}")]
    ThreadError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Sim {
    /// Build the world and start publishing sensor frames into `buffer`.
    pub fn start(params: SimParams, buffer: Arc<ScanBuffer>) -> Result<Self, SimError> {
        params.validate()?;

        let map = Arc::new(build_map(&params));
        debug!("Synthetic map built with {} points", map.len());

        let shared = Arc::new(Mutex::new(Shared {
            vehicle: VehicleModel::new(&params),
            actuators: ActuatorState::default(),
            num_frames: 0,
        }));
        let bg_run = Arc::new(AtomicBool::new(true));

        let bg_run_clone = bg_run.clone();
        let shared_clone = shared.clone();
        let map_clone = map.clone();

        let bg_jh = thread::Builder::new()
            .name("sim".into())
            .spawn(move || bg_thread(params, map_clone, shared_clone, buffer, bg_run_clone))
            .map_err(SimError::ThreadError)?;

        Ok(Self {
            bg_jh: Some(bg_jh),
            bg_run,
            shared,
            map,
        })
    }

    /// The reference map of the world.
    pub fn map(&self) -> &PointCloud {
        &self.map
    }

    /// True pose of the sensor in the map frame.
    pub fn ground_truth(&self) -> Option<Pose> {
        self.shared.lock().ok().map(|s| s.vehicle.pose)
    }

    /// Current signed speed of the vehicle.
    pub fn speed_m_s(&self) -> Option<f64> {
        self.shared.lock().ok().map(|s| s.vehicle.speed_m_s)
    }

    /// Number of frames published so far.
    pub fn num_frames(&self) -> u64 {
        self.shared.lock().map(|s| s.num_frames).unwrap_or(0)
    }

    /// Send new actuator demands to the vehicle.
    pub fn dispatch(&self, actuators: &ActuatorState) -> ActuatorResponse {
        if !actuators.is_valid() {
            return ActuatorResponse::DemsInvalid;
        }

        match self.shared.lock() {
            Ok(mut s) => {
                s.actuators = *actuators;
                ActuatorResponse::DemsOk
            }
            Err(_) => ActuatorResponse::DemsInvalid,
        }
    }

    /// True while the background thread is running.
    pub fn is_running(&self) -> bool {
        self.bg_run.load(Ordering::Relaxed)
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("Simulation thread panicked");
            }
        }
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        self.stop()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, integrates the vehicle and publishes one sensor sector per frame.
fn bg_thread(
    params: SimParams,
    map: Arc<PointCloud>,
    shared: Arc<Mutex<Shared>>,
    buffer: Arc<ScanBuffer>,
    run: Arc<AtomicBool>,
) {
    let period = Duration::from_secs_f64(params.frame_period_s);
    let sector_rad = (2.0 * PI * params.sensor_rotation_hz * params.frame_period_s).min(2.0 * PI);
    let mut azimuth_rad = 0.0;

    while run.load(Ordering::Relaxed) {
        let frame_start = Instant::now();

        // Integrate and take a copy of the pose
        let pose = {
            let mut s = match shared.lock() {
                Ok(s) => s,
                Err(_) => {
                    error!("Simulation state lock poisoned, stopping");
                    break;
                }
            };
            let act = s.actuators;
            s.vehicle.step(&act, &params, params.frame_period_s);
            s.num_frames += 1;
            s.vehicle.pose
        };

        let points = visible_points(
            &map,
            &pose,
            params.sensor_range_m,
            azimuth_rad,
            sector_rad,
        );
        azimuth_rad = (azimuth_rad + sector_rad) % (2.0 * PI);

        match buffer.push_frame(&LidarFrame::now(points)) {
            Ok(PushOutcome::ScanReady) => debug!("Sim: scan complete"),
            Ok(_) => (),
            Err(e) => {
                error!("Could not publish sensor frame: {}", e);
                break;
            }
        }

        if let Some(d) = period.checked_sub(frame_start.elapsed()) {
            thread::sleep(d);
        }
    }

    run.store(false, Ordering::Relaxed);
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
