//! Session management
//!
//! A session spans a single execution of an executable. Nothing is persisted
//! past the end of the session, the session only provides the common epoch
//! which log timestamps and scripts are measured from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::info;
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Timestamp part of the session ID.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A struct storing information about the current session
#[derive(Clone, Debug)]
pub struct Session {
    /// Name of the executable that owns this session
    pub exec_name: String,

    /// Unique identifier of the session, `{exec_name}_{timestamp}`
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(
        "Cannot initialise the session epoch, have you already initialised the\
         session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session.
    ///
    /// Only one session may be started per process.
    pub fn new(exec_name: &str) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        let timestamp = get_epoch()?.format(TIMESTAMP_FORMAT);

        Ok(Session {
            exec_name: exec_name.to_string(),
            session_id: format!("{}_{}", exec_name, timestamp),
        })
    }

    /// Exit the session.
    pub fn exit(self) {
        info!(
            "Session {} ended after {:.03} s",
            self.session_id,
            get_elapsed_seconds()
        );
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// If the session has not been started yet this returns `0.0`, so that
/// library code (and its tests) can run without a session.
pub fn get_elapsed_seconds() -> f64 {
    SESSION_EPOCH
        .get()
        .map(|e| time::duration_to_seconds(Utc::now() - *e).unwrap_or(std::f64::NAN))
        .unwrap_or(0.0)
}

/// Return a reference to the session's epoch, set when the session is created.
pub fn get_epoch() -> Result<&'static DateTime<Utc>, SessionError> {
    SESSION_EPOCH.get().ok_or(SessionError::CannotGetEpoch)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
