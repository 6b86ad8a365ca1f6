//! Logger setup
//!
//! Every line carries the session-elapsed time and a level tag. Lines logged from a thread other
//! than the main one (e.g. the sensor thread) are tagged with the thread name so the two sides of
//! the scan hand-off can be told apart.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info};
use std::thread;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must be at least as verbose as `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Logs are only written to stdout, nothing is kept once the session ends.
///
/// # Notes
///
/// - `min_level` must be `Info` or more verbose, warnings from the registration are otherwise
///   the only thing left in the log.
/// - Must only be called once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    fern::Dispatch::new()
        .format(|out, message, record| {
            let thread = thread::current();
            let thread_tag = match thread.name() {
                Some("main") | None => String::new(),
                Some(n) => format!(" {}", n.cyan()),
            };

            // Debug and trace lines also name the module they come from
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}{}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    thread_tag,
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{:10.6} {}{}] {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    thread_tag,
                    message
                ))
            }
        })
        .level(min_level)
        .chain(std::io::stdout())
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session: {}", session.session_id);
    if let Ok(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info => "INF".normal(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
