//! # Drive script interpreter module
//!
//! This module provides an interpreter for drive scripts, allowing
//! telecommands to be executed at fixed times after the start of the session.
//!
//! A script contains one command per line, in the form `<time_s>: <tc_json>;`,
//! for example:
//!
//! ```text
//! 0.5: {"Drive": {"throttle_delta": 0.1}};
//! 4.0: {"SetDriveMode": "Auto"};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use comms_if::tc::{Tc, TcParseError};
use crate::session::get_elapsed_seconds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug)]
pub struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The Telecommand to run
    tc: Tc
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_tcs` to acquire a list of telecommands that need executing.
#[derive(Debug)]
pub struct ScriptInterpreter {
    script_path: PathBuf,
    cmds: VecDeque<Command>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script timestamps must be increasing, found {1} s after {0} s")]
    TimestampOrder(f64, f64),

    #[error("Script contains an invalid TC at {0} s: {1}")]
    InvalidTc(f64, TcParseError),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error)
}

#[derive(Debug, PartialEq)]
pub enum PendingTcs {
    None,
    Some(Vec<Tc>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut interpreter = Self::parse(&script)?;
        interpreter.script_path = path;

        Ok(interpreter)
    }

    /// Create a new interpreter from the script's contents.
    pub fn parse(script: &str) -> Result<Self, ScriptError> {

        let mut tc_queue: VecDeque<Command> = VecDeque::new();

        // Each command is `time: payload;` at the start of a line
        let re = RegexBuilder::
            new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            let exec_time_s: f64 = cap[1]
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if let Some(prev) = tc_queue.back() {
                if exec_time_s < prev.exec_time_s {
                    return Err(ScriptError::TimestampOrder(
                        prev.exec_time_s,
                        exec_time_s
                    ))
                }
            }

            let tc = Tc::from_json(&cap[3])
                .map_err(|e| ScriptError::InvalidTc(exec_time_s, e))?;

            tc_queue.push_back(Command {
                exec_time_s,
                tc
            });
        }

        if tc_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            script_path: PathBuf::new(),
            cmds: tc_queue
        })
    }

    /// Return the TCs which are due at the current session time.
    pub fn get_pending_tcs(&mut self) -> PendingTcs {
        self.get_pending_tcs_at(get_elapsed_seconds())
    }

    /// Return the TCs which are due at the given time since the start of the
    /// script.
    pub fn get_pending_tcs_at(&mut self, current_time_s: f64) -> PendingTcs {

        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.cmds.is_empty() {
            return PendingTcs::EndOfScript
        }

        let mut tc_vec: Vec<Tc> = vec![];

        // Pop from the front while the head is due
        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s > current_time_s {
                break;
            }

            if let Some(cmd) = self.cmds.pop_front() {
                tc_vec.push(cmd.tc);
            }
        }

        if tc_vec.is_empty() {
            PendingTcs::None
        }
        else {
            PendingTcs::Some(tc_vec)
        }
    }

    /// Get the path the script was loaded from, empty if loaded from a string
    pub fn get_script_path(&self) -> &Path {
        &self.script_path
    }

    /// Get the number of TCs remaining in the script
    pub fn get_num_tcs(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::drive::{ControlState, DriveMode};

    const SCRIPT: &str = r#"
        0.5: {"Drive": {"throttle_delta": 0.1}};
        0.5: {"Drive": {"steer_delta": 0.02}};
        2.0: {"SetDriveMode": "Auto"};
    "#;

    #[test]
    fn test_pending_tcs() {
        let mut si = ScriptInterpreter::parse(SCRIPT).unwrap();

        assert_eq!(si.get_num_tcs(), 3);
        assert_eq!(si.get_duration(), 2.0);

        assert_eq!(si.get_pending_tcs_at(0.1), PendingTcs::None);
        assert_eq!(
            si.get_pending_tcs_at(1.0),
            PendingTcs::Some(vec![
                Tc::Drive(ControlState::new(0.1, 0.0, 0.0)),
                Tc::Drive(ControlState::new(0.0, 0.02, 0.0)),
            ])
        );
        assert_eq!(
            si.get_pending_tcs_at(5.0),
            PendingTcs::Some(vec![Tc::SetDriveMode(DriveMode::Auto)])
        );
        assert_eq!(si.get_pending_tcs_at(6.0), PendingTcs::EndOfScript);
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::parse("# nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::parse(r#"1.0: {"Jump": 2};"#),
            Err(ScriptError::InvalidTc(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::parse(
                "2.0: {\"SetDriveMode\": \"Auto\"};\n1.0: {\"SetDriveMode\": \"Manual\"};"
            ),
            Err(ScriptError::TimestampOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::new("/no/such/script.lps"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
