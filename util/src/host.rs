//! Host platform utility functions

use std::path::PathBuf;
use thiserror::Error;

/// Name of the environment variable pointing at the software root directory.
///
/// The root directory contains the `params` and `scripts` directories.
pub const SW_ROOT_ENV_VAR: &str = "SCAN_LOC_SW_ROOT";

/// Errors when querying the host environment.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable ({}) is not set", SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("The software root ({0:?}) is not a directory")]
    SwRootNotDir(PathBuf)
}

/// Get the path to the software root directory.
pub fn get_sw_root() -> Result<PathBuf, HostError> {
    let root = match std::env::var_os(SW_ROOT_ENV_VAR) {
        Some(r) => PathBuf::from(r),
        None => return Err(HostError::SwRootNotSet)
    };

    if !root.is_dir() {
        return Err(HostError::SwRootNotDir(root))
    }

    Ok(root)
}
