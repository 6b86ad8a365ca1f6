//! # Telecommand processor module
//!
//! The telecommand processor handles various TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use comms_if::tc::Tc;
use loc_lib::data_store::DataStore;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to different modules.
pub(crate) fn exec(ds: &mut DataStore, tc: &Tc) {

    // Handle different Tcs
    match tc {
        Tc::Drive(delta) => {
            debug!("Recieved Drive command: {:?}", delta);
            ds.drive_queue.push(*delta);
        },
        Tc::SetDriveMode(mode) => {
            debug!("Recieved SetDriveMode command: {:?}", mode);
            ds.set_drive_mode(*mode);
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

    #[test]
    fn test_exec() {
        let mut ds = DataStore::default();

        exec(&mut ds, &Tc::Drive(ControlState::new(0.1, 0.0, 0.0)));
        exec(&mut ds, &Tc::Drive(ControlState::new(0.2, 0.0, 0.0)));
        assert_eq!(ds.drive_queue.len(), 2);

        exec(&mut ds, &Tc::SetDriveMode(DriveMode::Auto));
        assert_eq!(ds.drive_mode, DriveMode::Auto);

        assert_eq!(
            ds.drive_queue.take_latest(),
            Some(ControlState::new(0.2, 0.0, 0.0))
        );
    }
}
