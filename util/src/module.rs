//! Module interfaces
//!
//! Cyclic modules of `loc_exec` (localisation, trajectory control) are driven
//! by the control loop through the [`State`] trait: initialised once at
//! startup, then processed once per tick.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A cyclic module driven by the control loop.
pub trait State {
    /// Data required during initialisation, usually a parameter file name.
    type InitData;
    /// Raised when the module cannot be configured. This is fatal.
    type InitError;

    /// Data consumed on each tick.
    type InputData;
    /// Data produced on each tick.
    type OutputData;
    /// Monitoring quantities for the tick, sent to telemetry.
    type StatusReport;
    /// Raised when a tick cannot be processed.
    type ProcError;

    /// Short name of the module, used in log messages.
    const NAME: &'static str;

    /// Configure the module.
    ///
    /// Invalid configuration must be rejected here rather than at the first
    /// call to `proc`.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Process one tick of the module.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
