//! # Drive queue
//!
//! Manual drive deltas arrive between control ticks (from the operator or a script). They are
//! queued here and drained once per tick, only the most recent delta is applied.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use log::debug;

use comms_if::tc::drive::ControlState;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Queue of pending manual control deltas, cloneable between threads.
#[derive(Debug, Clone, Default)]
pub struct DriveQueue {
    pending: Arc<Mutex<Vec<ControlState>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new delta.
    pub fn push(&self, delta: ControlState) {
        match self.pending.lock() {
            Ok(mut q) => q.push(delta),
            Err(e) => e.into_inner().push(delta),
        }
    }

    /// Drain the queue, returning the most recently queued delta.
    pub fn take_latest(&self) -> Option<ControlState> {
        let mut q = match self.pending.lock() {
            Ok(q) => q,
            Err(e) => e.into_inner(),
        };

        if q.len() > 1 {
            debug!("Discarding {} superseded drive deltas", q.len() - 1);
        }

        let latest = q.last().copied();
        q.clear();
        latest
    }

    /// Number of deltas waiting.
    pub fn len(&self) -> usize {
        match self.pending.lock() {
            Ok(q) => q.len(),
            Err(e) => e.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_latest_wins() {
        let q = DriveQueue::new();
        assert_eq!(q.take_latest(), None);

        q.push(ControlState::new(0.1, 0.0, 0.0));
        q.push(ControlState::new(0.2, 0.1, 0.0));
        q.push(ControlState::new(-0.3, 0.0, 0.5));
        assert_eq!(q.len(), 3);

        assert_eq!(q.take_latest(), Some(ControlState::new(-0.3, 0.0, 0.5)));
        assert!(q.is_empty());
        assert_eq!(q.take_latest(), None);
    }

    #[test]
    fn test_shared_between_clones() {
        let q = DriveQueue::new();
        let producer = q.clone();

        std::thread::spawn(move || producer.push(ControlState::new(0.0, 0.4, 0.0)))
            .join()
            .unwrap();

        assert_eq!(q.take_latest(), Some(ControlState::new(0.0, 0.4, 0.0)));
    }
}
