//! # Locomotion control module
//!
//! Maps a [`ControlState`] (a change requested by the operator or by trajectory control) onto the
//! vehicle's [`ActuatorState`]. The mapping is a pure state transition, the previous state is not
//! modified.
//!
//! The throttle is unsigned with a separate reverse flag, so a throttle delta in the opposite
//! direction of travel switches gear and becomes the new throttle rather than being subtracted.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use comms_if::{eqpt::vehicle::ActuatorState, tc::drive::ControlState};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply a control delta to the actuator state, returning the new state.
pub fn apply(delta: &ControlState, state: &ActuatorState) -> ActuatorState {
    let mut next = *state;

    let dt = delta.throttle_delta;

    if dt > 0.0 {
        if state.reverse {
            // Switch to forward gear
            next.reverse = false;
            next.throttle = dt.min(1.0);
        } else {
            next.throttle = (state.throttle + dt).min(1.0);
        }
    } else if dt < 0.0 {
        if state.reverse {
            next.throttle = (state.throttle + dt.abs()).min(1.0);
        } else {
            // Switch to reverse gear
            next.reverse = true;
            next.throttle = dt.abs().min(1.0);
        }
    }

    next.steer = clamp(state.steer + delta.steer_delta, -1.0, 1.0);
    next.brake = clamp(delta.brake, 0.0, 1.0);

    if next.reverse != state.reverse {
        trace!(
            "LocoCtrl: gear change to {}",
            if next.reverse { "reverse" } else { "forward" }
        );
    }

    next
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn state(throttle: f64, steer: f64, reverse: bool) -> ActuatorState {
        ActuatorState {
            throttle,
            steer,
            brake: 0.0,
            reverse,
        }
    }

    #[test]
    fn test_gear_changes() {
        let s = state(0.5, 0.0, false);

        let s = apply(&ControlState::new(-0.3, 0.0, 0.0), &s);
        assert_abs_diff_eq!(s.throttle, 0.3);
        assert!(s.reverse);

        let s = apply(&ControlState::new(0.2, 0.0, 0.0), &s);
        assert_abs_diff_eq!(s.throttle, 0.2);
        assert!(!s.reverse);
    }

    #[test]
    fn test_same_direction_accumulates() {
        let s = apply(&ControlState::new(0.3, 0.0, 0.0), &state(0.5, 0.0, false));
        assert_abs_diff_eq!(s.throttle, 0.8);
        assert!(!s.reverse);

        let s = apply(&ControlState::new(-0.3, 0.0, 0.0), &state(0.4, 0.0, true));
        assert_abs_diff_eq!(s.throttle, 0.7);
        assert!(s.reverse);

        // Saturation in both gears
        let s = apply(&ControlState::new(0.9, 0.0, 0.0), &state(0.5, 0.0, false));
        assert_eq!(s.throttle, 1.0);
        let s = apply(&ControlState::new(-2.0, 0.0, 0.0), &state(0.5, 0.0, false));
        assert_eq!(s.throttle, 1.0);
        assert!(s.reverse);
    }

    #[test]
    fn test_zero_throttle_unchanged() {
        let before = state(0.6, 0.1, true);
        let after = apply(&ControlState::new(0.0, 0.0, 0.0), &before);

        assert_eq!(after, before);
    }

    #[test]
    fn test_steer_and_brake() {
        let s = apply(&ControlState::new(0.0, 0.5, 0.4), &state(0.2, 0.8, false));
        assert_eq!(s.steer, 1.0);
        assert_eq!(s.brake, 0.4);

        let s = apply(&ControlState::new(0.0, -0.3, 0.0), &s);
        assert_abs_diff_eq!(s.steer, 0.7);
        // Brake is overwritten rather than accumulated
        assert_eq!(s.brake, 0.0);

        let s = apply(&ControlState::new(0.0, -5.0, 3.0), &s);
        assert_eq!(s.steer, -1.0);
        assert_eq!(s.brake, 1.0);
    }

    #[test]
    fn test_output_always_valid() {
        let mut s = ActuatorState::default();

        for i in 0..200 {
            let f = i as f64;
            let delta = ControlState::new(
                (f * 0.7).sin() * 1.5,
                (f * 0.3).cos() * 0.8,
                (f * 0.11).sin() * 2.0,
            );
            s = apply(&delta, &s);
            assert!(s.is_valid(), "invalid state {:?}", s);
        }
    }
}
