//! # PID controller
//!
//! A feedback controller on a scalar error with a saturated output.
//!
//! The time step is set explicitly with [`PidController::update_delta_time`] before each error
//! update, so the controller can be driven from simulated as well as wall clock time. The
//! integral term is not limited, only the output is.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone, Default)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Upper output limit
    output_max: f64,

    /// Lower output limit
    output_min: f64,

    /// Time step used by the next error update
    delta_time_s: f64,

    /// Proportional error, the latest error passed in
    p_error: f64,

    /// Derivative of the error over the last step
    d_error: f64,

    /// The integral accumulation
    i_error: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PidError {
    #[error("The minimum output ({0}) is greater than the maximum output ({1})")]
    InvalidOutputLimits(f64, f64),

    #[error("Gains and limits must be finite")]
    NonFiniteParam,

    #[error("The time step must be finite and non-negative, found {0}")]
    InvalidDeltaTime(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains and output limits.
    pub fn new(
        k_p: f64,
        k_i: f64,
        k_d: f64,
        output_max: f64,
        output_min: f64,
    ) -> Result<Self, PidError> {
        let mut pid = Self::default();
        pid.configure(k_p, k_i, k_d, output_max, output_min)?;
        Ok(pid)
    }

    /// Set the gains and output limits, resetting all error terms and the time step.
    ///
    /// On error the controller is left unchanged.
    pub fn configure(
        &mut self,
        k_p: f64,
        k_i: f64,
        k_d: f64,
        output_max: f64,
        output_min: f64,
    ) -> Result<(), PidError> {
        if ![k_p, k_i, k_d, output_max, output_min]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(PidError::NonFiniteParam);
        }
        if output_min > output_max {
            return Err(PidError::InvalidOutputLimits(output_min, output_max));
        }

        *self = Self {
            k_p,
            k_i,
            k_d,
            output_max,
            output_min,
            ..Default::default()
        };

        Ok(())
    }

    /// Set the time step used by the following error updates.
    ///
    /// A negative or non-finite step is rejected and the previous step is kept.
    pub fn update_delta_time(&mut self, delta_time_s: f64) -> Result<(), PidError> {
        if !(delta_time_s >= 0.0 && delta_time_s.is_finite()) {
            return Err(PidError::InvalidDeltaTime(delta_time_s));
        }

        self.delta_time_s = delta_time_s;
        Ok(())
    }

    /// Feed a new error into the controller.
    ///
    /// With a zero time step the derivative is zero and the integral does not change.
    pub fn update_error(&mut self, cte: f64) {
        self.d_error = if self.delta_time_s != 0.0 {
            (cte - self.p_error) / self.delta_time_s
        } else {
            0.0
        };
        self.i_error += cte * self.delta_time_s;
        self.p_error = cte;
    }

    /// The controller output, saturated into the output limits.
    pub fn total_error(&self) -> f64 {
        let out = self.k_p * self.p_error + self.k_d * self.d_error + self.k_i * self.i_error;

        clamp(out, self.output_min, self.output_max)
    }

    /// The accumulated integral of the error.
    pub fn integral(&self) -> f64 {
        self.i_error
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional_saturation() {
        let mut pid = PidController::default();
        pid.configure(1.0, 0.0, 0.0, 1.0, -1.0).unwrap();
        pid.update_delta_time(1.0).unwrap();
        pid.update_error(2.0);

        assert_eq!(pid.total_error(), 1.0);
    }

    #[test]
    fn test_terms() {
        let mut pid = PidController::new(0.5, 0.1, 2.0, 100.0, -100.0).unwrap();

        pid.update_delta_time(0.5).unwrap();
        pid.update_error(1.0);
        // p = 1, d = 1 / 0.5, i = 0.5
        assert!((pid.total_error() - (0.5 + 4.0 + 0.05)).abs() < 1e-12);

        pid.update_error(0.0);
        // p = 0, d = -2, i = 0.5
        assert!((pid.total_error() - (-4.0 + 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_dt() {
        let mut pid = PidController::new(1.0, 1.0, 1.0, 10.0, -10.0).unwrap();
        pid.update_error(3.0);

        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.total_error(), 3.0);
    }

    #[test]
    fn test_negative_dt_rejected() {
        let mut pid = PidController::new(1.0, 1.0, 1.0, 10.0, -10.0).unwrap();
        pid.update_delta_time(0.5).unwrap();
        pid.update_error(1.0);

        assert!(matches!(
            pid.update_delta_time(-0.5),
            Err(PidError::InvalidDeltaTime(_))
        ));
        assert!(pid.update_delta_time(f64::NAN).is_err());

        // The previous step is still in use
        pid.update_error(2.0);
        assert_eq!(pid.integral(), 1.5);
        assert_eq!(pid.total_error(), 2.0 + 1.5 + 2.0);
    }

    #[test]
    fn test_output_bounded() {
        let mut pid = PidController::new(3.0, 0.7, 0.4, 0.25, -0.5).unwrap();

        for i in 0..500 {
            let f = i as f64;
            pid.update_delta_time(0.01 + (f * 0.37).sin().abs() * 0.2).unwrap();
            pid.update_error((f * 0.13).sin() * 50.0 + (f * 1.7).cos() * 5.0);

            let out = pid.total_error();
            assert!((-0.5..=0.25).contains(&out), "output {} out of bounds", out);
        }
    }

    #[test]
    fn test_no_anti_windup() {
        let mut pid = PidController::new(0.0, 1.0, 0.0, 1.0, -1.0).unwrap();
        pid.update_delta_time(1.0).unwrap();

        for _ in 0..10 {
            pid.update_error(1.0);
        }
        assert_eq!(pid.integral(), 10.0);

        // The wound up integral keeps the output saturated after the error reverses
        pid.update_error(-1.0);
        assert_eq!(pid.total_error(), 1.0);
    }

    #[test]
    fn test_configure() {
        let mut pid = PidController::new(1.0, 1.0, 1.0, 1.0, -1.0).unwrap();
        pid.update_delta_time(1.0).unwrap();
        pid.update_error(0.5);

        assert!(matches!(
            pid.configure(1.0, 0.0, 0.0, -1.0, 1.0),
            Err(PidError::InvalidOutputLimits(_, _))
        ));
        // Rejected configuration leaves the state alone
        assert_eq!(pid.integral(), 0.5);

        assert!(pid.configure(1.0, 0.0, 0.0, 1.0, 1.0).is_ok());
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.total_error(), 1.0);

        assert!(PidController::new(f64::NAN, 0.0, 0.0, 1.0, -1.0).is_err());
    }
}
