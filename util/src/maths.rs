//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Saturate a value into the range `[min, max]`.
///
/// Unlike `f64::clamp` this does not panic if `min > max`, in which case
/// `min` wins. Callers validate their bounds at configuration time.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Wrap an angle into the range `(-pi, pi]`.
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t: T = pi_t + pi_t;

    let wrapped = rem_euclid(angle + pi_t, tau_t) - pi_t;

    // rem_euclid maps to [-pi, pi), move the lower bound onto +pi
    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_wrap_pi() {
        assert_eq!(wrap_pi(0f64), 0f64);
        assert_eq!(wrap_pi(PI), PI);
        assert_eq!(wrap_pi(-PI), PI);
        assert!((wrap_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(-5.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(1.0 + 4.0 * PI) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);
    }
}
