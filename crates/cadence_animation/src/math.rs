//! Numeric helpers shared by the timing code

/// Smallest duration the engine works with; zero-length timers use it instead of 0
pub const MIN_VALUE: f64 = 1e-11;

/// Stand-in for infinity in timing arithmetic
pub const MAX_VALUE: f64 = 1e12;

/// Milliseconds per second
pub const K: f64 = 1000.0;

/// Round half up to `decimals` places; `None` leaves the value untouched
#[inline]
pub fn round(value: f64, decimals: Option<i32>) -> f64 {
    match decimals {
        None => value,
        Some(0) => (value + 0.5).floor(),
        Some(d) => {
            let p = 10f64.powi(d);
            (value * p + 0.5).floor() / p
        }
    }
}

/// Round to a fixed number of places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    round(value, Some(decimals))
}

/// Clamp checked against `min` first; never panics on `min > max`
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

#[inline]
pub fn lerp(start: f64, end: f64, progress: f64) -> f64 {
    start + (end - start) * progress
}

/// Map infinite values onto [`MAX_VALUE`]
#[inline]
pub fn clamp_infinity(value: f64) -> f64 {
    if value == f64::INFINITY {
        MAX_VALUE
    } else if value == f64::NEG_INFINITY {
        -MAX_VALUE
    } else {
        value
    }
}

/// Normalize a user-supplied duration: at least [`MIN_VALUE`], finite, 11 decimals
#[inline]
pub fn normalize_time(value: f64) -> f64 {
    if value.is_nan() || value <= MIN_VALUE {
        MIN_VALUE
    } else {
        clamp_infinity(round_to(value, 11))
    }
}

/// Replace NaN by 0
#[inline]
pub(crate) fn or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -2.0);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round(1.23456, None), 1.23456);
    }

    #[test]
    fn test_clamp_prefers_min() {
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(11.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time(0.0), MIN_VALUE);
        assert_eq!(normalize_time(-5.0), MIN_VALUE);
        assert_eq!(normalize_time(f64::INFINITY), MAX_VALUE);
        assert_eq!(normalize_time(250.0), 250.0);
    }
}
