//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Floor a f64 and clamp it to the u64 range, returning 0 for non-finite or negative values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    let clamped = value.min(max).floor();
    cast::<f64, u64>(clamped).unwrap_or(u64::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// Convert u32 to f64 losslessly.
#[must_use]
pub fn u32_to_f64(value: u32) -> f64 {
    f64::from(value)
}

/// Milliseconds as f64 rounded down to whole u64 milliseconds.
#[must_use]
pub fn millis_from_f64(value: f64) -> u64 {
    floor_f64_to_u64(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_non_finite_and_negative() {
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(-3.5), 0);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), 0);
        assert_eq!(floor_f64_to_u64(337.5), 337);
    }

    #[test]
    fn floor_saturates_at_u64_max() {
        assert_eq!(floor_f64_to_u64(1.0e30), u64::MAX);
    }

    #[test]
    fn widening_conversions() {
        assert!((u64_to_f64(150) - 150.0).abs() < f64::EPSILON);
        assert!((u32_to_f64(7) - 7.0).abs() < f64::EPSILON);
        assert_eq!(millis_from_f64(1333.9), 1333);
    }
}
