//! Auxiliary constants and helper functions.
//!
//! This module provides numerical constants and utility functions for
//! common operations used in hazard and deaggregation calculations.

/// Fraction of a total below which a deaggregation bin is folded into the
/// "trace" total instead of being reported individually (0.01%).
pub const TRACE_LIMIT: f64 = 0.0001;

/// Check if two floating-point numbers are approximately equal within a given tolerance (epsilon).
///
/// # Arguments
///
/// * `a` - First floating-point value.
/// * `b` - Second floating-point value.
/// * `epsilon` - Maximum allowed difference between `a` and `b` for them to be considered equal.
///
/// # Returns
///
/// `true` if the absolute difference between `a` and `b` is less than `epsilon`, `false` otherwise.
///
/// # Examples
///
/// ```
/// use seismic_hazard_lib::auxilary::approx_equal;
/// assert!(approx_equal(1.00001, 1.00002, 0.0001));
/// ```
pub fn approx_equal(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Round a floating-point number to a specified number of decimal places.
///
/// # Arguments
///
/// * `val` - The floating-point value to round.
/// * `places` - Number of decimal places to round to.
///
/// # Returns
///
/// A new `f64` rounded to the specified precision.
///
/// # Examples
///
/// ```
/// use seismic_hazard_lib::auxilary::round_to_places;
/// assert_eq!(round_to_places(3.14159, 2), 3.14);
/// ```
pub fn round_to_places(val: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (val * factor).round() / factor
}

/// Natural logarithm of every value in a slice.
pub fn ln_values(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.ln()).collect()
}

/// Exponential of every value in a slice; inverse of [`ln_values`].
pub fn exp_values(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.exp()).collect()
}

/// Bin count for a uniform discretization; rounds to absorb floating-point
/// drift in `(max - min) / delta`.
pub fn bin_count(min: f64, max: f64, delta: f64) -> usize {
    ((max - min) / delta).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_equal_true() {
        assert!(approx_equal(1.000001, 1.000002, 0.00001));
    }

    #[test]
    fn test_approx_equal_false() {
        assert!(!approx_equal(1.0, 1.1, 0.00001));
    }

    #[test]
    fn test_round_to_places() {
        assert_eq!(round_to_places(3.14159, 2), 3.14);
        assert_eq!(round_to_places(3.145, 2), 3.15);
        assert_eq!(round_to_places(-3.145, 2), -3.15);
    }

    #[test]
    fn test_ln_exp_round_trip() {
        let values = [0.01, 0.1, 1.0, 7.38];
        let ln = ln_values(&values);
        let back = exp_values(&ln);
        for (a, b) in values.iter().zip(back.iter()) {
            assert!(approx_equal(*a, *b, 1e-12));
        }
    }

    #[test]
    fn test_bin_count_absorbs_fp_drift() {
        assert_eq!(bin_count(-3.0, 3.0, 0.5), 12);
        assert_eq!(bin_count(4.4, 6.6, 0.2), 11);
    }
}
