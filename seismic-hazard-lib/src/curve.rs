//! # Log-x Hazard Curves
//!
//! This module provides the [`XySequence`] curve type used throughout the
//! hazard pipeline, along with interpolation and value-format conversion
//! routines.
//!
//! ## Representation
//!
//! - x-values are stored in natural-log space internally (ln of ground
//!   motion in g or cm/s) and are strictly increasing; they are converted
//!   back to linear units only at output via [`XySequence::to_linear_x`].
//! - y-values are annual rates of exceedance; [`XySequence::to_poisson_probability`]
//!   converts them to probabilities of exceedance in a timespan.
//! - Curves composed in arithmetic must share an identical x-grid. The grid
//!   is reference-counted so zeroed copies and clones are cheap and grid
//!   identity can be checked in O(1).
//!
//! ## Primary Operations
//!
//! - Pointwise [`add`](XySequence::add), [`multiply`](XySequence::multiply),
//!   scalar [`scale`](XySequence::scale), and [`complement`](XySequence::complement) (`y ← 1 − y`).
//! - Log-y interpolation of an IML at a target rate
//!   ([`interpolate_x_at_y`](XySequence::interpolate_x_at_y), decreasing-y curves) and of a rate at a
//!   target IML ([`interpolate_y_at_x`](XySequence::interpolate_y_at_x)).
//!
//! ## See Also
//!
//! - [`crate::exceedance`] — populates curve y-values with exceedance
//!   probabilities.

use crate::auxilary::exp_values;
use crate::errors::HazardError;
use std::sync::Arc;

/// An ordered (x, y) sequence with strictly increasing x-values.
///
/// The x-grid is shared between curves produced by [`XySequence::zeroed_copy`]
/// and [`Clone`], which is what makes pointwise arithmetic cheap and safe:
/// two curves on different grids cannot be combined.
#[derive(Debug, Clone, PartialEq)]
pub struct XySequence {
    xs: Arc<Vec<f64>>,
    ys: Vec<f64>,
}

impl XySequence {
    /// Create a sequence from x- and y-values.
    ///
    /// # Errors
    ///
    /// Returns [`HazardError::InvalidDiscretization`] if fewer than two
    /// points are supplied, lengths differ, or x is not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, HazardError> {
        if xs.len() < 2 {
            return Err(HazardError::InvalidDiscretization(
                "sequence requires at least two points".to_string(),
            ));
        }
        if xs.len() != ys.len() {
            return Err(HazardError::InvalidDiscretization(format!(
                "x/y length mismatch: {} vs {}",
                xs.len(),
                ys.len()
            )));
        }
        if xs.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HazardError::InvalidDiscretization(
                "x-values must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            xs: Arc::new(xs),
            ys,
        })
    }

    /// Create a zero-valued sequence on the given x-grid.
    pub fn from_xs(xs: Vec<f64>) -> Result<Self, HazardError> {
        let n = xs.len();
        Self::new(xs, vec![0.0; n])
    }

    /// A zero-valued curve sharing this curve's x-grid.
    pub fn zeroed_copy(&self) -> Self {
        Self {
            xs: Arc::clone(&self.xs),
            ys: vec![0.0; self.ys.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn ys_mut(&mut self) -> &mut [f64] {
        &mut self.ys
    }

    pub fn x(&self, i: usize) -> f64 {
        self.xs[i]
    }

    pub fn y(&self, i: usize) -> f64 {
        self.ys[i]
    }

    /// Whether `other` is defined on the same x-grid as `self`.
    pub fn shares_grid(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.xs, &other.xs) || *self.xs == *other.xs
    }

    fn assert_same_grid(&self, other: &Self) {
        assert!(
            self.shares_grid(other),
            "curves combined in arithmetic must share an x-grid"
        );
    }

    /// Pointwise add `other` into this curve.
    ///
    /// # Panics
    ///
    /// Panics if the curves do not share an x-grid.
    pub fn add(&mut self, other: &Self) {
        self.assert_same_grid(other);
        for (y, o) in self.ys.iter_mut().zip(other.ys.iter()) {
            *y += o;
        }
    }

    /// Pointwise multiply this curve by `other`.
    ///
    /// # Panics
    ///
    /// Panics if the curves do not share an x-grid.
    pub fn multiply(&mut self, other: &Self) {
        self.assert_same_grid(other);
        for (y, o) in self.ys.iter_mut().zip(other.ys.iter()) {
            *y *= o;
        }
    }

    /// Multiply every y-value by a scalar.
    pub fn scale(&mut self, factor: f64) {
        for y in self.ys.iter_mut() {
            *y *= factor;
        }
    }

    /// Replace every y-value with its complement, `y ← 1 − y`.
    pub fn complement(&mut self) {
        for y in self.ys.iter_mut() {
            *y = 1.0 - *y;
        }
    }

    /// Interpolate the x-value at a target y on a curve with monotonically
    /// decreasing y-values, linear in x and log in y.
    ///
    /// This is the "IML at target rate" lookup used to seed a
    /// deaggregation. Returns `None` when the target is not bracketed by
    /// the curve (above its first ordinate or below its last non-zero one).
    pub fn interpolate_x_at_y(&self, y_target: f64) -> Option<f64> {
        if !(y_target > 0.0) {
            return None;
        }
        for i in 0..self.len() - 1 {
            let (y0, y1) = (self.ys[i], self.ys[i + 1]);
            if y0 >= y_target && y_target >= y1 && y0 > 0.0 && y1 > 0.0 && y0 != y1 {
                let (x0, x1) = (self.xs[i], self.xs[i + 1]);
                let t = (y_target.ln() - y0.ln()) / (y1.ln() - y0.ln());
                return Some(x0 + t * (x1 - x0));
            }
        }
        None
    }

    /// Interpolate the y-value at a target x, linear in x and log in y.
    ///
    /// This is the "rate at target IML" lookup. Returns `None` when the
    /// target x is outside the grid or the bracketing ordinates are not
    /// both positive (log interpolation is undefined through zero).
    pub fn interpolate_y_at_x(&self, x_target: f64) -> Option<f64> {
        if x_target < self.xs[0] || x_target > self.xs[self.len() - 1] {
            return None;
        }
        let i = match self.xs.iter().position(|x| *x >= x_target) {
            Some(0) => 0,
            Some(i) => i - 1,
            None => return None,
        };
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        if y0 <= 0.0 || y1 <= 0.0 {
            return if y0 == y1 { Some(y0) } else { None };
        }
        let t = (x_target - x0) / (x1 - x0);
        Some((y0.ln() + t * (y1.ln() - y0.ln())).exp())
    }

    /// Convert annual-rate ordinates to Poisson probabilities of exceedance
    /// over `timespan` years: `p = 1 − exp(−rate · T)`.
    pub fn to_poisson_probability(&self, timespan: f64) -> Self {
        let ys = self.ys.iter().map(|r| 1.0 - (-r * timespan).exp()).collect();
        Self {
            xs: Arc::clone(&self.xs),
            ys,
        }
    }

    /// Convert Poisson-probability ordinates back to annual rates:
    /// `rate = −ln(1 − p) / T`. Inverse of [`to_poisson_probability`](Self::to_poisson_probability).
    pub fn to_annual_rate(&self, timespan: f64) -> Self {
        let ys = self.ys.iter().map(|p| -(1.0 - p).ln() / timespan).collect();
        Self {
            xs: Arc::clone(&self.xs),
            ys,
        }
    }

    /// Export view with x-values converted from natural-log to linear units.
    pub fn to_linear_x(&self) -> Self {
        Self {
            xs: Arc::new(exp_values(&self.xs)),
            ys: self.ys.clone(),
        }
    }

    /// Pointwise sum of curves on a shared grid; `None` for an empty input.
    pub fn sum<'a, I: IntoIterator<Item = &'a XySequence>>(curves: I) -> Option<XySequence> {
        let mut iter = curves.into_iter();
        let mut total = iter.next()?.clone();
        for curve in iter {
            total.add(curve);
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auxilary::approx_equal;

    fn curve(ys: Vec<f64>) -> XySequence {
        let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
        XySequence::new(xs, ys).unwrap()
    }

    #[test]
    fn test_rejects_bad_grids() {
        assert!(XySequence::new(vec![0.0], vec![1.0]).is_err());
        assert!(XySequence::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(XySequence::new(vec![1.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(XySequence::new(vec![0.0, 1.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let mut a = curve(vec![0.1, 0.2, 0.3]);
        let b = curve(vec![0.1, 0.1, 0.1]);
        a.add(&b);
        assert!(approx_equal(a.y(2), 0.4, 1e-12));
        a.scale(10.0);
        assert!(approx_equal(a.y(0), 2.0, 1e-12));
        a.complement();
        assert!(approx_equal(a.y(0), -1.0, 1e-12));
    }

    #[test]
    #[should_panic(expected = "share an x-grid")]
    fn test_mismatched_grid_panics() {
        let mut a = curve(vec![0.1, 0.2]);
        let b = XySequence::new(vec![5.0, 6.0], vec![0.1, 0.2]).unwrap();
        a.add(&b);
    }

    #[test]
    fn test_interpolate_x_at_y() {
        // y halves every step; log-y interpolation is exact at midpoints
        // of the log ordinates.
        let c = curve(vec![0.4, 0.2, 0.1, 0.05]);
        let x = c.interpolate_x_at_y(0.2_f64).unwrap();
        assert!(approx_equal(x, 1.0, 1e-12));
        let x = c.interpolate_x_at_y((0.2_f64.ln() * 0.5 + 0.1_f64.ln() * 0.5).exp());
        assert!(approx_equal(x.unwrap(), 1.5, 1e-12));
        assert!(c.interpolate_x_at_y(0.5).is_none());
        assert!(c.interpolate_x_at_y(0.01).is_none());
    }

    #[test]
    fn test_interpolate_y_at_x() {
        let c = curve(vec![0.4, 0.2, 0.1, 0.05]);
        let y = c.interpolate_y_at_x(0.5).unwrap();
        assert!(approx_equal(y, (0.4_f64.ln() * 0.5 + 0.2_f64.ln() * 0.5).exp(), 1e-12));
        assert!(c.interpolate_y_at_x(-0.1).is_none());
        assert!(c.interpolate_y_at_x(3.5).is_none());
    }

    #[test]
    fn test_poisson_round_trip() {
        let c = curve(vec![1e-2, 1e-3, 1e-4]);
        let p = c.to_poisson_probability(50.0);
        let back = p.to_annual_rate(50.0);
        for (a, b) in c.ys().iter().zip(back.ys().iter()) {
            assert!((a - b).abs() / a < 1e-12);
        }
    }

    #[test]
    fn test_linear_x_export() {
        let c = XySequence::new(vec![0.1_f64.ln(), 1.0_f64.ln()], vec![1.0, 2.0]).unwrap();
        let lin = c.to_linear_x();
        assert!(approx_equal(lin.x(0), 0.1, 1e-12));
        assert!(approx_equal(lin.x(1), 1.0, 1e-12));
    }
}
