//! # Exceedance Models
//!
//! This module evaluates `P(Y > y | μ, σ, IMT)` under the truncation and
//! clamp policies used in national hazard model calculations, for both
//! scalar targets and whole curves, and supplies the joint-exceedance
//! combination used for clustered events.
//!
//! ## Features
//!
//! - Eight [`ExceedanceModel`] variants: Heaviside step, untruncated
//!   Gaussian, upper / two-sided σ-truncation, a table-backed fast path at
//!   fixed 3σ, the CEUS maximum-intensity clamps, and the PEER mixture
//!   model.
//! - A shared complementary standard-normal CDF computed with the
//!   Abramowitz & Stegun 7.1.26 rational approximation ([`phi_bar`]).
//! - A precomputed [`CcdfTable`] over ε ∈ [−4, +4] for O(1) lookup in hot
//!   paths, lazily initialized once per process.
//! - Joint exceedance across curves, `1 − Π(1 − pᵢ)` pointwise
//!   ([`joint_exceedance`]).
//! - Logic-tree evaluation of a [`MultiScalarGroundMotion`]: branch curves
//!   and branch weights are produced in a single pass so no external
//!   ordering contract leaks.
//!
//! ## See Also
//!
//! - [`crate::curve::XySequence`] — the curves populated here.

use crate::auxilary::round_to_places;
use crate::curve::XySequence;
use crate::gmm::MultiScalarGroundMotion;
use crate::imt::Imt;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Truncation / clamp policy for evaluating the probability that a ground
/// motion exceeds a target level.
///
/// `n` arguments below are truncation levels in units of σ; variants that
/// fix or ignore the level document so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceedanceModel {
    /// Heaviside step: `p = 1` if `y ≤ μ`, else 0; σ and n are ignored.
    None,
    /// Standard complementary Gaussian, no truncation.
    TruncationOff,
    /// Re-normalized on `(−∞, μ + nσ]`.
    TruncationUpperOnly,
    /// Re-normalized on `[μ − nσ, μ + nσ]`.
    TruncationLowerUpper,
    /// Upper truncation at fixed n = 3 using the precomputed CCDF table.
    #[serde(rename = "TRUNCATION_3SIGMA_UPPER")]
    Truncation3SigmaUpper,
    /// Upper truncation at `min(μ + nσ, ln(max intensity))` with the
    /// CEUS per-IMT maximum-intensity table.
    NshmCeusMaxIntensity,
    /// [`NshmCeusMaxIntensity`](Self::NshmCeusMaxIntensity) with n fixed at 3; takes the table
    /// fast path whenever 3σ lies inside the clamp.
    #[serde(rename = "NSHM_CEUS_3SIGMA_MAX_INTENSITY")]
    NshmCeus3SigmaMaxIntensity,
    /// PEER probabilistic-hazard test-case mixture model: σ is hard-coded
    /// to 0.65 and the result is the average of two untruncated Gaussians
    /// with σ·0.8 and σ·1.2.
    PeerMixtureModel,
}

impl ExceedanceModel {
    /// Probability that ground motion exceeds `value`, given a median
    /// `mean` and standard deviation `sigma` (both in natural-log space),
    /// a truncation level `n` (σ units), and the target IMT.
    pub fn exceedance(&self, mean: f64, sigma: f64, n: f64, imt: Imt, value: f64) -> f64 {
        match self {
            Self::None => {
                if value <= mean {
                    1.0
                } else {
                    0.0
                }
            }
            Self::TruncationOff => phi_bar((value - mean) / sigma),
            Self::TruncationUpperOnly => {
                bounded_ccd(phi_bar((value - mean) / sigma), phi_bar(n), 1.0)
            }
            Self::TruncationLowerUpper => {
                bounded_ccd(phi_bar((value - mean) / sigma), phi_bar(n), phi_bar(-n))
            }
            Self::Truncation3SigmaUpper => {
                bounded_ccd(ccdf_table().get(mean, sigma, value), phi_bar(3.0), 1.0)
            }
            Self::NshmCeusMaxIntensity => {
                ceus_exceedance(mean, sigma, n, imt.ceus_max_intensity_ln(), value)
            }
            Self::NshmCeus3SigmaMaxIntensity => {
                let max_ln = imt.ceus_max_intensity_ln();
                if mean + 3.0 * sigma <= max_ln {
                    // 3σ inside the clamp; identical to the table path.
                    bounded_ccd(ccdf_table().get(mean, sigma, value), phi_bar(3.0), 1.0)
                } else {
                    ceus_exceedance(mean, sigma, 3.0, max_ln, value)
                }
            }
            Self::PeerMixtureModel => {
                let sigma = 0.65;
                let p_lo = phi_bar((value - mean) / (sigma * 0.8));
                let p_hi = phi_bar((value - mean) / (sigma * 1.2));
                0.5 * (p_lo + p_hi)
            }
        }
    }

    /// Populate `seq` with exceedance probabilities evaluated at each of
    /// its x-values (ln IMLs). Existing y-values are overwritten.
    pub fn exceedance_seq(&self, mean: f64, sigma: f64, n: f64, imt: Imt, seq: &mut XySequence) {
        for i in 0..seq.len() {
            let p = self.exceedance(mean, sigma, n, imt, seq.x(i));
            seq.ys_mut()[i] = p;
        }
    }

    /// Populate `seq` with the weighted logic-tree exceedance of a
    /// multi-branch ground motion: `Σᵢⱼ wᵢ wⱼ · P(μᵢ, σⱼ)`. Existing
    /// y-values are overwritten.
    pub fn tree_exceedance_seq(
        &self,
        msgm: &MultiScalarGroundMotion,
        n: f64,
        imt: Imt,
        seq: &mut XySequence,
    ) {
        for y in seq.ys_mut() {
            *y = 0.0;
        }
        for (mean, mw) in msgm.means().iter().zip(msgm.mean_weights()) {
            for (sigma, sw) in msgm.sigmas().iter().zip(msgm.sigma_weights()) {
                let w = mw * sw;
                for i in 0..seq.len() {
                    let p = self.exceedance(*mean, *sigma, n, imt, seq.x(i));
                    seq.ys_mut()[i] += w * p;
                }
            }
        }
    }

    /// Per-branch logic-tree exceedance curves with their weights.
    ///
    /// Branches and weights are produced together, outer loop over means
    /// and inner over sigmas, so callers that must re-combine branches
    /// later (the cluster integrator) never depend on an external index
    /// convention.
    pub fn tree_exceedance_branches(
        &self,
        msgm: &MultiScalarGroundMotion,
        n: f64,
        imt: Imt,
        template: &XySequence,
    ) -> (Vec<XySequence>, Vec<f64>) {
        let mut curves = Vec::with_capacity(msgm.branch_count());
        let mut weights = Vec::with_capacity(msgm.branch_count());
        for (mean, mw) in msgm.means().iter().zip(msgm.mean_weights()) {
            for (sigma, sw) in msgm.sigmas().iter().zip(msgm.sigma_weights()) {
                let mut curve = template.zeroed_copy();
                self.exceedance_seq(*mean, *sigma, n, imt, &mut curve);
                curves.push(curve);
                weights.push(mw * sw);
            }
        }
        (curves, weights)
    }
}

/// CEUS-style upper truncation at `min(μ + nσ, ln maxIntensity)`.
fn ceus_exceedance(mean: f64, sigma: f64, n: f64, max_ln: f64, value: f64) -> f64 {
    let limit = (mean + n * sigma).min(max_ln);
    if value >= limit {
        return 0.0;
    }
    bounded_ccd(
        phi_bar((value - mean) / sigma),
        phi_bar((limit - mean) / sigma),
        1.0,
    )
}

/// Complementary CDF re-normalized between the probabilities at the lower
/// and upper truncation points, clipped to [0, 1].
fn bounded_ccd(p: f64, p_hi: f64, p_lo: f64) -> f64 {
    ((p - p_hi) / (p_lo - p_hi)).clamp(0.0, 1.0)
}

/// Complementary standard-normal CDF `Φ̄(z) = 1 − Φ(z)`.
///
/// Uses the Abramowitz & Stegun 7.1.26 rational approximation of erf,
/// accurate to ~1.5e-7.
pub fn phi_bar(z: f64) -> f64 {
    0.5 * (1.0 - erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    if x < 0.0 {
        -erf_positive(-x)
    } else {
        erf_positive(x)
    }
}

// Abramowitz & Stegun 7.1.26 coefficients.
const ERF_P: f64 = 0.3275911;
const ERF_A1: f64 = 0.254829592;
const ERF_A2: f64 = -0.284496736;
const ERF_A3: f64 = 1.421413741;
const ERF_A4: f64 = -1.453152027;
const ERF_A5: f64 = 1.061405429;

fn erf_positive(x: f64) -> f64 {
    let t = 1.0 / (1.0 + ERF_P * x);
    1.0 - (((((ERF_A5 * t + ERF_A4) * t) + ERF_A3) * t + ERF_A2) * t + ERF_A1)
        * t
        * (-x * x).exp()
}

/// Joint exceedance across curves on a shared grid: `1 − Π(1 − pᵢ)`
/// pointwise. Used to combine the curves of faults that rupture together
/// in a cluster. Returns `None` for an empty input.
pub fn joint_exceedance(curves: &[XySequence]) -> Option<XySequence> {
    let first = curves.first()?;
    let mut product = first.zeroed_copy();
    product.complement(); // all ones
    for curve in curves {
        let mut complement = curve.clone();
        complement.complement();
        product.multiply(&complement);
    }
    product.complement();
    Some(product)
}

/// Precomputed table of the complementary standard-normal CDF.
///
/// Sampled on a fixed ε range with the step rounded to 8 decimal digits;
/// queries outside the range saturate to 1 (below) or 0 (above). The
/// shared instance spans ε ∈ [−4, +4] with 10 000 001 entries and is built
/// once per process on first use.
#[derive(Debug)]
pub struct CcdfTable {
    eps_min: f64,
    eps_max: f64,
    step: f64,
    values: Vec<f64>,
}

const TABLE_EPS_MIN: f64 = -4.0;
const TABLE_EPS_MAX: f64 = 4.0;
const TABLE_SIZE: usize = 10_000_001;

static CCDF_TABLE: OnceLock<CcdfTable> = OnceLock::new();

/// The shared lazily-initialized CCDF table.
pub fn ccdf_table() -> &'static CcdfTable {
    CCDF_TABLE.get_or_init(|| CcdfTable::new(TABLE_EPS_MIN, TABLE_EPS_MAX, TABLE_SIZE))
}

impl CcdfTable {
    fn new(eps_min: f64, eps_max: f64, size: usize) -> Self {
        let step = round_to_places((eps_max - eps_min) / (size - 1) as f64, 8);
        let values = (0..size)
            .map(|i| phi_bar(eps_min + i as f64 * step))
            .collect();
        Self {
            eps_min,
            eps_max,
            step,
            values,
        }
    }

    /// `Φ̄((value − mean) / sigma)` by nearest-entry lookup.
    pub fn get(&self, mean: f64, sigma: f64, value: f64) -> f64 {
        let eps = (value - mean) / sigma;
        if eps < self.eps_min {
            return 1.0;
        }
        if eps > self.eps_max {
            return 0.0;
        }
        let i = ((eps - self.eps_min) / self.step).round() as usize;
        self.values[i.min(self.values.len() - 1)]
    }
}
