//! Ground motion model (GMM) interfaces and epistemic logic trees.
//!
//! This module provides the data structures the hazard engine consumes from
//! a GMM catalogue: scalar and multi-branch ground motions, the core
//! [`GroundMotionModeling`] trait, the post-processor chain, and
//! [`GmmSet`] — the epistemic set of weighted GMMs attached to a source
//! set, with distance-dependent weights and optional additional epistemic
//! uncertainty on the median.

use crate::errors::HazardError;
use crate::imt::Imt;
use crate::inputs::HazardInput;
use std::fmt;
use std::sync::Arc;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn check_weight_sum(weights: &[f64], context: &str) -> Result<(), HazardError> {
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(HazardError::InvalidModel(format!(
            "{context} weights sum to {sum}, expected 1.0"
        )));
    }
    Ok(())
}

/// A mean×sigma epistemic logic tree of ground motions.
///
/// Parallel arrays define N = |means|·|sigmas| branches; the weights on
/// each axis sum to one. Branch ordering is contractual: the outer loop
/// runs over means, the inner over sigmas, so branch `(i, j)` lives at
/// index `i · |sigmas| + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiScalarGroundMotion {
    means: Vec<f64>,
    mean_weights: Vec<f64>,
    sigmas: Vec<f64>,
    sigma_weights: Vec<f64>,
}

impl MultiScalarGroundMotion {
    /// # Errors
    ///
    /// Returns [`HazardError::InvalidModel`] on length mismatches or axis
    /// weights not summing to one.
    pub fn new(
        means: Vec<f64>,
        mean_weights: Vec<f64>,
        sigmas: Vec<f64>,
        sigma_weights: Vec<f64>,
    ) -> Result<Self, HazardError> {
        if means.is_empty() || means.len() != mean_weights.len() {
            return Err(HazardError::InvalidModel(
                "mean/weight array mismatch".to_string(),
            ));
        }
        if sigmas.is_empty() || sigmas.len() != sigma_weights.len() {
            return Err(HazardError::InvalidModel(
                "sigma/weight array mismatch".to_string(),
            ));
        }
        check_weight_sum(&mean_weights, "ground motion mean")?;
        check_weight_sum(&sigma_weights, "ground motion sigma")?;
        Ok(Self {
            means,
            mean_weights,
            sigmas,
            sigma_weights,
        })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn mean_weights(&self) -> &[f64] {
        &self.mean_weights
    }

    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    pub fn sigma_weights(&self) -> &[f64] {
        &self.sigma_weights
    }

    /// Number of (mean, sigma) branches.
    pub fn branch_count(&self) -> usize {
        self.means.len() * self.sigmas.len()
    }

    /// Weight-collapsed mean.
    pub fn weighted_mean(&self) -> f64 {
        self.means
            .iter()
            .zip(self.mean_weights.iter())
            .map(|(m, w)| m * w)
            .sum()
    }

    /// Weight-collapsed sigma.
    pub fn weighted_sigma(&self) -> f64 {
        self.sigmas
            .iter()
            .zip(self.sigma_weights.iter())
            .map(|(s, w)| s * w)
            .sum()
    }
}

/// A ground motion produced by one GMM for one rupture: either a single
/// `(μ, σ)` or a logic tree of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarGroundMotion {
    Single { mean: f64, sigma: f64 },
    Multi(MultiScalarGroundMotion),
}

impl ScalarGroundMotion {
    pub fn single(mean: f64, sigma: f64) -> Self {
        Self::Single { mean, sigma }
    }

    /// Median ground motion in natural-log units; weight-collapsed for a
    /// logic tree.
    pub fn mean(&self) -> f64 {
        match self {
            Self::Single { mean, .. } => *mean,
            Self::Multi(msgm) => msgm.weighted_mean(),
        }
    }

    /// Aleatory standard deviation; weight-collapsed for a logic tree.
    pub fn sigma(&self) -> f64 {
        match self {
            Self::Single { sigma, .. } => *sigma,
            Self::Multi(msgm) => msgm.weighted_sigma(),
        }
    }
}

/// A ground motion model: maps a rupture-site input and an IMT to a
/// (possibly multi-branch) `(ln μ, σ)`.
///
/// Implementations live outside this crate; the engine consumes them as
/// opaque functions.
pub trait GroundMotionModeling: Send + Sync {
    fn calc(&self, input: &HazardInput, imt: Imt) -> ScalarGroundMotion;
}

/// A post-processor applied to GMM output before curve integration.
/// Processors declared on a [`Gmm`] compose in declared order.
pub trait GroundMotionPostProcessor: Send + Sync {
    fn apply(&self, gm: ScalarGroundMotion, input: &HazardInput, imt: Imt) -> ScalarGroundMotion;
}

/// A named GMM with its post-processor chain.
#[derive(Clone)]
pub struct Gmm {
    name: String,
    model: Arc<dyn GroundMotionModeling>,
    post_processors: Vec<Arc<dyn GroundMotionPostProcessor>>,
}

impl Gmm {
    pub fn new(name: impl Into<String>, model: Arc<dyn GroundMotionModeling>) -> Self {
        Self {
            name: name.into(),
            model,
            post_processors: Vec::new(),
        }
    }

    pub fn with_post_processor(mut self, pp: Arc<dyn GroundMotionPostProcessor>) -> Self {
        self.post_processors.push(pp);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the model and run the post-processor chain in order.
    pub fn calc(&self, input: &HazardInput, imt: Imt) -> ScalarGroundMotion {
        let mut gm = self.model.calc(input, imt);
        for pp in &self.post_processors {
            gm = pp.apply(gm, input, imt);
        }
        gm
    }
}

impl fmt::Debug for Gmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gmm").field("name", &self.name).finish()
    }
}

/// Additional epistemic uncertainty on GMM medians, tabulated by magnitude
/// and distance class.
///
/// The value table follows the NSHM convention: three distance rows
/// (rJB < 10, 10–30, ≥ 30 km) by three magnitude columns (Mw < 6, 6–7, ≥ 7),
/// with three branch weights applied to `{μ − ε, μ, μ + ε}`.
#[derive(Debug, Clone)]
pub struct EpistemicUncertainty {
    values: [[f64; 3]; 3],
    weights: [f64; 3],
}

const EPI_R_EDGES: [f64; 2] = [10.0, 30.0];
const EPI_M_EDGES: [f64; 2] = [6.0, 7.0];

impl EpistemicUncertainty {
    pub fn new(values: [[f64; 3]; 3], weights: [f64; 3]) -> Result<Self, HazardError> {
        check_weight_sum(&weights, "epistemic branch")?;
        Ok(Self { values, weights })
    }

    /// Uniform ε with the standard NSHM ±branch weights; convenient for
    /// single-valued uncertainty models.
    pub fn uniform(value: f64, weights: [f64; 3]) -> Result<Self, HazardError> {
        Self::new([[value; 3]; 3], weights)
    }

    /// The 2008 NSHM western-US table.
    pub fn nshm_wus() -> Self {
        Self {
            values: [
                [0.375, 0.230, 0.400],
                [0.210, 0.225, 0.360],
                [0.245, 0.230, 0.310],
            ],
            weights: [0.185, 0.630, 0.185],
        }
    }

    fn class(edges: &[f64; 2], v: f64) -> usize {
        if v < edges[0] {
            0
        } else if v < edges[1] {
            1
        } else {
            2
        }
    }

    /// ε for a magnitude and Joyner-Boore distance.
    pub fn value(&self, mw: f64, r_jb: f64) -> f64 {
        self.values[Self::class(&EPI_R_EDGES, r_jb)][Self::class(&EPI_M_EDGES, mw)]
    }

    /// Branch weights for `{μ − ε, μ, μ + ε}`.
    pub fn weights(&self) -> [f64; 3] {
        self.weights
    }
}

/// The epistemic set of GMMs attached to a source set.
///
/// Weights may change beyond a cutoff distance (some models are not
/// defined at long range); a weight of zero omits the GMM at that
/// distance. Beyond `max_distance` all weights are zero and the source
/// set contributes nothing.
#[derive(Debug, Clone)]
pub struct GmmSet {
    gmms: Vec<Gmm>,
    weights: Vec<f64>,
    weights_far: Option<Vec<f64>>,
    cutoff_distance: f64,
    max_distance: f64,
    epistemic: Option<EpistemicUncertainty>,
}

impl GmmSet {
    /// Create a set with uniform-by-distance weights.
    pub fn new(gmms: Vec<Gmm>, weights: Vec<f64>, max_distance: f64) -> Result<Self, HazardError> {
        if gmms.is_empty() || gmms.len() != weights.len() {
            return Err(HazardError::InvalidModel(
                "GMM/weight array mismatch".to_string(),
            ));
        }
        check_weight_sum(&weights, "GMM")?;
        Ok(Self {
            gmms,
            weights,
            weights_far: None,
            cutoff_distance: f64::INFINITY,
            max_distance,
            epistemic: None,
        })
    }

    /// Declare an alternate weight map applied beyond `cutoff_distance` km.
    pub fn with_far_weights(
        mut self,
        weights_far: Vec<f64>,
        cutoff_distance: f64,
    ) -> Result<Self, HazardError> {
        if weights_far.len() != self.gmms.len() {
            return Err(HazardError::InvalidModel(
                "far-weight array mismatch".to_string(),
            ));
        }
        let included: Vec<f64> = weights_far.iter().copied().filter(|w| *w > 0.0).collect();
        check_weight_sum(&included, "far GMM")?;
        self.weights_far = Some(weights_far);
        self.cutoff_distance = cutoff_distance;
        Ok(self)
    }

    /// Declare additional epistemic uncertainty on medians.
    pub fn with_epistemic(mut self, epi: EpistemicUncertainty) -> Self {
        self.epistemic = Some(epi);
        self
    }

    pub fn gmms(&self) -> &[Gmm] {
        &self.gmms
    }

    pub fn len(&self) -> usize {
        self.gmms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gmms.is_empty()
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn epistemic(&self) -> Option<&EpistemicUncertainty> {
        self.epistemic.as_ref()
    }

    /// Per-GMM weights applicable at `distance` km, parallel to
    /// [`gmms`](Self::gmms). Zero means the GMM is omitted at that distance; beyond
    /// the set's maximum distance every weight is zero.
    pub fn weight_map(&self, distance: f64) -> Vec<f64> {
        if distance > self.max_distance {
            return vec![0.0; self.gmms.len()];
        }
        match &self.weights_far {
            Some(far) if distance > self.cutoff_distance => far.clone(),
            _ => self.weights.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auxilary::approx_equal;

    struct Flat;

    impl GroundMotionModeling for Flat {
        fn calc(&self, _input: &HazardInput, _imt: Imt) -> ScalarGroundMotion {
            ScalarGroundMotion::single(0.5_f64.ln(), 0.5)
        }
    }

    #[test]
    fn test_msgm_branch_collapse() {
        let msgm = MultiScalarGroundMotion::new(
            vec![-1.0, 1.0],
            vec![0.5, 0.5],
            vec![0.4, 0.6],
            vec![0.25, 0.75],
        )
        .unwrap();
        assert_eq!(msgm.branch_count(), 4);
        assert!(approx_equal(msgm.weighted_mean(), 0.0, 1e-12));
        assert!(approx_equal(msgm.weighted_sigma(), 0.55, 1e-12));
    }

    #[test]
    fn test_msgm_rejects_bad_weights() {
        assert!(
            MultiScalarGroundMotion::new(vec![0.0], vec![0.9], vec![0.5], vec![1.0]).is_err()
        );
    }

    #[test]
    fn test_weight_map_distance_dependence() {
        let gmms = vec![
            Gmm::new("a", Arc::new(Flat)),
            Gmm::new("b", Arc::new(Flat)),
        ];
        let set = GmmSet::new(gmms, vec![0.6, 0.4], 300.0)
            .unwrap()
            .with_far_weights(vec![1.0, 0.0], 100.0)
            .unwrap();
        assert_eq!(set.weight_map(50.0), vec![0.6, 0.4]);
        assert_eq!(set.weight_map(150.0), vec![1.0, 0.0]);
        assert_eq!(set.weight_map(400.0), vec![0.0, 0.0]);
    }

    #[test]
    fn test_epistemic_classes() {
        let epi = EpistemicUncertainty::nshm_wus();
        assert!(approx_equal(epi.value(5.0, 5.0), 0.375, 1e-12));
        assert!(approx_equal(epi.value(6.5, 20.0), 0.225, 1e-12));
        assert!(approx_equal(epi.value(7.5, 50.0), 0.310, 1e-12));
        let w = epi.weights();
        assert!(approx_equal(w.iter().sum::<f64>(), 1.0, 1e-12));
    }
}
