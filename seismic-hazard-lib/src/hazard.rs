//! Hazard result containers.
//!
//! Intermediate and final products of a hazard calculation, in pipeline
//! order: [`GroundMotions`] (per-(IMT, GMM) ground-motion lists for one
//! input list), [`HazardCurves`] (unweighted per-GMM curves for one
//! source), [`HazardCurveSet`] (weighted, consolidated curves for one
//! source set, optionally retaining the per-rupture state deaggregation
//! needs), and [`Hazard`] (per-IMT totals for a site).
//!
//! Builders are single-use and confined to one task; the results they
//! emit are immutable and safely shared across threads.

use crate::config::CalcConfig;
use crate::curve::XySequence;
use crate::gmm::ScalarGroundMotion;
use crate::imt::Imt;
use crate::inputs::{InputList, SystemInputList};
use crate::source::{Site, SourceType};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ground motions for every (IMT, GMM, input) triple of one input list.
///
/// For every (IMT, GMM) pair the list of scalar ground motions is parallel
/// to the input list: same length, same order.
#[derive(Debug, Clone)]
pub struct GroundMotions {
    inputs: InputList,
    /// `map[imt][gmm_index][input_index]`.
    map: BTreeMap<Imt, Vec<Vec<ScalarGroundMotion>>>,
}

impl GroundMotions {
    /// # Panics
    ///
    /// Panics if any ground-motion list length differs from the input
    /// list length (a stage-implementation error).
    pub fn new(inputs: InputList, map: BTreeMap<Imt, Vec<Vec<ScalarGroundMotion>>>) -> Self {
        for lists in map.values() {
            for list in lists {
                assert_eq!(
                    list.len(),
                    inputs.len(),
                    "ground-motion list length must match input list"
                );
            }
        }
        Self { inputs, map }
    }

    pub fn inputs(&self) -> &InputList {
        &self.inputs
    }

    /// Ground motions for an (IMT, GMM-index) pair.
    pub fn get(&self, imt: Imt, gmm: usize) -> &[ScalarGroundMotion] {
        &self.map[&imt][gmm]
    }

    pub fn imts(&self) -> impl Iterator<Item = Imt> + '_ {
        self.map.keys().copied()
    }
}

/// Unweighted per-(IMT, GMM) hazard curves for a single source.
#[derive(Debug, Clone)]
pub struct HazardCurves {
    /// `curves[imt][gmm_index]`.
    pub curves: BTreeMap<Imt, Vec<XySequence>>,
}

/// Per-rupture state retained for deaggregation, by source-set shape.
#[derive(Debug, Clone)]
pub enum RetainedData {
    /// Nothing retained; hazard-only calculation.
    None,
    Standard(Vec<SourceGroundMotions>),
    Cluster(Vec<ClusterGroundMotions>),
    System(SystemGroundMotions),
}

/// A standard source's inputs and ground motions, with the source's
/// representative location for contributor records and the GMM weights
/// applicable at the source's minimum distance.
#[derive(Debug, Clone)]
pub struct SourceGroundMotions {
    pub source_name: String,
    pub lon: f64,
    pub lat: f64,
    pub gmm_weights: Vec<f64>,
    pub gms: GroundMotions,
}

/// A cluster source's member-fault ground motions plus the weighted joint
/// cluster exceedance curves (per IMT, per GMM) against which a
/// deaggregation re-scales its accumulators.
#[derive(Debug, Clone)]
pub struct ClusterGroundMotions {
    pub cluster_name: String,
    pub cluster_rate: f64,
    pub cluster_weight: f64,
    pub lon: f64,
    pub lat: f64,
    /// GMM weights at the cluster's minimum distance.
    pub gmm_weights: Vec<f64>,
    pub faults: Vec<SourceGroundMotions>,
    /// `curves[imt][gmm_index]`, weighted by cluster rate and weight, GMM
    /// weight, and source-set weight.
    pub curves: BTreeMap<Imt, Vec<XySequence>>,
}

/// A system source set's input list (with section bitsets) and ground
/// motions, plus the site-relative section metadata the section-resolved
/// deaggregation reports.
#[derive(Debug, Clone)]
pub struct SystemGroundMotions {
    pub inputs: SystemInputList,
    /// `map[imt][gmm_index][input_index]`, parallel to `inputs`.
    pub map: BTreeMap<Imt, Vec<Vec<ScalarGroundMotion>>>,
    /// GMM weights at the list's minimum distance.
    pub gmm_weights: Vec<f64>,
    /// Parallel to the parent set's section list.
    pub sections: Vec<SystemSectionMeta>,
}

/// A system section as seen from the site: the closest point on its upper
/// edge and the azimuth to it.
#[derive(Debug, Clone)]
pub struct SystemSectionMeta {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub azimuth: f64,
}

/// Weighted, consolidated curves of one source set.
#[derive(Debug)]
pub struct HazardCurveSet {
    pub source_set_name: String,
    pub source_type: SourceType,
    pub source_set_weight: f64,
    pub gmm_names: Vec<String>,
    /// `curve_map[imt][gmm_index]`; each curve already weighted by
    /// `sourceSetWeight × gmmWeight(distance)`.
    pub curve_map: BTreeMap<Imt, Vec<XySequence>>,
    /// Per-IMT totals: the pointwise sum over GMMs of `curve_map`.
    pub totals: BTreeMap<Imt, XySequence>,
    pub retained: RetainedData,
}

impl HazardCurveSet {
    /// Whether any rupture of this set contributed.
    pub fn is_empty(&self) -> bool {
        self.totals.values().all(|c| c.ys().iter().all(|y| *y == 0.0))
    }
}

/// Single-use builder accumulating weighted per-GMM curves for one source
/// set. Confined to the task computing the set.
pub struct HazardCurveSetBuilder {
    source_set_name: String,
    source_type: SourceType,
    source_set_weight: f64,
    gmm_names: Vec<String>,
    curve_map: BTreeMap<Imt, Vec<XySequence>>,
    retained: RetainedData,
}

impl HazardCurveSetBuilder {
    pub fn new(
        source_set_name: impl Into<String>,
        source_type: SourceType,
        source_set_weight: f64,
        gmm_names: Vec<String>,
        imts: &[Imt],
        template: impl Fn(Imt) -> XySequence,
    ) -> Self {
        let n_gmms = gmm_names.len();
        let curve_map = imts
            .iter()
            .map(|imt| (*imt, vec![template(*imt); n_gmms]))
            .collect();
        Self {
            source_set_name: source_set_name.into(),
            source_type,
            source_set_weight,
            gmm_names,
            curve_map,
            retained: RetainedData::None,
        }
    }

    /// Fold one source's unweighted curves into the accumulators, applying
    /// `sourceSetWeight × gmmWeight`. A zero GMM weight omits that curve.
    pub fn add_curves(&mut self, curves: &HazardCurves, gmm_weights: &[f64]) {
        for (imt, gmm_curves) in &curves.curves {
            let accumulators = self
                .curve_map
                .get_mut(imt)
                .expect("source curves carry an IMT missing from the builder");
            for (gmm, curve) in gmm_curves.iter().enumerate() {
                let weight = gmm_weights[gmm] * self.source_set_weight;
                if weight == 0.0 {
                    continue;
                }
                let mut weighted = curve.clone();
                weighted.scale(weight);
                accumulators[gmm].add(&weighted);
            }
        }
    }

    /// Attach retained per-rupture state for a later deaggregation.
    pub fn retain(&mut self, retained: RetainedData) {
        self.retained = retained;
    }

    /// Build the immutable curve set; totals are the per-IMT sums over
    /// GMMs. Consumes the builder, so a second build is unrepresentable.
    pub fn build(self) -> HazardCurveSet {
        let totals = self
            .curve_map
            .iter()
            .map(|(imt, curves)| {
                let total = XySequence::sum(curves.iter()).expect("builder has at least one GMM");
                (*imt, total)
            })
            .collect();
        HazardCurveSet {
            source_set_name: self.source_set_name,
            source_type: self.source_type,
            source_set_weight: self.source_set_weight,
            gmm_names: self.gmm_names,
            curve_map: self.curve_map,
            totals,
            retained: self.retained,
        }
    }
}

/// The result of a hazard calculation at one site.
#[derive(Debug)]
pub struct Hazard {
    pub site: Site,
    pub config: Arc<CalcConfig>,
    /// Pointwise sum of the constituent source-set totals, per IMT.
    pub total_curves: BTreeMap<Imt, XySequence>,
    pub curve_sets: Vec<HazardCurveSet>,
}

impl Hazard {
    /// Assemble a hazard result from consolidated source-set curve sets.
    /// Empty curve sets contribute nothing to the totals but are kept for
    /// bookkeeping.
    pub fn new(
        site: Site,
        config: Arc<CalcConfig>,
        imts: &[Imt],
        template: impl Fn(Imt) -> XySequence,
        curve_sets: Vec<HazardCurveSet>,
    ) -> Self {
        let mut total_curves: BTreeMap<Imt, XySequence> =
            imts.iter().map(|imt| (*imt, template(*imt))).collect();
        for set in &curve_sets {
            for (imt, total) in &set.totals {
                if let Some(curve) = total_curves.get_mut(imt) {
                    curve.add(total);
                }
            }
        }
        Self {
            site,
            config,
            total_curves,
            curve_sets,
        }
    }

    pub fn total_curve(&self, imt: Imt) -> Option<&XySequence> {
        self.total_curves.get(&imt)
    }

    /// Curve sets grouped by source type.
    pub fn curve_sets_by_type(&self) -> BTreeMap<SourceType, Vec<&HazardCurveSet>> {
        let mut map: BTreeMap<SourceType, Vec<&HazardCurveSet>> = BTreeMap::new();
        for set in &self.curve_sets {
            map.entry(set.source_type).or_default().push(set);
        }
        map
    }
}
