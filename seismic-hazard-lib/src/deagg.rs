//! # Hazard Deaggregation
//!
//! Given a computed [`Hazard`] (with retained ground motions), this module
//! re-walks every rupture of every source set and bins its contribution to
//! the exceedance rate at a target intensity into the configured
//! (distance, magnitude, ε) grid, preserving moment-weighted means and
//! per-source provenance.
//!
//! Entry points mirror the two ways a target is specified:
//!
//! - [`Deaggregation::at_return_period`] — interpolate the IML at the
//!   target rate on each total curve (log-y interpolation), then
//!   deaggregate at that IML.
//! - [`Deaggregation::at_iml`] — deaggregate at a fixed IML, recovering
//!   the rate from the total curve.
//!
//! Per-source-set datasets are first built per GMM, consolidated across
//! GMMs (merging contributor children under the source-set parent), then
//! folded into per-type datasets and the grand total; per-GMM datasets are
//! also exposed across source sets.

use crate::config::CalcConfig;
use crate::deagg_data::{
    consolidate_gmm_datasets, consolidate_source_sets, ClusterContributor, ContributorNode,
    ContributorStats, DeaggDataset, DeaggDatasetBuilder, DeaggGrid, SectionContributor,
    SectionMfd, SourceContributor, SourceSetContributor,
};
use crate::errors::HazardError;
use crate::exceedance::ExceedanceModel;
use crate::gmm::ScalarGroundMotion;
use crate::hazard::{
    ClusterGroundMotions, Hazard, HazardCurveSet, RetainedData, SourceGroundMotions,
    SystemGroundMotions,
};
use crate::imt::Imt;
use crate::source::{Site, SourceType};
use geo::{Bearing, Haversine, Point};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The resolved per-IMT deaggregation settings.
#[derive(Debug, Clone)]
pub struct ImtDeaggConfig {
    pub imt: Imt,
    /// Target intensity in natural-log units.
    pub iml: f64,
    /// Target intensity in linear units (g or cm/s).
    pub iml_linear: f64,
    /// Total exceedance rate at the target.
    pub rate: f64,
    /// `1 / rate`.
    pub return_period: f64,
    pub grid: Arc<DeaggGrid>,
    pub exceedance_model: ExceedanceModel,
    pub truncation: f64,
    pub contributor_limit: f64,
}

/// Deaggregation results for one IMT.
#[derive(Debug)]
pub struct ImtDeagg {
    pub config: ImtDeaggConfig,
    pub total: DeaggDataset,
    /// Per-GMM datasets consolidated across source sets.
    pub gmm_datasets: Vec<(String, DeaggDataset)>,
    /// Per-source-type datasets.
    pub type_datasets: Vec<(SourceType, DeaggDataset)>,
}

/// Deaggregation results for a site, per IMT.
#[derive(Debug)]
pub struct Deaggregation {
    pub site: Site,
    pub deaggs: BTreeMap<Imt, ImtDeagg>,
}

enum Target {
    ReturnPeriod(f64),
    Iml(f64),
}

impl Deaggregation {
    /// Deaggregate at the IML with the given return period (years).
    ///
    /// # Errors
    ///
    /// Fails when the hazard retains no ground motions, or when the
    /// target rate cannot be bracketed on a total curve.
    pub fn at_return_period(
        hazard: &Hazard,
        return_period: f64,
        imts: Option<&[Imt]>,
    ) -> Result<Self, HazardError> {
        Self::deagg(hazard, Target::ReturnPeriod(return_period), imts)
    }

    /// Deaggregate at a fixed IML in linear units.
    ///
    /// # Errors
    ///
    /// As [`at_return_period`](Self::at_return_period).
    pub fn at_iml(hazard: &Hazard, iml: f64, imts: Option<&[Imt]>) -> Result<Self, HazardError> {
        Self::deagg(hazard, Target::Iml(iml), imts)
    }

    fn deagg(hazard: &Hazard, target: Target, imts: Option<&[Imt]>) -> Result<Self, HazardError> {
        let config = &hazard.config;
        if hazard
            .curve_sets
            .iter()
            .all(|set| matches!(set.retained, RetainedData::None))
        {
            return Err(HazardError::MissingDeaggData(
                "recompute hazard with deaggregation retention enabled".to_string(),
            ));
        }
        let imts: Vec<Imt> = match imts {
            Some(imts) => imts.to_vec(),
            None => config.hazard.imts.clone(),
        };
        let grid = Arc::new(DeaggGrid::new(&config.deagg.bins)?);
        let mut deaggs = BTreeMap::new();
        for imt in imts {
            let imt_config = resolve_target(hazard, imt, &target, &grid, config)?;
            deaggs.insert(imt, deagg_imt(hazard, &imt_config)?);
        }
        Ok(Self {
            site: hazard.site.clone(),
            deaggs,
        })
    }
}

fn resolve_target(
    hazard: &Hazard,
    imt: Imt,
    target: &Target,
    grid: &Arc<DeaggGrid>,
    config: &CalcConfig,
) -> Result<ImtDeaggConfig, HazardError> {
    let curve = hazard
        .total_curve(imt)
        .ok_or_else(|| HazardError::TargetOutOfRange(format!("no total curve for {imt}")))?;
    let (iml, rate, return_period) = match target {
        Target::ReturnPeriod(t) => {
            let rate = 1.0 / t;
            let iml = curve.interpolate_x_at_y(rate).ok_or_else(|| {
                HazardError::TargetOutOfRange(format!(
                    "rate {rate:.3e} not bracketed on the {imt} curve"
                ))
            })?;
            (iml, rate, *t)
        }
        Target::Iml(iml_linear) => {
            let iml = iml_linear.ln();
            let rate = curve.interpolate_y_at_x(iml).ok_or_else(|| {
                HazardError::TargetOutOfRange(format!(
                    "IML {iml_linear} outside the {imt} curve"
                ))
            })?;
            (iml, rate, 1.0 / rate)
        }
    };
    debug!(
        "deagg: {imt} at IML {:.4} (rate {rate:.4e}, T {return_period:.0} yr)",
        iml.exp()
    );
    Ok(ImtDeaggConfig {
        imt,
        iml,
        iml_linear: iml.exp(),
        rate,
        return_period,
        grid: Arc::clone(grid),
        exceedance_model: config.hazard.exceedance_model,
        truncation: config.hazard.truncation_level,
        contributor_limit: config.deagg.contributor_limit,
    })
}

fn deagg_imt(hazard: &Hazard, cfg: &ImtDeaggConfig) -> Result<ImtDeagg, HazardError> {
    let mut set_totals: Vec<DeaggDataset> = Vec::new();
    let mut by_gmm: BTreeMap<String, Vec<DeaggDataset>> = BTreeMap::new();
    let mut by_type: BTreeMap<SourceType, Vec<DeaggDataset>> = BTreeMap::new();

    for set in &hazard.curve_sets {
        // skip source sets with no exceedance rate at the target level
        let set_rate = set
            .totals
            .get(&cfg.imt)
            .and_then(|total| total.interpolate_y_at_x(cfg.iml));
        if !set_rate.is_some_and(|rate| rate > 0.0) {
            continue;
        }
        let per_gmm = match &set.retained {
            RetainedData::None => {
                return Err(HazardError::MissingDeaggData(format!(
                    "source set {} retains no ground motions",
                    set.source_set_name
                )));
            }
            RetainedData::Standard(sources) => {
                deagg_standard(set, sources, &hazard.site, cfg)
            }
            RetainedData::Cluster(clusters) => deagg_cluster(set, clusters, &hazard.site, cfg),
            RetainedData::System(system) => deagg_system(set, system, cfg),
        };
        let datasets: Vec<DeaggDataset> = per_gmm.iter().map(|(_, d)| d.clone()).collect();
        if datasets.is_empty() {
            continue;
        }
        let set_total = consolidate_gmm_datasets(
            &set.source_set_name,
            set.source_type,
            &cfg.grid,
            &datasets,
        );
        for (gmm, dataset) in per_gmm {
            by_gmm.entry(gmm).or_default().push(dataset);
        }
        by_type
            .entry(set.source_type)
            .or_default()
            .push(set_total.clone());
        set_totals.push(set_total);
    }

    let total = consolidate_source_sets(&cfg.grid, &set_totals);
    let gmm_datasets = by_gmm
        .into_iter()
        .map(|(gmm, datasets)| (gmm, consolidate_source_sets(&cfg.grid, &datasets)))
        .collect();
    let type_datasets = by_type
        .into_iter()
        .map(|(t, datasets)| (t, consolidate_source_sets(&cfg.grid, &datasets)))
        .collect();
    Ok(ImtDeagg {
        config: cfg.clone(),
        total,
        gmm_datasets,
        type_datasets,
    })
}

/// Per-GMM builders for one source set, created lazily per supported GMM.
struct GmmBuilders<'a> {
    set: &'a HazardCurveSet,
    builders: Vec<Option<(DeaggDatasetBuilder, SourceSetContributor)>>,
}

impl<'a> GmmBuilders<'a> {
    fn new(set: &'a HazardCurveSet) -> Self {
        Self {
            set,
            builders: (0..set.gmm_names.len()).map(|_| None).collect(),
        }
    }

    fn get(
        &mut self,
        g: usize,
        grid: &Arc<DeaggGrid>,
    ) -> &mut (DeaggDatasetBuilder, SourceSetContributor) {
        self.builders[g].get_or_insert_with(|| {
            (
                DeaggDatasetBuilder::new(Arc::clone(grid)),
                SourceSetContributor::new(&self.set.source_set_name, self.set.source_type),
            )
        })
    }

    fn finish(self) -> Vec<(String, DeaggDataset)> {
        self.builders
            .into_iter()
            .enumerate()
            .filter_map(|(g, slot)| {
                let (mut builder, parent) = slot?;
                builder.push_contributor(parent);
                Some((self.set.gmm_names[g].clone(), builder.build()))
            })
            .collect()
    }
}

/// Process one rupture against one GMM: compute ε and the exceedance
/// probability at the target IML, accumulate the weighted rate into the
/// dataset and the contributor stats. Returns `(ε, rate, in_grid)`.
fn deagg_rupture(
    builder: &mut DeaggDatasetBuilder,
    cfg: &ImtDeaggConfig,
    sgm: &ScalarGroundMotion,
    r_rup: f64,
    mw: f64,
    base_rate: f64,
    weight: f64,
) -> (f64, f64, bool) {
    let (mean, sigma) = (sgm.mean(), sgm.sigma());
    let eps = (cfg.iml - mean) / sigma;
    let p = cfg
        .exceedance_model
        .exceedance(mean, sigma, cfg.truncation, cfg.imt, cfg.iml);
    let rate = p * base_rate * weight;
    let in_grid = builder.add_rupture(r_rup, mw, eps, rate);
    (eps, rate, in_grid)
}

fn azimuth(site: &Site, lon: f64, lat: f64) -> f64 {
    Haversine.bearing(site.location(), Point::new(lon, lat))
}

fn deagg_standard(
    set: &HazardCurveSet,
    sources: &[SourceGroundMotions],
    site: &Site,
    cfg: &ImtDeaggConfig,
) -> Vec<(String, DeaggDataset)> {
    let mut builders = GmmBuilders::new(set);
    for source in sources {
        for (g, weight) in source.gmm_weights.iter().enumerate() {
            if *weight == 0.0 {
                continue;
            }
            let (builder, parent) = builders.get(g, &cfg.grid);
            let mut stats = ContributorStats::default();
            for (input, sgm) in source.gms.inputs().iter().zip(source.gms.get(cfg.imt, g)) {
                let (eps, rate, in_grid) = deagg_rupture(
                    builder,
                    cfg,
                    sgm,
                    input.r_rup,
                    input.mw,
                    input.rate * set.source_set_weight,
                    *weight,
                );
                stats.add_rupture(input.r_rup, input.mw, eps, rate, in_grid);
            }
            parent.stats.combine(&stats);
            parent.children.push(ContributorNode::Source(SourceContributor {
                name: source.source_name.clone(),
                lon: source.lon,
                lat: source.lat,
                azimuth: azimuth(site, source.lon, source.lat),
                stats,
            }));
        }
    }
    builders.finish()
}

fn deagg_cluster(
    set: &HazardCurveSet,
    clusters: &[ClusterGroundMotions],
    site: &Site,
    cfg: &ImtDeaggConfig,
) -> Vec<(String, DeaggDataset)> {
    let mut results = GmmBuilders::new(set);
    for cluster in clusters {
        for (g, weight) in cluster.gmm_weights.iter().enumerate() {
            if *weight == 0.0 {
                continue;
            }
            // target rate from the precomputed joint cluster curve
            let target = cluster
                .curves
                .get(&cfg.imt)
                .and_then(|curves| curves[g].interpolate_y_at_x(cfg.iml));
            let Some(target) = target.filter(|rate| *rate > 0.0) else {
                continue;
            };
            // run the standard walk over member faults into a scratch
            // builder, then scale it to recover the joint-exceedance rate
            let mut scratch = DeaggDatasetBuilder::new(Arc::clone(&cfg.grid));
            let mut children = Vec::new();
            let base = cluster.cluster_rate * cluster.cluster_weight * set.source_set_weight;
            for fault in &cluster.faults {
                let mut stats = ContributorStats::default();
                for (input, sgm) in fault.gms.inputs().iter().zip(fault.gms.get(cfg.imt, g)) {
                    // input.rate carries the magnitude-variant weight
                    let (eps, rate, in_grid) = deagg_rupture(
                        &mut scratch,
                        cfg,
                        sgm,
                        input.r_rup,
                        input.mw,
                        input.rate * base,
                        *weight,
                    );
                    stats.add_rupture(input.r_rup, input.mw, eps, rate, in_grid);
                }
                children.push(SourceContributor {
                    name: fault.source_name.clone(),
                    lon: fault.lon,
                    lat: fault.lat,
                    azimuth: azimuth(site, fault.lon, fault.lat),
                    stats,
                });
            }
            let scratch_total = scratch.total();
            if scratch_total == 0.0 {
                continue;
            }
            let scale = target / scratch_total;
            scratch.multiply(scale);
            for child in &mut children {
                child.stats.scale(scale);
            }
            let mut cluster_stats = ContributorStats::default();
            for child in &children {
                cluster_stats.combine(&child.stats);
            }
            let (builder, parent) = results.get(g, &cfg.grid);
            builder.combine(&scratch.build());
            parent.stats.combine(&cluster_stats);
            parent.children.push(ContributorNode::Cluster(ClusterContributor {
                name: cluster.cluster_name.clone(),
                lon: cluster.lon,
                lat: cluster.lat,
                azimuth: azimuth(site, cluster.lon, cluster.lat),
                stats: cluster_stats,
                children,
            }));
        }
    }
    results.finish()
}

fn deagg_system(
    set: &HazardCurveSet,
    system: &SystemGroundMotions,
    cfg: &ImtDeaggConfig,
) -> Vec<(String, DeaggDataset)> {
    let mut builders = GmmBuilders::new(set);
    let inputs = system.inputs.inputs();
    if inputs.is_empty() {
        return builders.finish();
    }
    let (mw_min, mw_max) = inputs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), input| {
            (lo.min(input.mw), hi.max(input.mw))
        });
    let bitsets = system.inputs.bitsets();
    let mut live = vec![true; inputs.len()];
    // Each rupture is attributed to the first of its sections encountered
    // in section order, then retired from the live set.
    for &section in system.inputs.sections() {
        let claimed: Vec<usize> = (0..inputs.len())
            .filter(|i| live[*i] && bitsets[*i][section])
            .collect();
        if claimed.is_empty() {
            continue;
        }
        let meta = &system.sections[section];
        for (g, weight) in system.gmm_weights.iter().enumerate() {
            if *weight == 0.0 {
                continue;
            }
            let (builder, parent) = builders.get(g, &cfg.grid);
            let mut stats = ContributorStats::default();
            let mut mfd = SectionMfd::new(mw_min, mw_max);
            let gms = &system.map[&cfg.imt][g];
            for &i in &claimed {
                let input = &inputs[i];
                let (eps, rate, in_grid) = deagg_rupture(
                    builder,
                    cfg,
                    &gms[i],
                    input.r_rup,
                    input.mw,
                    input.rate * set.source_set_weight,
                    *weight,
                );
                stats.add_rupture(input.r_rup, input.mw, eps, rate, in_grid);
                mfd.add(input.mw, rate);
            }
            parent.stats.combine(&stats);
            parent.children.push(ContributorNode::Section(SectionContributor {
                section,
                name: meta.name.clone(),
                lon: meta.lon,
                lat: meta.lat,
                azimuth: meta.azimuth,
                stats,
                mfd,
            }));
        }
        for i in claimed {
            live[i] = false;
        }
    }
    builders.finish()
}
