//! # Hazard Calculation Pipeline
//!
//! This module chains the calculation stages that turn a hazard model and
//! a site into per-IMT hazard curves:
//!
//! ```text
//! Site + SourceSet → [Rupture→Input] → [Input→GroundMotion]
//!     → [GroundMotion→Curve] → per-GMM curves → consolidation → Hazard
//! ```
//!
//! ## Features
//!
//! - **Fan-out/fan-in parallelism:** one task per source set, scheduled on
//!   Rayon; within a system source set the large input list is partitioned
//!   into fixed-size chunks evaluated in parallel and concatenated in
//!   submission order.
//! - **Single-threaded fallback:** [`calc_hazard_serial`] runs the
//!   identical pipeline on the calling thread for debugging and timing.
//! - **Three integration paths:** standard sources, cluster sources with
//!   joint exceedance across member faults, and system rupture sets with
//!   retained section bitsets.
//!
//! Per-(IMT, GMM) curves sum associatively and commutatively, so stage
//! outputs may arrive in any order; totals are deterministic up to
//! floating-point summation order.
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seismic_hazard_lib::config::CalcConfig;
//! use seismic_hazard_lib::pipeline::calc_hazard;
//! # fn demo_model() -> seismic_hazard_lib::source::HazardModel { unimplemented!() }
//! # fn demo_site() -> seismic_hazard_lib::source::Site { unimplemented!() }
//!
//! let model = demo_model();
//! let site = demo_site();
//! let config = Arc::new(CalcConfig::default());
//! let hazard = calc_hazard(&model, &site, &config, false).unwrap();
//! for (imt, curve) in &hazard.total_curves {
//!     println!("{imt}: {:?}", curve.to_linear_x());
//! }
//! ```

use crate::config::CalcConfig;
use crate::curve::XySequence;
use crate::errors::HazardError;
use crate::exceedance::joint_exceedance;
use crate::gmm::{Gmm, GmmSet, ScalarGroundMotion};
use crate::hazard::{
    ClusterGroundMotions, GroundMotions, Hazard, HazardCurveSet, HazardCurveSetBuilder,
    HazardCurves, RetainedData, SourceGroundMotions, SystemGroundMotions, SystemSectionMeta,
};
use crate::imt::Imt;
use crate::inputs::{HazardInput, InputList};
use crate::source::{ClusterSource, HazardModel, Site, Source, SourceSet, SourceSetSources,
    SystemSourceSet};
use geo::{Bearing, Haversine, Point};
use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Compute hazard curves for a site, fanning source sets out across a
/// Rayon thread pool.
///
/// `performance.threadCount` selects the pool size: 0 uses the global
/// pool, 1 falls through to [`calc_hazard_serial`]. Set `need_deagg` to
/// retain the per-rupture state a following deaggregation requires.
///
/// # Errors
///
/// Fails fast on invalid configuration; any stage failure aborts the
/// calculation and surfaces here. No partial result is returned.
pub fn calc_hazard(
    model: &HazardModel,
    site: &Site,
    config: &Arc<CalcConfig>,
    need_deagg: bool,
) -> Result<Hazard, HazardError> {
    config.validate()?;
    let threads = config.performance.thread_count;
    if threads == 1 {
        return calc_hazard_serial(model, site, config, need_deagg);
    }
    debug!(
        "hazard: site {} model {} ({} source sets, {} IMTs)",
        site.name,
        model.name,
        model.len(),
        config.hazard.imts.len()
    );
    let run = || {
        model
            .source_sets()
            .par_iter()
            .map(|set| curve_set_for_source_set(set, site, config, need_deagg, true))
            .collect::<Result<Vec<_>, HazardError>>()
    };
    let curve_sets = if threads == 0 {
        run()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| HazardError::InvalidConfig(format!("thread pool: {e}")))?;
        pool.install(run)?
    };
    Ok(assemble(site, config, curve_sets))
}

/// Run the identical pipeline on the calling thread.
///
/// # Errors
///
/// As [`calc_hazard`].
pub fn calc_hazard_serial(
    model: &HazardModel,
    site: &Site,
    config: &Arc<CalcConfig>,
    need_deagg: bool,
) -> Result<Hazard, HazardError> {
    config.validate()?;
    let curve_sets = model
        .source_sets()
        .iter()
        .map(|set| curve_set_for_source_set(set, site, config, need_deagg, false))
        .collect::<Result<Vec<_>, HazardError>>()?;
    Ok(assemble(site, config, curve_sets))
}

fn assemble(site: &Site, config: &Arc<CalcConfig>, curve_sets: Vec<HazardCurveSet>) -> Hazard {
    Hazard::new(
        site.clone(),
        Arc::clone(config),
        &config.hazard.imts,
        |imt| config.hazard.log_model_curve(imt),
        curve_sets,
    )
}

fn curve_set_for_source_set(
    set: &SourceSet,
    site: &Site,
    config: &CalcConfig,
    need_deagg: bool,
    parallel: bool,
) -> Result<HazardCurveSet, HazardError> {
    match &set.sources {
        SourceSetSources::Standard(_) => standard_curve_set(set, site, config, need_deagg),
        SourceSetSources::Cluster(clusters) => {
            cluster_curve_set(set, clusters, site, config, need_deagg)
        }
        SourceSetSources::System(system) => {
            system_curve_set(set, system, site, config, need_deagg, parallel)
        }
    }
}

fn set_builder(set: &SourceSet, config: &CalcConfig) -> HazardCurveSetBuilder {
    let gmm_names = set.gmms.gmms().iter().map(|g| g.name().to_string()).collect();
    HazardCurveSetBuilder::new(
        &set.name,
        set.source_type,
        set.weight,
        gmm_names,
        &config.hazard.imts,
        |imt| config.hazard.log_model_curve(imt),
    )
}

/// Build the input list for one source relative to a site.
pub fn inputs_for_source(source: &Source, site: &Site) -> InputList {
    let mut list = InputList::new(&source.name);
    for rupture in &source.ruptures {
        list.push(HazardInput::from_rupture(rupture, site));
    }
    list
}

/// Evaluate every (IMT, GMM, input) triple of an input list.
pub fn ground_motions(inputs: InputList, gmms: &GmmSet, imts: &[Imt]) -> GroundMotions {
    let map = evaluate_ground_motions(inputs.as_slice(), gmms.gmms(), imts);
    GroundMotions::new(inputs, map)
}

fn evaluate_ground_motions(
    inputs: &[HazardInput],
    gmms: &[Gmm],
    imts: &[Imt],
) -> BTreeMap<Imt, Vec<Vec<ScalarGroundMotion>>> {
    imts.iter()
        .map(|imt| {
            let lists = gmms
                .iter()
                .map(|gmm| inputs.iter().map(|input| gmm.calc(input, *imt)).collect())
                .collect();
            (*imt, lists)
        })
        .collect()
}

/// The standard GroundMotion→Curve integrator for one source.
///
/// For each (IMT, GMM) the per-input exceedance — scalar, logic-tree, or
/// the ±ε epistemic triple — is scaled by the input's rate and summed.
/// Curves are NOT yet weighted by GMM or source-set weight; the
/// consolidator applies those.
pub fn curves_for_gms(gms: &GroundMotions, gmms: &GmmSet, config: &CalcConfig) -> HazardCurves {
    integrate_curves(gms.inputs().as_slice(), |imt, g| gms.get(imt, g), gmms, config)
}

fn integrate_curves<'a>(
    inputs: &[HazardInput],
    lists: impl Fn(Imt, usize) -> &'a [ScalarGroundMotion],
    gmms: &GmmSet,
    config: &CalcConfig,
) -> HazardCurves {
    let model = config.hazard.exceedance_model;
    let n = config.hazard.truncation_level;
    let epi = if config.hazard.gmm_uncertainty {
        gmms.epistemic()
    } else {
        None
    };
    let mut curves = BTreeMap::new();
    for imt in &config.hazard.imts {
        let template = config.hazard.log_model_curve(*imt);
        let mut gmm_curves = Vec::with_capacity(gmms.len());
        for g in 0..gmms.len() {
            let mut curve = template.zeroed_copy();
            let mut utility = template.zeroed_copy();
            let mut branch = template.zeroed_copy();
            for (input, sgm) in inputs.iter().zip(lists(*imt, g)) {
                match sgm {
                    ScalarGroundMotion::Multi(msgm) => {
                        model.tree_exceedance_seq(msgm, n, *imt, &mut utility);
                    }
                    ScalarGroundMotion::Single { mean, sigma } => match epi {
                        Some(epi) => {
                            let value = epi.value(input.mw, input.r_jb);
                            let weights = epi.weights();
                            for y in utility.ys_mut() {
                                *y = 0.0;
                            }
                            for (offset, weight) in
                                [-value, 0.0, value].iter().zip(weights.iter())
                            {
                                model.exceedance_seq(mean + offset, *sigma, n, *imt, &mut branch);
                                for (u, b) in utility.ys_mut().iter_mut().zip(branch.ys()) {
                                    *u += weight * b;
                                }
                            }
                        }
                        None => model.exceedance_seq(*mean, *sigma, n, *imt, &mut utility),
                    },
                }
                utility.scale(input.rate);
                curve.add(&utility);
            }
            gmm_curves.push(curve);
        }
        curves.insert(*imt, gmm_curves);
    }
    HazardCurves { curves }
}

fn standard_curve_set(
    set: &SourceSet,
    site: &Site,
    config: &CalcConfig,
    need_deagg: bool,
) -> Result<HazardCurveSet, HazardError> {
    let mut builder = set_builder(set, config);
    let mut retained = Vec::new();
    // with grid optimization off, distant sources still zero out through
    // the GMM weight map
    let sources: Vec<&Source> = if config.performance.optimize_grids {
        set.sources_near(site).collect()
    } else {
        set.standard_sources().iter().collect()
    };
    for source in sources {
        let inputs = inputs_for_source(source, site);
        if inputs.is_empty() {
            continue;
        }
        let weights = set.gmms.weight_map(inputs.min_distance());
        let gms = ground_motions(inputs, &set.gmms, &config.hazard.imts);
        let curves = curves_for_gms(&gms, &set.gmms, config);
        builder.add_curves(&curves, &weights);
        if need_deagg {
            retained.push(SourceGroundMotions {
                source_name: source.name.clone(),
                lon: source.lon,
                lat: source.lat,
                gmm_weights: weights,
                gms,
            });
        }
    }
    if need_deagg {
        builder.retain(RetainedData::Standard(retained));
    }
    Ok(builder.build())
}

/// Joint-exceedance integration of one cluster for one (IMT, GMM).
///
/// Magnitude-variant curves are summed per fault using the variant weight
/// carried in the input rate field, combined across faults per branch via
/// `1 − Π(1 − p)`, weight-summed over branches, then scaled by the
/// cluster rate.
fn cluster_gmm_curve(
    cluster: &ClusterSource,
    fault_gms: &[SourceGroundMotions],
    imt: Imt,
    g: usize,
    config: &CalcConfig,
) -> Result<XySequence, HazardError> {
    let model = config.hazard.exceedance_model;
    let n = config.hazard.truncation_level;
    let template = config.hazard.log_model_curve(imt);

    // Fault curves are either plain sequences (scalar ground motions) or
    // parallel per-branch sequences (logic-tree ground motions); the tree
    // shape must agree across a fault's magnitude variants.
    let is_tree = fault_gms
        .iter()
        .flat_map(|f| f.gms.get(imt, g).iter())
        .any(|sgm| matches!(sgm, ScalarGroundMotion::Multi(_)));

    let combined = if is_tree {
        let mut branch_weights: Option<Vec<f64>> = None;
        let mut fault_branches: Vec<Vec<XySequence>> = Vec::with_capacity(fault_gms.len());
        for fault in fault_gms {
            let mut branches: Option<Vec<XySequence>> = None;
            for (input, sgm) in fault.gms.inputs().iter().zip(fault.gms.get(imt, g)) {
                let ScalarGroundMotion::Multi(msgm) = sgm else {
                    return Err(HazardError::InvalidModel(format!(
                        "cluster {}: mixed scalar and logic-tree ground motions",
                        cluster.name
                    )));
                };
                let (curves, weights) = model.tree_exceedance_branches(msgm, n, imt, &template);
                let branches = branches.get_or_insert_with(|| {
                    vec![template.zeroed_copy(); curves.len()]
                });
                if branches.len() != curves.len() {
                    return Err(HazardError::InvalidModel(format!(
                        "cluster {}: inconsistent logic-tree branch counts",
                        cluster.name
                    )));
                }
                for (acc, mut curve) in branches.iter_mut().zip(curves) {
                    curve.scale(input.rate);
                    acc.add(&curve);
                }
                branch_weights.get_or_insert(weights);
            }
            fault_branches.push(branches.unwrap_or_default());
        }
        let weights = branch_weights.unwrap_or_default();
        let mut combined = template.zeroed_copy();
        for (b, weight) in weights.iter().enumerate() {
            let branch_curves: Vec<XySequence> = fault_branches
                .iter()
                .filter(|f| !f.is_empty())
                .map(|f| f[b].clone())
                .collect();
            if let Some(mut joint) = joint_exceedance(&branch_curves) {
                joint.scale(*weight);
                combined.add(&joint);
            }
        }
        combined
    } else {
        let fault_curves: Vec<XySequence> = fault_gms
            .iter()
            .filter(|f| !f.gms.inputs().is_empty())
            .map(|fault| {
                let mut curve = template.zeroed_copy();
                let mut utility = template.zeroed_copy();
                for (input, sgm) in fault.gms.inputs().iter().zip(fault.gms.get(imt, g)) {
                    model.exceedance_seq(sgm.mean(), sgm.sigma(), n, imt, &mut utility);
                    utility.scale(input.rate);
                    curve.add(&utility);
                }
                curve
            })
            .collect();
        joint_exceedance(&fault_curves).unwrap_or_else(|| template.zeroed_copy())
    };

    let mut curve = combined;
    curve.scale(cluster.rate);
    Ok(curve)
}

fn cluster_curve_set(
    set: &SourceSet,
    clusters: &[ClusterSource],
    site: &Site,
    config: &CalcConfig,
    need_deagg: bool,
) -> Result<HazardCurveSet, HazardError> {
    let mut builder = set_builder(set, config);
    let mut retained = Vec::new();
    for cluster in clusters {
        let mut fault_gms: Vec<SourceGroundMotions> = cluster
            .faults
            .iter()
            .map(|fault| {
                let inputs = inputs_for_source(fault, site);
                SourceGroundMotions {
                    source_name: fault.name.clone(),
                    lon: fault.lon,
                    lat: fault.lat,
                    gmm_weights: Vec::new(),
                    gms: ground_motions(inputs, &set.gmms, &config.hazard.imts),
                }
            })
            .collect();
        let min_distance = fault_gms
            .iter()
            .map(|f| f.gms.inputs().min_distance())
            .fold(f64::INFINITY, f64::min);
        if min_distance.is_infinite() {
            continue;
        }
        let weights = set.gmms.weight_map(min_distance);
        for fault in &mut fault_gms {
            fault.gmm_weights = weights.clone();
        }

        let mut cluster_curves = BTreeMap::new();
        let mut weighted_curves = BTreeMap::new();
        for imt in &config.hazard.imts {
            let mut per_gmm = Vec::with_capacity(set.gmms.len());
            let mut per_gmm_weighted = Vec::with_capacity(set.gmms.len());
            for g in 0..set.gmms.len() {
                let mut curve = cluster_gmm_curve(cluster, &fault_gms, *imt, g, config)?;
                curve.scale(cluster.weight);
                let mut weighted = curve.clone();
                weighted.scale(weights[g] * set.weight);
                per_gmm.push(curve);
                per_gmm_weighted.push(weighted);
            }
            cluster_curves.insert(*imt, per_gmm);
            weighted_curves.insert(*imt, per_gmm_weighted);
        }
        builder.add_curves(&HazardCurves { curves: cluster_curves }, &weights);
        if need_deagg {
            let (lon, lat) = cluster
                .faults
                .first()
                .map(|f| (f.lon, f.lat))
                .unwrap_or((f64::NAN, f64::NAN));
            retained.push(ClusterGroundMotions {
                cluster_name: cluster.name.clone(),
                cluster_rate: cluster.rate,
                cluster_weight: cluster.weight,
                lon,
                lat,
                gmm_weights: weights,
                faults: fault_gms,
                curves: weighted_curves,
            });
        }
    }
    if need_deagg {
        builder.retain(RetainedData::Cluster(retained));
    }
    Ok(builder.build())
}

fn system_curve_set(
    set: &SourceSet,
    system: &SystemSourceSet,
    site: &Site,
    config: &CalcConfig,
    need_deagg: bool,
    parallel: bool,
) -> Result<HazardCurveSet, HazardError> {
    let list = system.to_inputs(&set.name, site);
    let mut builder = set_builder(set, config);
    if list.is_empty() {
        return Ok(builder.build());
    }
    let partition = config.performance.system_partition;
    let inputs = list.inputs().as_slice();
    let map = if parallel && inputs.len() > partition {
        // chunk results are concatenated in submission order so ground
        // motions stay positionally aligned with the input list and its
        // section bitsets
        let chunk_maps: Vec<_> = inputs
            .par_chunks(partition)
            .map(|chunk| evaluate_ground_motions(chunk, set.gmms.gmms(), &config.hazard.imts))
            .collect();
        concat_maps(chunk_maps)
    } else {
        evaluate_ground_motions(inputs, set.gmms.gmms(), &config.hazard.imts)
    };
    let weights = set.gmms.weight_map(list.inputs().min_distance());
    let curves = integrate_curves(inputs, |imt, g| map[&imt][g].as_slice(), &set.gmms, config);
    builder.add_curves(&curves, &weights);
    if need_deagg {
        let sections = system
            .sections
            .iter()
            .map(|section| {
                let ((lon, lat), _) = section.closest_point(site);
                SystemSectionMeta {
                    name: section.name.clone(),
                    lon,
                    lat,
                    azimuth: Haversine.bearing(site.location(), Point::new(lon, lat)),
                }
            })
            .collect();
        builder.retain(RetainedData::System(SystemGroundMotions {
            inputs: list,
            map,
            gmm_weights: weights,
            sections,
        }));
    }
    Ok(builder.build())
}

fn concat_maps(
    chunks: Vec<BTreeMap<Imt, Vec<Vec<ScalarGroundMotion>>>>,
) -> BTreeMap<Imt, Vec<Vec<ScalarGroundMotion>>> {
    let mut iter = chunks.into_iter();
    let Some(mut merged) = iter.next() else {
        return BTreeMap::new();
    };
    for chunk in iter {
        for (imt, lists) in chunk {
            let target = merged.get_mut(&imt).expect("chunks share IMT keys");
            for (t, list) in target.iter_mut().zip(lists) {
                t.extend(list);
            }
        }
    }
    merged
}
