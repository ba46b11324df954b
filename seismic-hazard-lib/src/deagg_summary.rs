//! Deaggregation summary statistics and ranked contributors.
//!
//! Derives the reportable quantities from a [`DeaggDataset`]: recovered
//! rate and return period, binned/residual/trace percentages, rate-weighted
//! means, modal bins, axis discretizations, ε-interval keys, and the
//! ranked contributor list. NaN means from zero-rate datasets become
//! `None` here; nothing downstream needs to special-case them.

use crate::auxilary::TRACE_LIMIT;
use crate::deagg_data::{ContributorNode, DeaggDataset, EpsilonKey, SourceSetContributor};
use crate::source::SourceType;
use serde::Serialize;

/// The modal (r, m) bin.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RmMode {
    /// Bin-center distance (km).
    pub r: f64,
    /// Bin-center magnitude.
    pub m: f64,
    /// Rate-weighted mean distance within the bin.
    pub r_mean: f64,
    pub m_mean: f64,
    pub eps_mean: f64,
    /// Percent of the recovered rate in the bin.
    pub contribution: f64,
}

/// The modal (r, m, ε) bin.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RmeMode {
    pub r: f64,
    pub m: f64,
    pub eps: f64,
    pub contribution: f64,
}

/// Formatted (min, max, Δ) of one deaggregation axis.
#[derive(Debug, Clone, Serialize)]
pub struct AxisDiscretization {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub delta: f64,
}

/// Summary statistics of one dataset, with percentages relative to a
/// reference recovered rate (the dataset's own for a total, the parent
/// total's for a component).
#[derive(Debug, Clone, Serialize)]
pub struct DeaggSummary {
    /// Binned plus residual rate.
    pub recovered_rate: f64,
    pub recovered_return_period: f64,
    pub binned_pct: f64,
    pub residual_pct: f64,
    /// Percent held by bins each below the 0.01% trace threshold.
    pub trace_pct: f64,
    pub r_bar: Option<f64>,
    pub m_bar: Option<f64>,
    pub eps_bar: Option<f64>,
    pub rm_mode: Option<RmMode>,
    pub rme_mode: Option<RmeMode>,
    pub discretization: [AxisDiscretization; 3],
    pub epsilon_keys: Vec<EpsilonKey>,
}

fn no_nan(v: f64) -> Option<f64> {
    if v.is_nan() { None } else { Some(v) }
}

impl DeaggSummary {
    /// Summarize a dataset against a reference recovered rate.
    pub fn of(dataset: &DeaggDataset, reference_rate: f64) -> Self {
        let grid = dataset.grid();
        let pct = |rate: f64| rate * 100.0 / reference_rate;

        let mut trace = 0.0;
        for r in 0..grid.nr {
            for m in 0..grid.nm {
                let v = dataset.rm_weights.get(r, m);
                if v > 0.0 && v < TRACE_LIMIT * reference_rate {
                    trace += v;
                }
            }
        }

        let rm_mode = {
            let (ri, mi, weight) = dataset.rm_weights.max_entry();
            (weight > 0.0).then(|| RmMode {
                r: grid.r_center(ri),
                m: grid.m_center(mi),
                r_mean: dataset.rm_r_scaled.get(ri, mi) / weight,
                m_mean: dataset.rm_m_scaled.get(ri, mi) / weight,
                eps_mean: dataset.rm_e_scaled.get(ri, mi) / weight,
                contribution: pct(weight),
            })
        };

        let rme_mode = {
            let (ri, mi, ei, rate) = dataset.rme.max_entry();
            (rate > 0.0).then(|| RmeMode {
                r: grid.r_center(ri),
                m: grid.m_center(mi),
                eps: grid.eps_center(ei),
                contribution: pct(rate),
            })
        };

        Self {
            recovered_rate: dataset.total_rate(),
            recovered_return_period: 1.0 / dataset.total_rate(),
            binned_pct: pct(dataset.binned),
            residual_pct: pct(dataset.residual),
            trace_pct: pct(trace),
            r_bar: no_nan(dataset.r_bar()),
            m_bar: no_nan(dataset.m_bar()),
            eps_bar: no_nan(dataset.e_bar()),
            rm_mode,
            rme_mode,
            discretization: [
                AxisDiscretization {
                    name: "distance (km)",
                    min: grid.r_min,
                    max: grid.r_max,
                    delta: grid.delta_r,
                },
                AxisDiscretization {
                    name: "magnitude",
                    min: grid.m_min,
                    max: grid.m_max,
                    delta: grid.delta_m,
                },
                AxisDiscretization {
                    name: "epsilon",
                    min: grid.eps_min,
                    max: grid.eps_max,
                    delta: grid.delta_eps,
                },
            ],
            epsilon_keys: grid.epsilon_keys(),
        }
    }
}

/// Contributor kind tag for ranked output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributorKind {
    SourceSet,
    Source,
    Cluster,
    Section,
}

/// One entry of the ranked contributor list.
#[derive(Debug, Clone, Serialize)]
pub struct RankedContributor {
    pub name: String,
    pub kind: ContributorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    /// Percent of the reference recovered rate.
    pub contribution: f64,
    pub r_bar: Option<f64>,
    pub m_bar: Option<f64>,
    pub eps_bar: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<f64>,
    pub children: Vec<RankedContributor>,
}

fn stats_entry(
    name: &str,
    kind: ContributorKind,
    source_type: Option<SourceType>,
    stats: &crate::deagg_data::ContributorStats,
    location: Option<(f64, f64, f64)>,
    reference_rate: f64,
    children: Vec<RankedContributor>,
) -> RankedContributor {
    let total = stats.total();
    RankedContributor {
        name: name.to_string(),
        kind,
        source_type,
        contribution: total * 100.0 / reference_rate,
        r_bar: no_nan(stats.r_scaled / total),
        m_bar: no_nan(stats.m_scaled / total),
        eps_bar: no_nan(stats.e_scaled / total),
        lon: location.map(|l| l.0),
        lat: location.map(|l| l.1),
        azimuth: location.map(|l| l.2),
        children,
    }
}

fn rank_children(
    children: &[ContributorNode],
    reference_rate: f64,
    limit_pct: f64,
) -> Vec<RankedContributor> {
    let mut sorted: Vec<&ContributorNode> = children.iter().collect();
    sorted.sort_by(|a, b| {
        b.stats()
            .total()
            .partial_cmp(&a.stats().total())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut out = Vec::new();
    for node in sorted {
        let pct = node.stats().total() * 100.0 / reference_rate;
        if pct < limit_pct {
            break; // list is sorted; everything after is smaller
        }
        let entry = match node {
            ContributorNode::Source(c) => stats_entry(
                &c.name,
                ContributorKind::Source,
                None,
                &c.stats,
                Some((c.lon, c.lat, c.azimuth)),
                reference_rate,
                Vec::new(),
            ),
            ContributorNode::Cluster(c) => {
                let mut fault_entries = Vec::new();
                let mut faults: Vec<_> = c.children.iter().collect();
                faults.sort_by(|a, b| {
                    b.stats
                        .total()
                        .partial_cmp(&a.stats.total())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                for fault in faults {
                    let fault_pct = fault.stats.total() * 100.0 / reference_rate;
                    if fault_pct < limit_pct {
                        break;
                    }
                    fault_entries.push(stats_entry(
                        &fault.name,
                        ContributorKind::Source,
                        None,
                        &fault.stats,
                        Some((fault.lon, fault.lat, fault.azimuth)),
                        reference_rate,
                        Vec::new(),
                    ));
                }
                stats_entry(
                    &c.name,
                    ContributorKind::Cluster,
                    None,
                    &c.stats,
                    Some((c.lon, c.lat, c.azimuth)),
                    reference_rate,
                    fault_entries,
                )
            }
            ContributorNode::Section(c) => stats_entry(
                &c.name,
                ContributorKind::Section,
                None,
                &c.stats,
                Some((c.lon, c.lat, c.azimuth)),
                reference_rate,
                Vec::new(),
            ),
        };
        out.push(entry);
    }
    out
}

/// Rank a dataset's source-set contributors descending by total rate,
/// emitting entries (and their children, likewise ranked) until one falls
/// below `limit_pct` percent of `reference_rate`.
///
/// The short-circuit relies on the list being pre-sorted.
pub fn ranked_contributors(
    dataset: &DeaggDataset,
    reference_rate: f64,
    limit_pct: f64,
) -> Vec<RankedContributor> {
    let mut sets: Vec<&SourceSetContributor> = dataset.contributors.iter().collect();
    sets.sort_by(|a, b| {
        b.stats
            .total()
            .partial_cmp(&a.stats.total())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut out = Vec::new();
    for set in sets {
        let pct = set.stats.total() * 100.0 / reference_rate;
        if pct < limit_pct {
            break;
        }
        out.push(stats_entry(
            &set.name,
            ContributorKind::SourceSet,
            Some(set.source_type),
            &set.stats,
            None,
            reference_rate,
            rank_children(&set.children, reference_rate, limit_pct),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeaggBins;
    use crate::deagg_data::{DeaggDatasetBuilder, DeaggGrid};
    use std::sync::Arc;

    fn dataset_with(ruptures: &[(f64, f64, f64, f64)]) -> DeaggDataset {
        let grid = Arc::new(DeaggGrid::new(&DeaggBins::default()).unwrap());
        let mut builder = DeaggDatasetBuilder::new(grid);
        for (r, m, eps, rate) in ruptures {
            builder.add_rupture(*r, *m, *eps, *rate);
        }
        builder.build()
    }

    #[test]
    fn test_summary_modes_and_totals() {
        let d = dataset_with(&[
            (15.0, 6.5, 0.2, 3e-4),
            (25.0, 5.5, 1.1, 1e-4),
            (500.0, 6.0, 0.0, 1e-4), // residual
        ]);
        let summary = DeaggSummary::of(&d, d.total_rate());
        assert!((summary.recovered_rate - 5e-4).abs() < 1e-12);
        assert!((summary.binned_pct - 80.0).abs() < 1e-9);
        assert!((summary.residual_pct - 20.0).abs() < 1e-9);
        let mode = summary.rm_mode.unwrap();
        assert!((mode.r - 15.0).abs() < 1e-9);
        assert!((mode.m - 6.5).abs() < 1e-9);
        assert!((mode.contribution - 60.0).abs() < 1e-9);
        // in-bin means recover the contributing rupture exactly
        assert!((mode.r_mean - 15.0).abs() < 1e-9);
        assert!((mode.eps_mean - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset_has_no_modes_or_means() {
        let d = dataset_with(&[]);
        let summary = DeaggSummary::of(&d, 1.0);
        assert!(summary.r_bar.is_none());
        assert!(summary.rm_mode.is_none());
        assert!(summary.rme_mode.is_none());
    }

    #[test]
    fn test_trace_accumulates_tiny_bins() {
        // one dominant bin and one bin below the 0.01% threshold
        let d = dataset_with(&[(15.0, 6.5, 0.0, 1.0), (45.0, 5.5, 0.0, 5e-6)]);
        let summary = DeaggSummary::of(&d, d.total_rate());
        assert!(summary.trace_pct > 0.0);
        assert!(summary.trace_pct < 0.01);
    }
}
