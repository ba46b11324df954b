//! # Data Writers for Hazard and Deaggregation Results
//!
//! This module serializes calculation results to delimited text files and
//! JSON documents.
//!
//! ## Features
//!
//! - Hazard curves to CSV with configurable delimiter; x-values are
//!   converted back to linear units and y-values to the configured
//!   [`ValueFormat`](crate::config::ValueFormat) (annual rate or Poisson probability).
//! - Deaggregation (r, m, ε) tables to CSV, non-empty bins only.
//! - Full deaggregation documents — per-IMT summary, ranked contributors,
//!   and binned data — to JSON.
//!
//! ## Example Output Format (tab-delimited curves)
//!
//! ```text
//! imt	iml	value
//! PGA	0.0025	0.015231
//! PGA	0.0045	0.012456
//! ```
//!
//! ## See Also
//!
//! - [`crate::hazard::Hazard`]
//! - [`crate::deagg::Deaggregation`]
//! - [`csv`](https://docs.rs/csv/)

use crate::config::{DataType, ValueFormat};
use crate::deagg::Deaggregation;
use crate::deagg_summary::{ranked_contributors, DeaggSummary};
use crate::hazard::Hazard;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::json;
use std::error::Error;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Serialize)]
struct CurveRecord {
    imt: String,
    iml: f64,
    value: f64,
}

#[derive(Debug, Serialize)]
struct RmeRecord {
    imt: String,
    r: f64,
    m: f64,
    eps: f64,
    rate: f64,
    contribution: f64,
}

/// Write a hazard result's curves to a delimited file.
///
/// Total curves are always written; per-GMM and per-source-set curves
/// follow the `output.dataTypes` selection. y-values honor the configured
/// value format.
///
/// # Errors
///
/// Returns an error if the file cannot be created or a record fails to
/// serialize.
pub fn write_hazard_curves<P: AsRef<Path>>(
    hazard: &Hazard,
    path: P,
    delim: u8,
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut wtr = WriterBuilder::new()
        .delimiter(delim)
        .has_headers(true)
        .from_writer(file);

    let config = &hazard.config.hazard;
    let convert = |curve: &crate::curve::XySequence| match config.value_format {
        ValueFormat::AnnualRate => curve.to_linear_x(),
        ValueFormat::PoissonProbability => {
            curve.to_poisson_probability(config.timespan).to_linear_x()
        }
    };

    for (imt, curve) in &hazard.total_curves {
        let out = convert(curve);
        for i in 0..out.len() {
            wtr.serialize(CurveRecord {
                imt: imt.to_string(),
                iml: out.x(i),
                value: out.y(i),
            })?;
        }
    }

    let data_types = &hazard.config.output.data_types;
    if data_types.contains(&DataType::Source) || data_types.contains(&DataType::Gmm) {
        for set in &hazard.curve_sets {
            for (imt, total) in &set.totals {
                if data_types.contains(&DataType::Source) {
                    let out = convert(total);
                    for i in 0..out.len() {
                        wtr.serialize(CurveRecord {
                            imt: format!("{imt}/{}", set.source_set_name),
                            iml: out.x(i),
                            value: out.y(i),
                        })?;
                    }
                }
            }
            if data_types.contains(&DataType::Gmm) {
                for (imt, curves) in &set.curve_map {
                    for (g, curve) in curves.iter().enumerate() {
                        let out = convert(curve);
                        for i in 0..out.len() {
                            wtr.serialize(CurveRecord {
                                imt: format!("{imt}/{}/{}", set.source_set_name, set.gmm_names[g]),
                                iml: out.x(i),
                                value: out.y(i),
                            })?;
                        }
                    }
                }
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Write the non-empty (r, m, ε) bins of each per-IMT total dataset to a
/// delimited file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or a record fails to
/// serialize.
pub fn write_deagg_rme<P: AsRef<Path>>(
    deagg: &Deaggregation,
    path: P,
    delim: u8,
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut wtr = WriterBuilder::new()
        .delimiter(delim)
        .has_headers(true)
        .from_writer(file);

    for (imt, imt_deagg) in &deagg.deaggs {
        let dataset = &imt_deagg.total;
        let grid = dataset.grid();
        let recovered = dataset.total_rate();
        for ri in 0..grid.nr {
            for mi in 0..grid.nm {
                for ei in 0..grid.ne {
                    let rate = dataset.rme.get(ri, mi, ei);
                    if rate == 0.0 {
                        continue;
                    }
                    wtr.serialize(RmeRecord {
                        imt: imt.to_string(),
                        r: grid.r_center(ri),
                        m: grid.m_center(mi),
                        eps: grid.eps_center(ei),
                        rate,
                        contribution: rate * 100.0 / recovered,
                    })?;
                }
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Build the JSON document for a deaggregation: per-IMT target, summary,
/// ranked contributors, per-GMM and per-type summaries.
pub fn deagg_to_json(deagg: &Deaggregation) -> serde_json::Value {
    let imts: Vec<serde_json::Value> = deagg
        .deaggs
        .iter()
        .map(|(imt, imt_deagg)| {
            let cfg = &imt_deagg.config;
            let total = &imt_deagg.total;
            let recovered = total.total_rate();
            json!({
                "imt": imt.to_string(),
                "target": {
                    "iml": cfg.iml_linear,
                    "rate": cfg.rate,
                    "returnPeriod": cfg.return_period,
                },
                "summary": DeaggSummary::of(total, recovered),
                "contributors": ranked_contributors(total, recovered, cfg.contributor_limit),
                "gmms": imt_deagg
                    .gmm_datasets
                    .iter()
                    .map(|(gmm, dataset)| json!({
                        "gmm": gmm,
                        "summary": DeaggSummary::of(dataset, recovered),
                    }))
                    .collect::<Vec<_>>(),
                "sourceTypes": imt_deagg
                    .type_datasets
                    .iter()
                    .map(|(t, dataset)| json!({
                        "type": t.to_string(),
                        "summary": DeaggSummary::of(dataset, recovered),
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "site": {
            "name": deagg.site.name,
            "lon": deagg.site.lon,
            "lat": deagg.site.lat,
            "vs30": deagg.site.vs30,
        },
        "deaggs": imts,
    })
}

/// Write the deaggregation JSON document to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_deagg_json<P: AsRef<Path>>(
    deagg: &Deaggregation,
    path: P,
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &deagg_to_json(deagg))?;
    Ok(())
}
