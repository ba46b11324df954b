//! # `seismic_hazard_lib`
//!
//! **A performant, modular Rust library for computing probabilistic seismic
//! hazard (PSH) curves and their deaggregation from composite earthquake
//! source models.**
//!
//! This crate provides the hazard-calculation pipeline: for a site, every
//! rupture of every source set is transformed into a probability-of-
//! exceedance contribution, contributions are aggregated into per-IMT mean
//! hazard curves, and — optionally — the same integration is re-run while
//! binning contributions by (distance, magnitude, ε) to produce a
//! deaggregation dataset with summary statistics and ranked contributors.
//!
//! ## Features
//!
//! - Exceedance models with multiple truncation policies, IMT-dependent
//!   intensity clamps, and a precomputed CCDF table for hot paths
//!   ([`exceedance`]).
//! - Standard, cluster (joint-exceedance), and fault-system integration
//!   paths over a fan-out/fan-in Rayon pipeline ([`pipeline`]).
//! - Epistemic GMM logic trees with distance-dependent weights ([`gmm`]).
//! - Deaggregation on a 3D (r, m, ε) grid with moment-preserving means,
//!   residual tracking, and per-source contributor trees ([`deagg`]).
//! - CSV and JSON writers for curves and deaggregation datasets
//!   ([`writers`]).
//!
//! ## Module Overview
//!
//! - [`auxilary`] — Supporting numeric helpers (internal use).
//! - [`config`] — Calculation configuration with serde deserialization.
//! - [`curve`] — Log-x hazard curves and interpolation.
//! - [`deagg`] — The deaggregation calculation.
//! - [`deagg_data`] — Deaggregation grids, datasets, contributor trees.
//! - [`deagg_summary`] — Summary statistics and ranked contributors.
//! - [`errors`] — Error types.
//! - [`exceedance`] — Exceedance models and the CCDF table.
//! - [`gmm`] — Ground motion model interfaces and logic trees.
//! - [`hazard`] — Result containers for curves and retained state.
//! - [`imt`] — Intensity measure types.
//! - [`inputs`] — Rupture-site input records and lists.
//! - [`pipeline`] — The staged hazard calculation.
//! - [`source`] — Source model types (sources, clusters, systems).
//! - [`writers`] — CSV/JSON output writers.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use seismic_hazard_lib::config::CalcConfig;
//! use seismic_hazard_lib::deagg::Deaggregation;
//! use seismic_hazard_lib::pipeline::calc_hazard;
//! # fn load_model() -> seismic_hazard_lib::source::HazardModel { unimplemented!() }
//! # fn load_site() -> seismic_hazard_lib::source::Site { unimplemented!() }
//!
//! let model = load_model();
//! let site = load_site();
//! let config = Arc::new(CalcConfig::default());
//!
//! let hazard = calc_hazard(&model, &site, &config, true).unwrap();
//! let deagg = Deaggregation::at_return_period(&hazard, 2475.0, None).unwrap();
//! println!("{} IMTs deaggregated", deagg.deaggs.len());
//! ```
//!
//! ## Parallelism
//!
//! This crate uses [`Rayon`](https://docs.rs/rayon/latest/rayon/) to fan
//! source sets out across threads and to partition the large input lists
//! of fault-system source sets, with a single-threaded fallback running
//! the identical pipeline for debugging and timing. Result objects are
//! immutable and freely shared; builders are confined to one task each.
//!
//! ## License
//!
//! Licensed under the Apache License, Version 2.0
//! ([Apache-2.0](http://www.apache.org/licenses/LICENSE-2.0))

pub mod auxilary;
pub mod config;
pub mod curve;
pub mod deagg;
pub mod deagg_data;
pub mod deagg_summary;
pub mod errors;
pub mod exceedance;
pub mod gmm;
pub mod hazard;
pub mod imt;
pub mod inputs;
pub mod pipeline;
pub mod source;
pub mod writers;
