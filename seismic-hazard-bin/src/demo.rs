//! A small built-in hazard model standing in for an external model loader.
//!
//! Four source sets exercise every integration path: a two-fault set, a
//! gridded-seismicity set, a two-fault cluster, and a three-section fault
//! system. Ground motions come from simple closed-form attenuation models,
//! one of which exposes a mean logic tree.

use seismic_hazard_lib::errors::HazardError;
use seismic_hazard_lib::gmm::{
    EpistemicUncertainty, Gmm, GmmSet, GroundMotionModeling, MultiScalarGroundMotion,
    ScalarGroundMotion,
};
use seismic_hazard_lib::imt::Imt;
use seismic_hazard_lib::inputs::HazardInput;
use seismic_hazard_lib::source::{
    ClusterSource, HazardModel, Rupture, Source, SourceSet, SourceSetSources, SourceType,
    SystemRupture, SystemSection, SystemSourceSet,
};
use std::sync::Arc;

/// Magnitude- and distance-scaled attenuation with a vs30 site term.
#[derive(Debug)]
struct DemoAttenuation {
    c0: f64,
    c1: f64,
    c2: f64,
    sigma: f64,
}

impl DemoAttenuation {
    fn median_ln(&self, input: &HazardInput, imt: Imt) -> f64 {
        let period_term = match imt.period() {
            Some(p) => -0.3 * (p / 0.2).ln().abs(),
            None => 0.0,
        };
        let site_term = -0.4 * (input.vs30 / 760.0).ln();
        self.c0 + self.c1 * (input.mw - 6.0) - self.c2 * (input.r_rup + 10.0).ln()
            + period_term
            + site_term
    }
}

impl GroundMotionModeling for DemoAttenuation {
    fn calc(&self, input: &HazardInput, imt: Imt) -> ScalarGroundMotion {
        ScalarGroundMotion::single(self.median_ln(input, imt), self.sigma)
    }
}

/// Wraps an attenuation model in a ±ε mean logic tree.
#[derive(Debug)]
struct DemoTreeAttenuation {
    base: DemoAttenuation,
    epsilon: f64,
}

impl GroundMotionModeling for DemoTreeAttenuation {
    fn calc(&self, input: &HazardInput, imt: Imt) -> ScalarGroundMotion {
        let median = self.base.median_ln(input, imt);
        let msgm = MultiScalarGroundMotion::new(
            vec![median - self.epsilon, median, median + self.epsilon],
            vec![0.2, 0.6, 0.2],
            vec![self.base.sigma],
            vec![1.0],
        )
        .expect("demo logic-tree weights are valid");
        ScalarGroundMotion::Multi(msgm)
    }
}

fn demo_gmms() -> Result<GmmSet, HazardError> {
    let gmm_a = Gmm::new(
        "DEMO_ATTEN_A",
        Arc::new(DemoAttenuation {
            c0: 1.2,
            c1: 0.9,
            c2: 1.1,
            sigma: 0.65,
        }),
    );
    let gmm_b = Gmm::new(
        "DEMO_ATTEN_B",
        Arc::new(DemoAttenuation {
            c0: 0.9,
            c1: 1.0,
            c2: 1.0,
            sigma: 0.60,
        }),
    );
    let gmm_tree = Gmm::new(
        "DEMO_ATTEN_TREE",
        Arc::new(DemoTreeAttenuation {
            base: DemoAttenuation {
                c0: 1.0,
                c1: 0.95,
                c2: 1.05,
                sigma: 0.62,
            },
            epsilon: 0.25,
        }),
    );
    GmmSet::new(vec![gmm_a, gmm_b, gmm_tree], vec![0.4, 0.35, 0.25], 500.0)
        .map(|set| set.with_epistemic(EpistemicUncertainty::nshm_wus()))
}

fn gr_rates(mw_min: f64, a: f64, b: f64, n: usize) -> Vec<(f64, f64)> {
    // incremental Gutenberg-Richter rates at 0.2-Mw spacing
    (0..n)
        .map(|i| {
            let mw = mw_min + i as f64 * 0.2;
            let rate = 10f64.powf(a - b * mw) - 10f64.powf(a - b * (mw + 0.2));
            (mw + 0.1, rate)
        })
        .collect()
}

fn fault_source(name: &str, lon: f64, lat: f64, mw: f64, rate: f64) -> Source {
    Source::new(
        name,
        lon,
        lat,
        vec![Rupture {
            mw,
            rate,
            lon,
            lat,
            z_top: 1.0,
            dip: 60.0,
            width: 14.0,
            rake: 90.0,
        }],
    )
}

fn fault_set(gmms: GmmSet) -> Result<SourceSet, HazardError> {
    SourceSet::new(
        "demo faults",
        SourceType::Fault,
        1.0,
        gmms,
        SourceSetSources::Standard(vec![
            fault_source("alpha fault", 142.75, 50.95, 7.1, 2.5e-4),
            fault_source("beta fault", 143.30, 51.25, 6.6, 8.0e-4),
        ]),
    )
}

fn grid_set(gmms: GmmSet) -> Result<SourceSet, HazardError> {
    let mut sources = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            let lon = 142.4 + 0.3 * i as f64;
            let lat = 50.6 + 0.3 * j as f64;
            let ruptures = gr_rates(5.0, 2.2, 0.9, 8)
                .into_iter()
                .map(|(mw, rate)| Rupture::new(mw, rate / 25.0, lon, lat, 8.0))
                .collect();
            sources.push(Source::new(format!("grid {i}-{j}"), lon, lat, ruptures));
        }
    }
    SourceSet::new(
        "demo grid",
        SourceType::Grid,
        1.0,
        gmms,
        SourceSetSources::Standard(sources),
    )
}

fn cluster_fault(name: &str, lon: f64, lat: f64, mws: [f64; 2]) -> Source {
    // rates carry the magnitude-variant weights
    Source::new(
        name,
        lon,
        lat,
        mws.iter()
            .zip([0.6, 0.4])
            .map(|(mw, weight)| Rupture {
                mw: *mw,
                rate: weight,
                lon,
                lat,
                z_top: 2.0,
                dip: 50.0,
                width: 15.0,
                rake: 90.0,
            })
            .collect(),
    )
}

fn cluster_set(gmms: GmmSet) -> Result<SourceSet, HazardError> {
    SourceSet::new(
        "demo cluster",
        SourceType::Cluster,
        1.0,
        gmms,
        SourceSetSources::Cluster(vec![ClusterSource {
            name: "paired rupture".to_string(),
            rate: 1.0 / 1500.0,
            weight: 1.0,
            faults: vec![
                cluster_fault("north strand", 142.95, 51.05, [6.7, 6.9]),
                cluster_fault("south strand", 142.90, 50.85, [6.5, 6.8]),
            ],
        }]),
    )
}

fn system_set(gmms: GmmSet) -> Result<SourceSet, HazardError> {
    let sections = vec![
        SystemSection {
            name: "section A".to_string(),
            trace: vec![(142.8, 51.0), (142.9, 51.05)],
        },
        SystemSection {
            name: "section B".to_string(),
            trace: vec![(142.9, 51.05), (143.0, 51.1)],
        },
        SystemSection {
            name: "section C".to_string(),
            trace: vec![(143.0, 51.1), (143.1, 51.15)],
        },
    ];
    let rupture = |mw: f64, rate: f64, sections: Vec<usize>| SystemRupture {
        mw,
        rate,
        z_top: 1.5,
        dip: 75.0,
        width: 13.0,
        rake: 180.0,
        sections,
    };
    SourceSet::new(
        "demo system",
        SourceType::System,
        1.0,
        gmms,
        SourceSetSources::System(SystemSourceSet {
            sections,
            ruptures: vec![
                rupture(6.6, 4.0e-4, vec![0]),
                rupture(6.7, 3.0e-4, vec![1]),
                rupture(7.0, 1.2e-4, vec![0, 1]),
                rupture(7.3, 4.0e-5, vec![0, 1, 2]),
            ],
        }),
    )
}

/// Assemble the demonstration model.
pub fn demo_model() -> Result<HazardModel, HazardError> {
    let gmms = demo_gmms()?;
    HazardModel::new(
        "demo model",
        vec![
            fault_set(gmms.clone())?,
            grid_set(gmms.clone())?,
            cluster_set(gmms.clone())?,
            system_set(gmms)?,
        ],
    )
}
