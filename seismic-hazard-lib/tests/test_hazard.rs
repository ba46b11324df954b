use seismic_hazard_lib::auxilary::approx_equal;
use seismic_hazard_lib::config::CalcConfig;
use seismic_hazard_lib::exceedance::{phi_bar, ExceedanceModel};
use seismic_hazard_lib::gmm::{
    EpistemicUncertainty, Gmm, GmmSet, GroundMotionModeling, MultiScalarGroundMotion,
    ScalarGroundMotion,
};
use seismic_hazard_lib::imt::Imt;
use seismic_hazard_lib::inputs::HazardInput;
use seismic_hazard_lib::pipeline::{calc_hazard, calc_hazard_serial};
use seismic_hazard_lib::source::{
    ClusterSource, HazardModel, Rupture, Site, Source, SourceSet, SourceSetSources, SourceType,
    SystemRupture, SystemSection, SystemSourceSet,
};
use std::error::Error;
use std::sync::Arc;

const SITE_LON: f64 = 143.0;
const SITE_LAT: f64 = 51.0;
const HALF_G: f64 = 0.5;

/// A GMM returning a fixed (μ, σ) regardless of the input.
#[derive(Debug)]
struct FixedGmm {
    mean: f64,
    sigma: f64,
}

impl GroundMotionModeling for FixedGmm {
    fn calc(&self, _input: &HazardInput, _imt: Imt) -> ScalarGroundMotion {
        ScalarGroundMotion::single(self.mean, self.sigma)
    }
}

/// A GMM returning a fixed two-branch mean logic tree.
#[derive(Debug)]
struct FixedTreeGmm;

impl GroundMotionModeling for FixedTreeGmm {
    fn calc(&self, _input: &HazardInput, _imt: Imt) -> ScalarGroundMotion {
        ScalarGroundMotion::Multi(
            MultiScalarGroundMotion::new(
                vec![0.4_f64.ln(), 0.6_f64.ln()],
                vec![0.3, 0.7],
                vec![0.5],
                vec![1.0],
            )
            .unwrap(),
        )
    }
}

fn site() -> Site {
    Site::new("test site", SITE_LON, SITE_LAT, 760.0)
}

fn fixed_gmm_set() -> GmmSet {
    GmmSet::new(
        vec![Gmm::new(
            "FIXED",
            Arc::new(FixedGmm {
                mean: HALF_G.ln(),
                sigma: 0.5,
            }),
        )],
        vec![1.0],
        2000.0,
    )
    .unwrap()
}

fn pga_config() -> CalcConfig {
    let mut config = CalcConfig::default();
    config.hazard.imts = vec![Imt::Pga];
    config.hazard.exceedance_model = ExceedanceModel::TruncationOff;
    config
        .hazard
        .custom_model_curves
        .insert(Imt::Pga, vec![0.1, 0.5, 1.0]);
    config
}

fn single_rupture_set(rate: f64, gmms: GmmSet) -> SourceSet {
    let rupture = Rupture::new(6.5, rate, SITE_LON, SITE_LAT, 0.0);
    SourceSet::new(
        "single source",
        SourceType::Fault,
        1.0,
        gmms,
        SourceSetSources::Standard(vec![Source::new(
            "the fault",
            SITE_LON,
            SITE_LAT,
            vec![rupture],
        )]),
    )
    .unwrap()
}

#[test]
fn test_single_source_scalar_gmm() -> Result<(), Box<dyn Error>> {
    // one rupture at rate 1e-3, GMM at μ = ln 0.5: the curve ordinate at
    // 0.5 g is Φ̄(0) · rate = 5e-4
    let model = HazardModel::new("m", vec![single_rupture_set(1e-3, fixed_gmm_set())])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    let curve = hazard.total_curve(Imt::Pga).unwrap();
    assert!(approx_equal(curve.x(1), HALF_G.ln(), 1e-12));
    assert!(approx_equal(curve.y(1), phi_bar(0.0) * 1e-3, 1e-15));
    assert!(approx_equal(curve.y(1), 5e-4, 1e-12));
    Ok(())
}

#[test]
fn test_single_gmm_weight_one_equals_unweighted_curve() -> Result<(), Box<dyn Error>> {
    let model = HazardModel::new("m", vec![single_rupture_set(1e-3, fixed_gmm_set())])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    let set = &hazard.curve_sets[0];
    let total = &set.totals[&Imt::Pga];
    let gmm_curve = &set.curve_map[&Imt::Pga][0];
    for (a, b) in total.ys().iter().zip(gmm_curve.ys()) {
        assert!(approx_equal(*a, *b, 1e-15));
    }
    Ok(())
}

#[test]
fn test_epistemic_triple_preserves_symmetric_median() -> Result<(), Box<dyn Error>> {
    // ±0.3 branches with symmetric weights leave the median ordinate
    // unchanged: 0.185·Φ̄(0.6) + 0.63·0.5 + 0.185·Φ̄(−0.6) = 0.5
    let gmms = fixed_gmm_set()
        .with_epistemic(EpistemicUncertainty::uniform(0.3, [0.185, 0.63, 0.185]).unwrap());
    let model = HazardModel::new("m", vec![single_rupture_set(1e-3, gmms)])?;
    let mut config = pga_config();
    config.hazard.gmm_uncertainty = true;
    let hazard = calc_hazard_serial(&model, &site(), &Arc::new(config), false)?;
    let curve = hazard.total_curve(Imt::Pga).unwrap();
    let expected = (0.185 + 0.63 * phi_bar(0.0)) * 1e-3;
    assert!(approx_equal(curve.y(1), expected, 1e-15));
    assert!(approx_equal(curve.y(1), 5e-4, 1e-12));
    Ok(())
}

#[test]
fn test_logic_tree_gmm_weighted_branches() -> Result<(), Box<dyn Error>> {
    let gmms = GmmSet::new(
        vec![Gmm::new("TREE", Arc::new(FixedTreeGmm))],
        vec![1.0],
        2000.0,
    )
    .unwrap();
    let model = HazardModel::new("m", vec![single_rupture_set(1e-3, gmms)])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    let y = hazard.total_curve(Imt::Pga).unwrap().y(1);
    let x = HALF_G.ln();
    let expected = 1e-3
        * (0.3 * phi_bar((x - 0.4_f64.ln()) / 0.5) + 0.7 * phi_bar((x - 0.6_f64.ln()) / 0.5));
    assert!(approx_equal(y, expected, 1e-12));
    Ok(())
}

#[test]
fn test_two_gmm_totals_are_weighted_sums() -> Result<(), Box<dyn Error>> {
    let gmms = GmmSet::new(
        vec![
            Gmm::new(
                "A",
                Arc::new(FixedGmm {
                    mean: 0.4_f64.ln(),
                    sigma: 0.5,
                }),
            ),
            Gmm::new(
                "B",
                Arc::new(FixedGmm {
                    mean: 0.6_f64.ln(),
                    sigma: 0.6,
                }),
            ),
        ],
        vec![0.6, 0.4],
        2000.0,
    )
    .unwrap();
    let model = HazardModel::new("m", vec![single_rupture_set(1e-3, gmms)])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    let set = &hazard.curve_sets[0];
    let total = &set.totals[&Imt::Pga];
    let curves = &set.curve_map[&Imt::Pga];
    for i in 0..total.len() {
        assert!(approx_equal(total.y(i), curves[0].y(i) + curves[1].y(i), 1e-15));
    }
    // each weighted curve carries its own GMM's exceedance
    let x = HALF_G.ln();
    let expect_a = 0.6 * 1e-3 * phi_bar((x - 0.4_f64.ln()) / 0.5);
    assert!(approx_equal(curves[0].y(1), expect_a, 1e-12));
    Ok(())
}

#[test]
fn test_zero_rate_rupture_contributes_nothing() -> Result<(), Box<dyn Error>> {
    let model = HazardModel::new("m", vec![single_rupture_set(0.0, fixed_gmm_set())])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    let curve = hazard.total_curve(Imt::Pga).unwrap();
    assert!(curve.ys().iter().all(|y| *y == 0.0));
    Ok(())
}

#[test]
fn test_cluster_joint_exceedance() -> Result<(), Box<dyn Error>> {
    // two faults rupturing jointly, each with one magnitude variant at
    // weight 1; with a fixed GMM both faults exceed 0.5 g with p = 0.5,
    // so the cluster curve there is (1 − 0.5²) · clusterRate
    let cluster_fault = |name: &str| {
        Source::new(
            name,
            SITE_LON,
            SITE_LAT,
            vec![Rupture::new(6.8, 1.0, SITE_LON, SITE_LAT, 0.0)],
        )
    };
    let set = SourceSet::new(
        "cluster set",
        SourceType::Cluster,
        1.0,
        fixed_gmm_set(),
        SourceSetSources::Cluster(vec![ClusterSource {
            name: "pair".to_string(),
            rate: 1e-3,
            weight: 1.0,
            faults: vec![cluster_fault("a"), cluster_fault("b")],
        }]),
    )
    .unwrap();
    let model = HazardModel::new("m", vec![set])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    let y = hazard.total_curve(Imt::Pga).unwrap().y(1);
    let p = phi_bar(0.0);
    assert!(approx_equal(y, (1.0 - (1.0 - p) * (1.0 - p)) * 1e-3, 1e-15));
    assert!(approx_equal(y, 0.75e-3, 1e-12));
    Ok(())
}

fn multi_set_model() -> HazardModel {
    let standard = single_rupture_set(1e-3, fixed_gmm_set());
    let grid_sources: Vec<Source> = (0..6)
        .map(|i| {
            let lon = SITE_LON + 0.1 * i as f64;
            let ruptures = (0..4)
                .map(|j| Rupture::new(5.1 + 0.4 * j as f64, 1e-4 / (j + 1) as f64, lon, SITE_LAT, 5.0))
                .collect();
            Source::new(format!("grid {i}"), lon, SITE_LAT, ruptures)
        })
        .collect();
    let grid = SourceSet::new(
        "grid set",
        SourceType::Grid,
        0.8,
        fixed_gmm_set(),
        SourceSetSources::Standard(grid_sources),
    )
    .unwrap();
    let system = SourceSet::new(
        "system set",
        SourceType::System,
        1.0,
        fixed_gmm_set(),
        SourceSetSources::System(SystemSourceSet {
            sections: vec![
                SystemSection {
                    name: "s0".to_string(),
                    trace: vec![(SITE_LON + 0.05, SITE_LAT)],
                },
                SystemSection {
                    name: "s1".to_string(),
                    trace: vec![(SITE_LON + 0.15, SITE_LAT)],
                },
            ],
            ruptures: vec![
                SystemRupture {
                    mw: 6.5,
                    rate: 2e-4,
                    z_top: 1.0,
                    dip: 90.0,
                    width: 12.0,
                    rake: 0.0,
                    sections: vec![0],
                },
                SystemRupture {
                    mw: 7.0,
                    rate: 1e-4,
                    z_top: 1.0,
                    dip: 90.0,
                    width: 12.0,
                    rake: 0.0,
                    sections: vec![0, 1],
                },
            ],
        }),
    )
    .unwrap();
    HazardModel::new("multi", vec![standard, grid, system]).unwrap()
}

#[test]
fn test_parallel_matches_serial() -> Result<(), Box<dyn Error>> {
    let model = multi_set_model();
    let config = Arc::new(pga_config());
    let serial = calc_hazard_serial(&model, &site(), &config, false)?;
    let parallel = calc_hazard(&model, &site(), &config, false)?;
    for (imt, curve) in &serial.total_curves {
        let other = parallel.total_curve(*imt).unwrap();
        for (a, b) in curve.ys().iter().zip(other.ys()) {
            if *a == 0.0 {
                assert_eq!(*b, 0.0);
            } else {
                assert!((a - b).abs() / a.abs() < 1e-12);
            }
        }
    }
    Ok(())
}

#[test]
fn test_repeated_runs_are_identical() -> Result<(), Box<dyn Error>> {
    let model = multi_set_model();
    let config = Arc::new(pga_config());
    let first = calc_hazard_serial(&model, &site(), &config, false)?;
    let second = calc_hazard_serial(&model, &site(), &config, false)?;
    for (imt, curve) in &first.total_curves {
        let other = second.total_curve(*imt).unwrap();
        assert_eq!(curve.ys(), other.ys());
    }
    Ok(())
}

#[test]
fn test_out_of_range_source_set_is_empty() -> Result<(), Box<dyn Error>> {
    // every source beyond the GMM set's maximum distance: nothing
    // contributes, the consolidated set is empty
    let gmms = GmmSet::new(
        vec![Gmm::new(
            "FIXED",
            Arc::new(FixedGmm {
                mean: HALF_G.ln(),
                sigma: 0.5,
            }),
        )],
        vec![1.0],
        50.0,
    )
    .unwrap();
    let far = Rupture::new(6.5, 1e-3, SITE_LON + 5.0, SITE_LAT, 0.0);
    let set = SourceSet::new(
        "far set",
        SourceType::Fault,
        1.0,
        gmms,
        SourceSetSources::Standard(vec![Source::new("far", SITE_LON + 5.0, SITE_LAT, vec![far])]),
    )
    .unwrap();
    let model = HazardModel::new("m", vec![set])?;
    let config = Arc::new(pga_config());
    let hazard = calc_hazard_serial(&model, &site(), &config, false)?;
    assert!(hazard.curve_sets[0].is_empty());
    let curve = hazard.total_curve(Imt::Pga).unwrap();
    assert!(curve.ys().iter().all(|y| *y == 0.0));
    Ok(())
}
