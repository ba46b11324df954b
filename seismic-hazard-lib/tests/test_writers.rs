use seismic_hazard_lib::auxilary::approx_equal;
use seismic_hazard_lib::config::{CalcConfig, ValueFormat};
use seismic_hazard_lib::deagg::Deaggregation;
use seismic_hazard_lib::exceedance::ExceedanceModel;
use seismic_hazard_lib::gmm::{Gmm, GmmSet, GroundMotionModeling, ScalarGroundMotion};
use seismic_hazard_lib::imt::Imt;
use seismic_hazard_lib::inputs::HazardInput;
use seismic_hazard_lib::pipeline::calc_hazard_serial;
use seismic_hazard_lib::source::{
    HazardModel, Rupture, Site, Source, SourceSet, SourceSetSources, SourceType,
};
use seismic_hazard_lib::writers::{deagg_to_json, write_hazard_curves};
use std::error::Error;
use std::fs;
use std::sync::Arc;

const SITE_LON: f64 = 143.0;
const SITE_LAT: f64 = 51.0;

#[derive(Debug)]
struct FixedGmm;

impl GroundMotionModeling for FixedGmm {
    fn calc(&self, _input: &HazardInput, _imt: Imt) -> ScalarGroundMotion {
        ScalarGroundMotion::single(0.5_f64.ln(), 0.5)
    }
}

fn single_source_hazard(
    config: Arc<CalcConfig>,
    need_deagg: bool,
) -> Result<seismic_hazard_lib::hazard::Hazard, Box<dyn Error>> {
    let gmms = GmmSet::new(vec![Gmm::new("FIXED", Arc::new(FixedGmm))], vec![1.0], 2000.0)?;
    let set = SourceSet::new(
        "one source",
        SourceType::Fault,
        1.0,
        gmms,
        SourceSetSources::Standard(vec![Source::new(
            "the fault",
            SITE_LON,
            SITE_LAT,
            vec![Rupture::new(6.5, 1e-3, SITE_LON, SITE_LAT, 0.0)],
        )]),
    )?;
    let model = HazardModel::new("m", vec![set])?;
    let site = Site::new("site", SITE_LON, SITE_LAT, 760.0);
    Ok(calc_hazard_serial(&model, &site, &config, need_deagg)?)
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

#[test]
fn test_curve_csv_round_trip() -> Result<(), Box<dyn Error>> {
    let hazard = single_source_hazard(Arc::new(pga_config()), false)?;
    let path = std::env::temp_dir().join("seismic_hazard_test_curves.txt");
    write_hazard_curves(&hazard, &path, b'\t')?;
    let content = fs::read_to_string(&path)?;
    fs::remove_file(&path).ok();

    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "imt\timl\tvalue");
    // header plus one row per curve point
    assert_eq!(lines.len(), 1 + 3);
    // x-values exported in linear units
    let fields: Vec<&str> = lines[2].split('\t').collect();
    assert_eq!(fields[0], "PGA");
    assert!(approx_equal(fields[1].parse::<f64>()?, 0.5, 1e-9));
    let rate = fields[2].parse::<f64>()?;
    assert!(approx_equal(rate, 5e-4, 1e-9));
    Ok(())
}

#[test]
fn test_curve_csv_poisson_format() -> Result<(), Box<dyn Error>> {
    let mut config = pga_config();
    config.hazard.value_format = ValueFormat::PoissonProbability;
    config.hazard.timespan = 50.0;
    let hazard = single_source_hazard(Arc::new(config), false)?;
    let path = std::env::temp_dir().join("seismic_hazard_test_poisson.txt");
    write_hazard_curves(&hazard, &path, b'\t')?;
    let content = fs::read_to_string(&path)?;
    fs::remove_file(&path).ok();

    let annual = single_source_hazard(Arc::new(pga_config()), false)?;
    let rate = annual.total_curve(Imt::Pga).unwrap().y(1);
    let fields: Vec<&str> = content.lines().nth(2).unwrap().split('\t').collect();
    let probability = fields[2].parse::<f64>()?;
    assert!(approx_equal(probability, 1.0 - (-rate * 50.0).exp(), 1e-12));
    Ok(())
}

#[test]
fn test_deagg_json_document() -> Result<(), Box<dyn Error>> {
    let hazard = single_source_hazard(Arc::new(pga_config()), true)?;
    let deagg = Deaggregation::at_iml(&hazard, 0.5, None)?;
    let doc = deagg_to_json(&deagg);

    assert_eq!(doc["site"]["name"], "site");
    let deaggs = doc["deaggs"].as_array().unwrap();
    assert_eq!(deaggs.len(), 1);
    let entry = &deaggs[0];
    assert_eq!(entry["imt"], "PGA");
    assert!(approx_equal(entry["target"]["iml"].as_f64().unwrap(), 0.5, 1e-12));
    assert!(entry["summary"]["recovered_rate"].as_f64().unwrap() > 0.0);
    assert!(!entry["contributors"].as_array().unwrap().is_empty());
    Ok(())
}
