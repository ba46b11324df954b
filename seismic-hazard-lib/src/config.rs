//! Calculation configuration.
//!
//! [`CalcConfig`] carries the enumerated options a calculation consumes:
//! the IMT set and exceedance policy, per-IMT model curves, performance
//! knobs, deaggregation bins and targets, and output selection. All
//! sections deserialize from JSON with serde and carry defaults matching
//! common national-model practice; [`CalcConfig::validate`] fails fast on
//! inconsistent settings before any calculation starts.

use crate::auxilary::ln_values;
use crate::curve::XySequence;
use crate::errors::HazardError;
use crate::exceedance::ExceedanceModel;
use crate::imt::Imt;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default 20-point IML grid for PGA and SA curves (g).
pub const DEFAULT_IMLS_SA: [f64; 20] = [
    0.0025, 0.0045, 0.0075, 0.0113, 0.0169, 0.0253, 0.0380, 0.0570, 0.0854, 0.128, 0.192, 0.288,
    0.432, 0.649, 0.973, 1.46, 2.19, 3.28, 4.92, 7.38,
];

/// Default 20-point IML grid for PGV curves (cm/s).
pub const DEFAULT_IMLS_PGV: [f64; 20] = [
    0.0100, 0.0177, 0.0312, 0.0552, 0.0976, 0.173, 0.305, 0.539, 0.953, 1.68, 2.98, 5.26, 9.30,
    16.4, 29.1, 51.3, 90.8, 160.0, 284.0, 501.0,
];

/// y-value format of exported curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueFormat {
    AnnualRate,
    PoissonProbability,
}

/// Output dataset selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Total,
    Gmm,
    Source,
    Binary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HazardConfig {
    /// IMTs to compute.
    pub imts: Vec<Imt>,
    pub exceedance_model: ExceedanceModel,
    /// Truncation level in σ units, where the exceedance model uses one.
    pub truncation_level: f64,
    /// Enable the additional-epistemic-uncertainty integration variant for
    /// source sets whose GMM set declares it.
    pub gmm_uncertainty: bool,
    pub value_format: ValueFormat,
    /// Timespan (years) for Poisson-probability conversion.
    pub timespan: f64,
    /// Custom per-IMT model curves as linear IMLs; IMTs without an entry
    /// use the built-in defaults.
    pub custom_model_curves: BTreeMap<Imt, Vec<f64>>,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            imts: vec![Imt::Pga, Imt::Sa0P2, Imt::Sa1P0],
            exceedance_model: ExceedanceModel::TruncationUpperOnly,
            truncation_level: 3.0,
            gmm_uncertainty: false,
            value_format: ValueFormat::AnnualRate,
            timespan: 50.0,
            custom_model_curves: BTreeMap::new(),
        }
    }
}

impl HazardConfig {
    /// The model curve for an IMT in linear units, zero-valued.
    pub fn model_curve(&self, imt: Imt) -> XySequence {
        let imls = self.model_imls(imt);
        XySequence::from_xs(imls).expect("default model curves are valid")
    }

    /// The model curve for an IMT with x in natural-log space,
    /// zero-valued. All curve arithmetic happens on this grid.
    pub fn log_model_curve(&self, imt: Imt) -> XySequence {
        let imls = ln_values(&self.model_imls(imt));
        XySequence::from_xs(imls).expect("default model curves are valid")
    }

    fn model_imls(&self, imt: Imt) -> Vec<f64> {
        if let Some(custom) = self.custom_model_curves.get(&imt) {
            return custom.clone();
        }
        match imt {
            Imt::Pgv => DEFAULT_IMLS_PGV.to_vec(),
            _ => DEFAULT_IMLS_SA.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceConfig {
    /// Worker threads for the fan-out stages; 0 uses all logical cores,
    /// 1 forces the single-threaded pipeline.
    pub thread_count: usize,
    /// Chunk size when partitioning a system source set's input list.
    pub system_partition: usize,
    /// Pre-filter gridded-seismicity sources by distance before building
    /// inputs.
    pub optimize_grids: bool,
    /// Accepted for model-preparation compatibility; the calculation
    /// pipeline does not modify grids.
    pub smooth_grids: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            thread_count: 0,
            system_partition: 1000,
            optimize_grids: true,
            smooth_grids: false,
        }
    }
}

/// Deaggregation bin limits and widths for the (r, m, ε) grid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeaggBins {
    pub r_min: f64,
    pub r_max: f64,
    pub delta_r: f64,
    pub m_min: f64,
    pub m_max: f64,
    pub delta_m: f64,
    pub eps_min: f64,
    pub eps_max: f64,
    pub delta_eps: f64,
}

impl Default for DeaggBins {
    fn default() -> Self {
        Self {
            r_min: 0.0,
            r_max: 100.0,
            delta_r: 10.0,
            m_min: 4.4,
            m_max: 6.6,
            delta_m: 0.2,
            eps_min: -3.0,
            eps_max: 3.0,
            delta_eps: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeaggConfig {
    pub bins: DeaggBins,
    /// Target return period (years) for [`crate::deagg::Deaggregation::at_return_period`].
    pub return_period: f64,
    /// Optional fixed target IML (linear units) overriding the return
    /// period.
    pub iml: Option<f64>,
    /// Ranked contributors are emitted until one falls below this percent
    /// of the total.
    pub contributor_limit: f64,
}

impl Default for DeaggConfig {
    fn default() -> Self {
        Self {
            bins: DeaggBins::default(),
            return_period: 2475.0,
            iml: None,
            contributor_limit: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub data_types: Vec<DataType>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_types: vec![DataType::Total],
        }
    }
}

/// Top-level calculation configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalcConfig {
    pub hazard: HazardConfig,
    pub performance: PerformanceConfig,
    pub deagg: DeaggConfig,
    pub output: OutputConfig,
}

impl CalcConfig {
    /// Fail-fast validation of every section.
    ///
    /// # Errors
    ///
    /// Returns [`HazardError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), HazardError> {
        if self.hazard.imts.is_empty() {
            return Err(HazardError::InvalidConfig("hazard.imts is empty".to_string()));
        }
        if !(self.hazard.truncation_level > 0.0) {
            return Err(HazardError::InvalidConfig(
                "hazard.truncationLevel must be positive".to_string(),
            ));
        }
        if !(self.hazard.timespan > 0.0) {
            return Err(HazardError::InvalidConfig(
                "hazard.timespan must be positive".to_string(),
            ));
        }
        for (imt, imls) in &self.hazard.custom_model_curves {
            if imls.len() < 2 || imls.windows(2).any(|w| w[0] >= w[1]) || imls[0] <= 0.0 {
                return Err(HazardError::InvalidConfig(format!(
                    "hazard.customModelCurves[{imt}] must be positive and strictly increasing"
                )));
            }
        }
        if self.performance.system_partition == 0 {
            return Err(HazardError::InvalidConfig(
                "performance.systemPartition must be at least 1".to_string(),
            ));
        }
        let b = &self.deagg.bins;
        for (axis, min, max, delta) in [
            ("r", b.r_min, b.r_max, b.delta_r),
            ("m", b.m_min, b.m_max, b.delta_m),
            ("ε", b.eps_min, b.eps_max, b.delta_eps),
        ] {
            if !(min < max) || !(delta > 0.0) || max - min < delta {
                return Err(HazardError::InvalidConfig(format!(
                    "deagg.bins: bad {axis} discretization [{min}, {max}] Δ{delta}"
                )));
            }
        }
        if b.eps_min < -4.0 || b.eps_max > 4.0 {
            return Err(HazardError::InvalidConfig(
                "deagg.bins: ε limits outside [-4, 4]".to_string(),
            ));
        }
        if !(self.deagg.return_period > 0.0) {
            return Err(HazardError::InvalidConfig(
                "deagg.returnPeriod must be positive".to_string(),
            ));
        }
        if let Some(iml) = self.deagg.iml {
            if !(iml > 0.0) {
                return Err(HazardError::InvalidConfig(
                    "deagg.iml must be positive".to_string(),
                ));
            }
        }
        if self.deagg.contributor_limit < 0.0 {
            return Err(HazardError::InvalidConfig(
                "deagg.contributorLimit must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(CalcConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_bins_rejected() {
        let mut config = CalcConfig::default();
        config.deagg.bins.r_max = config.deagg.bins.r_min;
        assert!(config.validate().is_err());

        let mut config = CalcConfig::default();
        config.deagg.bins.eps_min = -6.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_imts_rejected() {
        let mut config = CalcConfig::default();
        config.hazard.imts.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: CalcConfig = serde_json::from_str(
            r#"{
                "hazard": {
                    "imts": ["PGA", "SA1P0"],
                    "exceedanceModel": "TRUNCATION_OFF",
                    "valueFormat": "POISSON_PROBABILITY"
                },
                "deagg": { "returnPeriod": 475.0 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.hazard.imts, vec![Imt::Pga, Imt::Sa1P0]);
        assert_eq!(config.hazard.exceedance_model, ExceedanceModel::TruncationOff);
        assert_eq!(config.deagg.return_period, 475.0);
        // untouched sections keep defaults
        assert_eq!(config.performance.system_partition, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_model_curve_grids() {
        let config = HazardConfig::default();
        let pga = config.log_model_curve(Imt::Pga);
        assert_eq!(pga.len(), 20);
        assert!((pga.x(0) - 0.0025_f64.ln()).abs() < 1e-12);
        let pgv = config.log_model_curve(Imt::Pgv);
        assert!((pgv.x(19) - 501.0_f64.ln()).abs() < 1e-12);
    }
}
