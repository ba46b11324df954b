//! Intensity measure types (IMTs).
//!
//! An IMT identifies the ground-motion quantity a hazard curve is computed
//! for: peak ground acceleration, peak ground velocity, or spectral
//! acceleration at a fixed period. Units are g for PGA and SA, cm/s for PGV;
//! hazard curves store the natural log of these values on their x-axis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intensity measure type.
///
/// Spectral-acceleration variants encode their period in the name, e.g.
/// `Sa0P2` is SA at 0.2 s.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Imt {
    /// Peak ground acceleration (g).
    #[serde(rename = "PGA")]
    Pga,
    /// Peak ground velocity (cm/s).
    #[serde(rename = "PGV")]
    Pgv,
    /// Spectral acceleration at 0.1 s (g).
    #[serde(rename = "SA0P1")]
    Sa0P1,
    /// Spectral acceleration at 0.2 s (g).
    #[serde(rename = "SA0P2")]
    Sa0P2,
    /// Spectral acceleration at 0.3 s (g).
    #[serde(rename = "SA0P3")]
    Sa0P3,
    /// Spectral acceleration at 0.5 s (g).
    #[serde(rename = "SA0P5")]
    Sa0P5,
    /// Spectral acceleration at 0.75 s (g).
    #[serde(rename = "SA0P75")]
    Sa0P75,
    /// Spectral acceleration at 1.0 s (g).
    #[serde(rename = "SA1P0")]
    Sa1P0,
    /// Spectral acceleration at 2.0 s (g).
    #[serde(rename = "SA2P0")]
    Sa2P0,
    /// Spectral acceleration at 3.0 s (g).
    #[serde(rename = "SA3P0")]
    Sa3P0,
    /// Spectral acceleration at 5.0 s (g).
    #[serde(rename = "SA5P0")]
    Sa5P0,
}

/// All supported IMTs, in canonical order.
pub const ALL_IMTS: [Imt; 11] = [
    Imt::Pga,
    Imt::Pgv,
    Imt::Sa0P1,
    Imt::Sa0P2,
    Imt::Sa0P3,
    Imt::Sa0P5,
    Imt::Sa0P75,
    Imt::Sa1P0,
    Imt::Sa2P0,
    Imt::Sa3P0,
    Imt::Sa5P0,
];

impl Imt {
    /// Spectral period in seconds, or `None` for PGA and PGV.
    pub fn period(&self) -> Option<f64> {
        match self {
            Imt::Pga | Imt::Pgv => None,
            Imt::Sa0P1 => Some(0.1),
            Imt::Sa0P2 => Some(0.2),
            Imt::Sa0P3 => Some(0.3),
            Imt::Sa0P5 => Some(0.5),
            Imt::Sa0P75 => Some(0.75),
            Imt::Sa1P0 => Some(1.0),
            Imt::Sa2P0 => Some(2.0),
            Imt::Sa3P0 => Some(3.0),
            Imt::Sa5P0 => Some(5.0),
        }
    }

    /// Whether this is a spectral-acceleration IMT.
    pub fn is_sa(&self) -> bool {
        self.period().is_some()
    }

    /// Maximum credible intensity used by the CEUS exceedance-model
    /// variants, in natural-log units of the IMT's native unit.
    ///
    /// PGA is clamped at 3 g, short-period SA (period < 0.75 s) at 6 g,
    /// PGV at 400 cm/s; longer-period SA is unbounded.
    pub fn ceus_max_intensity_ln(&self) -> f64 {
        match self {
            Imt::Pga => 3.0_f64.ln(),
            Imt::Pgv => 400.0_f64.ln(),
            imt if imt.period().is_some_and(|p| p < 0.75) => 6.0_f64.ln(),
            _ => f64::INFINITY,
        }
    }
}

impl fmt::Display for Imt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Imt::Pga => "PGA",
            Imt::Pgv => "PGV",
            Imt::Sa0P1 => "SA0P1",
            Imt::Sa0P2 => "SA0P2",
            Imt::Sa0P3 => "SA0P3",
            Imt::Sa0P5 => "SA0P5",
            Imt::Sa0P75 => "SA0P75",
            Imt::Sa1P0 => "SA1P0",
            Imt::Sa2P0 => "SA2P0",
            Imt::Sa3P0 => "SA3P0",
            Imt::Sa5P0 => "SA5P0",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Imt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_IMTS
            .iter()
            .find(|imt| imt.to_string().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown IMT: {s}"))
    }
}
