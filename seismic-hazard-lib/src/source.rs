//! Earthquake source model types.
//!
//! A [`HazardModel`] is an iterable of [`SourceSet`]s. Each source set
//! declares a type, a logic-tree weight, and the [`GmmSet`] used to compute
//! ground motions for its ruptures. Three source-set shapes exist:
//!
//! - **standard** — a list of [`Source`]s, each an independent list of
//!   [`Rupture`]s (faults, gridded seismicity, areas, slabs, interfaces);
//! - **cluster** — [`ClusterSource`]s whose member faults rupture jointly
//!   with a single cluster rate;
//! - **system** — one enormous rupture list over a network of fault
//!   [`SystemSection`]s, each rupture a union of sections.
//!
//! Geometry construction is the model loader's concern; the types here
//! carry the already-resolved parameters the input builder needs.

use crate::errors::HazardError;
use crate::gmm::GmmSet;
use crate::inputs::{HazardInput, SystemInputList};
use bitvec::bitvec;
use bitvec::order::Lsb0;
use bitvec::vec::BitVec;
use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A site of interest with its basin and soil parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Average shear-wave velocity in the top 30 m (m/s).
    pub vs30: f64,
    /// Whether vs30 was inferred rather than measured.
    #[serde(default)]
    pub vs_inf: bool,
    /// Depth to Vs = 1.0 km/s (km); NaN when unknown.
    #[serde(default = "nan")]
    pub z1p0: f64,
    /// Depth to Vs = 2.5 km/s (km); NaN when unknown.
    #[serde(default = "nan")]
    pub z2p5: f64,
}

fn nan() -> f64 {
    f64::NAN
}

impl Site {
    pub fn new(name: impl Into<String>, lon: f64, lat: f64, vs30: f64) -> Self {
        Self {
            name: name.into(),
            lon,
            lat,
            vs30,
            vs_inf: true,
            z1p0: f64::NAN,
            z2p5: f64::NAN,
        }
    }

    pub fn location(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Source-set type tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Fault,
    Grid,
    Area,
    Slab,
    Interface,
    Cluster,
    System,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::Fault => "FAULT",
            SourceType::Grid => "GRID",
            SourceType::Area => "AREA",
            SourceType::Slab => "SLAB",
            SourceType::Interface => "INTERFACE",
            SourceType::Cluster => "CLUSTER",
            SourceType::System => "SYSTEM",
        };
        write!(f, "{s}")
    }
}

/// A single rupture: magnitude, annual rate, and resolved geometry
/// parameters at its surface anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct Rupture {
    pub mw: f64,
    /// Annual occurrence rate; magnitude-variant weight for cluster
    /// sources.
    pub rate: f64,
    pub lon: f64,
    pub lat: f64,
    /// Depth to top of rupture (km).
    pub z_top: f64,
    /// Dip (degrees).
    pub dip: f64,
    /// Down-dip width (km).
    pub width: f64,
    /// Rake (degrees).
    pub rake: f64,
}

impl Rupture {
    pub fn new(mw: f64, rate: f64, lon: f64, lat: f64, z_top: f64) -> Self {
        Self {
            mw,
            rate,
            lon,
            lat,
            z_top,
            dip: 90.0,
            width: 10.0,
            rake: 0.0,
        }
    }
}

/// An independent source: an ordered list of ruptures sharing a
/// representative surface location.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub ruptures: Vec<Rupture>,
}

impl Source {
    pub fn new(name: impl Into<String>, lon: f64, lat: f64, ruptures: Vec<Rupture>) -> Self {
        Self {
            name: name.into(),
            lon,
            lat,
            ruptures,
        }
    }

    /// Epicentral distance (km) from the source's representative location
    /// to a site.
    pub fn distance_to(&self, site: &Site) -> f64 {
        Haversine.distance(Point::new(self.lon, self.lat), site.location()) / 1000.0
    }

    /// Azimuth (degrees) from a site to the source.
    pub fn azimuth_from(&self, site: &Site) -> f64 {
        Haversine.bearing(site.location(), Point::new(self.lon, self.lat))
    }
}

/// A set of faults that rupture jointly or not at all, with a single
/// cluster rate and weight.
///
/// Each member fault's "ruptures" are its magnitude variants; their `rate`
/// fields carry the variant weights, which sum to one per fault.
#[derive(Debug, Clone)]
pub struct ClusterSource {
    pub name: String,
    /// Annual rate of the whole-cluster event.
    pub rate: f64,
    /// Logic-tree weight of this cluster within its source set.
    pub weight: f64,
    pub faults: Vec<Source>,
}

/// A fault section of a system source set, identified by index, with the
/// trace of its upper edge.
#[derive(Debug, Clone)]
pub struct SystemSection {
    pub name: String,
    /// Upper-edge trace as (lon, lat) vertices.
    pub trace: Vec<(f64, f64)>,
}

impl SystemSection {
    /// Closest trace vertex to a site and its distance (km).
    pub fn closest_point(&self, site: &Site) -> ((f64, f64), f64) {
        let mut best = (self.trace[0], f64::INFINITY);
        for &(lon, lat) in &self.trace {
            let d = Haversine.distance(Point::new(lon, lat), site.location()) / 1000.0;
            if d < best.1 {
                best = ((lon, lat), d);
            }
        }
        best
    }
}

/// A rupture of a system source set: a union of sections.
#[derive(Debug, Clone)]
pub struct SystemRupture {
    pub mw: f64,
    pub rate: f64,
    pub z_top: f64,
    pub dip: f64,
    pub width: f64,
    pub rake: f64,
    /// Indices into the parent set's section list.
    pub sections: Vec<usize>,
}

/// A fault-system source set: interconnected sections and one rupture per
/// source.
#[derive(Debug, Clone)]
pub struct SystemSourceSet {
    pub sections: Vec<SystemSection>,
    pub ruptures: Vec<SystemRupture>,
}

impl SystemSourceSet {
    /// Materialize the single large input list for a site, with one input
    /// per rupture and the section-membership bitset each rupture carries.
    ///
    /// A rupture's surface anchor is the closest upper-edge vertex among
    /// its sections; ordering of the produced list follows rupture order
    /// and must be preserved through the ground-motion stage.
    pub fn to_inputs(&self, set_name: &str, site: &Site) -> SystemInputList {
        let section_distances: Vec<f64> = self
            .sections
            .iter()
            .map(|s| s.closest_point(site).1)
            .collect();
        let mut list = SystemInputList::new(set_name);
        for rupture in &self.ruptures {
            let r_epi = rupture
                .sections
                .iter()
                .map(|i| section_distances[*i])
                .fold(f64::INFINITY, f64::min);
            let anchor = Rupture {
                mw: rupture.mw,
                rate: rupture.rate,
                lon: 0.0,
                lat: 0.0,
                z_top: rupture.z_top,
                dip: rupture.dip,
                width: rupture.width,
                rake: rupture.rake,
            };
            let input = HazardInput::from_distance(&anchor, site, r_epi);
            let mut bitset: BitVec = bitvec![usize, Lsb0; 0; self.sections.len()];
            for i in &rupture.sections {
                bitset.set(*i, true);
            }
            list.push(input, bitset);
        }
        list
    }

    /// (min, max) moment magnitude over all ruptures.
    pub fn mw_range(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for r in &self.ruptures {
            min = min.min(r.mw);
            max = max.max(r.mw);
        }
        (min, max)
    }
}

/// The sources carried by a [`SourceSet`], by shape.
#[derive(Debug, Clone)]
pub enum SourceSetSources {
    Standard(Vec<Source>),
    Cluster(Vec<ClusterSource>),
    System(SystemSourceSet),
}

/// A weighted collection of sources sharing a type and a GMM set.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub name: String,
    pub source_type: SourceType,
    /// Logic-tree weight applied to all ruptures in the set.
    pub weight: f64,
    pub gmms: GmmSet,
    pub sources: SourceSetSources,
}

impl SourceSet {
    /// # Errors
    ///
    /// Returns [`HazardError::InvalidModel`] when the declared type and
    /// the source shape disagree or the weight is outside (0, 1].
    pub fn new(
        name: impl Into<String>,
        source_type: SourceType,
        weight: f64,
        gmms: GmmSet,
        sources: SourceSetSources,
    ) -> Result<Self, HazardError> {
        let name = name.into();
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(HazardError::InvalidModel(format!(
                "source set {name}: weight {weight} outside (0, 1]"
            )));
        }
        let shape_ok = matches!(
            (&source_type, &sources),
            (SourceType::Cluster, SourceSetSources::Cluster(_))
                | (SourceType::System, SourceSetSources::System(_))
                | (
                    SourceType::Fault
                        | SourceType::Grid
                        | SourceType::Area
                        | SourceType::Slab
                        | SourceType::Interface,
                    SourceSetSources::Standard(_)
                )
        );
        if !shape_ok {
            return Err(HazardError::InvalidModel(format!(
                "source set {name}: type {source_type} does not match source shape"
            )));
        }
        Ok(Self {
            name,
            source_type,
            weight,
            gmms,
            sources,
        })
    }

    /// The sources of a standard set; empty for cluster and system sets,
    /// which have dedicated paths.
    pub fn standard_sources(&self) -> &[Source] {
        match &self.sources {
            SourceSetSources::Standard(s) => s,
            _ => &[],
        }
    }

    /// Standard sources within the GMM set's maximum distance of the site.
    pub fn sources_near<'a>(&'a self, site: &'a Site) -> impl Iterator<Item = &'a Source> + 'a {
        let max = self.gmms.max_distance();
        self.standard_sources()
            .iter()
            .filter(move |s| s.distance_to(site) <= max)
    }
}

/// A composite hazard model: an iterable of source sets.
#[derive(Debug, Clone)]
pub struct HazardModel {
    pub name: String,
    source_sets: Vec<SourceSet>,
}

impl HazardModel {
    pub fn new(name: impl Into<String>, source_sets: Vec<SourceSet>) -> Result<Self, HazardError> {
        if source_sets.is_empty() {
            return Err(HazardError::InvalidModel(
                "model contains no source sets".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            source_sets,
        })
    }

    pub fn source_sets(&self) -> &[SourceSet] {
        &self.source_sets
    }

    pub fn len(&self) -> usize {
        self.source_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_sets.is_empty()
    }
}

impl<'a> IntoIterator for &'a HazardModel {
    type Item = &'a SourceSet;
    type IntoIter = std::slice::Iter<'a, SourceSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.source_sets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auxilary::approx_equal;

    #[test]
    fn test_system_to_inputs_uses_closest_section() {
        let site = Site::new("s", 143.0, 51.0, 760.0);
        let system = SystemSourceSet {
            sections: vec![
                SystemSection {
                    name: "near".to_string(),
                    trace: vec![(143.1, 51.0), (143.2, 51.0)],
                },
                SystemSection {
                    name: "far".to_string(),
                    trace: vec![(144.5, 51.0)],
                },
            ],
            ruptures: vec![SystemRupture {
                mw: 7.0,
                rate: 1e-5,
                z_top: 2.0,
                dip: 90.0,
                width: 12.0,
                rake: 0.0,
                sections: vec![0, 1],
            }],
        };
        let list = system.to_inputs("sys", &site);
        assert_eq!(list.len(), 1);
        let near_d = system.sections[0].closest_point(&site).1;
        assert!(approx_equal(list.inputs()[0].r_jb, near_d, 1e-9));
        assert_eq!(list.sections(), &[0, 1]);
    }

    #[test]
    fn test_mw_range() {
        let system = SystemSourceSet {
            sections: vec![],
            ruptures: vec![
                SystemRupture {
                    mw: 6.53,
                    rate: 1e-5,
                    z_top: 2.0,
                    dip: 90.0,
                    width: 12.0,
                    rake: 0.0,
                    sections: vec![],
                },
                SystemRupture {
                    mw: 7.84,
                    rate: 1e-6,
                    z_top: 2.0,
                    dip: 90.0,
                    width: 12.0,
                    rake: 0.0,
                    sections: vec![],
                },
            ],
        };
        let (min, max) = system.mw_range();
        assert!(approx_equal(min, 6.53, 1e-12));
        assert!(approx_equal(max, 7.84, 1e-12));
    }
}
