//! Rupture-site inputs to ground motion models.
//!
//! A [`HazardInput`] is the fixed-schema numeric record a GMM consumes: the
//! rupture's source parameters and source-to-site distances plus the site
//! parameters. [`InputList`] collects the inputs of one source while
//! tracking the minimum Joyner-Boore distance, which later selects the
//! distance-dependent GMM weights. [`SystemInputList`] additionally carries
//! a section-membership bitset per rupture for section-resolved
//! deaggregation.

use crate::source::{Rupture, Site};
use bitvec::vec::BitVec;
use geo::{Distance, Haversine, Point};

/// Rupture and site parameters for a single GMM evaluation.
///
/// Immutable post-construction. `rate` is the rupture's annual occurrence
/// rate; cluster sources repurpose it to carry the magnitude-variant
/// weight.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardInput {
    pub rate: f64,
    pub mw: f64,
    /// Joyner-Boore distance (km).
    pub r_jb: f64,
    /// Closest distance to rupture (km).
    pub r_rup: f64,
    /// Horizontal distance from the surface trace, positive hanging-wall
    /// side (km).
    pub r_x: f64,
    /// Dip (degrees).
    pub dip: f64,
    /// Down-dip width (km).
    pub width: f64,
    /// Depth to top of rupture (km).
    pub z_top: f64,
    /// Hypocentral depth (km).
    pub z_hyp: f64,
    /// Rake (degrees).
    pub rake: f64,
    pub vs30: f64,
    pub vs_inf: bool,
    pub z1p0: f64,
    pub z2p5: f64,
}

impl HazardInput {
    /// Build the input for one rupture relative to a site.
    ///
    /// Distances use a point-surface treatment: the Joyner-Boore distance
    /// is the epicentral distance to the rupture's surface anchor, the
    /// rupture distance folds in the depth to top, and the hypocentral
    /// depth centers the hypocenter down-dip:
    /// `zHyp = zTop + sin(dip) · width / 2`.
    pub fn from_rupture(rupture: &Rupture, site: &Site) -> Self {
        let r_epi = Haversine.distance(
            Point::new(rupture.lon, rupture.lat),
            Point::new(site.lon, site.lat),
        ) / 1000.0;
        Self::from_distance(rupture, site, r_epi)
    }

    /// As [`from_rupture`](Self::from_rupture) with a precomputed epicentral distance.
    pub fn from_distance(rupture: &Rupture, site: &Site, r_epi: f64) -> Self {
        let r_jb = r_epi;
        let r_rup = r_jb.hypot(rupture.z_top);
        let z_hyp = rupture.z_top + rupture.dip.to_radians().sin() * rupture.width * 0.5;
        Self {
            rate: rupture.rate,
            mw: rupture.mw,
            r_jb,
            r_rup,
            r_x: r_jb,
            dip: rupture.dip,
            width: rupture.width,
            z_top: rupture.z_top,
            z_hyp,
            rake: rupture.rake,
            vs30: site.vs30,
            vs_inf: site.vs_inf,
            z1p0: site.z1p0,
            z2p5: site.z2p5,
        }
    }
}

/// Append-only ordered list of the inputs of one source, with the minimum
/// rJB over all inputs tracked as they are added.
#[derive(Debug, Clone)]
pub struct InputList {
    source_name: String,
    inputs: Vec<HazardInput>,
    min_distance: f64,
}

impl InputList {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            inputs: Vec::new(),
            min_distance: f64::INFINITY,
        }
    }

    pub fn push(&mut self, input: HazardInput) {
        self.min_distance = self.min_distance.min(input.r_jb);
        self.inputs.push(input);
    }

    /// Name of the parent source (or source set for system lists).
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Minimum rJB over all inputs; infinite while empty.
    pub fn min_distance(&self) -> f64 {
        self.min_distance
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HazardInput> {
        self.inputs.iter()
    }

    pub fn as_slice(&self) -> &[HazardInput] {
        &self.inputs
    }
}

impl std::ops::Index<usize> for InputList {
    type Output = HazardInput;

    fn index(&self, i: usize) -> &HazardInput {
        &self.inputs[i]
    }
}

impl<'a> IntoIterator for &'a InputList {
    type Item = &'a HazardInput;
    type IntoIter = std::slice::Iter<'a, HazardInput>;

    fn into_iter(self) -> Self::IntoIter {
        self.inputs.iter()
    }
}

/// The input list of a system source set: one input per rupture plus a
/// bitset over section indices recording which sections each rupture
/// breaks, and the ordered set of distinct section indices encountered.
///
/// Bitsets are indexed positionally against the input list, so downstream
/// consumers depend on insertion order being preserved.
#[derive(Debug, Clone)]
pub struct SystemInputList {
    inputs: InputList,
    bitsets: Vec<BitVec>,
    sections: Vec<usize>,
}

impl SystemInputList {
    pub fn new(source_set_name: impl Into<String>) -> Self {
        Self {
            inputs: InputList::new(source_set_name),
            bitsets: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Append an input and the section bitset of its rupture.
    pub fn push(&mut self, input: HazardInput, bitset: BitVec) {
        for section in bitset.iter_ones() {
            if !self.sections.contains(&section) {
                self.sections.push(section);
            }
        }
        self.inputs.push(input);
        self.bitsets.push(bitset);
    }

    pub fn inputs(&self) -> &InputList {
        &self.inputs
    }

    pub fn bitsets(&self) -> &[BitVec] {
        &self.bitsets
    }

    /// Distinct section indices in first-encountered order.
    pub fn sections(&self) -> &[usize] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auxilary::approx_equal;
    use bitvec::bitvec;
    use bitvec::order::Lsb0;

    fn rupture(rate: f64, mw: f64) -> Rupture {
        Rupture {
            mw,
            rate,
            lon: 143.0,
            lat: 51.0,
            z_top: 5.0,
            dip: 90.0,
            width: 10.0,
            rake: 0.0,
        }
    }

    #[test]
    fn test_input_distances() {
        let site = Site::new("s", 143.0, 51.0, 760.0);
        let input = HazardInput::from_distance(&rupture(1e-4, 6.5), &site, 12.0);
        assert!(approx_equal(input.r_jb, 12.0, 1e-12));
        assert!(approx_equal(input.r_rup, (144.0_f64 + 25.0).sqrt(), 1e-12));
        // vertical fault: hypocenter centered down-dip
        assert!(approx_equal(input.z_hyp, 10.0, 1e-9));
    }

    #[test]
    fn test_min_distance_tracking() {
        let site = Site::new("s", 143.0, 51.0, 760.0);
        let mut list = InputList::new("src");
        assert!(list.min_distance().is_infinite());
        list.push(HazardInput::from_distance(&rupture(1e-4, 6.5), &site, 30.0));
        list.push(HazardInput::from_distance(&rupture(1e-4, 7.0), &site, 10.0));
        list.push(HazardInput::from_distance(&rupture(1e-4, 7.5), &site, 20.0));
        assert_eq!(list.len(), 3);
        assert!(approx_equal(list.min_distance(), 10.0, 1e-12));
    }

    #[test]
    fn test_system_sections_in_encounter_order() {
        let site = Site::new("s", 143.0, 51.0, 760.0);
        let mut list = SystemInputList::new("sys");
        let input = HazardInput::from_distance(&rupture(1e-5, 7.0), &site, 15.0);
        list.push(input.clone(), bitvec![usize, Lsb0; 0, 0, 1, 1]);
        list.push(input.clone(), bitvec![usize, Lsb0; 1, 0, 1, 0]);
        list.push(input, bitvec![usize, Lsb0; 0, 1, 0, 0]);
        assert_eq!(list.sections(), &[2, 3, 0, 1]);
        assert_eq!(list.len(), 3);
    }
}
