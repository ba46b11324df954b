//! Deaggregation datasets, grids, and contributor trees.
//!
//! A [`DeaggDataset`] bins hazard-rate contributions on a 3D
//! (distance, magnitude, ε) grid while carrying the moment sums needed for
//! rate-weighted means, a residual bucket for contributions outside the
//! grid, and a tree of [`SourceSetContributor`]s recording per-source
//! provenance. Datasets for the same grid combine by summation; the two
//! consolidator functions at the bottom of this module implement the
//! across-GMM and across-source-set folds.

use crate::auxilary::bin_count;
use crate::config::DeaggBins;
use crate::errors::HazardError;
use crate::source::SourceType;
use std::sync::Arc;

/// The (r, m, ε) discretization of a deaggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeaggGrid {
    pub r_min: f64,
    pub r_max: f64,
    pub delta_r: f64,
    pub nr: usize,
    pub m_min: f64,
    pub m_max: f64,
    pub delta_m: f64,
    pub nm: usize,
    pub eps_min: f64,
    pub eps_max: f64,
    pub delta_eps: f64,
    pub ne: usize,
}

/// A half-open ε interval `[min, max)`; the outer intervals extend to ±∞.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EpsilonKey {
    pub index: usize,
    pub min: f64,
    pub max: f64,
}

impl DeaggGrid {
    pub fn new(bins: &DeaggBins) -> Result<Self, HazardError> {
        let grid = Self {
            r_min: bins.r_min,
            r_max: bins.r_max,
            delta_r: bins.delta_r,
            nr: bin_count(bins.r_min, bins.r_max, bins.delta_r),
            m_min: bins.m_min,
            m_max: bins.m_max,
            delta_m: bins.delta_m,
            nm: bin_count(bins.m_min, bins.m_max, bins.delta_m),
            eps_min: bins.eps_min,
            eps_max: bins.eps_max,
            delta_eps: bins.delta_eps,
            ne: bin_count(bins.eps_min, bins.eps_max, bins.delta_eps),
        };
        if grid.nr == 0 || grid.nm == 0 || grid.ne == 0 {
            return Err(HazardError::InvalidConfig(
                "deagg grid has an empty axis".to_string(),
            ));
        }
        Ok(grid)
    }

    fn index_of(min: f64, delta: f64, count: usize, value: f64) -> Option<usize> {
        if value < min {
            return None;
        }
        let i = ((value - min) / delta).floor() as usize;
        if i < count { Some(i) } else { None }
    }

    /// Distance bin index, or `None` out of range.
    pub fn r_index(&self, r: f64) -> Option<usize> {
        Self::index_of(self.r_min, self.delta_r, self.nr, r)
    }

    /// Magnitude bin index, or `None` out of range.
    pub fn m_index(&self, m: f64) -> Option<usize> {
        Self::index_of(self.m_min, self.delta_m, self.nm, m)
    }

    /// ε bin index, clamped to the grid.
    pub fn epsilon_index(&self, eps: f64) -> usize {
        Self::index_of(self.eps_min, self.delta_eps, self.ne, eps)
            .unwrap_or(if eps < self.eps_min { 0 } else { self.ne - 1 })
    }

    pub fn r_center(&self, i: usize) -> f64 {
        self.r_min + (i as f64 + 0.5) * self.delta_r
    }

    pub fn m_center(&self, i: usize) -> f64 {
        self.m_min + (i as f64 + 0.5) * self.delta_m
    }

    pub fn eps_center(&self, i: usize) -> f64 {
        self.eps_min + (i as f64 + 0.5) * self.delta_eps
    }

    /// Half-open ε intervals for each bin; the first and last extend to
    /// ±∞ because the ε index is clamped rather than skipped.
    pub fn epsilon_keys(&self) -> Vec<EpsilonKey> {
        (0..self.ne)
            .map(|i| EpsilonKey {
                index: i,
                min: if i == 0 {
                    f64::NEG_INFINITY
                } else {
                    self.eps_min + i as f64 * self.delta_eps
                },
                max: if i == self.ne - 1 {
                    f64::INFINITY
                } else {
                    self.eps_min + (i + 1) as f64 * self.delta_eps
                },
            })
            .collect()
    }
}

/// Dense 2D accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Data2d {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Data2d {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn add(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] += v;
    }

    pub fn combine(&mut self, other: &Self) {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "datasets summed on mismatched grids"
        );
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }

    pub fn scale(&mut self, f: f64) {
        for v in &mut self.data {
            *v *= f;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Index and value of the largest entry.
    pub fn max_entry(&self) -> (usize, usize, f64) {
        let mut best = (0, 0, f64::NEG_INFINITY);
        for r in 0..self.rows {
            for c in 0..self.cols {
                let v = self.get(r, c);
                if v > best.2 {
                    best = (r, c, v);
                }
            }
        }
        best
    }
}

/// Dense 3D accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Data3d {
    n1: usize,
    n2: usize,
    n3: usize,
    data: Vec<f64>,
}

impl Data3d {
    pub fn new(n1: usize, n2: usize, n3: usize) -> Self {
        Self {
            n1,
            n2,
            n3,
            data: vec![0.0; n1 * n2 * n3],
        }
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[(i * self.n2 + j) * self.n3 + k]
    }

    pub fn add(&mut self, i: usize, j: usize, k: usize, v: f64) {
        self.data[(i * self.n2 + j) * self.n3 + k] += v;
    }

    pub fn combine(&mut self, other: &Self) {
        assert_eq!(
            (self.n1, self.n2, self.n3),
            (other.n1, other.n2, other.n3),
            "datasets summed on mismatched grids"
        );
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }

    pub fn scale(&mut self, f: f64) {
        for v in &mut self.data {
            *v *= f;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Indices and value of the largest entry.
    pub fn max_entry(&self) -> (usize, usize, usize, f64) {
        let mut best = (0, 0, 0, f64::NEG_INFINITY);
        for i in 0..self.n1 {
            for j in 0..self.n2 {
                for k in 0..self.n3 {
                    let v = self.get(i, j, k);
                    if v > best.3 {
                        best = (i, j, k, v);
                    }
                }
            }
        }
        best
    }
}

/// The five accumulators every contributor carries: binned and residual
/// rate plus the rate-scaled r, m, and ε moments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContributorStats {
    pub binned: f64,
    pub residual: f64,
    pub r_scaled: f64,
    pub m_scaled: f64,
    pub e_scaled: f64,
}

impl ContributorStats {
    pub fn add_rupture(&mut self, r: f64, m: f64, eps: f64, rate: f64, in_grid: bool) {
        if in_grid {
            self.binned += rate;
        } else {
            self.residual += rate;
        }
        self.r_scaled += r * rate;
        self.m_scaled += m * rate;
        self.e_scaled += eps * rate;
    }

    pub fn combine(&mut self, other: &Self) {
        self.binned += other.binned;
        self.residual += other.residual;
        self.r_scaled += other.r_scaled;
        self.m_scaled += other.m_scaled;
        self.e_scaled += other.e_scaled;
    }

    pub fn scale(&mut self, f: f64) {
        self.binned *= f;
        self.residual *= f;
        self.r_scaled *= f;
        self.m_scaled *= f;
        self.e_scaled *= f;
    }

    /// Binned plus residual rate.
    pub fn total(&self) -> f64 {
        self.binned + self.residual
    }
}

/// Magnitude-frequency distribution of a system section, with rows at
/// 0.1-Mw spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionMfd {
    m_min: f64,
    rates: Vec<f64>,
}

pub const MFD_DELTA: f64 = 0.1;

impl SectionMfd {
    /// Rows cover `[mw_min, mw_max]` with limits floor/ceil-rounded to the
    /// 0.1 spacing.
    pub fn new(mw_min: f64, mw_max: f64) -> Self {
        let m_min = (mw_min / MFD_DELTA).floor() * MFD_DELTA;
        let m_max = (mw_max / MFD_DELTA).ceil() * MFD_DELTA;
        let rows = (((m_max - m_min) / MFD_DELTA).round() as usize).max(1);
        Self {
            m_min,
            rates: vec![0.0; rows],
        }
    }

    pub fn add(&mut self, mw: f64, rate: f64) {
        let i = ((mw - self.m_min) / MFD_DELTA).floor() as isize;
        let i = i.clamp(0, self.rates.len() as isize - 1) as usize;
        self.rates[i] += rate;
    }

    pub fn combine(&mut self, other: &Self) {
        assert_eq!(self.m_min, other.m_min, "MFD row mismatch");
        assert_eq!(self.rates.len(), other.rates.len(), "MFD row mismatch");
        for (a, b) in self.rates.iter_mut().zip(&other.rates) {
            *a += b;
        }
    }

    pub fn scale(&mut self, f: f64) {
        for v in &mut self.rates {
            *v *= f;
        }
    }

    /// (row-center Mw, rate) pairs.
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.rates
            .iter()
            .enumerate()
            .map(|(i, rate)| (self.m_min + (i as f64 + 0.5) * MFD_DELTA, *rate))
    }
}

/// A single source's contribution record.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContributor {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Azimuth from the site to the source (degrees).
    pub azimuth: f64,
    pub stats: ContributorStats,
}

/// A cluster's contribution record wrapping its member faults.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterContributor {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub azimuth: f64,
    pub stats: ContributorStats,
    pub children: Vec<SourceContributor>,
}

/// A system section's contribution record with its magnitude-frequency
/// distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionContributor {
    pub section: usize,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub azimuth: f64,
    pub stats: ContributorStats,
    pub mfd: SectionMfd,
}

/// A child of a source-set contributor.
#[derive(Debug, Clone, PartialEq)]
pub enum ContributorNode {
    Source(SourceContributor),
    Cluster(ClusterContributor),
    Section(SectionContributor),
}

impl ContributorNode {
    pub fn stats(&self) -> &ContributorStats {
        match self {
            ContributorNode::Source(c) => &c.stats,
            ContributorNode::Cluster(c) => &c.stats,
            ContributorNode::Section(c) => &c.stats,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ContributorNode::Source(c) => &c.name,
            ContributorNode::Cluster(c) => &c.name,
            ContributorNode::Section(c) => &c.name,
        }
    }

    fn scale(&mut self, f: f64) {
        match self {
            ContributorNode::Source(c) => c.stats.scale(f),
            ContributorNode::Cluster(c) => {
                c.stats.scale(f);
                for child in &mut c.children {
                    child.stats.scale(f);
                }
            }
            ContributorNode::Section(c) => {
                c.stats.scale(f);
                c.mfd.scale(f);
            }
        }
    }

    /// Whether `other` records the same source/cluster/section.
    fn same_key(&self, other: &Self) -> bool {
        match (self, other) {
            (ContributorNode::Source(a), ContributorNode::Source(b)) => a.name == b.name,
            (ContributorNode::Cluster(a), ContributorNode::Cluster(b)) => a.name == b.name,
            (ContributorNode::Section(a), ContributorNode::Section(b)) => a.section == b.section,
            _ => false,
        }
    }

    fn merge(&mut self, other: &Self) {
        match (self, other) {
            (ContributorNode::Source(a), ContributorNode::Source(b)) => a.stats.combine(&b.stats),
            (ContributorNode::Cluster(a), ContributorNode::Cluster(b)) => {
                a.stats.combine(&b.stats);
                for child in &b.children {
                    match a.children.iter_mut().find(|c| c.name == child.name) {
                        Some(existing) => existing.stats.combine(&child.stats),
                        None => a.children.push(child.clone()),
                    }
                }
            }
            (ContributorNode::Section(a), ContributorNode::Section(b)) => {
                a.stats.combine(&b.stats);
                a.mfd.combine(&b.mfd);
            }
            _ => unreachable!("merge called on mismatched contributor kinds"),
        }
    }
}

/// The root of a contributor tree: one per source set.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSetContributor {
    pub name: String,
    pub source_type: SourceType,
    pub stats: ContributorStats,
    pub children: Vec<ContributorNode>,
}

impl SourceSetContributor {
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
            stats: ContributorStats::default(),
            children: Vec::new(),
        }
    }

    /// Merge another tree for the same source set, combining children
    /// that record the same source, cluster, or section.
    pub fn merge(&mut self, other: &Self) {
        self.stats.combine(&other.stats);
        for child in &other.children {
            match self.children.iter_mut().find(|c| c.same_key(child)) {
                Some(existing) => existing.merge(child),
                None => self.children.push(child.clone()),
            }
        }
    }

    fn scale(&mut self, f: f64) {
        self.stats.scale(f);
        for child in &mut self.children {
            child.scale(f);
        }
    }
}

/// A binned deaggregation with moment accumulators and contributor
/// provenance.
#[derive(Debug, Clone)]
pub struct DeaggDataset {
    grid: Arc<DeaggGrid>,
    /// Rate per (r, m, ε) bin.
    pub rme: Data3d,
    pub r_scaled: Data3d,
    pub m_scaled: Data3d,
    pub e_scaled: Data3d,
    /// `Σ_ε rmε`.
    pub rm_weights: Data2d,
    pub rm_r_scaled: Data2d,
    pub rm_m_scaled: Data2d,
    pub rm_e_scaled: Data2d,
    /// Total rate inside the grid.
    pub binned: f64,
    /// Rate from ruptures outside the grid that still count toward means.
    pub residual: f64,
    r_scaled_total: f64,
    m_scaled_total: f64,
    e_scaled_total: f64,
    pub contributors: Vec<SourceSetContributor>,
}

impl DeaggDataset {
    pub fn grid(&self) -> &Arc<DeaggGrid> {
        &self.grid
    }

    /// Binned plus residual rate.
    pub fn total_rate(&self) -> f64 {
        self.binned + self.residual
    }

    /// Rate-weighted mean distance over binned and residual
    /// contributions; NaN when nothing contributed.
    pub fn r_bar(&self) -> f64 {
        self.r_scaled_total / self.total_rate()
    }

    pub fn m_bar(&self) -> f64 {
        self.m_scaled_total / self.total_rate()
    }

    pub fn e_bar(&self) -> f64 {
        self.e_scaled_total / self.total_rate()
    }
}

/// Single-use accumulator for a [`DeaggDataset`]; confined to one task.
/// `build` consumes the builder, so reuse is unrepresentable.
pub struct DeaggDatasetBuilder {
    dataset: DeaggDataset,
}

impl DeaggDatasetBuilder {
    pub fn new(grid: Arc<DeaggGrid>) -> Self {
        let (nr, nm, ne) = (grid.nr, grid.nm, grid.ne);
        Self {
            dataset: DeaggDataset {
                grid,
                rme: Data3d::new(nr, nm, ne),
                r_scaled: Data3d::new(nr, nm, ne),
                m_scaled: Data3d::new(nr, nm, ne),
                e_scaled: Data3d::new(nr, nm, ne),
                rm_weights: Data2d::new(nr, nm),
                rm_r_scaled: Data2d::new(nr, nm),
                rm_m_scaled: Data2d::new(nr, nm),
                rm_e_scaled: Data2d::new(nr, nm),
                binned: 0.0,
                residual: 0.0,
                r_scaled_total: 0.0,
                m_scaled_total: 0.0,
                e_scaled_total: 0.0,
                contributors: Vec::new(),
            },
        }
    }

    /// Accumulate one rupture's contribution.
    ///
    /// Moment sums always accumulate; a rupture whose distance or
    /// magnitude misses the grid lands in the residual, while its ε index
    /// is clamped rather than skipped. Returns whether the rupture fell
    /// inside the grid.
    pub fn add_rupture(&mut self, r: f64, m: f64, eps: f64, rate: f64) -> bool {
        let d = &mut self.dataset;
        d.r_scaled_total += r * rate;
        d.m_scaled_total += m * rate;
        d.e_scaled_total += eps * rate;
        match (d.grid.r_index(r), d.grid.m_index(m)) {
            (Some(ri), Some(mi)) => {
                let ei = d.grid.epsilon_index(eps);
                d.binned += rate;
                d.rme.add(ri, mi, ei, rate);
                d.r_scaled.add(ri, mi, ei, r * rate);
                d.m_scaled.add(ri, mi, ei, m * rate);
                d.e_scaled.add(ri, mi, ei, eps * rate);
                d.rm_weights.add(ri, mi, rate);
                d.rm_r_scaled.add(ri, mi, r * rate);
                d.rm_m_scaled.add(ri, mi, m * rate);
                d.rm_e_scaled.add(ri, mi, eps * rate);
                true
            }
            _ => {
                d.residual += rate;
                false
            }
        }
    }

    pub fn push_contributor(&mut self, contributor: SourceSetContributor) {
        self.dataset.contributors.push(contributor);
    }

    /// Binned plus residual rate accumulated so far.
    pub fn total(&self) -> f64 {
        self.dataset.total_rate()
    }

    /// Scale every accumulator, including the contributor tree. Used by
    /// cluster deaggregation to pin the dataset total to the cluster
    /// exceedance rate at the target level.
    pub fn multiply(&mut self, f: f64) {
        let d = &mut self.dataset;
        d.rme.scale(f);
        d.r_scaled.scale(f);
        d.m_scaled.scale(f);
        d.e_scaled.scale(f);
        d.rm_weights.scale(f);
        d.rm_r_scaled.scale(f);
        d.rm_m_scaled.scale(f);
        d.rm_e_scaled.scale(f);
        d.binned *= f;
        d.residual *= f;
        d.r_scaled_total *= f;
        d.m_scaled_total *= f;
        d.e_scaled_total *= f;
        for c in &mut d.contributors {
            c.scale(f);
        }
    }

    /// Sum another dataset into this one.
    ///
    /// # Panics
    ///
    /// Panics if the grids differ; datasets may only be summed on
    /// identical discretizations.
    pub fn combine(&mut self, other: &DeaggDataset) {
        let d = &mut self.dataset;
        assert_eq!(*d.grid, *other.grid, "datasets summed on mismatched grids");
        d.rme.combine(&other.rme);
        d.r_scaled.combine(&other.r_scaled);
        d.m_scaled.combine(&other.m_scaled);
        d.e_scaled.combine(&other.e_scaled);
        d.rm_weights.combine(&other.rm_weights);
        d.rm_r_scaled.combine(&other.rm_r_scaled);
        d.rm_m_scaled.combine(&other.rm_m_scaled);
        d.rm_e_scaled.combine(&other.rm_e_scaled);
        d.binned += other.binned;
        d.residual += other.residual;
        d.r_scaled_total += other.r_scaled_total;
        d.m_scaled_total += other.m_scaled_total;
        d.e_scaled_total += other.e_scaled_total;
        d.contributors.extend(other.contributors.iter().cloned());
    }

    pub fn build(self) -> DeaggDataset {
        self.dataset
    }
}

/// Fold per-GMM datasets of one source set into its total, merging the
/// contributor children under a common source-set parent.
pub fn consolidate_gmm_datasets(
    name: &str,
    source_type: SourceType,
    grid: &Arc<DeaggGrid>,
    datasets: &[DeaggDataset],
) -> DeaggDataset {
    let mut builder = DeaggDatasetBuilder::new(Arc::clone(grid));
    let mut parent = SourceSetContributor::new(name, source_type);
    for dataset in datasets {
        let contributors = &dataset.contributors;
        let mut stripped = DeaggDatasetBuilder::new(Arc::clone(grid));
        stripped.combine(dataset);
        let mut stripped = stripped.build();
        stripped.contributors.clear();
        builder.combine(&stripped);
        for contributor in contributors {
            parent.merge(contributor);
        }
    }
    builder.push_contributor(parent);
    builder.build()
}

/// Fold per-source-set datasets (weights already applied) into a grand
/// total; contributor trees are concatenated without deduplication.
pub fn consolidate_source_sets(grid: &Arc<DeaggGrid>, datasets: &[DeaggDataset]) -> DeaggDataset {
    let mut builder = DeaggDatasetBuilder::new(Arc::clone(grid));
    for dataset in datasets {
        builder.combine(dataset);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auxilary::approx_equal;
    use crate::config::DeaggBins;

    fn grid() -> Arc<DeaggGrid> {
        Arc::new(DeaggGrid::new(&DeaggBins::default()).unwrap())
    }

    #[test]
    fn test_grid_indexing() {
        let g = grid();
        assert_eq!(g.nr, 10);
        assert_eq!(g.nm, 11);
        assert_eq!(g.ne, 12);
        assert_eq!(g.r_index(0.0), Some(0));
        assert_eq!(g.r_index(99.9), Some(9));
        assert_eq!(g.r_index(100.0), None);
        assert_eq!(g.r_index(-0.1), None);
        assert_eq!(g.m_index(4.4), Some(0));
        assert_eq!(g.m_index(7.0), None);
        // ε clamps instead of skipping
        assert_eq!(g.epsilon_index(-5.0), 0);
        assert_eq!(g.epsilon_index(5.0), 11);
        assert_eq!(g.epsilon_index(0.0), 6);
    }

    #[test]
    fn test_epsilon_keys_unbounded_ends() {
        let keys = grid().epsilon_keys();
        assert_eq!(keys.len(), 12);
        assert_eq!(keys[0].min, f64::NEG_INFINITY);
        assert!(approx_equal(keys[0].max, -2.5, 1e-12));
        assert!(approx_equal(keys[11].min, 2.5, 1e-12));
        assert_eq!(keys[11].max, f64::INFINITY);
    }

    #[test]
    fn test_builder_binned_and_residual() {
        let g = grid();
        let mut builder = DeaggDatasetBuilder::new(Arc::clone(&g));
        assert!(builder.add_rupture(15.0, 6.5, 0.2, 1e-4));
        assert!(!builder.add_rupture(1000.0, 6.5, 0.2, 2e-4));
        let d = builder.build();
        assert!(approx_equal(d.binned, 1e-4, 1e-18));
        assert!(approx_equal(d.residual, 2e-4, 1e-18));
        assert!(approx_equal(d.rme.sum(), d.binned, 1e-18));
        // means include the residual moments
        let expect_r = (15.0 * 1e-4 + 1000.0 * 2e-4) / 3e-4;
        assert!(approx_equal(d.r_bar(), expect_r, 1e-9));
        assert!(approx_equal(d.m_bar(), 6.5, 1e-9));
    }

    #[test]
    fn test_rm_weights_collapse() {
        let g = grid();
        let mut builder = DeaggDatasetBuilder::new(Arc::clone(&g));
        builder.add_rupture(15.0, 6.5, -0.2, 1.0);
        builder.add_rupture(15.0, 6.5, 0.7, 2.0);
        builder.add_rupture(15.0, 6.5, 2.9, 4.0);
        let d = builder.build();
        let ri = g.r_index(15.0).unwrap();
        let mi = g.m_index(6.5).unwrap();
        let mut eps_sum = 0.0;
        for k in 0..g.ne {
            eps_sum += d.rme.get(ri, mi, k);
        }
        assert!(approx_equal(d.rm_weights.get(ri, mi), eps_sum, 1e-12));
        assert!(approx_equal(eps_sum, 7.0, 1e-12));
    }

    #[test]
    fn test_consolidators_merge_and_concat() {
        let g = grid();
        let per_gmm: Vec<DeaggDataset> = (0..2)
            .map(|_| {
                let mut b = DeaggDatasetBuilder::new(Arc::clone(&g));
                b.add_rupture(15.0, 6.5, 0.0, 1.0);
                let mut parent = SourceSetContributor::new("faults", SourceType::Fault);
                parent.stats.add_rupture(15.0, 6.5, 0.0, 1.0, true);
                parent.children.push(ContributorNode::Source(SourceContributor {
                    name: "fault A".to_string(),
                    lon: 0.0,
                    lat: 0.0,
                    azimuth: 0.0,
                    stats: parent.stats,
                }));
                b.push_contributor(parent);
                b.build()
            })
            .collect();
        let set_total = consolidate_gmm_datasets("faults", SourceType::Fault, &g, &per_gmm);
        // children merged under one parent
        assert_eq!(set_total.contributors.len(), 1);
        assert_eq!(set_total.contributors[0].children.len(), 1);
        assert!(approx_equal(set_total.contributors[0].stats.binned, 2.0, 1e-12));
        assert!(approx_equal(set_total.binned, 2.0, 1e-12));

        let grand = consolidate_source_sets(&g, &[set_total.clone(), set_total]);
        // contributor lists concatenate without deduplication
        assert_eq!(grand.contributors.len(), 2);
        assert!(approx_equal(grand.binned, 4.0, 1e-12));
    }

    #[test]
    fn test_section_mfd_rows() {
        let mut mfd = SectionMfd::new(6.53, 7.84);
        assert_eq!(mfd.rows().count(), 14);
        mfd.add(6.55, 1e-4);
        let (center, rate) = mfd.rows().next().unwrap();
        assert!(approx_equal(center, 6.55, 1e-9));
        assert!(approx_equal(rate, 1e-4, 1e-18));
    }
}
