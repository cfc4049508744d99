//! Tumour nodules: connected components of cancer-occupied sites.
//!
//! Two sites share a nodule when a chain of occupied sites links them with every
//! hop no longer than the connection radius (1.05 x spacing by default).

use hcc_common::{CellId, SiteId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::grid::SpatialGrid;
use crate::lattice::OccupiedSite;

/// Connection radius as a multiple of the lattice spacing.
pub const NODULE_RADIUS_FACTOR: f64 = 1.05;

// ── Union-Find ──────────────────────────────────────────────────────────────

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry { return; }
        // union by rank
        if self.rank[rx] < self.rank[ry] {
            self.parent[rx] = ry;
        } else if self.rank[rx] > self.rank[ry] {
            self.parent[ry] = rx;
        } else {
            self.parent[ry] = rx;
            self.rank[rx] += 1;
        }
    }
}

// ── Analysis ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoduleLabel {
    pub site_id: SiteId,
    pub cell_id: CellId,
    pub nodule: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoduleReport {
    /// One label per input site, in input order.
    pub labels: Vec<NoduleLabel>,
    /// `sizes[nodule]` is the number of sites carrying that label.
    pub sizes: Vec<usize>,
}

impl NoduleReport {
    pub fn nodule_count(&self) -> usize { self.sizes.len() }

    pub fn largest(&self) -> usize { self.sizes.iter().copied().max().unwrap_or(0) }

    /// Nodule sizes in descending order; independent of label numbering.
    pub fn size_distribution(&self) -> Vec<usize> {
        let mut sizes = self.sizes.clone();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }

    /// Number of nodules of each size, ascending by size.
    pub fn size_histogram(&self) -> Vec<(usize, usize)> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for &s in &self.sizes {
            *counts.entry(s).or_default() += 1;
        }
        let mut histogram: Vec<(usize, usize)> = counts.into_iter().collect();
        histogram.sort_unstable();
        histogram
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NoduleAnalyzer {
    radius: f64, // Maximum hop between two sites of one nodule
}

impl NoduleAnalyzer {
    /// Analyzer for a lattice with the given spacing.
    pub fn new(spacing: f64) -> Self { Self { radius: NODULE_RADIUS_FACTOR * spacing } }

    /// Labels every site with its nodule. Labels are numbered in order of first
    /// appearance in `sites`; singletons form nodules of size 1.
    pub fn analyze(&self, sites: &[OccupiedSite]) -> NoduleReport {
        let n = sites.len();
        let grid = SpatialGrid::build(sites.iter().map(|s| s.position).collect(), self.radius);
        let mut uf = UnionFind::new(n);
        for (i, site) in sites.iter().enumerate() {
            grid.for_each_neighbor(site.position, self.radius, |j, _| {
                if (j as usize) > i {
                    uf.union(i, j as usize);
                }
                true
            });
        }

        let mut root_to_label: HashMap<usize, usize> = HashMap::new();
        let mut report = NoduleReport { labels: Vec::with_capacity(n), sizes: Vec::new() };
        for (i, site) in sites.iter().enumerate() {
            let root = uf.find(i);
            let next = root_to_label.len();
            let nodule = *root_to_label.entry(root).or_insert(next);
            if nodule == report.sizes.len() {
                report.sizes.push(0);
            }
            report.sizes[nodule] += 1;
            report.labels.push(NoduleLabel { site_id: site.site_id, cell_id: site.cell_id, nodule });
        }
        report
    }
}
