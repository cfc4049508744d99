//! Static hexagonal lattice: site table, frozen adjacency and zonation.

use hcc_common::{angle_to_vec, CellId, SimError, SimResult, SiteId, Vec2};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::grid::SpatialGrid;

/// Neighbour candidates closer than this fraction of the spacing count as a match.
pub const ADJACENCY_TOLERANCE: f64 = 0.1;
/// Number of directions around a hexagonal site.
pub const HEX_DIRECTIONS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteType {
    CentralVein,
    PortalTriad,
    Hepatocyte,
    NotOccupied,
    CancerCellOccupied,
    Ecm,
}

impl SiteType {
    /// Numeric code used by site tables.
    pub fn code(self) -> u8 {
        match self {
            SiteType::CentralVein => 0,
            SiteType::PortalTriad => 1,
            SiteType::Hepatocyte => 2,
            SiteType::NotOccupied => 3,
            SiteType::CancerCellOccupied => 4,
            SiteType::Ecm => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SiteType::CentralVein),
            1 => Some(SiteType::PortalTriad),
            2 => Some(SiteType::Hepatocyte),
            3 => Some(SiteType::NotOccupied),
            4 => Some(SiteType::CancerCellOccupied),
            5 => Some(SiteType::Ecm),
            _ => None,
        }
    }

    /// Types that carry a live cell.
    pub fn is_occupied(self) -> bool {
        matches!(self, SiteType::Hepatocyte | SiteType::CancerCellOccupied)
    }

    /// Types that take part in adjacency matching.
    fn is_structural(self) -> bool {
        matches!(self, SiteType::CentralVein | SiteType::PortalTriad | SiteType::Hepatocyte)
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SiteType::CentralVein => "CV",
            SiteType::PortalTriad => "PT",
            SiteType::Hepatocyte => "HEP",
            SiteType::NotOccupied => "NO",
            SiteType::CancerCellOccupied => "CC",
            SiteType::Ecm => "ECM",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zonation {
    PeriCentral,
    Other,
    NotApplicable,
}

/// Up to six neighbour site ids, in direction order 0°, 60°, ..., 300°.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Neighbors {
    ids: [SiteId; HEX_DIRECTIONS],
    len: u8,
}

impl Neighbors {
    pub fn as_slice(&self) -> &[SiteId] { &self.ids[..self.len as usize] }
    pub fn len(&self) -> usize { self.len as usize }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    fn push(&mut self, id: SiteId) {
        if (self.len as usize) < HEX_DIRECTIONS {
            self.ids[self.len as usize] = id;
            self.len += 1;
        }
    }
}

impl FromIterator<SiteId> for Neighbors {
    fn from_iter<I: IntoIterator<Item = SiteId>>(iter: I) -> Self {
        let mut n = Neighbors::default();
        for id in iter {
            n.push(id);
        }
        n
    }
}

/// One row of the raw site table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: SiteId,
    pub x: f64,
    pub y: f64,
    pub site_type: SiteType,
}

#[derive(Debug, Clone)]
pub struct Site {
    site_id: SiteId,
    position: Vec2,

    // --- Mutable occupancy (changed only through Lattice::set_occupancy) ---
    site_type: SiteType,
    occupant: Option<CellId>, // Some exactly when site_type is HEP or CC

    // --- Frozen at construction ---
    // None for every site that was not a hepatocyte site in the table
    adjacency: Option<Neighbors>,
    zonation: Zonation,
}

impl Site {
    pub fn site_id(&self) -> SiteId { self.site_id }
    pub fn position(&self) -> Vec2 { self.position }
    pub fn site_type(&self) -> SiteType { self.site_type }
    pub fn occupant(&self) -> Option<CellId> { self.occupant }
    pub fn zonation(&self) -> Zonation { self.zonation }

    /// Neighbour ids, or `None` for sites that were not hepatocytes at construction.
    pub fn adjacent_site_ids(&self) -> Option<&[SiteId]> {
        self.adjacency.as_ref().map(Neighbors::as_slice)
    }
}

/// A cancer-cell-occupied site, as consumed by the nodule analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupiedSite {
    pub site_id: SiteId,
    pub cell_id: CellId,
    pub position: Vec2,
}

#[derive(Debug, Clone)]
pub struct Lattice {
    // All sites in site-table order
    sites: Vec<Site>,
    // Site id -> position in `sites`
    index: HashMap<SiteId, usize>,
    // Nearest-neighbour distance of the hexagonal packing
    spacing: f64,
}

impl Lattice {
    /// Builds the lattice from a raw site table and annotates every hepatocyte site
    /// with its hexagonal adjacency and zonation.
    pub fn build(records: &[SiteRecord], spacing: f64, pericentral_radius: f64) -> SimResult<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(SimError::ConfigurationMismatch(format!("spacing must be positive, got {}", spacing)));
        }
        if !(pericentral_radius.is_finite() && pericentral_radius >= 0.0) {
            return Err(SimError::ConfigurationMismatch(format!(
                "pericentral radius must be non-negative, got {}",
                pericentral_radius
            )));
        }

        let mut index = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if !Vec2::new(r.x, r.y).is_finite() {
                return Err(SimError::InvalidSiteTable(format!("site {} has non-finite coordinates", r.site_id)));
            }
            if r.site_type == SiteType::CancerCellOccupied {
                return Err(SimError::InvalidSiteTable(format!(
                    "site {} is cancer-occupied before seeding",
                    r.site_id
                )));
            }
            if index.insert(r.site_id, i).is_some() {
                return Err(SimError::InvalidSiteTable(format!("duplicate site id {}", r.site_id)));
            }
        }

        // Only vein, triad and hepatocyte sites can be matched as neighbours.
        let structural: Vec<usize> = (0..records.len()).filter(|&i| records[i].site_type.is_structural()).collect();
        let structural_grid = SpatialGrid::build(
            structural.iter().map(|&i| Vec2::new(records[i].x, records[i].y)).collect(),
            spacing,
        );
        let central_veins = SpatialGrid::build(
            records
                .iter()
                .filter(|r| r.site_type == SiteType::CentralVein)
                .map(|r| Vec2::new(r.x, r.y))
                .collect(),
            pericentral_radius.max(spacing),
        );

        debug!(
            "Spatial index: {} structural sites in {} buckets, {} central veins.",
            structural_grid.len(),
            structural_grid.occupied_buckets(),
            central_veins.len()
        );

        let n_hepatocytes = records.iter().filter(|r| r.site_type == SiteType::Hepatocyte).count();
        info!(
            "Annotating adjacency and zonation for {} hepatocyte sites ({} sites total)...",
            n_hepatocytes,
            records.len()
        );

        let match_radius = ADJACENCY_TOLERANCE * spacing;
        let annotations: Vec<(Option<Neighbors>, Zonation)> = records
            .par_iter()
            .map(|r| {
                if r.site_type != SiteType::Hepatocyte {
                    return (None, Zonation::NotApplicable);
                }
                let pos = Vec2::new(r.x, r.y);
                let neighbors: Neighbors = (0..HEX_DIRECTIONS)
                    .filter_map(|k| {
                        let theta = std::f64::consts::PI / 3.0 * k as f64;
                        let candidate = pos.add(angle_to_vec(theta).scale(spacing));
                        structural_grid
                            .nearest_within(candidate, match_radius)
                            .map(|(idx, _)| records[structural[idx as usize]].site_id)
                    })
                    .collect();
                let pericentral = central_veins
                    .find_first_neighbor(pos, pericentral_radius, |_| true)
                    .is_some();
                let zonation = if pericentral { Zonation::PeriCentral } else { Zonation::Other };
                (Some(neighbors), zonation)
            })
            .collect();

        let sites: Vec<Site> = records
            .iter()
            .zip(annotations)
            .map(|(r, (adjacency, zonation))| Site {
                site_id: r.site_id,
                position: Vec2::new(r.x, r.y),
                site_type: r.site_type,
                occupant: None,
                adjacency,
                zonation,
            })
            .collect();

        let lattice = Lattice { sites, index, spacing };
        info!(
            "Lattice annotated: {} peri-central hepatocyte sites, {} boundary sites with fewer than {} neighbours.",
            lattice.sites.iter().filter(|s| s.zonation == Zonation::PeriCentral).count(),
            lattice
                .sites
                .iter()
                .filter(|s| s.adjacency.is_some_and(|a| a.len() < HEX_DIRECTIONS))
                .count(),
            HEX_DIRECTIONS
        );
        debug!("Lattice spacing {:.4}, peri-central radius {:.4}.", spacing, pericentral_radius);
        Ok(lattice)
    }

    pub fn spacing(&self) -> f64 { self.spacing }
    pub fn len(&self) -> usize { self.sites.len() }
    pub fn is_empty(&self) -> bool { self.sites.is_empty() }

    /// All sites in site-table order.
    pub fn sites(&self) -> &[Site] { &self.sites }

    pub fn site(&self, site_id: SiteId) -> Option<&Site> {
        self.index.get(&site_id).map(|&i| &self.sites[i])
    }

    /// Like [`Lattice::site`] but reports unknown ids as an inconsistency.
    pub fn require_site(&self, site_id: SiteId) -> SimResult<&Site> {
        self.site(site_id)
            .ok_or_else(|| SimError::InconsistentState(format!("unknown site id {}", site_id)))
    }

    /// Adjacency of a site that is about to take part in a transition.
    pub fn neighbors_of(&self, site_id: SiteId) -> SimResult<Neighbors> {
        self.require_site(site_id)?
            .adjacency
            .ok_or(SimError::MissingAdjacency { site_id })
    }

    pub fn count_of(&self, site_type: SiteType) -> usize {
        self.sites.iter().filter(|s| s.site_type == site_type).count()
    }

    /// Snapshot of all cancer-cell-occupied sites in lattice order.
    pub fn cancer_sites(&self) -> Vec<OccupiedSite> {
        self.sites
            .iter()
            .filter(|s| s.site_type == SiteType::CancerCellOccupied)
            .filter_map(|s| {
                s.occupant.map(|cell_id| OccupiedSite { site_id: s.site_id, cell_id, position: s.position })
            })
            .collect()
    }

    /// Sets type and occupant of a site together. Adjacency and zonation are untouched.
    pub(crate) fn set_occupancy(&mut self, site_id: SiteId, site_type: SiteType, occupant: Option<CellId>) -> SimResult<()> {
        if site_type.is_occupied() != occupant.is_some() {
            return Err(SimError::InconsistentState(format!(
                "site {} cannot be {} with occupant {:?}",
                site_id, site_type, occupant
            )));
        }
        let i = *self
            .index
            .get(&site_id)
            .ok_or_else(|| SimError::InconsistentState(format!("unknown site id {}", site_id)))?;
        let site = &mut self.sites[i];
        site.site_type = site_type;
        site.occupant = occupant;
        Ok(())
    }
}
