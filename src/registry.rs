//! Live cancer cells and hepatocytes, kept in lockstep with lattice occupancy.

use hcc_common::{CellId, SimError, SimResult, SiteId, Vec2};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lattice::{Lattice, SiteType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Cancer,
    Hepatocyte,
}

impl CellKind {
    /// Site type a cell of this kind gives to the site it occupies.
    pub fn site_type(self) -> SiteType {
        match self {
            CellKind::Cancer => SiteType::CancerCellOccupied,
            CellKind::Hepatocyte => SiteType::Hepatocyte,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    Quiescent,
    Proliferative,
    Apoptotic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_id: CellId, // Unique for the whole run, never reused
    pub kind: CellKind,
    pub site_id: SiteId,
    // Copied from the site on placement and on every relocation
    pub position: Vec2,
    pub state: CellState, // Cancer cells are always Proliferative
}

impl Cell {
    pub fn position(&self) -> Vec2 { self.position }
}

/// Cancer cells and hepatocytes keyed by id. Both maps draw ids from one counter.
#[derive(Debug, Clone, Default)]
pub struct CellRegistry {
    // --- Live cells (ordered so iteration follows ascending id) ---
    cancer_cells: BTreeMap<CellId, Cell>,
    hepatocytes: BTreeMap<CellId, Cell>,

    // --- Id allocation ---
    // Next id handed out by spawn; shared by both kinds
    next_cell_id: CellId,
}

impl CellRegistry {
    pub fn new() -> Self { Self::default() }

    /// Places one quiescent hepatocyte on every hepatocyte site, in lattice order.
    pub fn populate_hepatocytes(lattice: &mut Lattice) -> SimResult<Self> {
        let mut registry = CellRegistry::new();
        let hepatocyte_sites: Vec<SiteId> = lattice
            .sites()
            .iter()
            .filter(|s| s.site_type() == SiteType::Hepatocyte)
            .map(|s| s.site_id())
            .collect();
        for site_id in hepatocyte_sites {
            registry.spawn(lattice, CellKind::Hepatocyte, site_id, CellState::Quiescent)?;
        }
        Ok(registry)
    }

    /// Populates hepatocytes, then converts `n_cancer_cells` of them into proliferative cancer cells.
    pub fn seed<R: Rng + ?Sized>(lattice: &mut Lattice, n_cancer_cells: usize, rng: &mut R) -> SimResult<Self> {
        let mut registry = Self::populate_hepatocytes(lattice)?;
        info!("Before seeding: {} hepatocytes.", registry.hepatocyte_count());
        registry.seed_cancer_cells(lattice, n_cancer_cells, rng)?;
        info!(
            "After seeding: {} hepatocytes, {} cancer cells.",
            registry.hepatocyte_count(),
            registry.cancer_cell_count()
        );
        Ok(registry)
    }

    /// Replaces `n` hepatocytes, chosen uniformly without replacement, with proliferative cancer cells.
    pub fn seed_cancer_cells<R: Rng + ?Sized>(&mut self, lattice: &mut Lattice, n: usize, rng: &mut R) -> SimResult<Vec<CellId>> {
        let candidates: Vec<CellId> = self.hepatocytes.keys().copied().collect();
        if n > candidates.len() {
            return Err(SimError::InsufficientSites { requested: n, available: candidates.len() });
        }
        let chosen = rand::seq::index::sample(rng, candidates.len(), n);
        let mut seeded = Vec::with_capacity(n);
        for i in chosen.iter() {
            let hep = self.remove(lattice, candidates[i], SiteType::NotOccupied)?;
            let id = self.spawn(lattice, CellKind::Cancer, hep.site_id, CellState::Proliferative)?;
            seeded.push(id);
        }
        Ok(seeded)
    }

    pub fn cancer_cell_count(&self) -> usize { self.cancer_cells.len() }
    pub fn hepatocyte_count(&self) -> usize { self.hepatocytes.len() }

    /// Id the next created cell will receive.
    pub fn next_cell_id(&self) -> CellId { self.next_cell_id }

    pub fn cancer_cell(&self, id: CellId) -> Option<&Cell> { self.cancer_cells.get(&id) }
    pub fn hepatocyte(&self, id: CellId) -> Option<&Cell> { self.hepatocytes.get(&id) }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cancer_cells.get(&id).or_else(|| self.hepatocytes.get(&id))
    }

    pub fn cancer_cells(&self) -> impl Iterator<Item = &Cell> { self.cancer_cells.values() }
    pub fn hepatocytes(&self) -> impl Iterator<Item = &Cell> { self.hepatocytes.values() }

    /// Ascending ids of the current cancer cells, captured before a pass mutates the registry.
    pub fn cancer_cell_ids(&self) -> Vec<CellId> { self.cancer_cells.keys().copied().collect() }

    fn map_mut(&mut self, kind: CellKind) -> &mut BTreeMap<CellId, Cell> {
        match kind {
            CellKind::Cancer => &mut self.cancer_cells,
            CellKind::Hepatocyte => &mut self.hepatocytes,
        }
    }

    /// Creates a cell on a site that currently has no occupant.
    pub fn spawn(&mut self, lattice: &mut Lattice, kind: CellKind, site_id: SiteId, state: CellState) -> SimResult<CellId> {
        let site = lattice.require_site(site_id)?;
        if let Some(existing) = site.occupant() {
            return Err(SimError::InconsistentState(format!(
                "site {} already holds cell {}",
                site_id, existing
            )));
        }
        let position = site.position();
        let cell_id = self.next_cell_id;
        lattice.set_occupancy(site_id, kind.site_type(), Some(cell_id))?;
        self.next_cell_id += 1;
        self.map_mut(kind).insert(cell_id, Cell { cell_id, kind, site_id, position, state });
        Ok(cell_id)
    }

    /// Destroys a cell and leaves its site as `vacated` (`NotOccupied` or `Ecm`).
    pub fn remove(&mut self, lattice: &mut Lattice, id: CellId, vacated: SiteType) -> SimResult<Cell> {
        if vacated.is_occupied() {
            return Err(SimError::InconsistentState(format!(
                "cell {} cannot leave its site as {}",
                id, vacated
            )));
        }
        let kind = self
            .cell(id)
            .map(|c| c.kind)
            .ok_or_else(|| SimError::InconsistentState(format!("unknown cell id {}", id)))?;
        let site_id = self.map_mut(kind)[&id].site_id;
        lattice.set_occupancy(site_id, vacated, None)?;
        let cell = self
            .map_mut(kind)
            .remove(&id)
            .ok_or_else(|| SimError::InconsistentState(format!("unknown cell id {}", id)))?;
        Ok(cell)
    }

    /// Moves a cancer cell onto a free site, vacating its current site.
    pub fn relocate(&mut self, lattice: &mut Lattice, id: CellId, destination: SiteId) -> SimResult<()> {
        let dest = lattice.require_site(destination)?;
        if dest.site_type() != SiteType::NotOccupied {
            return Err(SimError::InconsistentState(format!(
                "cannot move cell {} onto {} site {}",
                id, dest.site_type(), destination
            )));
        }
        let dest_position = dest.position();
        let cell = self
            .cancer_cells
            .get_mut(&id)
            .ok_or_else(|| SimError::InconsistentState(format!("unknown cancer cell id {}", id)))?;
        lattice.set_occupancy(cell.site_id, SiteType::NotOccupied, None)?;
        lattice.set_occupancy(destination, SiteType::CancerCellOccupied, Some(id))?;
        cell.site_id = destination;
        cell.position = dest_position;
        Ok(())
    }

    pub fn set_state(&mut self, id: CellId, state: CellState) -> SimResult<()> {
        let cell = self
            .cancer_cells
            .get_mut(&id)
            .or_else(|| self.hepatocytes.get_mut(&id))
            .ok_or_else(|| SimError::InconsistentState(format!("unknown cell id {}", id)))?;
        cell.state = state;
        Ok(())
    }

    /// Checks that every occupied site and every live cell point at each other.
    pub fn verify_consistency(&self, lattice: &Lattice) -> SimResult<()> {
        let mut occupied = 0usize;
        for site in lattice.sites() {
            match (site.site_type(), site.occupant()) {
                (SiteType::CancerCellOccupied, Some(id)) => self.check_back_reference(site.site_id(), id, CellKind::Cancer)?,
                (SiteType::Hepatocyte, Some(id)) => self.check_back_reference(site.site_id(), id, CellKind::Hepatocyte)?,
                (t, None) if !t.is_occupied() => continue,
                (t, occupant) => {
                    return Err(SimError::InconsistentState(format!(
                        "site {} is {} with occupant {:?}",
                        site.site_id(), t, occupant
                    )))
                }
            }
            occupied += 1;
        }
        let live = self.cancer_cells.len() + self.hepatocytes.len();
        if occupied != live {
            return Err(SimError::InconsistentState(format!(
                "{} occupied sites but {} live cells",
                occupied, live
            )));
        }
        Ok(())
    }

    fn check_back_reference(&self, site_id: SiteId, id: CellId, kind: CellKind) -> SimResult<()> {
        let cell = match kind {
            CellKind::Cancer => self.cancer_cells.get(&id),
            CellKind::Hepatocyte => self.hepatocytes.get(&id),
        };
        match cell {
            Some(c) if c.site_id == site_id => Ok(()),
            Some(c) => Err(SimError::InconsistentState(format!(
                "site {} holds cell {} which points at site {}",
                site_id, id, c.site_id
            ))),
            None => Err(SimError::InconsistentState(format!(
                "site {} holds {:?} cell {} missing from the registry",
                site_id, kind, id
            ))),
        }
    }
}
