//! Implicit immune predation: a per-step random kill pass over cancer cells.

use hcc_common::{SimParams, SimResult};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::lattice::{Lattice, SiteType};
use crate::registry::CellRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredationReport {
    /// Sites sampled as infiltrated (equal to the tumour site count).
    pub sampled_sites: usize,
    /// Sampled sites that held a cancer cell.
    pub attacked: usize,
    pub killed: usize,
}

/// Samples as many lattice sites as there are tumour sites, uniformly and without
/// replacement over the whole lattice, and kills each cancer cell found on a sampled
/// site with probability `P_CC_KILLED`.
///
/// Only valid under the immune predation variant; otherwise `ConfigurationMismatch`.
pub fn immune_predation<R: Rng + ?Sized>(
    lattice: &mut Lattice,
    registry: &mut CellRegistry,
    params: &SimParams,
    rng: &mut R,
) -> SimResult<PredationReport> {
    let p_cc_killed = params.kill_probability()?;

    let tumour_sites = lattice.cancer_sites();
    let k = tumour_sites.len();
    let mut report = PredationReport { sampled_sites: k, ..Default::default() };
    if k == 0 {
        return Ok(report);
    }

    let mut sampled = vec![false; lattice.len()];
    for i in rand::seq::index::sample(rng, lattice.len(), k).iter() {
        sampled[i] = true;
    }
    let attacked: Vec<_> = lattice
        .sites()
        .iter()
        .enumerate()
        .filter(|(i, s)| sampled[*i] && s.site_type() == SiteType::CancerCellOccupied)
        .filter_map(|(_, s)| s.occupant())
        .collect();
    report.attacked = attacked.len();

    for cell_id in attacked {
        if rng.random::<f64>() < p_cc_killed {
            registry.remove(lattice, cell_id, SiteType::NotOccupied)?;
            report.killed += 1;
        }
    }

    if params.check_invariants {
        registry.verify_consistency(lattice)?;
    }
    debug!(
        "Immune predation: {} sites sampled, {} cancer cells attacked, {} killed",
        report.sampled_sites, report.attacked, report.killed
    );
    Ok(report)
}
