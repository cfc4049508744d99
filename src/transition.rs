//! One discrete step of cancer growth and hepatocyte damage.
//!
//! Cancer cells act first, in ascending id order over the ids present at the
//! start of the step; cells spawned during the pass wait for the next step.
//! Hepatocytes next to a proliferative cancer cell are queued during that pass
//! and processed afterwards in enqueue order. All mutations are applied in
//! place and are visible to later iterations of the same step.

use hcc_common::{CellId, DamageQueuePolicy, SimParams, SimResult};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::lattice::{Lattice, SiteType, Zonation};
use crate::registry::{CellKind, CellRegistry, CellState};

/// Tallies of what happened during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReport {
    // --- Cancer pass ---
    pub cancer_cells_grown: usize, // New cells placed on free neighbours
    pub cancer_cells_moved: usize, // Move-or-grow relocations

    // --- Hepatocyte pass ---
    // Queue length after the damage-queue policy was applied
    pub hepatocytes_queued: usize,
    pub hepatocytes_damaged: usize,  // Quiescent -> Apoptotic
    pub hepatocytes_cleared: usize,  // Removed, site left NotOccupied
    pub hepatocytes_fibrosed: usize, // Removed, site turned to ECM
}

/// Applies the growth/damage/clearance/fibrosis rules of the configured variant.
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    params: SimParams, // Probabilities, variant and queue policy
}

impl TransitionEngine {
    pub fn new(params: SimParams) -> Self { Self { params } }

    /// Advances the lattice and registry by one step.
    ///
    /// On error the step is left half-applied and the caller must discard the state.
    pub fn step<R: Rng + ?Sized>(&self, lattice: &mut Lattice, registry: &mut CellRegistry, rng: &mut R) -> SimResult<TransitionReport> {
        let mut report = TransitionReport::default();

        let queue = self.cancer_pass(lattice, registry, rng, &mut report)?;
        report.hepatocytes_queued = queue.len();
        self.hepatocyte_pass(lattice, registry, rng, queue, &mut report)?;

        if self.params.check_invariants {
            registry.verify_consistency(lattice)?;
        }
        debug!(
            "Transition: grown {}, moved {}, queued {}, damaged {}, cleared {}, fibrosed {}",
            report.cancer_cells_grown,
            report.cancer_cells_moved,
            report.hepatocytes_queued,
            report.hepatocytes_damaged,
            report.hepatocytes_cleared,
            report.hepatocytes_fibrosed
        );
        Ok(report)
    }

    /// Grows (or moves) proliferative cancer cells and returns the hepatocyte queue.
    fn cancer_pass<R: Rng + ?Sized>(
        &self,
        lattice: &mut Lattice,
        registry: &mut CellRegistry,
        rng: &mut R,
        report: &mut TransitionReport,
    ) -> SimResult<Vec<CellId>> {
        let mut queue = Vec::new();
        let move_or_grow = self.params.variant.has_move_or_grow();

        for cell_id in registry.cancer_cell_ids() {
            let Some(cell) = registry.cancer_cell(cell_id) else { continue };
            if cell.state != CellState::Proliferative {
                continue;
            }
            let neighbors = lattice.neighbors_of(cell.site_id)?;

            for &neighbor_id in neighbors.as_slice() {
                let neighbor = lattice.require_site(neighbor_id)?;
                match neighbor.site_type() {
                    SiteType::NotOccupied => {
                        if rng.random::<f64>() < self.params.p_cc_grow {
                            registry.spawn(lattice, CellKind::Cancer, neighbor_id, CellState::Proliferative)?;
                            report.cancer_cells_grown += 1;
                        } else if move_or_grow {
                            // The move is immediate and ends this cell's scan for the step.
                            registry.relocate(lattice, cell_id, neighbor_id)?;
                            report.cancer_cells_moved += 1;
                            break;
                        }
                    }
                    SiteType::Hepatocyte => {
                        if let Some(hep_id) = neighbor.occupant() {
                            queue.push(hep_id);
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.params.damage_queue == DamageQueuePolicy::Once {
            let mut seen = HashSet::with_capacity(queue.len());
            queue.retain(|id| seen.insert(*id));
        }
        Ok(queue)
    }

    fn hepatocyte_pass<R: Rng + ?Sized>(
        &self,
        lattice: &mut Lattice,
        registry: &mut CellRegistry,
        rng: &mut R,
        queue: Vec<CellId>,
        report: &mut TransitionReport,
    ) -> SimResult<()> {
        for hep_id in queue {
            // Already cleared or fibrosed earlier in this step.
            let Some(hep) = registry.hepatocyte(hep_id) else { continue };
            let (site_id, state) = (hep.site_id, hep.state);

            match state {
                CellState::Quiescent => {
                    let neighbors = lattice.neighbors_of(site_id)?;
                    for &neighbor_id in neighbors.as_slice() {
                        if lattice.require_site(neighbor_id)?.site_type() != SiteType::CancerCellOccupied {
                            continue;
                        }
                        if rng.random::<f64>() < self.params.p_hep_damaged {
                            registry.set_state(hep_id, CellState::Apoptotic)?;
                            report.hepatocytes_damaged += 1;
                            break;
                        }
                    }
                }
                CellState::Apoptotic => {
                    if rng.random::<f64>() < self.params.p_hep_cleared {
                        registry.remove(lattice, hep_id, SiteType::NotOccupied)?;
                        report.hepatocytes_cleared += 1;
                    } else if self.params.variant.has_fibrosis()
                        && lattice.require_site(site_id)?.zonation() == Zonation::PeriCentral
                    {
                        registry.remove(lattice, hep_id, SiteType::Ecm)?;
                        report.hepatocytes_fibrosed += 1;
                    }
                }
                CellState::Proliferative => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::tests::hex_records;
    use crate::lattice::SiteRecord;
    use hcc_common::{ModelVariant, SimError, SiteId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn params(variant: ModelVariant, grow: f64, damaged: f64, cleared: f64) -> SimParams {
        let mut p = SimParams::for_variant(variant, 1.0);
        p.p_cc_grow = grow;
        p.p_hep_damaged = damaged;
        p.p_hep_cleared = cleared;
        p
    }

    /// Lattice with every hepatocyte site populated and no cancer yet.
    fn tissue(records: &[SiteRecord], radius: f64) -> (Lattice, CellRegistry) {
        let mut lattice = Lattice::build(records, 1.0, radius).unwrap();
        let registry = CellRegistry::populate_hepatocytes(&mut lattice).unwrap();
        (lattice, registry)
    }

    fn hep_at(registry: &CellRegistry, lattice: &Lattice, site: SiteId) -> CellId {
        let id = lattice.site(site).unwrap().occupant().unwrap();
        assert!(registry.hepatocyte(id).is_some());
        id
    }

    /// Turns the hepatocyte on `site` into a proliferative cancer cell.
    fn plant_cancer(registry: &mut CellRegistry, lattice: &mut Lattice, site: SiteId) -> CellId {
        let hep = hep_at(registry, lattice, site);
        registry.remove(lattice, hep, SiteType::NotOccupied).unwrap();
        registry.spawn(lattice, CellKind::Cancer, site, CellState::Proliferative).unwrap()
    }

    fn clear_site(registry: &mut CellRegistry, lattice: &mut Lattice, site: SiteId) {
        let hep = hep_at(registry, lattice, site);
        registry.remove(lattice, hep, SiteType::NotOccupied).unwrap();
    }

    #[test]
    fn certain_growth_fills_every_free_neighbour() {
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        plant_cancer(&mut registry, &mut lattice, 12);
        let neighbors = lattice.site(12).unwrap().adjacent_site_ids().unwrap().to_vec();
        for &n in &neighbors {
            clear_site(&mut registry, &mut lattice, n);
        }

        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 1.0, 0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(5);
        let report = engine.step(&mut lattice, &mut registry, &mut rng).unwrap();

        assert_eq!(report.cancer_cells_grown, 6);
        for n in neighbors {
            assert_eq!(lattice.site(n).unwrap().site_type(), SiteType::CancerCellOccupied);
        }
        assert_eq!(registry.cancer_cell_count(), 7);
        assert_eq!(lattice.count_of(SiteType::NotOccupied), 0);
        // Newly grown cells wait for the next step, so nothing reached the outer ring.
        assert_eq!(report.hepatocytes_queued, 0);
    }

    #[test]
    fn zero_growth_probability_changes_nothing() {
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        plant_cancer(&mut registry, &mut lattice, 12);
        for n in lattice.site(12).unwrap().adjacent_site_ids().unwrap().to_vec() {
            clear_site(&mut registry, &mut lattice, n);
        }
        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 0.0, 0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(5);
        let report = engine.step(&mut lattice, &mut registry, &mut rng).unwrap();
        assert_eq!(report, TransitionReport::default());
        assert_eq!(registry.cancer_cell_count(), 1);
        assert_eq!(lattice.count_of(SiteType::NotOccupied), 6);
    }

    #[test]
    fn apoptotic_hepatocyte_is_cleared_under_every_variant() {
        for variant in ModelVariant::ALL {
            let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 10.0);
            plant_cancer(&mut registry, &mut lattice, 12);
            let hep = hep_at(&registry, &lattice, 13);
            registry.set_state(hep, CellState::Apoptotic).unwrap();

            let mut p = params(variant, 0.0, 0.0, 1.0);
            p.damage_queue = DamageQueuePolicy::Once;
            let engine = TransitionEngine::new(p);
            let mut rng = StdRng::seed_from_u64(11);
            engine.step(&mut lattice, &mut registry, &mut rng).unwrap();

            assert!(registry.hepatocyte(hep).is_none(), "{variant}");
            assert_eq!(lattice.site(13).unwrap().site_type(), SiteType::NotOccupied, "{variant}");
        }
    }

    fn fibrosis_case(radius: f64) -> (SiteType, bool) {
        let mut records = hex_records(5, 5, 1.0);
        records[0].site_type = SiteType::CentralVein;
        let (mut lattice, mut registry) = tissue(&records, radius);
        // Site 1 sits right next to the vein at (0, 0).
        plant_cancer(&mut registry, &mut lattice, 2);
        let hep = hep_at(&registry, &lattice, 1);
        registry.set_state(hep, CellState::Apoptotic).unwrap();

        let engine = TransitionEngine::new(params(ModelVariant::Fibrosis, 0.0, 0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(2);
        engine.step(&mut lattice, &mut registry, &mut rng).unwrap();
        (lattice.site(1).unwrap().site_type(), registry.hepatocyte(hep).is_some())
    }

    #[test]
    fn uncleared_pericentral_hepatocyte_becomes_ecm() {
        assert_eq!(fibrosis_case(1.5), (SiteType::Ecm, false));
    }

    #[test]
    fn uncleared_hepatocyte_outside_pericentral_zone_persists() {
        assert_eq!(fibrosis_case(0.5), (SiteType::Hepatocyte, true));
    }

    #[test]
    fn baseline_never_deposits_ecm() {
        let mut records = hex_records(5, 5, 1.0);
        records[0].site_type = SiteType::CentralVein;
        let (mut lattice, mut registry) = tissue(&records, 10.0);
        plant_cancer(&mut registry, &mut lattice, 2);
        let hep = hep_at(&registry, &lattice, 1);
        registry.set_state(hep, CellState::Apoptotic).unwrap();
        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 0.0, 0.0, 0.0));
        engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(lattice.count_of(SiteType::Ecm), 0);
        assert_eq!(registry.hepatocyte(hep).unwrap().state, CellState::Apoptotic);
    }

    #[test]
    fn certain_damage_marks_every_adjacent_hepatocyte() {
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        plant_cancer(&mut registry, &mut lattice, 12);
        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 1.0, 1.0, 0.0));
        let report = engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(8)).unwrap();

        assert_eq!(report.hepatocytes_damaged, 6);
        for n in lattice.site(12).unwrap().adjacent_site_ids().unwrap() {
            let hep = lattice.site(*n).unwrap().occupant().unwrap();
            assert_eq!(registry.hepatocyte(hep).unwrap().state, CellState::Apoptotic);
        }
        let apoptotic = registry.hepatocytes().filter(|h| h.state == CellState::Apoptotic).count();
        assert_eq!(apoptotic, 6);
    }

    #[test]
    fn repeated_enqueue_policy_controls_same_step_clearance() {
        // Sites 11 and 13 flank 12; both see hepatocyte 12 as a neighbour.
        let run = |policy| {
            let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
            plant_cancer(&mut registry, &mut lattice, 11);
            plant_cancer(&mut registry, &mut lattice, 13);
            let hep = hep_at(&registry, &lattice, 12);
            let mut p = params(ModelVariant::Baseline, 0.0, 1.0, 1.0);
            p.damage_queue = policy;
            let engine = TransitionEngine::new(p);
            engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(4)).unwrap();
            registry.hepatocyte(hep).map(|h| h.state)
        };
        // Damaged on the first visit, cleared on the second.
        assert_eq!(run(DamageQueuePolicy::PerEnqueue), None);
        assert_eq!(run(DamageQueuePolicy::Once), Some(CellState::Apoptotic));
    }

    #[test]
    fn move_or_grow_relocates_when_growth_fails() {
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        let cc = plant_cancer(&mut registry, &mut lattice, 12);
        clear_site(&mut registry, &mut lattice, 13);
        clear_site(&mut registry, &mut lattice, 11);

        let engine = TransitionEngine::new(params(ModelVariant::MoveOrGrow, 0.0, 0.0, 0.0));
        let report = engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(1)).unwrap();

        // 13 (0°) comes before 11 (180°); the scan stops after the move.
        assert_eq!(report.cancer_cells_moved, 1);
        assert_eq!(registry.cancer_cell(cc).unwrap().site_id, 13);
        assert_eq!(lattice.site(13).unwrap().occupant(), Some(cc));
        assert_eq!(lattice.site(12).unwrap().site_type(), SiteType::NotOccupied);
        assert_eq!(lattice.site(11).unwrap().site_type(), SiteType::NotOccupied);
        assert_eq!(registry.cancer_cell_count(), 1);
    }

    #[test]
    fn hepatocyte_removed_earlier_in_the_step_is_skipped() {
        // Hepatocyte 12 sits between cancer cells on 11, 13 and 17 and is queued once by each.
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        let cancer_sites = [11, 13, 17];
        for site in cancer_sites {
            plant_cancer(&mut registry, &mut lattice, site);
        }
        let hep = hep_at(&registry, &lattice, 12);

        // Expected queue multiplicities, by hepatocyte site.
        let mut visits: HashMap<SiteId, usize> = HashMap::new();
        for site in cancer_sites {
            for &n in lattice.site(site).unwrap().adjacent_site_ids().unwrap() {
                if lattice.site(n).unwrap().site_type() == SiteType::Hepatocyte {
                    *visits.entry(n).or_default() += 1;
                }
            }
        }
        assert_eq!(visits[&12], 3);

        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 0.0, 1.0, 1.0));
        let report = engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(3)).unwrap();

        // First visit damages, second clears, any later visit finds nothing to do.
        assert_eq!(report.hepatocytes_queued, visits.values().sum::<usize>());
        assert_eq!(report.hepatocytes_damaged, visits.len());
        assert_eq!(report.hepatocytes_cleared, visits.values().filter(|&&v| v >= 2).count());
        assert_eq!(report.hepatocytes_fibrosed, 0);
        assert!(registry.hepatocyte(hep).is_none());
        assert_eq!(lattice.site(12).unwrap().site_type(), SiteType::NotOccupied);
        registry.verify_consistency(&lattice).unwrap();
    }

    #[test]
    fn move_or_grow_grows_when_growth_succeeds() {
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        let cc = plant_cancer(&mut registry, &mut lattice, 12);
        clear_site(&mut registry, &mut lattice, 13);
        clear_site(&mut registry, &mut lattice, 11);

        let engine = TransitionEngine::new(params(ModelVariant::MoveOrGrow, 1.0, 0.0, 0.0));
        let report = engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(report.cancer_cells_grown, 2);
        assert_eq!(report.cancer_cells_moved, 0);
        assert_eq!(registry.cancer_cell(cc).unwrap().site_id, 12);
        assert_eq!(lattice.site(12).unwrap().occupant(), Some(cc));
        assert_eq!(lattice.site(13).unwrap().site_type(), SiteType::CancerCellOccupied);
        assert_eq!(lattice.site(11).unwrap().site_type(), SiteType::CancerCellOccupied);
        assert_eq!(registry.cancer_cell_count(), 3);
    }

    #[test]
    fn baseline_does_not_move_when_growth_fails() {
        let (mut lattice, mut registry) = tissue(&hex_records(5, 5, 1.0), 0.0);
        let cc = plant_cancer(&mut registry, &mut lattice, 12);
        clear_site(&mut registry, &mut lattice, 13);
        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 0.0, 0.0, 0.0));
        engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(registry.cancer_cell(cc).unwrap().site_id, 12);
    }

    #[test]
    fn cancer_on_site_without_adjacency_is_reported() {
        let mut records = hex_records(3, 3, 1.0);
        records[4].site_type = SiteType::NotOccupied;
        let (mut lattice, mut registry) = tissue(&records, 0.0);
        registry.spawn(&mut lattice, CellKind::Cancer, 4, CellState::Proliferative).unwrap();
        let engine = TransitionEngine::new(params(ModelVariant::Baseline, 1.0, 0.0, 0.0));
        let err = engine.step(&mut lattice, &mut registry, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, SimError::MissingAdjacency { site_id: 4 }));
    }

    #[test]
    fn state_stays_consistent_over_many_random_steps() {
        for variant in ModelVariant::ALL {
            let mut lattice = Lattice::build(&hex_records(12, 12, 1.0), 1.0, 3.0).unwrap();
            let mut rng = StdRng::seed_from_u64(77);
            let mut registry = CellRegistry::seed(&mut lattice, 4, &mut rng).unwrap();
            let engine = TransitionEngine::new(SimParams::for_variant(variant, 1.0));
            for _ in 0..15 {
                engine.step(&mut lattice, &mut registry, &mut rng).unwrap();
                registry.verify_consistency(&lattice).unwrap();
            }
        }
    }
}
