use hcc_common::{SimParams, SimulationConfig, Snapshot};
use anyhow::Result;
use log::{debug, info};
use rand::prelude::*;

use crate::immune::{immune_predation, PredationReport};
use crate::lattice::{Lattice, SiteRecord, SiteType};
use crate::nodules::{NoduleAnalyzer, NoduleLabel, NoduleReport};
use crate::registry::{CellRegistry, CellState};
use crate::transition::{TransitionEngine, TransitionReport};

/// What one full step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub transition: TransitionReport,
    /// Present only under the immune predation variant.
    pub predation: Option<PredationReport>,
}

/// Owns the lattice, the cell registry and the run's random source, and
/// sequences transition and predation passes.
pub struct HccSimulation {
    config: SimulationConfig,
    params: SimParams,
    lattice: Lattice,
    registry: CellRegistry,
    engine: TransitionEngine,
    analyzer: NoduleAnalyzer,
    /// Single seeded source for every stochastic decision of the run.
    rng: StdRng,
    current_step: u32,
    recorded_snapshots: Vec<Snapshot>,
}

impl HccSimulation {
    /// Builds and annotates the lattice, populates hepatocytes and seeds the initial cancer cells.
    pub fn new(config: SimulationConfig, site_records: &[SiteRecord]) -> Result<Self> {
        let params = config.get_sim_params()?;
        let mut rng = StdRng::seed_from_u64(config.initial_conditions.seed);

        let mut lattice = Lattice::build(site_records, params.spacing, params.pericentral_radius)?;
        let registry = CellRegistry::seed(&mut lattice, config.initial_conditions.num_cancer_cells, &mut rng)?;
        registry.verify_consistency(&lattice)?;

        info!(
            "Initialized {} variant: {} sites, {} hepatocytes, {} cancer cells.",
            params.variant,
            lattice.len(),
            registry.hepatocyte_count(),
            registry.cancer_cell_count()
        );

        Ok(Self {
            engine: TransitionEngine::new(params.clone()),
            analyzer: NoduleAnalyzer::new(params.spacing),
            config,
            params,
            lattice,
            registry,
            rng,
            current_step: 0,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Advances the simulation by one step: transition rules, then immune predation if enabled.
    pub fn step(&mut self) -> Result<StepReport> {
        let transition = self.engine.step(&mut self.lattice, &mut self.registry, &mut self.rng)?;
        let predation = if self.params.variant.has_immune_predation() {
            Some(immune_predation(&mut self.lattice, &mut self.registry, &self.params, &mut self.rng)?)
        } else {
            None
        };
        self.current_step += 1;
        Ok(StepReport { transition, predation })
    }

    /// Runs `steps` steps back to back.
    pub fn run(&mut self, steps: u32) -> Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Partitions the current cancer sites into nodules.
    pub fn analyze_nodules(&self) -> NoduleReport {
        self.analyzer.analyze(&self.lattice.cancer_sites())
    }

    /// Appends a snapshot of the current occupancy and nodule sizes.
    pub fn record_snapshot(&mut self) -> Result<()> {
        debug!("Recording snapshot at step {}...", self.current_step);
        let nodules = self.analyze_nodules();
        let positions = if self.config.output.save_positions_in_snapshot {
            Some(self.registry.cancer_cells().map(|c| (c.position.x, c.position.y)).collect())
        } else {
            None
        };

        let snapshot = Snapshot {
            step: self.current_step,
            cancer_cell_count: self.registry.cancer_cell_count(),
            hepatocyte_count: self.registry.hepatocyte_count(),
            apoptotic_hepatocyte_count: self
                .registry
                .hepatocytes()
                .filter(|h| h.state == CellState::Apoptotic)
                .count(),
            not_occupied_count: self.lattice.count_of(SiteType::NotOccupied),
            ecm_count: self.lattice.count_of(SiteType::Ecm),
            nodule_count: nodules.nodule_count(),
            largest_nodule: nodules.largest(),
            nodule_sizes: nodules.size_distribution(),
            positions,
        };
        info!(
            "Snapshot step {}: {} cancer cells in {} nodules (largest {}), {} hepatocytes, {} ECM sites",
            snapshot.step,
            snapshot.cancer_cell_count,
            snapshot.nodule_count,
            snapshot.largest_nodule,
            snapshot.hepatocyte_count,
            snapshot.ecm_count
        );
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    /// Final cancer-cell positions paired with their nodule labels, in lattice order.
    pub fn final_cancer_positions(&self) -> Vec<(NoduleLabel, (f64, f64))> {
        let sites = self.lattice.cancer_sites();
        let report = self.analyzer.analyze(&sites);
        report
            .labels
            .into_iter()
            .zip(sites)
            .map(|(label, site)| (label, (site.position.x, site.position.y)))
            .collect()
    }

    pub fn current_step(&self) -> u32 { self.current_step }
    pub fn cancer_cell_count(&self) -> usize { self.registry.cancer_cell_count() }
    pub fn params(&self) -> &SimParams { &self.params }
    pub fn config(&self) -> &SimulationConfig { &self.config }
    pub fn lattice(&self) -> &Lattice { &self.lattice }
    pub fn registry(&self) -> &CellRegistry { &self.registry }
}
