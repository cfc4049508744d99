//! Hepatocellular carcinoma growth on a hexagonal liver lattice.
//!
//! [`lattice`] builds the static site grid with frozen adjacency and zonation,
//! [`registry`] keeps live cells in lockstep with lattice occupancy,
//! [`transition`] and [`immune`] apply the per-step stochastic rules, and
//! [`nodules`] measures tumour nodules on demand.

pub mod grid;
pub mod immune;
pub mod lattice;
pub mod nodules;
pub mod registry;
pub mod simulation;
pub mod site_table;
pub mod transition;

pub use immune::{immune_predation, PredationReport};
pub use lattice::{Lattice, Neighbors, OccupiedSite, Site, SiteRecord, SiteType, Zonation};
pub use nodules::{NoduleAnalyzer, NoduleLabel, NoduleReport};
pub use registry::{Cell, CellKind, CellRegistry, CellState};
pub use simulation::{HccSimulation, StepReport};
pub use site_table::{load_site_table, read_site_table};
pub use transition::{TransitionEngine, TransitionReport};
