pub mod config;
pub mod error;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

/// Identity of a lattice site, as given by the external site table.
pub type SiteId = u32;
/// Identity of a live cell. Assigned from one monotonic counter, never reused.
pub type CellId = u64;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, LatticeConfig, ModelConfig, InitialConditions, TimingConfig, OutputConfig};
pub use error::{SimError, SimResult};
pub use sim_params::{SimParams, ModelVariant, DamageQueuePolicy};
pub use snapshot::Snapshot;
pub use vecmath::{Vec2, angle_to_vec};
