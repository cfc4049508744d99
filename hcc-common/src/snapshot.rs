use serde::{Serialize, Deserialize};

/// A snapshot of lattice occupancy and tumour measurements after a given step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed steps when the snapshot was taken (0 = initial state).
    pub step: u32,
    pub cancer_cell_count: usize,
    pub hepatocyte_count: usize,
    /// Hepatocytes currently in the apoptotic state.
    pub apoptotic_hepatocyte_count: usize,
    pub not_occupied_count: usize,
    pub ecm_count: usize,
    pub nodule_count: usize,
    pub largest_nodule: usize,
    /// Nodule sizes in descending order.
    pub nodule_sizes: Vec<usize>,
    /// Cancer-cell positions, included only if `output.save_positions_in_snapshot` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<(f64, f64)>>,
}
