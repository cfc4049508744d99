use thiserror::Error;

use crate::SiteId;

/// Failures raised by the lattice, registry and transition components.
///
/// All of these are local and synchronous. A step that returns one of them
/// has left the lattice and registry in an unspecified state and its result
/// must be discarded by the caller.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("requested {requested} initial cancer cells but only {available} hepatocyte sites are available")]
    InsufficientSites { requested: usize, available: usize },

    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("inconsistent lattice/registry state: {0}")]
    InconsistentState(String),

    #[error("site {site_id} has no recorded adjacency")]
    MissingAdjacency { site_id: SiteId },

    #[error("invalid site table: {0}")]
    InvalidSiteTable(String),
}

pub type SimResult<T> = Result<T, SimError>;
