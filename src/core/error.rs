use thiserror::Error;

/// Problems with the precinct or location tables that prevent a run from starting
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("no polling locations supplied")]
    NoLocations,

    #[error("no precincts supplied")]
    NoPrecincts,

    #[error("{kind} {id} has a missing or invalid coordinate")]
    InvalidCoordinate { kind: &'static str, id: String },

    #[error("{kind} id {id:?} appears more than once")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{kind} has an empty id")]
    EmptyId { kind: &'static str },

    #[error("total voters across all precincts is zero")]
    ZeroTotalVoters,
}

/// Errors that stop the rebalancer before the convergence loop starts
///
/// Running out of legal moves is not an error; it is reported as a
/// `Stalled` outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RebalanceError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("Configuration inconsistency: {0}")]
    ConfigurationInconsistency(String),
}

impl RebalanceError {
    pub fn config(message: impl Into<String>) -> Self {
        RebalanceError::ConfigurationInconsistency(message.into())
    }
}
