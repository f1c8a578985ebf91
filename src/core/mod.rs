// Core algorithm exports
pub mod assignment;
pub mod constraints;
pub mod distance;
pub mod error;
pub mod loads;
pub mod proximity;
pub mod rebalancer;

pub use assignment::{AssignmentReport, AssignmentState, LocationSummary, PrecinctAssignment};
pub use constraints::{CapacityMode, ConstraintPolicy, LoadBand, Quadrant, Rejection};
pub use distance::{haversine_distance, haversine_distance_miles};
pub use error::{InputError, RebalanceError};
pub use loads::{LoadLedger, LocationLoad};
pub use proximity::{ProximityIndex, RankedLocation};
pub use rebalancer::{
    EngineStatus, IdleReason, IdleRound, Move, RebalanceOutcome, Rebalancer, RoundOutcome, StallReason,
};
