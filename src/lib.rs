//! VSPC Rebalancer - load balancing of precinct to vote-center assignments
//!
//! Every precinct starts at its nearest Vote Service and Polling Center and
//! is then moved, one precinct per round, away from overloaded centers to
//! farther legal alternatives until every center sits within a tolerance
//! band around the mean load.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;

// Re-export commonly used types
pub use core::{distance::haversine_distance, RebalanceError, RebalanceOutcome, Rebalancer};
pub use models::{LocationRecord, PrecinctRecord, RebalanceConfig, RebalanceRequest, RebalanceResponse};
