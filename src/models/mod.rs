// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Location, LocationDisplay, LocationRecord, Precinct, PrecinctRecord, RebalanceConfig, RegionCenter, ServiceArea,
};
pub use requests::{ConfigOverrides, RebalanceRequest};
pub use responses::{ErrorResponse, HealthResponse, MoveEntry, RebalanceResponse};
