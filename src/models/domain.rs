use std::collections::HashSet;

use geo::Point;
use serde::{Deserialize, Serialize};

use crate::core::distance::checked_point;
use crate::core::error::{InputError, RebalanceError};

/// Precinct row as supplied by the loading layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecinctRecord {
    pub id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Active voters from the current registration snapshot
    #[serde(rename = "voterCount", alias = "voter_count", default)]
    pub voter_count: Option<u64>,
    /// Prior census figure, used when the snapshot has no entry
    #[serde(rename = "priorVoterCount", alias = "prior_voter_count", default)]
    pub prior_voter_count: Option<u64>,
}

impl PrecinctRecord {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64, voter_count: u64) -> Self {
        Self {
            id: id.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            voter_count: Some(voter_count),
            prior_voter_count: None,
        }
    }
}

/// Polling location (VSPC) row as supplied by the loading layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub protected: bool,
    #[serde(flatten)]
    pub display: LocationDisplay,
}

impl LocationRecord {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            protected: false,
            display: LocationDisplay::default(),
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

/// Display attributes of a location; carried through to reports untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

/// Validated precinct
#[derive(Debug, Clone, PartialEq)]
pub struct Precinct {
    pub id: String,
    pub point: Point<f64>,
    pub voters: u64,
}

/// Validated polling location
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub point: Point<f64>,
    pub protected: bool,
    pub display: LocationDisplay,
}

/// The validated precinct and location tables for one run.
///
/// Precincts and locations are addressed by their position in these tables
/// everywhere in the core; positions also serve as the documented
/// tie-break order.
#[derive(Debug, Clone)]
pub struct ServiceArea {
    precincts: Vec<Precinct>,
    locations: Vec<Location>,
    total_voters: u64,
}

impl ServiceArea {
    /// Validate raw records into a service area.
    ///
    /// Rejects empty tables, empty or duplicate ids, missing or out-of-range
    /// coordinates, and a zero voter total. A precinct with neither a
    /// current nor a prior voter count is kept with zero voters.
    pub fn from_records(
        precincts: Vec<PrecinctRecord>,
        locations: Vec<LocationRecord>,
    ) -> Result<Self, RebalanceError> {
        if locations.is_empty() {
            return Err(InputError::NoLocations.into());
        }
        if precincts.is_empty() {
            return Err(InputError::NoPrecincts.into());
        }

        let mut seen = HashSet::with_capacity(locations.len());
        let locations = locations
            .into_iter()
            .map(|record| {
                if record.id.trim().is_empty() {
                    return Err(InputError::EmptyId { kind: "location" });
                }
                if !seen.insert(record.id.clone()) {
                    return Err(InputError::DuplicateId { kind: "location", id: record.id });
                }
                let point = record
                    .latitude
                    .zip(record.longitude)
                    .and_then(|(lat, lon)| checked_point(lat, lon))
                    .ok_or_else(|| InputError::InvalidCoordinate {
                        kind: "location",
                        id: record.id.clone(),
                    })?;
                Ok(Location {
                    id: record.id,
                    point,
                    protected: record.protected,
                    display: record.display,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(precincts.len());
        let precincts = precincts
            .into_iter()
            .map(|record| {
                if record.id.trim().is_empty() {
                    return Err(InputError::EmptyId { kind: "precinct" });
                }
                if !seen.insert(record.id.clone()) {
                    return Err(InputError::DuplicateId { kind: "precinct", id: record.id });
                }
                let point = record
                    .latitude
                    .zip(record.longitude)
                    .and_then(|(lat, lon)| checked_point(lat, lon))
                    .ok_or_else(|| InputError::InvalidCoordinate {
                        kind: "precinct",
                        id: record.id.clone(),
                    })?;
                let voters = match (record.voter_count, record.prior_voter_count) {
                    (Some(current), _) => current,
                    (None, Some(prior)) => {
                        tracing::debug!("Precinct {} has no current voter count, using prior figure {}", record.id, prior);
                        prior
                    }
                    (None, None) => {
                        tracing::warn!("Precinct {} has no voter count, treating as 0", record.id);
                        0
                    }
                };
                Ok(Precinct { id: record.id, point, voters })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_voters = precincts.iter().map(|p| p.voters).sum::<u64>();
        if total_voters == 0 {
            return Err(InputError::ZeroTotalVoters.into());
        }

        Ok(Self { precincts, locations, total_voters })
    }

    pub fn precincts(&self) -> &[Precinct] {
        &self.precincts
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn precinct(&self, precinct: usize) -> &Precinct {
        &self.precincts[precinct]
    }

    pub fn location(&self, location: usize) -> &Location {
        &self.locations[location]
    }

    pub fn total_voters(&self) -> u64 {
        self.total_voters
    }

    /// Average voters per location
    pub fn target_voters(&self) -> f64 {
        self.total_voters as f64 / self.locations.len() as f64
    }
}

/// Fixed point used by the cross-region guard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionCenter {
    pub latitude: f64,
    pub longitude: f64,
}

/// Parameters of one rebalancing run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceConfig {
    /// Half-width of the acceptable band as a fraction of target load
    pub target_tolerance: f64,
    /// Hard bound on rounds; reaching it ends the run as stalled
    pub max_rounds: u32,
    /// A destination must sit within this many closest locations
    /// (rank 0 included)
    pub max_closest_locations_to_check: usize,
    pub max_distance_km: f64,
    /// Focus load / target above which relaxed destinations may be used
    pub severe_overload_multiplier: f64,
    /// Ceiling, as a multiple of target, for relaxed destinations
    pub relaxed_ceiling_multiplier: f64,
    pub region_guard_enabled: bool,
    /// Centre for the region guard; the location centroid when unset
    pub region_center: Option<RegionCenter>,
    /// Locations nearest to at most this many precincts are protected
    pub rural_precinct_threshold: Option<usize>,
    pub stall_after_idle_rounds: u32,
    /// Rounds between progress checkpoints; `None` disables the check
    pub progress_window: Option<u32>,
    /// Required fractional drop of the peak load per progress window
    pub min_improvement: f64,
    pub record_diagnostics: bool,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            target_tolerance: 0.25,
            max_rounds: 300,
            max_closest_locations_to_check: 5,
            max_distance_km: 30.0,
            severe_overload_multiplier: 2.0,
            relaxed_ceiling_multiplier: 1.5,
            region_guard_enabled: false,
            region_center: None,
            rural_precinct_threshold: Some(3),
            stall_after_idle_rounds: 1,
            progress_window: Some(25),
            min_improvement: 0.005,
            record_diagnostics: false,
        }
    }
}

impl RebalanceConfig {
    /// Reject configurations that make the loop meaningless
    pub fn validate(&self) -> Result<(), RebalanceError> {
        if !(self.target_tolerance > 0.0 && self.target_tolerance < 1.0) {
            return Err(RebalanceError::config(format!(
                "target_tolerance must be within (0, 1), got {}",
                self.target_tolerance
            )));
        }
        if self.max_rounds == 0 {
            return Err(RebalanceError::config("max_rounds must be at least 1"));
        }
        if self.max_closest_locations_to_check == 0 {
            return Err(RebalanceError::config(
                "max_closest_locations_to_check must be at least 1",
            ));
        }
        if !(self.max_distance_km.is_finite() && self.max_distance_km > 0.0) {
            return Err(RebalanceError::config(format!(
                "max_distance_km must be positive, got {}",
                self.max_distance_km
            )));
        }
        if !(self.severe_overload_multiplier.is_finite() && self.severe_overload_multiplier > 1.0) {
            return Err(RebalanceError::config(format!(
                "severe_overload_multiplier must be greater than 1, got {}",
                self.severe_overload_multiplier
            )));
        }
        if !(self.relaxed_ceiling_multiplier.is_finite() && self.relaxed_ceiling_multiplier > 1.0) {
            return Err(RebalanceError::config(format!(
                "relaxed_ceiling_multiplier must be greater than 1, got {}",
                self.relaxed_ceiling_multiplier
            )));
        }
        if self.stall_after_idle_rounds == 0 {
            return Err(RebalanceError::config("stall_after_idle_rounds must be at least 1"));
        }
        if self.progress_window == Some(0) {
            return Err(RebalanceError::config("progress_window must be at least 1 when set"));
        }
        if !(0.0..1.0).contains(&self.min_improvement) {
            return Err(RebalanceError::config(format!(
                "min_improvement must be within [0, 1), got {}",
                self.min_improvement
            )));
        }
        if let Some(center) = self.region_center {
            if checked_point(center.latitude, center.longitude).is_none() {
                return Err(RebalanceError::config("region_center is not a valid coordinate"));
            }
        }
        Ok(())
    }
}
