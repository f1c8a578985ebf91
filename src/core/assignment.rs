use serde::Serialize;

use crate::core::constraints::LoadBand;
use crate::core::distance::km_to_miles;
use crate::core::loads::LoadLedger;
use crate::core::proximity::ProximityIndex;
use crate::models::{LocationDisplay, ServiceArea};

/// Current precinct -> location mapping plus the fixed nearest baseline.
///
/// Every precinct always maps to exactly one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentState {
    assigned: Vec<usize>,
    nearest: Vec<usize>,
}

impl AssignmentState {
    /// Every precinct assigned to its rank-0 location
    pub fn nearest(index: &ProximityIndex) -> Self {
        let nearest: Vec<usize> = (0..index.precinct_count())
            .map(|p| index.nearest(p).location)
            .collect();
        Self {
            assigned: nearest.clone(),
            nearest,
        }
    }

    pub fn assigned(&self, precinct: usize) -> usize {
        self.assigned[precinct]
    }

    pub fn nearest_of(&self, precinct: usize) -> usize {
        self.nearest[precinct]
    }

    pub fn is_reassigned(&self, precinct: usize) -> bool {
        self.assigned[precinct] != self.nearest[precinct]
    }

    /// Precinct indices currently served by `location`, in input order
    pub fn precincts_at(&self, location: usize) -> impl Iterator<Item = usize> + '_ {
        self.assigned
            .iter()
            .enumerate()
            .filter(move |(_, &l)| l == location)
            .map(|(p, _)| p)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.assigned
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn reassigned_count(&self) -> usize {
        (0..self.assigned.len()).filter(|&p| self.is_reassigned(p)).count()
    }

    pub(crate) fn reassign(&mut self, precinct: usize, location: usize) {
        self.assigned[precinct] = location;
    }
}

/// Output row for one precinct
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecinctAssignment {
    pub precinct_id: String,
    pub voters: u64,
    pub assigned_location: String,
    pub assigned_rank: usize,
    pub nearest_location: String,
    pub secondary_location: Option<String>,
    pub distance_to_assigned_km: f64,
    pub distance_to_nearest_km: f64,
    pub distance_delta_km: f64,
    pub distance_to_assigned_miles: f64,
    pub distance_to_nearest_miles: f64,
    pub distance_delta_miles: f64,
    pub reassigned: bool,
}

/// Output row for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub location_id: String,
    pub voters_assigned: u64,
    pub precincts_assigned: usize,
    pub protected: bool,
    /// Percent above (+) or below (-) the target load
    pub deviation_pct: f64,
    #[serde(flatten)]
    pub display: LocationDisplay,
}

/// Read-only snapshot handed to reporting and export consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub target_voters: f64,
    pub tolerance_voters: f64,
    pub precincts: Vec<PrecinctAssignment>,
    pub locations: Vec<LocationSummary>,
}

impl AssignmentReport {
    pub fn build(
        area: &ServiceArea,
        index: &ProximityIndex,
        state: &AssignmentState,
        loads: &LoadLedger,
        band: &LoadBand,
        protected: &[bool],
    ) -> Self {
        let precincts = area
            .precincts()
            .iter()
            .enumerate()
            .map(|(p, precinct)| {
                let assigned = state.assigned(p);
                let nearest = state.nearest_of(p);
                let to_assigned = index.distance_km(p, assigned);
                let to_nearest = index.distance_km(p, nearest);
                let delta = to_assigned - to_nearest;

                PrecinctAssignment {
                    precinct_id: precinct.id.clone(),
                    voters: precinct.voters,
                    assigned_location: area.location(assigned).id.clone(),
                    assigned_rank: index.rank_of(p, assigned),
                    nearest_location: area.location(nearest).id.clone(),
                    secondary_location: index
                        .secondary(p)
                        .map(|r| area.location(r.location).id.clone()),
                    distance_to_assigned_km: to_assigned,
                    distance_to_nearest_km: to_nearest,
                    distance_delta_km: delta,
                    distance_to_assigned_miles: km_to_miles(to_assigned),
                    distance_to_nearest_miles: km_to_miles(to_nearest),
                    distance_delta_miles: km_to_miles(delta),
                    reassigned: state.is_reassigned(p),
                }
            })
            .collect();

        let locations = area
            .locations()
            .iter()
            .enumerate()
            .map(|(l, location)| {
                let load = loads.get(l);
                LocationSummary {
                    location_id: location.id.clone(),
                    voters_assigned: load.voters,
                    precincts_assigned: load.precincts,
                    protected: protected.get(l).copied().unwrap_or(location.protected),
                    deviation_pct: (band.ratio(load.voters) - 1.0) * 100.0,
                    display: location.display.clone(),
                }
            })
            .collect();

        Self {
            target_voters: band.target,
            tolerance_voters: band.tolerance,
            precincts,
            locations,
        }
    }

    pub fn precinct(&self, id: &str) -> Option<&PrecinctAssignment> {
        self.precincts.iter().find(|p| p.precinct_id == id)
    }

    pub fn location(&self, id: &str) -> Option<&LocationSummary> {
        self.locations.iter().find(|l| l.location_id == id)
    }

    pub fn reassigned_count(&self) -> usize {
        self.precincts.iter().filter(|p| p.reassigned).count()
    }

    /// Locations still outside the tolerance band, protected ones included
    pub fn out_of_band(&self) -> Vec<&LocationSummary> {
        let lower = self.target_voters - self.tolerance_voters;
        let upper = self.target_voters + self.tolerance_voters;
        self.locations
            .iter()
            .filter(|l| (l.voters_assigned as f64) < lower || l.voters_assigned as f64 > upper)
            .collect()
    }
}
