use crate::core::distance::point_distance_km;
use crate::models::ServiceArea;

/// A location as seen from one precinct
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedLocation {
    pub location: usize,
    pub distance_km: f64,
}

/// Every location ranked by distance from every precinct.
///
/// Built once per run and never invalidated. Equidistant locations keep
/// their input order.
#[derive(Debug, Clone)]
pub struct ProximityIndex {
    rankings: Vec<Vec<RankedLocation>>,
    // positions[p][l] is the rank of location l for precinct p
    positions: Vec<Vec<usize>>,
}

impl ProximityIndex {
    pub fn build(area: &ServiceArea) -> Self {
        let locations = area.locations();

        let rankings: Vec<Vec<RankedLocation>> = area
            .precincts()
            .iter()
            .map(|precinct| {
                let mut ranking: Vec<RankedLocation> = locations
                    .iter()
                    .enumerate()
                    .map(|(location, loc)| RankedLocation {
                        location,
                        distance_km: point_distance_km(&precinct.point, &loc.point),
                    })
                    .collect();
                // sort_by is stable, so ties fall back to input order
                ranking.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
                ranking
            })
            .collect();

        let positions = rankings
            .iter()
            .map(|ranking| {
                let mut position = vec![0; ranking.len()];
                for (rank, entry) in ranking.iter().enumerate() {
                    position[entry.location] = rank;
                }
                position
            })
            .collect();

        tracing::debug!(
            "Built proximity index for {} precincts x {} locations",
            rankings.len(),
            locations.len()
        );

        Self { rankings, positions }
    }

    /// The k-th closest location to a precinct (0 = nearest)
    pub fn rank(&self, precinct: usize, k: usize) -> Option<RankedLocation> {
        self.rankings.get(precinct)?.get(k).copied()
    }

    /// Full ascending ranking for a precinct
    pub fn ranking(&self, precinct: usize) -> &[RankedLocation] {
        &self.rankings[precinct]
    }

    /// Rank of `location` in the precinct's ranking
    pub fn rank_of(&self, precinct: usize, location: usize) -> usize {
        self.positions[precinct][location]
    }

    pub fn nearest(&self, precinct: usize) -> RankedLocation {
        // ServiceArea guarantees at least one location
        self.rankings[precinct][0]
    }

    /// Second-closest location, if there is more than one
    pub fn secondary(&self, precinct: usize) -> Option<RankedLocation> {
        self.rank(precinct, 1)
    }

    pub fn distance_km(&self, precinct: usize, location: usize) -> f64 {
        self.rankings[precinct][self.rank_of(precinct, location)].distance_km
    }

    pub fn precinct_count(&self) -> usize {
        self.rankings.len()
    }

    pub fn location_count(&self) -> usize {
        self.rankings.first().map_or(0, Vec::len)
    }
}
