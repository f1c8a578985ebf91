use std::fmt;

use geo::{Centroid, MultiPoint, Point};
use serde::Serialize;

use crate::core::loads::LoadLedger;
use crate::core::proximity::ProximityIndex;
use crate::models::{RebalanceConfig, ServiceArea};

/// Acceptable voter band around the target load
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadBand {
    pub target: f64,
    pub tolerance: f64,
}

impl LoadBand {
    pub fn new(target: f64, tolerance_fraction: f64) -> Self {
        Self {
            target,
            tolerance: target * tolerance_fraction,
        }
    }

    pub fn lower(&self) -> f64 {
        self.target - self.tolerance
    }

    pub fn upper(&self) -> f64 {
        self.target + self.tolerance
    }

    #[inline]
    pub fn is_overloaded(&self, voters: u64) -> bool {
        voters as f64 > self.upper()
    }

    #[inline]
    pub fn is_underloaded(&self, voters: u64) -> bool {
        (voters as f64) < self.lower()
    }

    pub fn ratio(&self, voters: u64) -> f64 {
        voters as f64 / self.target
    }
}

/// Which destination ceiling applies this round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityMode {
    /// Destinations must be under-loaded
    Normal,
    /// Destinations only need to be below the relaxed ceiling
    Relaxed,
}

/// Quadrant of a point relative to the regional centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quadrant {
    NE,
    NW,
    SE,
    SW,
}

impl Quadrant {
    pub fn of(point: &Point<f64>, center: &Point<f64>) -> Self {
        let north = point.y() >= center.y();
        let east = point.x() >= center.x();
        match (north, east) {
            (true, true) => Quadrant::NE,
            (true, false) => Quadrant::NW,
            (false, true) => Quadrant::SE,
            (false, false) => Quadrant::SW,
        }
    }

    pub fn is_opposite(self, other: Quadrant) -> bool {
        matches!(
            (self, other),
            (Quadrant::SW, Quadrant::NE)
                | (Quadrant::NE, Quadrant::SW)
                | (Quadrant::NW, Quadrant::SE)
                | (Quadrant::SE, Quadrant::NW)
        )
    }
}

/// The rule that refused a candidate move
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum Rejection {
    /// The precinct has no voters, so moving it changes no load
    NoVoters,
    DistanceCap { distance_km: f64, max_km: f64 },
    RankWindow { rank: usize, window: usize },
    ProtectedSource,
    DestinationFull { voters: u64, ceiling: f64 },
    Overshoot { resulting_voters: u64, source_voters: u64 },
    CrossRegion { from: Quadrant, to: Quadrant, precinct: Quadrant },
}

impl Rejection {
    /// True when every farther-ranked candidate would fail the same rule
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Rejection::NoVoters
                | Rejection::DistanceCap { .. }
                | Rejection::RankWindow { .. }
                | Rejection::ProtectedSource
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoVoters => write!(f, "precinct has no voters"),
            Rejection::DistanceCap { distance_km, max_km } => {
                write!(f, "{:.2} km exceeds the {:.2} km cap", distance_km, max_km)
            }
            Rejection::RankWindow { rank, window } => {
                write!(f, "rank {} is outside the {} closest locations", rank, window)
            }
            Rejection::ProtectedSource => write!(f, "source location is protected"),
            Rejection::DestinationFull { voters, ceiling } => {
                write!(f, "destination holds {} voters, ceiling {:.0}", voters, ceiling)
            }
            Rejection::Overshoot { resulting_voters, source_voters } => write!(
                f,
                "destination would reach {} voters, source holds {}",
                resulting_voters, source_voters
            ),
            Rejection::CrossRegion { from, to, precinct } => write!(
                f,
                "move {:?} -> {:?} crosses the region for a {:?} precinct",
                from, to, precinct
            ),
        }
    }
}

/// Snapshot a candidate is judged against
#[derive(Debug, Clone, Copy)]
pub struct MoveContext<'a> {
    pub area: &'a ServiceArea,
    pub index: &'a ProximityIndex,
    pub loads: &'a LoadLedger,
    pub band: LoadBand,
    pub mode: CapacityMode,
}

/// Decides whether moving a precinct between two locations is legal.
///
/// Rules run in a fixed order: empty precinct, distance cap, rank window,
/// protected source, destination capacity (including the overshoot guard),
/// region guard. The first failing rule is returned.
#[derive(Debug, Clone)]
pub struct ConstraintPolicy {
    max_distance_km: f64,
    rank_window: usize,
    relaxed_ceiling_multiplier: f64,
    region_center: Option<Point<f64>>,
    protected: Vec<bool>,
}

impl ConstraintPolicy {
    pub fn new(config: &RebalanceConfig, area: &ServiceArea, index: &ProximityIndex) -> Self {
        let protected = protected_locations(area, index, config.rural_precinct_threshold);

        let region_center = if config.region_guard_enabled {
            config
                .region_center
                .map(|c| Point::new(c.longitude, c.latitude))
                .or_else(|| location_centroid(area))
        } else {
            None
        };

        if let Some(center) = region_center {
            tracing::debug!("Region guard centred at ({:.5}, {:.5})", center.y(), center.x());
        }

        Self {
            max_distance_km: config.max_distance_km,
            rank_window: config.max_closest_locations_to_check,
            relaxed_ceiling_multiplier: config.relaxed_ceiling_multiplier,
            region_center,
            protected,
        }
    }

    pub fn is_protected(&self, location: usize) -> bool {
        self.protected.get(location).copied().unwrap_or(false)
    }

    pub fn protected_flags(&self) -> &[bool] {
        &self.protected
    }

    pub fn region_center(&self) -> Option<Point<f64>> {
        self.region_center
    }

    /// Destination ceiling for a capacity mode
    pub fn ceiling(&self, band: &LoadBand, mode: CapacityMode) -> f64 {
        match mode {
            CapacityMode::Normal => band.lower(),
            CapacityMode::Relaxed => band.target * self.relaxed_ceiling_multiplier,
        }
    }

    pub fn allowed(
        &self,
        precinct: usize,
        from: usize,
        to: usize,
        ctx: &MoveContext<'_>,
    ) -> Result<(), Rejection> {
        // 0. Empty precinct
        if ctx.area.precinct(precinct).voters == 0 {
            return Err(Rejection::NoVoters);
        }

        // 1. Distance cap
        let distance_km = ctx.index.distance_km(precinct, to);
        if distance_km > self.max_distance_km {
            return Err(Rejection::DistanceCap {
                distance_km,
                max_km: self.max_distance_km,
            });
        }

        // 2. Rank window
        let rank = ctx.index.rank_of(precinct, to);
        if rank >= self.rank_window {
            return Err(Rejection::RankWindow {
                rank,
                window: self.rank_window,
            });
        }

        // 3. Protected source
        if self.is_protected(from) {
            return Err(Rejection::ProtectedSource);
        }

        // 4. Destination capacity
        let destination_voters = ctx.loads.voters(to);
        let ceiling = self.ceiling(&ctx.band, ctx.mode);
        if destination_voters as f64 >= ceiling {
            return Err(Rejection::DestinationFull {
                voters: destination_voters,
                ceiling,
            });
        }
        let source_voters = ctx.loads.voters(from);
        let resulting_voters = destination_voters + ctx.area.precinct(precinct).voters;
        if resulting_voters >= source_voters {
            return Err(Rejection::Overshoot {
                resulting_voters,
                source_voters,
            });
        }

        // 5. Region guard
        if let Some(center) = self.region_center {
            let from_q = Quadrant::of(&ctx.area.location(from).point, &center);
            let to_q = Quadrant::of(&ctx.area.location(to).point, &center);
            let precinct_q = Quadrant::of(&ctx.area.precinct(precinct).point, &center);
            if from_q.is_opposite(to_q) && to_q != precinct_q {
                return Err(Rejection::CrossRegion {
                    from: from_q,
                    to: to_q,
                    precinct: precinct_q,
                });
            }
        }

        Ok(())
    }
}

/// Explicitly protected locations plus, when a threshold is configured,
/// every location that is nearest to at least one and at most that many
/// precincts.
fn protected_locations(
    area: &ServiceArea,
    index: &ProximityIndex,
    rural_threshold: Option<usize>,
) -> Vec<bool> {
    let mut protected: Vec<bool> = area.locations().iter().map(|l| l.protected).collect();

    if let Some(threshold) = rural_threshold {
        let mut nearest_counts = vec![0usize; protected.len()];
        for precinct in 0..area.precincts().len() {
            nearest_counts[index.nearest(precinct).location] += 1;
        }
        for (location, count) in nearest_counts.into_iter().enumerate() {
            if (1..=threshold).contains(&count) && !protected[location] {
                tracing::debug!(
                    "Location {} is rural ({} nearest precincts), protecting it",
                    area.location(location).id,
                    count
                );
                protected[location] = true;
            }
        }
    }

    protected
}

fn location_centroid(area: &ServiceArea) -> Option<Point<f64>> {
    let points: MultiPoint<f64> = area.locations().iter().map(|l| l.point).collect();
    points.centroid()
}
