use serde::Serialize;

use crate::models::Precinct;

/// Voter and precinct totals for one location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocationLoad {
    pub voters: u64,
    pub precincts: usize,
}

/// Per-location totals derived from an assignment.
///
/// Kept current either by full recomputation or by `apply_move`; both
/// produce identical ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadLedger {
    loads: Vec<LocationLoad>,
}

impl LoadLedger {
    /// Full recomputation from `assigned[p] = location`
    pub fn from_assignment(assigned: &[usize], precincts: &[Precinct], location_count: usize) -> Self {
        let mut loads = vec![LocationLoad::default(); location_count];
        for (precinct, &location) in precincts.iter().zip(assigned) {
            let load = &mut loads[location];
            load.voters += precinct.voters;
            load.precincts += 1;
        }
        Self { loads }
    }

    /// Move one precinct's voters between two locations
    pub fn apply_move(&mut self, voters: u64, from: usize, to: usize) {
        debug_assert!(self.loads[from].voters >= voters && self.loads[from].precincts > 0);

        let source = &mut self.loads[from];
        source.voters = source.voters.saturating_sub(voters);
        source.precincts = source.precincts.saturating_sub(1);

        let destination = &mut self.loads[to];
        destination.voters += voters;
        destination.precincts += 1;
    }

    pub fn get(&self, location: usize) -> LocationLoad {
        self.loads[location]
    }

    pub fn voters(&self, location: usize) -> u64 {
        self.loads[location].voters
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, LocationLoad)> + '_ {
        self.loads.iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn total_voters(&self) -> u64 {
        self.loads.iter().map(|l| l.voters).sum()
    }

    /// Largest voter total over the locations accepted by `include`
    pub fn peak_voters<F>(&self, mut include: F) -> u64
    where
        F: FnMut(usize) -> bool,
    {
        self.iter()
            .filter(|(location, _)| include(*location))
            .map(|(_, load)| load.voters)
            .max()
            .unwrap_or(0)
    }
}
