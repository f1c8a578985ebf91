use serde::Serialize;

use crate::core::assignment::{AssignmentReport, AssignmentState};
use crate::core::constraints::{CapacityMode, ConstraintPolicy, LoadBand, MoveContext, Rejection};
use crate::core::error::RebalanceError;
use crate::core::loads::LoadLedger;
use crate::core::proximity::ProximityIndex;
use crate::models::{RebalanceConfig, ServiceArea};

/// Engine lifecycle; `Converged` and `Stalled` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Running,
    Converged,
    Stalled,
}

/// Why a run ended in `Stalled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StallReason {
    /// Consecutive rounds found no legal move
    NoLegalMove,
    /// The peak load stopped dropping over a progress window
    NoProgress,
    /// `max_rounds` was reached
    RoundLimit,
}

/// One committed reassignment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub round: u32,
    pub precinct: usize,
    pub from: usize,
    pub to: usize,
    pub from_rank: usize,
    pub to_rank: usize,
    pub voters: u64,
    pub distance_km: f64,
    pub mode: CapacityMode,
}

/// A candidate the policy refused during an idle round
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRejection {
    pub precinct: usize,
    pub candidate: usize,
    pub rejection: Rejection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdleReason {
    /// Nothing is under-loaded and the focus is not severe enough to relax
    NoDestinations,
    /// Every precinct/candidate pair failed a rule
    AllCandidatesRejected,
}

/// A round that committed no move
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleRound {
    pub round: u32,
    pub focus: usize,
    pub reason: IdleReason,
    /// Filled only when diagnostics are enabled
    pub rejections: Vec<CandidateRejection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Moved(Move),
    Idle(IdleRound),
    Converged,
    Stalled(StallReason),
}

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceOutcome {
    pub status: EngineStatus,
    pub stall_reason: Option<StallReason>,
    pub rounds: u32,
    pub moves: Vec<Move>,
    pub report: AssignmentReport,
}

/// Greedy load rebalancer.
///
/// Starts from the nearest-location assignment and, one move per round,
/// drains the most overloaded location into the next-farther legal
/// alternative of its largest precincts.
#[derive(Debug, Clone)]
pub struct Rebalancer {
    area: ServiceArea,
    index: ProximityIndex,
    policy: ConstraintPolicy,
    config: RebalanceConfig,
    state: AssignmentState,
    loads: LoadLedger,
    band: LoadBand,
    status: EngineStatus,
    stall_reason: Option<StallReason>,
    rounds: u32,
    idle_rounds: u32,
    // peak_history[r] is the peak unprotected load after round r
    peak_history: Vec<u64>,
    moves: Vec<Move>,
}

impl Rebalancer {
    pub fn new(area: ServiceArea, config: RebalanceConfig) -> Result<Self, RebalanceError> {
        config.validate()?;

        let index = ProximityIndex::build(&area);
        let policy = ConstraintPolicy::new(&config, &area, &index);
        let state = AssignmentState::nearest(&index);
        let loads = LoadLedger::from_assignment(state.as_slice(), area.precincts(), area.locations().len());
        let band = LoadBand::new(area.target_voters(), config.target_tolerance);

        tracing::info!(
            "Rebalancer initialized: {} precincts, {} locations, {} voters, target {:.0} (±{:.0})",
            area.precincts().len(),
            area.locations().len(),
            area.total_voters(),
            band.target,
            band.tolerance
        );

        let mut engine = Self {
            area,
            index,
            policy,
            config,
            state,
            loads,
            band,
            status: EngineStatus::Running,
            stall_reason: None,
            rounds: 0,
            idle_rounds: 0,
            peak_history: Vec::new(),
            moves: Vec::new(),
        };
        engine.peak_history.push(engine.peak_unprotected());
        Ok(engine)
    }

    /// Validate records and build an engine in one go
    pub fn from_records(
        precincts: Vec<crate::models::PrecinctRecord>,
        locations: Vec<crate::models::LocationRecord>,
        config: RebalanceConfig,
    ) -> Result<Self, RebalanceError> {
        config.validate()?;
        let area = ServiceArea::from_records(precincts, locations)?;
        Self::new(area, config)
    }

    /// Run one round.
    ///
    /// After `Converged` this re-checks the loads and reports `Converged`
    /// again without moving anything; after `Stalled` it is a no-op.
    pub fn step(&mut self) -> RoundOutcome {
        if self.status == EngineStatus::Stalled {
            return RoundOutcome::Stalled(self.stall_reason.unwrap_or(StallReason::NoLegalMove));
        }

        let Some(focus) = self.select_focus() else {
            if self.status != EngineStatus::Converged {
                tracing::info!("Converged after {} rounds ({} moves)", self.rounds, self.moves.len());
            }
            self.status = EngineStatus::Converged;
            return RoundOutcome::Converged;
        };

        if self.rounds >= self.config.max_rounds {
            return self.stall(StallReason::RoundLimit);
        }
        self.rounds += 1;
        let round = self.rounds;

        let focus_load = self.loads.get(focus);
        tracing::debug!(
            "Round {}: focus {} with {} voters ({} precincts, {:.2}x target)",
            round,
            self.area.location(focus).id,
            focus_load.voters,
            focus_load.precincts,
            self.band.ratio(focus_load.voters)
        );

        let modes = self.capacity_modes(focus);
        let outcome = if modes.is_empty() {
            RoundOutcome::Idle(IdleRound {
                round,
                focus,
                reason: IdleReason::NoDestinations,
                rejections: Vec::new(),
            })
        } else {
            let mut rejections = Vec::new();
            let found = modes
                .into_iter()
                .find_map(|mode| self.find_move(round, focus, mode, &mut rejections));
            match found {
                Some(mv) => {
                    self.commit(&mv);
                    RoundOutcome::Moved(mv)
                }
                None => RoundOutcome::Idle(IdleRound {
                    round,
                    focus,
                    reason: IdleReason::AllCandidatesRejected,
                    rejections,
                }),
            }
        };

        if let RoundOutcome::Idle(idle) = &outcome {
            self.idle_rounds += 1;
            tracing::debug!(
                "Round {}: no move from {} ({:?}, {} rejections recorded)",
                round,
                self.area.location(focus).id,
                idle.reason,
                idle.rejections.len()
            );
        } else {
            self.idle_rounds = 0;
        }

        if self.idle_rounds >= self.config.stall_after_idle_rounds {
            self.stall(StallReason::NoLegalMove);
            return outcome;
        }

        let peak = self.peak_unprotected();
        self.peak_history.push(peak);

        // Judged only on idle rounds; a round that moves counts as progress
        if let (RoundOutcome::Idle(_), Some(window)) = (&outcome, self.config.progress_window) {
            let checkpoint = self
                .peak_history
                .len()
                .checked_sub(window as usize + 1)
                .map(|i| self.peak_history[i]);
            if let Some(checkpoint) = checkpoint {
                // Must drop below (1 - min_improvement) of the peak a window ago
                let required = checkpoint as f64 * (1.0 - self.config.min_improvement);
                if peak as f64 >= required {
                    tracing::debug!(
                        "Round {}: peak load {} vs {} {} rounds ago, insufficient progress",
                        round,
                        peak,
                        checkpoint,
                        window
                    );
                    self.stall(StallReason::NoProgress);
                    return outcome;
                }
            }
        }

        outcome
    }

    /// Run rounds until the engine reaches a terminal state
    pub fn run(mut self) -> RebalanceOutcome {
        while self.status == EngineStatus::Running {
            self.step();
        }

        let report = self.report();
        tracing::info!(
            "Rebalancing finished: {:?} after {} rounds, {} moves, {} precincts reassigned",
            self.status,
            self.rounds,
            self.moves.len(),
            report.reassigned_count()
        );

        RebalanceOutcome {
            status: self.status,
            stall_reason: self.stall_reason,
            rounds: self.rounds,
            moves: self.moves,
            report,
        }
    }

    pub fn report(&self) -> AssignmentReport {
        AssignmentReport::build(
            &self.area,
            &self.index,
            &self.state,
            &self.loads,
            &self.band,
            self.policy.protected_flags(),
        )
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn stall_reason(&self) -> Option<StallReason> {
        self.stall_reason
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn state(&self) -> &AssignmentState {
        &self.state
    }

    pub fn loads(&self) -> &LoadLedger {
        &self.loads
    }

    pub fn band(&self) -> LoadBand {
        self.band
    }

    pub fn area(&self) -> &ServiceArea {
        &self.area
    }

    pub fn index(&self) -> &ProximityIndex {
        &self.index
    }

    pub fn policy(&self) -> &ConstraintPolicy {
        &self.policy
    }

    fn stall(&mut self, reason: StallReason) -> RoundOutcome {
        tracing::info!("Stalled after {} rounds: {:?}", self.rounds, reason);
        self.status = EngineStatus::Stalled;
        self.stall_reason = Some(reason);
        RoundOutcome::Stalled(reason)
    }

    /// Most overloaded unprotected location: by voters, then precinct
    /// count, then input order.
    fn select_focus(&self) -> Option<usize> {
        self.loads
            .iter()
            .filter(|(location, load)| {
                !self.policy.is_protected(*location) && self.band.is_overloaded(load.voters)
            })
            .fold(None, |best: Option<(usize, u64, usize)>, (location, load)| match best {
                Some((_, voters, precincts))
                    if (voters, precincts) >= (load.voters, load.precincts) =>
                {
                    best
                }
                _ => Some((location, load.voters, load.precincts)),
            })
            .map(|(location, _, _)| location)
    }

    /// Capacity modes to try this round, in order. Normal when anything is
    /// under-loaded; relaxed as a fallback when the focus is severely
    /// overloaded and some other location sits below the relaxed ceiling,
    /// so unreachable under-loaded locations cannot gridlock it.
    fn capacity_modes(&self, focus: usize) -> Vec<CapacityMode> {
        let mut modes = Vec::with_capacity(2);

        let any_underloaded = self
            .loads
            .iter()
            .any(|(_, load)| self.band.is_underloaded(load.voters));
        if any_underloaded {
            modes.push(CapacityMode::Normal);
        }

        let focus_ratio = self.band.ratio(self.loads.voters(focus));
        if focus_ratio > self.config.severe_overload_multiplier {
            let ceiling = self.policy.ceiling(&self.band, CapacityMode::Relaxed);
            let any_relaxed = self
                .loads
                .iter()
                .any(|(location, load)| location != focus && (load.voters as f64) < ceiling);
            if any_relaxed {
                tracing::debug!(
                    "Focus at {:.2}x target; relaxed ceiling {:.0} available",
                    focus_ratio,
                    ceiling
                );
                modes.push(CapacityMode::Relaxed);
            }
        }

        modes
    }

    fn find_move(
        &self,
        round: u32,
        focus: usize,
        mode: CapacityMode,
        rejections: &mut Vec<CandidateRejection>,
    ) -> Option<Move> {
        let precincts = self.area.precincts();
        let mut members: Vec<usize> = self.state.precincts_at(focus).collect();
        // Stable: equal voter counts keep input order
        members.sort_by(|&a, &b| precincts[b].voters.cmp(&precincts[a].voters));

        let ctx = MoveContext {
            area: &self.area,
            index: &self.index,
            loads: &self.loads,
            band: self.band,
            mode,
        };

        for precinct in members {
            let voters = precincts[precinct].voters;
            let from_rank = self.index.rank_of(precinct, focus);
            for (to_rank, candidate) in self
                .index
                .ranking(precinct)
                .iter()
                .enumerate()
                .skip(from_rank + 1)
            {
                match self.policy.allowed(precinct, focus, candidate.location, &ctx) {
                    Ok(()) => {
                        return Some(Move {
                            round,
                            precinct,
                            from: focus,
                            to: candidate.location,
                            from_rank,
                            to_rank,
                            voters,
                            distance_km: candidate.distance_km,
                            mode,
                        });
                    }
                    Err(rejection) => {
                        tracing::trace!(
                            "Precinct {} -> {} rejected: {}",
                            precincts[precinct].id,
                            self.area.location(candidate.location).id,
                            rejection
                        );
                        if self.config.record_diagnostics {
                            rejections.push(CandidateRejection {
                                precinct,
                                candidate: candidate.location,
                                rejection,
                            });
                        }
                        if rejection.is_terminal() {
                            break;
                        }
                    }
                }
            }
        }

        None
    }

    fn commit(&mut self, mv: &Move) {
        self.state.reassign(mv.precinct, mv.to);
        self.loads.apply_move(mv.voters, mv.from, mv.to);

        tracing::debug!(
            "Round {}: moved precinct {} ({} voters) {} -> {} (rank {} -> {}, {:.2} km, {:?})",
            mv.round,
            self.area.precinct(mv.precinct).id,
            mv.voters,
            self.area.location(mv.from).id,
            self.area.location(mv.to).id,
            mv.from_rank,
            mv.to_rank,
            mv.distance_km,
            mv.mode
        );

        self.moves.push(mv.clone());
    }

    fn peak_unprotected(&self) -> u64 {
        self.loads.peak_voters(|location| !self.policy.is_protected(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationRecord, PrecinctRecord};

    fn config() -> RebalanceConfig {
        RebalanceConfig {
            rural_precinct_threshold: None,
            max_closest_locations_to_check: 4,
            ..Default::default()
        }
    }

    // "Central" holds ten 300-voter precincts; three neighbours ~5 km out
    // hold one 300-voter precinct each. Target 975, band [731.25, 1218.75].
    fn crowded_center() -> (Vec<PrecinctRecord>, Vec<LocationRecord>) {
        let locations = vec![
            LocationRecord::new("Central", 39.70, -104.90),
            LocationRecord::new("North", 39.75, -104.90),
            LocationRecord::new("East", 39.70, -104.84),
            LocationRecord::new("South", 39.65, -104.90),
        ];
        let mut precincts: Vec<PrecinctRecord> = (0..10)
            .map(|i| {
                let lat = 39.70 + (i as f64 - 4.5) * 0.0008;
                let lon = -104.90 + ((i % 3) as f64 - 1.0) * 0.0008;
                PrecinctRecord::new(format!("C{}", i), lat, lon, 300)
            })
            .collect();
        precincts.push(PrecinctRecord::new("N0", 39.751, -104.90, 300));
        precincts.push(PrecinctRecord::new("E0", 39.70, -104.839, 300));
        precincts.push(PrecinctRecord::new("S0", 39.649, -104.90, 300));
        (precincts, locations)
    }

    fn engine(config: RebalanceConfig) -> Rebalancer {
        let (precincts, locations) = crowded_center();
        Rebalancer::from_records(precincts, locations, config).unwrap()
    }

    #[test]
    fn test_initial_assignment_is_nearest() {
        let engine = engine(config());

        assert_eq!(engine.status(), EngineStatus::Running);
        assert_eq!(engine.loads().voters(0), 3000);
        assert_eq!(engine.loads().voters(1), 300);
        assert_eq!(engine.state().reassigned_count(), 0);
        assert_eq!(engine.band().target, 975.0);
    }

    #[test]
    fn test_first_round_moves_largest_precinct_outward() {
        let mut engine = engine(config());

        let RoundOutcome::Moved(mv) = engine.step() else {
            panic!("expected a move in round 1");
        };
        assert_eq!(mv.round, 1);
        assert_eq!(mv.from, 0);
        assert_eq!(mv.precinct, 0);
        assert_eq!(mv.from_rank, 0);
        assert!(mv.to_rank > mv.from_rank);
        assert_eq!(mv.mode, CapacityMode::Normal);
        assert_eq!(engine.loads().voters(0), 2700);
        assert_eq!(engine.loads().voters(mv.to), 600);
    }

    #[test]
    fn test_incremental_loads_match_recompute_every_round() {
        let mut engine = engine(config());

        while engine.status() == EngineStatus::Running {
            engine.step();
            let recomputed = LoadLedger::from_assignment(
                engine.state().as_slice(),
                engine.area().precincts(),
                engine.area().locations().len(),
            );
            assert_eq!(engine.loads(), &recomputed);
        }
    }

    #[test]
    fn test_step_after_converged_is_idempotent() {
        let mut engine = engine(config());
        while engine.status() == EngineStatus::Running {
            engine.step();
        }
        assert_eq!(engine.status(), EngineStatus::Converged);

        let rounds = engine.rounds();
        let moves = engine.moves().len();
        let assignment = engine.state().clone();

        assert_eq!(engine.step(), RoundOutcome::Converged);
        assert_eq!(engine.status(), EngineStatus::Converged);
        assert_eq!(engine.rounds(), rounds);
        assert_eq!(engine.moves().len(), moves);
        assert_eq!(engine.state(), &assignment);
    }

    #[test]
    fn test_round_limit_stalls() {
        let engine = engine(RebalanceConfig { max_rounds: 2, ..config() });
        let outcome = engine.run();

        assert_eq!(outcome.status, EngineStatus::Stalled);
        assert_eq!(outcome.stall_reason, Some(StallReason::RoundLimit));
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.moves.len(), 2);
    }

    #[test]
    fn test_distance_cap_leaves_no_legal_move() {
        let mut engine = engine(RebalanceConfig {
            max_distance_km: 1.0,
            record_diagnostics: true,
            ..config()
        });

        let RoundOutcome::Idle(idle) = engine.step() else {
            panic!("expected an idle round");
        };
        assert_eq!(idle.focus, 0);
        assert_eq!(idle.reason, IdleReason::AllCandidatesRejected);
        // One terminal rejection per precinct of the focus, in normal and
        // then relaxed mode since Central sits above 2x the target
        assert_eq!(idle.rejections.len(), 20);
        assert!(idle
            .rejections
            .iter()
            .all(|r| matches!(r.rejection, Rejection::DistanceCap { .. })));

        assert_eq!(engine.status(), EngineStatus::Stalled);
        assert_eq!(engine.step(), RoundOutcome::Stalled(StallReason::NoLegalMove));
    }

    #[test]
    fn test_progress_window_stalls_idle_runs() {
        let engine = engine(RebalanceConfig {
            max_distance_km: 1.0,
            stall_after_idle_rounds: 3,
            progress_window: Some(1),
            min_improvement: 0.9,
            ..config()
        });
        let outcome = engine.run();

        assert_eq!(outcome.stall_reason, Some(StallReason::NoProgress));
        assert_eq!(outcome.rounds, 1);
        assert!(outcome.moves.is_empty());
    }

    #[test]
    fn test_progress_window_ignores_rounds_that_move() {
        // Every round moves, but the peak only drops every few rounds
        let engine = engine(RebalanceConfig {
            progress_window: Some(1),
            min_improvement: 0.9,
            ..config()
        });
        let outcome = engine.run();

        assert_eq!(outcome.status, EngineStatus::Converged);
        assert_eq!(outcome.moves.len(), 6);
    }

    #[test]
    fn test_empty_precinct_is_never_moved() {
        let (mut precincts, locations) = crowded_center();
        precincts.push(PrecinctRecord::new("Z", 39.70, -104.90, 0));
        let mut engine = Rebalancer::from_records(
            precincts,
            locations,
            RebalanceConfig {
                max_distance_km: 1.0,
                record_diagnostics: true,
                ..config()
            },
        )
        .unwrap();

        let RoundOutcome::Idle(idle) = engine.step() else {
            panic!("expected an idle round");
        };
        let empty: Vec<&CandidateRejection> = idle
            .rejections
            .iter()
            .filter(|r| r.precinct == 13)
            .collect();
        assert!(!empty.is_empty());
        assert!(empty.iter().all(|r| r.rejection == Rejection::NoVoters));
        assert_eq!(engine.state().assigned(13), 0);
    }

    #[test]
    fn test_invalid_config_rejected_before_input() {
        let (precincts, locations) = crowded_center();
        let err = Rebalancer::from_records(
            precincts,
            locations,
            RebalanceConfig { target_tolerance: 1.5, ..config() },
        )
        .unwrap_err();

        assert!(matches!(err, RebalanceError::ConfigurationInconsistency(_)));
    }
}
