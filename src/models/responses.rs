use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{
    CapacityMode, EngineStatus, LocationSummary, PrecinctAssignment, RebalanceOutcome, StallReason,
};

/// Response for the rebalance endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceResponse {
    pub run_id: Uuid,
    pub status: EngineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stall_reason: Option<StallReason>,
    pub rounds: u32,
    pub moves: usize,
    pub target_voters: f64,
    pub tolerance_voters: f64,
    pub precincts: Vec<PrecinctAssignment>,
    pub locations: Vec<LocationSummary>,
    pub move_log: Vec<MoveEntry>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// One committed move with ids instead of table positions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEntry {
    pub round: u32,
    pub precinct_id: String,
    pub from_location: String,
    pub to_location: String,
    pub from_rank: usize,
    pub to_rank: usize,
    pub voters: u64,
    pub distance_km: f64,
    pub mode: CapacityMode,
}

impl RebalanceResponse {
    pub fn from_outcome(run_id: Uuid, outcome: RebalanceOutcome) -> Self {
        let report = outcome.report;
        // Report rows are in input order, so move indices address them directly
        let move_log = outcome
            .moves
            .iter()
            .map(|mv| MoveEntry {
                round: mv.round,
                precinct_id: report.precincts[mv.precinct].precinct_id.clone(),
                from_location: report.locations[mv.from].location_id.clone(),
                to_location: report.locations[mv.to].location_id.clone(),
                from_rank: mv.from_rank,
                to_rank: mv.to_rank,
                voters: mv.voters,
                distance_km: mv.distance_km,
                mode: mv.mode,
            })
            .collect();

        Self {
            run_id,
            status: outcome.status,
            stall_reason: outcome.stall_reason,
            rounds: outcome.rounds,
            moves: outcome.moves.len(),
            target_voters: report.target_voters,
            tolerance_voters: report.tolerance_voters,
            precincts: report.precincts,
            locations: report.locations,
            move_log,
            completed_at: chrono::Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
