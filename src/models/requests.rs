use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{LocationRecord, PrecinctRecord, RebalanceConfig, RegionCenter};

/// Request to rebalance one service area
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RebalanceRequest {
    #[validate(length(min = 1))]
    pub precincts: Vec<PrecinctRecord>,
    #[validate(length(min = 1))]
    pub locations: Vec<LocationRecord>,
    #[validate(nested)]
    #[serde(default)]
    pub config: Option<ConfigOverrides>,
}

/// Partial override of the service's configured defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub target_tolerance: Option<f64>,
    #[validate(range(min = 1))]
    pub max_rounds: Option<u32>,
    #[validate(range(min = 1))]
    pub max_closest_locations_to_check: Option<usize>,
    #[validate(range(exclusive_min = 0.0))]
    pub max_distance_km: Option<f64>,
    pub severe_overload_multiplier: Option<f64>,
    pub relaxed_ceiling_multiplier: Option<f64>,
    pub region_guard_enabled: Option<bool>,
    pub region_center: Option<RegionCenter>,
    pub rural_precinct_threshold: Option<usize>,
    pub stall_after_idle_rounds: Option<u32>,
    pub progress_window: Option<u32>,
    pub min_improvement: Option<f64>,
    pub record_diagnostics: Option<bool>,
}

impl ConfigOverrides {
    /// Lay the set fields over `base`
    pub fn apply(&self, base: RebalanceConfig) -> RebalanceConfig {
        RebalanceConfig {
            target_tolerance: self.target_tolerance.unwrap_or(base.target_tolerance),
            max_rounds: self.max_rounds.unwrap_or(base.max_rounds),
            max_closest_locations_to_check: self
                .max_closest_locations_to_check
                .unwrap_or(base.max_closest_locations_to_check),
            max_distance_km: self.max_distance_km.unwrap_or(base.max_distance_km),
            severe_overload_multiplier: self
                .severe_overload_multiplier
                .unwrap_or(base.severe_overload_multiplier),
            relaxed_ceiling_multiplier: self
                .relaxed_ceiling_multiplier
                .unwrap_or(base.relaxed_ceiling_multiplier),
            region_guard_enabled: self.region_guard_enabled.unwrap_or(base.region_guard_enabled),
            region_center: self.region_center.or(base.region_center),
            rural_precinct_threshold: self.rural_precinct_threshold.or(base.rural_precinct_threshold),
            stall_after_idle_rounds: self.stall_after_idle_rounds.unwrap_or(base.stall_after_idle_rounds),
            progress_window: self.progress_window.or(base.progress_window),
            min_improvement: self.min_improvement.unwrap_or(base.min_improvement),
            record_diagnostics: self.record_diagnostics.unwrap_or(base.record_diagnostics),
        }
    }
}
