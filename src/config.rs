use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::{RebalanceConfig, RegionCenter};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub rebalance: RebalanceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

/// Defaults for every run; requests may override individual fields
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceSettings {
    #[serde(default = "default_target_tolerance")]
    pub target_tolerance: f64,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_max_closest_locations")]
    pub max_closest_locations_to_check: usize,
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,
    #[serde(default = "default_severe_overload_multiplier")]
    pub severe_overload_multiplier: f64,
    #[serde(default = "default_relaxed_ceiling_multiplier")]
    pub relaxed_ceiling_multiplier: f64,
    #[serde(default)]
    pub region_guard_enabled: bool,
    pub region_center: Option<RegionCenter>,
    #[serde(default = "default_rural_precinct_threshold")]
    pub rural_precinct_threshold: Option<usize>,
    #[serde(default = "default_stall_after_idle_rounds")]
    pub stall_after_idle_rounds: u32,
    #[serde(default = "default_progress_window")]
    pub progress_window: Option<u32>,
    #[serde(default = "default_min_improvement")]
    pub min_improvement: f64,
    #[serde(default)]
    pub record_diagnostics: bool,
}

impl Default for RebalanceSettings {
    fn default() -> Self {
        Self {
            target_tolerance: default_target_tolerance(),
            max_rounds: default_max_rounds(),
            max_closest_locations_to_check: default_max_closest_locations(),
            max_distance_km: default_max_distance_km(),
            severe_overload_multiplier: default_severe_overload_multiplier(),
            relaxed_ceiling_multiplier: default_relaxed_ceiling_multiplier(),
            region_guard_enabled: false,
            region_center: None,
            rural_precinct_threshold: default_rural_precinct_threshold(),
            stall_after_idle_rounds: default_stall_after_idle_rounds(),
            progress_window: default_progress_window(),
            min_improvement: default_min_improvement(),
            record_diagnostics: false,
        }
    }
}

fn default_target_tolerance() -> f64 { 0.25 }
fn default_max_rounds() -> u32 { 300 }
fn default_max_closest_locations() -> usize { 5 }
fn default_max_distance_km() -> f64 { 30.0 }
fn default_severe_overload_multiplier() -> f64 { 2.0 }
fn default_relaxed_ceiling_multiplier() -> f64 { 1.5 }
fn default_rural_precinct_threshold() -> Option<usize> { Some(3) }
fn default_stall_after_idle_rounds() -> u32 { 1 }
fn default_progress_window() -> Option<u32> { Some(25) }
fn default_min_improvement() -> f64 { 0.005 }

impl From<RebalanceSettings> for RebalanceConfig {
    fn from(settings: RebalanceSettings) -> Self {
        Self {
            target_tolerance: settings.target_tolerance,
            max_rounds: settings.max_rounds,
            max_closest_locations_to_check: settings.max_closest_locations_to_check,
            max_distance_km: settings.max_distance_km,
            severe_overload_multiplier: settings.severe_overload_multiplier,
            relaxed_ceiling_multiplier: settings.relaxed_ceiling_multiplier,
            region_guard_enabled: settings.region_guard_enabled,
            region_center: settings.region_center,
            rural_precinct_threshold: settings.rural_precinct_threshold,
            stall_after_idle_rounds: settings.stall_after_idle_rounds,
            progress_window: settings.progress_window,
            min_improvement: settings.min_improvement,
            record_diagnostics: settings.record_diagnostics,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with VSPC__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., VSPC__REBALANCE__MAX_ROUNDS -> rebalance.max_rounds
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Engine configuration with the configured defaults
    pub fn rebalance_config(&self) -> RebalanceConfig {
        self.rebalance.clone().into()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("VSPC")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
