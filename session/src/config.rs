//! Configuration for the trip orchestrator.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Every value can also be set with a `with_*` builder method.

use crate::route::{RouteOptions, RouteProfile, Units};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripConfig {
    /// History recording
    pub history: HistoryConfig,
    /// Route calculation
    pub routing: RoutingConfig,
    /// Simulated guidance
    pub simulation: SimulationConfig,
    /// Options used when a caller does not supply its own
    pub defaults: RouteOptions,
}

/// History recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Record guidance sessions
    pub enabled: bool,
    /// Directory holding recordings and `history_summaries.json`
    pub directory: PathBuf,
    /// Start recording on the first progress update instead of at session start
    pub start_on_first_progress: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("trip-history"),
            start_on_first_progress: false,
        }
    }
}

/// Route calculation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Timeout of a single route request
    pub timeout: Duration,
    /// How long `add_waypoints` waits for the updated route
    pub add_waypoints_timeout: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            add_waypoints_timeout: Duration::from_secs(45),
        }
    }
}

/// Simulated guidance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Interval between simulated progress updates
    pub tick: Duration,
    /// Fixed simulated speed; the route's average speed when unset
    pub speed_mps: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            speed_mps: None,
        }
    }
}

/// Parse an environment variable, `None` when unset or malformed
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a boolean flag (`true`/`false`/`1`/`0`/`yes`/`no`)
fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

impl TripConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `TRIP_HISTORY_ENABLED` | `false` |
    /// | `TRIP_HISTORY_DIR` | `trip-history` |
    /// | `TRIP_HISTORY_ON_FIRST_PROGRESS` | `false` |
    /// | `TRIP_ROUTE_TIMEOUT_SECS` | `30` |
    /// | `TRIP_ADD_WAYPOINTS_TIMEOUT_SECS` | `45` |
    /// | `TRIP_SIMULATION_TICK_MS` | `1000` |
    /// | `TRIP_SIMULATION_SPEED_MPS` | route average |
    /// | `TRIP_PROFILE` | `driving` |
    /// | `TRIP_LANGUAGE` | `en` |
    /// | `TRIP_UNITS` | `metric` |
    ///
    /// Malformed values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            history: HistoryConfig {
                enabled: env_flag("TRIP_HISTORY_ENABLED").unwrap_or(defaults.history.enabled),
                directory: env::var("TRIP_HISTORY_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.history.directory),
                start_on_first_progress: env_flag("TRIP_HISTORY_ON_FIRST_PROGRESS")
                    .unwrap_or(defaults.history.start_on_first_progress),
            },
            routing: RoutingConfig {
                timeout: env_parse("TRIP_ROUTE_TIMEOUT_SECS")
                    .map_or(defaults.routing.timeout, Duration::from_secs),
                add_waypoints_timeout: env_parse("TRIP_ADD_WAYPOINTS_TIMEOUT_SECS")
                    .map_or(defaults.routing.add_waypoints_timeout, Duration::from_secs),
            },
            simulation: SimulationConfig {
                tick: env_parse("TRIP_SIMULATION_TICK_MS")
                    .map_or(defaults.simulation.tick, Duration::from_millis),
                speed_mps: env_parse::<f64>("TRIP_SIMULATION_SPEED_MPS")
                    .filter(|speed| speed.is_finite() && *speed > 0.0),
            },
            defaults: RouteOptions {
                profile: env_parse::<RouteProfile>("TRIP_PROFILE").unwrap_or(defaults.defaults.profile),
                language: env::var("TRIP_LANGUAGE").unwrap_or(defaults.defaults.language),
                units: env_parse::<Units>("TRIP_UNITS").unwrap_or(defaults.defaults.units),
                ..defaults.defaults
            },
        }
    }

    /// Enable or disable history recording
    #[must_use]
    pub const fn with_history_enabled(mut self, enabled: bool) -> Self {
        self.history.enabled = enabled;
        self
    }

    /// Set the history directory
    #[must_use]
    pub fn with_history_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.history.directory = directory.into();
        self
    }

    /// Defer recording until the first progress update
    #[must_use]
    pub const fn with_recording_on_first_progress(mut self, deferred: bool) -> Self {
        self.history.start_on_first_progress = deferred;
        self
    }

    /// Set the route request timeout
    #[must_use]
    pub const fn with_route_timeout(mut self, timeout: Duration) -> Self {
        self.routing.timeout = timeout;
        self
    }

    /// Set how long `add_waypoints` waits for the updated route
    #[must_use]
    pub const fn with_add_waypoints_timeout(mut self, timeout: Duration) -> Self {
        self.routing.add_waypoints_timeout = timeout;
        self
    }

    /// Set the simulation tick
    #[must_use]
    pub const fn with_simulation_tick(mut self, tick: Duration) -> Self {
        self.simulation.tick = tick;
        self
    }

    /// Fix the simulated speed
    #[must_use]
    pub const fn with_simulation_speed(mut self, speed_mps: f64) -> Self {
        self.simulation.speed_mps = Some(speed_mps);
        self
    }

    /// Set the default route options
    #[must_use]
    pub fn with_defaults(mut self, defaults: RouteOptions) -> Self {
        self.defaults = defaults;
        self
    }
}
