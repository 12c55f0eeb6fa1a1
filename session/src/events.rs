//! Domain events published through the session's event bridge.
//!
//! Events are emitted in the order of the transitions that caused them. Each
//! event has a stable `snake_case` type name and a JSON rendering
//! `{"event_type": ..., "data": ...}` for marshalling to a host application.

use crate::route::RouteFailure;
use serde::Serialize;
use uuid::Uuid;

/// Event describing a session state change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Route calculation started
    RouteBuilding,
    /// Route calculated; payload is the JSON of the candidate routes
    RouteBuilt(String),
    /// Route calculation failed
    RouteBuildFailed(RouteFailure),
    /// Route calculation was cancelled
    RouteBuildCancelled,
    /// Guidance started
    NavigationRunning,
    /// Progress along the active route
    #[serde(rename_all = "camelCase")]
    ProgressUpdate {
        /// Meters left on the route
        distance_remaining: f64,
        /// Seconds left on the route
        duration_remaining: f64,
        /// Leg currently travelled
        leg_index: usize,
    },
    /// The user left the route
    UserOffRoute,
    /// Guidance switched to a recalculated route; payload is its JSON
    RerouteAlong(String),
    /// An intermediate stop was reached
    #[serde(rename_all = "camelCase")]
    WaypointArrival {
        /// Leg that was completed
        leg_index: usize,
    },
    /// The destination was reached
    #[serde(rename_all = "camelCase")]
    OnArrival {
        /// Always `true` for the destination
        is_final: bool,
    },
    /// The session was cancelled
    NavigationCancelled,
    /// The session completed
    NavigationFinished,
    /// History recording started
    HistoryRecordingStarted {
        /// Recording session id (also the history record id)
        id: Uuid,
    },
    /// History recording stopped and its record was saved
    #[serde(rename_all = "camelCase")]
    HistoryRecordingStopped {
        /// Path of the recorded file
        file_path: String,
    },
    /// History recording failed; navigation is unaffected
    HistoryRecordingError {
        /// Failure description
        message: String,
    },
}

impl DomainEvent {
    /// Stable `snake_case` name of the event
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RouteBuilding => "route_building",
            Self::RouteBuilt(_) => "route_built",
            Self::RouteBuildFailed(_) => "route_build_failed",
            Self::RouteBuildCancelled => "route_build_cancelled",
            Self::NavigationRunning => "navigation_running",
            Self::ProgressUpdate { .. } => "progress_update",
            Self::UserOffRoute => "user_off_route",
            Self::RerouteAlong(_) => "reroute_along",
            Self::WaypointArrival { .. } => "waypoint_arrival",
            Self::OnArrival { .. } => "on_arrival",
            Self::NavigationCancelled => "navigation_cancelled",
            Self::NavigationFinished => "navigation_finished",
            Self::HistoryRecordingStarted { .. } => "history_recording_started",
            Self::HistoryRecordingStopped { .. } => "history_recording_stopped",
            Self::HistoryRecordingError { .. } => "history_recording_error",
        }
    }

    /// JSON rendering for host marshalling
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|error| {
            serde_json::json!({
                "event_type": self.event_type(),
                "data": { "error": error.to_string() },
            })
        })
    }

    /// Whether the event ends a session
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::NavigationFinished | Self::NavigationCancelled)
    }
}
