//! State and actions of the trip session state machine.

use crate::capabilities::location::LocationSignal;
use crate::error::AddWaypointsError;
use crate::history::{HistoryRecord, RecordingLifecycle};
use crate::route::{RouteOptions, RouteResult, RouteSet};
use crate::waypoint::{Coordinate, WaypointInput, WaypointSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// State
// ============================================================================

/// How guidance is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuidanceMode {
    /// Real device location
    Live,
    /// Simulated movement along the route
    Simulated,
}

/// Lifecycle phase of the session
///
/// `Cancelled` and `Failed` are pass-through phases: the machine moves on to
/// `Idle` within the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Waiting for the initial route
    Building,
    /// Route available, guidance not started
    Ready,
    /// Guidance running
    Guiding {
        /// Live or simulated
        mode: GuidanceMode,
    },
    /// Waiting for a recalculated route after leaving it
    Rerouting,
    /// Destination reached, recording being finalized
    Arrived,
    /// Session cancelled
    Cancelled,
    /// Route calculation failed
    Failed,
}

impl SessionState {
    /// Whether a session exists
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Cancelled | Self::Failed)
    }

    /// Whether guidance is running (including while rerouting)
    #[must_use]
    pub const fn is_guiding(self) -> bool {
        matches!(self, Self::Guiding { .. } | Self::Rerouting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Building => f.write_str("Building"),
            Self::Ready => f.write_str("Ready"),
            Self::Guiding { mode } => write!(f, "Guiding({mode:?})"),
            Self::Rerouting => f.write_str("Rerouting"),
            Self::Arrived => f.write_str("Arrived"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// Why a route request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteIntent {
    /// Initial route of a submission
    Build,
    /// Recalculation after leaving the route
    Reroute,
    /// Route through newly added waypoints
    AddWaypoints {
        /// Caller correlation id
        correlation: Uuid,
    },
}

/// The route request the session is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    /// Generation the result must carry
    pub generation: u64,
    /// Why it was issued
    pub intent: RouteIntent,
}

/// Last progress reported within a leg
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegProgress {
    /// Leg of the reading
    pub leg_index: usize,
    /// Smallest distance remaining seen in that leg
    pub distance_remaining: f64,
}

/// Trip session state
///
/// `waypoints` is the whole trip. The active route may start at a mid-trip
/// position (after a reroute or waypoint insertion); `leg_base` is the number
/// of trip legs completed before the active route started, so the trip leg
/// being travelled is `leg_base + leg_index`.
#[derive(Debug, Clone, Default)]
pub struct TripState {
    /// Current phase
    pub phase: SessionState,
    /// Trip waypoints
    pub waypoints: WaypointSet,
    /// Submission options
    pub options: RouteOptions,
    /// Active route candidates
    pub routes: Option<RouteSet>,
    /// Leg of the active route being travelled
    pub leg_index: usize,
    /// Trip legs completed before the active route
    pub leg_base: usize,
    /// Clamp reference for progress updates
    pub last_progress: Option<LegProgress>,
    /// Last known position
    pub last_coordinate: Option<Coordinate>,
    /// Bumped for every route request and every cancel
    pub request_generation: u64,
    /// Route request being waited for
    pub pending: Option<PendingRequest>,
    /// Trip generation, bumped on every submission
    pub trip: u64,
    /// Id of the attached location feed
    pub feed: Option<u64>,
    /// Last issued feed id
    pub feed_generation: u64,
    /// Mode of the running guidance
    pub active_mode: Option<GuidanceMode>,
    /// History recording guard
    pub recording: RecordingLifecycle,
    /// Waypoint set waiting for its route (mid-guidance insertion)
    pub pending_insert: Option<WaypointSet>,
}

impl TripState {
    /// Trip leg currently travelled
    #[must_use]
    pub const fn trip_leg(&self) -> usize {
        self.leg_base + self.leg_index
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Inputs of the trip session state machine
///
/// Commands come from the orchestrator; the remaining variants are capability
/// callbacks fed back by effects.
#[derive(Debug, Clone)]
pub enum TripAction {
    // Commands
    /// Build a route for a validated waypoint set
    Submit {
        /// Trip waypoints
        waypoints: WaypointSet,
        /// Route options
        options: RouteOptions,
    },
    /// Start guidance on the ready route
    Start {
        /// Live or simulated
        mode: GuidanceMode,
    },
    /// Cancel the active session
    Cancel,
    /// Insert waypoints after the current position
    AddWaypoints {
        /// Correlation id of the caller
        correlation: Uuid,
        /// New stops
        waypoints: Vec<WaypointInput>,
    },
    /// Promote an alternative route
    SelectRoute {
        /// Candidate index
        index: usize,
    },

    // Callbacks
    /// A route request finished
    RouteCalculated {
        /// Generation of the request
        generation: u64,
        /// Why it was issued
        intent: RouteIntent,
        /// Outcome
        result: RouteResult,
    },
    /// Location signal from a feed (`Some(id)`) or an adapter (`None`)
    Location {
        /// Feed that produced the signal
        feed: Option<u64>,
        /// The signal
        signal: LocationSignal,
    },
    /// Recording stop settled
    RecordingFinished {
        /// Trip the recording belonged to
        trip: u64,
        /// Saved record or failure message
        outcome: Result<HistoryRecord, String>,
    },
    /// Terminal answer to `AddWaypoints`
    AddWaypointsSettled {
        /// Correlation id of the caller
        correlation: Uuid,
        /// Result for the caller
        outcome: Result<(), AddWaypointsError>,
    },
}

impl TripAction {
    /// Whether this settles the `AddWaypoints` request `correlation`
    #[must_use]
    pub fn settles(&self, correlation: Uuid) -> bool {
        matches!(self, Self::AddWaypointsSettled { correlation: c, .. } if *c == correlation)
    }
}
