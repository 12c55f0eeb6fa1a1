//! Route requests, calculated routes and classified route outcomes.

use crate::error::ValidationError;
use crate::waypoint::{Coordinate, WaypointSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Travel profile used for route calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteProfile {
    /// Car, ignoring live traffic
    #[default]
    Driving,
    /// Car, accounting for live traffic
    DrivingTraffic,
    /// On foot
    Walking,
    /// Bicycle
    Cycling,
}

impl RouteProfile {
    /// Typical travel speed in meters per second
    #[must_use]
    pub const fn average_speed_mps(self) -> f64 {
        match self {
            Self::Driving => 13.9,
            Self::DrivingTraffic => 11.1,
            Self::Walking => 1.4,
            Self::Cycling => 4.2,
        }
    }

    /// Stable name used in logs and serialized records
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::DrivingTraffic => "drivingTraffic",
            Self::Walking => "walking",
            Self::Cycling => "cycling",
        }
    }
}

impl fmt::Display for RouteProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurement system for instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Units {
    /// Kilometers and meters
    #[default]
    Metric,
    /// Miles and feet
    Imperial,
}

impl std::str::FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!("unknown units: {other}")),
        }
    }
}

impl std::str::FromStr for RouteProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "driving" => Ok(Self::Driving),
            "drivingTraffic" | "driving-traffic" => Ok(Self::DrivingTraffic),
            "walking" => Ok(Self::Walking),
            "cycling" => Ok(Self::Cycling),
            other => Err(format!("unknown profile: {other}")),
        }
    }
}

/// Options that accompany a route submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteOptions {
    /// Travel profile
    pub profile: RouteProfile,
    /// Allow U-turns at intermediate waypoints
    pub allow_u_turns_at_waypoints: bool,
    /// Ask for alternative routes
    pub alternatives: bool,
    /// BCP-47 language tag for instructions
    pub language: String,
    /// Measurement system for instructions
    pub units: Units,
    /// Keep the caller's waypoint order instead of sorting by `order`
    pub preserve_order: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            profile: RouteProfile::Driving,
            allow_u_turns_at_waypoints: true,
            alternatives: false,
            language: "en".to_string(),
            units: Units::Metric,
            preserve_order: false,
        }
    }
}

impl RouteOptions {
    /// Sets the travel profile
    #[must_use]
    pub const fn with_profile(mut self, profile: RouteProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Requests alternative routes
    #[must_use]
    pub const fn with_alternatives(mut self, alternatives: bool) -> Self {
        self.alternatives = alternatives;
        self
    }

    /// Sets the instruction language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the measurement system
    #[must_use]
    pub const fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    /// Keeps the caller's waypoint order
    #[must_use]
    pub const fn with_preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }

    /// Allows or forbids U-turns at waypoints
    #[must_use]
    pub const fn with_u_turns(mut self, allow: bool) -> Self {
        self.allow_u_turns_at_waypoints = allow;
        self
    }
}

/// Immutable route request handed to the routing service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    waypoints: WaypointSet,
    options: RouteOptions,
}

impl RouteRequest {
    /// Creates a request for a routable waypoint set
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TooFewWaypoints`] below two waypoints.
    pub fn new(waypoints: WaypointSet, options: RouteOptions) -> Result<Self, ValidationError> {
        waypoints.ensure_routable()?;
        Ok(Self { waypoints, options })
    }

    /// Waypoints in route order
    #[must_use]
    pub const fn waypoints(&self) -> &WaypointSet {
        &self.waypoints
    }

    /// Submission options
    #[must_use]
    pub const fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Travel profile
    #[must_use]
    pub const fn profile(&self) -> RouteProfile {
        self.options.profile
    }
}

/// Segment between two leg-delimiting waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    /// Leg start
    pub from: Coordinate,
    /// Leg end
    pub to: Coordinate,
    /// Length in meters
    pub distance_meters: f64,
    /// Expected travel time in seconds
    pub duration_seconds: f64,
}

/// A calculated route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Total length in meters
    pub distance_meters: f64,
    /// Total expected travel time in seconds
    pub duration_seconds: f64,
    /// Legs in travel order
    pub legs: Vec<RouteLeg>,
    /// Polyline of the route
    pub geometry: Vec<Coordinate>,
}

impl Route {
    /// Builds a route from its legs, summing distance and duration
    #[must_use]
    pub fn from_legs(legs: Vec<RouteLeg>, geometry: Vec<Coordinate>) -> Self {
        Self {
            distance_meters: legs.iter().map(|leg| leg.distance_meters).sum(),
            duration_seconds: legs.iter().map(|leg| leg.duration_seconds).sum(),
            legs,
            geometry,
        }
    }

    /// Number of legs
    #[must_use]
    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Whether `leg_index` is the last leg
    #[must_use]
    pub fn is_final_leg(&self, leg_index: usize) -> bool {
        leg_index + 1 >= self.legs.len()
    }
}

/// Candidate routes for one request; index 0 is the primary route
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSet {
    routes: Vec<Route>,
    request: RouteRequest,
}

impl RouteSet {
    /// Wraps candidate routes, `None` when there are none
    #[must_use]
    pub fn new(routes: Vec<Route>, request: RouteRequest) -> Option<Self> {
        if routes.is_empty() {
            return None;
        }
        Some(Self { routes, request })
    }

    /// The route guidance follows
    #[must_use]
    pub fn primary(&self) -> &Route {
        &self.routes[0]
    }

    /// All candidates, primary first
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Always `false`; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The request that produced these routes
    #[must_use]
    pub const fn request(&self) -> &RouteRequest {
        &self.request
    }

    /// Promotes candidate `index` to primary, keeping the others
    ///
    /// Returns `false` when `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.routes.len() {
            return false;
        }
        self.routes.swap(0, index);
        true
    }

    /// JSON rendering handed to the host (`RouteBuilt` payload)
    ///
    /// # Errors
    ///
    /// Returns the serializer error for non-finite numbers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Classified reason of a failed route calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteFailureReason {
    /// No route exists between the waypoints
    NoRoute,
    /// Transport-level failure
    Network,
    /// The service did not answer in time
    Timeout,
    /// Credentials rejected
    Unauthorized,
    /// Anything not otherwise classified
    Unknown,
}

impl RouteFailureReason {
    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoRoute => "no_route",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RouteFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed route calculation with its classified reason
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}: {message}")]
pub struct RouteFailure {
    /// Classified reason
    pub reason: RouteFailureReason,
    /// Message from the routing service
    pub message: String,
}

impl RouteFailure {
    /// Creates a failure
    #[must_use]
    pub fn new(reason: RouteFailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Outcome of a route calculation
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    /// One or more candidate routes
    Success(RouteSet),
    /// The calculation failed
    Failure(RouteFailure),
    /// A newer request or a cancel aborted this one
    Cancelled,
}

impl RouteResult {
    /// Short label for logs and metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}
