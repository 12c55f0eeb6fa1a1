//! Error taxonomy for the navigation session.
//!
//! Capability errors are converted at the boundary; the reducer only ever
//! sees the classified values defined here and in [`crate::route`].

use crate::route::RouteFailure;
use std::path::PathBuf;
use thiserror::Error;
use trip_runtime::StoreError;

/// Rejected waypoint input
///
/// Validation is all-or-nothing: when any waypoint of a batch is rejected
/// the target set is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is absent or blank
    #[error("waypoint {index}: missing {field}")]
    MissingField {
        /// Position of the offending waypoint in its batch
        index: usize,
        /// Name of the missing field
        field: &'static str,
    },

    /// Coordinate outside the valid range (or not finite)
    #[error("waypoint {index}: invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        /// Position of the offending waypoint in its batch
        index: usize,
        /// Supplied latitude
        latitude: f64,
        /// Supplied longitude
        longitude: f64,
    },

    /// A route needs at least two waypoints
    #[error("at least two waypoints are required, got {count}")]
    TooFewWaypoints {
        /// Number of waypoints supplied
        count: usize,
    },

    /// Insertion point past the end of the set
    #[error("cannot insert after position {index} in a set of {len} waypoints")]
    InvalidPosition {
        /// Requested position
        index: usize,
        /// Current set length
        len: usize,
    },
}

/// Persisting or loading history summaries failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// File system operation failed
    #[error("I/O error at {path}: {message}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Summary file exists but cannot be parsed
    #[error("corrupt summary file {path}: {message}")]
    Corrupt {
        /// Path of the summary file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Records could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// History recording failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    /// The recorder refused to start
    #[error("failed to start recording: {0}")]
    Start(String),

    /// The recorder failed while stopping
    #[error("failed to stop recording: {0}")]
    Stop(String),

    /// The summary record could not be stored
    #[error("failed to save history record: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Why an `add_waypoints` call did not take effect
///
/// Delivered to the caller only; guidance continues untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AddWaypointsError {
    /// Waypoints can only be added during guidance
    #[error("waypoints can only be added while guiding")]
    NotGuiding,

    /// Another route request is already in flight
    #[error("a route request is already in flight")]
    Busy,

    /// The new waypoints were rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The updated route could not be calculated
    #[error("route update failed: {0}")]
    Route(RouteFailure),

    /// A reroute, a cancel, a new submission or leaving the current leg replaced the request
    #[error("superseded by a newer request")]
    Superseded,
}

/// Errors returned by [`crate::TripOrchestrator`] calls
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Invalid waypoint input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Adding waypoints failed
    #[error(transparent)]
    AddWaypoints(#[from] AddWaypointsError),

    /// Command not valid in the current state
    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        /// Rejected operation
        operation: &'static str,
        /// State at the time of the call
        state: String,
    },

    /// Route index out of range
    #[error("route index {index} out of range ({available} available)")]
    InvalidRouteIndex {
        /// Requested index
        index: usize,
        /// Number of candidate routes
        available: usize,
    },

    /// History persistence failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Runtime error (shutdown, timeout)
    #[error(transparent)]
    Store(#[from] StoreError),
}
