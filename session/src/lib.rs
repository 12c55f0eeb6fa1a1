//! Navigation session orchestrator.
//!
//! Turns a list of waypoints into an active guidance session, tracks the
//! session end to end, and fans every state change out as one ordered stream
//! of [`DomainEvent`]s.
//!
//! # Architecture
//!
//! ```text
//!  caller ──submit/start/cancel──▶ TripOrchestrator ──▶ Store<TripState>
//!                                                         │ TripReducer
//!           ┌─────────────────────────────────────────────┼───────────────┐
//!           ▼                      ▼                       ▼               ▼
//!  RouteRequestCoordinator   LocationProducer      RecordingLifecycle   EventBridge
//!   (async route result)    (progress stream)      + HistorySummaryStore  (events out)
//! ```
//!
//! Every capability callback (route result, location signal, recording stop)
//! is fed back into the reducer as an action, so session state is only ever
//! mutated on the store's serialized execution context.
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = TripOrchestrator::builder(TripConfig::from_env()).build();
//! let mut events = orchestrator.subscribe();
//!
//! orchestrator.submit(waypoints, RouteOptions::default()).await?;
//! orchestrator.start(GuidanceMode::Simulated).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.to_json());
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod history;
pub mod orchestrator;
pub mod route;
pub mod session;
pub mod waypoint;

pub use config::TripConfig;
pub use coordinator::RouteRequestCoordinator;
pub use error::{AddWaypointsError, NavigationError, PersistenceError, RecordingError, ValidationError};
pub use events::DomainEvent;
pub use history::{HistoryRecord, HistorySummaryStore, RecordingLifecycle};
pub use orchestrator::{TripOrchestrator, TripOrchestratorBuilder};
pub use route::{
    Route, RouteFailure, RouteFailureReason, RouteLeg, RouteOptions, RouteProfile, RouteRequest,
    RouteResult, RouteSet, Units,
};
pub use session::{GuidanceMode, SessionState, TripAction, TripEnvironment, TripReducer, TripState};
pub use waypoint::{Coordinate, Waypoint, WaypointInput, WaypointSet};
