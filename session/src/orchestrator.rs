//! Public facade of the navigation session.
//!
//! [`TripOrchestrator`] owns the [`Store`] running the [`TripReducer`] and
//! translates caller commands into actions. Commands return once the
//! reducer has processed them; asynchronous outcomes (route results,
//! arrivals, recording) surface on the event subscription.

use crate::capabilities::fs::{FileSystem, LocalFileSystem};
use crate::capabilities::location::{
    ChannelLocationProducer, LocationProducer, LocationSignal, ProgressSnapshot,
};
use crate::capabilities::recording::{FileHistoryRecorder, HistoryRecorder};
use crate::capabilities::routing::RoutingService;
use crate::capabilities::simulated::SimulatedLocationProducer;
use crate::capabilities::straight_line::StraightLineRouter;
use crate::config::TripConfig;
use crate::coordinator::RouteRequestCoordinator;
use crate::error::NavigationError;
use crate::events::DomainEvent;
use crate::history::HistorySummaryStore;
use crate::route::{RouteOptions, RouteSet};
use crate::session::{FeedSlot, GuidanceMode, SessionState, TripAction, TripEnvironment, TripReducer, TripState};
use crate::waypoint::{Coordinate, WaypointInput, WaypointSet};
use std::sync::Arc;
use std::time::Duration;
use trip_core::environment::{Clock, SystemClock};
use trip_core::{EventBridge, EventSubscription};
use trip_runtime::{Store, StoreError};
use uuid::Uuid;

/// Store running the trip session
pub type TripStore = Store<TripState, TripAction, TripEnvironment, TripReducer>;

/// Navigation session orchestrator
///
/// # Example
///
/// ```ignore
/// let orchestrator = TripOrchestrator::builder(TripConfig::from_env())
///     .with_routing(Arc::new(my_router))
///     .build();
///
/// let mut events = orchestrator.subscribe();
/// orchestrator.submit(waypoints, RouteOptions::default()).await?;
/// ```
pub struct TripOrchestrator {
    store: TripStore,
    config: Arc<TripConfig>,
}

impl TripOrchestrator {
    /// Orchestrator with the default capabilities
    #[must_use]
    pub fn new(config: TripConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start configuring an orchestrator
    #[must_use]
    pub fn builder(config: TripConfig) -> TripOrchestratorBuilder {
        TripOrchestratorBuilder::new(config)
    }

    /// Subscribe to domain events
    ///
    /// There is one subscriber at a time: a new subscription replaces the
    /// previous one, and events emitted while nobody listens are discarded.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription<DomainEvent> {
        self.store.environment().events.subscribe()
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &TripConfig {
        &self.config
    }

    /// Route options configured as defaults
    #[must_use]
    pub fn default_options(&self) -> RouteOptions {
        self.config.defaults.clone()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Build a route through `waypoints`
    ///
    /// Replaces any active session. The route result arrives as
    /// [`DomainEvent::RouteBuilt`] or [`DomainEvent::RouteBuildFailed`].
    ///
    /// # Errors
    ///
    /// - [`NavigationError::Validation`]: fewer than two waypoints, a missing
    ///   field or an out-of-range coordinate; no state changes
    /// - [`NavigationError::Store`]: the orchestrator is shutting down
    pub async fn submit(&self, waypoints: Vec<WaypointInput>, options: RouteOptions) -> Result<(), NavigationError> {
        let waypoints = WaypointSet::from_inputs(waypoints, options.preserve_order)?;
        tracing::info!(
            waypoints = waypoints.len(),
            legs = waypoints.leg_count(),
            profile = %options.profile,
            "Submitting trip"
        );
        self.store.send(TripAction::Submit { waypoints, options }).await?;
        Ok(())
    }

    /// Start guidance on the ready route
    ///
    /// A no-op outside `Ready`, including repeated calls. Returns the state
    /// after the command was processed.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Store`] when the orchestrator is shutting down.
    pub async fn start(&self, mode: GuidanceMode) -> Result<SessionState, NavigationError> {
        self.store.send(TripAction::Start { mode }).await?;
        Ok(self.state().await)
    }

    /// Cancel the active session
    ///
    /// A no-op when idle. An in-flight route request is superseded and its
    /// result discarded.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Store`] when the orchestrator is shutting down.
    pub async fn cancel(&self) -> Result<(), NavigationError> {
        self.store.send(TripAction::Cancel).await?;
        Ok(())
    }

    /// Insert stops after the current position and reroute through them
    ///
    /// Waits until the new route is active or the request failed. Guidance
    /// continues on the previous route on failure.
    ///
    /// # Errors
    ///
    /// - [`NavigationError::AddWaypoints`]: not guiding, another route request
    ///   in flight, invalid waypoints, routing failed, or superseded by a
    ///   reroute or cancel
    /// - [`NavigationError::Store`]: no answer within the configured timeout
    pub async fn add_waypoints(&self, waypoints: Vec<WaypointInput>) -> Result<(), NavigationError> {
        let correlation = Uuid::new_v4();
        tracing::info!(%correlation, count = waypoints.len(), "Adding waypoints");

        let settled = self
            .store
            .send_and_wait_for(
                TripAction::AddWaypoints {
                    correlation,
                    waypoints,
                },
                move |action| action.settles(correlation),
                self.config.routing.add_waypoints_timeout,
            )
            .await?;

        let TripAction::AddWaypointsSettled { outcome, .. } = settled else {
            return Err(StoreError::ChannelClosed.into());
        };
        outcome.map_err(NavigationError::from)
    }

    /// Promote the alternative route at `index` to primary
    ///
    /// # Errors
    ///
    /// - [`NavigationError::InvalidState`]: no route is ready
    /// - [`NavigationError::InvalidRouteIndex`]: `index` out of range
    pub async fn select_route(&self, index: usize) -> Result<(), NavigationError> {
        let (phase, available) = self
            .store
            .state(|s| (s.phase, s.routes.as_ref().map_or(0, RouteSet::len)))
            .await;

        if phase != SessionState::Ready {
            return Err(NavigationError::InvalidState {
                operation: "select_route",
                state: phase.to_string(),
            });
        }
        if index >= available {
            return Err(NavigationError::InvalidRouteIndex { index, available });
        }

        self.store.send(TripAction::SelectRoute { index }).await?;
        Ok(())
    }

    // ========================================================================
    // Location adapter
    // ========================================================================

    /// Report progress from an external location adapter
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Store`] when the orchestrator is shutting down.
    pub async fn report_progress(&self, snapshot: ProgressSnapshot) -> Result<(), NavigationError> {
        self.report(LocationSignal::Progress(snapshot)).await
    }

    /// Report that the user left the route at `coordinate`
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Store`] when the orchestrator is shutting down.
    pub async fn report_off_route(&self, coordinate: Coordinate) -> Result<(), NavigationError> {
        self.report(LocationSignal::OffRoute { coordinate }).await
    }

    /// Report arrival at the end of leg `leg_index`
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Store`] when the orchestrator is shutting down.
    pub async fn report_arrival(&self, leg_index: usize) -> Result<(), NavigationError> {
        self.report(LocationSignal::Arrival { leg_index }).await
    }

    async fn report(&self, signal: LocationSignal) -> Result<(), NavigationError> {
        self.store
            .send(TripAction::Location { feed: None, signal })
            .await?;
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current session state
    pub async fn state(&self) -> SessionState {
        self.store.state(|s| s.phase).await
    }

    /// Candidate routes of the session, primary first
    pub async fn routes(&self) -> Option<RouteSet> {
        self.store.state(|s| s.routes.clone()).await
    }

    /// Waypoints of the session
    pub async fn waypoints(&self) -> WaypointSet {
        self.store.state(|s| s.waypoints.clone()).await
    }

    /// Whether a history recording is running
    pub async fn is_recording(&self) -> bool {
        self.store.state(|s| s.recording.is_recording()).await
    }

    /// History summary store
    #[must_use]
    pub fn history(&self) -> &HistorySummaryStore {
        &self.store.environment().history
    }

    /// Stop guidance feeds and wait for running effects
    ///
    /// New commands are rejected once shutdown starts.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::Store`] when effects are still running after
    /// `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), NavigationError> {
        let env = self.store.environment();
        env.feeds.detach();
        env.coordinator.cancel_in_flight();
        self.store.shutdown(timeout).await?;
        Ok(())
    }
}

impl std::fmt::Debug for TripOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripOrchestrator")
            .field("config", &self.config)
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TripOrchestrator`]
///
/// Every capability defaults to the offline implementation shipped with
/// this crate.
pub struct TripOrchestratorBuilder {
    config: TripConfig,
    routing: Option<Arc<dyn RoutingService>>,
    live_location: Option<Arc<dyn LocationProducer>>,
    simulated_location: Option<Arc<dyn LocationProducer>>,
    recorder: Option<Arc<dyn HistoryRecorder>>,
    file_system: Option<Arc<dyn FileSystem>>,
    clock: Option<Arc<dyn Clock>>,
}

impl TripOrchestratorBuilder {
    fn new(config: TripConfig) -> Self {
        Self {
            config,
            routing: None,
            live_location: None,
            simulated_location: None,
            recorder: None,
            file_system: None,
            clock: None,
        }
    }

    /// Routing service (default: [`StraightLineRouter`])
    #[must_use]
    pub fn with_routing(mut self, routing: Arc<dyn RoutingService>) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Producer for live guidance (default: [`ChannelLocationProducer`])
    #[must_use]
    pub fn with_live_location(mut self, producer: Arc<dyn LocationProducer>) -> Self {
        self.live_location = Some(producer);
        self
    }

    /// Producer for simulated guidance (default: [`SimulatedLocationProducer`])
    #[must_use]
    pub fn with_simulated_location(mut self, producer: Arc<dyn LocationProducer>) -> Self {
        self.simulated_location = Some(producer);
        self
    }

    /// History recorder (default: [`FileHistoryRecorder`])
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn HistoryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// File system of the history store (default: [`LocalFileSystem`])
    #[must_use]
    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    /// Time source (default: [`SystemClock`])
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assemble the orchestrator
    #[must_use]
    pub fn build(self) -> TripOrchestrator {
        let config = Arc::new(self.config);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let file_system = self.file_system.unwrap_or_else(|| Arc::new(LocalFileSystem));
        let routing = self
            .routing
            .unwrap_or_else(|| Arc::new(StraightLineRouter::new()));
        let live_location = self
            .live_location
            .unwrap_or_else(|| Arc::new(ChannelLocationProducer::new()));
        let simulated_location = self.simulated_location.unwrap_or_else(|| {
            let producer = SimulatedLocationProducer::new(config.simulation.tick);
            Arc::new(match config.simulation.speed_mps {
                Some(speed) => producer.with_speed(speed),
                None => producer,
            })
        });
        let recorder = self
            .recorder
            .unwrap_or_else(|| Arc::new(FileHistoryRecorder::with_shared_clock(Arc::clone(&clock))));

        let environment = TripEnvironment {
            coordinator: Arc::new(RouteRequestCoordinator::new(routing, config.routing.timeout)),
            history: Arc::new(HistorySummaryStore::new(file_system, &config.history.directory)),
            clock,
            live_location,
            simulated_location,
            recorder,
            events: EventBridge::new(),
            feeds: Arc::new(FeedSlot::default()),
            config: Arc::clone(&config),
        };

        tracing::debug!(
            history = config.history.enabled,
            directory = %config.history.directory.display(),
            "Trip orchestrator assembled"
        );

        TripOrchestrator {
            store: Store::new(TripState::default(), TripReducer::new(), environment),
            config,
        }
    }
}

impl std::fmt::Debug for TripOrchestratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripOrchestratorBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
