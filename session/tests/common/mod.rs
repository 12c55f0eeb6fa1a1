//! Shared fixtures for session integration tests.

#![allow(dead_code)] // Not every test binary uses every fixture
#![allow(clippy::unwrap_used, clippy::panic)] // Test code can unwrap/panic

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use trip_core::EventSubscription;
use trip_session::capabilities::recording::StopFuture;
use trip_session::capabilities::routing::RoutingFuture;
use trip_session::capabilities::{
    ChannelLocationProducer, HistoryRecorder, LocationSignal, ProgressSnapshot, RoutingError, RoutingService,
    StraightLineRouter,
};
use trip_session::{
    Coordinate, DomainEvent, RecordingError, RouteRequest, TripConfig, TripOrchestrator, Waypoint,
    WaypointInput,
};
use trip_testing::{ManualClock, events, test_time};

/// How long a test waits for an event before giving up
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Scripted routing service
// ============================================================================

/// Next answer of the [`ScriptedRouter`]
#[derive(Debug, Clone)]
pub enum Script {
    /// Straight-line routes
    Route,
    /// Straight-line routes after a delay
    Delay(Duration),
    /// Transport failure
    Fail(RoutingError),
    /// Never answers
    Hang,
    /// Empty candidate list
    Empty,
}

/// Routing service answering from a queue of scripts
///
/// Falls back to straight-line routes once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedRouter {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<RouteRequest>>,
    fallback: StraightLineRouter,
}

impl ScriptedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next request
    pub fn push(&self, script: Script) -> &Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Waypoint names of the `index`-th request
    pub fn request_names(&self, index: usize) -> Vec<String> {
        self.requests()[index]
            .waypoints()
            .iter()
            .map(|w| w.name.clone())
            .collect()
    }
}

impl RoutingService for ScriptedRouter {
    fn calculate_route(&self, request: RouteRequest) -> RoutingFuture<'_> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Route);

        Box::pin(async move {
            match script {
                Script::Route => self.fallback.calculate_route(request).await,
                Script::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    self.fallback.calculate_route(request).await
                },
                Script::Fail(error) => Err(error),
                Script::Hang => std::future::pending().await,
                Script::Empty => Ok(Vec::new()),
            }
        })
    }
}

// ============================================================================
// Recording
// ============================================================================

/// Recorder counting calls instead of capturing
#[derive(Debug, Default)]
pub struct MockRecorder {
    starts: AtomicUsize,
    stops: AtomicUsize,
    path: Mutex<Option<PathBuf>>,
    fail_start: bool,
    fail_stop: bool,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder whose start always fails
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// Recorder whose stop always fails
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl HistoryRecorder for MockRecorder {
    fn start_recording(&self, path: &Path) -> Result<Vec<String>, RecordingError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(RecordingError::Start("recorder unavailable".to_string()));
        }
        std::fs::write(path, b"capture").map_err(|e| RecordingError::Start(e.to_string()))?;
        *self.path.lock().unwrap() = Some(path.to_path_buf());
        Ok(vec!["mock".to_string()])
    }

    fn stop_recording(&self) -> StopFuture<'_> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let path = self.path.lock().unwrap().take();
        let fail = self.fail_stop;
        Box::pin(async move {
            if fail {
                return Err(RecordingError::Stop("capture lost".to_string()));
            }
            Ok(path)
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Orchestrator wired with scripted capabilities
pub struct Harness {
    pub orchestrator: TripOrchestrator,
    pub live: ChannelLocationProducer,
    pub router: Arc<ScriptedRouter>,
    pub recorder: Arc<MockRecorder>,
    pub clock: Arc<ManualClock>,
    pub events: EventSubscription<DomainEvent>,
    pub dir: TempDir,
}

impl Harness {
    /// Harness with history recording enabled
    pub fn new() -> Self {
        Self::with(MockRecorder::new(), |config| config)
    }

    /// Harness with a custom recorder and configuration
    pub fn with(recorder: MockRecorder, configure: impl FnOnce(TripConfig) -> TripConfig) -> Self {
        trip_testing::init_tracing();

        let dir = tempfile::tempdir().unwrap();
        let config = configure(
            TripConfig::default()
                .with_history_enabled(true)
                .with_history_directory(dir.path())
                .with_route_timeout(Duration::from_secs(2))
                .with_add_waypoints_timeout(Duration::from_secs(3)),
        );

        let live = ChannelLocationProducer::new();
        let router = Arc::new(ScriptedRouter::new());
        let recorder = Arc::new(recorder);
        let clock = Arc::new(ManualClock::starting_at(test_time()));

        let orchestrator = TripOrchestrator::builder(config)
            .with_routing(Arc::clone(&router) as Arc<dyn RoutingService>)
            .with_live_location(Arc::new(live.clone()))
            .with_recorder(Arc::clone(&recorder) as Arc<dyn HistoryRecorder>)
            .with_clock(Arc::clone(&clock) as Arc<dyn trip_core::environment::Clock>)
            .build();
        let events = orchestrator.subscribe();

        Self {
            orchestrator,
            live,
            router,
            recorder,
            clock,
            events,
            dir,
        }
    }

    /// Wait for the next event
    pub async fn next_event(&mut self) -> DomainEvent {
        events::next_within(&mut self.events, EVENT_TIMEOUT)
            .await
            .unwrap_or_else(|| panic!("no event within {EVENT_TIMEOUT:?}"))
    }

    /// Collect events up to and including the first matching `stop`
    pub async fn events_until(&mut self, stop: impl Fn(&DomainEvent) -> bool) -> Vec<DomainEvent> {
        let seen = events::collect_until(&mut self.events, stop, EVENT_TIMEOUT).await;
        assert!(!seen.is_empty(), "no event within {EVENT_TIMEOUT:?}");
        seen
    }

    /// Event types up to and including the first of type `stop`
    pub async fn types_until(&mut self, stop: &str) -> Vec<&'static str> {
        self.events_until(|event| event.event_type() == stop)
            .await
            .iter()
            .map(DomainEvent::event_type)
            .collect()
    }

    /// Events already delivered, without waiting
    pub fn drain(&mut self) -> Vec<&'static str> {
        self.events.drain().iter().map(DomainEvent::event_type).collect()
    }

    /// Submit `waypoints` and wait for the route
    pub async fn ready(&mut self, waypoints: Vec<WaypointInput>) {
        self.orchestrator
            .submit(waypoints, self.orchestrator.default_options())
            .await
            .unwrap();
        assert_eq!(self.types_until("route_built").await, vec!["route_building", "route_built"]);
    }

    /// Push a live progress signal through the attached feed
    pub fn push_progress(&self, distance_remaining: f64, leg_index: usize) {
        assert!(self.live.push(LocationSignal::Progress(ProgressSnapshot {
            distance_remaining,
            duration_remaining: distance_remaining / 10.0,
            leg_index,
            coordinate: Coordinate::new(0.0, 0.05),
        })));
    }

    /// Push a live signal through the attached feed
    pub fn push(&self, signal: LocationSignal) {
        assert!(self.live.push(signal), "no feed attached");
    }
}

/// Three stops on the equator, two legs
pub fn trip() -> Vec<WaypointInput> {
    vec![
        Waypoint::new("A", Coordinate::new(0.0, 0.0)).into(),
        Waypoint::new("B", Coordinate::new(0.0, 0.1)).into(),
        Waypoint::new("C", Coordinate::new(0.0, 0.2)).into(),
    ]
}

/// Two stops, one leg
pub fn short_trip() -> Vec<WaypointInput> {
    vec![
        Waypoint::new("Home", Coordinate::new(48.8566, 2.3522)).into(),
        Waypoint::new("Work", Coordinate::new(48.8606, 2.3376)).into(),
    ]
}
