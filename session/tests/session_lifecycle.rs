//! End-to-end tests of the trip session through the orchestrator
//!
//! Every test drives the public facade with a scripted router, a pushed live
//! location feed and a counting recorder, then asserts on the event stream.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{Harness, MockRecorder, Script, short_trip, trip};
use std::time::Duration;
use trip_session::capabilities::{LocationSignal, ProgressSnapshot, RoutingError};
use trip_session::{
    AddWaypointsError, Coordinate, DomainEvent, GuidanceMode, NavigationError, RouteFailureReason, SessionState,
    ValidationError, Waypoint, WaypointInput,
};
use trip_testing::events;

const QUIET: Duration = Duration::from_millis(150);

const LIVE: SessionState = SessionState::Guiding {
    mode: GuidanceMode::Live,
};

/// Ready, started and past the start-up events
async fn guiding(h: &mut Harness, waypoints: Vec<WaypointInput>) {
    h.ready(waypoints).await;
    assert_eq!(h.orchestrator.start(GuidanceMode::Live).await.unwrap(), LIVE);
    assert_eq!(
        h.types_until("history_recording_started").await,
        vec!["navigation_running", "history_recording_started"]
    );
}

fn names(waypoints: &trip_session::WaypointSet) -> Vec<&str> {
    waypoints.iter().map(|w| w.name.as_str()).collect()
}

// ============================================================================
// Build and arrive
// ============================================================================

#[tokio::test]
async fn test_trip_to_final_arrival_records_history() {
    let mut h = Harness::new();
    h.ready(short_trip()).await;
    assert_eq!(h.orchestrator.state().await, SessionState::Ready);

    assert_eq!(h.orchestrator.start(GuidanceMode::Live).await.unwrap(), LIVE);
    assert_eq!(
        h.types_until("history_recording_started").await,
        vec!["navigation_running", "history_recording_started"]
    );
    assert!(h.orchestrator.is_recording().await);

    h.clock.advance(chrono::Duration::seconds(90));
    h.push(LocationSignal::Arrival { leg_index: 0 });

    let seen = h.events_until(|e| matches!(e, DomainEvent::NavigationFinished)).await;
    assert_eq!(seen[0], DomainEvent::OnArrival { is_final: true });
    assert!(matches!(seen[1], DomainEvent::HistoryRecordingStopped { .. }));
    assert_eq!(seen.len(), 3);
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);

    let records = h.orchestrator.history().list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start_point_name, "Home");
    assert_eq!(records[0].end_point_name, "Work");
    assert_eq!(records[0].duration_seconds, 90);
    assert_eq!(h.recorder.starts(), 1);
    assert_eq!(h.recorder.stops(), 1);
}

#[tokio::test]
async fn test_network_failure_returns_to_idle() {
    let mut h = Harness::new();
    h.router.push(Script::Fail(RoutingError::with_status(503, "upstream unavailable")));

    h.orchestrator
        .submit(short_trip(), h.orchestrator.default_options())
        .await
        .unwrap();

    let seen = h
        .events_until(|e| matches!(e, DomainEvent::RouteBuildFailed(_)))
        .await;
    assert_eq!(seen[0], DomainEvent::RouteBuilding);
    let DomainEvent::RouteBuildFailed(failure) = &seen[1] else {
        panic!("expected a build failure, got {seen:?}");
    };
    assert_eq!(failure.reason, RouteFailureReason::Network);

    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
    assert!(events::collect_for(&mut h.events, QUIET).await.is_empty());
    assert_eq!(h.recorder.starts(), 0);
}

#[tokio::test]
async fn test_empty_candidate_list_is_no_route() {
    let mut h = Harness::new();
    h.router.push(Script::Empty);

    h.orchestrator
        .submit(short_trip(), h.orchestrator.default_options())
        .await
        .unwrap();

    let seen = h
        .events_until(|e| matches!(e, DomainEvent::RouteBuildFailed(_)))
        .await;
    assert!(matches!(
        seen.last(),
        Some(DomainEvent::RouteBuildFailed(f)) if f.reason == RouteFailureReason::NoRoute
    ));
}

#[tokio::test]
async fn test_slow_router_times_out() {
    let mut h = Harness::with(MockRecorder::new(), |config| {
        config.with_route_timeout(Duration::from_millis(100))
    });
    h.router.push(Script::Hang);

    h.orchestrator
        .submit(short_trip(), h.orchestrator.default_options())
        .await
        .unwrap();

    let seen = h
        .events_until(|e| matches!(e, DomainEvent::RouteBuildFailed(_)))
        .await;
    assert!(matches!(
        seen.last(),
        Some(DomainEvent::RouteBuildFailed(f)) if f.reason == RouteFailureReason::Timeout
    ));
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_submit_rejects_invalid_waypoints() {
    let mut h = Harness::new();
    let single = vec![Waypoint::new("Alone", Coordinate::new(1.0, 1.0)).into()];

    let error = h
        .orchestrator
        .submit(single, h.orchestrator.default_options())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        NavigationError::Validation(ValidationError::TooFewWaypoints { count: 1 })
    ));

    let missing = vec![
        WaypointInput {
            name: Some("A".to_string()),
            latitude: Some(1.0),
            ..WaypointInput::default()
        },
        Waypoint::new("B", Coordinate::new(1.0, 1.0)).into(),
    ];
    let error = h
        .orchestrator
        .submit(missing, h.orchestrator.default_options())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        NavigationError::Validation(ValidationError::MissingField {
            index: 0,
            field: "longitude"
        })
    ));

    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_intermediate_arrival_continues_guidance() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.push(LocationSignal::Arrival { leg_index: 0 });
    assert_eq!(
        h.next_event().await,
        DomainEvent::WaypointArrival { leg_index: 0 }
    );
    assert_eq!(h.orchestrator.state().await, LIVE);

    // Late duplicate of the first arrival
    h.push(LocationSignal::Arrival { leg_index: 0 });
    h.push(LocationSignal::Arrival { leg_index: 1 });
    assert_eq!(
        h.types_until("navigation_finished").await,
        vec!["on_arrival", "history_recording_stopped", "navigation_finished"]
    );
}

#[tokio::test]
async fn test_progress_distance_never_increases_within_a_leg() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.push_progress(900.0, 0);
    h.push_progress(950.0, 0);
    h.push_progress(800.0, 0);
    h.push_progress(1200.0, 1);

    let mut distances = Vec::new();
    for _ in 0..4 {
        match h.next_event().await {
            DomainEvent::ProgressUpdate {
                distance_remaining,
                leg_index,
                ..
            } => distances.push((leg_index, distance_remaining)),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(distances, vec![(0, 900.0), (0, 900.0), (0, 800.0), (1, 1200.0)]);
}

#[tokio::test]
async fn test_simulated_guidance_reaches_destination() {
    let mut h = Harness::with(MockRecorder::new(), |config| {
        config
            .with_simulation_tick(Duration::from_millis(10))
            .with_simulation_speed(5000.0)
    });
    h.ready(short_trip()).await;

    let state = h.orchestrator.start(GuidanceMode::Simulated).await.unwrap();
    assert_eq!(
        state,
        SessionState::Guiding {
            mode: GuidanceMode::Simulated
        }
    );

    let types = h.types_until("navigation_finished").await;
    assert_eq!(types.first(), Some(&"navigation_running"));
    assert!(types.contains(&"progress_update"));
    assert!(types.contains(&"on_arrival"));
    assert_eq!(h.orchestrator.history().list().len(), 1);
}

// ============================================================================
// Start and cancel
// ============================================================================

#[tokio::test]
async fn test_start_is_idempotent() {
    let mut h = Harness::new();
    guiding(&mut h, short_trip()).await;

    assert_eq!(h.orchestrator.start(GuidanceMode::Simulated).await.unwrap(), LIVE);
    assert!(events::collect_for(&mut h.events, QUIET).await.is_empty());
    assert_eq!(h.recorder.starts(), 1);
}

#[tokio::test]
async fn test_start_before_route_is_noop() {
    let mut h = Harness::new();
    assert_eq!(
        h.orchestrator.start(GuidanceMode::Live).await.unwrap(),
        SessionState::Idle
    );
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_cancel_while_building_discards_late_route() {
    let mut h = Harness::new();
    h.router.push(Script::Delay(Duration::from_millis(100)));

    h.orchestrator
        .submit(short_trip(), h.orchestrator.default_options())
        .await
        .unwrap();
    assert_eq!(h.next_event().await, DomainEvent::RouteBuilding);

    h.orchestrator.cancel().await.unwrap();
    assert_eq!(
        h.types_until("navigation_cancelled").await,
        vec!["route_build_cancelled", "navigation_cancelled"]
    );
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);

    assert!(events::collect_for(&mut h.events, Duration::from_millis(250)).await.is_empty());
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
    assert!(h.orchestrator.routes().await.is_none());
}

#[tokio::test]
async fn test_cancel_when_idle_is_noop() {
    let mut h = Harness::new();
    h.orchestrator.cancel().await.unwrap();
    assert!(events::collect_for(&mut h.events, QUIET).await.is_empty());
}

#[tokio::test]
async fn test_cancel_during_guidance_stops_recording() {
    let mut h = Harness::new();
    guiding(&mut h, short_trip()).await;

    h.orchestrator.cancel().await.unwrap();
    assert_eq!(
        h.types_until("history_recording_stopped").await,
        vec!["navigation_cancelled", "history_recording_stopped"]
    );
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);

    // The detached feed no longer reaches the session
    let _ = h.live.push(LocationSignal::Arrival { leg_index: 0 });
    assert!(events::collect_for(&mut h.events, QUIET).await.is_empty());
    assert_eq!(h.orchestrator.history().list().len(), 1);
}

#[tokio::test]
async fn test_submit_while_guiding_replaces_session() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.orchestrator
        .submit(short_trip(), h.orchestrator.default_options())
        .await
        .unwrap();

    let types = h.types_until("route_built").await;
    let cancelled = types.iter().position(|t| *t == "navigation_cancelled").unwrap();
    let building = types.iter().position(|t| *t == "route_building").unwrap();
    assert!(cancelled < building);
    assert_eq!(h.orchestrator.state().await, SessionState::Ready);
    assert_eq!(names(&h.orchestrator.waypoints().await), vec!["Home", "Work"]);
}

// ============================================================================
// Rerouting
// ============================================================================

#[tokio::test]
async fn test_failed_reroute_keeps_original_route() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;
    let original = h.orchestrator.routes().await;

    h.router.push(Script::Fail(RoutingError::new("connection reset")));
    h.push(LocationSignal::OffRoute {
        coordinate: Coordinate::new(0.01, 0.05),
    });

    assert_eq!(
        h.types_until("route_build_failed").await,
        vec!["user_off_route", "route_build_failed"]
    );
    assert_eq!(h.orchestrator.state().await, LIVE);
    assert_eq!(h.orchestrator.routes().await, original);
    assert!(!h.drain().contains(&"navigation_cancelled"));
}

#[tokio::test]
async fn test_reroute_starts_from_current_location() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.push(LocationSignal::OffRoute {
        coordinate: Coordinate::new(0.01, 0.05),
    });
    assert_eq!(
        h.types_until("reroute_along").await,
        vec!["user_off_route", "reroute_along"]
    );
    assert_eq!(h.orchestrator.state().await, LIVE);
    assert_eq!(h.router.request_names(1), vec!["Current Location", "B", "C"]);

    // The new route has a leg to B and a leg to C
    h.push(LocationSignal::Arrival { leg_index: 0 });
    assert_eq!(
        h.next_event().await,
        DomainEvent::WaypointArrival { leg_index: 0 }
    );
}

#[tokio::test]
async fn test_cancel_wins_over_inflight_reroute() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.router.push(Script::Delay(Duration::from_millis(100)));
    h.push(LocationSignal::OffRoute {
        coordinate: Coordinate::new(0.01, 0.05),
    });
    assert_eq!(h.next_event().await, DomainEvent::UserOffRoute);

    h.orchestrator.cancel().await.unwrap();
    let types = h.types_until("history_recording_stopped").await;
    assert_eq!(types, vec!["navigation_cancelled", "history_recording_stopped"]);

    assert!(events::collect_for(&mut h.events, Duration::from_millis(250)).await.is_empty());
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
}

// ============================================================================
// Adding waypoints
// ============================================================================

#[tokio::test]
async fn test_add_waypoints_inserts_after_current_leg_start() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.orchestrator
        .add_waypoints(vec![Waypoint::new("X", Coordinate::new(0.0, 0.05)).into()])
        .await
        .unwrap();

    assert_eq!(names(&h.orchestrator.waypoints().await), vec!["A", "X", "B", "C"]);
    assert_eq!(h.router.request_names(1), vec!["Current Location", "X", "B", "C"]);
    assert_eq!(h.next_event().await.event_type(), "route_built");
    assert_eq!(h.orchestrator.state().await, LIVE);
}

#[tokio::test]
async fn test_add_waypoints_requires_guidance() {
    let mut h = Harness::new();
    h.ready(short_trip()).await;

    let error = h
        .orchestrator
        .add_waypoints(vec![Waypoint::new("X", Coordinate::new(48.858, 2.34)).into()])
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        NavigationError::AddWaypoints(AddWaypointsError::NotGuiding)
    ));
}

#[tokio::test]
async fn test_add_waypoints_failure_keeps_guidance() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;
    let original = h.orchestrator.routes().await;

    h.router.push(Script::Fail(RoutingError::with_status(404, "no route found")));
    let error = h
        .orchestrator
        .add_waypoints(vec![Waypoint::new("X", Coordinate::new(0.0, 0.05)).into()])
        .await
        .unwrap_err();

    let NavigationError::AddWaypoints(AddWaypointsError::Route(failure)) = error else {
        panic!("expected a routing failure, got {error:?}");
    };
    assert_eq!(failure.reason, RouteFailureReason::NoRoute);
    assert_eq!(names(&h.orchestrator.waypoints().await), vec!["A", "B", "C"]);
    assert_eq!(h.orchestrator.routes().await, original);
    assert_eq!(h.orchestrator.state().await, LIVE);
}

#[tokio::test]
async fn test_add_waypoints_rejects_invalid_input() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    let error = h
        .orchestrator
        .add_waypoints(vec![Waypoint::new("Nowhere", Coordinate::new(120.0, 0.0)).into()])
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        NavigationError::AddWaypoints(AddWaypointsError::Validation(
            ValidationError::InvalidCoordinate { index: 0, .. }
        ))
    ));
    assert_eq!(h.router.requests().len(), 1);
}

#[tokio::test]
async fn test_arrival_supersedes_inflight_add_waypoints() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;
    let original = h.orchestrator.routes().await;

    h.router.push(Script::Delay(Duration::from_millis(300)));
    let arrive = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.push(LocationSignal::Arrival { leg_index: 0 });
    };
    let (result, ()) = tokio::join!(
        h.orchestrator
            .add_waypoints(vec![Waypoint::new("X", Coordinate::new(0.0, 0.05)).into()]),
        arrive
    );

    assert!(matches!(
        result,
        Err(NavigationError::AddWaypoints(AddWaypointsError::Superseded))
    ));
    assert_eq!(h.next_event().await, DomainEvent::WaypointArrival { leg_index: 0 });
    assert!(events::collect_for(&mut h.events, Duration::from_millis(400)).await.is_empty());
    assert_eq!(names(&h.orchestrator.waypoints().await), vec!["A", "B", "C"]);
    assert_eq!(h.orchestrator.routes().await, original);
    assert_eq!(h.orchestrator.state().await, LIVE);
}

#[tokio::test]
async fn test_position_reported_while_idle_is_not_reused() {
    let mut h = Harness::new();
    h.orchestrator
        .report_progress(ProgressSnapshot {
            distance_remaining: 100.0,
            duration_remaining: 10.0,
            leg_index: 0,
            coordinate: Coordinate::new(45.0, 45.0),
        })
        .await
        .unwrap();
    guiding(&mut h, trip()).await;

    h.orchestrator
        .add_waypoints(vec![Waypoint::new("X", Coordinate::new(0.0, 0.05)).into()])
        .await
        .unwrap();

    let request = &h.router.requests()[1];
    let origin = request.waypoints().first().unwrap();
    assert_eq!(origin.name, "Current Location");
    assert_eq!(origin.coordinate, Coordinate::new(0.0, 0.0));
}

#[tokio::test]
async fn test_arrival_during_reroute_finishes_trip() {
    let mut h = Harness::new();
    guiding(&mut h, trip()).await;

    h.router.push(Script::Delay(Duration::from_millis(300)));
    h.push(LocationSignal::OffRoute {
        coordinate: Coordinate::new(0.01, 0.05),
    });
    assert_eq!(h.next_event().await, DomainEvent::UserOffRoute);
    assert_eq!(h.orchestrator.state().await, SessionState::Rerouting);

    h.push(LocationSignal::Arrival { leg_index: 0 });
    h.push(LocationSignal::Arrival { leg_index: 1 });
    assert_eq!(
        h.types_until("navigation_finished").await,
        vec![
            "waypoint_arrival",
            "on_arrival",
            "history_recording_stopped",
            "navigation_finished"
        ]
    );

    assert!(events::collect_for(&mut h.events, Duration::from_millis(400)).await.is_empty());
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
    assert_eq!(h.recorder.stops(), 1);
}

// ============================================================================
// Alternatives
// ============================================================================

#[tokio::test]
async fn test_select_route_promotes_alternative() {
    let mut h = Harness::new();
    let options = h.orchestrator.default_options().with_alternatives(true);
    h.orchestrator.submit(short_trip(), options).await.unwrap();
    assert_eq!(
        h.types_until("route_built").await,
        vec!["route_building", "route_built"]
    );

    let routes = h.orchestrator.routes().await.unwrap();
    assert_eq!(routes.len(), 2);
    let alternative = routes.routes()[1].clone();

    h.orchestrator.select_route(1).await.unwrap();
    assert_eq!(h.next_event().await.event_type(), "route_built");
    assert_eq!(h.orchestrator.routes().await.unwrap().primary(), &alternative);

    assert!(matches!(
        h.orchestrator.select_route(2).await,
        Err(NavigationError::InvalidRouteIndex { index: 2, available: 2 })
    ));
}

#[tokio::test]
async fn test_select_route_outside_ready_is_rejected() {
    let h = Harness::new();
    assert!(matches!(
        h.orchestrator.select_route(0).await,
        Err(NavigationError::InvalidState {
            operation: "select_route",
            ..
        })
    ));
}

// ============================================================================
// Recording variants
// ============================================================================

#[tokio::test]
async fn test_recording_deferred_to_first_progress() {
    let mut h = Harness::with(MockRecorder::new(), |config| {
        config.with_recording_on_first_progress(true)
    });
    h.ready(short_trip()).await;

    h.orchestrator.start(GuidanceMode::Live).await.unwrap();
    assert_eq!(h.next_event().await, DomainEvent::NavigationRunning);
    assert_eq!(h.recorder.starts(), 0);

    h.push_progress(500.0, 0);
    assert_eq!(
        h.types_until("progress_update").await,
        vec!["history_recording_started", "progress_update"]
    );

    h.push_progress(400.0, 0);
    assert_eq!(h.types_until("progress_update").await, vec!["progress_update"]);
    assert_eq!(h.recorder.starts(), 1);
}

#[tokio::test]
async fn test_recording_start_failure_is_reported_once() {
    let mut h = Harness::with(MockRecorder::failing_start(), |config| config);
    h.ready(short_trip()).await;

    h.orchestrator.start(GuidanceMode::Live).await.unwrap();
    assert_eq!(
        h.types_until("history_recording_error").await,
        vec!["navigation_running", "history_recording_error"]
    );

    h.push_progress(500.0, 0);
    h.push(LocationSignal::Arrival { leg_index: 0 });
    assert_eq!(
        h.types_until("navigation_finished").await,
        vec!["progress_update", "on_arrival", "navigation_finished"]
    );
    assert_eq!(h.recorder.starts(), 1);
    assert_eq!(h.recorder.stops(), 0);
    assert!(h.orchestrator.history().list().is_empty());
}

#[tokio::test]
async fn test_recording_stop_failure_still_finishes() {
    let mut h = Harness::with(MockRecorder::failing_stop(), |config| config);
    guiding(&mut h, short_trip()).await;

    h.push(LocationSignal::Arrival { leg_index: 0 });
    assert_eq!(
        h.types_until("navigation_finished").await,
        vec!["on_arrival", "history_recording_error", "navigation_finished"]
    );
    assert_eq!(h.orchestrator.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_shutdown_rejects_new_commands() {
    let mut h = Harness::new();
    guiding(&mut h, short_trip()).await;

    h.orchestrator.shutdown(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(
        h.orchestrator.cancel().await,
        Err(NavigationError::Store(_))
    ));
}
