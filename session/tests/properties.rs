//! Property tests for waypoint ordering, leg bookkeeping, error
//! classification and progress clamping.

#![allow(clippy::unwrap_used, clippy::cast_precision_loss)] // Test code can unwrap

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use trip_core::EventBridge;
use trip_core::reducer::Reducer;
use trip_session::capabilities::{
    ChannelLocationProducer, FileHistoryRecorder, LocalFileSystem, LocationSignal, ProgressSnapshot, RoutingError,
    StraightLineRouter,
};
use trip_session::coordinator::classify;
use trip_session::session::FeedSlot;
use trip_session::{
    Coordinate, DomainEvent, GuidanceMode, HistorySummaryStore, Route, RouteFailureReason, RouteLeg, RouteOptions,
    RouteRequest, RouteRequestCoordinator, RouteSet, SessionState, TripAction, TripConfig, TripEnvironment,
    TripReducer, TripState, Waypoint, WaypointInput, WaypointSet,
};
use trip_testing::test_clock;

fn input(index: usize, order: Option<i32>, is_silent: bool) -> WaypointInput {
    WaypointInput {
        name: Some(format!("W{index}")),
        latitude: Some(0.0),
        longitude: Some(index as f64 * 0.01),
        is_silent,
        order,
    }
}

fn environment() -> TripEnvironment {
    let directory = std::env::temp_dir().join("trip-property-tests");
    TripEnvironment {
        clock: Arc::new(test_clock()),
        coordinator: Arc::new(RouteRequestCoordinator::new(
            Arc::new(StraightLineRouter::new()),
            Duration::from_secs(1),
        )),
        live_location: Arc::new(ChannelLocationProducer::new()),
        simulated_location: Arc::new(ChannelLocationProducer::new()),
        recorder: Arc::new(FileHistoryRecorder::new(test_clock())),
        history: Arc::new(HistorySummaryStore::new(Arc::new(LocalFileSystem), &directory)),
        events: EventBridge::new(),
        feeds: Arc::new(FeedSlot::default()),
        config: Arc::new(TripConfig::default().with_history_directory(directory)),
    }
}

fn guiding(legs: usize) -> TripState {
    let inputs: Vec<WaypointInput> = (0..=legs).map(|i| input(i, None, false)).collect();
    let waypoints = WaypointSet::from_inputs(inputs, true).unwrap();
    let route = Route::from_legs(
        (0..legs)
            .map(|_| RouteLeg {
                from: Coordinate::new(0.0, 0.0),
                to: Coordinate::new(0.0, 0.01),
                distance_meters: 1000.0,
                duration_seconds: 100.0,
            })
            .collect(),
        Vec::new(),
    );
    let request = RouteRequest::new(waypoints.clone(), RouteOptions::default()).unwrap();

    TripState {
        phase: SessionState::Guiding {
            mode: GuidanceMode::Live,
        },
        waypoints,
        routes: RouteSet::new(vec![route], request),
        trip: 1,
        active_mode: Some(GuidanceMode::Live),
        ..TripState::default()
    }
}

proptest! {
    #[test]
    fn prop_effective_order_is_stable_by_order(orders in prop::collection::vec(prop::option::of(-3i32..4), 2..12)) {
        let inputs: Vec<WaypointInput> = orders
            .iter()
            .enumerate()
            .map(|(i, order)| input(i, *order, false))
            .collect();
        let set = WaypointSet::from_inputs(inputs, false).unwrap();

        let mut expected: Vec<(i32, usize)> = orders
            .iter()
            .enumerate()
            .map(|(i, order)| (order.unwrap_or(0), i))
            .collect();
        expected.sort_unstable();
        let expected: Vec<String> = expected.iter().map(|(_, i)| format!("W{i}")).collect();
        let actual: Vec<String> = set.iter().map(|w| w.name.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_preserved_order_keeps_submission_order(orders in prop::collection::vec(prop::option::of(-3i32..4), 2..12)) {
        let inputs: Vec<WaypointInput> = orders
            .iter()
            .enumerate()
            .map(|(i, order)| input(i, *order, false))
            .collect();
        let set = WaypointSet::from_inputs(inputs, true).unwrap();
        let actual: Vec<String> = set.iter().map(|w| w.name.clone()).collect();
        let expected: Vec<String> = (0..orders.len()).map(|i| format!("W{i}")).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_silent_waypoints_never_split_legs(silent in prop::collection::vec(any::<bool>(), 2..12)) {
        let inputs: Vec<WaypointInput> = silent
            .iter()
            .enumerate()
            .map(|(i, s)| input(i, None, *s))
            .collect();
        let set = WaypointSet::from_inputs(inputs, true).unwrap();

        let inner_stops = silent[1..silent.len() - 1].iter().filter(|s| !**s).count();
        prop_assert_eq!(set.leg_count(), inner_stops + 1);
        prop_assert_eq!(set.remaining_after_leg(0).len(), set.len() - 1);
        prop_assert!(set.remaining_after_leg(set.leg_count()).is_empty());
    }

    #[test]
    fn prop_classification_is_total(status in prop::option::of(100u16..600), message in ".{0,40}") {
        let error = RoutingError { status, message: message.clone() };
        let failure = classify(&error);
        prop_assert_eq!(failure.message, message);

        match status {
            Some(401 | 403) => prop_assert_eq!(failure.reason, RouteFailureReason::Unauthorized),
            Some(404 | 422) => prop_assert_eq!(failure.reason, RouteFailureReason::NoRoute),
            Some(408 | 504) => prop_assert_eq!(failure.reason, RouteFailureReason::Timeout),
            Some(502 | 503) => prop_assert_eq!(failure.reason, RouteFailureReason::Network),
            _ => {},
        }
    }

    #[test]
    fn prop_progress_distance_is_monotonic_within_a_leg(
        readings in prop::collection::vec((0.0f64..5000.0, 0usize..3), 1..40)
    ) {
        let env = environment();
        let mut events = env.events.subscribe();
        let mut state = guiding(3);
        let reducer = TripReducer::new();

        for (distance, leg) in &readings {
            let _ = reducer.reduce(
                &mut state,
                TripAction::Location {
                    feed: None,
                    signal: LocationSignal::Progress(ProgressSnapshot {
                        distance_remaining: *distance,
                        duration_remaining: distance / 10.0,
                        leg_index: *leg,
                        coordinate: Coordinate::new(0.0, 0.0),
                    }),
                },
                &env,
            );
        }

        let mut last: Option<(usize, f64)> = None;
        for event in events.drain() {
            let DomainEvent::ProgressUpdate { distance_remaining, leg_index, .. } = event else {
                continue;
            };
            if let Some((previous_leg, previous)) = last {
                prop_assert!(leg_index >= previous_leg);
                if leg_index == previous_leg {
                    prop_assert!(distance_remaining <= previous);
                }
            }
            last = Some((leg_index, distance_remaining));
        }
    }
}

#[test]
fn test_current_location_origin_is_prepended() {
    let set = WaypointSet::from_inputs((0..3).map(|i| input(i, None, false)), true).unwrap();
    let remaining = set
        .remaining_after_leg(1)
        .starting_from(Waypoint::new("Here", Coordinate::new(0.0, 0.015)));
    let names: Vec<&str> = remaining.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["Here", "W2"]);
}
