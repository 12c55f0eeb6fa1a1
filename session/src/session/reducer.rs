//! The trip session state machine.
//!
//! The reducer is the only code that mutates session state. Events are
//! published from inside the reduction, which runs under the store's write
//! lock, so their order is the causal order of the transitions.
//!
//! ```text
//!  Idle ─submit─▶ Building ─ok─▶ Ready ─start─▶ Guiding ◀──ok/fail── Rerouting
//!                   │ fail/cancel                  │ │ off-route ──────▲
//!                   ▼                              │ └─ final arrival ─▶ Arrived ─▶ Idle
//!                  Idle ◀──────── cancel ──────────┘
//! ```

use super::environment::TripEnvironment;
use super::types::{
    GuidanceMode, LegProgress, PendingRequest, RouteIntent, SessionState, TripAction, TripState,
};
use crate::capabilities::location::{LocationSignal, ProgressSnapshot};
use crate::error::AddWaypointsError;
use crate::events::DomainEvent;
use crate::history::{HistoryRecord, StartOutcome};
use crate::route::{RouteFailure, RouteFailureReason, RouteOptions, RouteRequest, RouteResult, RouteSet};
use crate::waypoint::{Coordinate, Waypoint, WaypointInput, WaypointSet};
use futures::StreamExt;
use std::sync::Arc;
use trip_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, reply, smallvec, stream_effect};
use uuid::Uuid;

/// Name of the synthetic waypoint a recalculated route starts from
pub const CURRENT_LOCATION: &str = "Current Location";

type Effects = SmallVec<[Effect<TripAction>; 4]>;

/// Reducer of the trip session
#[derive(Debug, Clone, Copy, Default)]
pub struct TripReducer;

impl TripReducer {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for TripReducer {
    type State = TripState;
    type Action = TripAction;
    type Environment = TripEnvironment;

    fn reduce(&self, state: &mut TripState, action: TripAction, env: &TripEnvironment) -> Effects {
        match action {
            TripAction::Submit { waypoints, options } => submit(state, waypoints, options, env),
            TripAction::Start { mode } => start(state, mode, env),
            TripAction::Cancel => cancel(state, env),
            TripAction::AddWaypoints {
                correlation,
                waypoints,
            } => add_waypoints(state, correlation, waypoints, env),
            TripAction::SelectRoute { index } => select_route(state, index, env),
            TripAction::RouteCalculated {
                generation,
                intent,
                result,
            } => route_calculated(state, generation, intent, result, env),
            TripAction::Location { feed, signal } => location(state, feed, signal, env),
            TripAction::RecordingFinished { trip, outcome } => recording_finished(state, trip, outcome, env),
            // Observed by the waiting caller only
            TripAction::AddWaypointsSettled { .. } => SmallVec::new(),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn submit(state: &mut TripState, waypoints: WaypointSet, options: RouteOptions, env: &TripEnvironment) -> Effects {
    let mut effects = Effects::new();
    if state.phase.is_active() {
        tracing::info!(state = %state.phase, "New submission replaces the active session");
        teardown(state, env, &mut effects);
    }

    let request = match RouteRequest::new(waypoints.clone(), options.clone()) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(error = %error, "Rejected submission");
            env.emit(DomainEvent::RouteBuildFailed(RouteFailure::new(
                RouteFailureReason::NoRoute,
                error.to_string(),
            )));
            return effects;
        },
    };

    state.trip += 1;
    state.waypoints = waypoints;
    state.options = options;
    state.last_coordinate = None;

    env.emit(DomainEvent::RouteBuilding);
    transition(state, SessionState::Building);
    effects.push(request_route(state, env, request, RouteIntent::Build));
    effects
}

fn start(state: &mut TripState, mode: GuidanceMode, env: &TripEnvironment) -> Effects {
    if state.phase != SessionState::Ready {
        tracing::debug!(state = %state.phase, ?mode, "Start ignored");
        return SmallVec::new();
    }

    transition(state, SessionState::Guiding { mode });
    state.active_mode = Some(mode);
    metrics::counter!("trip.sessions.started", "mode" => mode_label(mode)).increment(1);
    env.emit(DomainEvent::NavigationRunning);

    if !env.config.history.start_on_first_progress {
        begin_recording(state, env);
    }

    smallvec![attach_feed(state, env, mode)]
}

fn cancel(state: &mut TripState, env: &TripEnvironment) -> Effects {
    if !state.phase.is_active() {
        tracing::debug!("Cancel ignored, no active session");
        return SmallVec::new();
    }

    let mut effects = Effects::new();
    teardown(state, env, &mut effects);
    effects
}

fn add_waypoints(
    state: &mut TripState,
    correlation: Uuid,
    waypoints: Vec<WaypointInput>,
    env: &TripEnvironment,
) -> Effects {
    if !matches!(state.phase, SessionState::Guiding { .. }) {
        tracing::warn!(state = %state.phase, "Add waypoints rejected, not guiding");
        return smallvec![settle(correlation, Err(AddWaypointsError::NotGuiding))];
    }
    if state.pending.is_some() {
        tracing::warn!("Add waypoints rejected, a route request is in flight");
        return smallvec![settle(correlation, Err(AddWaypointsError::Busy))];
    }

    let trip_leg = state.trip_leg();
    let Some(anchor) = state.waypoints.leg_start(trip_leg) else {
        return smallvec![settle(correlation, Err(AddWaypointsError::NotGuiding))];
    };

    let mut candidate = state.waypoints.clone();
    if let Err(error) = candidate.insert_after(anchor, waypoints, state.options.preserve_order) {
        tracing::warn!(error = %error, "Add waypoints rejected");
        return smallvec![settle(correlation, Err(error.into()))];
    }

    let origin = state
        .last_coordinate
        .or_else(|| state.waypoints.get(anchor).map(|w| w.coordinate));
    let request = origin
        .ok_or(AddWaypointsError::NotGuiding)
        .and_then(|origin| {
            let remaining = candidate.remaining_after_leg(trip_leg);
            RouteRequest::new(remaining.starting_from(current_location(origin)), state.options.clone())
                .map_err(AddWaypointsError::from)
        });
    let request = match request {
        Ok(request) => request,
        Err(error) => return smallvec![settle(correlation, Err(error))],
    };

    tracing::debug!(
        added = candidate.len() - state.waypoints.len(),
        trip_leg,
        "Requesting route through added waypoints"
    );
    state.pending_insert = Some(candidate);
    smallvec![request_route(state, env, request, RouteIntent::AddWaypoints { correlation })]
}

fn select_route(state: &mut TripState, index: usize, env: &TripEnvironment) -> Effects {
    if state.phase != SessionState::Ready {
        tracing::warn!(state = %state.phase, index, "Route selection ignored, not ready");
        return SmallVec::new();
    }
    let Some(routes) = state.routes.as_mut() else {
        return SmallVec::new();
    };
    if !routes.select(index) {
        tracing::warn!(index, available = routes.len(), "Route selection out of range");
        return SmallVec::new();
    }

    tracing::debug!(index, "Alternative route promoted");
    env.emit(DomainEvent::RouteBuilt(routes_json(routes)));
    SmallVec::new()
}

// ============================================================================
// Route results
// ============================================================================

fn route_calculated(
    state: &mut TripState,
    generation: u64,
    intent: RouteIntent,
    result: RouteResult,
    env: &TripEnvironment,
) -> Effects {
    let Some(pending) = state.pending.filter(|p| p.generation == generation && p.intent == intent) else {
        tracing::debug!(generation, outcome = result.label(), "Dropping stale route result");
        return SmallVec::new();
    };
    state.pending = None;

    match pending.intent {
        RouteIntent::Build => route_built(state, result, env),
        RouteIntent::Reroute => rerouted(state, result, env),
        RouteIntent::AddWaypoints { correlation } => waypoints_routed(state, correlation, result, env),
    }
}

fn route_built(state: &mut TripState, result: RouteResult, env: &TripEnvironment) -> Effects {
    match result {
        RouteResult::Success(routes) => {
            let json = routes_json(&routes);
            state.routes = Some(routes);
            state.leg_index = 0;
            state.leg_base = 0;
            state.last_progress = None;
            env.emit(DomainEvent::RouteBuilt(json));
            transition(state, SessionState::Ready);
        },
        RouteResult::Failure(failure) => {
            env.emit(DomainEvent::RouteBuildFailed(failure));
            transition(state, SessionState::Failed);
            reset_session(state);
            transition(state, SessionState::Idle);
        },
        RouteResult::Cancelled => {
            env.emit(DomainEvent::RouteBuildCancelled);
            reset_session(state);
            transition(state, SessionState::Idle);
        },
    }
    SmallVec::new()
}

fn rerouted(state: &mut TripState, result: RouteResult, env: &TripEnvironment) -> Effects {
    let mode = state.active_mode.unwrap_or(GuidanceMode::Live);
    match result {
        RouteResult::Success(routes) => {
            let json = routes_json(&routes);
            state.routes = Some(routes);
            state.leg_base += state.leg_index;
            state.leg_index = 0;
            state.last_progress = None;
            env.emit(DomainEvent::RerouteAlong(json));
            transition(state, SessionState::Guiding { mode });
            smallvec![attach_feed(state, env, mode)]
        },
        RouteResult::Failure(failure) => {
            tracing::warn!(failure = %failure, "Reroute failed, keeping the previous route");
            env.emit(DomainEvent::RouteBuildFailed(failure));
            transition(state, SessionState::Guiding { mode });
            SmallVec::new()
        },
        RouteResult::Cancelled => {
            transition(state, SessionState::Guiding { mode });
            SmallVec::new()
        },
    }
}

fn waypoints_routed(
    state: &mut TripState,
    correlation: Uuid,
    result: RouteResult,
    env: &TripEnvironment,
) -> Effects {
    let candidate = state.pending_insert.take();
    let mut effects = Effects::new();

    let outcome = match (result, candidate) {
        (RouteResult::Success(routes), Some(candidate)) => {
            let json = routes_json(&routes);
            state.waypoints = candidate;
            state.routes = Some(routes);
            state.leg_base += state.leg_index;
            state.leg_index = 0;
            state.last_progress = None;
            env.emit(DomainEvent::RouteBuilt(json));

            let mode = state.active_mode.unwrap_or(GuidanceMode::Live);
            effects.push(attach_feed(state, env, mode));
            Ok(())
        },
        (RouteResult::Failure(failure), _) => {
            tracing::info!(failure = %failure, "Route through added waypoints failed, guidance unchanged");
            Err(AddWaypointsError::Route(failure))
        },
        (RouteResult::Success(_) | RouteResult::Cancelled, _) => Err(AddWaypointsError::Superseded),
    };

    effects.push(settle(correlation, outcome));
    effects
}

// ============================================================================
// Location signals
// ============================================================================

fn location(state: &mut TripState, feed: Option<u64>, signal: LocationSignal, env: &TripEnvironment) -> Effects {
    if feed.is_some() && feed != state.feed {
        tracing::trace!(?feed, current = ?state.feed, "Dropping signal from a detached feed");
        return SmallVec::new();
    }

    match signal {
        LocationSignal::Progress(snapshot) => progress(state, snapshot, env),
        LocationSignal::OffRoute { coordinate } => off_route(state, coordinate, env),
        LocationSignal::Arrival { leg_index } => arrival(state, leg_index, env),
    }
}

fn progress(state: &mut TripState, snapshot: ProgressSnapshot, env: &TripEnvironment) -> Effects {
    if state.phase.is_guiding() {
        state.last_coordinate = Some(snapshot.coordinate);
    }
    if !matches!(state.phase, SessionState::Guiding { .. }) {
        return SmallVec::new();
    }

    // No-op once the trip's single attempt was made
    begin_recording(state, env);

    let legs = state.routes.as_ref().map_or(0, |r| r.primary().leg_count());
    if snapshot.leg_index < state.leg_index || snapshot.leg_index >= legs.max(1) {
        tracing::trace!(leg = snapshot.leg_index, current = state.leg_index, "Dropping out-of-leg progress");
        return SmallVec::new();
    }
    let mut effects = Effects::new();
    if snapshot.leg_index > state.leg_index {
        state.leg_index = snapshot.leg_index;
        state.last_progress = None;
        effects.extend(supersede_pending(state, env));
    }

    let distance_remaining = match state.last_progress {
        Some(last) if last.leg_index == snapshot.leg_index => last.distance_remaining.min(snapshot.distance_remaining),
        _ => snapshot.distance_remaining,
    };
    state.last_progress = Some(LegProgress {
        leg_index: snapshot.leg_index,
        distance_remaining,
    });

    env.emit(DomainEvent::ProgressUpdate {
        distance_remaining,
        duration_remaining: snapshot.duration_remaining,
        leg_index: snapshot.leg_index,
    });
    effects
}

fn off_route(state: &mut TripState, coordinate: Coordinate, env: &TripEnvironment) -> Effects {
    if state.phase.is_guiding() {
        state.last_coordinate = Some(coordinate);
    }
    if !matches!(state.phase, SessionState::Guiding { .. }) {
        tracing::trace!(state = %state.phase, "Off-route signal ignored");
        return SmallVec::new();
    }

    env.emit(DomainEvent::UserOffRoute);

    let mut effects = Effects::new();
    effects.extend(abandon_pending(state));

    let remaining = state.waypoints.remaining_after_leg(state.trip_leg());
    match RouteRequest::new(remaining.starting_from(current_location(coordinate)), state.options.clone()) {
        Ok(request) => {
            transition(state, SessionState::Rerouting);
            effects.push(request_route(state, env, request, RouteIntent::Reroute));
        },
        Err(error) => {
            tracing::warn!(error = %error, "Nothing left to reroute to");
        },
    }
    effects
}

fn arrival(state: &mut TripState, leg_index: usize, env: &TripEnvironment) -> Effects {
    if !state.phase.is_guiding() {
        tracing::trace!(state = %state.phase, leg_index, "Arrival ignored");
        return SmallVec::new();
    }
    if leg_index < state.leg_index {
        tracing::debug!(leg_index, current = state.leg_index, "Duplicate arrival ignored");
        return SmallVec::new();
    }

    // Reaching a stop settles any route still being calculated from an earlier leg
    let mut effects = Effects::new();
    effects.extend(supersede_pending(state, env));
    if state.phase == SessionState::Rerouting {
        tracing::debug!(leg_index, "Arrival during reroute, keeping the current route");
        let mode = state.active_mode.unwrap_or(GuidanceMode::Live);
        transition(state, SessionState::Guiding { mode });
    }

    let is_final = state
        .routes
        .as_ref()
        .is_none_or(|routes| routes.primary().is_final_leg(leg_index));
    if !is_final {
        env.emit(DomainEvent::WaypointArrival { leg_index });
        state.leg_index = leg_index + 1;
        state.last_progress = None;
        return effects;
    }

    env.emit(DomainEvent::OnArrival { is_final: true });
    detach_feed(state, env);
    transition(state, SessionState::Arrived);

    match stop_recording(state, env) {
        Some(effect) => effects.push(effect),
        None => finish(state, env),
    }
    effects
}

fn recording_finished(
    state: &mut TripState,
    trip: u64,
    outcome: Result<HistoryRecord, String>,
    env: &TripEnvironment,
) -> Effects {
    match outcome {
        Ok(record) => env.emit(DomainEvent::HistoryRecordingStopped {
            file_path: record.file_path,
        }),
        Err(message) => {
            tracing::warn!(message = %message, "History recording failed to stop");
            env.emit(DomainEvent::HistoryRecordingError { message });
        },
    }

    if state.phase == SessionState::Arrived && trip == state.trip {
        finish(state, env);
    }
    SmallVec::new()
}

// ============================================================================
// Helpers
// ============================================================================

fn transition(state: &mut TripState, to: SessionState) {
    if state.phase != to {
        tracing::debug!(from = %state.phase, to = %to, "Session transition");
    }
    state.phase = to;
}

const fn mode_label(mode: GuidanceMode) -> &'static str {
    match mode {
        GuidanceMode::Live => "live",
        GuidanceMode::Simulated => "simulated",
    }
}

fn current_location(coordinate: Coordinate) -> Waypoint {
    Waypoint::new(CURRENT_LOCATION, coordinate)
}

fn routes_json(routes: &RouteSet) -> String {
    routes.to_json().unwrap_or_else(|error| {
        tracing::warn!(error = %error, "Failed to serialize routes");
        String::from("{}")
    })
}

fn settle(correlation: Uuid, outcome: Result<(), AddWaypointsError>) -> Effect<TripAction> {
    reply!(TripAction::AddWaypointsSettled { correlation, outcome })
}

/// Issue a route request tagged with a fresh generation
fn request_route(
    state: &mut TripState,
    env: &TripEnvironment,
    request: RouteRequest,
    intent: RouteIntent,
) -> Effect<TripAction> {
    state.request_generation += 1;
    let generation = state.request_generation;
    state.pending = Some(PendingRequest { generation, intent });

    let coordinator = Arc::clone(&env.coordinator);
    async_effect! {
        let result = coordinator.calculate(request).await;
        Some(TripAction::RouteCalculated { generation, intent, result })
    }
}

/// Forget the outstanding request, answering a waiting `add_waypoints` caller
fn abandon_pending(state: &mut TripState) -> Option<Effect<TripAction>> {
    state.pending_insert = None;
    match state.pending.take()?.intent {
        RouteIntent::AddWaypoints { correlation } => {
            Some(settle(correlation, Err(AddWaypointsError::Superseded)))
        },
        RouteIntent::Build | RouteIntent::Reroute => None,
    }
}

/// Abort the outstanding request because the user moved past the leg it was issued for
fn supersede_pending(state: &mut TripState, env: &TripEnvironment) -> Option<Effect<TripAction>> {
    let pending = state.pending?;
    tracing::debug!(
        generation = pending.generation,
        trip_leg = state.trip_leg(),
        "Leg advanced, superseding route request"
    );
    env.coordinator.cancel_in_flight();
    abandon_pending(state)
}

/// Subscribe the producer for `mode` to the primary route
fn attach_feed(state: &mut TripState, env: &TripEnvironment, mode: GuidanceMode) -> Effect<TripAction> {
    let Some(routes) = state.routes.as_ref() else {
        return Effect::None;
    };

    let (feed, handle) = futures::stream::abortable(env.location_for(mode).subscribe(routes.primary()));
    env.feeds.attach(handle);
    state.feed_generation += 1;
    let id = state.feed_generation;
    state.feed = Some(id);
    tracing::debug!(feed = id, ?mode, "Location feed attached");

    stream_effect!(feed.map(move |signal| TripAction::Location {
        feed: Some(id),
        signal,
    }))
}

fn detach_feed(state: &mut TripState, env: &TripEnvironment) {
    if let Some(id) = state.feed.take() {
        tracing::debug!(feed = id, "Location feed detached");
    }
    env.feeds.detach();
}

fn begin_recording(state: &mut TripState, env: &TripEnvironment) {
    let outcome = state.recording.start_if_enabled(
        state.trip,
        &env.config.history,
        env.recorder.as_ref(),
        env.clock.now(),
    );
    match outcome {
        Ok(StartOutcome::Started { session_id, .. }) => {
            env.emit(DomainEvent::HistoryRecordingStarted { id: session_id });
        },
        Ok(outcome) => tracing::trace!(?outcome, "Recording not started"),
        Err(error) => {
            tracing::warn!(error = %error, "History recording failed to start");
            env.emit(DomainEvent::HistoryRecordingError {
                message: error.to_string(),
            });
        },
    }
}

fn stop_recording(state: &mut TripState, env: &TripEnvironment) -> Option<Effect<TripAction>> {
    let start_name = state.waypoints.first().map_or("", |w| w.name.as_str());
    let end_name = state.waypoints.last().map_or("", |w| w.name.as_str());
    let pending = state.recording.stop(start_name, end_name, state.options.profile)?;

    let trip = state.trip;
    let recorder = Arc::clone(&env.recorder);
    let history = Arc::clone(&env.history);
    let clock = Arc::clone(&env.clock);
    Some(async_effect! {
        let outcome = pending
            .complete(recorder, history, clock)
            .await
            .map_err(|error| error.to_string());
        Some(TripAction::RecordingFinished { trip, outcome })
    })
}

/// Emit the end of a completed session and return to `Idle`
fn finish(state: &mut TripState, env: &TripEnvironment) {
    env.emit(DomainEvent::NavigationFinished);
    reset_session(state);
    transition(state, SessionState::Idle);
}

/// Cancel whatever is active and return to `Idle`
fn teardown(state: &mut TripState, env: &TripEnvironment, effects: &mut Effects) {
    if state.phase == SessionState::Building {
        env.emit(DomainEvent::RouteBuildCancelled);
    }
    if state.pending.is_some() {
        env.coordinator.cancel_in_flight();
    }
    state.request_generation += 1;
    effects.extend(abandon_pending(state));
    detach_feed(state, env);
    effects.extend(stop_recording(state, env));

    env.emit(DomainEvent::NavigationCancelled);
    transition(state, SessionState::Cancelled);
    reset_session(state);
    transition(state, SessionState::Idle);
}

fn reset_session(state: &mut TripState) {
    state.waypoints.clear();
    state.routes = None;
    state.leg_index = 0;
    state.leg_base = 0;
    state.last_progress = None;
    state.last_coordinate = None;
    state.pending = None;
    state.pending_insert = None;
    state.active_mode = None;
    state.feed = None;
}
