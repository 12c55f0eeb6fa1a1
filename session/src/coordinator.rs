//! Route request coordination.
//!
//! The coordinator tracks exactly one in-flight route calculation. Issuing a
//! new request aborts the pending one, which then resolves to
//! [`RouteResult::Cancelled`]. Transport errors are classified totally into a
//! [`RouteFailureReason`]: status code first, then message heuristics, else
//! `Unknown`.

use crate::capabilities::routing::{RoutingError, RoutingService};
use crate::route::{RouteFailure, RouteFailureReason, RouteRequest, RouteResult, RouteSet};
use futures::future::{AbortHandle, Abortable};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Message substrings mapped to a reason, checked in order
const MESSAGE_HINTS: &[(&str, RouteFailureReason)] = &[
    ("unauthorized", RouteFailureReason::Unauthorized),
    ("forbidden", RouteFailureReason::Unauthorized),
    ("access token", RouteFailureReason::Unauthorized),
    ("timed out", RouteFailureReason::Timeout),
    ("timeout", RouteFailureReason::Timeout),
    ("no route", RouteFailureReason::NoRoute),
    ("noroute", RouteFailureReason::NoRoute),
    ("not found", RouteFailureReason::NoRoute),
    ("network", RouteFailureReason::Network),
    ("connection", RouteFailureReason::Network),
    ("offline", RouteFailureReason::Network),
    ("unreachable", RouteFailureReason::Network),
    ("dns", RouteFailureReason::Network),
];

/// Classify a raw routing error
#[must_use]
pub fn classify(error: &RoutingError) -> RouteFailure {
    let by_status = error.status.and_then(|status| match status {
        401 | 403 => Some(RouteFailureReason::Unauthorized),
        404 | 422 => Some(RouteFailureReason::NoRoute),
        408 | 504 => Some(RouteFailureReason::Timeout),
        502 | 503 => Some(RouteFailureReason::Network),
        _ => None,
    });

    let reason = by_status.unwrap_or_else(|| {
        let message = error.message.to_ascii_lowercase();
        MESSAGE_HINTS
            .iter()
            .find(|(hint, _)| message.contains(hint))
            .map_or(RouteFailureReason::Unknown, |(_, reason)| *reason)
    });

    RouteFailure::new(reason, error.message.clone())
}

struct InFlight {
    ticket: u64,
    abort: AbortHandle,
}

/// Issues route calculations one at a time
pub struct RouteRequestCoordinator {
    service: Arc<dyn RoutingService>,
    timeout: Duration,
    in_flight: Mutex<Option<InFlight>>,
    next_ticket: AtomicU64,
}

impl RouteRequestCoordinator {
    /// Creates a coordinator over `service` with a per-request timeout
    #[must_use]
    pub fn new(service: Arc<dyn RoutingService>, timeout: Duration) -> Self {
        Self {
            service,
            timeout,
            in_flight: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Calculate routes, superseding any pending request
    ///
    /// With `alternatives` off only the first candidate is kept. An empty
    /// candidate list is `Failure(NoRoute)`; an elapsed timeout is
    /// `Failure(Timeout)`.
    #[tracing::instrument(skip(self, request), fields(waypoints = request.waypoints().len()))]
    pub async fn calculate(&self, request: RouteRequest) -> RouteResult {
        let (abort, registration) = AbortHandle::new_pair();
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = in_flight.replace(InFlight { ticket, abort }) {
                tracing::debug!(superseded = previous.ticket, ticket, "Aborting superseded route request");
                previous.abort.abort();
            }
        }

        metrics::counter!("trip.routes.requested").increment(1);
        let alternatives = request.options().alternatives;
        let call = Abortable::new(self.service.calculate_route(request.clone()), registration);
        let outcome = tokio::time::timeout(self.timeout, call).await;
        self.release(ticket);

        let result = match outcome {
            Err(_) => RouteResult::Failure(RouteFailure::new(
                RouteFailureReason::Timeout,
                format!("route request timed out after {:?}", self.timeout),
            )),
            Ok(Err(_aborted)) => RouteResult::Cancelled,
            Ok(Ok(Err(error))) => RouteResult::Failure(classify(&error)),
            Ok(Ok(Ok(mut routes))) => {
                if !alternatives {
                    routes.truncate(1);
                }
                RouteSet::new(routes, request).map_or_else(
                    || RouteResult::Failure(RouteFailure::new(RouteFailureReason::NoRoute, "no route found")),
                    RouteResult::Success,
                )
            },
        };

        match &result {
            RouteResult::Failure(failure) => {
                tracing::warn!(reason = %failure.reason, message = %failure.message, "Route calculation failed");
                metrics::counter!("trip.routes.failed", "reason" => failure.reason.as_str()).increment(1);
            },
            RouteResult::Success(set) => {
                tracing::debug!(candidates = set.len(), "Route calculated");
            },
            RouteResult::Cancelled => {
                tracing::debug!(ticket, "Route request cancelled");
            },
        }
        result
    }

    /// Abort the pending request, if any
    ///
    /// Returns `true` when a request was aborted.
    pub fn cancel_in_flight(&self) -> bool {
        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        previous.is_some_and(|in_flight| {
            in_flight.abort.abort();
            true
        })
    }

    /// Whether a request is pending
    #[must_use]
    pub fn has_in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn release(&self, ticket: u64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|current| current.ticket == ticket) {
            *in_flight = None;
        }
    }
}

impl std::fmt::Debug for RouteRequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRequestCoordinator")
            .field("timeout", &self.timeout)
            .field("in_flight", &self.has_in_flight())
            .finish_non_exhaustive()
    }
}
