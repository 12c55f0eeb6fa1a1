//! Injected dependencies of the trip reducer.

use crate::capabilities::location::LocationProducer;
use crate::capabilities::recording::HistoryRecorder;
use crate::config::TripConfig;
use crate::coordinator::RouteRequestCoordinator;
use crate::events::DomainEvent;
use crate::history::HistorySummaryStore;
use futures::stream::AbortHandle;
use std::sync::{Arc, Mutex, PoisonError};
use trip_core::EventBridge;
use trip_core::environment::Clock;

use super::types::GuidanceMode;

/// Abort handle of the attached location feed
///
/// Holds at most one feed; attaching a new one aborts the previous feed.
#[derive(Debug, Default)]
pub struct FeedSlot {
    current: Mutex<Option<AbortHandle>>,
}

impl FeedSlot {
    /// Track a new feed, aborting the previous one
    pub fn attach(&self, handle: AbortHandle) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Abort the attached feed; `false` when none was attached
    pub fn detach(&self) -> bool {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        previous.is_some_and(|handle| {
            handle.abort();
            true
        })
    }

    /// Whether a feed is attached
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_aborted())
    }
}

/// Environment of [`TripReducer`](super::TripReducer)
///
/// Cheap to clone; every dependency is shared.
#[derive(Clone)]
pub struct TripEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Route calculation
    pub coordinator: Arc<RouteRequestCoordinator>,
    /// Producer for live guidance
    pub live_location: Arc<dyn LocationProducer>,
    /// Producer for simulated guidance
    pub simulated_location: Arc<dyn LocationProducer>,
    /// History capture
    pub recorder: Arc<dyn HistoryRecorder>,
    /// History summaries
    pub history: Arc<HistorySummaryStore>,
    /// Outbound events
    pub events: EventBridge<DomainEvent>,
    /// Attached location feed
    pub feeds: Arc<FeedSlot>,
    /// Configuration
    pub config: Arc<TripConfig>,
}

impl TripEnvironment {
    /// Producer for `mode`
    #[must_use]
    pub fn location_for(&self, mode: GuidanceMode) -> &dyn LocationProducer {
        match mode {
            GuidanceMode::Live => self.live_location.as_ref(),
            GuidanceMode::Simulated => self.simulated_location.as_ref(),
        }
    }

    /// Publish an event
    pub fn emit(&self, event: DomainEvent) {
        tracing::trace!(event = event.event_type(), "Emitting event");
        self.events.emit(event);
    }
}

impl std::fmt::Debug for TripEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripEnvironment")
            .field("coordinator", &self.coordinator)
            .field("history", &self.history)
            .field("events", &self.events)
            .field("feeds", &self.feeds)
            .finish_non_exhaustive()
    }
}
