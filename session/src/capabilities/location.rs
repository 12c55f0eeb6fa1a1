//! Location/progress producer capability.
//!
//! A producer is subscribed when guidance starts and yields a stream of
//! [`LocationSignal`]s for the active route. The subscription ends when the
//! session leaves guidance.

use crate::route::Route;
use crate::waypoint::Coordinate;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use trip_core::EventBridge;

/// Progress along the active route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Meters left on the whole route
    pub distance_remaining: f64,
    /// Seconds left on the whole route
    pub duration_remaining: f64,
    /// Leg currently travelled
    pub leg_index: usize,
    /// Current position
    pub coordinate: Coordinate,
}

/// Signal emitted by a location producer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LocationSignal {
    /// Progress update
    Progress(ProgressSnapshot),
    /// The user left the route
    OffRoute {
        /// Position where the deviation was detected
        coordinate: Coordinate,
    },
    /// The user reached the end of a leg
    Arrival {
        /// Leg that was completed
        leg_index: usize,
    },
}

/// Stream of signals for one guidance session
pub type LocationFeed = Pin<Box<dyn Stream<Item = LocationSignal> + Send>>;

/// Source of location signals
pub trait LocationProducer: Send + Sync {
    /// Start producing signals for `route`
    ///
    /// Dropping the returned feed ends the subscription.
    fn subscribe(&self, route: &Route) -> LocationFeed;
}

/// Producer driven by an external adapter pushing signals
///
/// Clones share one feed; a new subscription replaces the previous one.
#[derive(Debug, Clone, Default)]
pub struct ChannelLocationProducer {
    bridge: EventBridge<LocationSignal>,
}

impl ChannelLocationProducer {
    /// Creates a producer with no subscriber
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a signal to the active feed
    ///
    /// Returns `false` when nothing is subscribed (not guiding).
    pub fn push(&self, signal: LocationSignal) -> bool {
        self.bridge.emit(signal)
    }

    /// Whether a guidance session is currently subscribed
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.bridge.has_subscriber()
    }
}

impl LocationProducer for ChannelLocationProducer {
    fn subscribe(&self, route: &Route) -> LocationFeed {
        tracing::debug!(legs = route.leg_count(), "Location feed subscribed");
        Box::pin(self.bridge.subscribe())
    }
}
