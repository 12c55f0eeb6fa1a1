//! Simulated location producer used for `Guiding { Simulated }`.

use super::location::{LocationFeed, LocationProducer, LocationSignal, ProgressSnapshot};
use crate::route::Route;
use std::time::Duration;

/// Slowest speed the simulation will move at
const MIN_SPEED_MPS: f64 = 0.1;

/// Drives a virtual position along the active route
///
/// Every tick the position advances `speed * tick` meters along the current
/// leg and a progress snapshot is emitted; reaching a leg's end emits an
/// arrival for that leg. Without an explicit speed the route's own average
/// speed is used.
#[derive(Debug, Clone)]
pub struct SimulatedLocationProducer {
    tick: Duration,
    speed_mps: Option<f64>,
}

impl SimulatedLocationProducer {
    /// Creates a producer ticking every `tick`
    #[must_use]
    pub const fn new(tick: Duration) -> Self {
        Self {
            tick,
            speed_mps: None,
        }
    }

    /// Fix the simulated speed
    #[must_use]
    pub const fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    fn speed_for(&self, route: &Route) -> f64 {
        let route_speed = if route.duration_seconds > 0.0 {
            route.distance_meters / route.duration_seconds
        } else {
            MIN_SPEED_MPS
        };
        self.speed_mps.unwrap_or(route_speed).max(MIN_SPEED_MPS)
    }
}

impl Default for SimulatedLocationProducer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl LocationProducer for SimulatedLocationProducer {
    fn subscribe(&self, route: &Route) -> LocationFeed {
        let route = route.clone();
        let speed = self.speed_for(&route);
        let tick = self.tick.max(Duration::from_millis(1));
        let step = speed * tick.as_secs_f64();
        tracing::debug!(speed, ?tick, legs = route.leg_count(), "Simulation started");

        Box::pin(async_stream::stream! {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut completed = 0.0_f64;
            for (leg_index, leg) in route.legs.iter().enumerate() {
                let mut travelled = 0.0_f64;
                loop {
                    interval.tick().await;
                    travelled = (travelled + step).min(leg.distance_meters);

                    let fraction = if leg.distance_meters > 0.0 {
                        travelled / leg.distance_meters
                    } else {
                        1.0
                    };
                    let remaining = (route.distance_meters - completed - travelled).max(0.0);

                    yield LocationSignal::Progress(ProgressSnapshot {
                        distance_remaining: remaining,
                        duration_remaining: remaining / speed,
                        leg_index,
                        coordinate: leg.from.interpolate(&leg.to, fraction),
                    });

                    if travelled >= leg.distance_meters {
                        break;
                    }
                }
                completed += leg.distance_meters;
                yield LocationSignal::Arrival { leg_index };
            }
        })
    }
}
