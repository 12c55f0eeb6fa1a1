//! Offline routing service drawing great-circle legs between waypoints.

use super::routing::{RoutingError, RoutingFuture, RoutingService};
use crate::route::{Route, RouteLeg, RouteRequest};
use crate::waypoint::Waypoint;
use std::time::Duration;

/// Extra distance of the generated alternative route
const ALTERNATIVE_DETOUR: f64 = 1.15;

/// Routing service that connects waypoints with straight lines
///
/// Leg distance is the sum of great-circle segments through any silent
/// waypoints between two leg boundaries; duration follows the profile's
/// average speed. When alternatives are requested a longer detour is returned
/// as a second candidate.
#[derive(Debug, Clone, Default)]
pub struct StraightLineRouter {
    latency: Duration,
}

impl StraightLineRouter {
    /// Router answering immediately
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Simulate network latency before answering
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn build(request: &RouteRequest, detour: f64) -> Route {
        let waypoints: Vec<&Waypoint> = request.waypoints().iter().collect();
        let boundaries = request.waypoints().leg_boundaries();
        let speed = request.profile().average_speed_mps();

        let legs = boundaries
            .windows(2)
            .map(|pair| {
                let (start, end) = (pair[0], pair[1]);
                let distance: f64 = waypoints[start..=end]
                    .windows(2)
                    .map(|seg| seg[0].coordinate.distance_to(&seg[1].coordinate))
                    .sum::<f64>()
                    * detour;
                RouteLeg {
                    from: waypoints[start].coordinate,
                    to: waypoints[end].coordinate,
                    distance_meters: distance,
                    duration_seconds: distance / speed,
                }
            })
            .collect();

        Route::from_legs(legs, request.waypoints().as_coordinate_list())
    }
}

impl RoutingService for StraightLineRouter {
    fn calculate_route(&self, request: RouteRequest) -> RoutingFuture<'_> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if request.waypoints().len() < 2 {
                return Err(RoutingError::with_status(422, "at least two waypoints are required"));
            }

            let mut routes = vec![Self::build(&request, 1.0)];
            if request.options().alternatives {
                routes.push(Self::build(&request, ALTERNATIVE_DETOUR));
            }
            tracing::trace!(candidates = routes.len(), "Straight-line routes built");
            Ok(routes)
        })
    }
}
