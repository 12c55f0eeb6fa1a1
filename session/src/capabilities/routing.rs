//! Routing service capability.

use crate::route::{Route, RouteRequest};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Future returned by [`RoutingService::calculate_route`]
pub type RoutingFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Route>, RoutingError>> + Send + 'a>>;

/// Raw transport error from a routing service
///
/// Classified by the [`RouteRequestCoordinator`](crate::RouteRequestCoordinator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RoutingError {
    /// HTTP-like status code, when the transport has one
    pub status: Option<u16>,
    /// Error message
    pub message: String,
}

impl RoutingError {
    /// Error without a status code
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Error with a status code
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Directions service that calculates candidate routes
///
/// Candidates come back primary first. An empty list means no route exists.
pub trait RoutingService: Send + Sync {
    /// Calculate routes for a request
    ///
    /// # Errors
    ///
    /// Returns a [`RoutingError`] describing the transport failure.
    fn calculate_route(&self, request: RouteRequest) -> RoutingFuture<'_>;
}
