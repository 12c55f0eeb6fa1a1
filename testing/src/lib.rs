//! # Trip Testing
//!
//! Testing utilities and helpers for the trip orchestrator.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - The `ReducerTest` Given/When/Then harness and effect assertions
//! - Helpers for waiting on an `EventSubscription`
//! - One-line tracing setup for tests
//!
//! ## Example
//!
//! ```ignore
//! use trip_testing::{events, test_clock};
//!
//! #[tokio::test]
//! async fn test_route_build() {
//!     let orchestrator = test_orchestrator(test_clock());
//!     let mut subscription = orchestrator.subscribe();
//!     orchestrator.submit(waypoints, options).await?;
//!     let seen = events::collect_until(&mut subscription, |e| e.is_terminal(), TIMEOUT).await;
//! }
//! ```

use chrono::{DateTime, Utc};
use trip_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use trip_testing::mocks::FixedClock;
    /// use trip_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Used for durations (recording length) that must be asserted exactly.
    ///
    /// ```
    /// use trip_testing::mocks::ManualClock;
    /// use trip_core::environment::Clock;
    ///
    /// let clock = ManualClock::starting_at(trip_testing::test_time());
    /// let before = clock.now();
    /// clock.advance(chrono::Duration::seconds(90));
    /// assert_eq!((clock.now() - before).num_seconds(), 90);
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub const fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The reference instant used by test clocks (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Helpers for consuming an event subscription in async tests
pub mod events {
    use futures::{Stream, StreamExt};
    use std::time::Duration;

    /// Wait for the next event, giving up after `timeout`
    pub async fn next_within<S, E>(stream: &mut S, timeout: Duration) -> Option<E>
    where
        S: Stream<Item = E> + Unpin,
    {
        tokio::time::timeout(timeout, stream.next())
            .await
            .ok()
            .flatten()
    }

    /// Collect events until one matches `stop` (inclusive) or `timeout` elapses
    ///
    /// The timeout applies to the whole collection, not per event.
    pub async fn collect_until<S, E, F>(stream: &mut S, stop: F, timeout: Duration) -> Vec<E>
    where
        S: Stream<Item = E> + Unpin,
        F: Fn(&E) -> bool,
    {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, stream.next()).await {
                Ok(Some(event)) => {
                    let done = stop(&event);
                    seen.push(event);
                    if done {
                        return seen;
                    }
                },
                Ok(None) | Err(_) => return seen,
            }
        }
    }

    /// Collect whatever arrives within `window`
    pub async fn collect_for<S, E>(stream: &mut S, window: Duration) -> Vec<E>
    where
        S: Stream<Item = E> + Unpin,
    {
        collect_until(stream, |_| false, window).await
    }
}

/// Install a test tracing subscriber honouring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock, test_time};
