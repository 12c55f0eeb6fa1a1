//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` variants from
//! async blocks, streams and timers.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use trip_core::async_effect;
///
/// async_effect! {
///     let result = coordinator.calculate(request).await;
///     Some(TripAction::RouteCalculated { generation, result })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Future` that immediately feeds back an action
///
/// Useful when a command must be answered through the action stream
/// (request/response callers waiting on a terminal action).
///
/// # Example
///
/// ```rust,ignore
/// use trip_core::reply;
///
/// reply!(TripAction::Rejected { correlation })
/// ```
#[macro_export]
macro_rules! reply {
    ($action:expr) => {
        $crate::effect::Effect::Future(::std::boxed::Box::pin(::std::future::ready(
            ::std::option::Option::Some($action),
        )))
    };
}

/// Create an `Effect::Stream` from any `Stream<Item = Action>`
///
/// # Example
///
/// ```rust,ignore
/// use trip_core::stream_effect;
///
/// stream_effect!(feed.map(|signal| TripAction::Location { trip, signal }))
/// ```
#[macro_export]
macro_rules! stream_effect {
    ($stream:expr) => {
        $crate::effect::Effect::Stream(::std::boxed::Box::pin($stream))
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use trip_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(30),
///     action: TripAction::Tick
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
