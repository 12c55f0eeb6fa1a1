//! Trip session: state, actions, environment and the reducer driving them.

pub mod environment;
pub mod reducer;
pub mod types;

pub use environment::{FeedSlot, TripEnvironment};
pub use reducer::{CURRENT_LOCATION, TripReducer};
pub use types::{
    GuidanceMode, LegProgress, PendingRequest, RouteIntent, SessionState, TripAction, TripState,
};
