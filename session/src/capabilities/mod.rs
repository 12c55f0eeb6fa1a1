//! External collaborators the session depends on.
//!
//! Each capability is a trait injected through the
//! [`TripEnvironment`](crate::session::TripEnvironment), with a production
//! implementation next to it and offline implementations for demos and tests.

pub mod fs;
pub mod location;
pub mod recording;
pub mod routing;
pub mod simulated;
pub mod straight_line;

pub use fs::{FileSystem, LocalFileSystem};
pub use location::{ChannelLocationProducer, LocationFeed, LocationProducer, LocationSignal, ProgressSnapshot};
pub use recording::{FileHistoryRecorder, HistoryRecorder};
pub use routing::{RoutingError, RoutingService};
pub use simulated::SimulatedLocationProducer;
pub use straight_line::StraightLineRouter;
