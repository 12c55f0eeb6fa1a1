//! History recording: the recording lifecycle and the summary store.

pub mod lifecycle;
pub mod store;

pub use lifecycle::{PendingStop, RecordingLifecycle, StartOutcome};
pub use store::{CAPTURE_EXTENSION, HistorySummaryStore, ReconcileReport, SUMMARY_FILE_NAME};

use crate::route::RouteProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of one recorded guidance session
///
/// Created when a recording stops successfully and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Record id, equal to the recording session id
    pub id: Uuid,
    /// Path of the recorded file
    pub file_path: String,
    /// When recording started
    pub start_time: DateTime<Utc>,
    /// Recording length in whole seconds
    pub duration_seconds: u64,
    /// Name of the first waypoint
    pub start_point_name: String,
    /// Name of the last waypoint
    pub end_point_name: String,
    /// Travel profile of the session
    pub mode: RouteProfile,
}
