//! Start/stop guard around the history recorder.
//!
//! The lifecycle lives inside the session state, so it is only ever touched
//! on the store's serialized execution context. Starting is attempted at most
//! once per trip; stopping hands back a [`PendingStop`] whose completion runs
//! as an effect.

use super::{CAPTURE_EXTENSION, HistoryRecord, HistorySummaryStore};
use crate::capabilities::recording::HistoryRecorder;
use crate::config::HistoryConfig;
use crate::error::RecordingError;
use crate::route::RouteProfile;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use trip_core::environment::Clock;
use uuid::Uuid;

/// Placeholder for a blank start name
pub const UNKNOWN_START: &str = "Unknown Start";

/// Placeholder for a blank end name
pub const UNKNOWN_END: &str = "Unknown End";

/// Result of [`RecordingLifecycle::start_if_enabled`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new recording session started
    Started {
        /// Recording session id
        session_id: Uuid,
        /// Capture file
        file_path: PathBuf,
    },
    /// Already recording; nothing changed
    AlreadyRecording,
    /// This trip already had its one attempt
    AlreadyAttempted,
    /// Recording is switched off
    Disabled,
}

/// Recording guard: `is_recording` plus the current session id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingLifecycle {
    is_recording: bool,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    file_path: Option<PathBuf>,
    attempted_trip: Option<u64>,
}

impl RecordingLifecycle {
    /// Whether a recording is running
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Id of the running recording
    #[must_use]
    pub const fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Start recording `trip` if enabled and not yet attempted
    ///
    /// A no-op while recording. A failed start still counts as the trip's
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns the recorder's [`RecordingError`] when the capture cannot start.
    pub fn start_if_enabled(
        &mut self,
        trip: u64,
        config: &HistoryConfig,
        recorder: &dyn HistoryRecorder,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome, RecordingError> {
        if self.is_recording {
            return Ok(StartOutcome::AlreadyRecording);
        }
        if self.attempted_trip == Some(trip) {
            return Ok(StartOutcome::AlreadyAttempted);
        }
        self.attempted_trip = Some(trip);

        if !config.enabled {
            return Ok(StartOutcome::Disabled);
        }

        let session_id = Uuid::new_v4();
        let file_path = config.directory.join(format!("{session_id}.{CAPTURE_EXTENSION}"));
        let handles = recorder.start_recording(&file_path)?;
        tracing::info!(%session_id, path = %file_path.display(), handles = handles.len(), "History recording started");

        self.is_recording = true;
        self.session_id = Some(session_id);
        self.started_at = Some(now);
        self.file_path = Some(file_path.clone());

        Ok(StartOutcome::Started {
            session_id,
            file_path,
        })
    }

    /// Stop recording, `None` when nothing is recording
    ///
    /// Blank names are replaced with [`UNKNOWN_START`] / [`UNKNOWN_END`].
    pub fn stop(&mut self, start_name: &str, end_name: &str, mode: RouteProfile) -> Option<PendingStop> {
        if !self.is_recording {
            return None;
        }
        self.is_recording = false;

        let (Some(session_id), Some(started_at), Some(file_path)) =
            (self.session_id.take(), self.started_at.take(), self.file_path.take())
        else {
            tracing::warn!("Recording flag set without a session, resetting");
            return None;
        };

        Some(PendingStop {
            session_id,
            started_at,
            file_path,
            start_point_name: placeholder(start_name, UNKNOWN_START),
            end_point_name: placeholder(end_name, UNKNOWN_END),
            mode,
        })
    }
}

fn placeholder(name: &str, fallback: &str) -> String {
    if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name.to_string()
    }
}

/// A stopped recording waiting to be finalized and saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStop {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    file_path: PathBuf,
    start_point_name: String,
    end_point_name: String,
    mode: RouteProfile,
}

impl PendingStop {
    /// Recording session id
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Stop the recorder and persist the summary record
    ///
    /// The duration is measured from the recording start to `clock.now()`.
    ///
    /// # Errors
    ///
    /// Returns the recorder's [`RecordingError`], or
    /// [`RecordingError::Persistence`] when the record cannot be saved.
    pub async fn complete(
        self,
        recorder: Arc<dyn HistoryRecorder>,
        history: Arc<HistorySummaryStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<HistoryRecord, RecordingError> {
        let written = recorder.stop_recording().await?;
        let file_path = written.unwrap_or(self.file_path);
        let elapsed = clock.now().signed_duration_since(self.started_at);

        let record = HistoryRecord {
            id: self.session_id,
            file_path: file_path.display().to_string(),
            start_time: self.started_at,
            duration_seconds: u64::try_from(elapsed.num_seconds()).unwrap_or(0),
            start_point_name: self.start_point_name,
            end_point_name: self.end_point_name,
            mode: self.mode,
        };

        let saved = record.clone();
        tokio::task::spawn_blocking(move || history.try_save(&saved))
            .await
            .map_err(|e| RecordingError::Stop(e.to_string()))??;

        metrics::counter!("trip.history.saved").increment(1);
        tracing::info!(id = %record.id, duration = record.duration_seconds, "History record saved");
        Ok(record)
    }
}
