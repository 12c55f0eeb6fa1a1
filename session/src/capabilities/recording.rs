//! History recording capability.
//!
//! The recorder captures a guidance session to a replayable file. The byte
//! format belongs to the recorder; the session only decides when to start
//! and stop it.

use crate::error::RecordingError;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use trip_core::environment::Clock;

/// Future returned by [`HistoryRecorder::stop_recording`]
pub type StopFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<PathBuf>, RecordingError>> + Send + 'a>>;

/// Capture of a guidance session
pub trait HistoryRecorder: Send + Sync {
    /// Start recording into `path`, returning recorder handles
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::Start`] when the capture cannot begin.
    fn start_recording(&self, path: &Path) -> Result<Vec<String>, RecordingError>;

    /// Stop the current capture
    ///
    /// Resolves to the written file, or `None` when nothing was recording.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::Stop`] when the capture cannot be finalized.
    fn stop_recording(&self) -> StopFuture<'_>;
}

struct ActiveRecording {
    path: PathBuf,
}

/// Recorder writing a plain-text capture file
///
/// The file holds a header line on start and a footer line on stop. Replay
/// data itself comes from the navigation SDK, which is not part of this crate.
pub struct FileHistoryRecorder {
    clock: Arc<dyn Clock>,
    active: Mutex<Option<ActiveRecording>>,
}

impl FileHistoryRecorder {
    /// Creates a recorder that timestamps with `clock`
    #[must_use]
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self::with_shared_clock(Arc::new(clock))
    }

    /// Creates a recorder sharing an existing clock
    #[must_use]
    pub fn with_shared_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            active: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for FileHistoryRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("FileHistoryRecorder")
            .field("recording", &active.as_ref().map(|a| a.path.clone()))
            .finish_non_exhaustive()
    }
}

impl HistoryRecorder for FileHistoryRecorder {
    fn start_recording(&self, path: &Path) -> Result<Vec<String>, RecordingError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_ref() {
            return Err(RecordingError::Start(format!(
                "already recording to {}",
                current.path.display()
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RecordingError::Start(e.to_string()))?;
        }
        let header = format!("# trip history\nstarted={}\n", self.clock.now().to_rfc3339());
        std::fs::write(path, header).map_err(|e| RecordingError::Start(e.to_string()))?;

        tracing::debug!(path = %path.display(), "History capture started");
        *active = Some(ActiveRecording {
            path: path.to_path_buf(),
        });
        Ok(vec![path.display().to_string()])
    }

    fn stop_recording(&self) -> StopFuture<'_> {
        Box::pin(async move {
            let taken = {
                let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
                active.take()
            };
            let Some(recording) = taken else {
                return Ok(None);
            };

            let footer = format!("stopped={}\n", self.clock.now().to_rfc3339());
            let path = recording.path;
            let target = path.clone();
            tokio::task::spawn_blocking(move || {
                std::fs::OpenOptions::new()
                    .append(true)
                    .open(&target)
                    .and_then(|mut file| file.write_all(footer.as_bytes()))
            })
            .await
            .map_err(|e| RecordingError::Stop(e.to_string()))?
            .map_err(|e| RecordingError::Stop(e.to_string()))?;

            tracing::debug!(path = %path.display(), "History capture stopped");
            Ok(Some(path))
        })
    }
}
