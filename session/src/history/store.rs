//! Persistent store of history summaries.
//!
//! All records live in one JSON list, `history_summaries.json`, inside the
//! history directory. Every mutation is a read-modify-write of that file
//! under a lock, so concurrent saves never lose records.

use super::HistoryRecord;
use crate::capabilities::fs::FileSystem;
use crate::error::PersistenceError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// File name of the persisted summary list
pub const SUMMARY_FILE_NAME: &str = "history_summaries.json";

/// Extension of capture files written by the recorder
pub const CAPTURE_EXTENSION: &str = "history";

/// Outcome of [`HistorySummaryStore::reconcile`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records dropped because their capture file is gone
    pub dropped_records: usize,
    /// Capture files deleted because no record references them
    pub deleted_files: usize,
}

/// CRUD store for [`HistoryRecord`]s
pub struct HistorySummaryStore {
    fs: Arc<dyn FileSystem>,
    index_path: PathBuf,
    lock: Mutex<()>,
}

impl HistorySummaryStore {
    /// Store keeping its summary file in `directory`
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, directory: impl AsRef<Path>) -> Self {
        Self {
            fs,
            index_path: directory.as_ref().join(SUMMARY_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    /// Path of the summary file
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn io_error(&self, error: &std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.index_path.clone(),
            message: error.to_string(),
        }
    }

    fn load(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let Some(bytes) = self.fs.read(&self.index_path).map_err(|e| self.io_error(&e))? else {
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
            path: self.index_path.clone(),
            message: e.to_string(),
        })
    }

    fn persist(&self, records: &[HistoryRecord]) -> Result<(), PersistenceError> {
        let bytes =
            serde_json::to_vec_pretty(records).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.fs
            .write(&self.index_path, &bytes)
            .map_err(|e| self.io_error(&e))
    }

    /// Remove a record's backing file, logging failures
    fn delete_file(&self, record: &HistoryRecord) {
        match self.fs.delete(Path::new(&record.file_path)) {
            Ok(true) => tracing::debug!(id = %record.id, path = %record.file_path, "Deleted history file"),
            Ok(false) => tracing::debug!(id = %record.id, path = %record.file_path, "History file already gone"),
            Err(error) => tracing::warn!(
                id = %record.id,
                path = %record.file_path,
                error = %error,
                "Failed to delete history file, removing metadata anyway"
            ),
        }
    }

    /// Save a record, replacing any record with the same id
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the summary file cannot be read,
    /// parsed or written.
    pub fn try_save(&self, record: &HistoryRecord) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load()?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.persist(&records)?;
        tracing::debug!(id = %record.id, total = records.len(), "History record saved");
        Ok(())
    }

    /// Save a record; `false` when persistence failed
    pub fn save(&self, record: &HistoryRecord) -> bool {
        self.try_save(record)
            .inspect_err(|error| tracing::error!(id = %record.id, error = %error, "Failed to save history record"))
            .is_ok()
    }

    /// All records in save order
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the summary file cannot be read
    /// or parsed.
    pub fn try_list(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    /// All records in save order; empty when the file cannot be read
    #[must_use]
    pub fn list(&self) -> Vec<HistoryRecord> {
        self.try_list().unwrap_or_else(|error| {
            tracing::error!(error = %error, "Failed to list history records");
            Vec::new()
        })
    }

    /// Record with the given id
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<HistoryRecord> {
        self.list().into_iter().find(|r| r.id == id)
    }

    /// Delete a record and its backing file
    ///
    /// The file is removed first; the metadata is removed even when that
    /// fails. Returns `false` when the id is unknown or the summary file
    /// could not be updated.
    pub fn delete(&self, id: Uuid) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = match self.load() {
            Ok(records) => records,
            Err(error) => {
                tracing::error!(%id, error = %error, "Failed to load history records");
                return false;
            },
        };

        let Some(position) = records.iter().position(|r| r.id == id) else {
            tracing::debug!(%id, "No history record to delete");
            return false;
        };
        let record = records.remove(position);
        self.delete_file(&record);

        self.persist(&records)
            .inspect_err(|error| tracing::error!(%id, error = %error, "Failed to persist history records"))
            .is_ok()
    }

    /// Delete every record and backing file
    ///
    /// Returns `false` when the summary file could not be updated.
    pub fn clear_all(&self) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let records = match self.load() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(error = %error, "Summary file unreadable, clearing it");
                Vec::new()
            },
        };

        for record in &records {
            self.delete_file(record);
        }

        self.persist(&[])
            .inspect_err(|error| tracing::error!(error = %error, "Failed to clear history records"))
            .is_ok()
    }

    /// Bring the summary file and the capture files back in line
    ///
    /// Records whose capture file no longer exists are dropped, and capture
    /// files in the history directory that no record references are deleted.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the summary file cannot be read,
    /// parsed or written, or the directory cannot be listed.
    pub fn reconcile(&self) -> Result<ReconcileReport, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let records = self.load()?;
        let before = records.len();

        let kept: Vec<HistoryRecord> = records
            .into_iter()
            .filter(|record| self.fs.exists(Path::new(&record.file_path)))
            .collect();
        let dropped_records = before - kept.len();
        if dropped_records > 0 {
            self.persist(&kept)?;
        }

        let directory = self.index_path.parent().unwrap_or_else(|| Path::new("."));
        let entries = self.fs.list(directory).map_err(|e| PersistenceError::Io {
            path: directory.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut deleted_files = 0;
        for entry in entries {
            let is_capture = entry.extension().is_some_and(|ext| ext == CAPTURE_EXTENSION);
            let referenced = kept.iter().any(|record| Path::new(&record.file_path) == entry);
            if !is_capture || referenced {
                continue;
            }
            match self.fs.delete(&entry) {
                Ok(true) => deleted_files += 1,
                Ok(false) => {},
                Err(error) => tracing::warn!(path = %entry.display(), error = %error, "Failed to delete orphaned capture"),
            }
        }

        let report = ReconcileReport {
            dropped_records,
            deleted_files,
        };
        tracing::info!(?report, "History reconciled");
        Ok(report)
    }
}

impl std::fmt::Debug for HistorySummaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistorySummaryStore")
            .field("index_path", &self.index_path)
            .finish_non_exhaustive()
    }
}
