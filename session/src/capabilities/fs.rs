//! File system capability used by history persistence.

use std::io;
use std::path::{Path, PathBuf};

/// Minimal file access needed by the history store
pub trait FileSystem: Send + Sync {
    /// Read a whole file, `None` when it does not exist
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than not-found.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Replace a file's contents, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Delete a file; `false` when it did not exist
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than not-found.
    fn delete(&self, path: &Path) -> io::Result<bool>;

    /// List the entries of a directory (empty when it does not exist)
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than not-found.
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Whether a path exists
    fn exists(&self, path: &Path) -> bool;
}

/// [`FileSystem`] over `std::fs`
///
/// Writes go to a sibling temporary file that is then renamed into place, so
/// readers never observe a half-written file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut paths = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        paths.sort();
        Ok(paths)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
