/// Modification-time polling for the watched file.
use crate::supervisor::SupervisorError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Last-modified time of `path`, or `None` if it cannot be stat'ed.
pub fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Tracks the last seen modification time of a single file.
///
/// `None` is the "unknown" sentinel: a diff is only reported when both the
/// previous and the current reading are known.
#[derive(Debug)]
pub struct ChangeDetector {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ChangeDetector {
    /// Take the initial reading. A path that cannot be stat'ed here is fatal.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SupervisorError> {
        let path = path.into();
        let last_modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| SupervisorError::WatchPath {
                path: path.clone(),
                source: e,
            })?;
        Ok(Self {
            path,
            last_modified: Some(last_modified),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[allow(dead_code)]
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Read the timestamp once. Returns `true` when it moved since the last reading.
    ///
    /// A failed read is "no change" and keeps the previous value.
    pub fn poll(&mut self) -> bool {
        let Some(current) = modification_time(&self.path) else {
            tracing::debug!(path = %self.path.display(), "watched path not readable, skipping check");
            return false;
        };
        match self.last_modified {
            Some(last) if last != current => {
                self.last_modified = Some(current);
                true
            }
            Some(_) => false,
            None => {
                self.last_modified = Some(current);
                false
            }
        }
    }

    /// Adopt the current timestamp without reporting a change.
    pub fn rebaseline(&mut self) {
        if let Some(current) = modification_time(&self.path) {
            self.last_modified = Some(current);
        }
    }
}
