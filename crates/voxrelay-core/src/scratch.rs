// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scratch audio files with guaranteed cleanup.
//!
//! Every pipeline run may write downloaded and synthesized audio to disk.
//! [`ScratchFile`] removes its file on drop, so the cleanup invariant holds
//! on every exit path, including errors and early returns. A startup sweep
//! handles leftovers from crashed processes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RelayError;

/// Directory under the system temp dir holding all relay scratch files.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("voxrelay")
}

/// An owned temporary file, deleted when the value is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Writes `bytes` to a fresh uniquely-named file with the given
    /// extension (e.g. `"ogg"`).
    pub async fn with_bytes(extension: &str, bytes: &[u8]) -> Result<Self, RelayError> {
        let dir = scratch_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.{extension}", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "wrote scratch file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove scratch file");
            }
        }
    }
}

/// Removes scratch files older than `max_age`. Returns the number removed.
///
/// Individual failures are logged and skipped; a sweep never aborts.
pub async fn sweep_stale(max_age: Duration) -> usize {
    let dir = scratch_dir();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        // Nothing ever written yet.
        Err(_) => return 0,
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let age = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.elapsed().ok());
        match age {
            Some(age) if age > max_age => match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed stale scratch file");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale file"),
            },
            _ => {}
        }
    }
    removed
}
