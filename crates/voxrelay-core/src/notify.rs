// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator notification sink for unexpected pipeline failures.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, warn};

/// Receives alerts about failures the pipeline could not recover from.
///
/// Delivery is best effort: a broken sink must never take the pipeline down,
/// so implementations log their own failures instead of returning them.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn alert(&self, subject: &str, body: &str);
}

/// Writes alerts to the process log at error level.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn alert(&self, subject: &str, body: &str) {
        error!(subject, body, "operator alert");
    }
}

/// Appends alerts to a plain text file, one timestamped line per alert.
pub struct FileNotifier {
    path: PathBuf,
}

impl FileNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    async fn alert(&self, subject: &str, body: &str) {
        let line = format!("[{}] {subject}: {body}\n", Utc::now().to_rfc3339());
        let result = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut options = tokio::fs::OpenOptions::new();
            options.create(true).append(true);
            let mut file = options.open(&self.path).await?;
            tokio::io::AsyncWriteExt::write_all(&mut file, line.as_bytes()).await
        }
        .await;
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to write alert to file");
        }
    }
}

/// Builds the configured notifier. `file_path` is consulted only for the
/// `"file"` sink; any unrecognized sink name falls back to console.
pub fn build_notifier(sink: &str, file_path: Option<PathBuf>) -> Arc<dyn Notifier> {
    match (sink, file_path) {
        ("file", Some(path)) => Arc::new(FileNotifier::new(path)),
        ("file", None) => {
            warn!("file notification sink selected without a path, falling back to console");
            Arc::new(ConsoleNotifier)
        }
        _ => Arc::new(ConsoleNotifier),
    }
}
