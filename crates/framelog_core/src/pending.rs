//! Durable index of artifacts awaiting handoff.
//!
//! An artifact whose queue push fails stays on disk; this index records its
//! path in a line-delimited side file so publication can be retried on a
//! timer instead of relying on manual recovery.

use crate::error::CoreResult;
use crate::queue::HandoffQueue;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tracks artifacts whose publish failed, durably.
#[derive(Debug)]
pub struct PendingIndex {
    path: PathBuf,
    entries: Mutex<Vec<String>>,
}

impl PendingIndex {
    /// Opens the index, loading any entries left by a prior run.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing index file cannot be read.
    pub fn open(path: PathBuf) -> CoreResult<Self> {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Records an artifact whose publish failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the index file cannot be rewritten.
    pub fn record(&self, artifact: &Path) -> CoreResult<()> {
        let entry = artifact.display().to_string();
        let mut entries = self.entries.lock();
        if !entries.contains(&entry) {
            entries.push(entry);
            self.persist(&entries)?;
        }
        Ok(())
    }

    /// Retries publication of every recorded artifact.
    ///
    /// Entries that publish successfully (or whose artifact no longer exists
    /// on disk) are dropped; failures stay recorded for the next pass.
    /// Returns the number of entries still pending.
    pub fn retry(&self, queue: &dyn HandoffQueue, queue_name: &str, ttl: Duration) -> usize {
        let mut entries = self.entries.lock();
        if entries.is_empty() {
            return 0;
        }

        entries.retain(|artifact| {
            if !Path::new(artifact).exists() {
                tracing::warn!(artifact, "pending artifact vanished; dropping entry");
                return false;
            }
            match queue.publish(queue_name, artifact, ttl) {
                Ok(()) => {
                    tracing::info!(artifact, "pending artifact published on retry");
                    false
                }
                Err(e) => {
                    tracing::warn!(error = %e, artifact, "pending artifact retry failed");
                    true
                }
            }
        });

        if let Err(e) = self.persist(&entries) {
            tracing::warn!(error = %e, "failed to rewrite pending index");
        }
        entries.len()
    }

    /// Number of artifacts currently pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &[String]) -> CoreResult<()> {
        let mut text = entries.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}
