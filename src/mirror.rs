//! Legacy View Cache
//!
//! A single JSON file mirroring the flat history as one synthetic "default"
//! conversation. Written alongside every successful history save and
//! remote load, and read as the last resort of the load fallback chain.
//! Best-effort: every failure here is logged and swallowed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::HistoryEntry;

/// The synthetic conversation wrapper stored in the mirror file
#[derive(Debug, Serialize, Deserialize)]
struct MirrorConversation {
    id: String,
    title: String,
    messages: Vec<HistoryEntry>,
}

/// File-backed mirror of the flat history
#[derive(Debug, Clone)]
pub struct MirrorCache {
    path: PathBuf,
}

impl MirrorCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// File location of the cache
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Overwrite the mirror with `entries`
    ///
    /// Failures are logged, never surfaced.
    pub fn write(&self, entries: &[HistoryEntry]) {
        let payload = vec![MirrorConversation {
            id: "default".to_string(),
            title: "Chat History".to_string(),
            messages: entries.to_vec(),
        }];

        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(err) => {
                warn!("mirror serialization failed: {}", err);
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("mirror directory creation failed: {}", err);
                return;
            }
        }

        if let Err(err) = std::fs::write(&self.path, json) {
            warn!("mirror write failed: {}", err);
        }
    }

    /// Entries from the mirror, or empty when absent or unreadable
    pub fn read(&self) -> Vec<HistoryEntry> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str::<Vec<MirrorConversation>>(&raw) {
            Ok(mut conversations) if !conversations.is_empty() => {
                conversations.swap_remove(0).messages
            }
            Ok(_) => Vec::new(),
            Err(err) => {
                warn!("mirror parse failed: {}", err);
                Vec::new()
            }
        }
    }

    /// Remove the mirror file; missing files are fine
    pub fn clear(&self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("mirror removal failed: {}", err);
            }
        }
    }
}
