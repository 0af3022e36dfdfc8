//! # Sync Coordinator
//!
//! Owns the three storage handles — the local database, the remote backup,
//! and the legacy mirror — and implements the read/write policy between
//! them. This is the only place the stores are sequenced against each other;
//! the handles themselves know nothing of one another.
//!
//! ## Load policy
//!
//! 1. Read the local store. Non-empty means done: once populated, local is
//!    authoritative and the remote is never consulted.
//! 2. On a local miss, try the remote backup. Entries found there are
//!    adopted and backfilled into the local store so the next load
//!    short-circuits at step 1.
//! 3. Fall back to the legacy mirror, then to an empty history.
//!
//! ## Write policy
//!
//! In-memory state updates first (the caller already sees the new entry),
//! then the local store unconditionally, then the mirror, then the remote
//! backup best-effort when configured. A remote failure is logged and
//! swallowed — local durability has already succeeded.
//!
//! ## Conflict policy
//!
//! Last writer wins at full-history granularity: a save replaces the whole
//! partition. Concurrent sessions for one user silently clobber each other;
//! accepted under the single-active-session assumption.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::drive::DriveBackup;
use crate::error::StoreError;
use crate::local_db::LocalDatabase;
use crate::mirror::MirrorCache;
use crate::types::{now_millis, Conversation, HistoryEntry, Role, UserProfile};

/// Orchestrates reads and writes across the local store, the remote backup,
/// and the mirror cache
#[derive(Debug)]
pub struct SyncCoordinator {
    local: LocalDatabase,
    drive: DriveBackup,
    mirror: MirrorCache,
    history: Mutex<Vec<HistoryEntry>>,
}

impl SyncCoordinator {
    /// Open the local store and construct the remote/mirror handles
    pub async fn open(config: &AppConfig) -> Result<Self, StoreError> {
        let local = LocalDatabase::open(&config.db_path).await?;
        Ok(Self {
            local,
            drive: DriveBackup::new(config),
            mirror: MirrorCache::new(config.mirror_path.clone()),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Close the local store
    pub async fn close(&self) {
        self.local.close().await;
    }

    /// The local store handle
    pub fn local(&self) -> &LocalDatabase {
        &self.local
    }

    /// The remote backup handle
    pub fn drive(&self) -> &DriveBackup {
        &self.drive
    }

    /// Snapshot of the in-memory flat history
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().expect("history lock").clone()
    }

    /// Install a signed-in identity
    ///
    /// Sets the local partition key, persists the profile row, and
    /// configures the remote backup when the profile carries a token.
    pub async fn sign_in(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.local.set_active_user(&profile.id);
        self.local.save_user(profile).await?;

        if let Some(token) = &profile.access_token {
            self.drive.configure(&profile.id, token);
        } else {
            debug!("no access token; remote backup stays unconfigured");
        }
        Ok(())
    }

    /// Drop the session identity
    ///
    /// Clears the partition key, the remote credentials, and the in-memory
    /// history. Persisted data is never deleted here.
    pub fn sign_out(&self) {
        self.local.clear_active_user();
        self.drive.reset();
        self.history.lock().expect("history lock").clear();
    }

    /// Load the flat history for the active user and adopt it in memory
    ///
    /// Follows the load policy: local first, remote on a local miss (with
    /// backfill), then the mirror, then empty. Remote faults degrade to the
    /// next source and never propagate.
    pub async fn load_history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let local_entries = self.local.load_history().await?;
        if !local_entries.is_empty() {
            debug!(count = local_entries.len(), "loaded history from local store");
            return Ok(self.adopt(local_entries));
        }

        if self.drive.is_configured() {
            match self.drive.read_entries().await {
                Ok(remote_entries) if !remote_entries.is_empty() => {
                    info!(count = remote_entries.len(), "loaded history from remote backup");
                    // Backfill so the next load short-circuits on local
                    if let Err(err) = self.local.replace_history(&remote_entries).await {
                        warn!("backfill into local store failed: {}", err);
                    }
                    self.mirror.write(&remote_entries);
                    return Ok(self.adopt(remote_entries));
                }
                Ok(_) => debug!("remote backup is empty"),
                Err(err) => warn!("remote load failed, falling back: {}", err),
            }
        }

        let cached = self.mirror.read();
        if !cached.is_empty() {
            info!(count = cached.len(), "loaded history from mirror cache");
        }
        Ok(self.adopt(cached))
    }

    /// Persist `entries` as the active user's complete flat history
    ///
    /// Local replace first (durability), then the mirror, then the remote
    /// backup best-effort. The in-memory view adopts `entries` regardless of
    /// remote outcome.
    pub async fn save_history(&self, entries: &[HistoryEntry]) -> Result<(), StoreError> {
        self.adopt(entries.to_vec());
        self.local.replace_history(entries).await?;
        self.mirror.write(entries);

        if !entries.is_empty() && self.drive.is_configured() {
            if let Err(err) = self.drive.write_entries(entries).await {
                warn!("remote backup write failed (history is durable locally): {}", err);
            }
        }
        Ok(())
    }

    /// Append one entry to the in-memory history and persist the result
    ///
    /// Timestamps double as the partition's natural key, so an append that
    /// lands in the same millisecond as the previous entry is nudged
    /// forward by one.
    pub async fn record_message(
        &self,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut history = self.history.lock().expect("history lock");
            let timestamp = history
                .last()
                .map(|last| last.timestamp + 1)
                .unwrap_or_default()
                .max(now_millis());
            history.push(HistoryEntry {
                role,
                content: content.into(),
                timestamp,
            });
            history.clone()
        };
        self.save_history(&updated).await
    }

    /// Clear the active user's flat history everywhere but the remote
    pub async fn clear_history(&self) -> Result<(), StoreError> {
        self.history.lock().expect("history lock").clear();
        self.local.clear_history().await?;
        self.mirror.clear();
        Ok(())
    }

    /// Upsert a conversation thread for the active user
    pub async fn save_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.local.save_conversation(conversation).await
    }

    /// The active user's conversation threads, newest first
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.local.list_conversations().await
    }

    /// Remove a conversation thread; idempotent
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.local.delete_conversation(conversation_id).await
    }

    /// Title search over the active user's threads
    pub async fn search_conversations(
        &self,
        term: &str,
    ) -> Result<Vec<Conversation>, StoreError> {
        self.local.search_conversations_by_title(term).await
    }

    fn adopt(&self, entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        let mut history = self.history.lock().expect("history lock");
        *history = entries;
        history.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SyncCoordinator) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::builder()
            .db_path(dir.path().join("test.db"))
            .mirror_path(dir.path().join("conversations.json"))
            // Nothing listens here; remote calls must never be attempted
            .drive_base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let coordinator = SyncCoordinator::open(&config).await.unwrap();
        (dir, coordinator)
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            display_name: "Test".to_string(),
            avatar_url: None,
            access_token: None,
        }
    }

    #[tokio::test]
    async fn test_record_message_appends_and_persists() {
        let (_dir, coordinator) = open_temp().await;
        coordinator.sign_in(&profile("ada@example.com")).await.unwrap();

        coordinator.record_message(Role::User, "hi").await.unwrap();
        coordinator
            .record_message(Role::Assistant, "hello!")
            .await
            .unwrap();

        let history = coordinator.history();
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp < history[1].timestamp);

        // The local store saw the same entries
        assert_eq!(coordinator.local().load_history().await.unwrap(), history);
    }

    #[tokio::test]
    async fn test_sign_out_clears_memory_not_storage() {
        let (_dir, coordinator) = open_temp().await;
        coordinator.sign_in(&profile("ada@example.com")).await.unwrap();
        coordinator.record_message(Role::User, "hi").await.unwrap();

        coordinator.sign_out();
        assert!(coordinator.history().is_empty());

        coordinator.sign_in(&profile("ada@example.com")).await.unwrap();
        let reloaded = coordinator.load_history().await.unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_history_wipes_local_and_mirror() {
        let (_dir, coordinator) = open_temp().await;
        coordinator.sign_in(&profile("ada@example.com")).await.unwrap();
        coordinator.record_message(Role::User, "hi").await.unwrap();

        coordinator.clear_history().await.unwrap();

        assert!(coordinator.history().is_empty());
        assert!(coordinator.load_history().await.unwrap().is_empty());
    }
}
