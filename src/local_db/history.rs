//! # Flat History Operations
//!
//! The flat per-user message log used for cross-device backup. One linear
//! sequence of `(role, content, timestamp)` rows per user, keyed by
//! `(user_id, timestamp)`.
//!
//! ## Replace, not append
//!
//! `replace_history` rewrites the active user's entire partition in one
//! transaction (clear-then-insert). There is no incremental append on this
//! collection; callers always hand over the full log.
//!
//! ## Recovery
//!
//! Any internal fault on these operations destroys and recreates the whole
//! database (all partitions) and retries once. Reads degrade to an empty
//! list if the retry also fails; writes surface `SchemaCorruption`.

use sqlx::Row;
use tracing::{error, warn};

use crate::error::StoreError;
use crate::local_db::LocalDatabase;
use crate::types::{HistoryEntry, Role};

impl LocalDatabase {
    /// Replace the active user's entire flat history with `entries`
    ///
    /// Clear-then-insert in a single transaction. On an internal fault the
    /// database is recreated (erasing every partition) and the write is
    /// retried exactly once. Fails with [`StoreError::NoActiveUser`] when no
    /// partition key is set.
    pub async fn replace_history(&self, entries: &[HistoryEntry]) -> Result<(), StoreError> {
        let user_id = self.active_user().ok_or(StoreError::NoActiveUser)?;

        match self.try_replace_history(&user_id, entries).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("history write failed, recreating store: {}", err);
                self.recreate().await?;
                self.try_replace_history(&user_id, entries)
                    .await
                    .map_err(|retry_err| StoreError::corruption(retry_err.to_string()))
            }
        }
    }

    /// All flat entries for the active user, ordered by timestamp
    ///
    /// The partition key is stripped from the returned records. Returns an
    /// empty list when no active user is set, and degrades to an empty list
    /// on any internal failure after one recreate-and-retry cycle.
    pub async fn load_history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let Some(user_id) = self.active_user() else {
            return Ok(Vec::new());
        };

        match self.try_load_history(&user_id).await {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!("history read failed, recreating store: {}", err);
                if let Err(recreate_err) = self.recreate().await {
                    error!("store recreation failed: {}", recreate_err);
                    return Ok(Vec::new());
                }
                Ok(self.try_load_history(&user_id).await.unwrap_or_default())
            }
        }
    }

    /// Delete all flat entries for the active user
    ///
    /// Other partitions are untouched. Internal faults trigger one
    /// recreate cycle (which clears everything anyway).
    pub async fn clear_history(&self) -> Result<(), StoreError> {
        let user_id = self.active_user().ok_or(StoreError::NoActiveUser)?;

        let result = sqlx::query("DELETE FROM chat_history WHERE user_id = ?")
            .bind(&user_id)
            .execute(&self.pool)
            .await;

        if let Err(err) = result {
            warn!("history clear failed, recreating store: {}", err);
            self.recreate().await?;
        }
        Ok(())
    }

    async fn try_replace_history(
        &self,
        user_id: &str,
        entries: &[HistoryEntry],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chat_history WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO chat_history (user_id, timestamp, role, content)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(entry.timestamp)
            .bind(entry.role.as_str())
            .bind(&entry.content)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn try_load_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT timestamp, role, content
             FROM chat_history
             WHERE user_id = ?
             ORDER BY timestamp ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::new();
        for row in rows {
            let role: String = row.try_get("role")?;
            entries.push(HistoryEntry {
                role: Role::from_db(&role),
                content: row.try_get("content")?,
                timestamp: row.try_get("timestamp")?,
            });
        }
        Ok(entries)
    }
}
