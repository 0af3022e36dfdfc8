//! # Local Conversation Operations
//!
//! CRUD operations for the threaded conversation collection, partitioned by
//! the active user. Message threads are stored whole, as a JSON column on the
//! conversation row.
//!
//! ## Features
//!
//! - **Upsert**: `save_conversation` replaces by id, stamping owner and
//!   last-updated time
//! - **Listing**: newest-first retrieval for the active user only
//! - **Search**: case-insensitive substring match over titles
//! - **Deletion**: idempotent removal by id

use sqlx::Row;
use tracing::warn;

use crate::error::StoreError;
use crate::local_db::LocalDatabase;
use crate::types::{now_millis, Conversation};

impl LocalDatabase {
    /// Upsert a conversation into the active user's partition
    ///
    /// The stored row is stamped with the active user as owner and the
    /// current time as `last_updated`, regardless of the values carried by
    /// `conversation`. Fails with [`StoreError::NoActiveUser`] when no
    /// partition key is set.
    pub async fn save_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let user_id = self.active_user().ok_or(StoreError::NoActiveUser)?;
        let messages = serde_json::to_string(&conversation.messages)?;

        sqlx::query(
            "INSERT OR REPLACE INTO conversations (
                id, user_id, title, messages, last_updated
            ) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&user_id)
        .bind(&conversation.title)
        .bind(&messages)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable(e.to_string()))?;

        Ok(())
    }

    /// All conversations for the active user, most recently updated first
    ///
    /// Returns an empty list (not an error) when no active user is set.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let Some(user_id) = self.active_user() else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT id, user_id, title, messages, last_updated
             FROM conversations
             WHERE user_id = ?
             ORDER BY last_updated DESC",
        )
        .bind(&user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable(e.to_string()))?;

        let mut conversations = Vec::new();
        for row in rows {
            match Self::row_to_conversation(&row) {
                Ok(conversation) => conversations.push(conversation),
                Err(err) => {
                    // Skip malformed rows rather than failing the whole list
                    warn!("skipping unreadable conversation row: {}", err);
                }
            }
        }
        Ok(conversations)
    }

    /// Remove a conversation by id
    ///
    /// Idempotent: deleting an id that does not exist is not an error.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        Ok(())
    }

    /// Case-insensitive substring search over the active user's titles
    ///
    /// Results are ordered `last_updated` descending. Empty when no active
    /// user is set.
    pub async fn search_conversations_by_title(
        &self,
        term: &str,
    ) -> Result<Vec<Conversation>, StoreError> {
        let needle = term.to_lowercase();
        let conversations = self.list_conversations().await?;
        Ok(conversations
            .into_iter()
            .filter(|c| c.title.to_lowercase().contains(&needle))
            .collect())
    }

    /// Convert a database row to a Conversation
    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
        let messages_json: String = row
            .try_get("messages")
            .map_err(|e| StoreError::unavailable(e.to_string()))?;

        Ok(Conversation {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::unavailable(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| StoreError::unavailable(e.to_string()))?,
            title: row
                .try_get("title")
                .map_err(|e| StoreError::unavailable(e.to_string()))?,
            messages: serde_json::from_str(&messages_json)?,
            last_updated: row
                .try_get("last_updated")
                .map_err(|e| StoreError::unavailable(e.to_string()))?,
        })
    }
}
