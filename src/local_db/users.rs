//! # Local User Rows
//!
//! Point storage for user profiles. The row id doubles as the email-style
//! identity used to partition the other collections; access tokens are
//! session-only and never written here.

use sqlx::Row;

use crate::error::StoreError;
use crate::local_db::LocalDatabase;
use crate::types::UserProfile;

impl LocalDatabase {
    /// Upsert a user profile row
    pub async fn save_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO users (id, email, display_name, avatar_url)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.id)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable(e.to_string()))?;
        Ok(())
    }

    /// Look up a user profile by id
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query("SELECT id, display_name, avatar_url FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(UserProfile {
                id: row
                    .try_get("id")
                    .map_err(|e| StoreError::unavailable(e.to_string()))?,
                display_name: row
                    .try_get("display_name")
                    .map_err(|e| StoreError::unavailable(e.to_string()))?,
                avatar_url: row
                    .try_get("avatar_url")
                    .map_err(|e| StoreError::unavailable(e.to_string()))?,
                access_token: None,
            })),
            None => Ok(None),
        }
    }
}
