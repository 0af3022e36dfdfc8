//! # Local Database Module
//!
//! SQLite-backed, per-user-partitioned storage for the chat client. Holds
//! three collections: threaded `conversations`, the flat `chat_history` log,
//! and `users`.
//!
//! ## Architecture
//!
//! - **Partitioning**: every read and write is scoped to the active user set
//!   on the handle; setting or clearing the active user never touches data.
//! - **Destructive migration**: the schema carries a version stamp. Opening a
//!   database whose stamp differs from [`SCHEMA_VERSION`] drops every table
//!   and recreates them empty. There is no forward data migration. A version
//!   bump erases all users' stored data.
//! - **Recovery**: an internal read/write fault on the flat history triggers
//!   the same drop-and-recreate, then the operation is retried exactly once.
//!   Recovery wipes every partition, not just the active one.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection handle and schema management
//! - `conversations.rs`: threaded conversation operations
//! - `history.rs`: flat history operations with recreate-and-retry recovery
//! - `users.rs`: user profile rows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use smartchat::local_db::LocalDatabase;
//!
//! # async fn example() -> Result<(), smartchat::error::StoreError> {
//! let db = LocalDatabase::open(std::path::Path::new("/tmp/chat.db")).await?;
//! db.set_active_user("ada@example.com");
//! let conversations = db.list_conversations().await?;
//! # Ok(())
//! # }
//! ```

pub mod conversations;
pub mod history;
pub mod users;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tracing::{info, warn};

use crate::error::StoreError;

/// Current database schema version
///
/// Bumping this value is destructive: every existing table is dropped on the
/// next open and all stored data, for all users, is lost.
pub const SCHEMA_VERSION: i64 = 3;

/// Local database connection manager
///
/// Owns the SQLite connection pool and the active-user partition key. The
/// handle is created with an explicit [`LocalDatabase::open`] and torn down
/// with [`LocalDatabase::close`]; there is no ambient global connection.
#[derive(Debug)]
pub struct LocalDatabase {
    pool: SqlitePool,
    path: PathBuf,
    active_user: Mutex<Option<String>>,
}

impl LocalDatabase {
    /// Open or create the local database at `path`
    ///
    /// Creates the file and parent directories if absent, applies connection
    /// pragmas, and brings the schema to [`SCHEMA_VERSION`] — destructively
    /// if the stored stamp differs.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::unavailable(format!("cannot create data dir: {}", e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot open database: {}", e)))?;

        // WAL for concurrent readers; the file is shared across processes,
        // concurrent writers for the same user race (last write wins).
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;

        let db = Self {
            pool,
            path: path.to_path_buf(),
            active_user: Mutex::new(None),
        };

        db.ensure_schema().await?;

        Ok(db)
    }

    /// Set the partition key used by all subsequent operations
    pub fn set_active_user(&self, user_id: &str) {
        let mut guard = self.active_user.lock().expect("active user lock");
        *guard = Some(user_id.to_string());
    }

    /// Clear the partition key; stored data is untouched
    pub fn clear_active_user(&self) {
        let mut guard = self.active_user.lock().expect("active user lock");
        *guard = None;
    }

    /// The current partition key, if any
    pub fn active_user(&self) -> Option<String> {
        self.active_user.lock().expect("active user lock").clone()
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Bring the schema to the current version
    ///
    /// A version mismatch drops every table first. This is the destructive
    /// migration policy: schema recreation, never data migration.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_meta (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable(e.to_string()))?;

        let stored: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_meta")
            .fetch_one(&self.pool)
            .await
            .unwrap_or((0,));

        if stored.0 != 0 && stored.0 != SCHEMA_VERSION {
            warn!(
                from = stored.0,
                to = SCHEMA_VERSION,
                "schema version changed; dropping all collections"
            );
            self.drop_collections().await?;
        }

        self.create_collections().await?;

        if stored.0 != SCHEMA_VERSION {
            sqlx::query("DELETE FROM schema_meta")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::unavailable(e.to_string()))?;
            sqlx::query("INSERT INTO schema_meta (version, applied_at) VALUES (?, ?)")
                .bind(SCHEMA_VERSION)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::unavailable(e.to_string()))?;
        }

        Ok(())
    }

    /// Create all collections and their indexes
    async fn create_collections(&self) -> Result<(), StoreError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                messages TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_conversations_title ON conversations(title)",
            "CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(last_updated)",
            "CREATE TABLE IF NOT EXISTS chat_history (
                user_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                PRIMARY KEY (user_id, timestamp)
            )",
            "CREATE INDEX IF NOT EXISTS idx_history_user ON chat_history(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_history_timestamp ON chat_history(timestamp)",
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                avatar_url TEXT
            )",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::unavailable(e.to_string()))?;
        }

        Ok(())
    }

    /// Drop every collection
    async fn drop_collections(&self) -> Result<(), StoreError> {
        for table in ["conversations", "chat_history", "users"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::unavailable(e.to_string()))?;
        }
        Ok(())
    }

    /// Destroy and recreate the entire database
    ///
    /// Last-resort recovery for internal faults: every collection is dropped
    /// and recreated empty, erasing all users' data, then the schema stamp is
    /// rewritten. Callers retry their operation exactly once afterwards.
    pub(crate) async fn recreate(&self) -> Result<(), StoreError> {
        warn!("recreating local database; all partitions are erased");

        self.drop_collections().await?;
        sqlx::query("DROP TABLE IF EXISTS schema_meta")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::corruption(e.to_string()))?;

        self.ensure_schema().await?;
        info!("local database recreated");
        Ok(())
    }
}
