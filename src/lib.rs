//! SmartChat - Client Persistence Core
//!
//! The storage and synchronization layer of a chat client: conversation
//! state, a local SQLite store, an authenticated remote backup, and the
//! coordinator that reconciles them.
//!
//! # Overview
//!
//! User actions mutate in-memory session state synchronously for immediate
//! feedback, then write through asynchronously: always to the local store,
//! best-effort to the remote backup when a user is authenticated. Loads go
//! local-first; the remote backup is consulted only on a local miss and its
//! result is backfilled so future loads stay local.
//!
//! # Module Structure
//!
//! - **`types`** - shared data model (users, conversations, history entries)
//! - **`config`** - environment-driven configuration with a builder
//! - **`error`** - the storage error taxonomy
//! - **`local_db`** - SQLite-backed local store: threaded conversations, the
//!   flat per-user history log, and user rows. Destructive schema migration
//!   and recreate-and-retry fault recovery.
//! - **`drive`** - remote backup client: one JSON object per user in an
//!   app-private storage area
//! - **`mirror`** - legacy JSON view cache, the last resort of the load
//!   fallback chain
//! - **`sync`** - the coordinator owning all three storage handles and the
//!   policy between them
//! - **`completion`** - the model-completion collaborator boundary, with
//!   cooperative cancellation
//! - **`session`** - the in-memory session state machine and send flow
//!
//! # Usage
//!
//! ```rust,no_run
//! use smartchat::config::AppConfig;
//! use smartchat::session::ChatSession;
//! use smartchat::sync::SyncCoordinator;
//! use smartchat::types::UserProfile;
//!
//! # async fn example() -> Result<(), smartchat::error::StoreError> {
//! let config = AppConfig::default();
//! let coordinator = SyncCoordinator::open(&config).await?;
//! let session = ChatSession::new(coordinator);
//!
//! session
//!     .sign_in(UserProfile {
//!         id: "ada@example.com".into(),
//!         display_name: "Ada".into(),
//!         avatar_url: None,
//!         access_token: None,
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod drive;
pub mod error;
pub mod local_db;
pub mod mirror;
pub mod session;
pub mod sync;
pub mod types;

pub use completion::{CompletionApi, CompletionError, GeminiClient, ModelKind};
pub use config::AppConfig;
pub use drive::DriveBackup;
pub use error::StoreError;
pub use local_db::LocalDatabase;
pub use mirror::MirrorCache;
pub use session::{ChatSession, SendOutcome};
pub use sync::SyncCoordinator;
pub use types::{Conversation, HistoryEntry, Message, Role, UserProfile};
