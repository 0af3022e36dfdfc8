//! Shared Data Model
//!
//! Core types for the chat persistence layer: user identity, threaded
//! conversations, and the flat per-user history log.
//!
//! The threaded shape (`Conversation` with embedded `Message`s) and the flat
//! shape (`HistoryEntry` rows partitioned by user) are two independent
//! persistence models. They are deliberately not reconciled with each other;
//! the local store holds both and neither is derived from the other.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to a conversation before its first exchange names it
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Current wall-clock time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse from string (database)
    pub fn from_db(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

/// Signed-in user identity
///
/// Session-scoped: created on sign-in, dropped on sign-out. Only the profile
/// fields are ever persisted; the access token lives in memory for the
/// duration of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable email-like identifier; also the partition key for stored data
    pub id: String,
    /// Display name shown in the UI
    pub display_name: String,
    /// Optional avatar image URL
    pub avatar_url: Option<String>,
    /// Bearer token for the remote backup; never persisted
    pub access_token: Option<String>,
}

/// A single message inside a conversation thread
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Who authored the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the message was sent (epoch milliseconds)
    pub timestamp: i64,
}

impl Message {
    /// Create a new message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }
}

/// A named, ordered thread of messages owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Globally unique conversation ID
    pub id: String,
    /// Free-text title; derived from the first user message when untitled
    pub title: String,
    /// Messages ordered by send time, append-only within a session
    pub messages: Vec<Message>,
    /// Owning user; empty string while the conversation is a pre-login draft
    pub user_id: String,
    /// Last mutation time (epoch milliseconds)
    pub last_updated: i64,
}

impl Conversation {
    /// Create a fresh, untitled draft conversation
    pub fn draft() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            user_id: String::new(),
            last_updated: now_millis(),
        }
    }

    /// Whether the conversation still carries the placeholder title
    pub fn is_untitled(&self) -> bool {
        self.title == DEFAULT_CONVERSATION_TITLE
    }
}

/// Derive a conversation title from the first user message
///
/// Truncates to 30 characters (on a character boundary) with a trailing
/// ellipsis marker.
pub fn derive_title(content: &str) -> String {
    let head: String = content.chars().take(30).collect();
    format!("{}...", head)
}

/// One row of the flat per-user history log
///
/// Within a user partition, entries are unique by `(user_id, timestamp)`;
/// the local store enforces that as the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who authored the entry
    pub role: Role,
    /// Entry text
    pub content: String,
    /// When the entry was recorded (epoch milliseconds)
    pub timestamp: i64,
}

impl HistoryEntry {
    /// Create a new entry stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }
}
