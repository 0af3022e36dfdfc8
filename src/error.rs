//! Storage Error Types
//!
//! Defines the error taxonomy shared by the local store, the remote backup,
//! and the sync coordinator.
//!
//! # Error Categories
//!
//! - `StorageUnavailable` - the platform denied access to local storage
//! - `NoActiveUser` - an operation that requires a user partition was called
//!   before one was set (caller error, never retried)
//! - `SchemaCorruption` - an internal store fault that survived the one
//!   recreate-and-retry cycle
//! - `NotConfigured` / `AuthError` / `RemoteError` - remote backup failures;
//!   these degrade to the local fallback chain and never crash the caller
//! - `Serialization` - JSON encode/decode failures on stored payloads
//!
//! # Usage
//!
//! ```rust
//! use smartchat::error::StoreError;
//!
//! let error = StoreError::remote("backup endpoint returned 503");
//! ```

use thiserror::Error;

/// Errors produced by the persistence and synchronization layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// The platform denied access to local storage
    #[error("local storage unavailable: {message}")]
    StorageUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// An operation that requires an active user partition was called
    /// before one was set
    #[error("no active user set")]
    NoActiveUser,

    /// An internal store fault that persisted across the single
    /// recreate-and-retry cycle
    #[error("local store fault after recreation: {message}")]
    SchemaCorruption {
        /// Human-readable error message
        message: String,
    },

    /// The remote backup was used before `configure` supplied an identity
    #[error("remote backup not configured: missing {missing}")]
    NotConfigured {
        /// The missing piece of configuration
        missing: &'static str,
    },

    /// The remote backup rejected the supplied access token
    #[error("remote backup authentication failed: {message}")]
    AuthError {
        /// Human-readable error message
        message: String,
    },

    /// A remote backup request failed (network, missing object, bad payload)
    #[error("remote backup request failed: {message}")]
    RemoteError {
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error on a stored payload
    #[error("serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl StoreError {
    /// Create a new storage-unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a new schema-corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::SchemaCorruption {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    /// Create a new remote error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteError {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::remote(format!("network error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let error = StoreError::unavailable("permission denied");
        let display = format!("{}", error);
        assert!(display.contains("local storage unavailable"));
        assert!(display.contains("permission denied"));
    }

    #[test]
    fn test_no_active_user_display() {
        let error = StoreError::NoActiveUser;
        assert_eq!(format!("{}", error), "no active user set");
    }

    #[test]
    fn test_not_configured_display() {
        let error = StoreError::NotConfigured {
            missing: "access token",
        };
        assert!(format!("{}", error).contains("access token"));
    }

    #[test]
    fn test_from_serde_error() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let error: StoreError = result.unwrap_err().into();
        match error {
            StoreError::Serialization { .. } => {}
            other => panic!("expected Serialization, got {:?}", other),
        }
    }
}
