//! Remote Backup Client
//!
//! Drive-style HTTP client keeping one JSON backup object per user inside an
//! app-private storage area. The object lives at a deterministic name,
//! `{user_id}_chat_history.json`, and each write replaces it wholesale.
//!
//! Configuration is session-scoped: `configure` installs the identity,
//! `ensure_ready` validates the token once, `reset` forgets everything
//! without touching remote data.

use std::sync::Mutex;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::types::HistoryEntry;

/// Multipart boundary for the upload body
const UPLOAD_BOUNDARY: &str = "-------314159265358979323846";

/// Suffix of the per-user backup object name
const HISTORY_FILE_SUFFIX: &str = "chat_history.json";

#[derive(Debug, Default)]
struct DriveState {
    user_id: Option<String>,
    access_token: Option<String>,
    ready: bool,
    file_id: Option<String>,
}

/// Authenticated client for the per-user remote backup object
#[derive(Debug)]
pub struct DriveBackup {
    client: Client,
    base_url: String,
    state: Mutex<DriveState>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

impl DriveBackup {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.drive_base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(DriveState::default()),
        }
    }

    /// Install the identity used by all subsequent calls
    ///
    /// Required before anything else; replacing the identity drops the
    /// cached readiness and file id.
    pub fn configure(&self, user_id: &str, access_token: &str) {
        let mut state = self.state.lock().expect("drive state lock");
        state.user_id = Some(user_id.to_string());
        state.access_token = Some(access_token.to_string());
        state.ready = false;
        state.file_id = None;
    }

    /// Whether `configure` has supplied both identity pieces
    pub fn is_configured(&self) -> bool {
        let state = self.state.lock().expect("drive state lock");
        state.user_id.is_some() && state.access_token.is_some()
    }

    /// Forget token, readiness, and user id
    ///
    /// Remote data is untouched.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("drive state lock");
        *state = DriveState::default();
    }

    /// Validate the token against the backup service, once
    ///
    /// Idempotent: after the first success subsequent calls return
    /// immediately. Fails with [`StoreError::NotConfigured`] before
    /// `configure`, and [`StoreError::AuthError`] when the token is rejected.
    pub async fn ensure_ready(&self) -> Result<(), StoreError> {
        let (token, already_ready) = {
            let state = self.state.lock().expect("drive state lock");
            if state.user_id.is_none() {
                return Err(StoreError::NotConfigured { missing: "user id" });
            }
            let Some(token) = state.access_token.clone() else {
                return Err(StoreError::NotConfigured {
                    missing: "access token",
                });
            };
            (token, state.ready)
        };

        if already_ready {
            return Ok(());
        }

        let url = format!("{}/drive/v3/about", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "user")])
            .bearer_auth(&token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                self.state.lock().expect("drive state lock").ready = true;
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::auth(format!(
                "token rejected: {}",
                response.status()
            ))),
            status => Err(StoreError::remote(format!(
                "readiness check failed: {}",
                status
            ))),
        }
    }

    /// Replace the backup object with `entries`
    pub async fn write_entries(&self, entries: &[HistoryEntry]) -> Result<(), StoreError> {
        self.ensure_ready().await?;
        let file_id = self.find_or_create_file().await?;
        let token = self.token()?;

        let content = serde_json::to_string(entries)?;
        let body = multipart_body(&content);

        let url = format!("{}/upload/drive/v3/files/{}", self.base_url, file_id);
        let response = self
            .client
            .patch(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary=\"{}\"", UPLOAD_BOUNDARY),
            )
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error("upload", response).await);
        }

        debug!(file_id = %file_id, count = entries.len(), "backup object replaced");
        Ok(())
    }

    /// Read the backup object as a list of entries
    pub async fn read_entries(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        self.ensure_ready().await?;
        let file_id = self.find_or_create_file().await?;
        let token = self.token()?;

        let url = format!("{}/drive/v3/files/{}", self.base_url, file_id);
        let response = self
            .client
            .get(&url)
            .query(&[("alt", "media")])
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error("download", response).await);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            // A freshly created object has no content yet
            return Ok(Vec::new());
        }
        let entries: Vec<HistoryEntry> = serde_json::from_str(&body)?;
        Ok(entries)
    }

    /// Locate the per-user backup object, creating it if absent
    ///
    /// The lookup-or-create pair is not atomic against concurrent callers;
    /// a second session for the same user can race it into a duplicate.
    /// Accepted under the single-active-session assumption.
    pub async fn find_or_create_file(&self) -> Result<String, StoreError> {
        if let Some(id) = self.state.lock().expect("drive state lock").file_id.clone() {
            return Ok(id);
        }

        let token = self.token()?;
        let file_name = self.backup_file_name()?;

        let url = format!("{}/drive/v3/files", self.base_url);
        let query = format!("name = '{}' and trashed = false", file_name);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "appDataFolder"),
                ("fields", "files(id, name)"),
            ])
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error("lookup", response).await);
        }

        let list: FileList = response.json().await?;
        if let Some(existing) = list.files.into_iter().next() {
            self.state.lock().expect("drive state lock").file_id = Some(existing.id.clone());
            return Ok(existing.id);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({
                "name": file_name,
                "parents": ["appDataFolder"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error("create", response).await);
        }

        let created: FileResource = response.json().await?;
        self.state.lock().expect("drive state lock").file_id = Some(created.id.clone());
        debug!(file_id = %created.id, "backup object created");
        Ok(created.id)
    }

    fn token(&self) -> Result<String, StoreError> {
        self.state
            .lock()
            .expect("drive state lock")
            .access_token
            .clone()
            .ok_or(StoreError::NotConfigured {
                missing: "access token",
            })
    }

    fn backup_file_name(&self) -> Result<String, StoreError> {
        let state = self.state.lock().expect("drive state lock");
        let user_id = state
            .user_id
            .as_ref()
            .ok_or(StoreError::NotConfigured { missing: "user id" })?;
        Ok(format!("{}_{}", user_id, HISTORY_FILE_SUFFIX))
    }

    async fn status_error(&self, operation: &str, response: reqwest::Response) -> StoreError {
        let status = response.status();
        let text = response.text().await.unwrap_or_else(|_| status.to_string());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            StoreError::auth(format!("{} failed: {} - {}", operation, status, text))
        } else {
            StoreError::remote(format!("{} failed: {} - {}", operation, status, text))
        }
    }
}

/// Build the multipart/related upload body: a JSON metadata part followed by
/// the JSON content part
fn multipart_body(content: &str) -> String {
    let delimiter = format!("\r\n--{}\r\n", UPLOAD_BOUNDARY);
    let close_delimiter = format!("\r\n--{}--", UPLOAD_BOUNDARY);

    format!(
        "{}Content-Type: application/json\r\n\r\n{}{}Content-Type: application/json\r\n\r\n{}{}",
        delimiter,
        json!({ "mimeType": "application/json" }),
        delimiter,
        content,
        close_delimiter
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup(base_url: &str) -> DriveBackup {
        let config = AppConfig::builder()
            .drive_base_url(base_url)
            .build()
            .unwrap();
        DriveBackup::new(&config)
    }

    #[test]
    fn test_unconfigured_state() {
        let drive = backup("http://127.0.0.1:1");
        assert!(!drive.is_configured());

        drive.configure("ada@example.com", "tok");
        assert!(drive.is_configured());

        drive.reset();
        assert!(!drive.is_configured());
    }

    #[tokio::test]
    async fn test_ensure_ready_requires_configuration() {
        let drive = backup("http://127.0.0.1:1");
        let result = drive.ensure_ready().await;
        assert!(matches!(result, Err(StoreError::NotConfigured { .. })));
    }

    #[test]
    fn test_backup_file_name_is_per_user() {
        let drive = backup("http://127.0.0.1:1");
        drive.configure("ada@example.com", "tok");
        assert_eq!(
            drive.backup_file_name().unwrap(),
            "ada@example.com_chat_history.json"
        );
    }

    #[test]
    fn test_multipart_body_contains_content() {
        let body = multipart_body("[{\"role\":\"user\"}]");
        assert!(body.contains(UPLOAD_BOUNDARY));
        assert!(body.contains("[{\"role\":\"user\"}]"));
        assert!(body.ends_with(&format!("--{}--", UPLOAD_BOUNDARY)));
    }
}
