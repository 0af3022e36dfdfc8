//! Shared test fixtures
//!
//! Temp-dir configurations, completion fakes, and mock drive endpoints used
//! across the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smartchat::completion::{CompletionApi, CompletionError};
use smartchat::config::AppConfig;
use smartchat::types::{HistoryEntry, Role, UserProfile};

/// A drive URL nothing listens on; any request against it fails fast
pub const DEAD_DRIVE_URL: &str = "http://127.0.0.1:1";

/// Install a test subscriber honoring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Backup file id used by the mock drive endpoints
pub const FILE_ID: &str = "file-123";

/// Throwaway configuration rooted in a temp directory
pub struct TestEnv {
    pub dir: TempDir,
    pub config: AppConfig,
}

/// Build a test environment pointing at `drive_base_url`
pub fn test_env(drive_base_url: &str) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::builder()
        .db_path(dir.path().join("local.db"))
        .mirror_path(dir.path().join("conversations.json"))
        .drive_base_url(drive_base_url)
        .build()
        .unwrap();
    TestEnv { dir, config }
}

/// Rebuild a config against the same temp dir with a different drive URL
pub fn reconfigure(env: &TestEnv, drive_base_url: &str) -> AppConfig {
    AppConfig::builder()
        .db_path(env.dir.path().join("local.db"))
        .mirror_path(env.dir.path().join("conversations.json"))
        .drive_base_url(drive_base_url)
        .build()
        .unwrap()
}

/// A profile without a backup token
pub fn profile(id: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        display_name: "Test User".to_string(),
        avatar_url: None,
        access_token: None,
    }
}

/// A profile carrying a backup token
pub fn profile_with_token(id: &str, token: &str) -> UserProfile {
    UserProfile {
        access_token: Some(token.to_string()),
        ..profile(id)
    }
}

/// Deterministic history entries starting at `base` milliseconds
pub fn entries(base: i64, contents: &[(&str, Role)]) -> Vec<HistoryEntry> {
    contents
        .iter()
        .enumerate()
        .map(|(i, (content, role))| HistoryEntry {
            role: *role,
            content: content.to_string(),
            timestamp: base + i as i64,
        })
        .collect()
}

/// Completion fake returning a fixed reply and counting invocations
pub struct CannedCompletion {
    reply: String,
    calls: AtomicUsize,
}

impl CannedCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionApi for CannedCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _history: &[HistoryEntry],
        _content: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Completion fake that never answers; it resolves only through cancellation
pub struct HangingCompletion;

#[async_trait]
impl CompletionApi for HangingCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _history: &[HistoryEntry],
        _content: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        cancel.cancelled().await;
        Err(CompletionError::Cancelled)
    }
}

/// Completion fake failing with a fixed error
pub struct FailingCompletion {
    error: CompletionError,
}

impl FailingCompletion {
    pub fn new(error: CompletionError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl CompletionApi for FailingCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _history: &[HistoryEntry],
        _content: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        Err(self.error.clone())
    }
}

/// Mount a successful readiness probe
pub async fn mount_drive_about(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": {} })))
        .mount(server)
        .await;
}

/// Mount a file listing that finds the backup object
pub async fn mount_drive_file_found(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": FILE_ID, "name": "backup" }]
        })))
        .mount(server)
        .await;
}

/// Mount a file listing that finds nothing, plus the create endpoint
pub async fn mount_drive_file_missing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": FILE_ID })))
        .mount(server)
        .await;
}

/// Mount the backup object's content for download
pub async fn mount_drive_download(server: &MockServer, entries: &[HistoryEntry]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v3/files/{}", FILE_ID)))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
}

/// Mount a successful upload endpoint
pub async fn mount_drive_upload(server: &MockServer) {
    Mock::given(method("PATCH"))
        .and(path(format!("/upload/drive/v3/files/{}", FILE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": FILE_ID })))
        .mount(server)
        .await;
}
