//! Completion API Boundary
//!
//! The model-completion call is an external collaborator: an opaque remote
//! procedure that takes a system prompt, prior history, and the new user
//! content, and either returns text, fails, or is cancelled. [`CompletionApi`]
//! is the seam; [`GeminiClient`] is the HTTP implementation speaking the
//! `generateContent` REST endpoint.
//!
//! Cancellation is cooperative: callers pass a [`CancellationToken`] and the
//! request future is raced against it at the suspension point.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConfigError};
use crate::types::{HistoryEntry, Role};

/// Errors from the completion collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The request tripped the provider's safety filters
    #[error(
        "I apologize, but I cannot provide a response to that request. \
         It may have triggered safety filters. Please try rephrasing your \
         question or asking something else."
    )]
    SafetyBlocked,

    /// The provider rate limited the request
    #[error("the model is receiving too many requests. Please try again in a moment.")]
    RateLimited,

    /// The caller cancelled the request; distinct from failure and
    /// discarded silently by the UI
    #[error("generation was cancelled")]
    Cancelled,

    /// Any other provider failure
    #[error("{0}")]
    Provider(String),
}

/// Conversation style, selecting the system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    Chat,
    Creative,
    Structured,
}

impl ModelKind {
    /// The system prompt sent ahead of the user's content
    pub fn system_prompt(&self) -> &'static str {
        match self {
            ModelKind::Chat => {
                "You are a helpful assistant who provides clear and concise answers."
            }
            ModelKind::Creative => {
                "You are a creative assistant who helps with writing, brainstorming, \
                 and generating imaginative content."
            }
            ModelKind::Structured => {
                "You are an assistant who provides structured, detailed responses \
                 with clear organization and formatting."
            }
        }
    }
}

/// The completion collaborator seam
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Request a completion for `content`, given the prior `history`
    ///
    /// Suspends until the provider answers, fails, or `cancel` fires.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError>;
}

/// HTTP client for the `generateContent` endpoint
#[derive(Debug)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client from configuration
    ///
    /// Fails when no API key is configured.
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_gemini_api_key()?.to_string();
        Ok(Self {
            client: Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.gemini_model.clone(),
        })
    }

    async fn request(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        content: &str,
    ) -> Result<String, CompletionError> {
        let mut contents: Vec<serde_json::Value> = history
            .iter()
            .map(|entry| {
                json!({
                    "role": match entry.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    },
                    "parts": [{ "text": entry.content }],
                })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": content }] }));

        let body = json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": contents,
            "generationConfig": {
                "temperature": 0.7,
                "topP": 0.8,
                "topK": 40,
                "maxOutputTokens": 1000,
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
            ],
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Provider(format!("network error: {}", e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| status.to_string());
            if text.contains("SAFETY") {
                return Err(CompletionError::SafetyBlocked);
            }
            return Err(CompletionError::Provider(format!(
                "completion failed: {} - {}",
                status, text
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Provider(format!("unreadable response: {}", e)))?;
        extract_text(payload)
    }
}

#[async_trait]
impl CompletionApi for GeminiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            result = self.request(system_prompt, history, content) => result,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Pull the answer text out of a parsed response
fn extract_text(payload: GenerateContentResponse) -> Result<String, CompletionError> {
    if let Some(feedback) = &payload.prompt_feedback {
        if feedback.block_reason.is_some() {
            return Err(CompletionError::SafetyBlocked);
        }
    }

    let Some(candidate) = payload.candidates.into_iter().next() else {
        return Err(CompletionError::Provider(
            "no response from AI model".to_string(),
        ));
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(CompletionError::SafetyBlocked);
    }

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(CompletionError::Provider(
            "no response from AI model".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> GenerateContentResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let payload = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":" there"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(extract_text(payload).unwrap(), "Hello there");
    }

    #[test]
    fn test_extract_text_safety_finish() {
        let payload =
            parse(r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#);
        assert_eq!(extract_text(payload), Err(CompletionError::SafetyBlocked));
    }

    #[test]
    fn test_extract_text_block_reason() {
        let payload = parse(r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert_eq!(extract_text(payload), Err(CompletionError::SafetyBlocked));
    }

    #[test]
    fn test_extract_text_empty_is_provider_error() {
        let payload = parse(r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]}"#);
        assert!(matches!(
            extract_text(payload),
            Err(CompletionError::Provider(_))
        ));
    }

    #[test]
    fn test_system_prompts_differ() {
        assert_ne!(
            ModelKind::Chat.system_prompt(),
            ModelKind::Creative.system_prompt()
        );
        assert_ne!(
            ModelKind::Creative.system_prompt(),
            ModelKind::Structured.system_prompt()
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_short_circuits() {
        let config = AppConfig::builder()
            .gemini_base_url("http://127.0.0.1:1")
            .gemini_api_key("test-key")
            .build()
            .unwrap();
        let client = GeminiClient::new(&config).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.complete("system", &[], "hello", &cancel).await;
        assert_eq!(result, Err(CompletionError::Cancelled));
    }
}
