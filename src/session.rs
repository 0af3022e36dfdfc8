//! # Chat Session State
//!
//! In-memory, per-session state machine driving the UI: the conversation
//! list, the active conversation, pending-generation status, and the
//! dismissible error banner. Mutations apply to memory synchronously for
//! immediate feedback, then write through the coordinator.
//!
//! ## Conversation lifecycle
//!
//! A "new chat" creates an in-memory draft (untitled, no owner). The first
//! successful send persists it — naming it from the first user message —
//! and every later send updates it in place. An explicit delete removes it
//! from memory and the local store; deleting the active conversation falls
//! back to a fresh draft.
//!
//! ## Concurrent-send guard
//!
//! At most one generation is in flight. Starting a send cancels any pending
//! one via its cancellation token; the superseded send observes the cancel
//! at its next suspension point and discards its partial exchange without
//! persisting anything. `stop_generation` uses the same token and is the
//! single place pending status is reset from the outside.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::completion::{CompletionApi, CompletionError, ModelKind};
use crate::error::StoreError;
use crate::sync::SyncCoordinator;
use crate::types::{derive_title, now_millis, Conversation, Message, Role, UserProfile};

/// How a send ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant replied and the exchange was recorded
    Completed,
    /// The send was cancelled; its partial exchange was discarded silently
    Cancelled,
    /// The completion or the persistence failed; see the error banner
    Failed,
}

#[derive(Debug)]
struct PendingGeneration {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct SessionState {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    user: Option<UserProfile>,
    pending: Option<PendingGeneration>,
    generation_counter: u64,
    error: Option<String>,
    model: ModelKind,
}

impl SessionState {
    /// Make sure an active conversation exists, returning its id
    fn ensure_active_conversation(&mut self) -> String {
        let active_exists = self
            .active_id
            .as_ref()
            .is_some_and(|id| self.conversations.iter().any(|c| &c.id == id));

        if !active_exists {
            let draft = Conversation::draft();
            self.active_id = Some(draft.id.clone());
            self.conversations.insert(0, draft);
        }

        self.active_id.clone().expect("active conversation id")
    }
}

/// Session facade over the coordinator: UI state plus the send flow
#[derive(Debug)]
pub struct ChatSession {
    coordinator: SyncCoordinator,
    state: Mutex<SessionState>,
}

impl ChatSession {
    pub fn new(coordinator: SyncCoordinator) -> Self {
        Self {
            coordinator,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The underlying coordinator
    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Select the conversation style used for future sends
    pub fn set_model(&self, model: ModelKind) {
        self.state.lock().expect("session state lock").model = model;
    }

    /// Sign a user in and hydrate their data
    ///
    /// Installs the identity on the coordinator, then loads the flat history
    /// (local-first, per the load policy) and the conversation list.
    pub async fn sign_in(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.coordinator.sign_in(&profile).await?;
        self.state.lock().expect("session state lock").user = Some(profile);

        self.coordinator.load_history().await?;
        self.load_conversations().await?;
        Ok(())
    }

    /// Sign out, clearing session state only
    ///
    /// Cancels any pending generation and forgets the in-memory view;
    /// persisted data stays where it is.
    pub fn sign_out(&self) {
        self.stop_generation();
        self.coordinator.sign_out();

        let mut state = self.state.lock().expect("session state lock");
        state.user = None;
        state.conversations.clear();
        state.active_id = None;
        state.error = None;
    }

    /// Whether a user is signed in
    pub fn is_signed_in(&self) -> bool {
        self.state.lock().expect("session state lock").user.is_some()
    }

    /// The signed-in profile, if any
    pub fn user(&self) -> Option<UserProfile> {
        self.state.lock().expect("session state lock").user.clone()
    }

    /// Start a fresh draft conversation and make it active
    pub fn new_chat(&self) -> String {
        let mut state = self.state.lock().expect("session state lock");
        let draft = Conversation::draft();
        let id = draft.id.clone();
        state.conversations.insert(0, draft);
        state.active_id = Some(id.clone());
        id
    }

    /// All conversations, most recently updated first
    pub fn conversations(&self) -> Vec<Conversation> {
        let state = self.state.lock().expect("session state lock");
        let mut conversations = state.conversations.clone();
        conversations.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        conversations
    }

    /// The active conversation, if any
    pub fn active_conversation(&self) -> Option<Conversation> {
        let state = self.state.lock().expect("session state lock");
        let id = state.active_id.as_ref()?;
        state.conversations.iter().find(|c| &c.id == id).cloned()
    }

    /// Make `id` the active conversation; false when unknown
    pub fn switch_conversation(&self, id: &str) -> bool {
        let mut state = self.state.lock().expect("session state lock");
        if state.conversations.iter().any(|c| c.id == id) {
            state.active_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Hydrate the conversation list from the store
    ///
    /// The newest conversation becomes active.
    pub async fn load_conversations(&self) -> Result<(), StoreError> {
        let conversations = self.coordinator.list_conversations().await?;
        let mut state = self.state.lock().expect("session state lock");
        state.active_id = conversations.first().map(|c| c.id.clone());
        state.conversations = conversations;
        Ok(())
    }

    /// Delete a conversation from memory and the store
    ///
    /// Idempotent. Deleting the active conversation starts a fresh draft.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        self.coordinator.delete_conversation(id).await?;

        let was_active = {
            let mut state = self.state.lock().expect("session state lock");
            state.conversations.retain(|c| c.id != id);
            state.active_id.as_deref() == Some(id)
        };
        if was_active {
            self.new_chat();
        }
        Ok(())
    }

    /// The current error banner, if any
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().expect("session state lock").error.clone()
    }

    /// Dismiss the error banner
    pub fn dismiss_error(&self) {
        self.state.lock().expect("session state lock").error = None;
    }

    /// Whether a generation is in flight
    pub fn is_generating(&self) -> bool {
        self.state.lock().expect("session state lock").pending.is_some()
    }

    /// Cancel the in-flight generation, if any
    ///
    /// The cancelled send discards its partial exchange; nothing from it is
    /// persisted.
    pub fn stop_generation(&self) {
        let mut state = self.state.lock().expect("session state lock");
        if let Some(pending) = state.pending.take() {
            debug!("stopping in-flight generation");
            pending.token.cancel();
        }
    }

    /// Send a user message through the completion collaborator
    ///
    /// Appends the user message to the active conversation immediately
    /// (creating a draft when none is active), cancels any generation still
    /// pending, then awaits the completion. On success the assistant reply
    /// is appended, an untitled conversation is named from the user content,
    /// and the exchange is persisted — the conversation thread to the local
    /// store, both flat entries through the coordinator's write policy. A
    /// cancelled send is discarded silently; any other failure raises the
    /// error banner and leaves prior state intact.
    pub async fn send_message(&self, api: &dyn CompletionApi, content: &str) -> SendOutcome {
        let (token, generation, conversation_id, system_prompt) = {
            let mut state = self.state.lock().expect("session state lock");
            state.error = None;

            // Starting a send supersedes any generation still in flight
            if let Some(pending) = state.pending.take() {
                pending.token.cancel();
            }
            state.generation_counter += 1;
            let generation = state.generation_counter;
            let token = CancellationToken::new();
            state.pending = Some(PendingGeneration {
                id: generation,
                token: token.clone(),
            });

            let conversation_id = state.ensure_active_conversation();
            let conversation = state
                .conversations
                .iter_mut()
                .find(|c| c.id == conversation_id)
                .expect("active conversation present");
            conversation.messages.push(Message::new(Role::User, content));
            conversation.last_updated = now_millis();

            (token, generation, conversation_id, state.model.system_prompt())
        };

        let history = self.coordinator.history();
        let result = api.complete(system_prompt, &history, content, &token).await;

        let outcome = match result {
            // A supersede can land exactly as the provider answers; the
            // cancelled send still discards its exchange
            Ok(_) if token.is_cancelled() => SendOutcome::Cancelled,
            Ok(reply) => self.finish_exchange(&conversation_id, content, &reply).await,
            Err(CompletionError::Cancelled) => SendOutcome::Cancelled,
            Err(err) => {
                let mut state = self.state.lock().expect("session state lock");
                state.error = Some(err.to_string());
                SendOutcome::Failed
            }
        };

        self.finish_generation(generation);
        outcome
    }

    /// Record a completed exchange: assistant message, title, persistence
    async fn finish_exchange(
        &self,
        conversation_id: &str,
        user_content: &str,
        reply: &str,
    ) -> SendOutcome {
        let updated = {
            let mut state = self.state.lock().expect("session state lock");
            match state
                .conversations
                .iter_mut()
                .find(|c| c.id == conversation_id)
            {
                Some(conversation) => {
                    conversation.messages.push(Message::new(Role::Assistant, reply));
                    if conversation.is_untitled() {
                        conversation.title = derive_title(user_content);
                    }
                    conversation.last_updated = now_millis();
                    Some(conversation.clone())
                }
                // Deleted while the completion was in flight; drop the reply
                None => None,
            }
        };

        let Some(conversation) = updated else {
            return SendOutcome::Completed;
        };

        if self.is_signed_in() {
            if let Err(err) = self.coordinator.record_message(Role::User, user_content).await {
                warn!("recording user entry failed: {}", err);
            }
            if let Err(err) = self.coordinator.record_message(Role::Assistant, reply).await {
                warn!("recording assistant entry failed: {}", err);
            }
        }

        match self.coordinator.save_conversation(&conversation).await {
            Ok(()) => SendOutcome::Completed,
            Err(err) => {
                let mut state = self.state.lock().expect("session state lock");
                state.error = Some(err.to_string());
                SendOutcome::Failed
            }
        }
    }

    /// Clear pending status, but only for the generation that owns it
    fn finish_generation(&self, generation: u64) {
        let mut state = self.state.lock().expect("session state lock");
        if state.pending.as_ref().map(|p| p.id) == Some(generation) {
            state.pending = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_active_conversation_creates_draft() {
        let mut state = SessionState::default();
        let id = state.ensure_active_conversation();
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.active_id.as_deref(), Some(id.as_str()));

        // A second call reuses the existing draft
        let same = state.ensure_active_conversation();
        assert_eq!(same, id);
        assert_eq!(state.conversations.len(), 1);
    }

    #[test]
    fn test_ensure_active_conversation_replaces_stale_id() {
        let mut state = SessionState {
            active_id: Some("gone".to_string()),
            ..Default::default()
        };
        let id = state.ensure_active_conversation();
        assert_ne!(id, "gone");
        assert_eq!(state.conversations.len(), 1);
    }
}
