//! # Submission Workflow
//!
//! Orchestrates "user sends a message":
//!
//! 1. build the user message with a fresh id
//! 2. create a session (and chat) when the active chat has none
//! 3. otherwise append the user message optimistically
//! 4. call the chat API and append the reply, or a fixed error reply
//!
//! Failures never escape [`SubmissionWorkflow::submit`]; they are logged and
//! turned into an assistant turn the user can see.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::ChatApi;
use crate::error::ApiError;
use crate::ids::IdSource;
use crate::store::ChatStateStore;
use crate::types::{Chat, ChatId, Message, SessionId};

/// Assistant text shown when a remote call fails
pub const ERROR_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// What to do with a reply whose chat is no longer active when it arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleResponsePolicy {
    /// Append the reply to its chat regardless of the current selection
    #[default]
    AlwaysApply,
    /// Drop the reply if the user has switched to another chat
    DiscardInactive,
}

/// Workflow settings
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub user_id: String,
    pub error_message: String,
    pub stale_policy: StaleResponsePolicy,
}

impl WorkflowConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            error_message: ERROR_REPLY.to_string(),
            stale_policy: StaleResponsePolicy::default(),
        }
    }

    pub fn with_stale_policy(mut self, policy: StaleResponsePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }
}

/// Whether any submission is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
}

/// How a settled submission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success,
    Failure,
}

/// Result of [`SubmissionWorkflow::submit`]
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank prompt, nothing happened
    Ignored,
    /// Session creation failed; no chat was created
    SessionFailed { error: ApiError },
    /// An assistant turn was appended to `chat_id`
    Settled {
        chat_id: ChatId,
        outcome: SubmissionOutcome,
    },
    /// The reply arrived after the user left the chat and was dropped
    Discarded { chat_id: ChatId },
}

impl SubmitOutcome {
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Settled { chat_id, .. } | Self::Discarded { chat_id } => Some(chat_id),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Settled {
                outcome: SubmissionOutcome::Success,
                ..
            }
        )
    }
}

/// Marks a submission in flight until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SubmissionWorkflow {
    api: Arc<dyn ChatApi>,
    store: Arc<ChatStateStore>,
    ids: Arc<dyn IdSource>,
    config: WorkflowConfig,
    in_flight: AtomicUsize,
}

impl SubmissionWorkflow {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<ChatStateStore>,
        ids: Arc<dyn IdSource>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            api,
            store,
            ids,
            config,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<ChatStateStore> {
        &self.store
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// `Submitting` while at least one submission is awaiting the network
    pub fn state(&self) -> SubmissionState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SubmissionState::Submitting
        } else {
            SubmissionState::Idle
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.state() == SubmissionState::Submitting
    }

    /// Submit a prompt; overlapping calls are not rejected here
    pub async fn submit(&self, prompt: &str) -> SubmitOutcome {
        let content = prompt.trim();
        if content.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let _guard = InFlight::enter(&self.in_flight);
        let user_message = Message::user(self.ids.next_message_id(), content);

        let (chat_id, session_id) = match self.store.active_chat() {
            Some(chat) if chat.has_session() => {
                let session_id = chat.session_id.unwrap_or_default();
                self.append(&chat.id, user_message);
                (chat.id, session_id)
            }
            active => match self.open_session(active, user_message).await {
                Ok(target) => target,
                Err(error) => return SubmitOutcome::SessionFailed { error },
            },
        };

        let (content, outcome) = match self.api.send_chat_message(session_id, content).await {
            Ok(response) => (response.response, SubmissionOutcome::Success),
            Err(e) => {
                error!("Error calling chat API: {}", e);
                (self.config.error_message.clone(), SubmissionOutcome::Failure)
            }
        };

        if self.config.stale_policy == StaleResponsePolicy::DiscardInactive
            && self.store.active_chat_id().as_deref() != Some(chat_id.as_str())
        {
            warn!("Discarding reply for chat {} which is no longer active", chat_id);
            return SubmitOutcome::Discarded { chat_id };
        }

        self.append(&chat_id, Message::assistant(self.ids.next_message_id(), content));
        SubmitOutcome::Settled { chat_id, outcome }
    }

    /// Create a session and make the chat that carries it current
    async fn open_session(
        &self,
        active: Option<Chat>,
        user_message: Message,
    ) -> Result<(ChatId, SessionId), ApiError> {
        let session_id = match self.api.create_session(&self.config.user_id).await {
            Ok(response) => response.session_id,
            Err(e) => {
                error!("Error creating session: {}", e);
                if let Some(chat) = &active {
                    let reply = Message::assistant(
                        self.ids.next_message_id(),
                        self.config.error_message.clone(),
                    );
                    self.append(&chat.id, reply);
                }
                return Err(e);
            }
        };
        info!("Created session {}", session_id);

        // A session-less chat is rebuilt under its own id and starts over from this message
        let chat_id = match active {
            Some(chat) => chat.id,
            None => self.ids.next_chat_id(),
        };
        let chat = Chat::new(chat_id.clone(), Some(session_id), &user_message.content);
        self.store.upsert_chat(chat);
        if let Err(e) = self.store.set_messages(&chat_id, vec![user_message]) {
            error!("Failed to store first message: {}", e);
        }
        Ok((chat_id, session_id))
    }

    /// Append to the chat's current list atomically so concurrent writes are never lost
    fn append(&self, chat_id: &str, message: Message) {
        if let Err(e) = self.store.append_message(chat_id, message) {
            error!("Failed to update messages: {}", e);
        }
    }
}
