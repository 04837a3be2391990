use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locally generated chat identifier
pub type ChatId = String;

/// Message identifier, unique within a chat's message list
pub type MessageId = u64;

/// Remote session identifier
pub type SessionId = i64;

/// Maximum number of characters taken from the first prompt for a chat title
pub const TITLE_MAX_CHARS: usize = 50;

/// Title used when the first prompt is empty
pub const DEFAULT_CHAT_TITLE: &str = "Новый чат";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn in a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Conversation thread shown in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    /// `None` until the remote session exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Create a chat titled after its first prompt
    pub fn new(id: impl Into<ChatId>, session_id: Option<SessionId>, first_prompt: &str) -> Self {
        Self {
            id: id.into(),
            session_id,
            title: Self::title_from_prompt(first_prompt),
            created_at: Utc::now(),
        }
    }

    /// First 50 characters of the prompt, or the placeholder title
    pub fn title_from_prompt(prompt: &str) -> String {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return DEFAULT_CHAT_TITLE.to_string();
        }
        prompt.chars().take(TITLE_MAX_CHARS).collect()
    }

    /// Whether a usable remote session is attached; a wire value of 0 counts as unset
    pub fn has_session(&self) -> bool {
        matches!(self.session_id, Some(id) if id != 0)
    }
}
