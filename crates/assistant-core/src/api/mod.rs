//! Session / chat API.
//!
//! Two calls against the remote service, no retries and no local state.

mod http;
mod mock;

pub use http::HttpChatApi;
pub use mock::MockChatApi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::types::SessionId;

/// Body of `POST /api/session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRequest {
    pub user_id: String,
}

/// Response of `POST /api/session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub session_id: SessionId,
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub session_id: SessionId,
    pub message: String,
}

/// Response of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: String,
}

/// Remote chat service
///
/// Callers are responsible for passing a non-empty, trimmed `message`.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Open a new remote session for `user_id`
    async fn create_session(&self, user_id: &str) -> ApiResult<SessionResponse>;

    /// Send one message within an existing session
    async fn send_chat_message(&self, session_id: SessionId, message: &str)
        -> ApiResult<ChatResponse>;
}
