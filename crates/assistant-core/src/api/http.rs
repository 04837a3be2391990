use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{ChatApi, ChatRequest, ChatResponse, SessionRequest, SessionResponse};
use crate::error::{ApiError, ApiResult};
use crate::types::SessionId;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the session / chat service
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    base_url: String,
    client: Client,
}

impl HttpChatApi {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Use a preconfigured reqwest client
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn create_session(&self, user_id: &str) -> ApiResult<SessionResponse> {
        let request = SessionRequest {
            user_id: user_id.to_string(),
        };
        self.post_json("/api/session", &request).await
    }

    async fn send_chat_message(
        &self,
        session_id: SessionId,
        message: &str,
    ) -> ApiResult<ChatResponse> {
        let request = ChatRequest {
            session_id,
            message: message.to_string(),
        };
        self.post_json("/api/chat", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let api = HttpChatApi::new("http://localhost:8000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000");
    }
}
