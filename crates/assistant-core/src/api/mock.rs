use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::{ChatApi, ChatResponse, SessionResponse};
use crate::error::{ApiError, ApiResult};
use crate::types::SessionId;

const CHAT_LATENCY_MS: RangeInclusive<u64> = 800..=1200;
const SESSION_LATENCY_MS: RangeInclusive<u64> = 1000..=1200;

/// Canned backend for exercising the widget without a live service
#[derive(Debug)]
pub struct MockChatApi {
    session_latency_ms: RangeInclusive<u64>,
    chat_latency_ms: RangeInclusive<u64>,
    fixed_session_id: Option<SessionId>,
    fail_sessions: AtomicBool,
    fail_chat: AtomicBool,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self {
            session_latency_ms: SESSION_LATENCY_MS,
            chat_latency_ms: CHAT_LATENCY_MS,
            fixed_session_id: None,
            fail_sessions: AtomicBool::new(false),
            fail_chat: AtomicBool::new(false),
        }
    }

    /// Answer immediately
    pub fn without_latency(self) -> Self {
        self.with_latency(0..=0, 0..=0)
    }

    /// Override the artificial latency ranges, in milliseconds
    pub fn with_latency(
        mut self,
        session_ms: RangeInclusive<u64>,
        chat_ms: RangeInclusive<u64>,
    ) -> Self {
        self.session_latency_ms = session_ms;
        self.chat_latency_ms = chat_ms;
        self
    }

    /// Always hand out the same session id
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.fixed_session_id = Some(session_id);
        self
    }

    /// Force `create_session` to fail
    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// Force `send_chat_message` to fail
    pub fn fail_chat(&self, fail: bool) {
        self.fail_chat.store(fail, Ordering::SeqCst);
    }

    /// Reply text for a message
    pub fn canned_reply(message: &str) -> String {
        let lower = message.to_lowercase();

        if lower.contains("провалидировать") || lower.contains("форма") {
            return "Я помогу вам провалидировать форму. Пожалуйста, предоставьте URL формы или её ID, и я проверю её на соответствие требованиям.".to_string();
        }

        if lower.contains("код") {
            return "Я могу помочь с кодом! Расскажите, что именно вас интересует: отладка, рефакторинг, оптимизация или что-то другое?".to_string();
        }

        if lower.contains("дизайн") {
            return "С удовольствием помогу с дизайном! Опишите вашу задачу, и я предложу решения.".to_string();
        }

        if lower.contains("исследование") || lower.contains("исследовать") {
            return "Для исследования важно определить цели и методологию. Что именно вы хотите исследовать?".to_string();
        }

        format!(
            "Спасибо за ваш вопрос: \"{}\". Я обработал ваш запрос и готов помочь. Это фейковый ответ для тестирования интерфейса.",
            message
        )
    }

    fn clock_session_id() -> SessionId {
        let id = Utc::now().timestamp_millis() % 1_000_000;
        if id == 0 {
            1
        } else {
            id
        }
    }

    async fn simulate_latency(range: &RangeInclusive<u64>) {
        if *range.end() == 0 {
            return;
        }
        let ms = rand::thread_rng().gen_range(range.clone());
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

impl Default for MockChatApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn create_session(&self, _user_id: &str) -> ApiResult<SessionResponse> {
        Self::simulate_latency(&self.session_latency_ms).await;

        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(ApiError::rejected("session creation disabled"));
        }

        Ok(SessionResponse {
            session_id: self.fixed_session_id.unwrap_or_else(Self::clock_session_id),
        })
    }

    async fn send_chat_message(
        &self,
        _session_id: SessionId,
        message: &str,
    ) -> ApiResult<ChatResponse> {
        Self::simulate_latency(&self.chat_latency_ms).await;

        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(ApiError::rejected("chat disabled"));
        }

        Ok(ChatResponse {
            response: Self::canned_reply(message),
        })
    }
}
