//! # Assistant Core
//!
//! Client-side state for the assistant chat widget.
//!
//! ## Components
//!
//! - **API client**: `POST /api/session` and `POST /api/chat`, over HTTP or a canned mock
//! - **Chat state store**: chat list, active chat and per-chat message lists
//! - **Submission workflow**: "user sends a message", from session creation to the assistant reply
//! - **Composer**: prompt text and suggestion selection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use assistant_core::{
//!     ChatStateStore, MockChatApi, SequentialIds, SubmissionWorkflow, WorkflowConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(ChatStateStore::new());
//!     let workflow = SubmissionWorkflow::new(
//!         Arc::new(MockChatApi::new()),
//!         Arc::clone(&store),
//!         Arc::new(SequentialIds::new()),
//!         WorkflowConfig::new("user-123"),
//!     );
//!
//!     workflow.submit("Как помочь с кодом?").await;
//!
//!     let chat = store.active_chat().expect("chat created");
//!     for message in store.get_messages(&chat.id) {
//!         println!("{}: {}", message.role, message.content);
//!     }
//! }
//! ```

pub mod api;
pub mod composer;
pub mod error;
pub mod ids;
pub mod store;
pub mod types;
pub mod workflow;

pub use api::{
    ChatApi, ChatRequest, ChatResponse, HttpChatApi, MockChatApi, SessionRequest,
    SessionResponse,
};
pub use composer::{Composer, SuggestionGroup, SuggestionSelection, VisibleSuggestions};
pub use error::{ApiError, ApiResult, StoreError, StoreResult};
pub use ids::{IdSource, SequentialIds};
pub use store::{ChatStateStore, StoreEvent};
pub use types::{Chat, ChatId, Message, MessageId, Role, SessionId};
pub use workflow::{
    StaleResponsePolicy, SubmissionOutcome, SubmissionState, SubmitOutcome, SubmissionWorkflow,
    WorkflowConfig, ERROR_REPLY,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
