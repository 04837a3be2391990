use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use assistant_core::{
    ApiError, ApiResult, Chat, ChatApi, ChatResponse, ChatStateStore, Message, MockChatApi, Role,
    SequentialIds, SessionId, SessionResponse, StaleResponsePolicy, SubmissionOutcome,
    SubmitOutcome, SubmissionWorkflow, WorkflowConfig, ERROR_REPLY,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Fake backend answering from scripted queues and recording every call
#[derive(Default)]
struct ScriptedApi {
    sessions: Mutex<VecDeque<ApiResult<SessionResponse>>>,
    replies: Mutex<VecDeque<ApiResult<ChatResponse>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self::default()
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn session(self, result: ApiResult<SessionResponse>) -> Self {
        self.sessions.lock().push_back(result);
        self
    }

    fn reply(self, result: ApiResult<ChatResponse>) -> Self {
        self.replies.lock().push_back(result);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

fn ok_session(session_id: SessionId) -> ApiResult<SessionResponse> {
    Ok(SessionResponse { session_id })
}

fn ok_reply(text: &str) -> ApiResult<ChatResponse> {
    Ok(ChatResponse {
        response: text.to_string(),
    })
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn create_session(&self, user_id: &str) -> ApiResult<SessionResponse> {
        self.calls.lock().push(format!("session:{user_id}"));
        self.sessions
            .lock()
            .pop_front()
            .unwrap_or_else(|| ok_session(1))
    }

    async fn send_chat_message(
        &self,
        session_id: SessionId,
        message: &str,
    ) -> ApiResult<ChatResponse> {
        self.calls.lock().push(format!("chat:{session_id}:{message}"));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| ok_reply("ok"))
    }
}

fn setup(api: Arc<dyn ChatApi>, config: WorkflowConfig) -> (Arc<SubmissionWorkflow>, Arc<ChatStateStore>) {
    let store = Arc::new(ChatStateStore::new());
    let workflow = SubmissionWorkflow::new(
        api,
        Arc::clone(&store),
        Arc::new(SequentialIds::new()),
        config,
    );
    (Arc::new(workflow), store)
}

fn roles(messages: &[Message]) -> Vec<Role> {
    messages.iter().map(|m| m.role).collect()
}

#[tokio::test]
async fn test_first_submit_creates_exactly_one_chat() {
    for reply in [ok_reply("hi there"), Err(ApiError::Status { status: 500 })] {
        let api = Arc::new(ScriptedApi::new().session(ok_session(3)).reply(reply));
        let (workflow, store) = setup(api, WorkflowConfig::new("u1"));

        let outcome = workflow.submit("hello").await;

        let chats = store.chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(outcome.chat_id(), Some(chats[0].id.as_str()));
        let messages = store.get_messages(&chats[0].id);
        assert_eq!(roles(&messages), vec![Role::User, Role::Assistant]);
        assert_eq!(messages[0].content, "hello");
    }
}

#[tokio::test]
async fn test_submissions_are_append_only_with_unique_ids() {
    let api = Arc::new(ScriptedApi::new().session(ok_session(11)));
    let (workflow, store) = setup(api.clone(), WorkflowConfig::new("u1"));

    let prompts = ["one", "two", "three", "four"];
    for prompt in prompts {
        workflow.submit(prompt).await;
    }

    let chat = store.active_chat().unwrap();
    let messages = store.get_messages(&chat.id);
    assert_eq!(messages.len(), prompts.len() * 2);

    let ids: HashSet<_> = messages.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), messages.len());

    let user_contents: Vec<_> = messages
        .iter()
        .filter(|m| m.is_user())
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(user_contents, prompts);

    // One session, then every message goes to it
    let calls = api.calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("session:")).count(), 1);
    assert!(calls.contains(&"chat:11:four".to_string()));
}

#[tokio::test]
async fn test_repeated_set_messages_notifies_at_most_once() {
    let store = ChatStateStore::new();
    store.upsert_chat(Chat::new("c", Some(1), "x"));
    let messages = vec![Message::user(1, "x")];

    let mut rx = store.subscribe();
    store.set_messages("c", messages.clone()).unwrap();
    store.set_messages("c", messages).unwrap();

    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_session_failure_creates_no_chat() {
    let api = Arc::new(ScriptedApi::new().session(Err(ApiError::Status { status: 502 })));
    let (workflow, store) = setup(api.clone(), WorkflowConfig::new("u1"));

    let outcome = workflow.submit("hello").await;

    assert!(matches!(outcome, SubmitOutcome::SessionFailed { .. }));
    assert!(store.chats().is_empty());
    assert!(store.active_chat_id().is_none());
    assert!(!workflow.is_submitting());
    assert_eq!(api.calls(), vec!["session:u1".to_string()]);
}

#[tokio::test]
async fn test_session_failure_reports_into_active_sessionless_chat() {
    let api = Arc::new(ScriptedApi::new().session(Err(ApiError::rejected("down"))));
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));
    store.upsert_chat(Chat::new("draft", None, "draft"));

    workflow.submit("hello").await;

    assert_eq!(store.chats().len(), 1);
    let messages = store.get_messages("draft");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::Assistant);
    assert_eq!(messages[0].content, ERROR_REPLY);
}

#[tokio::test]
async fn test_sessionless_chat_is_rebuilt_under_its_id() {
    let api = Arc::new(
        ScriptedApi::new()
            .session(ok_session(8))
            .reply(ok_reply("re:hello")),
    );
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));
    store.upsert_chat(Chat::new("draft", None, "Черновик"));
    store
        .set_messages("draft", vec![Message::user(100, "old")])
        .unwrap();
    store.upsert_chat(Chat::new("other", Some(2), "other"));
    store.set_active_chat(Some("draft")).unwrap();

    let outcome = workflow.submit("hello").await;

    assert_eq!(outcome.chat_id(), Some("draft"));
    let chats = store.chats();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[1].id, "draft");
    assert_eq!(chats[1].session_id, Some(8));
    assert_eq!(chats[1].title, "hello");

    // The earlier draft history is replaced, starting from the new user message
    let contents: Vec<_> = store
        .get_messages("draft")
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["hello", "re:hello"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_overlapping_submissions_lose_no_messages() {
    const SUBMISSIONS: usize = 32;

    for _ in 0..20 {
        let api = Arc::new(ScriptedApi::new());
        let (workflow, store) = setup(api, WorkflowConfig::new("u1"));
        store.upsert_chat(Chat::new("c", Some(5), "busy"));

        let tasks: Vec<_> = (0..SUBMISSIONS)
            .map(|i| {
                let workflow = Arc::clone(&workflow);
                tokio::spawn(async move { workflow.submit(&format!("m{i}")).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_success());
        }

        let messages = store.get_messages("c");
        assert_eq!(messages.len(), SUBMISSIONS * 2);
        let users = messages.iter().filter(|m| m.is_user()).count();
        assert_eq!(users, SUBMISSIONS);
        let ids: HashSet<_> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), messages.len());
    }
}

#[tokio::test]
async fn test_chat_failure_keeps_user_message() {
    let api = Arc::new(ScriptedApi::new().reply(Err(ApiError::Status { status: 500 })));
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));
    store.upsert_chat(Chat::new("c", Some(7), "prior"));
    store
        .set_messages("c", vec![Message::assistant(100, "prior")])
        .unwrap();

    let outcome = workflow.submit("test").await;

    assert!(matches!(
        outcome,
        SubmitOutcome::Settled {
            outcome: SubmissionOutcome::Failure,
            ..
        }
    ));
    let messages = store.get_messages("c");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "test");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, ERROR_REPLY);
}

#[tokio::test]
async fn test_mock_scenario_new_chat_about_code() {
    let api = Arc::new(MockChatApi::new().without_latency().with_session_id(42));
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));

    let prompt = "Как помочь с кодом?";
    let outcome = workflow.submit(prompt).await;
    assert!(outcome.is_success());

    let chat = store.active_chat().unwrap();
    assert_eq!(chat.session_id, Some(42));
    assert_eq!(chat.title, prompt);

    let messages = store.get_messages(&chat.id);
    assert_eq!(roles(&messages), vec![Role::User, Role::Assistant]);
    assert_eq!(messages[0].content, prompt);
    assert_eq!(messages[1].content, MockChatApi::canned_reply(prompt));
}

#[tokio::test]
async fn test_mock_scenario_rejected_chat() {
    let api = Arc::new(MockChatApi::new().without_latency());
    api.fail_chat(true);
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));

    let prior = Message::assistant(500, "Привет! Как я могу помочь вам?");
    store.upsert_chat(Chat::new("c7", Some(7), "prior"));
    store.set_messages("c7", vec![prior.clone()]).unwrap();

    workflow.submit("test").await;

    let messages = store.get_messages("c7");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], prior);
    assert_eq!((messages[1].role, messages[1].content.as_str()), (Role::User, "test"));
    assert_eq!(
        (messages[2].role, messages[2].content.as_str()),
        (Role::Assistant, ERROR_REPLY)
    );
}

#[tokio::test]
async fn test_user_message_visible_before_reply() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::gated(Arc::clone(&gate)).reply(ok_reply("late")));
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));
    store.upsert_chat(Chat::new("c", Some(4), "c"));

    let task = {
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { workflow.submit("quick").await })
    };
    while store.get_messages("c").is_empty() {
        tokio::task::yield_now().await;
    }

    assert!(workflow.is_submitting());
    assert_eq!(roles(&store.get_messages("c")), vec![Role::User]);

    gate.notify_one();
    task.await.unwrap();
    assert_eq!(roles(&store.get_messages("c")), vec![Role::User, Role::Assistant]);
    assert!(!workflow.is_submitting());
}

#[tokio::test]
async fn test_stale_reply_applied_by_default() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::gated(Arc::clone(&gate)));
    let (workflow, store) = setup(api, WorkflowConfig::new("u1"));
    store.upsert_chat(Chat::new("a", Some(1), "a"));

    let task = {
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { workflow.submit("question").await })
    };
    while store.get_messages("a").is_empty() {
        tokio::task::yield_now().await;
    }
    store.set_active_chat(None).unwrap();
    gate.notify_one();

    let outcome = task.await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(store.get_messages("a").len(), 2);
}

#[tokio::test]
async fn test_stale_reply_discarded_when_configured() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::gated(Arc::clone(&gate)));
    let config = WorkflowConfig::new("u1").with_stale_policy(StaleResponsePolicy::DiscardInactive);
    let (workflow, store) = setup(api, config);
    store.upsert_chat(Chat::new("a", Some(1), "a"));
    store.upsert_chat(Chat::new("b", Some(2), "b"));
    store.set_active_chat(Some("a")).unwrap();

    let task = {
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { workflow.submit("question").await })
    };
    while store.get_messages("a").is_empty() {
        tokio::task::yield_now().await;
    }
    store.set_active_chat(Some("b")).unwrap();
    gate.notify_one();

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Discarded { ref chat_id } if chat_id == "a"));
    assert_eq!(roles(&store.get_messages("a")), vec![Role::User]);
    assert!(store.get_messages("b").is_empty());
}
