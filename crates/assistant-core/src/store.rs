//! # Chat State Store
//!
//! Holds the chat list, the active chat and the chat → messages mapping.
//!
//! All writes replace whole entries; nothing is mutated in place. Every
//! observable change bumps [`ChatStateStore::revision`] and is broadcast to
//! subscribers, while no-op writes are silent.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::types::{Chat, ChatId, Message};

const EVENT_CAPACITY: usize = 256;

/// Change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ChatUpserted { chat_id: ChatId },
    ActiveChatChanged { chat_id: Option<ChatId> },
    MessagesChanged { chat_id: ChatId, len: usize },
}

#[derive(Debug, Default)]
struct StoreState {
    /// Newest first
    chats: Vec<Chat>,
    active: Option<ChatId>,
    messages: HashMap<ChatId, Vec<Message>>,
    revision: u64,
}

impl StoreState {
    fn contains(&self, chat_id: &str) -> bool {
        self.chats.iter().any(|c| c.id == chat_id)
    }
}

pub struct ChatStateStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl ChatStateStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Number of observable changes so far
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Insert a new chat at the head, or replace a known one in place; the chat becomes active
    pub fn upsert_chat(&self, chat: Chat) {
        let chat_id = chat.id.clone();
        let mut events = Vec::with_capacity(2);

        {
            let mut state = self.state.write();
            match state.chats.iter().position(|c| c.id == chat.id) {
                Some(pos) => state.chats[pos] = chat,
                None => state.chats.insert(0, chat),
            }
            state.revision += 1;
            events.push(StoreEvent::ChatUpserted {
                chat_id: chat_id.clone(),
            });

            if state.active.as_deref() != Some(chat_id.as_str()) {
                state.active = Some(chat_id.clone());
                state.revision += 1;
                events.push(StoreEvent::ActiveChatChanged {
                    chat_id: Some(chat_id.clone()),
                });
            }
        }

        debug!("Upserted chat {}", chat_id);
        self.emit(events);
    }

    /// Select a chat, or clear the selection with `None`
    pub fn set_active_chat(&self, chat_id: Option<&str>) -> StoreResult<()> {
        {
            let mut state = self.state.write();
            if let Some(id) = chat_id {
                if !state.contains(id) {
                    return Err(StoreError::unknown_chat(id));
                }
            }
            if state.active.as_deref() == chat_id {
                return Ok(());
            }
            state.active = chat_id.map(str::to_string);
            state.revision += 1;
        }

        debug!("Active chat set to {:?}", chat_id);
        self.emit(vec![StoreEvent::ActiveChatChanged {
            chat_id: chat_id.map(str::to_string),
        }]);
        Ok(())
    }

    /// Replace a chat's message list; returns `false` when the write was a no-op
    pub fn set_messages(&self, chat_id: &str, messages: Vec<Message>) -> StoreResult<bool> {
        let len = messages.len();
        {
            let mut state = self.state.write();
            if !state.contains(chat_id) {
                return Err(StoreError::unknown_chat(chat_id));
            }

            let unchanged = match state.messages.get(chat_id) {
                Some(current) => *current == messages,
                None => messages.is_empty(),
            };
            if unchanged {
                return Ok(false);
            }

            state.messages.insert(chat_id.to_string(), messages);
            state.revision += 1;
        }

        debug!("Chat {} now has {} messages", chat_id, len);
        self.emit(vec![StoreEvent::MessagesChanged {
            chat_id: chat_id.to_string(),
            len,
        }]);
        Ok(true)
    }

    /// Push one message onto a chat's list under a single write lock
    pub fn append_message(&self, chat_id: &str, message: Message) -> StoreResult<usize> {
        let len = {
            let mut state = self.state.write();
            if !state.contains(chat_id) {
                return Err(StoreError::unknown_chat(chat_id));
            }
            let messages = state.messages.entry(chat_id.to_string()).or_default();
            messages.push(message);
            let len = messages.len();
            state.revision += 1;
            len
        };

        debug!("Chat {} now has {} messages", chat_id, len);
        self.emit(vec![StoreEvent::MessagesChanged {
            chat_id: chat_id.to_string(),
            len,
        }]);
        Ok(len)
    }

    /// Messages of a chat in display order; empty when it has none
    pub fn get_messages(&self, chat_id: &str) -> Vec<Message> {
        self.state
            .read()
            .messages
            .get(chat_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Chat list snapshot, newest first
    pub fn chats(&self) -> Vec<Chat> {
        self.state.read().chats.clone()
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.state
            .read()
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
    }

    pub fn active_chat_id(&self) -> Option<ChatId> {
        self.state.read().active.clone()
    }

    pub fn active_chat(&self) -> Option<Chat> {
        let state = self.state.read();
        let active = state.active.as_deref()?;
        state.chats.iter().find(|c| c.id == active).cloned()
    }

    fn emit(&self, events: Vec<StoreEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

impl Default for ChatStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain(rx: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return events,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
    }

    #[test]
    fn test_upsert_inserts_at_head_and_activates() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "first"));
        store.upsert_chat(Chat::new("b", Some(2), "second"));

        let ids: Vec<_> = store.chats().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.active_chat_id().as_deref(), Some("b"));
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", None, "first"));
        store.upsert_chat(Chat::new("b", Some(2), "second"));

        store.upsert_chat(Chat::new("a", Some(9), "rebuilt"));

        let chats = store.chats();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[1].id, "a");
        assert_eq!(chats[1].session_id, Some(9));
        assert_eq!(store.active_chat_id().as_deref(), Some("a"));
    }

    #[test]
    fn test_set_active_chat() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "first"));

        store.set_active_chat(None).unwrap();
        assert!(store.active_chat().is_none());

        store.set_active_chat(Some("a")).unwrap();
        assert_eq!(store.active_chat().unwrap().id, "a");

        let err = store.set_active_chat(Some("missing")).unwrap_err();
        assert_eq!(err, StoreError::unknown_chat("missing"));
    }

    #[test]
    fn test_get_messages_defaults_to_empty() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "first"));
        assert!(store.get_messages("a").is_empty());
        assert!(store.get_messages("unknown").is_empty());
    }

    #[test]
    fn test_set_messages_rejects_unknown_chat() {
        let store = ChatStateStore::new();
        let result = store.set_messages("ghost", vec![Message::user(1, "hi")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_append_message_extends_list() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "a"));
        let mut rx = store.subscribe();
        let before = store.revision();

        assert_eq!(store.append_message("a", Message::user(1, "hi")).unwrap(), 1);
        assert_eq!(store.append_message("a", Message::assistant(2, "hello")).unwrap(), 2);

        let contents: Vec<_> = store.get_messages("a").into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["hi", "hello"]);
        assert_eq!(store.revision(), before + 2);
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::MessagesChanged {
                chat_id: "a".to_string(),
                len: 1
            }
        );
    }

    #[test]
    fn test_append_message_rejects_unknown_chat() {
        let store = ChatStateStore::new();
        assert!(matches!(
            store.append_message("nope", Message::user(1, "hi")),
            Err(StoreError::UnknownChat { .. })
        ));
    }

    #[test]
    fn test_identical_writes_notify_once() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "first"));
        let mut rx = store.subscribe();

        let messages = vec![Message::user(1, "hi"), Message::assistant(2, "hello")];
        assert!(store.set_messages("a", messages.clone()).unwrap());
        let revision = store.revision();
        assert!(!store.set_messages("a", messages).unwrap());
        assert_eq!(store.revision(), revision);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![StoreEvent::MessagesChanged {
                chat_id: "a".to_string(),
                len: 2
            }]
        );
    }

    #[test]
    fn test_empty_write_to_absent_entry_is_noop() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "first"));
        let revision = store.revision();
        assert!(!store.set_messages("a", Vec::new()).unwrap());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_reselecting_active_chat_is_silent() {
        let store = ChatStateStore::new();
        store.upsert_chat(Chat::new("a", Some(1), "first"));
        let mut rx = store.subscribe();

        store.set_active_chat(Some("a")).unwrap();
        assert!(drain(&mut rx).is_empty());
    }
}
