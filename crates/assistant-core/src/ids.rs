use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::types::{ChatId, MessageId};

/// Source of fresh identifiers for chats and messages
pub trait IdSource: Send + Sync {
    fn next_message_id(&self) -> MessageId;

    fn next_chat_id(&self) -> ChatId;
}

/// Monotonic message counter plus UUID v4 chat ids
#[derive(Debug)]
pub struct SequentialIds {
    next_message: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start message ids at `first`
    pub fn starting_at(first: MessageId) -> Self {
        Self {
            next_message: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next_message_id(&self) -> MessageId {
        self.next_message.fetch_add(1, Ordering::Relaxed)
    }

    fn next_chat_id(&self) -> ChatId {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_message_ids_are_monotonic() {
        let ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next_message_id(), 10);
        assert_eq!(ids.next_message_id(), 11);
    }

    #[test]
    fn test_message_ids_unique_across_threads() {
        let ids = Arc::new(SequentialIds::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_message_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_chat_ids_differ() {
        let ids = SequentialIds::new();
        assert_ne!(ids.next_chat_id(), ids.next_chat_id());
    }
}
