use std::sync::Arc;

use assistant_core::{
    Chat, ChatId, ChatStateStore, Composer, Message, StoreEvent, SubmitOutcome,
    SubmissionWorkflow,
};
use chrono::{DateTime, Local, Utc};
use tokio::sync::{broadcast, mpsc};

/// Shown in an empty chat panel
pub const GREETING: &str = "Привет! Как я могу помочь вам?";

/// Header title when no chat is selected
pub const EMPTY_CHAT_TITLE: &str = "Текущий чат";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Prompt,
}

/// Row of the sidebar the cursor can land on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarEntry {
    NewChat,
    Chat(ChatId),
}

/// Sidebar grouping by creation day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Yesterday,
    Earlier,
}

impl Period {
    pub fn of(created_at: DateTime<Utc>, now: DateTime<Local>) -> Self {
        let day = created_at.with_timezone(&Local).date_naive();
        let today = now.date_naive();
        if day >= today {
            Period::Today
        } else if today.pred_opt() == Some(day) {
            Period::Yesterday
        } else {
            Period::Earlier
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Today => "Сегодня",
            Period::Yesterday => "Вчера",
            Period::Earlier => "Ранее",
        }
    }
}

/// Group chats by period, keeping their relative order
pub fn group_by_period(chats: Vec<Chat>, now: DateTime<Local>) -> Vec<(Period, Vec<Chat>)> {
    let mut groups: Vec<(Period, Vec<Chat>)> = Vec::new();
    for period in [Period::Today, Period::Yesterday, Period::Earlier] {
        let members: Vec<Chat> = chats
            .iter()
            .filter(|c| Period::of(c.created_at, now) == period)
            .cloned()
            .collect();
        if !members.is_empty() {
            groups.push((period, members));
        }
    }
    groups
}

pub struct App {
    pub store: Arc<ChatStateStore>,
    workflow: Arc<SubmissionWorkflow>,
    pub composer: Composer,
    /// Dialog visible; when closed only the trigger is drawn
    pub open: bool,
    pub focus: Focus,
    pub sidebar_cursor: usize,
    /// Lines scrolled up from the bottom of the message panel
    pub scroll_offset: usize,
    pub notice: Option<String>,
    pub backend_label: String,
    /// Set from spawn until the outcome is drained, before the workflow's own counter moves
    pending: bool,
    store_rx: broadcast::Receiver<StoreEvent>,
    outcome_tx: mpsc::UnboundedSender<SubmitOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<SubmitOutcome>,
}

impl App {
    pub fn new(workflow: Arc<SubmissionWorkflow>, backend_label: impl Into<String>) -> Self {
        let store = Arc::clone(workflow.store());
        let store_rx = store.subscribe();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Self {
            store,
            workflow,
            composer: Composer::new(),
            open: false,
            focus: Focus::Prompt,
            sidebar_cursor: 0,
            scroll_offset: 0,
            notice: None,
            backend_label: backend_label.into(),
            pending: false,
            store_rx,
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Sidebar => Focus::Prompt,
            Focus::Prompt => Focus::Sidebar,
        };
    }

    pub fn is_submitting(&self) -> bool {
        self.pending || self.workflow.is_submitting()
    }

    /// Submit the composer's prompt on a background task
    pub fn submit(&mut self) {
        if self.is_submitting() {
            return;
        }
        let Some(prompt) = self.composer.take_prompt() else {
            return;
        };

        self.notice = None;
        self.pending = true;
        let workflow = Arc::clone(&self.workflow);
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = workflow.submit(&prompt).await;
            let _ = tx.send(outcome);
        });
    }

    /// Drain store notifications and finished submissions
    pub fn process_events(&mut self) {
        let active = self.store.active_chat_id();
        loop {
            match self.store_rx.try_recv() {
                Ok(StoreEvent::MessagesChanged { chat_id, .. }) => {
                    if active.as_deref() == Some(chat_id.as_str()) {
                        self.scroll_offset = 0;
                    }
                }
                Ok(StoreEvent::ActiveChatChanged { .. }) => {
                    self.scroll_offset = 0;
                }
                Ok(StoreEvent::ChatUpserted { .. }) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} store events", skipped);
                }
                Err(_) => break,
            }
        }

        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.pending = false;
            match outcome {
                SubmitOutcome::SessionFailed { error } => {
                    tracing::warn!("Session creation failed: {}", error);
                    self.notice = Some("Не удалось создать сессию. Попробуйте ещё раз.".to_string());
                }
                SubmitOutcome::Discarded { .. } => {
                    self.notice = Some("Ответ пришёл в неактивный чат и был отброшен.".to_string());
                }
                SubmitOutcome::Settled { .. } | SubmitOutcome::Ignored => {}
            }
        }
    }

    /// Clear the selection so the next message starts a new chat
    pub fn new_chat(&mut self) {
        if let Err(e) = self.store.set_active_chat(None) {
            tracing::error!("Failed to clear active chat: {}", e);
        }
        self.sidebar_cursor = 0;
        self.focus = Focus::Prompt;
    }

    pub fn sidebar_entries(&self) -> Vec<SidebarEntry> {
        let mut entries = vec![SidebarEntry::NewChat];
        for (_, chats) in group_by_period(self.store.chats(), Local::now()) {
            entries.extend(chats.into_iter().map(|c| SidebarEntry::Chat(c.id)));
        }
        entries
    }

    pub fn cursor_up(&mut self) {
        self.sidebar_cursor = self.sidebar_cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        let last = self.sidebar_entries().len().saturating_sub(1);
        self.sidebar_cursor = (self.sidebar_cursor + 1).min(last);
    }

    /// Activate the sidebar row under the cursor
    pub fn activate_sidebar(&mut self) {
        match self.sidebar_entries().get(self.sidebar_cursor).cloned() {
            Some(SidebarEntry::NewChat) => self.new_chat(),
            Some(SidebarEntry::Chat(id)) => {
                if let Err(e) = self.store.set_active_chat(Some(&id)) {
                    tracing::error!("Failed to select chat: {}", e);
                }
                self.focus = Focus::Prompt;
            }
            None => {}
        }
    }

    pub fn active_messages(&self) -> Vec<Message> {
        self.store
            .active_chat_id()
            .map(|id| self.store.get_messages(&id))
            .unwrap_or_default()
    }

    pub fn header_title(&self) -> String {
        self.store
            .active_chat()
            .map(|c| c.title)
            .unwrap_or_else(|| EMPTY_CHAT_TITLE.to_string())
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn push_input(&mut self, c: char) {
        self.composer.push(c);
    }

    pub fn pop_input(&mut self) {
        self.composer.pop();
    }

    pub fn pick_suggestion(&mut self, index: usize) {
        self.composer.pick(index);
    }

    pub fn quick_validate(&mut self) {
        self.composer.quick_validate();
    }
}
