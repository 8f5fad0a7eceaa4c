//! Read-only view of dealer–seller chats. The admin watches, never posts.

use chrono::{Local, NaiveDate, TimeZone};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

use crate::api::client::ChatApi;
use crate::api::events::{CHAT_MESSAGE, ServerEvent};
use crate::api::models::{Conversation, Message};
use crate::chat::separators::{Row, with_separators};
use crate::chat::view::ConversationView;
use crate::chat::{ChatSettings, ChatUpdate};
use crate::socket::{ConnectionManager, ListenerId};

struct PeerInner {
    api: Arc<dyn ChatApi>,
    connection: ConnectionManager,
    settings: ChatSettings,
    view: Mutex<ConversationView>,
    updates: broadcast::Sender<ChatUpdate>,
    listener: Mutex<Option<ListenerId>>,
}

#[derive(Clone)]
pub struct PeerChat {
    inner: Arc<PeerInner>,
}

impl PeerChat {
    pub fn new(api: Arc<dyn ChatApi>, connection: ConnectionManager, settings: ChatSettings) -> Self {
        let (updates, _) = broadcast::channel(64);
        let inner = Arc::new(PeerInner {
            api,
            connection,
            settings,
            view: Mutex::new(ConversationView::default()),
            updates,
            listener: Mutex::new(None),
        });
        let weak: Weak<PeerInner> = Arc::downgrade(&inner);
        let id = inner.connection.on(CHAT_MESSAGE, move |data| {
            let Some(inner) = weak.upgrade() else { return };
            if let Some(ServerEvent::ChatMessage(message)) = ServerEvent::decode(CHAT_MESSAGE, data) {
                inner.on_message(message);
            }
        });
        *inner.listener.lock() = Some(id);
        Self { inner }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.inner.view.lock().conversations().to_vec()
    }

    pub fn filter_conversations(&self, query: &str) -> Vec<Conversation> {
        self.inner.view.lock().filter(query).into_iter().cloned().collect()
    }

    pub fn active(&self) -> Option<String> {
        self.inner.view.lock().active().map(str::to_string)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.view.lock().transcript().messages().to_vec()
    }

    /// Load the chat list; the first chat is opened when nothing is open yet.
    pub async fn load_conversations(&self) {
        let list = match self.inner.api.dealer_chats().await {
            Ok(list) => list,
            Err(e) => {
                log::warn!("Failed to load dealer chats: {e}");
                return;
            }
        };
        let first = {
            let mut view = self.inner.view.lock();
            view.set_conversations(list);
            match view.active() {
                None => view.conversations().first().map(|c| c.id.clone()),
                Some(_) => None,
            }
        };
        self.inner.notify(ChatUpdate::ConversationsChanged);
        if let Some(id) = first {
            self.select_conversation(&id).await;
        }
    }

    pub async fn select_conversation(&self, id: &str) {
        self.inner.view.lock().select(id);
        self.inner.notify(ChatUpdate::ConversationsChanged);
        self.inner.notify(ChatUpdate::TranscriptChanged { scroll_to_bottom: false });

        match self.inner.api.dealer_chat_messages(id, self.inner.settings.history_limit).await {
            Ok(messages) => match self.inner.view.lock().apply_history(id, messages) {
                Some(_) => self.inner.notify(ChatUpdate::TranscriptChanged { scroll_to_bottom: true }),
                None => log::debug!("Dropping stale history for chat {id}"),
            },
            Err(e) => log::warn!("Failed to load messages for chat {id}: {e}"),
        }
    }

    /// Transcript rows with day separators, days counted in `tz`.
    pub fn rows_in<Tz: TimeZone>(&self, today: NaiveDate, tz: &Tz) -> Vec<RowOwned> {
        let view = self.inner.view.lock();
        with_separators(view.transcript().messages(), today, tz).into_iter().map(RowOwned::from).collect()
    }

    pub fn rows(&self) -> Vec<RowOwned> {
        self.rows_in(Local::now().date_naive(), &Local)
    }

    pub fn detach(&self) {
        self.inner.detach();
    }
}

/// [`Row`] detached from the transcript lock.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOwned {
    DateSeparator(String),
    Message(Message),
}

impl From<Row<'_>> for RowOwned {
    fn from(row: Row<'_>) -> Self {
        match row {
            Row::DateSeparator(label) => RowOwned::DateSeparator(label),
            Row::Message(m) => RowOwned::Message(m.clone()),
        }
    }
}

impl PeerInner {
    fn notify(&self, update: ChatUpdate) {
        let _ = self.updates.send(update);
    }

    fn on_message(&self, message: Message) {
        let effect = self.view.lock().apply_push(message);
        if effect.list_changed {
            self.notify(ChatUpdate::ConversationsChanged);
        }
        if effect.transcript_changed {
            self.notify(ChatUpdate::TranscriptChanged { scroll_to_bottom: true });
        }
    }

    fn detach(&self) {
        if let Some(id) = self.listener.lock().take() {
            self.connection.off(CHAT_MESSAGE, Some(id));
        }
    }
}

impl Drop for PeerInner {
    fn drop(&mut self) {
        self.detach();
    }
}
