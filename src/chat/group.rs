//! Two-way support group chat.
//!
//! Outbound messages go over REST only; the copy that ends up in the
//! transcript is always the one the server pushes back as `groupMessage`.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::api::client::ChatApi;
use crate::api::events::{GROUP_MESSAGE, GROUP_TYPING, GROUP_USER_TYPING, ServerEvent, Typing};
use crate::api::models::{Conversation, Message, Participant};
use crate::chat::typing::{TypingDebounce, TypingEmitter, TypingSet};
use crate::chat::view::ConversationView;
use crate::chat::{ChatSettings, ChatUpdate};
use crate::socket::{ConnectionManager, ListenerId};

/// Participant id the console types under. No real account uses it, so our
/// own typing echo can be recognised and dropped.
pub const ADMIN_TYPING_ID: &str = "admin-console";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Blank text, nothing selected, or a send for this conversation is still in flight.
    Skipped,
    Failed,
}

#[derive(Default)]
struct GroupState {
    view: ConversationView,
    participants: Vec<Participant>,
    typing: TypingSet,
    sending: HashSet<String>,
}

struct GroupInner {
    api: Arc<dyn ChatApi>,
    connection: ConnectionManager,
    settings: ChatSettings,
    state: Mutex<GroupState>,
    debounce: Mutex<TypingDebounce>,
    updates: broadcast::Sender<ChatUpdate>,
    listeners: Mutex<Vec<(&'static str, ListenerId)>>,
}

#[derive(Clone)]
pub struct GroupChat {
    inner: Arc<GroupInner>,
}

impl GroupChat {
    pub fn new(api: Arc<dyn ChatApi>, connection: ConnectionManager, settings: ChatSettings) -> Self {
        let emitter: TypingEmitter = {
            let connection = connection.clone();
            let name = settings.admin_name.clone();
            Arc::new(move |group: &str, is_typing: bool| {
                let event = Typing {
                    group_id: group.to_string(),
                    user_id: ADMIN_TYPING_ID.to_string(),
                    user_name: name.clone(),
                    is_typing,
                };
                connection.emit(GROUP_TYPING, serde_json::to_value(&event).unwrap_or(Value::Null));
            })
        };
        let (updates, _) = broadcast::channel(64);
        let inner = Arc::new(GroupInner {
            api,
            connection,
            debounce: Mutex::new(TypingDebounce::new(settings.typing_idle, emitter)),
            settings,
            state: Mutex::new(GroupState::default()),
            updates,
            listeners: Mutex::new(Vec::new()),
        });
        attach(&inner);
        Self { inner }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.inner.state.lock().view.conversations().to_vec()
    }

    pub fn filter_conversations(&self, query: &str) -> Vec<Conversation> {
        self.inner.state.lock().view.filter(query).into_iter().cloned().collect()
    }

    pub fn active(&self) -> Option<String> {
        self.inner.state.lock().view.active().map(str::to_string)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().view.transcript().messages().to_vec()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.inner.state.lock().participants.clone()
    }

    pub fn typing_names(&self) -> Vec<String> {
        self.inner.state.lock().typing.names(Instant::now())
    }

    pub fn is_sending(&self) -> bool {
        let state = self.inner.state.lock();
        state.view.active().is_some_and(|id| state.sending.contains(id))
    }

    pub async fn load_conversations(&self) {
        match self.inner.api.groups().await {
            Ok(list) => {
                self.inner.state.lock().view.set_conversations(list);
                self.inner.notify(ChatUpdate::ConversationsChanged);
            }
            Err(e) => log::warn!("Failed to load support groups: {e}"),
        }
    }

    /// Open `id`: fresh transcript and roster, both fetched in full.
    pub async fn select_conversation(&self, id: &str) {
        {
            let mut state = self.inner.state.lock();
            state.view.select(id);
            state.participants.clear();
            state.typing.clear();
        }
        self.inner.debounce.lock().cancel();
        for update in [
            ChatUpdate::ConversationsChanged,
            ChatUpdate::TranscriptChanged { scroll_to_bottom: false },
            ChatUpdate::ParticipantsChanged,
            ChatUpdate::TypingChanged,
        ] {
            self.inner.notify(update);
        }

        let api = &self.inner.api;
        let (history, roster) =
            tokio::join!(api.group_messages(id, self.inner.settings.history_limit), api.group_participants(id));

        match history {
            Ok(messages) => {
                let applied = self.inner.state.lock().view.apply_history(id, messages);
                match applied {
                    Some(_) => self.inner.notify(ChatUpdate::TranscriptChanged { scroll_to_bottom: true }),
                    None => log::debug!("Dropping stale history for {id}"),
                }
            }
            Err(e) => log::warn!("Failed to load messages for {id}: {e}"),
        }

        match roster {
            Ok(participants) => {
                let mut state = self.inner.state.lock();
                if state.view.is_active(id) {
                    state.participants = participants;
                    drop(state);
                    self.inner.notify(ChatUpdate::ParticipantsChanged);
                }
            }
            Err(e) => log::warn!("Failed to load participants for {id}: {e}"),
        }

        if !self.inner.state.lock().view.is_active(id) {
            return;
        }
        if let Err(e) = api.mark_group_read(id).await {
            log::debug!("Could not mark {id} read: {e}");
        }
    }

    /// Re-fetch the open conversation's history and merge it in.
    pub async fn refresh(&self) {
        let Some(id) = self.active() else { return };
        match self.inner.api.group_messages(&id, self.inner.settings.history_limit).await {
            Ok(messages) => {
                let added = self.inner.state.lock().view.apply_history(&id, messages);
                if added.is_some_and(|n| n > 0) {
                    self.inner.notify(ChatUpdate::TranscriptChanged { scroll_to_bottom: true });
                }
            }
            Err(e) => log::warn!("Failed to refresh messages for {id}: {e}"),
        }
    }

    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Skipped;
        }
        let group = {
            let mut state = self.inner.state.lock();
            let Some(active) = state.view.active().map(str::to_string) else {
                return SendOutcome::Skipped;
            };
            if !state.sending.insert(active.clone()) {
                return SendOutcome::Skipped;
            }
            active
        };

        let result = self.inner.api.send_group_message(&group, text).await;
        self.inner.state.lock().sending.remove(&group);
        match result {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                log::warn!("Failed to send message to {group}: {e}");
                SendOutcome::Failed
            }
        }
    }

    /// Call on every edit of the compose box.
    pub fn keystroke(&self) {
        let Some(group) = self.active() else { return };
        self.inner.debounce.lock().keystroke(&group);
    }

    /// Stop listening on the shared connection. Other subscribers keep theirs.
    pub fn detach(&self) {
        self.inner.detach();
    }
}

fn attach(inner: &Arc<GroupInner>) {
    let mut ids = Vec::new();
    for event in [GROUP_MESSAGE, GROUP_USER_TYPING] {
        let weak: Weak<GroupInner> = Arc::downgrade(inner);
        let id = inner.connection.on(event, move |data| {
            let Some(inner) = weak.upgrade() else { return };
            match ServerEvent::decode(event, data) {
                Some(ServerEvent::GroupMessage(message)) => inner.on_message(message),
                Some(ServerEvent::GroupUserTyping(typing)) => on_typing(&inner, typing),
                _ => {}
            }
        });
        ids.push((event, id));
    }
    *inner.listeners.lock() = ids;
}

fn on_typing(inner: &Arc<GroupInner>, event: Typing) {
    let ttl = inner.settings.typing_ttl;
    let changed = {
        let mut state = inner.state.lock();
        if !state.view.is_active(&event.group_id) {
            return;
        }
        state.typing.apply(&event, ADMIN_TYPING_ID, Instant::now(), ttl)
    };
    if changed {
        inner.notify(ChatUpdate::TypingChanged);
    }
    if event.is_typing && event.user_id != ADMIN_TYPING_ID {
        let weak = Arc::downgrade(inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(inner) = weak.upgrade() else { return };
            let expired = inner.state.lock().typing.prune(Instant::now());
            if expired {
                inner.notify(ChatUpdate::TypingChanged);
            }
        });
    }
}

impl GroupInner {
    fn notify(&self, update: ChatUpdate) {
        // no subscribers is fine
        let _ = self.updates.send(update);
    }

    fn on_message(&self, message: Message) {
        let sender = message.sender_id.clone();
        let (effect, typing_cleared) = {
            let mut state = self.state.lock();
            let active = state.view.is_active(&message.conversation_id);
            let effect = state.view.apply_push(message);
            let cleared = active
                && state.typing.apply(
                    &Typing { group_id: String::new(), user_id: sender, user_name: String::new(), is_typing: false },
                    ADMIN_TYPING_ID,
                    Instant::now(),
                    self.settings.typing_ttl,
                );
            (effect, cleared)
        };
        if effect.list_changed {
            self.notify(ChatUpdate::ConversationsChanged);
        }
        if effect.transcript_changed {
            self.notify(ChatUpdate::TranscriptChanged { scroll_to_bottom: true });
        }
        if typing_cleared {
            self.notify(ChatUpdate::TypingChanged);
        }
    }

    fn detach(&self) {
        for (event, id) in self.listeners.lock().drain(..) {
            self.connection.off(event, Some(id));
        }
    }
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        self.detach();
    }
}
