use std::collections::{HashSet, VecDeque};

use crate::api::models::{Conversation, Message, Role};
use crate::chat::transcript::Transcript;

const RECENT_IDS: usize = 1024;

/// Ids of recently pushed messages, so a repeated push for a conversation
/// that is not open does not bump its unread counter twice.
#[derive(Debug, Default)]
struct RecentIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl RecentIds {
    fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        if self.order.len() > RECENT_IDS {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        true
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushEffect {
    pub transcript_changed: bool,
    pub list_changed: bool,
}

/// Conversation list plus the transcript of the selected conversation.
#[derive(Debug, Default)]
pub struct ConversationView {
    conversations: Vec<Conversation>,
    active: Option<String>,
    transcript: Transcript,
    recent: RecentIds,
}

impl ConversationView {
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        if let Some(active) = &self.active {
            if let Some(conv) = self.conversations.iter_mut().find(|c| &c.id == active) {
                conv.unread.admin = 0;
            }
        }
    }

    /// Make `id` the open conversation with an empty transcript.
    pub fn select(&mut self, id: &str) {
        self.active = Some(id.to_string());
        self.transcript.clear();
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) {
            conv.unread.admin = 0;
        }
    }

    /// Merge a fetched page if it still belongs to the open conversation.
    /// Returns `None` for a stale response.
    pub fn apply_history(&mut self, id: &str, history: Vec<Message>) -> Option<usize> {
        if !self.is_active(id) {
            return None;
        }
        let history = history.into_iter().filter(|m| m.conversation_id.is_empty() || m.conversation_id == id);
        Some(self.transcript.merge(history.collect()))
    }

    pub fn apply_push(&mut self, message: Message) -> PushEffect {
        let mut effect = PushEffect::default();
        let is_active = self.is_active(&message.conversation_id);
        let first_seen = self.recent.insert(&message.id);

        if let Some(pos) = self.conversations.iter().position(|c| c.id == message.conversation_id) {
            let mut conv = self.conversations.remove(pos);
            conv.apply_preview(&message);
            if first_seen && !is_active && message.sender_role != Role::Admin {
                conv.unread.admin += 1;
            }
            self.conversations.insert(0, conv);
            effect.list_changed = true;
        } else {
            log::debug!("Push for unlisted conversation {}", message.conversation_id);
        }

        if is_active {
            effect.transcript_changed = self.transcript.insert(message);
        }
        effect
    }

    pub fn filter(&self, query: &str) -> Vec<&Conversation> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.conversations.iter().collect();
        }
        self.conversations
            .iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&needle)
                    || c.participant_name.as_deref().is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .collect()
    }
}
