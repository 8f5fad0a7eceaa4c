use std::collections::HashSet;

use crate::api::models::Message;

/// Messages of one conversation, ascending by `created_at`, each id at most once.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// Insert unless the id is already present. Returns whether it was added.
    ///
    /// Lands after every message with an equal or earlier timestamp, so
    /// in-order delivery is a plain append.
    pub fn insert(&mut self, message: Message) -> bool {
        if message.id.is_empty() || self.ids.contains(&message.id) {
            return false;
        }
        self.ids.insert(message.id.clone());
        let pos = self.messages.partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(pos, message);
        true
    }

    /// Fold a fetched history page in; returns how many messages were new.
    pub fn merge(&mut self, history: Vec<Message>) -> usize {
        history.into_iter().map(|m| self.insert(m)).filter(|added| *added).count()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::models::Role;
    use chrono::{DateTime, Utc};

    pub(crate) fn msg(id: &str, conversation: &str, at: &str, text: &str) -> Message {
        Message {
            id: id.into(),
            conversation_id: conversation.into(),
            sender_id: "u1".into(),
            sender_name: "Ravi".into(),
            sender_role: Role::Seller,
            text: Some(text.into()),
            attachment: None,
            created_at: at.parse::<DateTime<Utc>>().unwrap(),
            read_by: Vec::new(),
        }
    }

    fn ids(t: &Transcript) -> Vec<&str> {
        t.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn duplicate_ids_are_ignored_in_any_order() {
        let a = msg("m1", "g1", "2024-01-01T10:00:00Z", "one");
        let b = msg("m2", "g1", "2024-01-01T10:01:00Z", "two");

        let mut push_first = Transcript::new();
        assert!(push_first.insert(b.clone()));
        assert_eq!(push_first.merge(vec![a.clone(), b.clone()]), 1);
        assert!(!push_first.insert(b.clone()));

        let mut fetch_first = Transcript::new();
        fetch_first.merge(vec![a.clone(), b.clone()]);
        assert!(!fetch_first.insert(b));
        assert!(!fetch_first.insert(a));

        assert_eq!(ids(&push_first), vec!["m1", "m2"]);
        assert_eq!(ids(&fetch_first), vec!["m1", "m2"]);
    }

    #[test]
    fn messages_without_id_are_refused() {
        let mut t = Transcript::new();
        assert!(!t.insert(msg("", "g1", "2024-01-01T10:00:00Z", "first")));
        assert!(!t.insert(msg("", "g1", "2024-01-01T10:01:00Z", "second")));
        assert_eq!(t.merge(vec![msg("", "g1", "2024-01-01T10:02:00Z", "third")]), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn late_message_is_sorted_in() {
        let mut t = Transcript::new();
        t.insert(msg("m1", "g1", "2024-01-01T10:00:00Z", "a"));
        t.insert(msg("m3", "g1", "2024-01-01T10:02:00Z", "c"));
        t.insert(msg("m2", "g1", "2024-01-01T10:01:00Z", "b"));
        t.insert(msg("m4", "g1", "2024-01-01T10:02:00Z", "d"));
        assert_eq!(ids(&t), vec!["m1", "m2", "m3", "m4"]);
        assert_eq!(t.last().map(|m| m.id.as_str()), Some("m4"));
    }

    #[test]
    fn clear_forgets_ids() {
        let mut t = Transcript::new();
        t.insert(msg("m1", "g1", "2024-01-01T10:00:00Z", "a"));
        t.clear();
        assert!(t.is_empty());
        assert!(t.insert(msg("m1", "g1", "2024-01-01T10:00:00Z", "a")));
    }
}
