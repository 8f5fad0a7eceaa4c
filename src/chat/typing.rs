use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::events::Typing;

/// Quiet period after the last keystroke before "typing stopped" goes out.
pub const TYPING_IDLE: Duration = Duration::from_secs(2);

/// How long a remote "typing" claim stays visible without a refresh.
pub const TYPING_TTL: Duration = Duration::from_secs(3);

pub type TypingEmitter = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Outbound typing relay: "started" on every keystroke, one "stopped" once idle.
pub struct TypingDebounce {
    idle: Duration,
    emit: TypingEmitter,
    pending: Option<(String, JoinHandle<()>)>,
}

impl TypingDebounce {
    pub fn new(idle: Duration, emit: TypingEmitter) -> Self {
        Self { idle, emit, pending: None }
    }

    pub fn keystroke(&mut self, group_id: &str) {
        match self.pending.take() {
            Some((group, timer)) if group != group_id => {
                if !timer.is_finished() {
                    timer.abort();
                    (self.emit)(&group, false);
                }
            }
            Some((_, timer)) => timer.abort(),
            None => {}
        }
        (self.emit)(group_id, true);

        let emit = self.emit.clone();
        let group = group_id.to_string();
        let idle = self.idle;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            emit(&group, false);
        });
        self.pending = Some((group_id.to_string(), timer));
    }

    /// Stop the pending timer, announcing "stopped" right away if it had not fired.
    pub fn cancel(&mut self) {
        if let Some((group, timer)) = self.pending.take() {
            if !timer.is_finished() {
                timer.abort();
                (self.emit)(&group, false);
            }
        }
    }
}

impl Drop for TypingDebounce {
    fn drop(&mut self) {
        if let Some((_, timer)) = self.pending.take() {
            timer.abort();
        }
    }
}

/// Who is typing in the open conversation, keyed by participant id.
#[derive(Debug, Default)]
pub struct TypingSet {
    entries: HashMap<String, (String, Instant)>,
}

impl TypingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a remote typing event; `self_id` claims are never shown.
    pub fn apply(&mut self, event: &Typing, self_id: &str, now: Instant, ttl: Duration) -> bool {
        if event.user_id == self_id || event.user_id.is_empty() {
            return false;
        }
        if event.is_typing {
            let name = if event.user_name.is_empty() { event.user_id.clone() } else { event.user_name.clone() };
            let fresh = !self.entries.contains_key(&event.user_id);
            self.entries.insert(event.user_id.clone(), (name, now + ttl));
            fresh
        } else {
            self.entries.remove(&event.user_id).is_some()
        }
    }

    /// Drop expired claims; returns whether anything went away.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.entries.len();
        self.entries.retain(|_, (_, deadline)| *deadline > now);
        before != self.entries.len()
    }

    pub fn names(&self, now: Instant) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
