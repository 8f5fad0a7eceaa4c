pub mod group;
pub mod peer;
pub mod separators;
pub mod transcript;
pub mod typing;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use crate::app::{AppState, DEFAULT_HISTORY_LIMIT};

pub use group::{ADMIN_TYPING_ID, GroupChat, SendOutcome};
pub use peer::PeerChat;
pub use separators::Row;
pub use transcript::Transcript;

/// Change notifications for whoever renders a chat view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatUpdate {
    ConversationsChanged,
    TranscriptChanged { scroll_to_bottom: bool },
    TypingChanged,
    ParticipantsChanged,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub history_limit: u32,
    pub admin_name: String,
    pub typing_idle: Duration,
    pub typing_ttl: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            admin_name: "Admin".to_string(),
            typing_idle: typing::TYPING_IDLE,
            typing_ttl: typing::TYPING_TTL,
        }
    }
}

impl From<&AppState> for ChatSettings {
    fn from(state: &AppState) -> Self {
        Self { history_limit: state.history_limit, admin_name: state.admin_name.clone(), ..Self::default() }
    }
}
