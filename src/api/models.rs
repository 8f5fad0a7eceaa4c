use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Seller,
    Dealer,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::Dealer => "dealer",
            Role::Other => "other",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UnreadCounts {
    #[serde(default)]
    pub admin: u32,
    #[serde(default)]
    pub seller: u32,
    #[serde(default)]
    pub dealer: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default, alias = "timestamp", deserialize_with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}

// A missing or unreadable preview time must not cost the whole conversation.
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// A support group or a dealer–seller chat as listed in the sidebar.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id", alias = "groupId", alias = "chatId")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub participant_name: Option<String>,
    #[serde(default)]
    pub last_message: Option<MessagePreview>,
    #[serde(default, alias = "unreadCount")]
    pub unread: UnreadCounts,
}

impl Conversation {
    /// Label shown in lists, falling back to the counterpart's name.
    pub fn display_title(&self) -> &str {
        if !self.title.is_empty() {
            &self.title
        } else {
            self.participant_name.as_deref().unwrap_or("Chat")
        }
    }

    pub fn apply_preview(&mut self, message: &Message) {
        self.last_message = Some(MessagePreview {
            text: message.preview_text(),
            sender_name: Some(message.sender_name.clone()),
            created_at: Some(message.created_at),
        });
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: String,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "groupId", alias = "chatId")]
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(alias = "senderType")]
    pub sender_role: Role,
    #[serde(default, alias = "message")]
    pub text: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
}

impl Message {
    pub fn preview_text(&self) -> Option<String> {
        match (&self.text, &self.attachment) {
            (Some(text), _) if !text.is_empty() => Some(text.clone()),
            (_, Some(att)) => Some(match att.kind {
                AttachmentKind::Image => "[image]".to_string(),
                AttachmentKind::Document => att.name.clone().unwrap_or_else(|| "[document]".into()),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(alias = "_id", alias = "userId")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default, alias = "isOnline")]
    pub online: bool,
}
