use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::api::client::{ApiResult, ChatApi};
use crate::api::models::{Conversation, Message, Participant};
use crate::error::ApiError;
use crate::socket::testing::FakeTransport;
use crate::socket::{ConnState, ConnectionManager, Identity, SocketConfig};

/// In-memory backend with per-conversation latency and failure switches.
#[derive(Default)]
pub struct FakeApi {
    pub groups: Mutex<Vec<Conversation>>,
    pub chats: Mutex<Vec<Conversation>>,
    pub messages: Mutex<HashMap<String, Vec<Message>>>,
    pub participants: Mutex<HashMap<String, Vec<Participant>>>,
    pub delays: Mutex<HashMap<String, Duration>>,
    pub failing: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub send_delay: Mutex<Duration>,
    pub fail_sends: Mutex<bool>,
    pub read_marks: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn delay(&self, id: &str) -> Duration {
        self.delays.lock().get(id).copied().unwrap_or_default()
    }

    fn check(&self, id: &str) -> ApiResult<()> {
        if self.failing.lock().iter().any(|f| f == id) { Err(ApiError::Status(500)) } else { Ok(()) }
    }

    fn history(&self, id: &str) -> BoxFuture<'_, ApiResult<Vec<Message>>> {
        let delay = self.delay(id);
        let id = id.to_string();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            self.check(&id)?;
            Ok(self.messages.lock().get(&id).cloned().unwrap_or_default())
        })
    }
}

impl ChatApi for FakeApi {
    fn groups(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>> {
        Box::pin(async move {
            self.check("groups")?;
            Ok(self.groups.lock().clone())
        })
    }

    fn group_messages<'a>(&'a self, group_id: &'a str, _limit: u32) -> BoxFuture<'a, ApiResult<Vec<Message>>> {
        self.history(group_id)
    }

    fn group_participants<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, ApiResult<Vec<Participant>>> {
        let delay = self.delay(group_id);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            self.check(group_id)?;
            Ok(self.participants.lock().get(group_id).cloned().unwrap_or_default())
        })
    }

    fn send_group_message<'a>(&'a self, group_id: &'a str, text: &'a str) -> BoxFuture<'a, ApiResult<()>> {
        let delay = *self.send_delay.lock();
        Box::pin(async move {
            self.sent.lock().push((group_id.to_string(), text.to_string()));
            tokio::time::sleep(delay).await;
            if *self.fail_sends.lock() { Err(ApiError::Status(502)) } else { Ok(()) }
        })
    }

    fn mark_group_read<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            self.read_marks.lock().push(group_id.to_string());
            Ok(())
        })
    }

    fn dealer_chats(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>> {
        Box::pin(async move {
            self.check("chats")?;
            Ok(self.chats.lock().clone())
        })
    }

    fn dealer_chat_messages<'a>(&'a self, chat_id: &'a str, _limit: u32) -> BoxFuture<'a, ApiResult<Vec<Message>>> {
        self.history(chat_id)
    }
}

/// A manager already connected over a fake link.
pub async fn connected_manager() -> (ConnectionManager, Arc<FakeTransport>) {
    let transport = FakeTransport::accepting(1);
    let config = SocketConfig::new(url::Url::parse("ws://localhost/ws").unwrap());
    let identity = Identity { user_id: "admin-1".into(), role: crate::api::models::Role::Admin };
    let manager = ConnectionManager::new(config, identity, transport.clone());
    manager.connect(Some("tok".into()));
    manager.watch_state().wait_for(|s| *s == ConnState::Connected).await.unwrap();
    (manager, transport)
}
