pub mod manager;
pub mod reconnect;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use url::Url;

use crate::api::models::Role;

pub use manager::{ConnectionManager, ListenerId};
pub use reconnect::{ConnState, ReconnectPolicy};
pub use transport::{Link, Transport, WsTransport};

#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: Url,
    /// Handshake token used when `connect` is called without one.
    pub session_token: Option<String>,
    pub reconnect: ReconnectPolicy,
}

impl SocketConfig {
    pub fn new(url: Url) -> Self {
        Self { url, session_token: None, reconnect: ReconnectPolicy::default() }
    }
}

/// Who this connection announces itself as on `register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}
