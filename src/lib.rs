//! Realtime chat client for the marketplace admin console.
//!
//! [`socket::ConnectionManager`] owns the single realtime connection of a
//! session; [`chat::GroupChat`] and [`chat::PeerChat`] reconcile REST history
//! and pushed events into de-duplicated, time-ordered transcripts.

pub mod api;
pub mod app;
pub mod chat;
pub mod error;
pub mod socket;
pub mod utils;

pub use app::AppState;
pub use chat::{ChatSettings, ChatUpdate, GroupChat, PeerChat, SendOutcome};
pub use error::{ApiError, TransportError};
pub use socket::{ConnState, ConnectionManager, Identity, SocketConfig, WsTransport};
