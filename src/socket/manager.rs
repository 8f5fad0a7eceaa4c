use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::events::{Frame, REGISTER, Register};
use crate::socket::reconnect::{Action, ConnState, Input, Machine};
use crate::socket::transport::{Link, Transport};
use crate::socket::{Identity, SocketConfig};

pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Session {
    machine: Machine,
    /// Bumped on every connect/disconnect; a driver holding an older value is stale.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    config: SocketConfig,
    identity: Identity,
    transport: Arc<dyn Transport>,
    session: Mutex<Session>,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>,
    next_listener: AtomicU64,
    state_tx: watch::Sender<ConnState>,
}

/// Shared handle to the one realtime connection of an admin session.
///
/// Clones share the same connection and listener registry.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: SocketConfig, identity: Identity, transport: Arc<dyn Transport>) -> Self {
        let (state_tx, _) = watch::channel(ConnState::Disconnected);
        let machine = Machine::new(config.reconnect);
        Self {
            inner: Arc::new(Inner {
                config,
                identity,
                transport,
                session: Mutex::new(Session { machine, generation: 0, outbound: None, task: None }),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> ConnState {
        self.inner.session.lock().machine.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnState> {
        self.inner.state_tx.subscribe()
    }

    /// Open the connection unless one is already live or being established.
    /// Without an explicit token the stored session token is used.
    pub fn connect(&self, token: Option<String>) {
        let mut session = self.inner.session.lock();
        if session.machine.step(Input::Connect) != Action::Open {
            log::debug!("connect() ignored, socket is {:?}", session.machine.state());
            return;
        }
        session.generation += 1;
        let generation = session.generation;
        let token = token.or_else(|| self.inner.config.session_token.clone());
        if token.is_none() {
            log::warn!("Connecting to {} without an auth token", self.inner.config.url);
        }
        let inner = self.inner.clone();
        session.task = Some(tokio::spawn(drive(inner, token, generation)));
        self.inner.publish(ConnState::Connecting);
    }

    pub fn disconnect(&self) {
        let mut session = self.inner.session.lock();
        session.generation += 1;
        session.machine.step(Input::Disconnect);
        session.outbound = None;
        if let Some(task) = session.task.take() {
            task.abort();
        }
        self.inner.publish(ConnState::Disconnected);
        drop(session);
        log::info!("Socket disconnected");
    }

    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one handler, or every handler for `event` when `id` is `None`.
    pub fn off(&self, event: &str, id: Option<ListenerId>) {
        let mut listeners = self.inner.listeners.lock();
        match id {
            None => {
                listeners.remove(event);
            }
            Some(id) => {
                if let Some(list) = listeners.get_mut(event) {
                    list.retain(|(lid, _)| *lid != id);
                    if list.is_empty() {
                        listeners.remove(event);
                    }
                }
            }
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Fire-and-forget; dropped unless the socket is connected.
    pub fn emit(&self, event: &str, payload: Value) {
        let session = self.inner.session.lock();
        let sender = match (&session.outbound, session.machine.state()) {
            (Some(tx), ConnState::Connected) => tx,
            _ => {
                log::debug!("Dropping {event}: socket not connected");
                return;
            }
        };
        match Frame::new(event, payload).to_text() {
            Ok(text) => {
                if sender.send(text).is_err() {
                    log::debug!("Dropping {event}: link already closed");
                }
            }
            Err(e) => log::warn!("Could not encode {event}: {e}"),
        }
    }
}

impl Inner {
    /// Callers hold the session lock so the watched value follows the machine.
    fn publish(&self, state: ConnState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn transition(&self, generation: u64, input: Input) -> Option<Action> {
        let mut session = self.session.lock();
        if session.generation != generation {
            return None;
        }
        let action = session.machine.step(input);
        let state = session.machine.state();
        if state != ConnState::Connected {
            session.outbound = None;
        }
        self.publish(state);
        Some(action)
    }

    /// Register on the fresh link and make it the live outbound path.
    fn adopt(&self, generation: u64, link: Link) -> Option<mpsc::UnboundedReceiver<String>> {
        let mut session = self.session.lock();
        if session.generation != generation || session.machine.step(Input::Opened) != Action::Register {
            return None;
        }
        let register = Register { user_id: self.identity.user_id.clone(), role: self.identity.role };
        let frame = serde_json::to_value(&register)
            .ok()
            .and_then(|data| Frame::new(REGISTER, data).to_text().ok());
        if let Some(text) = frame {
            let _ = link.outbound.send(text);
        }
        session.outbound = Some(link.outbound);
        self.publish(ConnState::Connected);
        drop(session);
        log::info!("Socket connected, registered as {} ({})", self.identity.user_id, self.identity.role.as_str());
        Some(link.inbound)
    }

    fn dispatch(&self, text: &str) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Ignoring unparseable socket frame: {e}");
                return;
            }
        };
        let handlers: Vec<Handler> = self
            .listeners
            .lock()
            .get(&frame.event)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        if handlers.is_empty() {
            log::trace!("No listener for {}", frame.event);
        }
        for handler in handlers {
            handler(&frame.data);
        }
    }
}

async fn drive(inner: Arc<Inner>, token: Option<String>, generation: u64) {
    loop {
        let action = match inner.transport.open(&inner.config.url, token.as_deref()).await {
            Ok(link) => {
                let Some(mut inbound) = inner.adopt(generation, link) else { return };
                while let Some(text) = inbound.recv().await {
                    inner.dispatch(&text);
                }
                log::warn!("Socket connection dropped");
                inner.transition(generation, Input::Dropped)
            }
            Err(e) => {
                log::warn!("Socket connect failed: {e}");
                inner.transition(generation, Input::Failed)
            }
        };
        match action {
            Some(Action::Retry { attempt, delay }) => {
                log::info!("Reconnecting in {:?} (attempt {attempt})", delay);
                tokio::time::sleep(delay).await;
            }
            Some(Action::GiveUp) => {
                log::error!("Giving up on socket after {} attempts", inner.config.reconnect.max_attempts);
                return;
            }
            _ => return,
        }
    }
}
