use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use url::Url;

use crate::api::events::Frame;
use crate::error::TransportError;
use crate::socket::transport::{Link, Transport};

/// Server side of a fake link.
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    pub fn push(&self, event: &str, data: Value) {
        let text = Frame::new(event, data).to_text().unwrap();
        let _ = self.to_client.send(text);
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.to_client.send(text.to_string());
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Result<String, TryRecvError> {
        self.from_client.try_recv()
    }

    /// Every frame the client has sent so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            out.push(Frame::parse(&text).unwrap());
        }
        out
    }
}

pub struct FakeTransport {
    accept_remaining: Mutex<usize>,
    opens: AtomicUsize,
    tokens: Mutex<Vec<Option<String>>>,
    servers_tx: mpsc::UnboundedSender<ServerEnd>,
    servers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEnd>>,
}

impl FakeTransport {
    /// Accepts the first `n` opens, refuses the rest.
    pub fn accepting(n: usize) -> Arc<Self> {
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            accept_remaining: Mutex::new(n),
            opens: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
            servers_tx,
            servers_rx: tokio::sync::Mutex::new(servers_rx),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Self::accepting(0)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().clone()
    }

    pub async fn next_server(&self) -> ServerEnd {
        self.servers_rx.lock().await.recv().await.unwrap()
    }
}

impl Transport for FakeTransport {
    fn open(&self, _url: &Url, token: Option<&str>) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().push(token.map(str::to_string));
        let mut remaining = self.accept_remaining.lock();
        let result = if *remaining > 0 {
            *remaining -= 1;
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let _ = self.servers_tx.send(ServerEnd { to_client: in_tx, from_client: out_rx });
            Ok(Link { outbound: out_tx, inbound: in_rx })
        } else {
            Err(TransportError::Connect("refused".into()))
        };
        Box::pin(futures::future::ready(result))
    }
}
