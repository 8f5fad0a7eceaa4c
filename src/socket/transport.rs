use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::error::TransportError;

/// An open full-duplex text channel. The link is gone once `inbound` yields `None`.
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &Url, token: Option<&str>) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// WebSocket transport carrying the bearer token in the upgrade request.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url, token: Option<&str>) -> BoxFuture<'static, Result<Link, TransportError>> {
        let mut url = url.clone();
        let token = token.map(str::to_string);
        Box::pin(async move {
            if let Some(t) = &token {
                url.query_pairs_mut().append_pair("token", t);
            }
            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::Url(e.to_string()))?;
            if let Some(t) = &token {
                let value = HeaderValue::from_str(&format!("Bearer {}", t))
                    .map_err(|e| TransportError::Connect(e.to_string()))?;
                request.headers_mut().insert("Authorization", value);
            }

            let (ws_stream, _) = connect_async(request).await?;
            log::info!("WebSocket connected to {}", url.host_str().unwrap_or_default());
            let (mut sink, mut stream) = ws_stream.split();

            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

            tokio::spawn(async move {
                while let Some(text) = out_rx.recv().await {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        log::warn!("WebSocket write failed: {e}");
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(WsMessage::Text(text)) => {
                            if in_tx.send(text).is_err() {
                                break;
                            }
                        }
                        Ok(WsMessage::Close(reason)) => {
                            log::info!("WebSocket closed by server: {reason:?}");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log::warn!("WebSocket read failed: {e}");
                            break;
                        }
                    }
                }
            });

            Ok(Link { outbound: out_tx, inbound: in_rx })
        })
    }
}
