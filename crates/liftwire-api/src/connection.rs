//! The single WebSocket link.
//!
//! [`ConnectionManager`] owns at most one live socket. Connecting and
//! writing both happen under one async guard, so only one task performs the
//! handshake and outbound frames are written in the order callers acquire
//! the guard. The read half belongs to an [`EventListener`] task spawned per
//! connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::TokenManager;
use crate::error::Error;
use crate::evidence::{EvidenceRecorder, Phase, mask_secret};
use crate::inbox::Inbox;
use crate::listener::EventListener;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Query parameter carrying the bearer token on the upgrade request.
const TOKEN_QUERY_PARAM: &str = "accessToken";

// ── ConnectionState ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── ConnectionConfig ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub ws_url: Url,
    pub subprotocol: String,
    pub connect_timeout: Duration,
}

/// The upgrade URL: `ws_url` with the token appended as a query parameter.
pub fn connection_url(ws_url: &Url, access_token: &str) -> Url {
    let mut url = ws_url.clone();
    url.query_pairs_mut()
        .append_pair(TOKEN_QUERY_PARAM, access_token);
    url
}

/// [`connection_url`] with the token masked, for logs and evidence.
fn display_url(ws_url: &Url, access_token: &str) -> String {
    connection_url(ws_url, &mask_secret(access_token)).to_string()
}

// ── ConnectionManager ───────────────────────────────────────────────

/// Live socket state. Only touched under the guard.
#[derive(Default)]
struct Link {
    sink: Option<WsSink>,
    listening: Option<Arc<AtomicBool>>,
    cancel: Option<CancellationToken>,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.sink.is_some()
            && self
                .listening
                .as_ref()
                .is_some_and(|l| l.load(Ordering::Acquire))
    }

    /// Stop the listener (if still running) and drop the write half.
    fn reset(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.listening = None;
        self.sink = None;
    }
}

pub struct ConnectionManager {
    config: ConnectionConfig,
    tokens: Arc<TokenManager>,
    inbox: Arc<Inbox>,
    evidence: EvidenceRecorder,
    link: Mutex<Link>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        tokens: Arc<TokenManager>,
        inbox: Arc<Inbox>,
        evidence: EvidenceRecorder,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            tokens,
            inbox,
            evidence,
            link: Mutex::new(Link::default()),
            state: Arc::new(state),
        }
    }

    /// Open the socket unless a live one with a running listener exists.
    pub async fn ensure_connected(&self) -> Result<(), Error> {
        let mut link = self.link.lock().await;
        self.connect_locked(&mut link).await
    }

    /// Write one text frame, connecting first if needed.
    ///
    /// A failed write drops the socket; the next call reconnects.
    pub async fn send_text(&self, text: String) -> Result<(), Error> {
        let mut link = self.link.lock().await;
        self.connect_locked(&mut link).await?;

        let Some(sink) = link.sink.as_mut() else {
            return Err(Error::WebSocketConnect("not connected".into()));
        };

        tracing::trace!(frame = %text, "sending WebSocket frame");
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            tracing::warn!(error = %e, "WebSocket write failed, dropping connection");
            link.reset();
            self.state.send_replace(ConnectionState::Disconnected);
            return Err(Error::WebSocketConnect(e.to_string()));
        }
        Ok(())
    }

    /// Send a close frame, stop the listener and fail in-flight requests.
    pub async fn close(&self) {
        let mut link = self.link.lock().await;
        if let Some(sink) = link.sink.as_mut() {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "close handshake failed");
            }
        }
        let was_open = link.sink.is_some();
        link.reset();
        self.state.send_replace(ConnectionState::Disconnected);
        self.inbox.fail_pending();
        if was_open {
            tracing::info!("WebSocket closed");
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn connect_locked(&self, link: &mut Link) -> Result<(), Error> {
        if link.is_alive() {
            return Ok(());
        }
        // Stale handle from a connection the server dropped.
        link.reset();
        self.state.send_replace(ConnectionState::Connecting);

        let stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => {
                self.evidence.record(
                    Phase::Event,
                    json!({
                        "channel": "ws",
                        "kind": "connect_error",
                        "error": e.to_string(),
                    }),
                );
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let (sink, read) = stream.split();
        let listening = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let listener = EventListener {
            inbox: Arc::clone(&self.inbox),
            evidence: self.evidence.clone(),
            listening: Arc::clone(&listening),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
        };
        tokio::spawn(listener.run(read));

        link.sink = Some(sink);
        link.listening = Some(listening);
        link.cancel = Some(cancel);
        self.state.send_replace(ConnectionState::Connected);
        tracing::info!("WebSocket connected");
        Ok(())
    }

    async fn open(&self) -> Result<WsStream, Error> {
        let token = self.tokens.get_token().await?;
        let secret = token.secret().expose_secret();
        let url = connection_url(&self.config.ws_url, secret);

        tracing::info!(url = %display_url(&self.config.ws_url, secret), "Connecting to WebSocket");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
        let request =
            ClientRequestBuilder::new(uri).with_sub_protocol(self.config.subprotocol.clone());

        let handshake = tokio_tungstenite::connect_async(request);
        let (stream, _response) = tokio::time::timeout(self.config.connect_timeout, handshake)
            .await
            .map_err(|_| {
                Error::WebSocketConnect(format!(
                    "handshake timed out after {:?}",
                    self.config.connect_timeout
                ))
            })?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        Ok(stream)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("ws_url", &self.config.ws_url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_appended_as_query_parameter() {
        let base = Url::parse("wss://api.example.com/stream-v2").unwrap();
        let url = connection_url(&base, "abc.def");
        assert_eq!(url.as_str(), "wss://api.example.com/stream-v2?accessToken=abc.def");
    }

    #[test]
    fn existing_query_is_preserved() {
        let base = Url::parse("wss://api.example.com/stream?env=dev").unwrap();
        let url = connection_url(&base, "t");
        assert_eq!(url.query(), Some("env=dev&accessToken=t"));
    }

    #[test]
    fn display_url_masks_token() {
        let base = Url::parse("wss://api.example.com/stream").unwrap();
        let shown = display_url(&base, "eyJhbGciOiJSUzI1NiJ9.payload");
        assert!(!shown.contains("eyJhbGci"));
        assert!(shown.ends_with("load"));
    }

    #[test]
    fn empty_link_is_not_alive() {
        let mut link = Link::default();
        assert!(!link.is_alive());
        link.listening = Some(Arc::new(AtomicBool::new(true)));
        assert!(!link.is_alive());
    }
}
