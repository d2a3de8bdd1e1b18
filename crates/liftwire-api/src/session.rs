// ── Session facade ──
//
// Wires the token manager, connection, inbox and correlator together
// behind one cheaply cloneable handle.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use crate::auth::{CachedToken, Credentials, TokenManager};
use crate::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use crate::correlator::{DEFAULT_REQUEST_TIMEOUT, RequestCorrelator};
use crate::envelope::InboundFrame;
use crate::error::Error;
use crate::evidence::EvidenceRecorder;
use crate::inbox::Inbox;
use crate::token_store::TokenStore;
use crate::transport::TransportConfig;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

// ── SessionConfig ───────────────────────────────────────────────────

/// Everything needed to reach the API.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub token_url: Url,
    pub ws_url: Url,
    /// Value requested in `Sec-WebSocket-Protocol`.
    pub subprotocol: String,
    /// Space-separated OAuth2 scopes. Empty omits the form field.
    pub scope: String,
    pub credentials: Credentials,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub transport: TransportConfig,
}

impl SessionConfig {
    pub fn new(
        token_url: Url,
        ws_url: Url,
        subprotocol: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            token_url,
            ws_url,
            subprotocol: subprotocol.into(),
            scope: String::new(),
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Authenticated, correlated access to the WebSocket API.
///
/// Does not connect on construction: the first request (or an explicit
/// [`connect`](Self::connect)) opens the socket, and any later call
/// reopens it if the server dropped it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    tokens: Arc<TokenManager>,
    connection: Arc<ConnectionManager>,
    inbox: Arc<Inbox>,
    correlator: RequestCorrelator,
    evidence: EvidenceRecorder,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn TokenStore>,
        evidence: EvidenceRecorder,
    ) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        let tokens = Arc::new(TokenManager::new(
            http,
            config.token_url.clone(),
            config.credentials.clone(),
            config.scope.clone(),
            store,
            evidence.clone(),
        ));
        let inbox = Arc::new(Inbox::new());
        let connection = Arc::new(ConnectionManager::new(
            ConnectionConfig {
                ws_url: config.ws_url.clone(),
                subprotocol: config.subprotocol.clone(),
                connect_timeout: config.connect_timeout,
            },
            Arc::clone(&tokens),
            Arc::clone(&inbox),
            evidence.clone(),
        ));
        let correlator =
            RequestCorrelator::new(Arc::clone(&connection), Arc::clone(&inbox), evidence.clone());

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                tokens,
                connection,
                inbox,
                correlator,
                evidence,
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn evidence(&self) -> &EvidenceRecorder {
        &self.inner.evidence
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// A bearer token valid for at least the refresh margin.
    pub async fn token(&self) -> Result<CachedToken, Error> {
        self.inner.tokens.get_token().await
    }

    /// Drop every cached token and request a new one.
    pub async fn refresh_token(&self) -> Result<CachedToken, Error> {
        self.inner.tokens.discard().await?;
        self.inner.tokens.get_token().await
    }

    // ── Connection lifecycle ────────────────────────────────────────

    pub async fn connect(&self) -> Result<(), Error> {
        self.inner.connection.ensure_connected().await
    }

    pub async fn close(&self) {
        self.inner.connection.close().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe_state()
    }

    // ── Requests ────────────────────────────────────────────────────

    /// Send and wait with the configured request timeout.
    pub async fn request(&self, message: Value) -> Result<InboundFrame, Error> {
        self.send_and_wait(message, self.inner.config.request_timeout)
            .await
    }

    pub async fn send_and_wait(
        &self,
        message: Value,
        timeout: Duration,
    ) -> Result<InboundFrame, Error> {
        self.inner.correlator.send_and_wait(message, timeout).await
    }

    // ── Events ──────────────────────────────────────────────────────

    pub async fn next_event(&self, timeout: Duration) -> Option<InboundFrame> {
        self.inner.correlator.next_event(timeout).await
    }

    /// Unsolicited frames as a stream. Shares the queue with
    /// [`next_event`](Self::next_event).
    pub fn events(&self) -> impl Stream<Item = InboundFrame> + Send + 'static {
        self.inner.inbox.events()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ws_url", &self.inner.config.ws_url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
