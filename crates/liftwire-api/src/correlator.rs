// Request/response correlation over the shared socket.
//
// Each call owns its deadline. A timeout only abandons the local wait; the
// id is remembered so a response that arrives afterwards is flagged late.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::connection::ConnectionManager;
use crate::envelope::{CorrelationId, InboundFrame, extract_correlation_id, stamp_correlation_id};
use crate::error::Error;
use crate::evidence::{EvidenceRecorder, Phase};
use crate::inbox::Inbox;

/// Default wait for a correlated response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RequestCorrelator {
    connection: Arc<ConnectionManager>,
    inbox: Arc<Inbox>,
    evidence: EvidenceRecorder,
}

impl RequestCorrelator {
    pub fn new(
        connection: Arc<ConnectionManager>,
        inbox: Arc<Inbox>,
        evidence: EvidenceRecorder,
    ) -> Self {
        Self {
            connection,
            inbox,
            evidence,
        }
    }

    /// Send `message` and wait up to `timeout` for the frame carrying its id.
    pub async fn send_and_wait(
        &self,
        mut message: Value,
        timeout: Duration,
    ) -> Result<InboundFrame, Error> {
        let request_id = assign_correlation_id(&mut message)?;
        let text = serde_json::to_string(&message)?;

        self.connection.ensure_connected().await?;

        let mut rx = self.inbox.register(request_id.clone())?;
        let mut guard = PendingGuard::new(&self.inbox, request_id.clone());

        self.evidence.record(
            Phase::Request,
            json!({ "channel": "ws", "request_id": request_id, "message": message }),
        );
        tracing::debug!(%request_id, "sending request");

        if let Err(e) = self.connection.send_text(text).await {
            guard.disarm();
            self.inbox.cancel(&request_id);
            return Err(e);
        }

        let waited = tokio::time::timeout(timeout, &mut rx).await;
        guard.disarm();
        match waited {
            Ok(Ok(frame)) => Ok(self.matched(&request_id, frame)),
            Ok(Err(_)) => Err(Error::ConnectionLost { request_id }),
            Err(_) => {
                self.inbox.abandon(request_id.clone());
                // Resolved between the deadline and the abandon.
                if let Ok(frame) = rx.try_recv() {
                    return Ok(self.matched(&request_id, frame));
                }
                tracing::warn!(%request_id, ?timeout, "request timed out");
                Err(Error::Timeout {
                    request_id,
                    timeout,
                })
            }
        }
    }

    /// Pop the next unsolicited frame, waiting up to `timeout`.
    pub async fn next_event(&self, timeout: Duration) -> Option<InboundFrame> {
        self.inbox.next_event(timeout).await
    }

    fn matched(&self, request_id: &CorrelationId, frame: InboundFrame) -> InboundFrame {
        tracing::debug!(%request_id, status = ?frame.status_code(), "response received");
        self.evidence.record(
            Phase::Response,
            json!({
                "channel": "ws",
                "request_id": request_id,
                "status": frame.status_code(),
                "frame": frame.to_value(),
            }),
        );
        frame
    }
}

/// Abandons a registered waiter if `send_and_wait` is dropped mid-flight.
struct PendingGuard<'a> {
    inbox: &'a Inbox,
    id: Option<CorrelationId>,
}

impl<'a> PendingGuard<'a> {
    fn new(inbox: &'a Inbox, id: CorrelationId) -> Self {
        Self {
            inbox,
            id: Some(id),
        }
    }

    fn disarm(&mut self) {
        self.id = None;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            tracing::debug!(request_id = %id, "caller dropped request, abandoning waiter");
            self.inbox.abandon(id);
        }
    }
}

/// Reuse the id the message already carries, or generate and stamp one.
pub fn assign_correlation_id(message: &mut Value) -> Result<CorrelationId, Error> {
    if !message.is_object() {
        return Err(Error::validation("message", "must be a JSON object"));
    }
    if let Some(id) = extract_correlation_id(message) {
        return Ok(id);
    }
    let id = CorrelationId::generate();
    stamp_correlation_id(message, &id)?;
    Ok(id)
}
