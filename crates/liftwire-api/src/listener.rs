// Single reader of the socket for the lifetime of one connection.
//
// Decodes text frames, records them as evidence, and hands them to the
// inbox. Does not reconnect: once the stream ends the next outbound call
// opens a fresh connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{Stream, StreamExt};
use serde_json::json;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::connection::ConnectionState;
use crate::envelope::InboundFrame;
use crate::evidence::{EvidenceRecorder, Phase};
use crate::inbox::{Delivery, Inbox};

/// Why the read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Termination {
    /// Local close or reconnect; the owner already cleaned up.
    Cancelled,
    /// Server close frame or end of stream.
    Closed,
    /// Read error.
    Failed(String),
}

pub(crate) struct EventListener {
    pub(crate) inbox: Arc<Inbox>,
    pub(crate) evidence: EvidenceRecorder,
    pub(crate) listening: Arc<AtomicBool>,
    pub(crate) state: Arc<watch::Sender<ConnectionState>>,
    pub(crate) cancel: CancellationToken,
}

impl EventListener {
    /// Read frames until the stream ends, errors, or the token is cancelled.
    pub(crate) async fn run<S>(self, mut read: S) -> Termination
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let termination = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Termination::Cancelled,
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong itself
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "WebSocket close frame received");
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        break Termination::Closed;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        break Termination::Failed(e.to_string());
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break Termination::Closed;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                },
            }
        };

        // Fail this connection's waiters before dropping the flag: a reconnect
        // may register new ones as soon as it reads `listening == false`.
        if termination != Termination::Cancelled {
            let failed = self.inbox.fail_pending();
            if failed > 0 {
                tracing::warn!(failed, "connection lost with requests in flight");
            }
        }

        self.listening.store(false, Ordering::Release);

        if termination != Termination::Cancelled {
            self.state.send_replace(ConnectionState::Disconnected);
            let reason = match &termination {
                Termination::Failed(e) => e.clone(),
                _ => "closed by server".to_owned(),
            };
            self.evidence.record(
                Phase::Event,
                json!({ "channel": "ws", "kind": "disconnected", "reason": reason }),
            );
        }

        tracing::debug!(?termination, "listener exiting");
        termination
    }

    fn handle_text(&self, text: &str) {
        tracing::trace!(frame = text, "WebSocket frame");
        let frame = match InboundFrame::from_text(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        self.evidence.record(
            Phase::Event,
            json!({ "channel": "ws", "frame": frame.to_value() }),
        );

        if self.inbox.deliver(frame) == Delivery::Event {
            tracing::debug!("queued unsolicited frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::stream;

    use super::*;
    use crate::envelope::CorrelationId;
    use crate::evidence::MemoryEvidence;

    fn listener(inbox: &Arc<Inbox>, ring: &Arc<MemoryEvidence>) -> (EventListener, Arc<AtomicBool>, watch::Receiver<ConnectionState>) {
        let listening = Arc::new(AtomicBool::new(true));
        let (state, state_rx) = watch::channel(ConnectionState::Connected);
        let l = EventListener {
            inbox: Arc::clone(inbox),
            evidence: EvidenceRecorder::new().with_sink(ring.clone()),
            listening: Arc::clone(&listening),
            state: Arc::new(state),
            cancel: CancellationToken::new(),
        };
        (l, listening, state_rx)
    }

    fn text(s: &str) -> Result<Message, tungstenite::Error> {
        Ok(Message::Text(s.into()))
    }

    #[tokio::test]
    async fn routes_frames_and_skips_garbage() {
        let inbox = Arc::new(Inbox::new());
        let ring = Arc::new(MemoryEvidence::new(50));
        let rx = inbox.register(CorrelationId::from(10)).unwrap();
        let (l, listening, state) = listener(&inbox, &ring);

        let frames = stream::iter(vec![
            text("not json"),
            text(r#"{"subtopic":"call_state","data":{"state":"served"}}"#),
            Ok(Message::Binary(vec![1, 2, 3].into())),
            text(r#"{"statusCode":200,"data":{"request_id":10}}"#),
        ]);

        assert_eq!(l.run(frames).await, Termination::Closed);

        assert_eq!(rx.await.unwrap().status_code(), Some(200));
        let ev = inbox.next_event(Duration::from_millis(10)).await.unwrap();
        assert_eq!(ev.extra["subtopic"], "call_state");
        assert!(!listening.load(Ordering::Acquire));
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);

        // Two decoded frames plus the disconnect notice.
        assert_eq!(ring.phases(), vec![Phase::Event, Phase::Event, Phase::Event]);
        assert_eq!(ring.snapshot()[2].fields["kind"], "disconnected");
    }

    #[tokio::test]
    async fn stream_end_fails_waiters() {
        let inbox = Arc::new(Inbox::new());
        let ring = Arc::new(MemoryEvidence::new(10));
        let rx = inbox.register(CorrelationId::from(1)).unwrap();
        let (l, _, _) = listener(&inbox, &ring);

        l.run(stream::iter(Vec::new())).await;
        assert!(rx.await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waiter_registered_after_shutdown_survives() {
        let inbox = Arc::new(Inbox::new());
        let ring = Arc::new(MemoryEvidence::new(10));
        let old = inbox.register(CorrelationId::from(1)).unwrap();
        let (l, listening, _) = listener(&inbox, &ring);

        // Stands in for the reconnect: registers the moment the flag drops.
        let reconnect = {
            let inbox = Arc::clone(&inbox);
            tokio::spawn(async move {
                while listening.load(Ordering::Acquire) {
                    tokio::task::yield_now().await;
                }
                inbox.register(CorrelationId::from(2)).unwrap()
            })
        };

        l.run(stream::iter(Vec::new())).await;
        let _new = reconnect.await.unwrap();

        assert!(old.await.is_err());
        assert_eq!(inbox.pending_len(), 1);
    }

    #[tokio::test]
    async fn cancellation_leaves_waiters_alone() {
        let inbox = Arc::new(Inbox::new());
        let ring = Arc::new(MemoryEvidence::new(10));
        let _rx = inbox.register(CorrelationId::from(1)).unwrap();
        let (l, listening, state) = listener(&inbox, &ring);
        l.cancel.cancel();

        let termination = l.run(stream::pending()).await;

        assert_eq!(termination, Termination::Cancelled);
        assert!(!listening.load(Ordering::Acquire));
        assert_eq!(*state.borrow(), ConnectionState::Connected);
        assert_eq!(inbox.pending_len(), 1);
        assert!(ring.is_empty());
    }
}
