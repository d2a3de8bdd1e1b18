//! Routing point between the socket listener and waiting callers.
//!
//! Each outbound request registers a single-fire waiter keyed by its
//! correlation id before the frame is written. The listener hands every
//! decoded frame to [`Inbox::deliver`], which resolves the matching waiter
//! or, when nobody is waiting, queues the frame for [`Inbox::next_event`].
//! Frames are never dropped.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::envelope::{CorrelationId, InboundFrame};
use crate::error::Error;

/// How many timed-out request ids are remembered for late-response tagging.
const ABANDONED_CAPACITY: usize = 256;

/// Where [`Inbox::deliver`] routed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Resolved a waiting request.
    Response,
    /// Queued as an unsolicited event.
    Event,
    /// Answered a request that already timed out; queued as an event with `late` set.
    Late,
}

pub struct Inbox {
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<InboundFrame>>>,
    abandoned: Mutex<VecDeque<CorrelationId>>,
    events_tx: mpsc::UnboundedSender<InboundFrame>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundFrame>>,
}

impl Inbox {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            pending: Mutex::new(HashMap::new()),
            abandoned: Mutex::new(VecDeque::with_capacity(ABANDONED_CAPACITY)),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        }
    }

    /// Register a waiter for `id`. Fails if the id is already in flight.
    pub fn register(&self, id: CorrelationId) -> Result<oneshot::Receiver<InboundFrame>, Error> {
        let mut pending = self.pending.lock().expect("inbox lock poisoned");
        match pending.entry(id) {
            Entry::Occupied(slot) => Err(Error::DuplicateRequestId {
                request_id: slot.key().clone(),
            }),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Drop the waiter for `id` without remembering it (the request never left).
    pub fn cancel(&self, id: &CorrelationId) {
        self.pending.lock().expect("inbox lock poisoned").remove(id);
    }

    /// Drop the waiter for `id` and remember the id, so a response that shows
    /// up later is tagged as late instead of passing for an event.
    pub fn abandon(&self, id: CorrelationId) {
        self.pending.lock().expect("inbox lock poisoned").remove(&id);
        let mut abandoned = self.abandoned.lock().expect("inbox lock poisoned");
        if abandoned.len() == ABANDONED_CAPACITY {
            abandoned.pop_front();
        }
        abandoned.push_back(id);
    }

    /// Route one inbound frame.
    pub fn deliver(&self, mut frame: InboundFrame) -> Delivery {
        let id = frame.correlation_id();

        if let Some(ref id) = id {
            let waiter = self.pending.lock().expect("inbox lock poisoned").remove(id);
            if let Some(tx) = waiter {
                match tx.send(frame) {
                    Ok(()) => {
                        debug!(request_id = %id, "resolved waiting request");
                        return Delivery::Response;
                    }
                    // Receiver gone: the caller gave up between timeout and abandon.
                    Err(returned) => frame = returned,
                }
                frame.late = true;
            } else if self
                .abandoned
                .lock()
                .expect("inbox lock poisoned")
                .contains(id)
            {
                frame.late = true;
            }
        }

        let delivery = if frame.late {
            warn!(request_id = ?id.as_ref().map(CorrelationId::as_str), "late response after local timeout");
            Delivery::Late
        } else {
            Delivery::Event
        };

        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.events_tx.send(frame);
        delivery
    }

    /// Drop every waiter. Their callers observe a closed channel.
    pub fn fail_pending(&self) -> usize {
        let mut pending = self.pending.lock().expect("inbox lock poisoned");
        let count = pending.len();
        pending.clear();
        count
    }

    /// Number of requests currently waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("inbox lock poisoned").len()
    }

    /// Wait up to `timeout` for the next unsolicited frame.
    pub async fn next_event(&self, timeout: Duration) -> Option<InboundFrame> {
        let mut rx = self.events_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Unsolicited frames as a stream. Ends only when the inbox is dropped.
    pub fn events(self: &Arc<Self>) -> impl Stream<Item = InboundFrame> + Send + 'static {
        let inbox = Arc::clone(self);
        async_stream::stream! {
            loop {
                let next = {
                    let mut rx = inbox.events_rx.lock().await;
                    rx.recv().await
                };
                match next {
                    Some(frame) => yield frame,
                    None => break,
                }
            }
        }
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;

    fn response(id: u64) -> InboundFrame {
        serde_json::from_value(json!({ "statusCode": 201, "data": { "request_id": id } })).unwrap()
    }

    fn event() -> InboundFrame {
        serde_json::from_value(json!({ "subtopic": "lift_1/status", "data": { "door": "open" } }))
            .unwrap()
    }

    #[tokio::test]
    async fn frames_reach_matching_waiters_in_any_order() {
        let inbox = Inbox::new();
        let mut first = inbox.register(CorrelationId::from(1)).unwrap();
        let mut second = inbox.register(CorrelationId::from(2)).unwrap();

        assert_eq!(inbox.deliver(response(2)), Delivery::Response);
        assert_eq!(inbox.deliver(event()), Delivery::Event);
        assert_eq!(inbox.deliver(response(1)), Delivery::Response);

        assert_eq!(first.try_recv().unwrap().correlation_id().unwrap().as_str(), "1");
        assert_eq!(second.try_recv().unwrap().correlation_id().unwrap().as_str(), "2");
        assert_eq!(inbox.pending_len(), 0);

        let ev = inbox.next_event(Duration::from_millis(10)).await.unwrap();
        assert_eq!(ev.extra["subtopic"], "lift_1/status");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let inbox = Inbox::new();
        let _rx = inbox.register(CorrelationId::from(7)).unwrap();
        let err = inbox.register(CorrelationId::from(7)).unwrap_err();
        assert!(matches!(err, Error::DuplicateRequestId { .. }));
    }

    #[tokio::test]
    async fn unmatched_response_is_kept_as_event() {
        let inbox = Inbox::new();
        assert_eq!(inbox.deliver(response(99)), Delivery::Event);
        let ev = inbox.next_event(Duration::from_millis(10)).await.unwrap();
        assert!(!ev.late);
        assert_eq!(ev.correlation_id().unwrap().as_str(), "99");
    }

    #[tokio::test]
    async fn response_after_abandon_is_flagged_late() {
        let inbox = Inbox::new();
        let _rx = inbox.register(CorrelationId::from(5)).unwrap();
        inbox.abandon(CorrelationId::from(5));

        assert_eq!(inbox.deliver(response(5)), Delivery::Late);
        let ev = inbox.next_event(Duration::from_millis(10)).await.unwrap();
        assert!(ev.late);
    }

    #[tokio::test]
    async fn dropped_receiver_routes_frame_as_late() {
        let inbox = Inbox::new();
        drop(inbox.register(CorrelationId::from(3)).unwrap());
        assert_eq!(inbox.deliver(response(3)), Delivery::Late);
        assert!(inbox.next_event(Duration::from_millis(10)).await.unwrap().late);
    }

    #[tokio::test]
    async fn fail_pending_closes_waiters() {
        let inbox = Inbox::new();
        let rx = inbox.register(CorrelationId::from(1)).unwrap();
        assert_eq!(inbox.fail_pending(), 1);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn next_event_times_out_when_empty() {
        let inbox = Inbox::new();
        assert!(inbox.next_event(Duration::from_millis(5)).await.is_none());
    }

    #[tokio::test]
    async fn events_stream_yields_queued_frames() {
        let inbox = Arc::new(Inbox::new());
        inbox.deliver(event());
        inbox.deliver(response(42));

        let frames: Vec<_> = inbox.events().take(2).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].correlation_id().unwrap().as_str(), "42");
    }
}
