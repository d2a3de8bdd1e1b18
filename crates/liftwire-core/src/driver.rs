// ── Elevator driver ──
//
// The operations the API exposes, behind a trait so the validation suite
// and the CLI run unchanged against the live session or the mock.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use liftwire_api::{Envelope, InboundFrame, Session};
use tracing::debug;

use crate::error::CoreError;
use crate::messages::{self, DriverTarget};
use crate::requests::{CallActionRequest, HoldOpenRequest, SubscribeRequest};

/// Elevator call API operations.
///
/// Every method returns the correlated response frame. Range checks run
/// before any I/O and fail with [`CoreError::Validation`].
pub trait ElevatorDriver: Send + Sync {
    fn get_building_config(&self) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    fn get_actions(&self) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    fn ping(&self) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    fn subscribe(
        &self,
        req: &SubscribeRequest,
    ) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    fn call_action(
        &self,
        req: &CallActionRequest,
    ) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    fn hold_open(
        &self,
        req: &HoldOpenRequest,
    ) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    fn delete_call(
        &self,
        session_id: u64,
    ) -> impl Future<Output = Result<InboundFrame, CoreError>> + Send;

    /// Next unsolicited frame, or `None` if nothing arrives within `timeout`.
    fn next_event(&self, timeout: Duration) -> impl Future<Output = Option<InboundFrame>> + Send;

    fn target(&self) -> &DriverTarget;
}

/// Session id the API assigns to an accepted call, if the frame carries one.
pub fn session_id(frame: &InboundFrame) -> Option<u64> {
    frame
        .body()
        .and_then(|b| b.get("session_id"))
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

// ── LiftDriver ──────────────────────────────────────────────────────

/// Driver backed by a live [`Session`].
#[derive(Debug, Clone)]
pub struct LiftDriver {
    session: Session,
    target: DriverTarget,
}

impl LiftDriver {
    pub fn new(session: Session, target: DriverTarget) -> Self {
        Self { session, target }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn send(&self, envelope: Envelope) -> Result<InboundFrame, CoreError> {
        debug!(
            message_type = %envelope.message_type,
            call_type = %envelope.call_type,
            "driver request"
        );
        let frame = self.session.request(envelope.to_value()?).await?;
        Ok(frame)
    }
}

impl ElevatorDriver for LiftDriver {
    async fn get_building_config(&self) -> Result<InboundFrame, CoreError> {
        self.send(messages::building_config(&self.target)).await
    }

    async fn get_actions(&self) -> Result<InboundFrame, CoreError> {
        self.send(messages::actions(&self.target)).await
    }

    async fn ping(&self) -> Result<InboundFrame, CoreError> {
        self.send(messages::ping(&self.target)).await
    }

    async fn subscribe(&self, req: &SubscribeRequest) -> Result<InboundFrame, CoreError> {
        let envelope = messages::subscribe(&self.target, req)?;
        self.send(envelope).await
    }

    async fn call_action(&self, req: &CallActionRequest) -> Result<InboundFrame, CoreError> {
        let envelope = messages::call_action(&self.target, req, Utc::now())?;
        self.send(envelope).await
    }

    async fn hold_open(&self, req: &HoldOpenRequest) -> Result<InboundFrame, CoreError> {
        let envelope = messages::hold_open(&self.target, req, Utc::now())?;
        self.send(envelope).await
    }

    async fn delete_call(&self, session_id: u64) -> Result<InboundFrame, CoreError> {
        self.send(messages::delete_call(&self.target, session_id)).await
    }

    async fn next_event(&self, timeout: Duration) -> Option<InboundFrame> {
        self.session.next_event(timeout).await
    }

    fn target(&self) -> &DriverTarget {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn session_id_from_number_or_string() {
        let frame: InboundFrame =
            serde_json::from_value(json!({ "data": { "session_id": 12 } })).unwrap();
        assert_eq!(session_id(&frame), Some(12));

        let frame: InboundFrame =
            serde_json::from_value(json!({ "payload": { "session_id": "34" } })).unwrap();
        assert_eq!(session_id(&frame), Some(34));

        assert_eq!(session_id(&InboundFrame::default()), None);
    }
}
