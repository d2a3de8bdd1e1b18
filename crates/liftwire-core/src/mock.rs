// ── Mock driver ──
//
// Answers every operation locally with a canned success frame built from
// the same envelopes the live driver sends. Used by `--offline` runs and
// by tests that need to assert what would have gone on the wire.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use liftwire_api::correlator::assign_correlation_id;
use liftwire_api::{Envelope, InboundFrame};
use serde_json::{Value, json};

use crate::driver::ElevatorDriver;
use crate::error::CoreError;
use crate::messages::{self, DriverTarget, call_type};
use crate::requests::{CallActionRequest, HoldOpenRequest, SubscribeRequest};

const FIRST_SESSION_ID: u64 = 1000;

/// A scripted reply for one call type.
#[derive(Debug, Clone)]
struct Scripted {
    status: u16,
    data: Value,
}

/// In-process [`ElevatorDriver`] with canned responses.
#[derive(Debug)]
pub struct MockDriver {
    target: DriverTarget,
    sent: Mutex<Vec<Value>>,
    events: Mutex<VecDeque<InboundFrame>>,
    overrides: Mutex<HashMap<String, Scripted>>,
    next_session: AtomicU64,
}

impl MockDriver {
    pub fn new(target: DriverTarget) -> Self {
        Self {
            target,
            sent: Mutex::new(Vec::new()),
            events: Mutex::new(VecDeque::new()),
            overrides: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(FIRST_SESSION_ID),
        }
    }

    /// Answer every later `call_type` request with `status` and `data`.
    pub fn respond_with(&self, call_type: &str, status: u16, data: Value) {
        self.overrides
            .lock()
            .expect("mock lock poisoned")
            .insert(call_type.to_owned(), Scripted { status, data });
    }

    /// Queue an unsolicited frame for [`next_event`](ElevatorDriver::next_event).
    pub fn push_event(&self, frame: Value) {
        match serde_json::from_value(frame) {
            Ok(frame) => self.events.lock().expect("mock lock poisoned").push_back(frame),
            Err(e) => tracing::warn!(error = %e, "ignoring scripted event that is not an object"),
        }
    }

    /// Every message that would have been written, oldest first.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().expect("mock lock poisoned").clone()
    }

    fn exchange(&self, envelope: &Envelope) -> Result<InboundFrame, CoreError> {
        let mut message = envelope.to_value()?;
        let request_id = assign_correlation_id(&mut message)?;
        self.sent.lock().expect("mock lock poisoned").push(message);

        let scripted = self
            .overrides
            .lock()
            .expect("mock lock poisoned")
            .get(&envelope.call_type)
            .cloned();

        let (status, mut data) = match scripted {
            Some(s) => (s.status, s.data),
            None => (default_status(&envelope.call_type), self.canned_data(envelope)),
        };
        if let Value::Object(ref mut map) = data {
            map.insert("request_id".into(), request_id.to_json());
        }

        let frame = json!({
            "type": envelope.message_type,
            "buildingId": envelope.building_id,
            "callType": envelope.call_type,
            "groupId": envelope.group_id,
            "statusCode": status,
            "data": data,
        });
        serde_json::from_value(frame).map_err(|e| CoreError::Internal(e.to_string()))
    }

    fn canned_data(&self, envelope: &Envelope) -> Value {
        let now = Utc::now().to_rfc3339();
        match envelope.call_type.as_str() {
            call_type::CONFIG => json!({
                "groups": [{ "groupId": envelope.group_id, "lifts": [
                    { "lift_id": 1, "name": "A", "decks": [{ "deck": 0, "area_id": 1001 }] },
                    { "lift_id": 2, "name": "B", "decks": [{ "deck": 0, "area_id": 1002 }] },
                ]}],
                "areas": [
                    { "area_id": 1000, "short_name": "L1" },
                    { "area_id": 2000, "short_name": "L2" },
                    { "area_id": 3000, "short_name": "L3" },
                ],
            }),
            call_type::ACTIONS => json!({
                "call_types": [
                    { "action_id": 2, "name": "Destination call", "enabled": true },
                    { "action_id": 3, "name": "Landing call up", "enabled": true },
                    { "action_id": 4, "name": "Landing call down", "enabled": true },
                ],
            }),
            call_type::PING => json!({ "time": now }),
            call_type::ACTION => json!({
                "session_id": self.next_session.fetch_add(1, Ordering::Relaxed),
                "success": true,
                "time": now,
            }),
            call_type::MONITOR => json!({
                "subscribed": envelope.payload.get("subtopics").cloned().unwrap_or(Value::Null),
                "duration": envelope.payload.get("duration").cloned().unwrap_or(Value::Null),
            }),
            _ => json!({ "success": true, "time": now }),
        }
    }
}

fn default_status(call_type: &str) -> u16 {
    match call_type {
        call_type::ACTION | call_type::HOLD_OPEN => 201,
        call_type::DELETE => 202,
        _ => 200,
    }
}

impl ElevatorDriver for MockDriver {
    async fn get_building_config(&self) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::building_config(&self.target))
    }

    async fn get_actions(&self) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::actions(&self.target))
    }

    async fn ping(&self) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::ping(&self.target))
    }

    async fn subscribe(&self, req: &SubscribeRequest) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::subscribe(&self.target, req)?)
    }

    async fn call_action(&self, req: &CallActionRequest) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::call_action(&self.target, req, Utc::now())?)
    }

    async fn hold_open(&self, req: &HoldOpenRequest) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::hold_open(&self.target, req, Utc::now())?)
    }

    async fn delete_call(&self, session_id: u64) -> Result<InboundFrame, CoreError> {
        self.exchange(&messages::delete_call(&self.target, session_id))
    }

    async fn next_event(&self, timeout: Duration) -> Option<InboundFrame> {
        let queued = self.events.lock().expect("mock lock poisoned").pop_front();
        if queued.is_some() {
            return queued;
        }
        tokio::time::sleep(timeout).await;
        self.events.lock().expect("mock lock poisoned").pop_front()
    }

    fn target(&self) -> &DriverTarget {
        &self.target
    }
}
