//! Envelope builders shared by every driver.
//!
//! Each builder validates its request and returns the exact envelope that
//! goes on the wire. Correlation ids are left to the session layer, except
//! for subscriptions, which the API expects to carry the id in the envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use liftwire_api::{BuildingId, CorrelationId, Envelope, MessageType};
use serde_json::{Map, Value, json};

use crate::error::CoreError;
use crate::requests::{CallActionRequest, HoldOpenRequest, SubscribeRequest};

/// Call types understood by the API.
pub mod call_type {
    pub const CONFIG: &str = "config";
    pub const ACTIONS: &str = "actions";
    pub const PING: &str = "ping";
    pub const MONITOR: &str = "monitor";
    pub const ACTION: &str = "action";
    pub const HOLD_OPEN: &str = "hold_open";
    pub const DELETE: &str = "delete";
}

const DEFAULT_SUBSCRIPTION: &str = "liftwire";

/// Building and group every message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverTarget {
    pub building_id: BuildingId,
    pub group_id: String,
}

impl DriverTarget {
    pub fn new(building_id: impl AsRef<str>, group_id: impl Into<String>) -> Self {
        Self {
            building_id: BuildingId::new(building_id),
            group_id: group_id.into(),
        }
    }

    fn envelope(&self, message_type: MessageType, call_type: &str) -> Envelope {
        Envelope::new(
            message_type,
            self.building_id.clone(),
            call_type,
            self.group_id.clone(),
        )
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn building_config(target: &DriverTarget) -> Envelope {
    target.envelope(MessageType::CommonApi, call_type::CONFIG)
}

pub fn actions(target: &DriverTarget) -> Envelope {
    target.envelope(MessageType::CommonApi, call_type::ACTIONS)
}

pub fn ping(target: &DriverTarget) -> Envelope {
    target.envelope(MessageType::CommonApi, call_type::PING)
}

pub fn subscribe(target: &DriverTarget, req: &SubscribeRequest) -> Result<Envelope, CoreError> {
    req.validate()?;
    let sub = req.sub.as_deref().unwrap_or(DEFAULT_SUBSCRIPTION);
    Ok(target
        .envelope(MessageType::SiteMonitoring, call_type::MONITOR)
        .with_request_id(CorrelationId::generate())
        .with_payload(json!({
            "sub": sub,
            "duration": req.effective_duration(),
            "subtopics": req.subtopics,
        })))
}

pub fn call_action(
    target: &DriverTarget,
    req: &CallActionRequest,
    now: DateTime<Utc>,
) -> Result<Envelope, CoreError> {
    req.validate()?;

    let mut call = Map::new();
    call.insert("action".into(), json!(req.action));
    if let Some(destination) = req.destination {
        call.insert("destination".into(), json!(destination));
    }
    if let Some(delay) = req.delay {
        call.insert("delay".into(), json!(delay));
    }
    if !req.allowed_lifts.is_empty() {
        call.insert("allowed_lifts".into(), json!(req.allowed_lifts));
    }
    if let Some(size) = req.group_size {
        call.insert("group_size".into(), json!(size));
    }

    Ok(target
        .envelope(MessageType::LiftCall, call_type::ACTION)
        .with_payload(json!({
            "area": req.area,
            "time": timestamp(now),
            "terminal": req.terminal,
            "call": Value::Object(call),
        })))
}

pub fn hold_open(
    target: &DriverTarget,
    req: &HoldOpenRequest,
    now: DateTime<Utc>,
) -> Result<Envelope, CoreError> {
    req.validate()?;

    let mut payload = json!({
        "time": timestamp(now),
        "lift_deck": req.lift_deck,
        "served_area": req.served_area,
        "hard_time": req.hard_time,
    });
    if let Some(soft) = req.soft_time {
        payload["soft_time"] = json!(soft);
    }

    Ok(target
        .envelope(MessageType::LiftCall, call_type::HOLD_OPEN)
        .with_payload(payload))
}

pub fn delete_call(target: &DriverTarget, session_id: u64) -> Envelope {
    target
        .envelope(MessageType::LiftCall, call_type::DELETE)
        .with_payload(json!({ "session_id": session_id }))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn target() -> DriverTarget {
        DriverTarget::new("4TFxWRCv23D", "1")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn common_api_envelopes() {
        let v = building_config(&target()).to_value().unwrap();
        assert_eq!(v["type"], "common-api");
        assert_eq!(v["callType"], "config");
        assert_eq!(v["buildingId"], "building:4TFxWRCv23D");
        assert_eq!(v["payload"], json!({}));

        assert_eq!(actions(&target()).call_type, "actions");
        assert_eq!(ping(&target()).call_type, "ping");
    }

    #[test]
    fn call_action_shape() {
        let req = CallActionRequest::new(3000, 2)
            .with_destination(5000)
            .with_delay(30);
        let v = call_action(&target(), &req, fixed_now())
            .unwrap()
            .to_value()
            .unwrap();

        assert_eq!(v["type"], "lift-call-api-v2");
        assert_eq!(v["callType"], "action");
        assert_eq!(
            v["payload"],
            json!({
                "area": 3000,
                "time": "2026-03-01T12:00:00.000Z",
                "terminal": 1,
                "call": { "action": 2, "destination": 5000, "delay": 30 }
            })
        );
    }

    #[test]
    fn call_action_rejects_long_delay() {
        let req = CallActionRequest::new(3000, 2).with_delay(31);
        assert!(call_action(&target(), &req, fixed_now()).unwrap_err().is_validation());
    }

    #[test]
    fn hold_open_shape() {
        let req = HoldOpenRequest::new(1, 3000, 10).with_soft_time(5);
        let v = hold_open(&target(), &req, fixed_now()).unwrap().to_value().unwrap();
        assert_eq!(v["callType"], "hold_open");
        assert_eq!(v["payload"]["hard_time"], 10);
        assert_eq!(v["payload"]["soft_time"], 5);
        assert_eq!(v["payload"]["lift_deck"], 1);
    }

    #[test]
    fn subscribe_carries_envelope_id_and_clamped_duration() {
        let req = SubscribeRequest::new(vec!["lift_1/status".into()], 900);
        let env = subscribe(&target(), &req).unwrap();
        assert!(env.request_id.is_some());

        let v = env.to_value().unwrap();
        assert_eq!(v["type"], "site-monitoring");
        assert_eq!(v["payload"]["duration"], 300);
        assert_eq!(v["payload"]["sub"], "liftwire");
        assert_eq!(v["payload"]["subtopics"], json!(["lift_1/status"]));
    }

    #[test]
    fn delete_call_shape() {
        let v = delete_call(&target(), 77).to_value().unwrap();
        assert_eq!(v["callType"], "delete");
        assert_eq!(v["payload"]["session_id"], 77);
    }
}
