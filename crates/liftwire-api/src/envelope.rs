//! Wire envelope types.
//!
//! Every frame on the socket is a single JSON object. Outbound frames share a
//! fixed routing shape (`type`, `buildingId`, `callType`, `groupId`) around a
//! `payload`; inbound frames add `statusCode` and echo the correlation id
//! either in the envelope (`requestId`) or in the body (`request_id`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Error;

/// Prefix the API requires on every building identifier.
pub const BUILDING_PREFIX: &str = "building:";

// ── CorrelationId ───────────────────────────────────────────────────

/// Identifier tying an outbound request to its eventual response.
///
/// The API echoes ids either as JSON strings or numbers; both normalize to
/// the same textual form so matching never depends on the JSON type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh id.
    ///
    /// Ids are numeric and fit in 53 bits so they survive a round-trip
    /// through JavaScript-based backends unchanged.
    pub fn generate() -> Self {
        let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
        Self((high >> 11).to_string())
    }

    /// Read an id out of a JSON value. Empty strings and non-scalar values
    /// are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// JSON form for stamping into a payload: numeric ids stay numeric.
    pub fn to_json(&self) -> Value {
        self.0
            .parse::<u64>()
            .map_or_else(|_| Value::String(self.0.clone()), Value::from)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for CorrelationId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Find the correlation id carried by a message: the envelope `requestId`
/// first, then `payload.request_id`, then `data.request_id`.
pub fn extract_correlation_id(message: &Value) -> Option<CorrelationId> {
    message
        .get("requestId")
        .and_then(CorrelationId::from_json)
        .or_else(|| {
            message
                .get("payload")
                .and_then(|p| p.get("request_id"))
                .and_then(CorrelationId::from_json)
        })
        .or_else(|| {
            message
                .get("data")
                .and_then(|d| d.get("request_id"))
                .and_then(CorrelationId::from_json)
        })
}

/// Write `id` into an outbound message: into `payload.request_id` when the
/// message has an object payload, otherwise into the envelope `requestId`.
pub fn stamp_correlation_id(message: &mut Value, id: &CorrelationId) -> Result<(), Error> {
    let Some(obj) = message.as_object_mut() else {
        return Err(Error::validation("message", "must be a JSON object"));
    };
    if let Some(Value::Object(payload)) = obj.get_mut("payload") {
        payload.insert("request_id".into(), id.to_json());
    } else {
        obj.insert("requestId".into(), Value::String(id.to_string()));
    }
    Ok(())
}

// ── BuildingId ──────────────────────────────────────────────────────

/// Add the [`BUILDING_PREFIX`] unless it is already present.
///
/// Idempotent: `format_building_id(&format_building_id(x)) == format_building_id(x)`.
pub fn format_building_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with(BUILDING_PREFIX) {
        trimmed.to_owned()
    } else {
        format!("{BUILDING_PREFIX}{trimmed}")
    }
}

/// A building identifier that always carries the API prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BuildingId(String);

impl BuildingId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(format_building_id(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier without the API prefix.
    pub fn bare(&self) -> &str {
        self.0.strip_prefix(BUILDING_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BuildingId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for BuildingId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<BuildingId> for String {
    fn from(id: BuildingId) -> Self {
        id.0
    }
}

// ── MessageType ─────────────────────────────────────────────────────

/// API family an outbound message is addressed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum MessageType {
    /// Building configuration, actions, ping.
    #[serde(rename = "common-api")]
    #[strum(serialize = "common-api")]
    CommonApi,
    /// Subscriptions to lift and call state events.
    #[serde(rename = "site-monitoring")]
    #[strum(serialize = "site-monitoring")]
    SiteMonitoring,
    /// Call giving: actions, hold-open, delete.
    #[serde(rename = "lift-call-api-v2")]
    #[strum(serialize = "lift-call-api-v2")]
    LiftCall,
}

// ── Outbound envelope ───────────────────────────────────────────────

/// Outbound message envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub building_id: BuildingId,
    pub call_type: String,
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<CorrelationId>,
    pub payload: Value,
}

impl Envelope {
    /// Create an envelope with an empty object payload.
    pub fn new(
        message_type: MessageType,
        building_id: BuildingId,
        call_type: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type,
            building_id,
            call_type: call_type.into(),
            group_id: group_id.into(),
            request_id: None,
            payload: json!({}),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_request_id(mut self, id: CorrelationId) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn to_value(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self)?)
    }
}

// ── Inbound frame ───────────────────────────────────────────────────

/// A decoded inbound frame.
///
/// Responses carry `statusCode` and an echoed correlation id; monitoring
/// events carry neither. Every field the server sends is kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,

    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Set when the frame answers a request whose local wait already timed out.
    #[serde(skip)]
    pub late: bool,
}

impl InboundFrame {
    /// Decode a text frame. Anything but a JSON object is rejected.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The correlation id echoed by the server, if any.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.request_id
            .as_ref()
            .and_then(CorrelationId::from_json)
            .or_else(|| {
                self.payload
                    .as_ref()
                    .and_then(|p| p.get("request_id"))
                    .and_then(CorrelationId::from_json)
            })
            .or_else(|| {
                self.data
                    .as_ref()
                    .and_then(|d| d.get("request_id"))
                    .and_then(CorrelationId::from_json)
            })
    }

    /// HTTP-style status code, accepting numbers and numeric strings.
    pub fn status_code(&self) -> Option<u16> {
        match self.status.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// `true` when the frame carries a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status_code().is_some_and(|s| (200..300).contains(&s))
    }

    /// The response body: `data` if present, otherwise `payload`.
    pub fn body(&self) -> Option<&Value> {
        self.data.as_ref().or(self.payload.as_ref())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_id_gets_prefix() {
        assert_eq!(format_building_id("4TFxWRCv23D"), "building:4TFxWRCv23D");
        assert_eq!(
            format_building_id("building:4TFxWRCv23D"),
            "building:4TFxWRCv23D"
        );
    }

    #[test]
    fn building_id_format_is_idempotent() {
        for raw in ["", "abc", "building:abc", "  abc ", "building:", "Building:abc"] {
            let once = format_building_id(raw);
            assert_eq!(format_building_id(&once), once, "not idempotent for {raw:?}");
            assert!(once.starts_with(BUILDING_PREFIX));
        }
    }

    #[test]
    fn building_id_deserializes_normalized() {
        let id: BuildingId = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(id.as_str(), "building:xyz");
        assert_eq!(id.bare(), "xyz");
    }

    #[test]
    fn correlation_id_matches_across_json_types() {
        let from_num = CorrelationId::from_json(&json!(12345)).unwrap();
        let from_str = CorrelationId::from_json(&json!("12345")).unwrap();
        assert_eq!(from_num, from_str);
        assert!(CorrelationId::from_json(&json!("")).is_none());
        assert!(CorrelationId::from_json(&json!({"a": 1})).is_none());
    }

    #[test]
    fn generated_ids_are_numeric_and_distinct() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert!(a.to_json().is_u64());
        assert!(a.to_json().as_u64().unwrap() < (1_u64 << 53));
    }

    #[test]
    fn extract_prefers_envelope_request_id() {
        let msg = json!({"requestId": "env", "payload": {"request_id": 7}});
        assert_eq!(extract_correlation_id(&msg).unwrap().as_str(), "env");

        let msg = json!({"payload": {"request_id": 7}});
        assert_eq!(extract_correlation_id(&msg).unwrap().as_str(), "7");

        let msg = json!({"data": {"request_id": "d"}});
        assert_eq!(extract_correlation_id(&msg).unwrap().as_str(), "d");

        assert!(extract_correlation_id(&json!({"payload": {}})).is_none());
    }

    #[test]
    fn stamp_writes_payload_or_envelope() {
        let id = CorrelationId::from(42);
        let mut with_payload = json!({"type": "common-api", "payload": {}});
        stamp_correlation_id(&mut with_payload, &id).unwrap();
        assert_eq!(with_payload["payload"]["request_id"], 42);

        let mut without = json!({"type": "common-api"});
        stamp_correlation_id(&mut without, &id).unwrap();
        assert_eq!(without["requestId"], "42");

        let mut not_object = json!([1, 2]);
        assert!(stamp_correlation_id(&mut not_object, &id).is_err());
    }

    #[test]
    fn envelope_serializes_wire_shape() {
        let env = Envelope::new(
            MessageType::LiftCall,
            BuildingId::new("b1"),
            "action",
            "1",
        )
        .with_payload(json!({"area": 1000}));
        let v = env.to_value().unwrap();
        assert_eq!(v["type"], "lift-call-api-v2");
        assert_eq!(v["buildingId"], "building:b1");
        assert_eq!(v["callType"], "action");
        assert_eq!(v["groupId"], "1");
        assert_eq!(v["payload"]["area"], 1000);
        assert!(v.get("requestId").is_none());
    }

    #[test]
    fn message_type_display_matches_wire() {
        assert_eq!(MessageType::CommonApi.to_string(), "common-api");
        assert_eq!(MessageType::SiteMonitoring.to_string(), "site-monitoring");
        assert_eq!(MessageType::LiftCall.to_string(), "lift-call-api-v2");
    }

    #[test]
    fn inbound_frame_keeps_unknown_fields() {
        let frame = InboundFrame::from_text(
            r#"{"type":"lift-call-api-v2","statusCode":201,"data":{"request_id":99,"session_id":5},"connectionId":"c1"}"#,
        )
        .unwrap();
        assert_eq!(frame.correlation_id().unwrap().as_str(), "99");
        assert_eq!(frame.status_code(), Some(201));
        assert!(frame.is_success());
        assert_eq!(frame.extra["connectionId"], "c1");
        assert_eq!(frame.body().unwrap()["session_id"], 5);
    }

    #[test]
    fn inbound_frame_rejects_non_objects() {
        assert!(InboundFrame::from_text("[1,2,3]").is_err());
        assert!(InboundFrame::from_text("not json").is_err());
    }

    #[test]
    fn status_code_accepts_strings() {
        let frame = InboundFrame::from_text(r#"{"statusCode":"404"}"#).unwrap();
        assert_eq!(frame.status_code(), Some(404));
        assert!(!frame.is_success());
    }
}
