// ── Typed request structs for driver operations ──
//
// Each request validates its own ranges. Drivers call `validate()` before
// anything touches the socket.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Largest accepted call delay, in seconds.
pub const MAX_CALL_DELAY: u32 = 30;
/// Largest accepted hold-open hard time, in seconds.
pub const MAX_HARD_TIME: u32 = 10;
/// Largest accepted hold-open soft time, in seconds.
pub const MAX_SOFT_TIME: u32 = 30;
/// Longest subscription the API accepts, in seconds. Larger values are clamped.
pub const MAX_SUBSCRIBE_DURATION: u32 = 300;

// ── Call action ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallActionRequest {
    /// Area id the passenger is calling from.
    pub area: u64,
    /// Action id from the building's action list (e.g. 2 = destination call).
    pub action: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<u64>,
    /// Seconds before the call is placed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    /// Terminal id the call originates from.
    pub terminal: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_lifts: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<u32>,
}

impl CallActionRequest {
    pub fn new(area: u64, action: u32) -> Self {
        Self {
            area,
            action,
            destination: None,
            delay: None,
            terminal: 1,
            allowed_lifts: Vec::new(),
            group_size: None,
        }
    }

    pub fn with_destination(mut self, destination: u64) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_terminal(mut self, terminal: u32) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(delay) = self.delay {
            if delay > MAX_CALL_DELAY {
                return Err(CoreError::validation(
                    "delay",
                    format!("{delay} is outside 0..={MAX_CALL_DELAY} seconds"),
                ));
            }
        }
        if self.group_size == Some(0) {
            return Err(CoreError::validation("group_size", "must be at least 1"));
        }
        Ok(())
    }
}

// ── Hold open ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldOpenRequest {
    pub lift_deck: u64,
    pub served_area: u64,
    /// Seconds the doors are held regardless of traffic.
    pub hard_time: u32,
    /// Extra seconds held while the doorway stays occupied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_time: Option<u32>,
}

impl HoldOpenRequest {
    pub fn new(lift_deck: u64, served_area: u64, hard_time: u32) -> Self {
        Self {
            lift_deck,
            served_area,
            hard_time,
            soft_time: None,
        }
    }

    pub fn with_soft_time(mut self, soft_time: u32) -> Self {
        self.soft_time = Some(soft_time);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.hard_time > MAX_HARD_TIME {
            return Err(CoreError::validation(
                "hard_time",
                format!("{} is outside 0..={MAX_HARD_TIME} seconds", self.hard_time),
            ));
        }
        if let Some(soft) = self.soft_time {
            if soft > MAX_SOFT_TIME {
                return Err(CoreError::validation(
                    "soft_time",
                    format!("{soft} is outside 0..={MAX_SOFT_TIME} seconds"),
                ));
            }
        }
        Ok(())
    }
}

// ── Subscribe ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Topics such as `lift_1/status` or `call_state/+/fixed`.
    pub subtopics: Vec<String>,
    /// Requested lifetime in seconds. Clamped to [`MAX_SUBSCRIBE_DURATION`].
    pub duration: u32,
    /// Client-chosen subscription label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl SubscribeRequest {
    pub fn new(subtopics: Vec<String>, duration: u32) -> Self {
        Self {
            subtopics,
            duration,
            sub: None,
        }
    }

    /// Duration actually sent on the wire.
    pub fn effective_duration(&self) -> u32 {
        self.duration.min(MAX_SUBSCRIBE_DURATION)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.subtopics.is_empty() {
            return Err(CoreError::validation("subtopics", "at least one topic is required"));
        }
        if let Some(topic) = self.subtopics.iter().find(|t| t.trim().is_empty()) {
            return Err(CoreError::validation("subtopics", format!("empty topic {topic:?}")));
        }
        Ok(())
    }
}
