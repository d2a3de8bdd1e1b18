// ── Validation suite ──
//
// A fixed sequence of checks run against any `ElevatorDriver`. Each check
// yields one `TestResult`; the suite never aborts early, so a failing
// check still leaves the rest of the report intact.

use std::time::{Duration, Instant};

use chrono::Utc;
use liftwire_api::InboundFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::driver::{ElevatorDriver, session_id};
use crate::error::CoreError;
use crate::report::{Outcome, SuiteReport, TestResult};
use crate::requests::{
    CallActionRequest, HoldOpenRequest, MAX_CALL_DELAY, MAX_HARD_TIME, SubscribeRequest,
};

// ── Configuration ───────────────────────────────────────────────────

/// Building-specific parameters the checks need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub source_area: u64,
    pub destination_area: u64,
    /// Action id used for the test calls.
    pub action: u32,
    pub terminal: u32,
    pub lift_deck: u64,
    pub served_area: u64,
    pub subtopics: Vec<String>,
    /// Deliberately above the API maximum to exercise clamping.
    pub subscribe_duration: u32,
    /// How long the subscribe check waits for a first event.
    pub event_wait: Duration,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            source_area: 1000,
            destination_area: 2000,
            action: 2,
            terminal: 1,
            lift_deck: 1001,
            served_area: 1000,
            subtopics: vec!["lift_+/status".into(), "call_state/+/+".into()],
            subscribe_duration: 600,
            event_wait: Duration::from_secs(2),
        }
    }
}

// ── Checks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Ping,
    BuildingConfig,
    Actions,
    DelayGuard,
    LandingCall,
    HoldOpenGuard,
    HoldOpen,
    Subscribe,
    DeleteCall,
}

impl Check {
    pub const ALL: [Check; 9] = [
        Check::Ping,
        Check::BuildingConfig,
        Check::Actions,
        Check::DelayGuard,
        Check::LandingCall,
        Check::HoldOpenGuard,
        Check::HoldOpen,
        Check::Subscribe,
        Check::DeleteCall,
    ];

    pub fn id(self) -> u32 {
        match self {
            Check::Ping => 1,
            Check::BuildingConfig => 2,
            Check::Actions => 3,
            Check::DelayGuard => 4,
            Check::LandingCall => 5,
            Check::HoldOpenGuard => 6,
            Check::HoldOpen => 7,
            Check::Subscribe => 8,
            Check::DeleteCall => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Check::Ping => "Ping",
            Check::BuildingConfig => "Building configuration",
            Check::Actions => "Available actions",
            Check::DelayGuard => "Call delay range guard",
            Check::LandingCall => "Landing call",
            Check::HoldOpenGuard => "Hold-open range guard",
            Check::HoldOpen => "Hold doors open",
            Check::Subscribe => "Subscribe to site events",
            Check::DeleteCall => "Cancel call",
        }
    }
}

struct Verdict {
    outcome: Outcome,
    detail: String,
    response: Option<Value>,
}

impl Verdict {
    fn new(outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            detail: detail.into(),
            response: None,
        }
    }
}

/// The request must reach the API and come back 2xx.
fn expect_success(result: &Result<InboundFrame, CoreError>) -> Verdict {
    match result {
        Ok(frame) => {
            let (outcome, detail) = match frame.status_code() {
                Some(code) if frame.is_success() => (Outcome::Pass, format!("status {code}")),
                Some(code) => (Outcome::Fail, format!("expected 2xx, got status {code}")),
                None => (Outcome::Pass, "response without status code".to_owned()),
            };
            Verdict {
                outcome,
                detail,
                response: Some(frame.to_value()),
            }
        }
        Err(e) if e.is_validation() => Verdict::new(Outcome::Fail, format!("rejected locally: {e}")),
        Err(e) => Verdict::new(Outcome::Error, e.to_string()),
    }
}

/// The request must be refused before any I/O, naming `field`.
fn expect_rejected(result: &Result<InboundFrame, CoreError>, field: &str) -> Verdict {
    match result {
        Err(CoreError::Validation { field: f, reason }) if f == field => {
            Verdict::new(Outcome::Pass, format!("rejected locally: {reason}"))
        }
        Err(e) if e.is_validation() => Verdict::new(Outcome::Fail, format!("rejected for the wrong field: {e}")),
        Err(e) => Verdict::new(Outcome::Error, e.to_string()),
        Ok(_) => Verdict::new(Outcome::Fail, format!("out-of-range {field} was sent")),
    }
}

/// Run every check in order, reporting each result as it completes.
pub async fn run_suite<D, F>(driver: &D, config: &SuiteConfig, mut on_result: F) -> SuiteReport
where
    D: ElevatorDriver,
    F: FnMut(&TestResult),
{
    let started_at = Utc::now();
    let mut state = SuiteState::default();
    let mut results = Vec::with_capacity(Check::ALL.len());

    for check in Check::ALL {
        let start = Instant::now();
        let verdict = run_check(driver, config, check, &mut state).await;
        let result = TestResult {
            id: check.id(),
            name: check.name().to_owned(),
            outcome: verdict.outcome,
            duration: start.elapsed(),
            detail: verdict.detail,
            response: verdict.response,
        };
        info!(check = check.name(), outcome = %result.outcome, "check finished");
        on_result(&result);
        results.push(result);
    }

    SuiteReport::new(
        driver.target().building_id.as_str(),
        started_at,
        Utc::now(),
        results,
    )
}

/// Values carried from one check to a later one.
#[derive(Default)]
struct SuiteState {
    session_id: Option<u64>,
}

async fn run_check<D: ElevatorDriver>(
    driver: &D,
    config: &SuiteConfig,
    check: Check,
    state: &mut SuiteState,
) -> Verdict {
    match check {
        Check::Ping => expect_success(&driver.ping().await),
        Check::BuildingConfig => expect_success(&driver.get_building_config().await),
        Check::Actions => expect_success(&driver.get_actions().await),
        Check::DelayGuard => {
            let too_long = CallActionRequest::new(config.source_area, config.action)
                .with_destination(config.destination_area)
                .with_terminal(config.terminal)
                .with_delay(MAX_CALL_DELAY + 1);
            let rejected = expect_rejected(&driver.call_action(&too_long).await, "delay");
            if rejected.outcome != Outcome::Pass {
                return rejected;
            }

            let longest = too_long.with_delay(MAX_CALL_DELAY);
            let mut accepted = expect_success(&driver.call_action(&longest).await);
            accepted.detail = format!(
                "delay {} rejected locally; delay {MAX_CALL_DELAY}: {}",
                MAX_CALL_DELAY + 1,
                accepted.detail
            );
            accepted
        }
        Check::LandingCall => {
            let req = CallActionRequest::new(config.source_area, config.action)
                .with_destination(config.destination_area)
                .with_terminal(config.terminal);
            let result = driver.call_action(&req).await;
            state.session_id = result.as_ref().ok().and_then(session_id);
            let mut verdict = expect_success(&result);
            if let Some(id) = state.session_id {
                verdict.detail = format!("{}; session {id}", verdict.detail);
            }
            verdict
        }
        Check::HoldOpenGuard => {
            let req = HoldOpenRequest::new(config.lift_deck, config.served_area, MAX_HARD_TIME + 1);
            expect_rejected(&driver.hold_open(&req).await, "hard_time")
        }
        Check::HoldOpen => {
            let req = HoldOpenRequest::new(config.lift_deck, config.served_area, MAX_HARD_TIME);
            expect_success(&driver.hold_open(&req).await)
        }
        Check::Subscribe => {
            let req = SubscribeRequest::new(config.subtopics.clone(), config.subscribe_duration);
            let mut verdict = expect_success(&driver.subscribe(&req).await);
            if verdict.outcome == Outcome::Pass {
                let event = driver.next_event(config.event_wait).await;
                verdict.detail = format!(
                    "{}; duration {}s sent as {}s; {}",
                    verdict.detail,
                    req.duration,
                    req.effective_duration(),
                    if event.is_some() {
                        "event received"
                    } else {
                        "no event within wait window"
                    }
                );
            }
            verdict
        }
        Check::DeleteCall => match state.session_id {
            Some(id) => expect_success(&driver.delete_call(id).await),
            None => Verdict::new(Outcome::Skipped, "no session id from the landing call"),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::messages::{DriverTarget, call_type};
    use crate::mock::MockDriver;

    fn config() -> SuiteConfig {
        SuiteConfig {
            event_wait: Duration::from_millis(1),
            ..SuiteConfig::default()
        }
    }

    #[tokio::test]
    async fn mock_passes_every_check() {
        let driver = MockDriver::new(DriverTarget::new("b1", "1"));
        driver.push_event(json!({ "subtopic": "lift_1/status" }));

        let mut seen = Vec::new();
        let report = run_suite(&driver, &config(), |r| seen.push(r.id)).await;

        assert_eq!(seen, (1..=9).collect::<Vec<_>>());
        assert!(report.is_success(), "{}", report.to_markdown());
        assert_eq!(report.stats.passed, 9);
        assert_eq!(report.building_id, "building:b1");

        let subscribe = &report.results[7];
        assert!(subscribe.detail.contains("sent as 300s"));
        assert!(subscribe.detail.contains("event received"));

        // Guards never reach the wire.
        let sent = driver.sent();
        assert_eq!(sent.len(), 8);
        assert!(sent.iter().all(|m| m["payload"]["call"]["delay"] != 31));
        assert!(sent.iter().all(|m| m["payload"]["hard_time"] != 11));
    }

    #[tokio::test]
    async fn server_rejection_fails_check() {
        let driver = MockDriver::new(DriverTarget::new("b1", "1"));
        driver.respond_with(call_type::HOLD_OPEN, 409, json!({ "error": "deck busy" }));

        let report = run_suite(&driver, &config(), |_| {}).await;

        let hold = report.results.iter().find(|r| r.id == 7).unwrap();
        assert_eq!(hold.outcome, Outcome::Fail);
        assert!(hold.detail.contains("409"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn missing_session_id_skips_delete() {
        let driver = MockDriver::new(DriverTarget::new("b1", "1"));
        driver.respond_with(call_type::ACTION, 201, json!({ "success": true }));

        let report = run_suite(&driver, &config(), |_| {}).await;

        let delete = report.results.last().unwrap();
        assert_eq!(delete.outcome, Outcome::Skipped);
        assert_eq!(report.stats.skipped, 1);
        assert!(report.is_success());
    }
}
