//! Driver layer between `liftwire-api` and the CLI.
//!
//! - **[`ElevatorDriver`]**: the API operations as a trait, implemented by
//!   [`LiftDriver`] over a live [`Session`](liftwire_api::Session) and by
//!   [`MockDriver`] for offline runs and tests.
//! - **Requests** ([`requests`]): typed call, hold-open and subscribe
//!   parameters with their range checks.
//! - **Messages** ([`messages`]): the envelope each operation puts on the wire.
//! - **Suite** ([`suite`]): the validation checks and their [`SuiteReport`].

pub mod driver;
pub mod error;
pub mod messages;
pub mod mock;
pub mod report;
pub mod requests;
pub mod suite;

// ── Primary re-exports ──────────────────────────────────────────────
pub use driver::{ElevatorDriver, LiftDriver, session_id};
pub use error::CoreError;
pub use messages::DriverTarget;
pub use mock::MockDriver;
pub use report::{Outcome, SuiteReport, SuiteStats, TestResult};
pub use requests::{CallActionRequest, HoldOpenRequest, SubscribeRequest};
pub use suite::{Check, SuiteConfig, run_suite};
