//! Command dispatch: bridges CLI args -> driver calls -> output formatting.

pub mod calls;
pub mod config_cmd;
pub mod evidence;
pub mod monitor;
pub mod token;
pub mod util;
pub mod validate;

use liftwire_core::{ElevatorDriver, LiftDriver, MockDriver};

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, ResolvedProfile};
use crate::error::CliError;

/// Build the driver for this run and dispatch a driver-bound command.
///
/// `--offline` answers from [`MockDriver`]; otherwise a live session is
/// opened and closed again once the command finishes.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let target = config::target(&resolved, global)?;

    if global.offline {
        let driver = MockDriver::new(target);
        return run(cmd, &driver, &resolved, global).await;
    }

    let (evidence, ring) = config::evidence(&resolved)?;
    let session = config::session(&resolved, evidence)?;
    let driver = LiftDriver::new(session.clone(), target);

    let result = run(cmd, &driver, &resolved, global).await;
    session.close().await;
    tracing::debug!(entries = ring.len(), "evidence captured this run");
    result
}

async fn run<D: ElevatorDriver>(
    cmd: Command,
    driver: &D,
    resolved: &ResolvedProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Ping => calls::ping(driver, global).await,
        Command::BuildingConfig => calls::building_config(driver, global).await,
        Command::Actions => calls::actions(driver, global).await,
        Command::Call(args) => calls::call(driver, &args, resolved, global).await,
        Command::HoldOpen(args) => calls::hold_open(driver, &args, global).await,
        Command::DeleteCall(args) => calls::delete_call(driver, &args, global).await,
        Command::Monitor(args) => monitor::handle(driver, args, global).await,
        Command::Validate(args) => validate::handle(driver, &args, resolved, global).await,
        // Local and token commands are handled before dispatch
        Command::Token(_) | Command::Evidence(_) | Command::Config(_) | Command::Completions(_) => {
            unreachable!()
        }
    }
}
