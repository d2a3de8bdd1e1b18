//! One-shot driver operations: print the response, fail on a non-2xx status.

use liftwire_api::InboundFrame;
use liftwire_core::{CallActionRequest, ElevatorDriver, HoldOpenRequest, session_id};

use crate::cli::{CallArgs, DeleteCallArgs, GlobalOpts, HoldOpenArgs};
use crate::config::ResolvedProfile;
use crate::error::CliError;
use crate::output;

use super::util;

fn show(frame: &InboundFrame, global: &GlobalOpts) -> Result<(), CliError> {
    output::print_output(&output::render_frame(global.output, frame), global.quiet);
    util::ensure_success(frame)
}

pub async fn ping<D: ElevatorDriver>(driver: &D, global: &GlobalOpts) -> Result<(), CliError> {
    show(&driver.ping().await?, global)
}

pub async fn building_config<D: ElevatorDriver>(
    driver: &D,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    show(&driver.get_building_config().await?, global)
}

pub async fn actions<D: ElevatorDriver>(driver: &D, global: &GlobalOpts) -> Result<(), CliError> {
    show(&driver.get_actions().await?, global)
}

pub async fn call<D: ElevatorDriver>(
    driver: &D,
    args: &CallArgs,
    resolved: &ResolvedProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let req = call_request(args, resolved.profile.terminal);
    let frame = driver.call_action(&req).await?;

    if let Some(id) = session_id(&frame) {
        util::status_line(global, &format!("call accepted, session {id}"));
    }
    show(&frame, global)
}

/// Translate flags into a request; the terminal falls back to the profile's.
fn call_request(args: &CallArgs, profile_terminal: Option<u32>) -> CallActionRequest {
    let mut req = CallActionRequest::new(args.area, args.action);
    if let Some(destination) = args.destination {
        req = req.with_destination(destination);
    }
    if let Some(delay) = args.delay {
        req = req.with_delay(delay);
    }
    if let Some(terminal) = args.terminal.or(profile_terminal) {
        req = req.with_terminal(terminal);
    }
    req.allowed_lifts.clone_from(&args.allowed_lifts);
    req.group_size = args.group_size;
    req
}

pub async fn hold_open<D: ElevatorDriver>(
    driver: &D,
    args: &HoldOpenArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut req = HoldOpenRequest::new(args.deck, args.area, args.hard_time);
    if let Some(soft) = args.soft_time {
        req = req.with_soft_time(soft);
    }
    show(&driver.hold_open(&req).await?, global)
}

pub async fn delete_call<D: ElevatorDriver>(
    driver: &D,
    args: &DeleteCallArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    show(&driver.delete_call(args.session_id).await?, global)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CallArgs {
        CallArgs {
            area: 1000,
            destination: Some(2000),
            action: 2,
            delay: None,
            terminal: None,
            allowed_lifts: vec![1, 2],
            group_size: Some(3),
        }
    }

    #[test]
    fn profile_terminal_is_the_fallback() {
        assert_eq!(call_request(&args(), Some(7)).terminal, 7);

        let explicit = CallArgs {
            terminal: Some(4),
            ..args()
        };
        assert_eq!(call_request(&explicit, Some(7)).terminal, 4);
        assert_eq!(call_request(&args(), None).terminal, 1);
    }

    #[test]
    fn flags_carry_into_the_request() {
        let req = call_request(&args(), None);
        assert_eq!(req.destination, Some(2000));
        assert_eq!(req.delay, None);
        assert_eq!(req.allowed_lifts, vec![1, 2]);
        assert_eq!(req.group_size, Some(3));
    }
}
