//! Handlers for messages arriving from the router: session-establishment
//! replies, pub/sub events, callee-side invocations/interrupts, and the
//! generic reply dispatch for everything the `Requestor` correlates.

use log::warn;

use crate::common::*;
use crate::error::*;
use crate::message::Msg;
use crate::options::cancel::CancelMode;
use crate::streaming::Invocation;

use super::{Core, SessionEvent, SessionState, Status};

pub(crate) async fn welcome(core: &mut Core, session: WampId, details: WampDict) -> Status {
    let next = match core.state.transition(SessionEvent::WelcomeReceived) {
        Ok(s) => s,
        Err(_) => {
            warn!("received WELCOME in state {:?}", core.state);
            core.abort_protocol_violation().await;
            if let Some(pending) = core.pending.join.take() {
                let _ = pending
                    .res
                    .send(Err(WampError::InvalidState(SessionErrc::ProtocolViolation)));
            }
            return Status::Shutdown;
        }
    };
    core.state = next;
    if let Some(pending) = core.pending.join.take() {
        let _ = pending.res.send(Ok((session, details)));
    }
    Status::Ok
}

pub(crate) async fn challenge(core: &mut Core, authmethod: WampString, extra: WampDict) -> Status {
    core.state = core
        .state
        .transition(SessionEvent::ChallengeReceived)
        .unwrap_or(core.state);

    let handler = match core.pending.join.as_mut().and_then(|p| p.challenge_handler.take()) {
        Some(h) => h,
        None => {
            let _ = core
                .send(&Msg::Abort {
                    details: WampDict::new(),
                    reason: errc_to_uri(SessionErrc::AuthorizationFailed).to_owned(),
                })
                .await;
            core.state = SessionState::Closed;
            if let Some(pending) = core.pending.join.take() {
                let _ = pending
                    .res
                    .send(Err(WampError::InvalidState(SessionErrc::AuthorizationFailed)));
            }
            return Status::Ok;
        }
    };

    let response = handler(authmethod, extra);
    let _ = core
        .send(&Msg::Authenticate {
            signature: response.signature,
            extra: response.extra,
        })
        .await;
    core.state = core
        .state
        .transition(SessionEvent::AuthenticateSent)
        .unwrap_or(core.state);
    Status::Ok
}

pub(crate) async fn abort(core: &mut Core, details: WampDict, reason: WampUri) -> Status {
    let _ = core.state.transition(SessionEvent::AbortReceived);
    core.state = SessionState::Closed;
    if let Some(pending) = core.pending.join.take() {
        let _ = pending.res.send(Err(WampError::ServerError(reason, details)));
    }
    Status::Ok
}

pub(crate) async fn goodbye(core: &mut Core, details: WampDict, reason: WampUri) -> Status {
    match core.state {
        SessionState::ShuttingDown => {
            // We sent GOODBYE first; this completes the round trip.
            core.state = core
                .state
                .transition(SessionEvent::GoodbyeReceived)
                .unwrap_or(SessionState::Closed);
            core.requestor.abandon_all(SessionErrc::SessionEnded);
            core.readership.abandon_all(SessionErrc::SessionEnded);
            core.registry.clear();
            core.pending.abandon_all(SessionErrc::SessionEnded);
            if let Some(res) = core.pending.leave.take() {
                let _ = res.send(Ok(()));
            }
        }
        SessionState::Established => {
            // Router-initiated close: echo GOODBYE back and tear down.
            core.state = core
                .state
                .transition(SessionEvent::GoodbyeReceived)
                .unwrap_or(core.state);
            let _ = core
                .send(&Msg::Goodbye {
                    details: WampDict::new(),
                    reason: errc_to_uri(SessionErrc::GoodbyeAndOut).to_owned(),
                })
                .await;
            core.state = core
                .state
                .transition(SessionEvent::GoodbyeSent)
                .unwrap_or(SessionState::Closed);
            core.requestor.abandon_all(SessionErrc::SessionEndedByPeer);
            core.readership.abandon_all(SessionErrc::SessionEndedByPeer);
            core.registry.clear();
            core.pending.abandon_all(SessionErrc::SessionEndedByPeer);
        }
        other => {
            warn!("received GOODBYE in unexpected state {:?}: {} {:?}", other, reason, details);
            core.abort_protocol_violation().await;
            return Status::Shutdown;
        }
    }
    Status::Ok
}

pub(crate) async fn event(
    core: &mut Core,
    subscription: WampId,
    publication: WampId,
    details: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> Status {
    core.readership.on_event(super::Event {
        subscription,
        publication,
        details,
        arguments,
        arguments_kw,
    });
    Status::Ok
}

pub(crate) async fn invocation(
    core: &mut Core,
    request: WampId,
    registration: WampId,
    details: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> Status {
    let procedure = core
        .registry
        .procedure_uri(registration)
        .or_else(|| core.registry.stream_uri(registration))
        .cloned();
    let caller = details.get("caller").and_then(Arg::as_u64);
    let is_progress = details.get("progress").and_then(Arg::as_bool).unwrap_or(false);

    let inv = Invocation {
        request_id: request,
        registration_id: registration,
        procedure,
        arguments,
        arguments_kw,
        caller,
        is_progress,
    };

    match core.registry.on_invocation(inv) {
        super::OnInvocationOutcome::Dispatched(rx) => {
            core.background.push(super::completion_stream(request, rx));
        }
        super::OnInvocationOutcome::StreamOpened(rx) => {
            core.background.push(super::callee_chunk_stream(request, rx));
        }
        super::OnInvocationOutcome::StreamChunkDelivered => {}
        super::OnInvocationOutcome::Reject(errc) => {
            let _ = core
                .send(&Msg::Error {
                    request_type: crate::message::MessageKind::Invocation.to_id(),
                    request,
                    details: WampDict::new(),
                    error: errc_to_uri(errc).to_owned(),
                    arguments: None,
                    arguments_kw: None,
                })
                .await;
        }
    }
    Status::Ok
}

pub(crate) async fn interrupt(core: &mut Core, request: WampId, options: WampDict) -> Status {
    let mode = options.get("mode").and_then(Arg::as_str).and_then(parse_cancel_mode);
    let reason = options.get("reason").and_then(Arg::as_str).map(|s| s.to_owned());

    match core.registry.on_interrupt(request, mode, reason) {
        super::OnInterruptOutcome::Delivered | super::OnInterruptOutcome::Ignored => {}
        super::OnInterruptOutcome::AutoError(uri) => {
            let _ = core
                .send(&Msg::Error {
                    request_type: crate::message::MessageKind::Invocation.to_id(),
                    request,
                    details: WampDict::new(),
                    error: uri,
                    arguments: None,
                    arguments_kw: None,
                })
                .await;
        }
    }
    Status::Ok
}

/// Dispatches a reply-shaped message (SUBSCRIBED/UNSUBSCRIBED/PUBLISHED/
/// REGISTERED/UNREGISTERED/RESULT/ERROR) to whichever pending request or open
/// streaming channel it correlates with.
pub(crate) async fn reply(core: &mut Core, msg: Msg) -> Status {
    if !core.requestor.resolve_reply(msg) {
        warn!("received a reply with no matching pending request");
    }
    Status::Ok
}

fn parse_cancel_mode(s: &str) -> Option<CancelMode> {
    match s {
        "kill" => Some(CancelMode::Kill),
        "killnowait" => Some(CancelMode::KillNoWait),
        "skip" => Some(CancelMode::Skip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_mode_parses_the_three_wire_strings() {
        assert_eq!(parse_cancel_mode("kill"), Some(CancelMode::Kill));
        assert_eq!(parse_cancel_mode("killnowait"), Some(CancelMode::KillNoWait));
        assert_eq!(parse_cancel_mode("skip"), Some(CancelMode::Skip));
        assert_eq!(parse_cancel_mode("bogus"), None);
    }
}
