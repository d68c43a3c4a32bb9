//! Everything that originates a request: the `Request` enum the `Client`
//! façade sends over `ctl_channel`, and the handlers that turn each variant
//! into wire messages plus the bookkeeping needed to complete it later.

use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream};
use log::warn;
use tokio::sync::{mpsc, oneshot};

use crate::common::*;
use crate::error::*;
use crate::message::{MessageKind, Msg};
use crate::options::cancel::CancelMode;
use crate::streaming::{
    CalleeChannel, CallerChannel, ChannelState, Chunk, Invocation, Outcome, Rpc, StreamMode,
    StreamRequest,
};

use super::{
    BackgroundEvent, CallCompletion, Core, Event, JoinResult, SessionEvent, SessionState, SlotId,
    Status, YieldOutcome,
};

/// Called back with `(authmethod, extra)` from a CHALLENGE; returns the
/// signature/extra to answer with. Boxed so `Request::Join` doesn't need a
/// lifetime parameter of its own.
pub type ChallengeHandler =
    Box<dyn Fn(WampString, WampDict) -> AuthenticationChallengeResponse + Send + Sync>;

pub(crate) struct PendingJoin {
    pub res: JoinResult,
    pub challenge_handler: Option<ChallengeHandler>,
}

pub(crate) struct PendingSubscribe {
    pub topic: WampUri,
    pub policy: String,
    pub tx: mpsc::UnboundedSender<Event>,
    pub rx: mpsc::UnboundedReceiver<Event>,
    pub res: oneshot::Sender<Result<(WampId, SlotId, mpsc::UnboundedReceiver<Event>), WampError>>,
}

pub(crate) enum PendingRegister {
    Procedure {
        uri: WampUri,
        call_tx: mpsc::UnboundedSender<(Invocation, CallCompletion)>,
        call_rx: mpsc::UnboundedReceiver<(Invocation, CallCompletion)>,
        res: oneshot::Sender<
            Result<(WampId, mpsc::UnboundedReceiver<(Invocation, CallCompletion)>), WampError>,
        >,
    },
    Stream {
        uri: WampUri,
        invitation_expected: bool,
        stream_tx: mpsc::UnboundedSender<CalleeChannel>,
        stream_rx: mpsc::UnboundedReceiver<CalleeChannel>,
        res: oneshot::Sender<Result<(WampId, mpsc::UnboundedReceiver<CalleeChannel>), WampError>>,
    },
}

/// Everything the `Client` façade can ask the session strand to do.
pub enum Request {
    Shutdown,
    Join {
        uri: WampUri,
        roles: Vec<ClientRole>,
        agent_str: String,
        authentication_methods: Vec<AuthenticationMethod>,
        authentication_id: Option<String>,
        authextra: WampDict,
        on_challenge_handler: Option<ChallengeHandler>,
        res: JoinResult,
    },
    Leave {
        res: oneshot::Sender<Result<(), WampError>>,
    },
    Subscribe {
        uri: WampUri,
        policy: String,
        res: oneshot::Sender<Result<(WampId, SlotId, mpsc::UnboundedReceiver<Event>), WampError>>,
    },
    Unsubscribe {
        subscription_id: WampId,
        slot_id: SlotId,
        res: oneshot::Sender<Result<(), WampError>>,
    },
    Publish {
        uri: WampUri,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
        res: oneshot::Sender<Result<Option<WampId>, WampError>>,
    },
    EnrollProcedure {
        uri: WampUri,
        options: WampDict,
        res: oneshot::Sender<
            Result<(WampId, mpsc::UnboundedReceiver<(Invocation, CallCompletion)>), WampError>,
        >,
    },
    EnrollStream {
        uri: WampUri,
        options: WampDict,
        invitation_expected: bool,
        res: oneshot::Sender<Result<(WampId, mpsc::UnboundedReceiver<CalleeChannel>), WampError>>,
    },
    Unregister {
        registration_id: WampId,
        res: oneshot::Sender<Result<(), WampError>>,
    },
    Call {
        procedure: WampUri,
        rpc: Rpc,
        res: oneshot::Sender<Result<Outcome, WampError>>,
    },
    CancelCall {
        request_id: WampId,
        mode: CancelMode,
    },
    OpenStream {
        request: StreamRequest,
        res: oneshot::Sender<Result<CallerChannel, WampError>>,
    },
}

/// Bookkeeping a `Core` needs alongside the generic `Requestor` correlator:
/// context only the issuing side knows, recovered once the matching reply
/// arrives.
pub(crate) struct PendingRequests {
    pub join: Option<PendingJoin>,
    pub leave: Option<oneshot::Sender<Result<(), WampError>>>,
    pub subscribe: HashMap<WampId, PendingSubscribe>,
    pub unsubscribe: HashMap<WampId, oneshot::Sender<Result<(), WampError>>>,
    pub publish: HashMap<WampId, oneshot::Sender<Result<Option<WampId>, WampError>>>,
    pub register: HashMap<WampId, PendingRegister>,
    pub unregister: HashMap<WampId, oneshot::Sender<Result<(), WampError>>>,
    pub call: HashMap<WampId, oneshot::Sender<Result<Outcome, WampError>>>,
    /// `(procedure, base options)` for an in-progress caller-to-callee or
    /// bidirectional stream, used to rebuild each follow-up CALL message.
    pub caller_streams: HashMap<WampId, (WampUri, WampDict)>,
}

impl PendingRequests {
    pub fn new() -> Self {
        PendingRequests {
            join: None,
            leave: None,
            subscribe: HashMap::new(),
            unsubscribe: HashMap::new(),
            publish: HashMap::new(),
            register: HashMap::new(),
            unregister: HashMap::new(),
            call: HashMap::new(),
            caller_streams: HashMap::new(),
        }
    }

    /// Completes every outstanding request with `errc`, used on shutdown.
    pub fn abandon_all(&mut self, errc: SessionErrc) {
        if let Some(pending) = self.join.take() {
            let _ = pending.res.send(Err(WampError::InvalidState(errc)));
        }
        if let Some(res) = self.leave.take() {
            let _ = res.send(Err(WampError::InvalidState(errc)));
        }
        for (_, pending) in self.subscribe.drain() {
            let _ = pending.res.send(Err(WampError::InvalidState(errc)));
        }
        for (_, res) in self.unsubscribe.drain() {
            let _ = res.send(Err(WampError::InvalidState(errc)));
        }
        for (_, res) in self.publish.drain() {
            let _ = res.send(Err(WampError::InvalidState(errc)));
        }
        for (_, pending) in self.register.drain() {
            match pending {
                PendingRegister::Procedure { res, .. } => {
                    let _ = res.send(Err(WampError::InvalidState(errc)));
                }
                PendingRegister::Stream { res, .. } => {
                    let _ = res.send(Err(WampError::InvalidState(errc)));
                }
            }
        }
        for (_, res) in self.unregister.drain() {
            let _ = res.send(Err(WampError::InvalidState(errc)));
        }
        for (_, res) in self.call.drain() {
            let _ = res.send(Err(WampError::InvalidState(errc)));
        }
        self.caller_streams.clear();
    }
}

/// Wraps a single reply completion as a background stream item so the
/// event loop can keep servicing other work while it's outstanding.
pub(crate) fn reply_stream(
    request_id: WampId,
    kind: MessageKind,
    rx: oneshot::Receiver<Result<Msg, WampError>>,
) -> Pin<Box<dyn Stream<Item = BackgroundEvent> + Send>> {
    Box::pin(stream::once(async move {
        let reply = rx.await.unwrap_or(Err(WampError::ClientDied));
        BackgroundEvent::Reply {
            request_id,
            kind,
            reply,
        }
    }))
}

pub(crate) async fn join_realm(
    core: &mut Core,
    uri: WampUri,
    roles: Vec<ClientRole>,
    agent_str: String,
    authentication_methods: Vec<AuthenticationMethod>,
    authentication_id: Option<String>,
    authextra: WampDict,
    on_challenge_handler: Option<ChallengeHandler>,
    res: JoinResult,
) -> Status {
    if core.state != SessionState::Connecting {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    let mut roles_dict = WampDict::new();
    for role in &roles {
        let mut features = WampDict::new();
        for feature in role.features() {
            features.insert((*feature).to_owned(), Arg::Bool(true));
        }
        let mut role_dict = WampDict::new();
        role_dict.insert("features".to_owned(), Arg::Dict(features));
        roles_dict.insert(role.to_str().to_owned(), Arg::Dict(role_dict));
    }

    let mut details = WampDict::new();
    if !agent_str.is_empty() {
        details.insert("agent".to_owned(), Arg::String(agent_str));
    }
    details.insert("roles".to_owned(), Arg::Dict(roles_dict));
    if !authentication_methods.is_empty() {
        details.insert(
            "authmethods".to_owned(),
            Arg::List(
                authentication_methods
                    .iter()
                    .map(|m| Arg::String(m.as_ref().to_owned()))
                    .collect(),
            ),
        );
    }
    if let Some(authid) = authentication_id {
        details.insert("authid".to_owned(), Arg::String(authid));
    }
    if !authextra.is_empty() {
        details.insert("authextra".to_owned(), Arg::Dict(authextra));
    }

    core.state = match core.state.transition(SessionEvent::HelloSent) {
        Ok(s) => s,
        Err(_) => {
            let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
            return Status::Ok;
        }
    };
    let _ = core.send(&Msg::Hello { realm: uri, details }).await;
    core.pending.join = Some(PendingJoin {
        res,
        challenge_handler: on_challenge_handler,
    });
    Status::Ok
}

pub(crate) async fn leave_realm(core: &mut Core, res: oneshot::Sender<Result<(), WampError>>) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }
    core.state = core
        .state
        .transition(SessionEvent::GoodbyeSent)
        .unwrap_or(SessionState::ShuttingDown);
    let _ = core
        .send(&Msg::Goodbye {
            details: WampDict::new(),
            reason: errc_to_uri(SessionErrc::CloseRealm).to_owned(),
        })
        .await;
    core.pending.leave = Some(res);
    Status::Ok
}

pub(crate) async fn subscribe(
    core: &mut Core,
    uri: WampUri,
    policy: String,
    res: oneshot::Sender<Result<(WampId, SlotId, mpsc::UnboundedReceiver<Event>), WampError>>,
) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    if let Some(subscription_id) = core.readership.find_subscription(&policy, &uri) {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = core.readership.add_slot(subscription_id, tx);
        let _ = res.send(Ok((subscription_id, slot, rx)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let mut options = WampDict::new();
    options.insert("match".to_owned(), Arg::String(policy.clone()));

    let (tx, rx) = oneshot::channel();
    core.requestor.register(MessageKind::Subscribe, request_id, tx);
    let _ = core
        .send(&Msg::Subscribe {
            request: request_id,
            options,
            topic: uri.clone(),
        })
        .await;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    core.pending.subscribe.insert(
        request_id,
        PendingSubscribe {
            topic: uri,
            policy,
            tx: event_tx,
            rx: event_rx,
            res,
        },
    );
    core.background.push(reply_stream(request_id, MessageKind::Subscribe, rx));
    Status::Ok
}

pub(crate) async fn unsubscribe(
    core: &mut Core,
    subscription_id: WampId,
    slot_id: SlotId,
    res: oneshot::Sender<Result<(), WampError>>,
) -> Status {
    let was_last = core.readership.remove_slot(subscription_id, slot_id);
    if !was_last {
        let _ = res.send(Ok(()));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let (tx, rx) = oneshot::channel();
    core.requestor.register(MessageKind::Unsubscribe, request_id, tx);
    let _ = core
        .send(&Msg::Unsubscribe {
            request: request_id,
            subscription: subscription_id,
        })
        .await;
    core.pending.unsubscribe.insert(request_id, res);
    core.background.push(reply_stream(request_id, MessageKind::Unsubscribe, rx));
    Status::Ok
}

pub(crate) async fn publish(
    core: &mut Core,
    uri: WampUri,
    options: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
    res: oneshot::Sender<Result<Option<WampId>, WampError>>,
) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let wants_ack = options.get("acknowledge").and_then(Arg::as_bool).unwrap_or(false);
    let _ = core
        .send(&Msg::Publish {
            request: request_id,
            options,
            topic: uri,
            arguments,
            arguments_kw,
        })
        .await;

    if !wants_ack {
        let _ = res.send(Ok(None));
        return Status::Ok;
    }

    let (tx, rx) = oneshot::channel();
    core.requestor.register(MessageKind::Publish, request_id, tx);
    core.pending.publish.insert(request_id, res);
    core.background.push(reply_stream(request_id, MessageKind::Publish, rx));
    Status::Ok
}

pub(crate) async fn enroll_procedure(
    core: &mut Core,
    uri: WampUri,
    options: WampDict,
    res: oneshot::Sender<
        Result<(WampId, mpsc::UnboundedReceiver<(Invocation, CallCompletion)>), WampError>,
    >,
) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let (tx, rx) = oneshot::channel();
    core.requestor.register(MessageKind::Register, request_id, tx);
    let _ = core
        .send(&Msg::Register {
            request: request_id,
            options,
            procedure: uri.clone(),
        })
        .await;

    let (call_tx, call_rx) = mpsc::unbounded_channel();
    core.pending.register.insert(
        request_id,
        PendingRegister::Procedure {
            uri,
            call_tx,
            call_rx,
            res,
        },
    );
    core.background.push(reply_stream(request_id, MessageKind::Register, rx));
    Status::Ok
}

pub(crate) async fn enroll_stream(
    core: &mut Core,
    uri: WampUri,
    options: WampDict,
    invitation_expected: bool,
    res: oneshot::Sender<Result<(WampId, mpsc::UnboundedReceiver<CalleeChannel>), WampError>>,
) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let (tx, rx) = oneshot::channel();
    core.requestor.register(MessageKind::Register, request_id, tx);
    let _ = core
        .send(&Msg::Register {
            request: request_id,
            options,
            procedure: uri.clone(),
        })
        .await;

    let (stream_tx, stream_rx) = mpsc::unbounded_channel();
    core.pending.register.insert(
        request_id,
        PendingRegister::Stream {
            uri,
            invitation_expected,
            stream_tx,
            stream_rx,
            res,
        },
    );
    core.background.push(reply_stream(request_id, MessageKind::Register, rx));
    Status::Ok
}

pub(crate) async fn unregister(
    core: &mut Core,
    registration_id: WampId,
    res: oneshot::Sender<Result<(), WampError>>,
) -> Status {
    if !core.registry.unregister(registration_id) {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::NoSuchRegistration)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let (tx, rx) = oneshot::channel();
    core.requestor.register(MessageKind::Unregister, request_id, tx);
    let _ = core
        .send(&Msg::Unregister {
            request: request_id,
            registration: registration_id,
        })
        .await;
    core.pending.unregister.insert(request_id, res);
    core.background.push(reply_stream(request_id, MessageKind::Unregister, rx));
    Status::Ok
}

pub(crate) async fn call(
    core: &mut Core,
    procedure: WampUri,
    rpc: Rpc,
    res: oneshot::Sender<Result<Outcome, WampError>>,
) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();
    let timeout = rpc.timeout_ms.map(Duration::from_millis);
    let (tx, rx) = oneshot::channel();
    core.requestor.register_with_timeout(MessageKind::Call, request_id, tx, timeout);
    let _ = core
        .send(&Msg::Call {
            request: request_id,
            options: rpc.options,
            procedure,
            arguments: rpc.arguments,
            arguments_kw: rpc.arguments_kw,
        })
        .await;
    core.pending.call.insert(request_id, res);
    core.background.push(reply_stream(request_id, MessageKind::Call, rx));
    Status::Ok
}

pub(crate) async fn open_stream(
    core: &mut Core,
    request: StreamRequest,
    res: oneshot::Sender<Result<CallerChannel, WampError>>,
) -> Status {
    if core.state != SessionState::Established {
        let _ = res.send(Err(WampError::InvalidState(SessionErrc::InvalidState)));
        return Status::Ok;
    }

    let request_id = core.requestor.next_request_id();

    let mut base_options = request.options.clone();
    if matches!(request.mode, StreamMode::CalleeToCaller | StreamMode::Bidirectional) {
        base_options.insert("receive_progress".to_owned(), Arg::Bool(true));
    }
    let more_to_come = matches!(request.mode, StreamMode::CallerToCallee | StreamMode::Bidirectional);

    let mut first_call_options = base_options.clone();
    if more_to_come {
        first_call_options.insert("progress".to_owned(), Arg::Bool(true));
        core.pending
            .caller_streams
            .insert(request_id, (request.procedure.clone(), base_options));
    }

    let _ = core
        .send(&Msg::Call {
            request: request_id,
            options: first_call_options,
            procedure: request.procedure,
            arguments: request.arguments,
            arguments_kw: request.arguments_kw,
        })
        .await;

    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    core.requestor.register_stream(request_id, request.mode, chunk_tx);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    core.background.push(super::caller_chunk_stream(request_id, outbound_rx));

    let (cancel_tx, cancel_rx) = oneshot::channel();
    core.background.push(super::caller_cancel_stream(request_id, cancel_rx));

    let _ = res.send(Ok(CallerChannel {
        id: request_id,
        mode: request.mode,
        state: ChannelState::Awaiting,
        chunks: chunk_rx,
        outbound: outbound_tx,
        cancel: Some(cancel_tx),
    }));
    Status::Ok
}

pub(crate) async fn send_cancel(core: &mut Core, request_id: WampId, mode: CancelMode) -> Status {
    core.requestor.cancel_call(request_id, mode);
    core.pending.caller_streams.remove(&request_id);
    let mut options = WampDict::new();
    options.insert("mode".to_owned(), Arg::String(mode.as_str().to_owned()));
    let _ = core.send(&Msg::Cancel { request: request_id, options }).await;
    Status::Ok
}

pub(crate) async fn send_outcome(core: &mut Core, request_id: WampId, outcome: Outcome) -> Status {
    let msg = match outcome {
        Outcome::Result { arguments, arguments_kw } => {
            core.registry.yield_result(request_id, arguments, arguments_kw, true)
        }
        Outcome::Error { uri, arguments, arguments_kw } => {
            core.registry.yield_error(request_id, uri, arguments, arguments_kw)
        }
        // The handler is completing this invocation out-of-band via a later
        // direct yield; nothing to send right now.
        Outcome::Deferred => return Status::Ok,
    };
    if let YieldOutcome::Send(m) = msg {
        send_reply_to_invocation(core, request_id, m).await;
    }
    Status::Ok
}

pub(crate) async fn send_yield_chunk(core: &mut Core, request_id: WampId, chunk: Chunk) -> Status {
    let mut options = WampDict::new();
    if !chunk.is_final {
        options.insert("progress".to_owned(), Arg::Bool(true));
    }
    let msg = Msg::Yield {
        request: request_id,
        options,
        arguments: chunk.arguments,
        arguments_kw: chunk.arguments_kw,
    };
    send_reply_to_invocation(core, request_id, msg).await;
    Status::Ok
}

/// Sends a YIELD/RESULT/ERROR reply to an INVOCATION. If the packed reply
/// overflows the negotiated max message size, the session is kept alive and
/// the router is sent an ERROR instead so it isn't left waiting on a request
/// id it will never hear back from.
async fn send_reply_to_invocation(core: &mut Core, request_id: WampId, msg: Msg) {
    if let Err(WampError::PayloadSizeExceeded(size, max)) = core.send(&msg).await {
        warn!(
            "yield for request {} ({} bytes) exceeds max message size {}, reporting error instead",
            request_id, size, max
        );
        let _ = core
            .send(&Msg::Error {
                request_type: MessageKind::Invocation.to_id(),
                request: request_id,
                details: WampDict::new(),
                error: errc_to_uri(SessionErrc::PayloadSizeExceeded).to_owned(),
                arguments: None,
                arguments_kw: None,
            })
            .await;
    }
}

pub(crate) async fn send_call_chunk(core: &mut Core, request_id: WampId, chunk: Chunk) -> Status {
    let (procedure, base_options) = match core.pending.caller_streams.get(&request_id) {
        Some(v) => v.clone(),
        None => return Status::Ok,
    };
    let mut options = base_options;
    if chunk.is_final {
        core.pending.caller_streams.remove(&request_id);
    } else {
        options.insert("progress".to_owned(), Arg::Bool(true));
    }
    let _ = core
        .send(&Msg::Call {
            request: request_id,
            options,
            procedure,
            arguments: chunk.arguments,
            arguments_kw: chunk.arguments_kw,
        })
        .await;
    Status::Ok
}

/// Matches a reply collected via `reply_stream` against the bookkeeping
/// stashed by the function that issued the original request.
pub(crate) async fn complete_reply(
    core: &mut Core,
    request_id: WampId,
    kind: MessageKind,
    reply: Result<Msg, WampError>,
) -> Status {
    match kind {
        MessageKind::Subscribe => {
            if let Some(pending) = core.pending.subscribe.remove(&request_id) {
                match reply {
                    Ok(Msg::Subscribed { subscription, .. }) => {
                        let slot = core.readership.create_subscription(
                            subscription,
                            pending.topic,
                            pending.policy,
                            pending.tx,
                        );
                        let _ = pending.res.send(Ok((subscription, slot, pending.rx)));
                    }
                    Err(e) => {
                        let _ = pending.res.send(Err(e));
                    }
                    _ => {
                        let _ = pending
                            .res
                            .send(Err(WampError::ProtocolError("unexpected reply to SUBSCRIBE".to_owned())));
                    }
                }
            }
        }
        MessageKind::Unsubscribe => {
            if let Some(res) = core.pending.unsubscribe.remove(&request_id) {
                let _ = res.send(reply.map(|_| ()));
            }
        }
        MessageKind::Publish => {
            if let Some(res) = core.pending.publish.remove(&request_id) {
                match reply {
                    Ok(Msg::Published { publication, .. }) => {
                        let _ = res.send(Ok(Some(publication)));
                    }
                    Err(e) => {
                        let _ = res.send(Err(e));
                    }
                    _ => {
                        let _ = res.send(Err(WampError::ProtocolError("unexpected reply to PUBLISH".to_owned())));
                    }
                }
            }
        }
        MessageKind::Register => {
            if let Some(pending) = core.pending.register.remove(&request_id) {
                match pending {
                    PendingRegister::Procedure { uri, call_tx, call_rx, res } => match reply {
                        Ok(Msg::Registered { registration, .. }) => {
                            core.registry.enroll_procedure(registration, uri, call_tx);
                            let _ = res.send(Ok((registration, call_rx)));
                        }
                        Err(e) => {
                            let _ = res.send(Err(e));
                        }
                        _ => {
                            let _ = res.send(Err(WampError::ProtocolError("unexpected reply to REGISTER".to_owned())));
                        }
                    },
                    PendingRegister::Stream { uri, invitation_expected, stream_tx, stream_rx, res } => match reply
                    {
                        Ok(Msg::Registered { registration, .. }) => {
                            core.registry.enroll_stream(registration, uri, invitation_expected, stream_tx);
                            let _ = res.send(Ok((registration, stream_rx)));
                        }
                        Err(e) => {
                            let _ = res.send(Err(e));
                        }
                        _ => {
                            let _ = res.send(Err(WampError::ProtocolError("unexpected reply to REGISTER".to_owned())));
                        }
                    },
                }
            }
        }
        MessageKind::Unregister => {
            if let Some(res) = core.pending.unregister.remove(&request_id) {
                let _ = res.send(reply.map(|_| ()));
            }
        }
        MessageKind::Call => {
            if let Some(res) = core.pending.call.remove(&request_id) {
                match reply {
                    Ok(Msg::Result { arguments, arguments_kw, .. }) => {
                        let _ = res.send(Ok(Outcome::Result { arguments, arguments_kw }));
                    }
                    Err(e) => {
                        let _ = res.send(Err(e));
                    }
                    _ => {
                        let _ = res.send(Err(WampError::ProtocolError("unexpected reply to CALL".to_owned())));
                    }
                }
            }
        }
        _ => {}
    }
    Status::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_requests_start_empty() {
        let p = PendingRequests::new();
        assert!(p.join.is_none());
        assert!(p.subscribe.is_empty());
        assert!(p.call.is_empty());
    }
}
