use std::pin::Pin;

use futures::stream::{self, SelectAll, Stream, StreamExt};
use log::*;
use tokio::sync::{mpsc, mpsc::UnboundedReceiver, mpsc::UnboundedSender, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::common::*;
use crate::error::*;
use crate::message::*;
use crate::options::cancel::CancelMode;
use crate::serializer::*;
use crate::streaming::{Chunk, Outcome};
use crate::transport::*;

mod readership;
mod recv;
mod registry;
mod requestor;
mod send;
mod timeout;

pub use readership::{Event, Readership, SlotId};
pub use registry::{CallCompletion, OnInterruptOutcome, OnInvocationOutcome, ProcedureRegistry, YieldOutcome};
pub use requestor::{Completion, Requestor};
pub use send::{ChallengeHandler, Request};

use crate::client;

/// The legal states of a WAMP session, as seen by one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Closed,
    Connecting,
    Establishing,
    /// Received CHALLENGE, waiting on the client's `on_challenge_handler`
    /// before answering with AUTHENTICATE.
    Authenticating,
    Established,
    ShuttingDown,
    /// Transport lost or protocol violated; terminal until `disconnect`.
    Failed,
}

/// Transitions that drive the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    HelloSent,
    ChallengeReceived,
    AuthenticateSent,
    WelcomeReceived,
    AbortReceived,
    GoodbyeSent,
    GoodbyeReceived,
    TransportLost,
    ProtocolViolation,
    Disconnect,
}

impl SessionState {
    /// Applies `event`, returning the new state or `InvalidState` if the
    /// transition is not legal from the current state.
    pub fn transition(self, event: SessionEvent) -> Result<SessionState, SessionErrc> {
        use SessionEvent::*;
        use SessionState::*;

        Ok(match (self, event) {
            (Disconnected, Connect) => Connecting,
            (Closed, Connect) => Connecting,
            (Connecting, HelloSent) => Establishing,
            (Establishing, WelcomeReceived) => Established,
            (Establishing, ChallengeReceived) => Authenticating,
            (Establishing, AbortReceived) => Closed,
            (Authenticating, AuthenticateSent) => Establishing,
            (Authenticating, WelcomeReceived) => Established,
            (Authenticating, AbortReceived) => Closed,
            (Established, GoodbyeSent) => ShuttingDown,
            (Established, GoodbyeReceived) => ShuttingDown,
            (ShuttingDown, GoodbyeReceived) => Closed,
            (ShuttingDown, GoodbyeSent) => Closed,
            (_, TransportLost) => Failed,
            (_, ProtocolViolation) => Failed,
            (Failed, Disconnect) => Disconnected,
            (Closed, Disconnect) => Disconnected,
            _ => return Err(SessionErrc::InvalidState),
        })
    }
}

pub enum Status {
    /// Returned when the event loop should shutdown
    Shutdown,
    Ok,
}

pub type JoinResult = oneshot::Sender<Result<(WampId, WampDict), WampError>>;

/// A background task spawned while a call, stream, or interruption is in
/// flight: a single completion, or a stream of outbound chunks/cancellation
/// requests that still need to reach the wire.
enum BackgroundEvent {
    /// A dispatched plain call resolved.
    Completion {
        request_id: WampId,
        outcome: Outcome,
    },
    /// The callee yielded another chunk of a progressive result.
    CalleeChunk { request_id: WampId, chunk: Chunk },
    /// The caller sent another chunk of progressive call arguments.
    CallerChunk { request_id: WampId, chunk: Chunk },
    /// A local `CallerChannel::cancel()` fired.
    CallerCancel {
        request_id: WampId,
        mode: CancelMode,
    },
    /// A reply to a plain request/reply pair (subscribe, publish-ack,
    /// register, unregister, or a non-streaming call) arrived.
    Reply {
        request_id: WampId,
        kind: MessageKind,
        reply: Result<Msg, WampError>,
    },
}

fn completion_stream(
    request_id: WampId,
    rx: oneshot::Receiver<Outcome>,
) -> Pin<Box<dyn Stream<Item = BackgroundEvent> + Send>> {
    Box::pin(stream::once(async move {
        let outcome = rx.await.unwrap_or_else(|_| Outcome::Error {
            uri: errc_to_uri(SessionErrc::Unknown).to_owned(),
            arguments: None,
            arguments_kw: None,
        });
        BackgroundEvent::Completion { request_id, outcome }
    }))
}

fn callee_chunk_stream(
    request_id: WampId,
    rx: mpsc::UnboundedReceiver<Chunk>,
) -> Pin<Box<dyn Stream<Item = BackgroundEvent> + Send>> {
    Box::pin(
        UnboundedReceiverStream::new(rx)
            .map(move |chunk| BackgroundEvent::CalleeChunk { request_id, chunk }),
    )
}

fn caller_chunk_stream(
    request_id: WampId,
    rx: mpsc::UnboundedReceiver<Chunk>,
) -> Pin<Box<dyn Stream<Item = BackgroundEvent> + Send>> {
    Box::pin(
        UnboundedReceiverStream::new(rx)
            .map(move |chunk| BackgroundEvent::CallerChunk { request_id, chunk }),
    )
}

fn caller_cancel_stream(
    request_id: WampId,
    rx: oneshot::Receiver<CancelMode>,
) -> Pin<Box<dyn Stream<Item = BackgroundEvent> + Send>> {
    Box::pin(stream::once(async move { rx.await }).filter_map(move |res| async move {
        match res {
            Ok(mode) => Some(BackgroundEvent::CallerCancel { request_id, mode }),
            Err(_) => None,
        }
    }))
}

/// What woke the event loop up this iteration.
enum Wakeup {
    PeerMsg(Result<Msg, WampError>),
    Local(Option<Request>),
    Background(BackgroundEvent),
    TimedOut,
}

/// Reads and decodes one message, borrowing only the transport + serializer
/// fields rather than all of `Core` so it can run alongside other branches
/// of the event loop's `select!`.
async fn recv_msg(
    sock: &mut Box<dyn Transport + Send>,
    serializer: &mut Box<dyn SerializerImpl + Send>,
) -> Result<Msg, WampError> {
    let payload = sock.recv().await?;
    let msg = serializer.unpack(&payload)?;
    trace!("Recv : {:?}", msg);
    Ok(msg)
}

/// Owns the transport + serializer, the session state, and every piece of
/// request/subscription/registration bookkeeping. Runs as its own task via
/// `event_loop`; everything else talks to it over `ctl_channel`.
pub struct Core {
    sock: Box<dyn Transport + Send>,
    serializer: Box<dyn SerializerImpl + Send>,
    state: SessionState,
    max_msg_size: Option<u32>,
    core_res: UnboundedSender<Result<(), WampError>>,
    ctl_sender: UnboundedSender<Request>,
    ctl_channel: Option<UnboundedReceiver<Request>>,

    requestor: Requestor,
    readership: Readership,
    registry: ProcedureRegistry,
    pending: send::PendingRequests,

    background: SelectAll<Pin<Box<dyn Stream<Item = BackgroundEvent> + Send>>>,
}

impl Core {
    /// Establishes a connection with a WAMP server, without yet sending HELLO.
    pub async fn connect(
        uri: &url::Url,
        cfg: &client::ClientConfig,
        ctl_channel: (UnboundedSender<Request>, UnboundedReceiver<Request>),
        core_res: UnboundedSender<Result<(), WampError>>,
    ) -> Result<Core, WampError> {
        let (sock, serializer_type) = match uri.scheme() {
            "ws" | "wss" => ws::connect(uri, cfg).await?,
            "tcp" | "tcps" => {
                let host_port = match uri.port() {
                    Some(p) => p,
                    None => return Err(From::from("No port specified for tcp host".to_string())),
                };
                tcp::connect(
                    uri.host_str().ok_or(WampError::NoHostInUri)?,
                    host_port,
                    uri.scheme() == "tcps",
                    cfg,
                )
                .await?
            }
            s => return Err(From::from(format!("Unknown uri scheme : {}", s))),
        };

        debug!("Connected with serializer : {:?}", serializer_type);
        let serializer = get_serializer(serializer_type);

        Ok(Core {
            sock,
            serializer,
            state: SessionState::Closed,
            max_msg_size: cfg.get_max_msg_size(),
            core_res,
            ctl_sender: ctl_channel.0,
            ctl_channel: Some(ctl_channel.1),
            requestor: Requestor::new(),
            readership: Readership::new(),
            registry: ProcedureRegistry::new(),
            pending: send::PendingRequests::new(),
            background: SelectAll::new(),
        })
    }

    /// A clone of the channel used to send `Request`s to this core.
    pub fn ctl_sender(&self) -> UnboundedSender<Request> {
        self.ctl_sender.clone()
    }

    /// Event loop that handles outbound/inbound events. Must be spawned by
    /// the caller (see `Client::connect`).
    pub async fn event_loop(mut self) -> Result<(), WampError> {
        let mut ctl_channel = self.ctl_channel.take().unwrap();
        let _ = self.state.transition(SessionEvent::Connect);
        let _ = self.core_res.send(Ok(()));

        loop {
            // Rearmed every iteration: deadlines can change between polls.
            let sleep = match self.requestor.next_deadline() {
                Some(deadline) => {
                    futures::future::Either::Left(tokio::time::sleep_until(deadline.into()))
                }
                None => futures::future::Either::Right(futures::future::pending()),
            };

            // Split into disjoint field borrows so the branches below don't
            // each need a whole `&mut self` at the same time.
            let wakeup = {
                let Core {
                    sock, serializer, background, ..
                } = &mut self;
                tokio::select! {
                    msg = recv_msg(sock, serializer) => Wakeup::PeerMsg(msg),
                    req = ctl_channel.recv() => Wakeup::Local(req),
                    Some(evt) = background.next(), if !background.is_empty() => Wakeup::Background(evt),
                    _ = sleep => Wakeup::TimedOut,
                }
            };

            let status = match wakeup {
                Wakeup::PeerMsg(Err(e)) => {
                    if matches!(e, WampError::SerializationError(_)) {
                        error!("Failed to decode incoming frame, aborting session: {:?}", e);
                        self.abort_protocol_violation().await;
                        let _ = self.core_res.send(Err(e));
                    } else if self.state == SessionState::Established {
                        error!("Failed to recv : {:?}", e);
                        let _ = self.core_res.send(Err(e));
                    }
                    Status::Shutdown
                }
                Wakeup::PeerMsg(Ok(m)) => self.handle_peer_msg(m).await,
                Wakeup::Local(Some(r)) => self.handle_local_request(r).await,
                Wakeup::Local(None) => {
                    let _ = self.core_res.send(Err(WampError::ClientDied));
                    Status::Shutdown
                }
                Wakeup::Background(evt) => self.handle_background_event(evt).await,
                Wakeup::TimedOut => self.handle_expired_timeouts().await,
            };

            match status {
                Status::Shutdown => {
                    let _ = self.core_res.send(Ok(()));
                    break;
                }
                Status::Ok => {}
            }
        }

        debug!("Event loop shutting down !");
        self.shutdown().await;
        Ok(())
    }

    async fn handle_expired_timeouts(&mut self) -> Status {
        for request_id in self.requestor.expire_timeouts() {
            let _ = self
                .send(&Msg::Cancel {
                    request: request_id,
                    options: {
                        let mut o = WampDict::new();
                        o.insert("mode".to_owned(), Arg::String(CancelMode::KillNoWait.as_str().to_owned()));
                        o
                    },
                })
                .await;
            self.requestor.complete_timeout(request_id);
        }
        Status::Ok
    }

    async fn handle_background_event(&mut self, evt: BackgroundEvent) -> Status {
        match evt {
            BackgroundEvent::Completion { request_id, outcome } => {
                send::send_outcome(self, request_id, outcome).await
            }
            BackgroundEvent::CalleeChunk { request_id, chunk } => {
                send::send_yield_chunk(self, request_id, chunk).await
            }
            BackgroundEvent::CallerChunk { request_id, chunk } => {
                send::send_call_chunk(self, request_id, chunk).await
            }
            BackgroundEvent::CallerCancel { request_id, mode } => {
                send::send_cancel(self, request_id, mode).await
            }
            BackgroundEvent::Reply { request_id, kind, reply } => {
                send::complete_reply(self, request_id, kind, reply).await
            }
        }
    }

    /// Handles unsolicited messages from the peer (events, rpc calls, etc...)
    async fn handle_peer_msg(&mut self, msg: Msg) -> Status {
        match msg {
            Msg::Welcome { session, details } => recv::welcome(self, session, details).await,
            Msg::Challenge { authmethod, extra } => recv::challenge(self, authmethod, extra).await,
            Msg::Abort { details, reason } => recv::abort(self, details, reason).await,
            Msg::Goodbye { details, reason } => recv::goodbye(self, details, reason).await,
            Msg::Event {
                subscription,
                publication,
                details,
                arguments,
                arguments_kw,
            } => recv::event(self, subscription, publication, details, arguments, arguments_kw).await,
            Msg::Invocation {
                request,
                registration,
                details,
                arguments,
                arguments_kw,
            } => recv::invocation(self, request, registration, details, arguments, arguments_kw).await,
            Msg::Interrupt { request, options } => recv::interrupt(self, request, options).await,
            Msg::Subscribed { .. }
            | Msg::Unsubscribed { .. }
            | Msg::Published { .. }
            | Msg::Registered { .. }
            | Msg::Unregistered { .. }
            | Msg::Result { .. }
            | Msg::Error { .. } => recv::reply(self, msg).await,
            other => {
                warn!("Received unexpected message {:?}", other);
                Status::Ok
            }
        }
    }

    /// Handles requests originating from the `Client` façade.
    async fn handle_local_request(&mut self, req: Request) -> Status {
        match req {
            Request::Shutdown => Status::Shutdown,
            Request::Join {
                uri,
                roles,
                agent_str,
                authentication_methods,
                authentication_id,
                authextra,
                on_challenge_handler,
                res,
            } => {
                send::join_realm(
                    self,
                    uri,
                    roles,
                    agent_str,
                    authentication_methods,
                    authentication_id,
                    authextra,
                    on_challenge_handler,
                    res,
                )
                .await
            }
            Request::Leave { res } => send::leave_realm(self, res).await,
            Request::Subscribe { uri, policy, res } => send::subscribe(self, uri, policy, res).await,
            Request::Unsubscribe {
                subscription_id,
                slot_id,
                res,
            } => send::unsubscribe(self, subscription_id, slot_id, res).await,
            Request::Publish {
                uri,
                options,
                arguments,
                arguments_kw,
                res,
            } => send::publish(self, uri, options, arguments, arguments_kw, res).await,
            Request::EnrollProcedure { uri, options, res } => {
                send::enroll_procedure(self, uri, options, res).await
            }
            Request::EnrollStream {
                uri,
                options,
                invitation_expected,
                res,
            } => send::enroll_stream(self, uri, options, invitation_expected, res).await,
            Request::Unregister { registration_id, res } => {
                send::unregister(self, registration_id, res).await
            }
            Request::Call { rpc, procedure, res } => send::call(self, procedure, rpc, res).await,
            Request::CancelCall { request_id, mode } => send::send_cancel(self, request_id, mode).await,
            Request::OpenStream { request, res } => send::open_stream(self, request, res).await,
        }
    }

    /// Serializes a message and sends it on the transport. A payload
    /// exceeding the negotiated max message size fails locally without
    /// affecting the session.
    pub async fn send(&mut self, msg: &Msg) -> Result<(), WampError> {
        let payload = self.serializer.pack(msg)?;
        if let Some(max) = self.max_msg_size {
            if payload.len() > max as usize {
                warn!("Outgoing message of {} bytes exceeds max of {} bytes", payload.len(), max);
                return Err(WampError::PayloadSizeExceeded(payload.len(), max));
            }
        }
        trace!("Send : {:?}", msg);
        self.sock.send(&payload).await?;
        Ok(())
    }

    /// Receives a message and deserializes it
    pub async fn recv(&mut self) -> Result<Msg, WampError> {
        let payload = self.sock.recv().await?;
        let msg = self.serializer.unpack(&payload)?;
        trace!("Recv : {:?}", msg);
        Ok(msg)
    }

    /// Sends ABORT(protocol_violation) best-effort and forces the session
    /// into the terminal `Failed` state, per a disallowed inbound message or
    /// a decode failure on an incoming frame.
    pub(crate) async fn abort_protocol_violation(&mut self) {
        let _ = self
            .send(&Msg::Abort {
                details: WampDict::new(),
                reason: errc_to_uri(SessionErrc::ProtocolViolation).to_owned(),
            })
            .await;
        self.state = self
            .state
            .transition(SessionEvent::ProtocolViolation)
            .unwrap_or(SessionState::Failed);
    }

    /// Closes the transport
    pub async fn shutdown(mut self) {
        self.requestor.abandon_all(SessionErrc::SessionEnded);
        self.readership.abandon_all(SessionErrc::SessionEnded);
        self.registry.clear();
        self.pending.abandon_all(SessionErrc::SessionEnded);
        self.sock.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_follows_the_happy_path() {
        let mut state = SessionState::Closed;
        state = state.transition(SessionEvent::Connect).unwrap();
        assert_eq!(state, SessionState::Connecting);
        state = state.transition(SessionEvent::HelloSent).unwrap();
        assert_eq!(state, SessionState::Establishing);
        state = state.transition(SessionEvent::WelcomeReceived).unwrap();
        assert_eq!(state, SessionState::Established);
        state = state.transition(SessionEvent::GoodbyeSent).unwrap();
        assert_eq!(state, SessionState::ShuttingDown);
    }

    #[test]
    fn abort_during_establishing_returns_to_closed() {
        let state = SessionState::Establishing;
        assert_eq!(
            state.transition(SessionEvent::AbortReceived).unwrap(),
            SessionState::Closed
        );
    }

    #[test]
    fn transport_lost_is_legal_from_any_state() {
        for state in [
            SessionState::Disconnected,
            SessionState::Closed,
            SessionState::Connecting,
            SessionState::Establishing,
            SessionState::Authenticating,
            SessionState::Established,
            SessionState::ShuttingDown,
            SessionState::Failed,
        ] {
            assert_eq!(
                state.transition(SessionEvent::TransportLost).unwrap(),
                SessionState::Failed
            );
        }
    }

    #[test]
    fn welcome_before_hello_is_rejected() {
        let state = SessionState::Closed;
        assert!(state.transition(SessionEvent::WelcomeReceived).is_err());
    }

    #[test]
    fn challenge_detours_through_authenticating_back_to_establishing() {
        let mut state = SessionState::Establishing;
        state = state.transition(SessionEvent::ChallengeReceived).unwrap();
        assert_eq!(state, SessionState::Authenticating);
        state = state.transition(SessionEvent::AuthenticateSent).unwrap();
        assert_eq!(state, SessionState::Establishing);
        state = state.transition(SessionEvent::WelcomeReceived).unwrap();
        assert_eq!(state, SessionState::Established);
    }

    #[test]
    fn abort_while_authenticating_returns_to_closed() {
        let state = SessionState::Authenticating;
        assert_eq!(
            state.transition(SessionEvent::AbortReceived).unwrap(),
            SessionState::Closed
        );
    }

    #[test]
    fn protocol_violation_fails_the_session_from_any_state() {
        let state = SessionState::Established;
        assert_eq!(
            state.transition(SessionEvent::ProtocolViolation).unwrap(),
            SessionState::Failed
        );
    }

    #[test]
    fn disconnect_is_only_legal_from_failed_or_closed() {
        assert_eq!(
            SessionState::Failed.transition(SessionEvent::Disconnect).unwrap(),
            SessionState::Disconnected
        );
        assert_eq!(
            SessionState::Closed.transition(SessionEvent::Disconnect).unwrap(),
            SessionState::Disconnected
        );
        assert!(SessionState::Established.transition(SessionEvent::Disconnect).is_err());
    }

    struct NullTransport;

    #[async_trait::async_trait]
    impl Transport for NullTransport {
        async fn send(&mut self, _data: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
        async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::ReceiveFailed)
        }
        async fn close(&mut self) {}
    }

    fn bare_core(max_msg_size: Option<u32>) -> Core {
        let (core_res, _core_res_rx) = mpsc::unbounded_channel();
        let (ctl_sender, ctl_rx) = mpsc::unbounded_channel();
        Core {
            sock: Box::new(NullTransport),
            serializer: get_serializer(SerializerType::Json),
            state: SessionState::Established,
            max_msg_size,
            core_res,
            ctl_sender,
            ctl_channel: Some(ctl_rx),
            requestor: Requestor::new(),
            readership: Readership::new(),
            registry: ProcedureRegistry::new(),
            pending: send::PendingRequests::new(),
            background: SelectAll::new(),
        }
    }

    #[tokio::test]
    async fn send_rejects_oversized_payload_without_closing_the_session() {
        let mut core = bare_core(Some(8));
        let msg = Msg::Goodbye {
            details: WampDict::new(),
            reason: "wamp.close.normal".to_owned(),
        };

        match core.send(&msg).await {
            Err(WampError::PayloadSizeExceeded(size, max)) => {
                assert!(size > 8);
                assert_eq!(max, 8);
            }
            other => panic!("expected PayloadSizeExceeded, got {:?}", other),
        }
        assert_eq!(core.state, SessionState::Established);
    }

    #[tokio::test]
    async fn send_with_no_configured_max_never_rejects() {
        let mut core = bare_core(None);
        let msg = Msg::Goodbye {
            details: WampDict::new(),
            reason: "wamp.close.normal".to_owned(),
        };
        assert!(core.send(&msg).await.is_ok());
    }
}
