//! Callee-side bookkeeping: registered procedures and streams, in-flight
//! invocations, and the YIELD/ERROR/INTERRUPT choreography around them.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::common::*;
use crate::error::{errc_to_uri, SessionErrc};
use crate::message::{MessageKind, Msg};
use crate::options::cancel::CancelMode;
use crate::streaming::{CalleeChannel, ChannelState, Chunk, Interruption, Invocation};

/// The callee's reply to a dispatched INVOCATION, delivered back to the
/// registry once the user's call slot resolves.
pub type CallCompletion = oneshot::Sender<crate::streaming::Outcome>;

struct ProcedureRegistration {
    uri: WampUri,
    call_tx: mpsc::UnboundedSender<(Invocation, CallCompletion)>,
}

struct StreamRegistration {
    uri: WampUri,
    invitation_expected: bool,
    stream_tx: mpsc::UnboundedSender<CalleeChannel>,
}

struct InvocationRecord {
    registration_id: WampId,
    invoked: bool,
    moot: bool,
    closed: bool,
    chunk_tx: Option<mpsc::UnboundedSender<Chunk>>,
    interrupt_tx: Option<mpsc::UnboundedSender<Interruption>>,
}

/// What `Core` should do after handing an INVOCATION to the registry.
pub enum OnInvocationOutcome {
    /// A plain call was dispatched; await `CallCompletion` to yield a result.
    Dispatched(oneshot::Receiver<crate::streaming::Outcome>),
    /// A new streaming invocation opened a channel; forward the channel's
    /// outbound chunks to the router as they arrive.
    StreamOpened(mpsc::UnboundedReceiver<Chunk>),
    /// A later chunk of an already-open stream was delivered to its channel.
    StreamChunkDelivered,
    /// No matching registration or a protocol violation; respond with ERROR.
    Reject(SessionErrc),
}

/// What `Core` should send after an interruption was processed.
pub enum OnInterruptOutcome {
    /// The interruption was forwarded to a user interrupt slot or channel.
    Delivered,
    /// No registered slot could handle it; respond with this ERROR uri.
    AutoError(WampUri),
    /// Nothing to do (already interrupted, or no matching invocation).
    Ignored,
}

/// What `Core` should send after a callee yields a result/chunk/error.
pub enum YieldOutcome {
    Send(Msg),
    /// The invocation was already closed out by an auto-responded
    /// interruption; the yield must be silently dropped.
    Dropped,
    Unknown,
}

pub struct ProcedureRegistry {
    next_registration_id: WampId,
    procedures: HashMap<WampId, ProcedureRegistration>,
    streams: HashMap<WampId, StreamRegistration>,
    invocations: HashMap<WampId, InvocationRecord>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        ProcedureRegistry {
            next_registration_id: 1,
            procedures: HashMap::new(),
            streams: HashMap::new(),
            invocations: HashMap::new(),
        }
    }

    pub fn next_registration_id(&mut self) -> WampId {
        assert!(
            self.next_registration_id < WAMP_ID_MAX,
            "registration id exhausted WAMP_ID_MAX"
        );
        let id = self.next_registration_id;
        self.next_registration_id += 1;
        id
    }

    pub fn enroll_procedure(
        &mut self,
        registration_id: WampId,
        uri: WampUri,
        call_tx: mpsc::UnboundedSender<(Invocation, CallCompletion)>,
    ) {
        self.procedures
            .insert(registration_id, ProcedureRegistration { uri, call_tx });
    }

    pub fn enroll_stream(
        &mut self,
        registration_id: WampId,
        uri: WampUri,
        invitation_expected: bool,
        stream_tx: mpsc::UnboundedSender<CalleeChannel>,
    ) {
        self.streams.insert(
            registration_id,
            StreamRegistration {
                uri,
                invitation_expected,
                stream_tx,
            },
        );
    }

    pub fn unregister(&mut self, registration_id: WampId) -> bool {
        self.procedures.remove(&registration_id).is_some()
            || self.streams.remove(&registration_id).is_some()
    }

    pub fn procedure_uri(&self, registration_id: WampId) -> Option<&WampUri> {
        self.procedures.get(&registration_id).map(|r| &r.uri)
    }

    pub fn stream_uri(&self, registration_id: WampId) -> Option<&WampUri> {
        self.streams.get(&registration_id).map(|r| &r.uri)
    }

    pub fn on_invocation(&mut self, inv: Invocation) -> OnInvocationOutcome {
        let registration_id = inv.registration_id;
        let request_id = inv.request_id;

        if let Some(reg) = self.procedures.get(&registration_id) {
            if inv.is_progress {
                return OnInvocationOutcome::Reject(SessionErrc::OptionNotAllowed);
            }
            if self.invocations.contains_key(&request_id) {
                return OnInvocationOutcome::Reject(SessionErrc::ProtocolViolation);
            }
            self.invocations.insert(
                request_id,
                InvocationRecord {
                    registration_id,
                    invoked: true,
                    moot: false,
                    closed: true,
                    chunk_tx: None,
                    interrupt_tx: None,
                },
            );
            let (tx, rx) = oneshot::channel();
            if reg.call_tx.send((inv, tx)).is_err() {
                self.invocations.remove(&request_id);
                return OnInvocationOutcome::Reject(SessionErrc::NoSuchProcedure);
            }
            return OnInvocationOutcome::Dispatched(rx);
        }

        if self.streams.contains_key(&registration_id) {
            return self.on_stream_invocation(inv);
        }

        OnInvocationOutcome::Reject(SessionErrc::NoSuchProcedure)
    }

    fn on_stream_invocation(&mut self, inv: Invocation) -> OnInvocationOutcome {
        let registration_id = inv.registration_id;
        let request_id = inv.request_id;
        let closed = !inv.is_progress;

        let already_invoked = self
            .invocations
            .get(&request_id)
            .map(|r| r.invoked)
            .unwrap_or(false);

        if already_invoked {
            let rec = self.invocations.get_mut(&request_id).unwrap();
            if rec.closed {
                return OnInvocationOutcome::Reject(SessionErrc::ProtocolViolation);
            }
            rec.closed = closed;
            if let Some(tx) = &rec.chunk_tx {
                let _ = tx.send(Chunk {
                    arguments: inv.arguments,
                    arguments_kw: inv.arguments_kw,
                    is_final: closed,
                });
            }
            return OnInvocationOutcome::StreamChunkDelivered;
        }

        let reg = self.streams.get(&registration_id).unwrap();
        let invitation_expected = reg.invitation_expected;
        let invitation = Chunk {
            arguments: inv.arguments,
            arguments_kw: inv.arguments_kw,
            is_final: closed,
        };

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        if !invitation_expected {
            let _ = chunk_tx.send(invitation.clone());
        }

        self.invocations.insert(
            request_id,
            InvocationRecord {
                registration_id,
                invoked: true,
                moot: false,
                closed,
                chunk_tx: Some(chunk_tx),
                interrupt_tx: Some(interrupt_tx),
            },
        );

        let channel = CalleeChannel {
            id: request_id,
            invitation_expected,
            invitation,
            state: ChannelState::Awaiting,
            chunks: chunk_rx,
            interrupts: interrupt_rx,
            outbound: outbound_tx,
        };

        if reg.stream_tx.send(channel).is_err() {
            self.invocations.remove(&request_id);
            return OnInvocationOutcome::Reject(SessionErrc::NoSuchProcedure);
        }

        OnInvocationOutcome::StreamOpened(outbound_rx)
    }

    pub fn on_interrupt(
        &mut self,
        request_id: WampId,
        mode: Option<CancelMode>,
        reason: Option<WampUri>,
    ) -> OnInterruptOutcome {
        let rec = match self.invocations.get_mut(&request_id) {
            Some(r) => r,
            None => return OnInterruptOutcome::Ignored,
        };
        if rec.moot {
            return OnInterruptOutcome::Ignored;
        }

        let interruption = Interruption {
            request_id,
            mode,
            reason: reason.clone(),
        };

        if let Some(tx) = &rec.interrupt_tx {
            let _ = tx.send(interruption);
            return OnInterruptOutcome::Delivered;
        }

        // Without a slot willing to handle it, only `kill` warrants a
        // locally-originated ERROR; `killnowait` already got its answer from
        // the router, and `skip` never reaches the callee at all.
        if mode == Some(CancelMode::Kill) {
            rec.moot = true;
            let uri = reason.unwrap_or_else(|| errc_to_uri(SessionErrc::Cancelled).to_owned());
            return OnInterruptOutcome::AutoError(uri);
        }

        OnInterruptOutcome::Ignored
    }

    pub fn yield_result(
        &mut self,
        request_id: WampId,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
        is_final: bool,
    ) -> YieldOutcome {
        let moot = match self.invocations.get(&request_id) {
            Some(rec) => rec.moot,
            None => return YieldOutcome::Unknown,
        };
        if is_final || moot {
            self.invocations.remove(&request_id);
        }
        if moot {
            return YieldOutcome::Dropped;
        }

        let mut options = WampDict::new();
        if !is_final {
            options.insert("progress".to_owned(), Arg::Bool(true));
        }
        YieldOutcome::Send(Msg::Yield {
            request: request_id,
            options,
            arguments,
            arguments_kw,
        })
    }

    pub fn yield_error(
        &mut self,
        request_id: WampId,
        uri: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    ) -> YieldOutcome {
        let rec = match self.invocations.remove(&request_id) {
            Some(r) => r,
            None => return YieldOutcome::Unknown,
        };
        if rec.moot {
            return YieldOutcome::Dropped;
        }
        YieldOutcome::Send(Msg::Error {
            request_type: MessageKind::Invocation.to_id(),
            request: request_id,
            details: WampDict::new(),
            error: uri,
            arguments,
            arguments_kw,
        })
    }

    pub fn clear(&mut self) {
        self.procedures.clear();
        self.streams.clear();
        self.invocations.clear();
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(request_id: WampId, registration_id: WampId, is_progress: bool) -> Invocation {
        Invocation {
            request_id,
            registration_id,
            procedure: None,
            arguments: None,
            arguments_kw: None,
            caller: None,
            is_progress,
        }
    }

    #[test]
    fn plain_call_to_unknown_registration_is_rejected() {
        let mut reg = ProcedureRegistry::new();
        match reg.on_invocation(invocation(1, 99, false)) {
            OnInvocationOutcome::Reject(SessionErrc::NoSuchProcedure) => {}
            _ => panic!("expected reject"),
        }
    }

    #[test]
    fn plain_call_is_dispatched_and_yields_a_result_message() {
        let mut reg = ProcedureRegistry::new();
        let (call_tx, mut call_rx) = mpsc::unbounded_channel();
        reg.enroll_procedure(5, "com.example.add".to_owned(), call_tx);

        match reg.on_invocation(invocation(1, 5, false)) {
            OnInvocationOutcome::Dispatched(_rx) => {}
            _ => panic!("expected dispatch"),
        }
        assert!(call_rx.try_recv().is_ok());

        match reg.yield_result(1, None, None, true) {
            YieldOutcome::Send(Msg::Yield { request, .. }) => assert_eq!(request, 1),
            _ => panic!("expected yield send"),
        }
    }

    #[test]
    fn progressive_call_on_plain_procedure_is_rejected() {
        let mut reg = ProcedureRegistry::new();
        let (call_tx, _rx) = mpsc::unbounded_channel();
        reg.enroll_procedure(5, "com.example.add".to_owned(), call_tx);

        match reg.on_invocation(invocation(1, 5, true)) {
            OnInvocationOutcome::Reject(SessionErrc::OptionNotAllowed) => {}
            _ => panic!("expected reject"),
        }
    }

    #[test]
    fn kill_interrupt_with_no_slot_auto_responds() {
        let mut reg = ProcedureRegistry::new();
        let (call_tx, _rx) = mpsc::unbounded_channel();
        reg.enroll_procedure(5, "com.example.add".to_owned(), call_tx);
        reg.on_invocation(invocation(1, 5, false));

        match reg.on_interrupt(1, Some(CancelMode::Kill), None) {
            OnInterruptOutcome::AutoError(_) => {}
            _ => panic!("expected auto error"),
        }

        match reg.yield_result(1, None, None, true) {
            YieldOutcome::Dropped => {}
            _ => panic!("expected dropped yield after moot interruption"),
        }
    }

    #[test]
    fn stream_invocation_opens_a_channel_then_delivers_followup_chunks() {
        let mut reg = ProcedureRegistry::new();
        let (stream_tx, mut stream_rx) = mpsc::unbounded_channel();
        reg.enroll_stream(9, "com.example.upload".to_owned(), true, stream_tx);

        match reg.on_invocation(invocation(1, 9, true)) {
            OnInvocationOutcome::StreamOpened(_rx) => {}
            _ => panic!("expected stream open"),
        }
        assert!(stream_rx.try_recv().is_ok());

        match reg.on_invocation(invocation(1, 9, false)) {
            OnInvocationOutcome::StreamChunkDelivered => {}
            _ => panic!("expected chunk delivery"),
        }
    }

    #[test]
    fn stream_invocation_without_invitation_expected_posts_opening_args_as_first_chunk() {
        let mut reg = ProcedureRegistry::new();
        let (stream_tx, mut stream_rx) = mpsc::unbounded_channel();
        reg.enroll_stream(9, "com.example.upload".to_owned(), false, stream_tx);

        let mut inv = invocation(1, 9, true);
        inv.arguments = Some(vec![Arg::Integer(42)]);

        match reg.on_invocation(inv) {
            OnInvocationOutcome::StreamOpened(_rx) => {}
            _ => panic!("expected stream open"),
        }
        let mut channel = stream_rx.try_recv().expect("channel delivered");
        assert!(!channel.invitation_expected());
        assert_eq!(channel.invitation().arguments, Some(vec![Arg::Integer(42)]));

        let first = channel.chunks.try_recv().expect("opening args posted as first chunk");
        assert_eq!(first.arguments, Some(vec![Arg::Integer(42)]));
        assert!(!first.is_final);
    }
}
