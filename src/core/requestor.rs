//! Caller-side request/reply correlator, timeout scheduler, and streaming
//! channel table.
//!
//! Lives inside the session strand (the `Core` event loop task) and is only
//! ever touched from there, mirroring how `Core` already owns its pending-
//! request maps directly instead of behind a lock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use crate::common::*;
use crate::core::timeout::TimeoutScheduler;
use crate::error::{SessionErrc, WampError};
use crate::message::{MessageKind, Msg, ReplyKey};
use crate::options::cancel::CancelMode;
use crate::streaming::{Chunk, StreamMode};

/// A single-shot completion for a plain (non-streaming) pending request.
pub type Completion = oneshot::Sender<Result<Msg, WampError>>;

struct StreamRecord {
    chunk_tx: mpsc::UnboundedSender<Result<Chunk, WampError>>,
    mode: StreamMode,
}

/// Tracks outstanding requests this peer has sent to the router, drives
/// per-request timeouts, and routes progressive call chunks to open
/// caller-side streaming channels.
pub struct Requestor {
    next_request_id: WampId,
    pending: HashMap<ReplyKey, Completion>,
    channels: HashMap<WampId, StreamRecord>,
    deadlines: TimeoutScheduler,
}

impl Requestor {
    pub fn new() -> Self {
        Requestor {
            next_request_id: 1,
            pending: HashMap::new(),
            channels: HashMap::new(),
            deadlines: TimeoutScheduler::new(),
        }
    }

    /// Allocates the next strictly-increasing request id.
    pub fn next_request_id(&mut self) -> WampId {
        assert!(
            self.next_request_id < WAMP_ID_MAX,
            "request id exhausted WAMP_ID_MAX"
        );
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Registers a pending single-shot request awaiting `reply_kind`.
    pub fn register(&mut self, reply_kind: MessageKind, request_id: WampId, tx: Completion) {
        self.pending.insert((reply_kind, request_id), tx);
    }

    /// Registers a pending request together with a timeout after which it is
    /// cancelled with `killnowait` and completed with a timeout error.
    pub fn register_with_timeout(
        &mut self,
        reply_kind: MessageKind,
        request_id: WampId,
        tx: Completion,
        timeout: Option<Duration>,
    ) {
        self.register(reply_kind, request_id, tx);
        if let Some(timeout) = timeout {
            self.deadlines.arm(request_id, timeout);
        }
    }

    /// Registers the channel a streamed call's progressive chunks arrive on.
    pub fn register_stream(
        &mut self,
        channel_id: WampId,
        mode: StreamMode,
        chunk_tx: mpsc::UnboundedSender<Result<Chunk, WampError>>,
    ) {
        self.channels.insert(channel_id, StreamRecord { chunk_tx, mode });
    }

    /// Dispatches a reply-shaped message to its pending request or open
    /// stream. Returns true if the message was claimed by this requestor.
    pub fn resolve_reply(&mut self, msg: Msg) -> bool {
        let key = match msg.reply_key() {
            Some(k) => k,
            None => return false,
        };

        if key.0 == MessageKind::Call {
            if let Some(record) = self.channels.get(&key.1) {
                let is_final = !msg.is_progress();
                let chunk = message_to_chunk(&msg, is_final);
                let _ = record.chunk_tx.send(chunk);
                if is_final {
                    self.channels.remove(&key.1);
                    self.deadlines.cancel(key.1);
                }
                return true;
            }
        }

        if msg.is_progress() {
            // A progress-flagged reply with no open channel is a stray
            // progressive result for a plain (non-streaming) call; ignore.
            return self.pending.contains_key(&key);
        }

        self.deadlines.cancel(key.1);
        if let Some(tx) = self.pending.remove(&key) {
            let result = match &msg {
                Msg::Error { error, details, .. } => {
                    Err(WampError::ServerError(error.clone(), details.clone()))
                }
                _ => Ok(msg),
            };
            let _ = tx.send(result);
            true
        } else {
            false
        }
    }

    /// Requests expired since the last call; the caller (Core) is
    /// responsible for sending CANCEL(killnowait) for each and completing it
    /// with a timeout error.
    pub fn expire_timeouts(&mut self) -> Vec<WampId> {
        self.deadlines.pop_expired()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.next_deadline()
    }

    /// Completes a request locally with a timeout error, used once Core has
    /// sent the CANCEL(killnowait) message for an expired deadline.
    pub fn complete_timeout(&mut self, request_id: WampId) {
        if let Some(tx) = self.pending.remove(&(MessageKind::Call, request_id)) {
            let _ = tx.send(Err(WampError::Cancelled(SessionErrc::Timeout)));
        }
    }

    /// Handles a local `cancel_call` request. For `kill`, the pending
    /// completion is left in place (the router is expected to eventually
    /// reply with an Error once the callee responds). For `killnowait` and
    /// `skip`, the call is completed immediately with `cancelled`.
    pub fn cancel_call(&mut self, request_id: WampId, mode: CancelMode) {
        self.deadlines.cancel(request_id);
        if mode == CancelMode::Kill {
            return;
        }
        if let Some(tx) = self.pending.remove(&(MessageKind::Call, request_id)) {
            let _ = tx.send(Err(WampError::Cancelled(SessionErrc::Cancelled)));
        }
        if let Some(record) = self.channels.remove(&request_id) {
            let _ = record
                .chunk_tx
                .send(Err(WampError::Cancelled(SessionErrc::Cancelled)));
        }
    }

    /// Completes every pending request and open channel with `errc`,
    /// used when the session ends or the transport fails.
    pub fn abandon_all(&mut self, errc: SessionErrc) {
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(WampError::InvalidState(errc)));
        }
        for (_, record) in self.channels.drain() {
            let _ = record.chunk_tx.send(Err(WampError::InvalidState(errc)));
        }
        self.deadlines = TimeoutScheduler::new();
    }
}

impl Default for Requestor {
    fn default() -> Self {
        Self::new()
    }
}

fn message_to_chunk(msg: &Msg, is_final: bool) -> Result<Chunk, WampError> {
    match msg {
        Msg::Result {
            arguments,
            arguments_kw,
            ..
        } => Ok(Chunk {
            arguments: arguments.clone(),
            arguments_kw: arguments_kw.clone(),
            is_final,
        }),
        Msg::Error { error, details, .. } => {
            Err(WampError::ServerError(error.clone(), details.clone()))
        }
        _ => Err(WampError::ProtocolError(
            "unexpected message routed to a streaming channel".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_monotonic_starting_at_one() {
        let mut r = Requestor::new();
        assert_eq!(r.next_request_id(), 1);
        assert_eq!(r.next_request_id(), 2);
        assert_eq!(r.next_request_id(), 3);
    }

    #[test]
    fn resolve_reply_completes_the_matching_pending_request() {
        let mut r = Requestor::new();
        let (tx, rx) = oneshot::channel();
        r.register(MessageKind::Subscribe, 7, tx);

        let claimed = r.resolve_reply(Msg::Subscribed {
            request: 7,
            subscription: 42,
        });
        assert!(claimed);
        let reply = rx.try_recv().unwrap().unwrap();
        assert_eq!(reply.kind(), MessageKind::Subscribed);
    }

    #[test]
    fn error_reply_completes_with_server_error() {
        let mut r = Requestor::new();
        let (tx, rx) = oneshot::channel();
        r.register(MessageKind::Call, 3, tx);

        r.resolve_reply(Msg::Error {
            request_type: MessageKind::Call.to_id(),
            request: 3,
            details: WampDict::new(),
            error: "wamp.error.no_such_procedure".to_owned(),
            arguments: None,
            arguments_kw: None,
        });

        match rx.try_recv().unwrap() {
            Err(WampError::ServerError(uri, _)) => assert_eq!(uri, "wamp.error.no_such_procedure"),
            other => panic!("expected ServerError, got {:?}", other),
        }
    }

    #[test]
    fn killnowait_cancel_completes_locally_with_cancelled() {
        let mut r = Requestor::new();
        let (tx, rx) = oneshot::channel();
        r.register(MessageKind::Call, 5, tx);

        r.cancel_call(5, CancelMode::KillNoWait);

        match rx.try_recv().unwrap() {
            Err(WampError::Cancelled(SessionErrc::Cancelled)) => {}
            other => panic!("expected Cancelled, got {:?}", other),
        }
    }

    #[test]
    fn kill_cancel_leaves_the_pending_request_armed() {
        let mut r = Requestor::new();
        let (tx, rx) = oneshot::channel();
        r.register(MessageKind::Call, 9, tx);

        r.cancel_call(9, CancelMode::Kill);
        assert!(rx.try_recv().is_err());
    }
}
