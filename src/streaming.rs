//! Caller- and callee-side handles for progressive (streaming) calls.
//!
//! A streaming call opens a channel identified by the initiating CALL's
//! request id. Either side may then send zero or more chunks before the
//! stream is closed by a final (non-progressive) RESULT/YIELD or an ERROR.

use tokio::sync::{mpsc, oneshot};

use crate::common::*;
use crate::error::WampError;
use crate::options::cancel::CancelMode;

pub type ChannelId = WampId;

/// Lifecycle of a caller or callee streaming channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Opened, waiting for the first chunk/invitation to be accepted
    Awaiting,
    /// Accepted, chunks may flow in either direction allowed by the mode
    Open,
    /// A final chunk or error has been sent/received
    Closed,
}

/// Which side(s) of a streaming call may send progressive chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Only the caller sends chunks (progressive call arguments)
    CallerToCallee,
    /// Only the callee sends chunks (progressive call results)
    CalleeToCaller,
    /// Both sides may send chunks
    Bidirectional,
}

/// A chunk of positional/keyword data exchanged over an open channel.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub arguments: Option<WampArgs>,
    pub arguments_kw: Option<WampKwArgs>,
    /// False on the last chunk sent for a given direction
    pub is_final: bool,
}

/// Describes a new streaming call to be opened by `Client::open_stream`.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub procedure: WampUri,
    pub mode: StreamMode,
    pub options: WampDict,
    pub arguments: Option<WampArgs>,
    pub arguments_kw: Option<WampKwArgs>,
}

impl StreamRequest {
    pub fn new<T: Into<String>>(procedure: T, mode: StreamMode) -> Self {
        StreamRequest {
            procedure: procedure.into(),
            mode,
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
        }
    }
}

/// The outcome a callee's invocation handler returns for a plain (non
/// streaming) RPC: an immediate result, an immediate error, or a promise that
/// the callee will call `yield_result`/`yield_error` on the registry later.
#[derive(Debug)]
pub enum Outcome {
    Result {
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Error {
        uri: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Deferred,
}

impl Outcome {
    pub fn empty() -> Self {
        Outcome::Result {
            arguments: None,
            arguments_kw: None,
        }
    }
}

/// Handed to a registered procedure's call slot for each INVOCATION.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: WampId,
    pub registration_id: WampId,
    pub procedure: Option<WampUri>,
    pub arguments: Option<WampArgs>,
    pub arguments_kw: Option<WampKwArgs>,
    pub caller: Option<WampId>,
    pub is_progress: bool,
}

/// Handed to a registered procedure's interrupt slot, or delivered over a
/// `CalleeChannel`'s interrupt receiver, when the caller cancels a call.
#[derive(Debug, Clone)]
pub struct Interruption {
    pub request_id: WampId,
    pub mode: Option<CancelMode>,
    pub reason: Option<WampUri>,
}

/// A positional/keyword RPC argument bundle, used both to issue a call and to
/// carry its eventual result.
#[derive(Debug, Clone, Default)]
pub struct Rpc {
    pub arguments: Option<WampArgs>,
    pub arguments_kw: Option<WampKwArgs>,
    pub options: WampDict,
    pub timeout_ms: Option<u64>,
    pub cancel_mode: CancelMode,
}

/// Caller-side handle to an open progressive call.
///
/// Dropping this without calling `cancel()` abandons the channel; any chunks
/// already in flight from the callee are simply discarded by the Requestor.
pub struct CallerChannel {
    pub(crate) id: ChannelId,
    pub(crate) mode: StreamMode,
    pub(crate) state: ChannelState,
    pub(crate) chunks: mpsc::UnboundedReceiver<Result<Chunk, WampError>>,
    pub(crate) outbound: mpsc::UnboundedSender<Chunk>,
    pub(crate) cancel: Option<oneshot::Sender<CancelMode>>,
}

impl CallerChannel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Waits for the next chunk sent by the callee.
    pub async fn recv(&mut self) -> Option<Result<Chunk, WampError>> {
        self.chunks.recv().await
    }

    /// Sends a chunk of progressive call arguments to the callee.
    pub fn send(&self, chunk: Chunk) -> Result<(), WampError> {
        self.outbound
            .send(chunk)
            .map_err(|_| WampError::ClientDied)
    }

    /// Cancels the call using the given mode, closing the channel.
    pub fn cancel(&mut self, mode: CancelMode) -> Result<(), WampError> {
        self.state = ChannelState::Closed;
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(mode);
        }
        Ok(())
    }
}

/// Callee-side handle to an open progressive invocation.
pub struct CalleeChannel {
    pub(crate) id: ChannelId,
    pub(crate) invitation_expected: bool,
    pub(crate) invitation: Chunk,
    pub(crate) state: ChannelState,
    pub(crate) chunks: mpsc::UnboundedReceiver<Chunk>,
    pub(crate) interrupts: mpsc::UnboundedReceiver<Interruption>,
    pub(crate) outbound: mpsc::UnboundedSender<Chunk>,
}

impl CalleeChannel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn invitation_expected(&self) -> bool {
        self.invitation_expected
    }

    /// The arguments carried by the initiating INVOCATION that opened this
    /// channel, available whether or not `invitation_expected` is set.
    pub fn invitation(&self) -> &Chunk {
        &self.invitation
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Waits for the next chunk sent by the caller.
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.chunks.recv().await
    }

    /// Waits for an interruption of this channel.
    pub async fn interrupted(&mut self) -> Option<Interruption> {
        self.interrupts.recv().await
    }

    /// Sends a chunk of progressive call results back to the caller.
    pub fn send(&self, chunk: Chunk) -> Result<(), WampError> {
        self.outbound
            .send(chunk)
            .map_err(|_| WampError::ClientDied)
    }
}
