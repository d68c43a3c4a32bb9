mod client;
mod common;
mod core;
mod error;
mod message;
mod options;
mod serializer;
mod streaming;
mod transport;

pub use client::{CallCompletion, Client, ClientConfig, ClientState};
pub use common::*;
pub use core::{ChallengeHandler, Event, SlotId};
pub use error::*;
pub use message::{MessageKind, Msg, ReplyKey};
pub use options::{
    CallOptions, CancelMode, CancelOptions, OptionBuilder, PublishOptions, RegisterOptions,
    SubscribeOptions, WampOption,
};
pub use serializer::SerializerType;
pub use streaming::{
    CalleeChannel, CallerChannel, Interruption, Invocation, Outcome, Rpc, StreamRequest,
};
pub use transport::{Transport, TransportError};
