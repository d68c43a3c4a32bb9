use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::*;

/// The message kind field found in the first element of every WAMP message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u64)]
pub enum MessageKind {
    Hello = 1,
    Welcome = 2,
    Abort = 3,
    Challenge = 4,
    Authenticate = 5,
    Goodbye = 6,
    Error = 8,
    Publish = 16,
    Published = 17,
    Subscribe = 32,
    Subscribed = 33,
    Unsubscribe = 34,
    Unsubscribed = 35,
    Event = 36,
    Call = 48,
    Cancel = 49,
    Result = 50,
    Register = 64,
    Registered = 65,
    Unregister = 66,
    Unregistered = 67,
    Invocation = 68,
    Interrupt = 69,
    Yield = 70,
}

impl MessageKind {
    pub fn from_id(id: WampInteger) -> Option<Self> {
        Some(match id {
            1 => MessageKind::Hello,
            2 => MessageKind::Welcome,
            3 => MessageKind::Abort,
            4 => MessageKind::Challenge,
            5 => MessageKind::Authenticate,
            6 => MessageKind::Goodbye,
            8 => MessageKind::Error,
            16 => MessageKind::Publish,
            17 => MessageKind::Published,
            32 => MessageKind::Subscribe,
            33 => MessageKind::Subscribed,
            34 => MessageKind::Unsubscribe,
            35 => MessageKind::Unsubscribed,
            36 => MessageKind::Event,
            48 => MessageKind::Call,
            49 => MessageKind::Cancel,
            50 => MessageKind::Result,
            64 => MessageKind::Register,
            65 => MessageKind::Registered,
            66 => MessageKind::Unregister,
            67 => MessageKind::Unregistered,
            68 => MessageKind::Invocation,
            69 => MessageKind::Interrupt,
            70 => MessageKind::Yield,
            _ => return None,
        })
    }

    pub fn to_id(&self) -> WampInteger {
        *self as WampInteger
    }
}

/// A (kind-this-replies-to, requestId) pair used by the Requestor to
/// correlate an outgoing request with its eventual reply.
pub type ReplyKey = (MessageKind, WampId);

/// A fully decoded WAMP protocol message.
#[derive(Debug, Clone)]
pub enum Msg {
    Hello {
        realm: WampUri,
        details: WampDict,
    },
    Welcome {
        session: WampId,
        details: WampDict,
    },
    Abort {
        details: WampDict,
        reason: WampUri,
    },
    Challenge {
        authmethod: WampString,
        extra: WampDict,
    },
    Authenticate {
        signature: WampString,
        extra: WampDict,
    },
    Goodbye {
        details: WampDict,
        reason: WampUri,
    },
    Error {
        request_type: WampInteger,
        request: WampId,
        details: WampDict,
        error: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Publish {
        request: WampId,
        options: WampDict,
        topic: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Published {
        request: WampId,
        publication: WampId,
    },
    Subscribe {
        request: WampId,
        options: WampDict,
        topic: WampUri,
    },
    Subscribed {
        request: WampId,
        subscription: WampId,
    },
    Unsubscribe {
        request: WampId,
        subscription: WampId,
    },
    Unsubscribed {
        request: WampId,
    },
    Event {
        subscription: WampId,
        publication: WampId,
        details: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Call {
        request: WampId,
        options: WampDict,
        procedure: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Cancel {
        request: WampId,
        options: WampDict,
    },
    Result {
        request: WampId,
        details: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Register {
        request: WampId,
        options: WampDict,
        procedure: WampUri,
    },
    Registered {
        request: WampId,
        registration: WampId,
    },
    Unregister {
        request: WampId,
        registration: WampId,
    },
    Unregistered {
        request: WampId,
    },
    Invocation {
        request: WampId,
        registration: WampId,
        details: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Interrupt {
        request: WampId,
        options: WampDict,
    },
    Yield {
        request: WampId,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
}

impl Msg {
    pub fn kind(&self) -> MessageKind {
        match self {
            Msg::Hello { .. } => MessageKind::Hello,
            Msg::Welcome { .. } => MessageKind::Welcome,
            Msg::Abort { .. } => MessageKind::Abort,
            Msg::Challenge { .. } => MessageKind::Challenge,
            Msg::Authenticate { .. } => MessageKind::Authenticate,
            Msg::Goodbye { .. } => MessageKind::Goodbye,
            Msg::Error { .. } => MessageKind::Error,
            Msg::Publish { .. } => MessageKind::Publish,
            Msg::Published { .. } => MessageKind::Published,
            Msg::Subscribe { .. } => MessageKind::Subscribe,
            Msg::Subscribed { .. } => MessageKind::Subscribed,
            Msg::Unsubscribe { .. } => MessageKind::Unsubscribe,
            Msg::Unsubscribed { .. } => MessageKind::Unsubscribed,
            Msg::Event { .. } => MessageKind::Event,
            Msg::Call { .. } => MessageKind::Call,
            Msg::Cancel { .. } => MessageKind::Cancel,
            Msg::Result { .. } => MessageKind::Result,
            Msg::Register { .. } => MessageKind::Register,
            Msg::Registered { .. } => MessageKind::Registered,
            Msg::Unregister { .. } => MessageKind::Unregister,
            Msg::Unregistered { .. } => MessageKind::Unregistered,
            Msg::Invocation { .. } => MessageKind::Invocation,
            Msg::Interrupt { .. } => MessageKind::Interrupt,
            Msg::Yield { .. } => MessageKind::Yield,
        }
    }

    /// The requestId field carried by this message, if any.
    pub fn request_id(&self) -> Option<WampId> {
        Some(match self {
            Msg::Error { request, .. }
            | Msg::Publish { request, .. }
            | Msg::Published { request, .. }
            | Msg::Subscribe { request, .. }
            | Msg::Subscribed { request, .. }
            | Msg::Unsubscribe { request, .. }
            | Msg::Unsubscribed { request }
            | Msg::Call { request, .. }
            | Msg::Cancel { request, .. }
            | Msg::Result { request, .. }
            | Msg::Register { request, .. }
            | Msg::Registered { request, .. }
            | Msg::Unregister { request, .. }
            | Msg::Unregistered { request }
            | Msg::Invocation { request, .. }
            | Msg::Interrupt { request, .. }
            | Msg::Yield { request, .. } => *request,
            _ => return None,
        })
    }

    /// True if this is a reply message (used to check pending-request bookkeeping)
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            Msg::Error { .. }
                | Msg::Published { .. }
                | Msg::Subscribed { .. }
                | Msg::Unsubscribed { .. }
                | Msg::Result { .. }
                | Msg::Registered { .. }
                | Msg::Unregistered { .. }
        )
    }

    /// The (requestKind, requestId) pair used to correlate this reply with
    /// the pending request it answers, if it is a reply message.
    pub fn reply_key(&self) -> Option<ReplyKey> {
        match self {
            Msg::Published { request, .. } => Some((MessageKind::Publish, *request)),
            Msg::Subscribed { request, .. } => Some((MessageKind::Subscribe, *request)),
            Msg::Unsubscribed { request } => Some((MessageKind::Unsubscribe, *request)),
            Msg::Registered { request, .. } => Some((MessageKind::Register, *request)),
            Msg::Unregistered { request } => Some((MessageKind::Unregister, *request)),
            Msg::Result { request, .. } => Some((MessageKind::Call, *request)),
            Msg::Error {
                request_type,
                request,
                ..
            } => MessageKind::from_id(*request_type).map(|k| (k, *request)),
            _ => None,
        }
    }

    /// True if this result/yield/invocation/call carries the `progress` option set
    pub fn is_progress(&self) -> bool {
        let details = match self {
            Msg::Result { details, .. } => details,
            Msg::Yield { options, .. } => options,
            Msg::Invocation { details, .. } => details,
            Msg::Call { options, .. } => options,
            _ => return false,
        };
        details
            .get("progress")
            .and_then(Arg::as_bool)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Wire encoding : every WAMP message is a positional array whose first
// element is the message kind. We hand-roll (de)serialization instead of
// deriving it, since serde's derive produces self-describing structs, not
// positional arrays multiplexed under one leading discriminant.
// ---------------------------------------------------------------------------

macro_rules! seq_len {
    ($args:expr, $kwargs:expr, $base:expr) => {
        if $kwargs.is_some() {
            $base + 2
        } else if $args.is_some() {
            $base + 1
        } else {
            $base
        }
    };
}

impl Serialize for Msg {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Msg::Hello { realm, details } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Hello.to_id())?;
                s.serialize_element(realm)?;
                s.serialize_element(details)?;
                s.end()
            }
            Msg::Welcome { session, details } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Welcome.to_id())?;
                s.serialize_element(session)?;
                s.serialize_element(details)?;
                s.end()
            }
            Msg::Abort { details, reason } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Abort.to_id())?;
                s.serialize_element(details)?;
                s.serialize_element(reason)?;
                s.end()
            }
            Msg::Challenge { authmethod, extra } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Challenge.to_id())?;
                s.serialize_element(authmethod)?;
                s.serialize_element(extra)?;
                s.end()
            }
            Msg::Authenticate { signature, extra } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Authenticate.to_id())?;
                s.serialize_element(signature)?;
                s.serialize_element(extra)?;
                s.end()
            }
            Msg::Goodbye { details, reason } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Goodbye.to_id())?;
                s.serialize_element(details)?;
                s.serialize_element(reason)?;
                s.end()
            }
            Msg::Error {
                request_type,
                request,
                details,
                error,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 5)))?;
                s.serialize_element(&MessageKind::Error.to_id())?;
                s.serialize_element(request_type)?;
                s.serialize_element(request)?;
                s.serialize_element(details)?;
                s.serialize_element(error)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
            Msg::Publish {
                request,
                options,
                topic,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 4)))?;
                s.serialize_element(&MessageKind::Publish.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                s.serialize_element(topic)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
            Msg::Published {
                request,
                publication,
            } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Published.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(publication)?;
                s.end()
            }
            Msg::Subscribe {
                request,
                options,
                topic,
            } => {
                let mut s = serializer.serialize_seq(Some(4))?;
                s.serialize_element(&MessageKind::Subscribe.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                s.serialize_element(topic)?;
                s.end()
            }
            Msg::Subscribed {
                request,
                subscription,
            } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Subscribed.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(subscription)?;
                s.end()
            }
            Msg::Unsubscribe {
                request,
                subscription,
            } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Unsubscribe.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(subscription)?;
                s.end()
            }
            Msg::Unsubscribed { request } => {
                let mut s = serializer.serialize_seq(Some(2))?;
                s.serialize_element(&MessageKind::Unsubscribed.to_id())?;
                s.serialize_element(request)?;
                s.end()
            }
            Msg::Event {
                subscription,
                publication,
                details,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 4)))?;
                s.serialize_element(&MessageKind::Event.to_id())?;
                s.serialize_element(subscription)?;
                s.serialize_element(publication)?;
                s.serialize_element(details)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
            Msg::Call {
                request,
                options,
                procedure,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 4)))?;
                s.serialize_element(&MessageKind::Call.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                s.serialize_element(procedure)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
            Msg::Cancel { request, options } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Cancel.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                s.end()
            }
            Msg::Result {
                request,
                details,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 3)))?;
                s.serialize_element(&MessageKind::Result.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(details)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
            Msg::Register {
                request,
                options,
                procedure,
            } => {
                let mut s = serializer.serialize_seq(Some(4))?;
                s.serialize_element(&MessageKind::Register.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                s.serialize_element(procedure)?;
                s.end()
            }
            Msg::Registered {
                request,
                registration,
            } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Registered.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(registration)?;
                s.end()
            }
            Msg::Unregister {
                request,
                registration,
            } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Unregister.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(registration)?;
                s.end()
            }
            Msg::Unregistered { request } => {
                let mut s = serializer.serialize_seq(Some(2))?;
                s.serialize_element(&MessageKind::Unregistered.to_id())?;
                s.serialize_element(request)?;
                s.end()
            }
            Msg::Invocation {
                request,
                registration,
                details,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 4)))?;
                s.serialize_element(&MessageKind::Invocation.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(registration)?;
                s.serialize_element(details)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
            Msg::Interrupt { request, options } => {
                let mut s = serializer.serialize_seq(Some(3))?;
                s.serialize_element(&MessageKind::Interrupt.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                s.end()
            }
            Msg::Yield {
                request,
                options,
                arguments,
                arguments_kw,
            } => {
                let mut s =
                    serializer.serialize_seq(Some(seq_len!(arguments, arguments_kw, 3)))?;
                s.serialize_element(&MessageKind::Yield.to_id())?;
                s.serialize_element(request)?;
                s.serialize_element(options)?;
                serialize_args(&mut s, arguments, arguments_kw)?;
                s.end()
            }
        }
    }
}

fn serialize_args<S>(
    s: &mut S,
    arguments: &Option<WampArgs>,
    arguments_kw: &Option<WampKwArgs>,
) -> Result<(), S::Error>
where
    S: SerializeSeq,
{
    if arguments_kw.is_some() {
        s.serialize_element(arguments.as_ref().unwrap_or(&Vec::new()))?;
        s.serialize_element(arguments_kw.as_ref().unwrap())?;
    } else if let Some(args) = arguments {
        s.serialize_element(args)?;
    }
    Ok(())
}

impl<'de> Deserialize<'de> for Msg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(MsgVisitor)
    }
}

struct MsgVisitor;

impl<'de> Visitor<'de> for MsgVisitor {
    type Value = Msg;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a WAMP message array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Msg, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let kind_id: WampInteger = next(&mut seq, "kind")?;
        let kind = MessageKind::from_id(kind_id)
            .ok_or_else(|| de::Error::custom(format!("unknown message kind {}", kind_id)))?;

        Ok(match kind {
            MessageKind::Hello => Msg::Hello {
                realm: next(&mut seq, "realm")?,
                details: next(&mut seq, "details")?,
            },
            MessageKind::Welcome => Msg::Welcome {
                session: next(&mut seq, "session")?,
                details: next(&mut seq, "details")?,
            },
            MessageKind::Abort => Msg::Abort {
                details: next(&mut seq, "details")?,
                reason: next(&mut seq, "reason")?,
            },
            MessageKind::Challenge => Msg::Challenge {
                authmethod: next(&mut seq, "authmethod")?,
                extra: next(&mut seq, "extra")?,
            },
            MessageKind::Authenticate => Msg::Authenticate {
                signature: next(&mut seq, "signature")?,
                extra: next(&mut seq, "extra")?,
            },
            MessageKind::Goodbye => Msg::Goodbye {
                details: next(&mut seq, "details")?,
                reason: next(&mut seq, "reason")?,
            },
            MessageKind::Error => {
                let request_type = next(&mut seq, "requestType")?;
                let request = next(&mut seq, "request")?;
                let details = next(&mut seq, "details")?;
                let error = next(&mut seq, "error")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Error {
                    request_type,
                    request,
                    details,
                    error,
                    arguments,
                    arguments_kw,
                }
            }
            MessageKind::Publish => {
                let request = next(&mut seq, "request")?;
                let options = next(&mut seq, "options")?;
                let topic = next(&mut seq, "topic")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Publish {
                    request,
                    options,
                    topic,
                    arguments,
                    arguments_kw,
                }
            }
            MessageKind::Published => Msg::Published {
                request: next(&mut seq, "request")?,
                publication: next(&mut seq, "publication")?,
            },
            MessageKind::Subscribe => Msg::Subscribe {
                request: next(&mut seq, "request")?,
                options: next(&mut seq, "options")?,
                topic: next(&mut seq, "topic")?,
            },
            MessageKind::Subscribed => Msg::Subscribed {
                request: next(&mut seq, "request")?,
                subscription: next(&mut seq, "subscription")?,
            },
            MessageKind::Unsubscribe => Msg::Unsubscribe {
                request: next(&mut seq, "request")?,
                subscription: next(&mut seq, "subscription")?,
            },
            MessageKind::Unsubscribed => Msg::Unsubscribed {
                request: next(&mut seq, "request")?,
            },
            MessageKind::Event => {
                let subscription = next(&mut seq, "subscription")?;
                let publication = next(&mut seq, "publication")?;
                let details = next(&mut seq, "details")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Event {
                    subscription,
                    publication,
                    details,
                    arguments,
                    arguments_kw,
                }
            }
            MessageKind::Call => {
                let request = next(&mut seq, "request")?;
                let options = next(&mut seq, "options")?;
                let procedure = next(&mut seq, "procedure")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Call {
                    request,
                    options,
                    procedure,
                    arguments,
                    arguments_kw,
                }
            }
            MessageKind::Cancel => Msg::Cancel {
                request: next(&mut seq, "request")?,
                options: next(&mut seq, "options")?,
            },
            MessageKind::Result => {
                let request = next(&mut seq, "request")?;
                let details = next(&mut seq, "details")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Result {
                    request,
                    details,
                    arguments,
                    arguments_kw,
                }
            }
            MessageKind::Register => Msg::Register {
                request: next(&mut seq, "request")?,
                options: next(&mut seq, "options")?,
                procedure: next(&mut seq, "procedure")?,
            },
            MessageKind::Registered => Msg::Registered {
                request: next(&mut seq, "request")?,
                registration: next(&mut seq, "registration")?,
            },
            MessageKind::Unregister => Msg::Unregister {
                request: next(&mut seq, "request")?,
                registration: next(&mut seq, "registration")?,
            },
            MessageKind::Unregistered => Msg::Unregistered {
                request: next(&mut seq, "request")?,
            },
            MessageKind::Invocation => {
                let request = next(&mut seq, "request")?;
                let registration = next(&mut seq, "registration")?;
                let details = next(&mut seq, "details")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Invocation {
                    request,
                    registration,
                    details,
                    arguments,
                    arguments_kw,
                }
            }
            MessageKind::Interrupt => Msg::Interrupt {
                request: next(&mut seq, "request")?,
                options: next(&mut seq, "options")?,
            },
            MessageKind::Yield => {
                let request = next(&mut seq, "request")?;
                let options = next(&mut seq, "options")?;
                let (arguments, arguments_kw) = next_args(&mut seq)?;
                Msg::Yield {
                    request,
                    options,
                    arguments,
                    arguments_kw,
                }
            }
        })
    }
}

fn next<'de, A, T>(seq: &mut A, field: &'static str) -> Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(0, &field))
}

fn next_args<'de, A>(seq: &mut A) -> Result<(Option<WampArgs>, Option<WampKwArgs>), A::Error>
where
    A: SeqAccess<'de>,
{
    let arguments: Option<WampArgs> = seq.next_element()?;
    let arguments_kw: Option<WampKwArgs> = seq.next_element()?;
    Ok((arguments, arguments_kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips_through_json() {
        let mut details = WampDict::new();
        details.insert("roles".to_owned(), Arg::Dict(WampDict::new()));
        let msg = Msg::Hello {
            realm: "realm1".to_owned(),
            details,
        };

        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Msg = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.kind(), MessageKind::Hello);
    }

    #[test]
    fn result_reply_key_targets_call() {
        let msg = Msg::Result {
            request: 7,
            details: WampDict::new(),
            arguments: None,
            arguments_kw: None,
        };
        assert_eq!(msg.reply_key(), Some((MessageKind::Call, 7)));
    }

    #[test]
    fn error_reply_key_uses_request_type_field() {
        let msg = Msg::Error {
            request_type: MessageKind::Subscribe.to_id(),
            request: 3,
            details: WampDict::new(),
            error: "wamp.error.not_authorized".to_owned(),
            arguments: None,
            arguments_kw: None,
        };
        assert_eq!(msg.reply_key(), Some((MessageKind::Subscribe, 3)));
    }

    #[test]
    fn call_with_kwargs_always_serializes_positional_args() {
        let mut kwargs = WampKwArgs::new();
        kwargs.insert("x".to_owned(), Arg::Integer(1));
        let msg = Msg::Call {
            request: 1,
            options: WampDict::new(),
            procedure: "a.b".to_owned(),
            arguments: None,
            arguments_kw: Some(kwargs),
        };

        let bytes = serde_json::to_vec(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let array = value.as_array().unwrap();
        // [48, request, options, procedure, args, kwargs]
        assert_eq!(array.len(), 6);
        assert!(array[4].is_array());
        assert!(array[5].is_object());
    }
}
