use std::collections::HashMap;

use log::*;
use serde::{Deserialize, Serialize};

/// A WAMP URI (e.g. `"com.myapp.topic1"`)
pub type WampUri = String;
/// A WAMP ID : an integer in the range `[0, 2^53]`
pub type WampId = u64;
/// A generic, non-negative integer used in message fields (message kind, request type, ...)
pub type WampInteger = u64;
/// A UTF-8 string
pub type WampString = String;
/// A WAMP boolean
pub type WampBool = bool;
/// A string-keyed dictionary of dynamically typed values
pub type WampDict = HashMap<String, Arg>;
/// An ordered list of dynamically typed values
pub type WampList = Vec<Arg>;
/// Positional call/event/yield arguments
pub type WampArgs = WampList;
/// Keyword call/event/yield arguments
pub type WampKwArgs = WampDict;

/// The largest WampId value that preserves interoperability with codecs
/// that represent integers as IEEE754 doubles (e.g. JSON).
pub const WAMP_ID_MAX: WampId = 1u64 << 53;

/// A single value in the codec's variant/tagged value model.
///
/// The core never interprets the contents of an [`Arg`]: conversions
/// to/from application types are entirely the caller's responsibility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// A WAMP URI, used where the wire format calls for a `uri` typed field
    Uri(WampUri),
    /// A signed integer
    Integer(i64),
    /// An unsigned integer / WAMP ID
    Id(WampId),
    /// A floating point number
    Float(f64),
    /// A UTF-8 string, including the empty string
    String(WampString),
    /// A boolean value
    Bool(WampBool),
    /// A nested dictionary
    Dict(WampDict),
    /// A nested list
    List(WampList),
    /// Absence of a value
    Null,
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Uri(s) | Arg::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Arg::Id(v) => Some(*v),
            Arg::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&WampDict> {
        match self {
            Arg::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&WampList> {
        match self {
            Arg::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::String(v.to_owned())
    }
}
impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::String(v)
    }
}
impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}
impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Integer(v)
    }
}
impl From<WampDict> for Arg {
    fn from(v: WampDict) -> Self {
        Arg::Dict(v)
    }
}
impl From<WampList> for Arg {
    fn from(v: WampList) -> Self {
        Arg::List(v)
    }
}

/// Roles a client may advertise to the router in `HELLO.Details.roles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    Caller,
    Callee,
    Publisher,
    Subscriber,
}

impl ClientRole {
    pub fn to_str(&self) -> &'static str {
        match self {
            ClientRole::Caller => "caller",
            ClientRole::Callee => "callee",
            ClientRole::Publisher => "publisher",
            ClientRole::Subscriber => "subscriber",
        }
    }

    /// The feature keys this core advertises for the given role in
    /// `HELLO.Details.roles.<role>.features`.
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            ClientRole::Caller => &[
                "caller_identification",
                "call_timeout",
                "call_canceling",
                "progressive_call_results",
                "progressive_calls",
            ],
            ClientRole::Callee => &[
                "caller_identification",
                "call_trustlevels",
                "pattern_based_registration",
                "call_timeout",
                "call_canceling",
                "progressive_call_results",
                "progressive_calls",
            ],
            ClientRole::Publisher => &[
                "publisher_identification",
                "publisher_exclusion",
                "subscriber_blackwhite_listing",
            ],
            ClientRole::Subscriber => &[
                "publisher_identification",
                "pattern_based_subscription",
            ],
        }
    }
}

/// Authentication methods a client can offer in `HELLO.Details.authmethods`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationMethod {
    Anonymous,
    Ticket,
    WampCra,
    CryptoSign,
}

impl AuthenticationMethod {
    pub fn as_ref(&self) -> &'static str {
        match self {
            AuthenticationMethod::Anonymous => "anonymous",
            AuthenticationMethod::Ticket => "ticket",
            AuthenticationMethod::WampCra => "wampcra",
            AuthenticationMethod::CryptoSign => "cryptosign",
        }
    }
}

/// Reply to a CHALLENGE message, returned by a user-supplied challenge handler
#[derive(Debug, Clone)]
pub struct AuthenticationChallengeResponse {
    pub signature: WampString,
    pub extra: WampDict,
}

impl AuthenticationChallengeResponse {
    pub fn with_signature<T: Into<String>>(signature: T) -> Self {
        AuthenticationChallengeResponse {
            signature: signature.into(),
            extra: WampDict::new(),
        }
    }
}

/// Returns whether a uri is valid or not (using strict rules)
pub fn is_valid_strict_uri<T: AsRef<str>>(in_uri: T) -> bool {
    let uri: &str = in_uri.as_ref();
    let mut num_chars_token: usize = 0;

    if uri.is_empty() {
        warn!("URI cannot be empty");
        return false;
    }

    if uri.starts_with("wamp.") {
        warn!("URI '{}' cannot start with 'wamp'", uri);
        return false;
    }

    for (i, c) in uri.chars().enumerate() {
        if c == '.' {
            if num_chars_token == 0 {
                warn!(
                    "URI '{}' contains a zero length token ending @ index {}",
                    uri, i
                );
                return false;
            }
            num_chars_token = 0;
            continue;
        }

        num_chars_token += 1;

        if c == '_' {
            continue;
        }

        if !c.is_alphanumeric() || !c.is_lowercase() {
            warn!("URI '{}' contains an invalid character @ index {}", uri, i);
            return false;
        }
    }

    if num_chars_token == 0 {
        warn!("URI '{}' cannot end with a zero length token", uri);
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_uris() {
        assert!(is_valid_strict_uri("com.myapp.topic1"));
        assert!(is_valid_strict_uri("com.my_app.topic_1"));
    }

    #[test]
    fn rejects_wamp_reserved_prefix() {
        assert!(!is_valid_strict_uri("wamp.session.on_join"));
    }

    #[test]
    fn rejects_empty_tokens() {
        assert!(!is_valid_strict_uri("com..topic1"));
        assert!(!is_valid_strict_uri(".com.topic1"));
        assert!(!is_valid_strict_uri("com.topic1."));
    }

    #[test]
    fn rejects_uppercase() {
        assert!(!is_valid_strict_uri("com.MyApp.topic1"));
    }
}
