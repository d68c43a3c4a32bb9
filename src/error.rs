use quick_error::*;
use url::ParseError;

use crate::common::*;
use crate::serializer::SerializerError;
use crate::transport::TransportError;

/// The closed taxonomy of session-level outcomes a WAMP peer can report,
/// independent of the textual error URI used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionErrc {
    SessionEnded,
    SessionEndedByPeer,
    SessionAbortedByPeer,
    AllTransportsFailed,
    InvalidState,
    InvalidUri,
    NoSuchProcedure,
    ProcedureAlreadyExists,
    NoSuchRegistration,
    NoSuchSubscription,
    InvalidArgument,
    SystemShutdown,
    CloseRealm,
    GoodbyeAndOut,
    ProtocolViolation,
    NotAuthorized,
    AuthorizationFailed,
    NoSuchRealm,
    NoSuchRole,
    Cancelled,
    OptionNotAllowed,
    NoEligibleCallee,
    NetworkFailure,
    PayloadSizeExceeded,
    Timeout,
    Unknown,
}

impl SessionErrc {
    pub fn to_str(&self) -> &'static str {
        match self {
            SessionErrc::SessionEnded => "wamp.close.normal",
            SessionErrc::SessionEndedByPeer => "wamp.close.normal",
            SessionErrc::SessionAbortedByPeer => "wamp.error.authorization_failed",
            SessionErrc::AllTransportsFailed => "wamp.error.network_failure",
            SessionErrc::InvalidState => "wamp.error.invalid_state",
            SessionErrc::InvalidUri => "wamp.error.invalid_uri",
            SessionErrc::NoSuchProcedure => "wamp.error.no_such_procedure",
            SessionErrc::ProcedureAlreadyExists => "wamp.error.procedure_already_exists",
            SessionErrc::NoSuchRegistration => "wamp.error.no_such_registration",
            SessionErrc::NoSuchSubscription => "wamp.error.no_such_subscription",
            SessionErrc::InvalidArgument => "wamp.error.invalid_argument",
            SessionErrc::SystemShutdown => "wamp.error.system_shutdown",
            SessionErrc::CloseRealm => "wamp.error.close_realm",
            SessionErrc::GoodbyeAndOut => "wamp.error.goodbye_and_out",
            SessionErrc::ProtocolViolation => "wamp.error.protocol_violation",
            SessionErrc::NotAuthorized => "wamp.error.not_authorized",
            SessionErrc::AuthorizationFailed => "wamp.error.authorization_failed",
            SessionErrc::NoSuchRealm => "wamp.error.no_such_realm",
            SessionErrc::NoSuchRole => "wamp.error.no_such_role",
            SessionErrc::Cancelled => "wamp.error.canceled",
            SessionErrc::OptionNotAllowed => "wamp.error.option_not_allowed",
            SessionErrc::NoEligibleCallee => "wamp.error.no_eligible_callee",
            SessionErrc::NetworkFailure => "wamp.error.network_failure",
            SessionErrc::PayloadSizeExceeded => "wamp.error.payload_size_exceeded",
            SessionErrc::Timeout => "wamp.error.timeout",
            SessionErrc::Unknown => "wamp.error.unknown",
        }
    }
}

/// Maps a router-sent error URI to the closed `SessionErrc` taxonomy.
/// Unrecognized URIs map to `SessionErrc::Unknown`; callers that need the
/// original URI should keep it alongside (see `WampError::ServerError`).
pub fn uri_to_errc(uri: &str) -> SessionErrc {
    match uri {
        "wamp.error.invalid_uri" => SessionErrc::InvalidUri,
        "wamp.error.no_such_procedure" => SessionErrc::NoSuchProcedure,
        "wamp.error.procedure_already_exists" => SessionErrc::ProcedureAlreadyExists,
        "wamp.error.no_such_registration" => SessionErrc::NoSuchRegistration,
        "wamp.error.no_such_subscription" => SessionErrc::NoSuchSubscription,
        "wamp.error.invalid_argument" => SessionErrc::InvalidArgument,
        "wamp.error.system_shutdown" => SessionErrc::SystemShutdown,
        "wamp.error.close_realm" => SessionErrc::CloseRealm,
        "wamp.error.goodbye_and_out" => SessionErrc::GoodbyeAndOut,
        "wamp.error.protocol_violation" => SessionErrc::ProtocolViolation,
        "wamp.error.not_authorized" => SessionErrc::NotAuthorized,
        "wamp.error.authorization_failed" => SessionErrc::AuthorizationFailed,
        "wamp.error.no_such_realm" => SessionErrc::NoSuchRealm,
        "wamp.error.no_such_role" => SessionErrc::NoSuchRole,
        "wamp.error.canceled" => SessionErrc::Cancelled,
        "wamp.error.option_not_allowed" => SessionErrc::OptionNotAllowed,
        "wamp.error.no_eligible_callee" => SessionErrc::NoEligibleCallee,
        "wamp.error.network_failure" => SessionErrc::NetworkFailure,
        "wamp.error.payload_size_exceeded" => SessionErrc::PayloadSizeExceeded,
        "wamp.error.timeout" => SessionErrc::Timeout,
        "wamp.error.invalid_state" => SessionErrc::InvalidState,
        _ => SessionErrc::Unknown,
    }
}

/// Maps a `SessionErrc` back to the URI this core sends when it originates
/// the error locally (e.g. auto-responding to an INTERRUPT, or cancelling).
pub fn errc_to_uri(errc: SessionErrc) -> &'static str {
    errc.to_str()
}

quick_error! {
    /// Types of errors a WAMP client can encounter
    #[derive(Debug)]
    pub enum WampError {
        UnknownError(e: String) {
            from()
            display("Unhandled error : {}", e)
        }
        /// Error with the connection
        ConnectionError(e: TransportError) {
            from()
            source(e)
            display("An error occured with the connection: ({})", e)
        }
        /// Error with serialization
        SerializationError(e: SerializerError) {
            from()
            source(e)
            display("An error occured while [de]serializing a message: ({})", e)
        }
        /// WAMP uri is invalid
        InvalidUri(e: ParseError) {
            source(e)
            display("The uri provided could not be parsed: {}", e)
        }
        /// Server uri is invalid
        NoHostInUri {
            display("The uri provided did not contain a host address")
        }
        /// The WAMP protocol was not respected by the peer
        ProtocolError(e: String) {
            display("An unexpected WAMP message was received: {}", e)
        }
        /// The client has been dropped while the event loop was running
        ClientDied {
            display("The client has exited without sending Shutdown")
        }
        /// The requested operation is not valid in the peer's current session state
        InvalidState(errc: SessionErrc) {
            display("The operation is invalid in the current session state: {:?}", errc)
        }
        /// A packed outgoing message exceeds the negotiated maximum length;
        /// the session is left intact, only that one send fails.
        PayloadSizeExceeded(size: usize, max: u32) {
            display("Packed message of {} bytes exceeds the maximum of {} bytes", size, max)
        }
        /// A pending request was cancelled, locally or by timeout
        Cancelled(errc: SessionErrc) {
            display("The request was cancelled: {:?}", errc)
        }
        /// The server sent us an Error message carrying a well-known or custom uri
        ServerError(uri: String, details: WampDict) {
            context(uri: String, details: WampDict) -> (uri, details)
            display("The server returned an error: {} {:?}", uri, details)
        }
    }
}

impl WampError {
    /// Classifies a `ServerError`/`InvalidState`/`Cancelled` into the closed
    /// `SessionErrc` taxonomy; other variants have no direct mapping.
    pub fn errc(&self) -> Option<SessionErrc> {
        match self {
            WampError::ServerError(uri, _) => Some(uri_to_errc(uri)),
            WampError::InvalidState(errc) | WampError::Cancelled(errc) => Some(*errc),
            WampError::PayloadSizeExceeded(..) => Some(SessionErrc::PayloadSizeExceeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_uri_round_trips_to_the_same_errc() {
        let errc = uri_to_errc("wamp.error.no_such_procedure");
        assert_eq!(errc, SessionErrc::NoSuchProcedure);
        assert_eq!(errc_to_uri(errc), "wamp.error.no_such_procedure");
    }

    #[test]
    fn unrecognized_uri_maps_to_unknown() {
        assert_eq!(uri_to_errc("com.example.custom_error"), SessionErrc::Unknown);
    }
}
