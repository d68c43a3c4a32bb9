use std::str::FromStr;

use quick_error::*;

use crate::message::Msg;

pub mod cbor;
pub mod json;
pub mod msgpack;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Message serialization algorithms
pub enum SerializerType {
    Invalid = 0,
    Json = 1,
    MsgPack = 2,
    Cbor = 3,
    // 4 - 15 reserved
}

impl SerializerType {
    /// Returns the WAMP string representation of the serializer
    pub fn to_str(&self) -> &'static str {
        match self {
            SerializerType::Json => "wamp.2.json",
            SerializerType::MsgPack => "wamp.2.msgpack",
            SerializerType::Cbor => "wamp.2.cbor",
            SerializerType::Invalid => "wamp.2.invalid",
        }
    }

    /// True for serializers whose wire representation is binary, not text
    pub fn is_binary(&self) -> bool {
        !matches!(self, SerializerType::Json)
    }
}

impl FromStr for SerializerType {
    type Err = SerializerError;

    /// Converts the WAMP serializer string to its enum variant
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == SerializerType::Json.to_str() {
            Ok(SerializerType::Json)
        } else if s == SerializerType::MsgPack.to_str() {
            Ok(SerializerType::MsgPack)
        } else if s == SerializerType::Cbor.to_str() {
            Ok(SerializerType::Cbor)
        } else {
            Err(SerializerError::Deserialization(format!(
                "unknown serializer '{}'",
                s
            )))
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum SerializerError {
        Serialization(e: String) {
            description("Failed to serialize message")
            display(_self) -> ("{} : {}", _self, e)
        }
        Deserialization(e: String) {
            description("Failed to deserialize message")
            display(_self) -> ("{} : {}", _self, e)
        }
    }
}

pub trait SerializerImpl {
    fn pack(&self, value: &Msg) -> Result<Vec<u8>, SerializerError>;
    fn unpack<'a>(&self, v: &'a [u8]) -> Result<Msg, SerializerError>;
}

/// Returns the concrete serializer implementation for a negotiated type.
pub fn get_serializer(t: SerializerType) -> Box<dyn SerializerImpl + Send> {
    match t {
        SerializerType::Json => Box::new(json::JsonSerializer {}),
        SerializerType::MsgPack => Box::new(msgpack::MsgPackSerializer {}),
        SerializerType::Cbor => Box::new(cbor::CborSerializer {}),
        SerializerType::Invalid => panic!("cannot construct a serializer for SerializerType::Invalid"),
    }
}
