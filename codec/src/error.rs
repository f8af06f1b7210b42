// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

// Error types produced while decoding and encoding MQTT control packets.
//
// Decoding distinguishes three outcomes, matching the protocol's own distinction between a
// malformed packet and a packet that simply hasn't arrived in full yet:
//
// * a short buffer is not an error at this layer — callers ask `codec::decode()` and get
//   `Ok(None)` back, meaning "come back with more bytes";
// * a genuinely malformed packet is a `DecodeError` wrapped in `CodecError::Malformed`;
// * a packet that parses but violates a protocol rule (duplicate property, invalid protocol
//   name, packet id of zero) is wrapped in `CodecError::Protocol`, since the wire-level shape
//   is unaffected and the two cases warrant different handling in MQTT 5 (a DISCONNECT with
//   reason code may precede closing the transport).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes were available than the value being decoded requires.
    UnexpectedEof,

    /// A variable byte integer used a fifth continuation byte.
    InvalidVarInt,

    /// Fixed header declared a reserved or unknown packet type.
    InvalidPacketType,

    /// Fixed header flag bits did not match the fixed value required for this packet type.
    InvalidPacketFlags,

    /// CONNECT protocol name was neither `"MQTT"` nor `"MQIsdp"`.
    InvalidProtocolName,

    /// CONNECT protocol level was not `3`, `4` or `5`.
    InvalidProtocolLevel,

    /// CONNECT flags had the reserved bit set, or password without username.
    InvalidConnectFlags,

    /// QoS bits decoded to the reserved value `3`.
    InvalidQoS,

    /// A byte standing in for a boolean property was neither `0x00` nor `0x01`.
    InvalidBoolData,

    /// Property identifier byte did not match any known MQTT 5 property.
    InvalidPropertyType,

    /// A property appeared twice, other than the properties explicitly allowed to repeat
    /// (user-property, subscription-identifier).
    DuplicateProperty,

    /// A properties block was encountered while decoding for MQTT 3.1.1, which has none.
    PropertiesNotSupported,

    /// Packet identifier was zero where the protocol forbids it.
    PacketIdZero,

    /// A required string was not valid UTF-8.
    InvalidUtf8String,

    /// SUBSCRIBE/UNSUBSCRIBE contained no topic filters, or a filter used `#`/`+` incorrectly.
    InvalidTopicFilter,

    /// A value exceeded the maximum representable length for its encoding (65535 for strings
    /// and binary data, 268,435,455 for the packet as a whole).
    TooLarge,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The value to encode does not fit in the wire representation (e.g. a remaining length
    /// greater than 268,435,455, or a string/binary blob longer than 65535 bytes).
    TooLarge,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for EncodeError {}

/// Top-level outcome of decoding one packet from a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    Malformed(DecodeError),
    Protocol(DecodeError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed packet: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<DecodeError> for CodecError {
    fn from(err: DecodeError) -> Self {
        Self::Malformed(err)
    }
}
