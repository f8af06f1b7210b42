// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Wire codec for MQTT 3.1.1 and MQTT 5.0 control packets: no I/O, no broker state, just bytes
//! in, typed packets out and back again.
//!
//! The entry points are [`decode`] and [`encode`]. `decode` takes whatever bytes have arrived so
//! far and returns `Ok(None)` if they don't yet form a complete packet, so callers can feed it
//! straight from a growing read buffer without framing the stream themselves.

pub mod byte_array;
pub mod error;
pub mod packet;
pub mod properties;
pub mod protocol_level;
pub mod qos;
pub mod reason_code;
pub mod topic;
pub mod var_int;

pub use byte_array::ByteArray;
pub use error::{CodecError, DecodeError, EncodeError};
pub use packet::{
    decode, encode, encoded_len, AuthPacket, ConnAckPacket, ConnectPacket, ConnectReturnCode,
    DisconnectPacket, Packet, PacketType, PubAckPacket, PubCompPacket, PubRecPacket,
    PubRelPacket, PublishPacket, SubAckPacket, SubscribePacket, SubscriptionOptions,
    UnsubAckPacket, UnsubscribePacket,
};
pub use packet::connect::Will;
pub use properties::{Property, PropertyId};
pub use protocol_level::ProtocolLevel;
pub use qos::QoS;
pub use reason_code::ReasonCode;

/// Largest packet the codec will allocate a body buffer for while decoding: the protocol's own
/// 256MB remaining-length ceiling. Broker configuration narrows this further in practice.
pub const MAX_PACKET_BYTES: usize = var_int::MAX_VAR_INT;
