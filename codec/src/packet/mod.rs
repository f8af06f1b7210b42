// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Control packet framing: the two-to-five-byte fixed header shared by every MQTT packet, and
//! the top-level [`decode`]/[`encode`] entry points that dispatch on packet type.

pub mod auth;
pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod puback_family;
pub mod publish;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

pub use auth::AuthPacket;
pub use connack::{ConnAckPacket, ConnectReturnCode};
pub use connect::ConnectPacket;
pub use disconnect::DisconnectPacket;
pub use puback_family::{PubAckPacket, PubCompPacket, PubRecPacket, PubRelPacket};
pub use publish::PublishPacket;
pub use suback::SubAckPacket;
pub use subscribe::{SubscribePacket, SubscriptionOptions};
pub use unsuback::UnsubAckPacket;
pub use unsubscribe::UnsubscribePacket;

use crate::byte_array::ByteArray;
use crate::error::{CodecError, DecodeError, EncodeError};
use crate::protocol_level::ProtocolLevel;
use crate::var_int::{encode_var_int, var_int_bytes};

/// The fifteen MQTT control packet types, tagged by the four high bits of the first fixed
/// header byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
    Auth = 15,
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(type_bits: u8) -> Result<Self, Self::Error> {
        match type_bits {
            1 => Ok(Self::Connect),
            2 => Ok(Self::ConnAck),
            3 => Ok(Self::Publish),
            4 => Ok(Self::PubAck),
            5 => Ok(Self::PubRec),
            6 => Ok(Self::PubRel),
            7 => Ok(Self::PubComp),
            8 => Ok(Self::Subscribe),
            9 => Ok(Self::SubAck),
            10 => Ok(Self::Unsubscribe),
            11 => Ok(Self::UnsubAck),
            12 => Ok(Self::PingReq),
            13 => Ok(Self::PingResp),
            14 => Ok(Self::Disconnect),
            15 => Ok(Self::Auth),
            t => {
                log::warn!("packet: unknown fixed header type bits: {t:#06b}");
                Err(DecodeError::InvalidPacketType)
            }
        }
    }
}

/// Reserved fixed-header flag bits required for every packet type that is not PUBLISH, per
/// MQTT-2.2.2-1/MQTT-2.2.2-2. PUBLISH's flags carry DUP/QoS/RETAIN and are checked separately.
const fn required_flags(packet_type: PacketType) -> Option<u8> {
    match packet_type {
        PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0b0010),
        PacketType::Publish => None,
        _ => Some(0b0000),
    }
}

/// One decoded MQTT control packet, tagged by type.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq,
    PingResp,
    Disconnect(DisconnectPacket),
    Auth(AuthPacket),
}

impl Packet {
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck(_) => PacketType::PubAck,
            Self::PubRec(_) => PacketType::PubRec,
            Self::PubRel(_) => PacketType::PubRel,
            Self::PubComp(_) => PacketType::PubComp,
            Self::Subscribe(_) => PacketType::Subscribe,
            Self::SubAck(_) => PacketType::SubAck,
            Self::Unsubscribe(_) => PacketType::Unsubscribe,
            Self::UnsubAck(_) => PacketType::UnsubAck,
            Self::PingReq => PacketType::PingReq,
            Self::PingResp => PacketType::PingResp,
            Self::Disconnect(_) => PacketType::Disconnect,
            Self::Auth(_) => PacketType::Auth,
        }
    }
}

/// Peek the fixed header's framing information (packet type, flag bits and declared remaining
/// length) without requiring that the remaining-length body has fully arrived yet.
///
/// Returns `Ok(None)` if `buf` does not yet contain a complete fixed header (caller should wait
/// for more bytes). Returns `Err` if the bytes present are already malformed.
fn peek_fixed_header(buf: &[u8]) -> Result<Option<(PacketType, u8, usize, usize)>, DecodeError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let first = buf[0];
    let packet_type = PacketType::try_from(first >> 4)?;
    let flags = first & 0x0f;

    let mut value: usize = 0;
    let mut multiplier: usize = 1;
    let mut consumed = 0;
    loop {
        let Some(&byte) = buf.get(1 + consumed) else {
            return Ok(None);
        };
        value += (byte as usize & 0x7f) * multiplier;
        consumed += 1;
        if byte & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
        if multiplier > 128 * 128 * 128 {
            return Err(DecodeError::InvalidVarInt);
        }
    }

    Ok(Some((packet_type, flags, value, 1 + consumed)))
}

/// Attempt to decode one packet from the front of `buf`.
///
/// `protocol_level` governs whether properties blocks are expected; it is ignored while
/// decoding CONNECT itself, which carries its own protocol level in the variable header.
///
/// Returns `Ok(None)` if `buf` does not yet hold a complete packet. On success, returns the
/// decoded packet and the number of bytes it occupied, which the caller should drain from its
/// read buffer before calling `decode` again.
///
/// # Errors
///
/// Returns `CodecError::Malformed` for wire-level corruption and `CodecError::Protocol` for
/// rule violations in an otherwise well-formed packet (duplicate property, non-zero packet
/// identifier, and so on).
pub fn decode(
    buf: &[u8],
    protocol_level: ProtocolLevel,
) -> Result<Option<(Packet, usize)>, CodecError> {
    let Some((packet_type, flags, remaining_length, header_len)) = peek_fixed_header(buf)? else {
        return Ok(None);
    };

    let total_len = header_len + remaining_length;
    if buf.len() < total_len {
        return Ok(None);
    }

    if let Some(required) = required_flags(packet_type) {
        if flags != required {
            return Err(DecodeError::InvalidPacketFlags.into());
        }
    }

    if packet_type == PacketType::Auth && protocol_level != ProtocolLevel::V5 {
        return Err(CodecError::Protocol(DecodeError::InvalidPacketType));
    }

    let body = &buf[header_len..total_len];
    let mut ba = ByteArray::new(body);

    let packet = match packet_type {
        PacketType::Connect => Packet::Connect(ConnectPacket::decode(&mut ba)?),
        PacketType::ConnAck => {
            Packet::ConnAck(ConnAckPacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::Publish => {
            let dup = flags & 0b1000 != 0;
            let retain = flags & 0b0001 != 0;
            let qos = crate::qos::QoS::try_from((flags & 0b0110) >> 1)
                .map_err(|_| DecodeError::InvalidQoS)?;
            Packet::Publish(PublishPacket::decode(
                &mut ba,
                protocol_level,
                dup,
                qos,
                retain,
            )?)
        }
        PacketType::PubAck => {
            Packet::PubAck(PubAckPacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::PubRec => {
            Packet::PubRec(PubRecPacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::PubRel => {
            Packet::PubRel(PubRelPacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::PubComp => {
            Packet::PubComp(PubCompPacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::Subscribe => {
            Packet::Subscribe(SubscribePacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::SubAck => Packet::SubAck(SubAckPacket::decode(&mut ba, protocol_level)?),
        PacketType::Unsubscribe => {
            Packet::Unsubscribe(UnsubscribePacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::UnsubAck => {
            Packet::UnsubAck(UnsubAckPacket::decode(&mut ba, protocol_level)?)
        }
        PacketType::PingReq => Packet::PingReq,
        PacketType::PingResp => Packet::PingResp,
        PacketType::Disconnect => {
            if remaining_length == 0 {
                Packet::Disconnect(DisconnectPacket::default())
            } else {
                Packet::Disconnect(DisconnectPacket::decode(&mut ba, protocol_level)?)
            }
        }
        PacketType::Auth => Packet::Auth(AuthPacket::decode(&mut ba)?),
    };

    Ok(Some((packet, total_len)))
}

/// Encode `packet` onto the end of `buf`, returning the number of bytes appended.
///
/// # Errors
///
/// Returns `EncodeError::TooLarge` if the packet's body exceeds the variable byte integer
/// range, or if any string/binary field exceeds 65535 bytes.
pub fn encode(
    packet: &Packet,
    protocol_level: ProtocolLevel,
    buf: &mut Vec<u8>,
) -> Result<usize, EncodeError> {
    let start = buf.len();
    let mut body = Vec::new();

    let flags = match packet {
        Packet::Publish(p) => {
            let dup = u8::from(p.dup()) << 3;
            let qos = u8::from(p.qos()) << 1;
            let retain = u8::from(p.retain());
            dup | qos | retain
        }
        Packet::PubRel(_) | Packet::Subscribe(_) | Packet::Unsubscribe(_) => 0b0010,
        _ => 0b0000,
    };

    match packet {
        Packet::Connect(p) => p.encode(&mut body)?,
        Packet::ConnAck(p) => p.encode(&mut body, protocol_level)?,
        Packet::Publish(p) => p.encode(&mut body, protocol_level)?,
        Packet::PubAck(p) => p.encode(&mut body, protocol_level)?,
        Packet::PubRec(p) => p.encode(&mut body, protocol_level)?,
        Packet::PubRel(p) => p.encode(&mut body, protocol_level)?,
        Packet::PubComp(p) => p.encode(&mut body, protocol_level)?,
        Packet::Subscribe(p) => p.encode(&mut body, protocol_level)?,
        Packet::SubAck(p) => p.encode(&mut body, protocol_level)?,
        Packet::Unsubscribe(p) => p.encode(&mut body, protocol_level)?,
        Packet::UnsubAck(p) => p.encode(&mut body, protocol_level)?,
        Packet::PingReq | Packet::PingResp => 0,
        Packet::Disconnect(p) => p.encode(&mut body, protocol_level)?,
        Packet::Auth(p) => p.encode(&mut body)?,
    };

    let type_bits = packet.packet_type() as u8;
    buf.push((type_bits << 4) | flags);
    encode_var_int(body.len(), buf)?;
    buf.extend_from_slice(&body);

    Ok(buf.len() - start)
}

/// Byte length `encode` would produce for `packet`, without actually encoding it.
#[must_use]
pub fn encoded_len(packet: &Packet, protocol_level: ProtocolLevel) -> usize {
    let body_len = match packet {
        Packet::Connect(p) => p.bytes(),
        Packet::ConnAck(p) => p.bytes(protocol_level),
        Packet::Publish(p) => p.bytes(protocol_level),
        Packet::PubAck(p) => p.bytes(protocol_level),
        Packet::PubRec(p) => p.bytes(protocol_level),
        Packet::PubRel(p) => p.bytes(protocol_level),
        Packet::PubComp(p) => p.bytes(protocol_level),
        Packet::Subscribe(p) => p.bytes(protocol_level),
        Packet::SubAck(p) => p.bytes(protocol_level),
        Packet::Unsubscribe(p) => p.bytes(protocol_level),
        Packet::UnsubAck(p) => p.bytes(protocol_level),
        Packet::PingReq | Packet::PingResp => 0,
        Packet::Disconnect(p) => p.bytes(protocol_level),
        Packet::Auth(p) => p.bytes(),
    };
    1 + var_int_bytes(body_len) + body_len
}
