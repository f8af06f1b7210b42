// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PUBACK, PUBREC, PUBREL and PUBCOMP: the four QoS 1/2 acknowledgement packets. All share one
//! wire shape — a packet identifier, and (MQTT 5 only, and only when something other than plain
//! success needs reporting) a reason code and properties block. MQTT 3.1.1 versions of these
//! packets are always exactly two bytes: just the packet identifier.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::reason_code::ReasonCode;

macro_rules! ack_packet {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub packet_id: u16,
            pub reason_code: ReasonCode,
            pub properties: Vec<Property>,
        }

        impl $name {
            #[must_use]
            pub fn new(packet_id: u16) -> Self {
                Self {
                    packet_id,
                    reason_code: ReasonCode::SUCCESS,
                    properties: Vec::new(),
                }
            }

            /// # Errors
            ///
            /// Returns `DecodeError::PacketIdZero` if the packet identifier is zero.
            pub fn decode(
                ba: &mut ByteArray,
                protocol_level: ProtocolLevel,
            ) -> Result<Self, DecodeError> {
                let packet_id = ba.read_u16()?;
                if packet_id == 0 {
                    return Err(DecodeError::PacketIdZero);
                }

                if !protocol_level.has_properties() || ba.remaining() == 0 {
                    return Ok(Self {
                        packet_id,
                        reason_code: ReasonCode::SUCCESS,
                        properties: Vec::new(),
                    });
                }

                let reason_code = ReasonCode(ba.read_u8()?);
                let properties = if ba.remaining() > 0 {
                    properties::decode_properties(ba, false)?
                } else {
                    Vec::new()
                };
                Ok(Self {
                    packet_id,
                    reason_code,
                    properties,
                })
            }

            /// Encodes the packet, omitting the reason code and properties entirely when the
            /// outcome is plain success with nothing more to say — matching
            /// MQTT-3.4.2-1-style "MAY be omitted" wire economy and keeping MQTT 3.1.1 output
            /// exactly two bytes.
            ///
            /// # Errors
            ///
            /// Returns `EncodeError::TooLarge` if the properties block exceeds its wire
            /// representation.
            pub fn encode(
                &self,
                buf: &mut Vec<u8>,
                protocol_level: ProtocolLevel,
            ) -> Result<usize, EncodeError> {
                let start = buf.len();
                buf.extend_from_slice(&self.packet_id.to_be_bytes());

                if protocol_level.has_properties()
                    && (self.reason_code.0 != 0 || !self.properties.is_empty())
                {
                    buf.push(self.reason_code.0);
                    properties::encode_properties(&self.properties, buf)?;
                }

                Ok(buf.len() - start)
            }

            #[must_use]
            pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
                if protocol_level.has_properties()
                    && (self.reason_code.0 != 0 || !self.properties.is_empty())
                {
                    2 + 1 + properties::properties_wire_bytes(&self.properties)
                } else {
                    2
                }
            }
        }
    };
}

ack_packet!(PubAckPacket);
ack_packet!(PubRecPacket);
ack_packet!(PubRelPacket);
ack_packet!(PubCompPacket);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v311_ack_is_exactly_two_bytes() {
        let packet = PubAckPacket::new(7);
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V311).unwrap();
        assert_eq!(buf, vec![0x00, 0x07]);

        let mut ba = ByteArray::new(&buf);
        let decoded = PubAckPacket::decode(&mut ba, ProtocolLevel::V311).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn v5_success_ack_omits_reason_and_properties() {
        let packet = PubRecPacket::new(9);
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert_eq!(buf, vec![0x00, 0x09]);
        assert_eq!(buf.len(), packet.bytes(ProtocolLevel::V5));
    }

    #[test]
    fn v5_failure_ack_round_trips_reason_and_properties() {
        let packet = PubCompPacket {
            packet_id: 9,
            reason_code: ReasonCode::PACKET_IDENTIFIER_NOT_FOUND,
            properties: vec![Property::ReasonString("unknown".into())],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert_eq!(buf.len(), packet.bytes(ProtocolLevel::V5));

        let mut ba = ByteArray::new(&buf);
        let decoded = PubCompPacket::decode(&mut ba, ProtocolLevel::V5).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_zero_packet_id() {
        let buf = vec![0x00, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PubRelPacket::decode(&mut ba, ProtocolLevel::V311),
            Err(DecodeError::PacketIdZero)
        );
    }
}
