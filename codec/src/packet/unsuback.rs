// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! UNSUBACK: acknowledges UNSUBSCRIBE. MQTT 3.1.1 carries only the packet identifier; MQTT 5
//! adds a properties block and one reason code per filter being unsubscribed.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::reason_code::ReasonCode;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnsubAckPacket {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    pub reason_codes: Vec<ReasonCode>,
}

impl UnsubAckPacket {
    /// # Errors
    ///
    /// Returns `DecodeError::PacketIdZero` if the packet identifier is zero.
    pub fn decode(ba: &mut ByteArray, protocol_level: ProtocolLevel) -> Result<Self, DecodeError> {
        let packet_id = ba.read_u16()?;
        if packet_id == 0 {
            return Err(DecodeError::PacketIdZero);
        }

        if !protocol_level.has_properties() {
            return Ok(Self {
                packet_id,
                properties: Vec::new(),
                reason_codes: Vec::new(),
            });
        }

        let properties = properties::decode_properties(ba, false)?;
        let mut reason_codes = Vec::new();
        while ba.remaining() > 0 {
            reason_codes.push(ReasonCode(ba.read_u8()?));
        }

        Ok(Self {
            packet_id,
            properties,
            reason_codes,
        })
    }

    /// # Errors
    ///
    /// Returns `EncodeError::TooLarge` if the properties block exceeds its wire representation.
    pub fn encode(
        &self,
        buf: &mut Vec<u8>,
        protocol_level: ProtocolLevel,
    ) -> Result<usize, EncodeError> {
        let start = buf.len();
        buf.extend_from_slice(&self.packet_id.to_be_bytes());
        if protocol_level.has_properties() {
            properties::encode_properties(&self.properties, buf)?;
            for reason_code in &self.reason_codes {
                buf.push(reason_code.0);
            }
        }
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        if protocol_level.has_properties() {
            2 + properties::properties_wire_bytes(&self.properties) + self.reason_codes.len()
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v311_unsuback_is_exactly_two_bytes() {
        let packet = UnsubAckPacket {
            packet_id: 3,
            properties: Vec::new(),
            reason_codes: Vec::new(),
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V311).unwrap();
        assert_eq!(buf, vec![0x00, 0x03]);
    }

    #[test]
    fn v5_unsuback_round_trips_reason_codes() {
        let packet = UnsubAckPacket {
            packet_id: 3,
            properties: Vec::new(),
            reason_codes: vec![ReasonCode::SUCCESS, ReasonCode::NO_SUBSCRIPTION_EXISTED],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert_eq!(buf.len(), packet.bytes(ProtocolLevel::V5));

        let mut ba = ByteArray::new(&buf);
        let decoded = UnsubAckPacket::decode(&mut ba, ProtocolLevel::V5).unwrap();
        assert_eq!(decoded, packet);
    }
}
