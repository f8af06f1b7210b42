// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! SUBACK: one reason code per filter in the SUBSCRIBE it answers, in the same order. A
//! reason code below `0x80` is a granted QoS (0, 1 or 2); `0x80` and above is a refusal.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::reason_code::ReasonCode;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubAckPacket {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    pub reason_codes: Vec<ReasonCode>,
}

impl SubAckPacket {
    /// # Errors
    ///
    /// Returns `DecodeError::PacketIdZero` if the packet identifier is zero.
    pub fn decode(ba: &mut ByteArray, protocol_level: ProtocolLevel) -> Result<Self, DecodeError> {
        let packet_id = ba.read_u16()?;
        if packet_id == 0 {
            return Err(DecodeError::PacketIdZero);
        }

        let properties = if protocol_level.has_properties() {
            properties::decode_properties(ba, false)?
        } else {
            Vec::new()
        };

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
        }
        for reason_code in &self.reason_codes {
            buf.push(reason_code.0);
        }
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        let mut len = 2 + self.reason_codes.len();
        if protocol_level.has_properties() {
            len += properties::properties_wire_bytes(&self.properties);
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_granted_and_refused() {
        let packet = SubAckPacket {
            packet_id: 5,
            properties: Vec::new(),
            reason_codes: vec![
                ReasonCode::GRANTED_QOS_1,
                ReasonCode::NOT_AUTHORIZED,
                ReasonCode::GRANTED_QOS_2,
            ],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert_eq!(buf.len(), packet.bytes(ProtocolLevel::V5));

        let mut ba = ByteArray::new(&buf);
        let decoded = SubAckPacket::decode(&mut ba, ProtocolLevel::V5).unwrap();
        assert_eq!(decoded, packet);
    }
}
