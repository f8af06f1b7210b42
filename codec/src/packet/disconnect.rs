// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! DISCONNECT: a clean connection close. MQTT 3.1.1's version has no body at all. MQTT 5 adds an
//! optional reason code and properties block, both of which may be omitted when the reason is
//! plain normal disconnection.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::reason_code::ReasonCode;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisconnectPacket {
    pub reason_code: ReasonCode,
    pub properties: Vec<Property>,
}

impl DisconnectPacket {
    /// Only called when the packet's remaining length is greater than zero; an empty body is
    /// handled by the caller as `DisconnectPacket::default()` (normal disconnection).
    ///
    /// # Errors
    ///
    /// Returns whatever error the properties block decode produces.
    pub fn decode(ba: &mut ByteArray, protocol_level: ProtocolLevel) -> Result<Self, DecodeError> {
        let reason_code = ReasonCode(ba.read_u8()?);
        let properties = if protocol_level.has_properties() && ba.remaining() > 0 {
            properties::decode_properties(ba, false)?
        } else {
            Vec::new()
        };
        Ok(Self {
            reason_code,
            properties,
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
        if !protocol_level.has_properties() {
            return Ok(0);
        }
        if self.reason_code.0 == 0 && self.properties.is_empty() {
            return Ok(0);
        }
        buf.push(self.reason_code.0);
        if !self.properties.is_empty() {
            properties::encode_properties(&self.properties, buf)?;
        }
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        if !protocol_level.has_properties() || (self.reason_code.0 == 0 && self.properties.is_empty())
        {
            return 0;
        }
        1 + if self.properties.is_empty() {
            0
        } else {
            properties::properties_wire_bytes(&self.properties)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v311_disconnect_has_empty_body() {
        let packet = DisconnectPacket::default();
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V311).unwrap();
        assert!(buf.is_empty());
        assert_eq!(packet.bytes(ProtocolLevel::V311), 0);
    }

    #[test]
    fn v5_normal_disconnect_also_omits_body() {
        let packet = DisconnectPacket::default();
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn v5_round_trips_nontrivial_reason() {
        let packet = DisconnectPacket {
            reason_code: ReasonCode::SESSION_TAKEN_OVER,
            properties: Vec::new(),
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert_eq!(buf, vec![ReasonCode::SESSION_TAKEN_OVER.0]);

        let mut ba = ByteArray::new(&buf);
        let decoded = DisconnectPacket::decode(&mut ba, ProtocolLevel::V5).unwrap();
        assert_eq!(decoded, packet);
    }
}
