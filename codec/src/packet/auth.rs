// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! AUTH: enhanced authentication exchange, introduced in MQTT 5 and never valid under 3.1.1.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::reason_code::ReasonCode;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthPacket {
    pub reason_code: ReasonCode,
    pub properties: Vec<Property>,
}

impl AuthPacket {
    /// # Errors
    ///
    /// Returns whatever error the properties block decode produces.
    pub fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        if ba.remaining() == 0 {
            return Ok(Self::default());
        }
        let reason_code = ReasonCode(ba.read_u8()?);
        let properties = if ba.remaining() > 0 {
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
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let start = buf.len();
        if self.reason_code.0 == 0 && self.properties.is_empty() {
            return Ok(0);
        }
        buf.push(self.reason_code.0);
        properties::encode_properties(&self.properties, buf)?;
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        if self.reason_code.0 == 0 && self.properties.is_empty() {
            0
        } else {
            1 + properties::properties_wire_bytes(&self.properties)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_continue_authentication() {
        let packet = AuthPacket {
            reason_code: ReasonCode(0x18), // ContinueAuthentication
            properties: vec![Property::AuthenticationMethod("SCRAM-SHA-1".into())],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.bytes());

        let mut ba = ByteArray::new(&buf);
        let decoded = AuthPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }
}
