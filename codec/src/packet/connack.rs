// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! CONNACK: the server's reply to CONNECT, two bytes (ack flags, return code) in MQTT 3.1.1
//! with an optional properties block under MQTT 5.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::reason_code::ReasonCode;

/// The six MQTT 3.1.1 CONNACK return codes (MQTT-3.2.2.3). Reason code `0x06` and above are
/// reserved in 3.1.1; broker code only ever produces one of these six.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernameOrPassword = 4,
    NotAuthorized = 5,
}

impl From<ConnectReturnCode> for ReasonCode {
    fn from(code: ConnectReturnCode) -> Self {
        Self(code as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnAckPacket {
    pub session_present: bool,
    pub reason_code: ReasonCode,
    pub properties: Vec<Property>,
}

impl ConnAckPacket {
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConnectFlags` if a reserved ack-flags bit is set.
    pub fn decode(ba: &mut ByteArray, protocol_level: ProtocolLevel) -> Result<Self, DecodeError> {
        let ack_flags = ba.read_u8()?;
        if ack_flags & 0b1111_1110 != 0 {
            return Err(DecodeError::InvalidConnectFlags);
        }
        let session_present = ack_flags & 0b0000_0001 != 0;
        let reason_code = ReasonCode(ba.read_u8()?);
        let properties = if protocol_level.has_properties() {
            properties::decode_properties(ba, false)?
        } else {
            Vec::new()
        };
        Ok(Self {
            session_present,
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
        buf.push(u8::from(self.session_present));
        buf.push(self.reason_code.0);
        if protocol_level.has_properties() {
            properties::encode_properties(&self.properties, buf)?;
        }
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        let mut len = 2;
        if protocol_level.has_properties() {
            len += properties::properties_wire_bytes(&self.properties);
        }
        len
    }
}
