// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! CONNECT: the first packet a client sends, carrying protocol negotiation, session control and
//! optional will message and credentials.
//!
//! ```txt
//! Protocol Name | Protocol Level | Connect Flags | Keep Alive | Properties (v5 only)
//! Client Id | Will Properties + Will Topic + Will Payload (if Will Flag set)
//! Username (if Username Flag set) | Password (if Password Flag set)
//! ```

use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::qos::QoS;
use crate::topic;

/// The optional last-will message a server publishes on the client's behalf if the connection
/// drops without a clean DISCONNECT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Will {
    pub properties: Vec<Property>,
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl Will {
    fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        let props = if protocol_level.has_properties() {
            properties::properties_wire_bytes(&self.properties)
        } else {
            0
        };
        props + byte_array::string_bytes(&self.topic) + byte_array::binary_bytes(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectPacket {
    pub protocol_level: ProtocolLevel,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub properties: Vec<Property>,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectPacket {
    /// # Errors
    ///
    /// Returns `DecodeError` on any wire-level or protocol violation: unknown protocol
    /// name/level, a non-zero reserved flag bit, a password without a username, or an invalid
    /// will topic.
    pub fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let protocol_name = ba.read_string()?;
        let protocol_level = ProtocolLevel::try_from(ba.read_u8()?)?;
        if protocol_name != protocol_level.protocol_name() {
            return Err(DecodeError::InvalidProtocolName);
        }

        let flags = ba.read_u8()?;
        let has_username = flags & 0b1000_0000 != 0;
        let has_password = flags & 0b0100_0000 != 0;
        let will_retain = flags & 0b0010_0000 != 0;
        let will_qos = QoS::try_from((flags & 0b0001_1000) >> 3)?;
        let has_will = flags & 0b0000_0100 != 0;
        let clean_start = flags & 0b0000_0010 != 0;
        let reserved = flags & 0b0000_0001;

        if reserved != 0 || (!has_username && has_password) {
            return Err(DecodeError::InvalidConnectFlags);
        }

        let keep_alive = ba.read_u16()?;

        let properties = if protocol_level.has_properties() {
            properties::decode_properties(ba, false)?
        } else {
            Vec::new()
        };

        let client_id = ba.read_string()?;

        let will = if has_will {
            let will_properties = if protocol_level.has_properties() {
                properties::decode_properties(ba, false)?
            } else {
                Vec::new()
            };
            let will_topic = ba.read_string()?;
            topic::validate_topic_name(&will_topic)?;
            let will_payload = ba.read_binary()?;
            Some(Will {
                properties: will_properties,
                topic: will_topic,
                payload: will_payload,
                qos: will_qos,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = if has_username {
            Some(ba.read_string()?)
        } else {
            None
        };
        let password = if has_password {
            Some(ba.read_binary()?)
        } else {
            None
        };

        Ok(Self {
            protocol_level,
            clean_start,
            keep_alive,
            properties,
            client_id,
            will,
            username,
            password,
        })
    }

    /// # Errors
    ///
    /// Returns `EncodeError::TooLarge` if any field exceeds its wire representation.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let start = buf.len();
        byte_array::write_string(self.protocol_level.protocol_name(), buf);
        buf.push(self.protocol_level as u8);

        let has_username = self.username.is_some();
        let has_password = self.password.is_some();
        let has_will = self.will.is_some();
        let will_qos = self.will.as_ref().map_or(QoS::AtMostOnce, |w| w.qos);
        let will_retain = self.will.as_ref().is_some_and(|w| w.retain);

        let flags = (u8::from(has_username) << 7)
            | (u8::from(has_password) << 6)
            | (u8::from(will_retain) << 5)
            | (u8::from(will_qos) << 3)
            | (u8::from(has_will) << 2)
            | (u8::from(self.clean_start) << 1);
        buf.push(flags);

        buf.extend_from_slice(&self.keep_alive.to_be_bytes());

        if self.protocol_level.has_properties() {
            properties::encode_properties(&self.properties, buf)?;
        }

        byte_array::write_string(&self.client_id, buf);

        if let Some(will) = &self.will {
            if self.protocol_level.has_properties() {
                properties::encode_properties(&will.properties, buf)?;
            }
            byte_array::write_string(&will.topic, buf);
            byte_array::write_binary(&will.payload, buf);
        }

        if let Some(username) = &self.username {
            byte_array::write_string(username, buf);
        }
        if let Some(password) = &self.password {
            byte_array::write_binary(password, buf);
        }

        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        let mut len = byte_array::string_bytes(self.protocol_level.protocol_name())
            + 1 // protocol level
            + 1 // connect flags
            + 2; // keep alive

        if self.protocol_level.has_properties() {
            len += properties::properties_wire_bytes(&self.properties);
        }
        len += byte_array::string_bytes(&self.client_id);

        if let Some(will) = &self.will {
            len += will.bytes(self.protocol_level);
        }
        if let Some(username) = &self.username {
            len += byte_array::string_bytes(username);
        }
        if let Some(password) = &self.password {
            len += byte_array::binary_bytes(password);
        }
        len
    }
}
