// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! UNSUBSCRIBE: one or more topic filters the client no longer wants to receive.

use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::topic;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    pub filters: Vec<String>,
}

impl UnsubscribePacket {
    /// # Errors
    ///
    /// Returns `DecodeError::PacketIdZero` if the packet identifier is zero, or
    /// `DecodeError::InvalidTopicFilter` if no filter is present or one is malformed.
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

        let mut filters = Vec::new();
        while ba.remaining() > 0 {
            let filter = ba.read_string()?;
            topic::validate_topic_filter(&filter)?;
            filters.push(filter);
        }
        if filters.is_empty() {
            return Err(DecodeError::InvalidTopicFilter);
        }

        Ok(Self {
            packet_id,
            properties,
            filters,
        })
    }

    /// # Errors
    ///
    /// Returns `EncodeError::TooLarge` if any filter or the properties block exceeds its wire
    /// representation.
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
        for filter in &self.filters {
            byte_array::write_string(filter, buf);
        }
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        let mut len = 2;
        if protocol_level.has_properties() {
            len += properties::properties_wire_bytes(&self.properties);
        }
        len += self
            .filters
            .iter()
            .map(|f| byte_array::string_bytes(f))
            .sum::<usize>();
        len
    }
}
