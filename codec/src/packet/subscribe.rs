// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! SUBSCRIBE: one or more topic filters the client wants to receive, each with its own
//! subscription options byte.

use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::qos::QoS;
use crate::topic;

/// Per-filter options, uniform across MQTT 3.1.1 (which only ever sets `qos`) and MQTT 5 (which
/// uses all four fields). Retain handling: 0 = send retained messages at subscribe time, 1 =
/// send only if the subscription did not already exist, 2 = never send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionOptions {
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: u8,
}

impl SubscriptionOptions {
    #[must_use]
    pub const fn new(qos: QoS) -> Self {
        Self {
            qos,
            no_local: false,
            retain_as_published: false,
            retain_handling: 0,
        }
    }

    fn decode(byte: u8) -> Result<Self, DecodeError> {
        let qos = QoS::try_from(byte & 0b0000_0011)?;
        let no_local = byte & 0b0000_0100 != 0;
        let retain_as_published = byte & 0b0000_1000 != 0;
        let retain_handling = (byte & 0b0011_0000) >> 4;
        let reserved = byte & 0b1100_0000;
        if reserved != 0 || retain_handling == 3 {
            return Err(DecodeError::InvalidConnectFlags);
        }
        Ok(Self {
            qos,
            no_local,
            retain_as_published,
            retain_handling,
        })
    }

    const fn encode(self) -> u8 {
        u8::from(self.qos)
            | (u8::from(self.no_local) << 2)
            | (u8::from(self.retain_as_published) << 3)
            | (self.retain_handling << 4)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    pub filters: Vec<(String, SubscriptionOptions)>,
}

impl SubscribePacket {
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
            let options = SubscriptionOptions::decode(ba.read_u8()?)?;
            filters.push((filter, options));
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
        for (filter, options) in &self.filters {
            byte_array::write_string(filter, buf);
            buf.push(options.encode());
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
            .map(|(filter, _)| byte_array::string_bytes(filter) + 1)
            .sum::<usize>();
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multi_filter_subscribe() {
        let packet = SubscribePacket {
            packet_id: 10,
            properties: vec![Property::SubscriptionIdentifier(3)],
            filters: vec![
                ("a/+".into(), SubscriptionOptions::new(QoS::AtLeastOnce)),
                ("b/#".into(), SubscriptionOptions::new(QoS::ExactlyOnce)),
            ],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();
        assert_eq!(buf.len(), packet.bytes(ProtocolLevel::V5));

        let mut ba = ByteArray::new(&buf);
        let decoded = SubscribePacket::decode(&mut ba, ProtocolLevel::V5).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_empty_filter_list() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            SubscribePacket::decode(&mut ba, ProtocolLevel::V311),
            Err(DecodeError::InvalidTopicFilter)
        );
    }

    #[test]
    fn rejects_reserved_retain_handling_value() {
        assert_eq!(
            SubscriptionOptions::decode(0b0011_0000),
            Err(DecodeError::InvalidConnectFlags)
        );
    }
}
