// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PUBLISH: carries application data from publisher to broker, and from broker to each matched
//! subscriber. Variable header order is Topic Name, Packet Identifier (QoS > 0 only),
//! Properties (MQTT 5 only); everything remaining in the packet is the payload.

use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::properties::{self, Property};
use crate::protocol_level::ProtocolLevel;
use crate::qos::QoS;
use crate::topic;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishPacket {
    dup: bool,
    qos: QoS,
    retain: bool,
    pub topic_name: String,
    pub packet_id: Option<u16>,
    pub properties: Vec<Property>,
    pub payload: Vec<u8>,
}

impl PublishPacket {
    #[must_use]
    pub const fn dup(&self) -> bool {
        self.dup
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    #[must_use]
    pub fn new(topic_name: impl Into<String>, payload: Vec<u8>, qos: QoS, retain: bool) -> Self {
        Self {
            dup: false,
            qos,
            retain,
            topic_name: topic_name.into(),
            packet_id: None,
            properties: Vec::new(),
            payload,
        }
    }

    /// Returns a copy of this publish with `dup` set, for QoS 1/2 retransmission.
    #[must_use]
    pub fn with_dup(&self, dup: bool) -> Self {
        Self {
            dup,
            ..self.clone()
        }
    }

    /// # Errors
    ///
    /// Returns `DecodeError::InvalidTopicFilter` if the topic name is a wildcard filter or is
    /// empty without a topic alias property, and `DecodeError::PacketIdZero` if QoS is nonzero
    /// and the packet identifier is zero.
    pub fn decode(
        ba: &mut ByteArray,
        protocol_level: ProtocolLevel,
        dup: bool,
        qos: QoS,
        retain: bool,
    ) -> Result<Self, DecodeError> {
        let topic_name = ba.read_string()?;

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            let id = ba.read_u16()?;
            if id == 0 {
                return Err(DecodeError::PacketIdZero);
            }
            Some(id)
        };

        let properties = if protocol_level.has_properties() {
            properties::decode_properties(ba, true)?
        } else {
            Vec::new()
        };

        let has_topic_alias = properties
            .iter()
            .any(|p| matches!(p, Property::TopicAlias(_)));
        if topic_name.is_empty() {
            if !has_topic_alias {
                return Err(DecodeError::InvalidTopicFilter);
            }
        } else {
            topic::validate_topic_name(&topic_name)?;
        }

        let payload = ba.read_remaining().to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic_name,
            packet_id,
            properties,
            payload,
        })
    }

    /// # Errors
    ///
    /// Returns `EncodeError::TooLarge` if the topic name or properties exceed their wire
    /// representation.
    pub fn encode(
        &self,
        buf: &mut Vec<u8>,
        protocol_level: ProtocolLevel,
    ) -> Result<usize, EncodeError> {
        let start = buf.len();
        byte_array::write_string(&self.topic_name, buf);
        if let Some(id) = self.packet_id {
            buf.extend_from_slice(&id.to_be_bytes());
        }
        if protocol_level.has_properties() {
            properties::encode_properties(&self.properties, buf)?;
        }
        buf.extend_from_slice(&self.payload);
        Ok(buf.len() - start)
    }

    #[must_use]
    pub fn bytes(&self, protocol_level: ProtocolLevel) -> usize {
        let mut len = byte_array::string_bytes(&self.topic_name);
        if self.packet_id.is_some() {
            len += 2;
        }
        if protocol_level.has_properties() {
            len += properties::properties_wire_bytes(&self.properties);
        }
        len + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_qos0_publish() {
        let packet = PublishPacket::new("a/b", b"hello".to_vec(), QoS::AtMostOnce, false);
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V311).unwrap();
        assert_eq!(buf.len(), packet.bytes(ProtocolLevel::V311));

        let mut ba = ByteArray::new(&buf);
        let decoded =
            PublishPacket::decode(&mut ba, ProtocolLevel::V311, false, QoS::AtMostOnce, false)
                .unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn round_trips_qos1_publish_with_packet_id() {
        let mut packet = PublishPacket::new("a/b", b"hi".to_vec(), QoS::AtLeastOnce, true);
        packet.packet_id = Some(42);
        let mut buf = Vec::new();
        packet.encode(&mut buf, ProtocolLevel::V5).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded =
            PublishPacket::decode(&mut ba, ProtocolLevel::V5, false, QoS::AtLeastOnce, true)
                .unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_zero_packet_id_at_qos1() {
        let mut buf = Vec::new();
        byte_array::write_string("a/b", &mut buf);
        buf.extend_from_slice(&0u16.to_be_bytes());
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PublishPacket::decode(&mut ba, ProtocolLevel::V311, false, QoS::AtLeastOnce, false),
            Err(DecodeError::PacketIdZero)
        );
    }
}
