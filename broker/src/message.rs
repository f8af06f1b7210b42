// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The unit of data the broker routes: a topic, a payload, a QoS, and a retain flag, detached
//! from whatever wire packet it arrived in. Fan-out clones one per deliverable session rather
//! than sharing ownership, matching the base specification's "passed by value" rule.

use codec::{PublishPacket, QoS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl Message {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload,
            qos,
            retain,
        }
    }

    #[must_use]
    pub fn from_publish(packet: &PublishPacket) -> Self {
        Self {
            topic: packet.topic_name.clone(),
            payload: packet.payload.clone(),
            qos: packet.qos(),
            retain: packet.retain(),
        }
    }

    /// Builds the outbound PUBLISH a subscriber's connection will serialize, at the
    /// subscriber's own effective QoS and packet identifier.
    #[must_use]
    pub fn to_publish(&self, packet_id: Option<u16>, qos: QoS) -> PublishPacket {
        let mut packet = PublishPacket::new(self.topic.clone(), self.payload.clone(), qos, self.retain);
        packet.packet_id = packet_id;
        packet
    }
}
