//! Integration tests exercising the codec's public entry points the way a connection handler
//! would: full packets through `mqtt_codec::decode`/`encode`, including partial-buffer framing.

use mqtt_codec::{
    decode, encode, CodecError, ConnAckPacket, ConnectPacket, DecodeError, Packet, ProtocolLevel,
    PubAckPacket, PublishPacket, QoS, ReasonCode, SubAckPacket, SubscribePacket,
    SubscriptionOptions,
};

#[test]
fn decode_waits_for_a_split_packet_to_arrive_in_full() {
    let connect = ConnectPacket {
        protocol_level: ProtocolLevel::V311,
        clean_start: true,
        keep_alive: 10,
        properties: Vec::new(),
        client_id: "split".into(),
        will: None,
        username: None,
        password: None,
    };
    let mut full = Vec::new();
    encode(&Packet::Connect(connect.clone()), ProtocolLevel::V311, &mut full).unwrap();

    let (head, _) = full.split_at(full.len() - 1);
    assert_eq!(decode(head, ProtocolLevel::V311), Ok(None));

    let (packet, consumed) = decode(&full, ProtocolLevel::V311).unwrap().unwrap();
    assert_eq!(consumed, full.len());
    assert_eq!(packet, Packet::Connect(connect));
}

#[test]
fn decode_leaves_a_second_packet_in_the_buffer_untouched() {
    let mut buf = Vec::new();
    encode(&Packet::PingReq, ProtocolLevel::V311, &mut buf).unwrap();
    let first_len = buf.len();
    encode(&Packet::PingReq, ProtocolLevel::V311, &mut buf).unwrap();

    let (packet, consumed) = decode(&buf, ProtocolLevel::V311).unwrap().unwrap();
    assert_eq!(packet, Packet::PingReq);
    assert_eq!(consumed, first_len);

    let (packet, consumed) = decode(&buf[consumed..], ProtocolLevel::V311).unwrap().unwrap();
    assert_eq!(packet, Packet::PingReq);
    assert_eq!(consumed, first_len);
}

#[test]
fn subscribe_suback_preserve_granted_qos_per_filter() {
    let subscribe = SubscribePacket {
        packet_id: 1,
        properties: Vec::new(),
        filters: vec![
            ("sensors/+/temp".into(), SubscriptionOptions::new(QoS::AtLeastOnce)),
            ("sensors/#".into(), SubscriptionOptions::new(QoS::ExactlyOnce)),
        ],
    };
    let mut buf = Vec::new();
    encode(&Packet::Subscribe(subscribe), ProtocolLevel::V311, &mut buf).unwrap();
    let (packet, _) = decode(&buf, ProtocolLevel::V311).unwrap().unwrap();
    let Packet::Subscribe(decoded) = packet else {
        panic!("expected Subscribe");
    };
    assert_eq!(decoded.filters[0].1.qos, QoS::AtLeastOnce);
    assert_eq!(decoded.filters[1].1.qos, QoS::ExactlyOnce);

    let suback = SubAckPacket {
        packet_id: 1,
        properties: Vec::new(),
        reason_codes: vec![ReasonCode::GRANTED_QOS_1, ReasonCode::GRANTED_QOS_2],
    };
    let mut buf = Vec::new();
    encode(&Packet::SubAck(suback.clone()), ProtocolLevel::V311, &mut buf).unwrap();
    let (packet, _) = decode(&buf, ProtocolLevel::V311).unwrap().unwrap();
    assert_eq!(packet, Packet::SubAck(suback));
}

#[test]
fn qos2_handshake_packets_round_trip_through_the_wire() {
    let publish = PublishPacket::new("a/b", b"payload".to_vec(), QoS::ExactlyOnce, false);
    let mut publish = publish;
    publish.packet_id = Some(99);
    let mut buf = Vec::new();
    encode(&Packet::Publish(publish.clone()), ProtocolLevel::V5, &mut buf).unwrap();
    let (packet, _) = decode(&buf, ProtocolLevel::V5).unwrap().unwrap();
    assert_eq!(packet, Packet::Publish(publish));

    let puback = PubAckPacket::new(99);
    let mut buf = Vec::new();
    encode(&Packet::PubAck(puback.clone()), ProtocolLevel::V5, &mut buf).unwrap();
    assert_eq!(buf, vec![0x00, 99]);
}

#[test]
fn connack_reports_session_present_and_reason() {
    let connack = ConnAckPacket {
        session_present: true,
        reason_code: ReasonCode::SUCCESS,
        properties: Vec::new(),
    };
    let mut buf = Vec::new();
    encode(&Packet::ConnAck(connack.clone()), ProtocolLevel::V5, &mut buf).unwrap();
    let (packet, _) = decode(&buf, ProtocolLevel::V5).unwrap().unwrap();
    assert_eq!(packet, Packet::ConnAck(connack));
}

#[test]
fn malformed_variable_byte_integer_is_reported_as_malformed() {
    let buf = [0x30u8, 0xff, 0xff, 0xff, 0xff];
    assert_eq!(
        decode(&buf, ProtocolLevel::V311),
        Err(CodecError::Malformed(DecodeError::InvalidVarInt))
    );
}
