//! End-to-end routing scenarios driven directly against `Broker`/`Session`, without a real
//! socket — the same style as `examples/RustRobotics-hebo`'s `tests/` binaries, but in-process
//! since this broker core has no external client binary to shell out to. Each test plays out one
//! of the base specification's walkthrough scenarios (§8).

use std::sync::Arc;

use codec::{ProtocolLevel, QoS, SubscriptionOptions};
use mqtt_broker::{Broker, Message, OutboundEvent, Session};
use tokio::sync::mpsc;

fn connect(broker: &Arc<Broker>, client_id: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<OutboundEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::new(client_id.to_string(), ProtocolLevel::V311, Arc::clone(broker), tx);
    session.connect();
    (session, rx)
}

#[test]
fn qos0_publish_reaches_a_matching_subscriber_with_no_packet_id() {
    let broker = Broker::new();
    let (sub, mut rx) = connect(&broker, "sub");
    sub.subscribe("sensors/temp", SubscriptionOptions::new(QoS::AtMostOnce));

    broker.publish(Message::new("sensors/temp", b"21.5".to_vec(), QoS::AtMostOnce, false));

    let OutboundEvent::Deliver { message, packet_id, qos } = rx.try_recv().unwrap() else {
        panic!("expected a delivery");
    };
    assert_eq!(message.payload, b"21.5");
    assert_eq!(packet_id, None);
    assert_eq!(qos, QoS::AtMostOnce);
}

#[test]
fn qos1_delivery_completes_only_after_puback() {
    let broker = Broker::new();
    let (sub, mut rx) = connect(&broker, "sub");
    sub.subscribe("orders/new", SubscriptionOptions::new(QoS::AtLeastOnce));

    broker.publish(Message::new("orders/new", b"order-1".to_vec(), QoS::AtLeastOnce, false));

    let OutboundEvent::Deliver { packet_id, .. } = rx.try_recv().unwrap() else {
        panic!("expected a delivery");
    };
    let packet_id = packet_id.expect("QoS 1 delivery carries a packet id");

    broker.publish(Message::new("orders/new", b"order-2".to_vec(), QoS::AtLeastOnce, false));
    let OutboundEvent::Deliver { packet_id: second_id, .. } = rx.try_recv().unwrap() else {
        panic!("expected a second delivery");
    };
    assert_ne!(packet_id, second_id, "concurrent QoS 1 deliveries must not share a packet id");

    sub.puback(packet_id);
    sub.puback(second_id);
}

#[test]
fn qos2_handshake_walks_pubrec_pubrel_pubcomp_on_both_directions() {
    let broker = Broker::new();
    let (publisher, _pub_rx) = connect(&broker, "publisher");
    let (subscriber, mut sub_rx) = connect(&broker, "subscriber");
    subscriber.subscribe("jobs/build", SubscriptionOptions::new(QoS::ExactlyOnce));

    // Inbound half: the publisher's own QoS 2 PUBLISH is tracked until its PUBREL arrives.
    publisher.publish(Some(42), Message::new("jobs/build", b"go".to_vec(), QoS::ExactlyOnce, false));
    assert!(publisher.pubrel(42));

    // Outbound half: the subscriber's delivery walks PUBREC -> PUBCOMP.
    broker.publish(Message::new("jobs/build", b"go".to_vec(), QoS::ExactlyOnce, false));
    let OutboundEvent::Deliver { packet_id, .. } = sub_rx.try_recv().unwrap() else {
        panic!("expected a delivery");
    };
    let packet_id = packet_id.unwrap();
    assert!(subscriber.pubrec(packet_id));
    subscriber.pubcomp(packet_id);
}

#[test]
fn clean_start_takeover_drops_the_previous_transport_and_its_subscriptions() {
    let broker = Broker::new();
    let (first, mut first_rx) = connect(&broker, "device-1");
    first.subscribe("device-1/cmd", SubscriptionOptions::new(QoS::AtLeastOnce));

    first.discard();
    let (second, mut second_rx) = connect(&broker, "device-1");

    assert!(matches!(first_rx.try_recv().unwrap(), OutboundEvent::Disconnect));
    assert_eq!(second.subscription_count(), 0, "a clean-start session starts with no subscriptions");

    broker.publish(Message::new("device-1/cmd", b"noop".to_vec(), QoS::AtLeastOnce, false));
    assert!(second_rx.try_recv().is_err(), "the old subscription must not survive a clean-start takeover");
}

#[test]
fn resume_without_clean_start_keeps_subscriptions_across_a_reconnect() {
    let broker = Broker::new();
    let (session, mut old_rx) = connect(&broker, "device-2");
    session.subscribe("device-2/cmd", SubscriptionOptions::new(QoS::AtLeastOnce));

    let (new_tx, mut new_rx) = mpsc::unbounded_channel();
    session.resume(ProtocolLevel::V311, new_tx);
    assert!(matches!(old_rx.try_recv().unwrap(), OutboundEvent::Disconnect));

    broker.publish(Message::new("device-2/cmd", b"restart".to_vec(), QoS::AtLeastOnce, false));
    assert!(new_rx.try_recv().is_ok(), "a resumed session keeps its subscriptions");
}

#[test]
fn wildcard_filters_fan_out_a_single_publish_to_every_match() {
    let broker = Broker::new();
    let (plus_sub, mut plus_rx) = connect(&broker, "plus-sub");
    let (hash_sub, mut hash_rx) = connect(&broker, "hash-sub");
    let (exact_sub, mut exact_rx) = connect(&broker, "exact-sub");
    plus_sub.subscribe("home/+/temperature", SubscriptionOptions::new(QoS::AtMostOnce));
    hash_sub.subscribe("home/#", SubscriptionOptions::new(QoS::AtMostOnce));
    exact_sub.subscribe("home/kitchen/humidity", SubscriptionOptions::new(QoS::AtMostOnce));

    broker.publish(Message::new("home/kitchen/temperature", b"19".to_vec(), QoS::AtMostOnce, false));

    assert!(plus_rx.try_recv().is_ok());
    assert!(hash_rx.try_recv().is_ok());
    assert!(exact_rx.try_recv().is_err(), "an unrelated exact filter must not receive this publish");
}

#[test]
fn shared_subscription_group_delivers_to_exactly_one_member_even_with_two_groups() {
    let broker = Broker::new();
    let (a1, mut a1_rx) = connect(&broker, "worker-a1");
    let (a2, mut a2_rx) = connect(&broker, "worker-a2");
    let (b1, mut b1_rx) = connect(&broker, "worker-b1");
    a1.subscribe("$share/group-a/jobs", SubscriptionOptions::new(QoS::AtMostOnce));
    a2.subscribe("$share/group-a/jobs", SubscriptionOptions::new(QoS::AtMostOnce));
    b1.subscribe("$share/group-b/jobs", SubscriptionOptions::new(QoS::AtMostOnce));

    broker.publish(Message::new("jobs", b"task".to_vec(), QoS::AtMostOnce, false));

    let group_a_deliveries = [a1_rx.try_recv().is_ok(), a2_rx.try_recv().is_ok()]
        .iter()
        .filter(|delivered| **delivered)
        .count();
    assert_eq!(group_a_deliveries, 1, "exactly one member of group-a should receive the publish");
    assert!(b1_rx.try_recv().is_ok(), "group-b is independent of group-a and always receives its own copy");
}

#[test]
fn suback_reports_the_qos_actually_granted_not_always_zero() {
    let broker = Broker::with_max_qos(QoS::AtLeastOnce);
    let (session, _rx) = connect(&broker, "sub");

    let granted = session.subscribe("limited/topic", SubscriptionOptions::new(QoS::ExactlyOnce));

    assert_eq!(granted, QoS::AtLeastOnce, "granted QoS is clamped to the broker's configured ceiling");
}
