// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The broker routing core: one `Mutex`-guarded [`BrokerState`] holding the session directory,
//! topic trie and subscription registry together, so a publish's fan-out computation — topic
//! match, shared-group member pick, session lookup — happens as a single atomic step. Delivery
//! itself happens after the lock is released, so a slow or wedged session can never hold up
//! routing for anyone else (base specification §5, §6).
//!
//! Grounded on the original implementation's `Broker` (the combined `subscriptions`/
//! `sharedSubscriptions`/session-map owner, `publish()` walking the trie and delivering per
//! match) with the session directory holding weak references — a session's own `Arc` is owned by
//! its connection task, not by the broker, so a connection that drops without an orderly
//! DISCONNECT is naturally reflected here rather than kept alive by a stray strong reference.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use codec::QoS;
use rand::seq::SliceRandom;

use crate::message::Message;
use crate::session::Session;
use crate::subscription::SubscriptionRegistry;
use crate::trie::Trie;

#[derive(Default)]
struct BrokerState {
    sessions: HashMap<String, Weak<Session>>,
    trie: Trie,
    subscriptions: SubscriptionRegistry,
}

pub struct Broker {
    state: Mutex<BrokerState>,
    max_qos: QoS,
}

impl Broker {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_max_qos(QoS::ExactlyOnce)
    }

    #[must_use]
    pub fn with_max_qos(max_qos: QoS) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BrokerState::default()),
            max_qos,
        })
    }

    #[must_use]
    pub const fn max_qos(&self) -> QoS {
        self.max_qos
    }

    /// Registers `session` under `client_id`, taking over from whatever session was previously
    /// registered there. If a live session is being replaced, it is discarded — this is the
    /// clean-start/takeover path from CONNECT (base specification §4.2).
    pub fn insert_session(&self, client_id: String, session: &Arc<Session>) {
        let replaced = {
            let mut state = self.state.lock().unwrap();
            state.sessions.insert(client_id, Arc::downgrade(session))
        };
        if let Some(old) = replaced.and_then(|weak| weak.upgrade()) {
            if !Arc::ptr_eq(&old, session) {
                old.discard();
            }
        }
    }

    #[must_use]
    pub fn find_session(&self, client_id: &str) -> Option<Arc<Session>> {
        self.state.lock().unwrap().sessions.get(client_id).and_then(Weak::upgrade)
    }

    /// Removes `session` from the directory, but only if it is still the session on file for
    /// `client_id` — a session discarded by a takeover must not be able to evict the session that
    /// replaced it by disconnecting afterwards. Also prunes any subscriptions and trie entries
    /// left behind.
    pub fn remove_session(&self, client_id: &str, session: &Arc<Session>) {
        let mut state = self.state.lock().unwrap();
        if let Some(current) = state.sessions.get(client_id).and_then(Weak::upgrade) {
            if !Arc::ptr_eq(&current, session) {
                return;
            }
        }
        state.sessions.remove(client_id);
        let emptied = state.subscriptions.remove_client(client_id);
        for filter in emptied {
            state.trie.remove(&filter);
        }
    }

    pub fn subscribe(&self, client_id: &str, filter: &str) {
        let mut state = self.state.lock().unwrap();
        if state.subscriptions.subscribe(client_id, filter) {
            state.trie.insert(filter);
        }
    }

    pub fn unsubscribe(&self, client_id: &str, filter: &str) {
        let mut state = self.state.lock().unwrap();
        if state.subscriptions.unsubscribe(client_id, filter) {
            state.trie.remove(filter);
        }
    }

    pub fn shared_subscribe(&self, client_id: &str, filter: &str, group: &str) {
        let mut state = self.state.lock().unwrap();
        if state.subscriptions.shared_subscribe(client_id, filter, group) {
            state.trie.insert(filter);
        }
    }

    pub fn shared_unsubscribe(&self, client_id: &str, filter: &str, group: &str) {
        let mut state = self.state.lock().unwrap();
        if state.subscriptions.shared_unsubscribe(client_id, filter, group) {
            state.trie.remove(filter);
        }
    }

    /// Matches `message.topic` against the trie, picks one member per shared-subscription group
    /// (the original implementation picked one member across the whole filter, ignoring group
    /// boundaries — base specification §9, Design Notes), and delivers to every resulting
    /// session. The lock is held only long enough to compute the delivery list; `Session::deliver`
    /// runs after it is released.
    pub fn publish(&self, message: Message) {
        let deliveries = {
            let state = self.state.lock().unwrap();
            let mut targets: Vec<(Arc<Session>, String)> = Vec::new();
            for filter in state.trie.matches(&message.topic) {
                for client_id in state.subscriptions.normal_subscribers(&filter) {
                    if let Some(session) = state.sessions.get(&client_id).and_then(Weak::upgrade) {
                        targets.push((session, filter.clone()));
                    }
                }
                for members in state.subscriptions.shared_groups(&filter).into_values() {
                    if let Some(client_id) = members.choose(&mut rand::thread_rng()) {
                        if let Some(session) = state.sessions.get(client_id).and_then(Weak::upgrade) {
                            targets.push((session, filter.clone()));
                        }
                    }
                }
            }
            targets
        };

        for (session, filter) in deliveries {
            session.deliver(&filter, message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OutboundEvent;
    use codec::{ProtocolLevel, SubscriptionOptions};
    use tokio::sync::mpsc;

    fn new_session(broker: &Arc<Broker>, client_id: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(client_id.to_string(), ProtocolLevel::V311, Arc::clone(broker), tx);
        session.connect();
        (session, rx)
    }

    #[test]
    fn publish_fans_out_to_matching_wildcard_subscriber() {
        let broker = Broker::new();
        let (session, mut rx) = new_session(&broker, "sub1");
        session.subscribe("a/+", SubscriptionOptions::new(QoS::AtMostOnce));
        broker.publish(Message::new("a/b", b"hi".to_vec(), QoS::AtMostOnce, false));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn takeover_discards_previous_session_with_same_client_id() {
        let broker = Broker::new();
        let (first, mut first_rx) = new_session(&broker, "dup");
        let (_second, _second_rx) = new_session(&broker, "dup");
        assert!(matches!(first_rx.try_recv().unwrap(), OutboundEvent::Disconnect));
        assert!(!first.is_connected());
    }

    #[test]
    fn shared_subscription_delivers_to_exactly_one_member_per_group() {
        let broker = Broker::new();
        let (a, mut a_rx) = new_session(&broker, "a");
        let (b, mut b_rx) = new_session(&broker, "b");
        a.subscribe("$share/g/x", SubscriptionOptions::new(QoS::AtMostOnce));
        b.subscribe("$share/g/x", SubscriptionOptions::new(QoS::AtMostOnce));
        broker.publish(Message::new("x", b"x".to_vec(), QoS::AtMostOnce, false));
        let delivered = [a_rx.try_recv().is_ok(), b_rx.try_recv().is_ok()];
        assert_eq!(delivered.iter().filter(|d| **d).count(), 1);
    }

    #[test]
    fn removing_last_subscriber_prunes_trie_entry() {
        let broker = Broker::new();
        let (session, _rx) = new_session(&broker, "sub1");
        session.subscribe("a/b", SubscriptionOptions::new(QoS::AtMostOnce));
        session.unsubscribe("a/b");
        assert!(broker.state.lock().unwrap().trie.matches("a/b").is_empty());
    }

    #[test]
    fn disconnect_removes_session_and_its_subscriptions() {
        let broker = Broker::new();
        let (session, _rx) = new_session(&broker, "sub1");
        session.subscribe("a/b", SubscriptionOptions::new(QoS::AtMostOnce));
        session.disconnect();
        assert!(broker.find_session("sub1").is_none());
        assert!(broker.state.lock().unwrap().trie.matches("a/b").is_empty());
    }
}
