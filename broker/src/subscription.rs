// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Subscription registry: the two mappings keyed by topic filter that the base specification
//! describes in §3 — normal subscribers (a set of client identifiers) and shared-subscription
//! members (an ordered list of client/group pairs), both keyed by the *real* filter with any
//! `$share/<group>/` prefix already stripped by the caller.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    normal: HashMap<String, HashSet<String>>,
    shared: HashMap<String, Vec<(String, String)>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `client_id` to `filter`'s normal subscriber set. Returns `true` if `filter` had no
    /// prior subscribers at all (neither normal nor shared), meaning the caller must also insert
    /// it into the trie.
    pub fn subscribe(&mut self, client_id: &str, filter: &str) -> bool {
        let is_new = !self.has_any(filter);
        self.normal
            .entry(filter.to_string())
            .or_default()
            .insert(client_id.to_string());
        is_new
    }

    /// Removes `client_id` from `filter`'s normal subscriber set. Returns `true` if the filter
    /// now has no subscribers at all (normal or shared), meaning the caller must also remove it
    /// from the trie.
    pub fn unsubscribe(&mut self, client_id: &str, filter: &str) -> bool {
        if let Some(members) = self.normal.get_mut(filter) {
            members.remove(client_id);
            if members.is_empty() {
                self.normal.remove(filter);
            }
        }
        !self.has_any(filter)
    }

    /// Adds `(client_id, group)` to `filter`'s shared member list. Returns `true` if `filter` had
    /// no prior subscribers at all.
    pub fn shared_subscribe(&mut self, client_id: &str, filter: &str, group: &str) -> bool {
        let is_new = !self.has_any(filter);
        let members = self.shared.entry(filter.to_string()).or_default();
        let member = (client_id.to_string(), group.to_string());
        if !members.contains(&member) {
            members.push(member);
        }
        is_new
    }

    /// Removes `(client_id, group)` from `filter`'s shared member list. Returns `true` if the
    /// filter now has no subscribers at all.
    pub fn shared_unsubscribe(&mut self, client_id: &str, filter: &str, group: &str) -> bool {
        if let Some(members) = self.shared.get_mut(filter) {
            members.retain(|(id, g)| id != client_id || g != group);
            if members.is_empty() {
                self.shared.remove(filter);
            }
        }
        !self.has_any(filter)
    }

    fn has_any(&self, filter: &str) -> bool {
        self.normal.contains_key(filter) || self.shared.contains_key(filter)
    }

    #[must_use]
    pub fn normal_subscribers(&self, filter: &str) -> Vec<String> {
        self.normal
            .get(filter)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Shared members for `filter`, grouped by group name, in insertion order within each group.
    #[must_use]
    pub fn shared_groups(&self, filter: &str) -> HashMap<String, Vec<String>> {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(members) = self.shared.get(filter) {
            for (client_id, group) in members {
                groups.entry(group.clone()).or_default().push(client_id.clone());
            }
        }
        groups
    }

    /// Removes every trace of `client_id` across all filters, normal and shared. Used when a
    /// session is discarded without having unsubscribed individually. Returns the filters that
    /// became empty as a result, for the caller to prune from the trie.
    pub fn remove_client(&mut self, client_id: &str) -> Vec<String> {
        let mut emptied = Vec::new();
        self.normal.retain(|filter, members| {
            members.remove(client_id);
            let keep = !members.is_empty();
            if !keep {
                emptied.push(filter.clone());
            }
            keep
        });
        self.shared.retain(|filter, members| {
            members.retain(|(id, _)| id != client_id);
            let keep = !members.is_empty();
            if !keep {
                emptied.push(filter.clone());
            }
            keep
        });
        emptied.retain(|filter| !self.has_any(filter));
        emptied
    }
}
