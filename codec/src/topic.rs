// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

// Topic name/filter syntax rules that are independent of any particular broker's subscription
// storage. Matching filters against names (the `+`/`#` wildcard semantics and `$share/` group
// prefix) is a broker concern and lives in the `mqtt-broker` crate's trie; this module only
// checks that a string is well-formed enough to go on the wire at all.

use crate::error::DecodeError;

/// Validates a topic name used in PUBLISH: non-empty and free of the `+`/`#` wildcard
/// characters, which are only meaningful in filters.
///
/// # Errors
///
/// Returns `DecodeError::InvalidTopicFilter` if the name is empty or contains a wildcard
/// character.
pub fn validate_topic_name(name: &str) -> Result<(), DecodeError> {
    if name.is_empty() || name.contains(['+', '#']) {
        return Err(DecodeError::InvalidTopicFilter);
    }
    Ok(())
}

/// Validates a topic filter used in SUBSCRIBE/UNSUBSCRIBE: `#` may only appear as the entire
/// final level, and `+` may only appear as an entire level on its own, per MQTT-4.7.1-2 and
/// MQTT-4.7.1-3. A leading `$share/<group>/` is stripped before checking the remaining filter.
///
/// # Errors
///
/// Returns `DecodeError::InvalidTopicFilter` if the filter is empty or violates either rule.
pub fn validate_topic_filter(filter: &str) -> Result<(), DecodeError> {
    if filter.is_empty() {
        return Err(DecodeError::InvalidTopicFilter);
    }

    let remainder = match filter.strip_prefix("$share/") {
        Some(rest) => {
            let mut parts = rest.splitn(2, '/');
            let group = parts.next().unwrap_or("");
            if group.is_empty() || group.contains(['+', '#']) {
                return Err(DecodeError::InvalidTopicFilter);
            }
            parts.next().ok_or(DecodeError::InvalidTopicFilter)?
        }
        None => filter,
    };

    if remainder.is_empty() {
        return Err(DecodeError::InvalidTopicFilter);
    }

    let levels: Vec<&str> = remainder.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        let is_last = i == levels.len() - 1;
        if level.contains('#') && (*level != "#" || !is_last) {
            return Err(DecodeError::InvalidTopicFilter);
        }
        if level.contains('+') && *level != "+" {
            return Err(DecodeError::InvalidTopicFilter);
        }
    }
    Ok(())
}

/// True if `filter` begins with the shared-subscription prefix `$share/<group>/`.
#[must_use]
pub fn is_shared_filter(filter: &str) -> bool {
    filter.starts_with("$share/")
}

/// Splits a `$share/<group>/<filter>` filter into its group name and underlying filter. Returns
/// `None` if `filter` is not a shared-subscription filter.
#[must_use]
pub fn split_shared_filter(filter: &str) -> Option<(&str, &str)> {
    let rest = filter.strip_prefix("$share/")?;
    let mut parts = rest.splitn(2, '/');
    let group = parts.next()?;
    let underlying = parts.next()?;
    Some((group, underlying))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_wildcard_filters() {
        assert!(validate_topic_filter("a/b/c").is_ok());
        assert!(validate_topic_filter("a/+/c").is_ok());
        assert!(validate_topic_filter("a/b/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("+").is_ok());
    }

    #[test]
    fn rejects_malformed_wildcards() {
        assert_eq!(
            validate_topic_filter("a/b#"),
            Err(DecodeError::InvalidTopicFilter)
        );
        assert_eq!(
            validate_topic_filter("a/#/c"),
            Err(DecodeError::InvalidTopicFilter)
        );
        assert_eq!(
            validate_topic_filter("a+/b"),
            Err(DecodeError::InvalidTopicFilter)
        );
        assert_eq!(validate_topic_filter(""), Err(DecodeError::InvalidTopicFilter));
    }

    #[test]
    fn parses_shared_subscription_prefix() {
        assert!(validate_topic_filter("$share/group1/a/b").is_ok());
        assert_eq!(
            split_shared_filter("$share/group1/a/b"),
            Some(("group1", "a/b"))
        );
        assert!(!is_shared_filter("a/b"));
        assert_eq!(
            validate_topic_filter("$share//a/b"),
            Err(DecodeError::InvalidTopicFilter)
        );
    }

    #[test]
    fn topic_names_reject_wildcards() {
        assert!(validate_topic_name("a/b/c").is_ok());
        assert_eq!(
            validate_topic_name("a/+/c"),
            Err(DecodeError::InvalidTopicFilter)
        );
        assert_eq!(validate_topic_name(""), Err(DecodeError::InvalidTopicFilter));
    }
}
