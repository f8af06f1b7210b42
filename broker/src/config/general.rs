// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broker-wide tunables that are not tied to a single listener: the maximum QoS the broker will
//! grant to a subscriber and the cap on accepted PUBLISH payload size.
//!
//! Grounded on `examples/RustRobotics-hebo/hebo/src/config/general.rs`'s `General` section —
//! same `#[serde(default = "...")]`-per-field shape, trimmed to the two settings this broker core
//! actually acts on (hebo's `sys_interval`, `user`/`pid_file` privilege-drop and
//! `maximum_keep_alive` server-override have no counterpart here: no `$SYS` metrics, no daemon
//! privilege dropping, and keep-alive is taken as the client states it, per the base
//! specification's Non-goals).

use std::convert::TryFrom;

use codec::QoS;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct General {
    /// Maximum QoS the broker will grant a subscriber, regardless of what it requests in
    /// SUBSCRIBE. Clamped against on every `Session::subscribe` call. Stored as the raw wire
    /// value (0, 1 or 2) since the codec's `QoS` type does not carry a `serde` impl of its own.
    #[serde(default = "General::default_maximum_qos")]
    maximum_qos: u8,

    /// Maximum accepted PUBLISH payload size in bytes. `0` means no limit beyond the codec's own
    /// 256MB remaining-length ceiling.
    #[serde(default = "General::default_message_size_limit")]
    message_size_limit: u32,
}

impl General {
    #[must_use]
    pub const fn default_maximum_qos() -> u8 {
        QoS::ExactlyOnce as u8
    }

    #[must_use]
    pub const fn default_message_size_limit() -> u32 {
        0
    }

    #[must_use]
    pub fn maximum_qos(&self) -> QoS {
        QoS::try_from(self.maximum_qos).unwrap_or(QoS::ExactlyOnce)
    }

    #[must_use]
    pub const fn message_size_limit(&self) -> u32 {
        self.message_size_limit
    }

    /// # Errors
    ///
    /// Returns `ErrorKind::Config` if `maximum_qos` is not 0, 1 or 2, or if `message_size_limit`
    /// exceeds the codec's own ceiling.
    pub fn validate(&self) -> Result<(), Error> {
        if QoS::try_from(self.maximum_qos).is_err() {
            return Err(Error::new(
                ErrorKind::Config,
                format!("general.maximum_qos {} is not a valid QoS (0, 1 or 2)", self.maximum_qos),
            ));
        }
        if (self.message_size_limit as usize) > codec::MAX_PACKET_BYTES {
            return Err(Error::new(
                ErrorKind::Config,
                format!(
                    "general.message_size_limit {} exceeds the protocol maximum of {}",
                    self.message_size_limit,
                    codec::MAX_PACKET_BYTES
                ),
            ));
        }
        Ok(())
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            maximum_qos: Self::default_maximum_qos(),
            message_size_limit: Self::default_message_size_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(General::default().validate().is_ok());
    }

    #[test]
    fn rejects_limit_above_protocol_ceiling() {
        let general = General {
            message_size_limit: u32::MAX,
            ..General::default()
        };
        assert!(general.validate().is_err());
    }
}
