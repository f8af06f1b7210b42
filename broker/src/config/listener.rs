// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The single TCP listener this broker core binds. Grounded on
//! `examples/RustRobotics-hebo/hebo/src/config/listener.rs`'s `Listener`, trimmed to one entry
//! (no `Vec<Listener>`) and to the one `Protocol::Mqtt` variant — TLS, WebSocket and Unix domain
//! socket transports are out of scope (base specification §6 Non-goals).

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listener {
    /// Bind address and port, e.g. `0.0.0.0:1883`.
    #[serde(default = "Listener::default_address")]
    address: String,

    /// Seconds to wait for CONNECT after a transport accepts, before closing it.
    ///
    /// Default is 10.
    #[serde(default = "Listener::default_connect_timeout")]
    connect_timeout: u16,
}

impl Listener {
    #[must_use]
    pub fn default_address() -> String {
        "0.0.0.0:1883".to_string()
    }

    #[must_use]
    pub const fn default_connect_timeout() -> u16 {
        10
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> u16 {
        self.connect_timeout
    }

    /// # Errors
    ///
    /// Returns `ErrorKind::Config` if `address` does not parse as a socket address.
    pub fn validate(&self) -> Result<(), Error> {
        self.address.parse::<std::net::SocketAddr>().map_err(|err| {
            Error::new(
                ErrorKind::Config,
                format!("listener.address {:?} is invalid: {err}", self.address),
            )
        })?;
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            connect_timeout: Self::default_connect_timeout(),
        }
    }
}
