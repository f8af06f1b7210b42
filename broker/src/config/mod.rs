// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broker configuration: a `Config` struct deserialized from TOML, with `Default` impls for
//! every field so a missing config file still produces a working broker. Grounded on
//! `examples/RustRobotics-hebo/hebo/src/config/mod.rs`'s section layout, trimmed to the sections
//! this broker core has (no `security`, `storage` or `dashboard` sections — authentication,
//! persistence and an admin HTTP surface are all base-specification Non-goals).

mod general;
mod listener;
mod log;

pub use general::General;
pub use listener::Listener;
pub use log::{Log, LogLevel};

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    general: General,

    #[serde(default)]
    listener: Listener,

    #[serde(default)]
    log: Log,
}

impl Config {
    #[must_use]
    pub const fn general(&self) -> &General {
        &self.general
    }

    #[must_use]
    pub const fn listener(&self) -> &Listener {
        &self.listener
    }

    #[must_use]
    pub const fn log(&self) -> &Log {
        &self.log
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Config` if the file cannot be read or fails to parse.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// # Errors
    ///
    /// Returns `ErrorKind::Config` if `content` fails to parse as TOML matching this shape.
    pub fn load_from_str(content: &str) -> Result<Self, Error> {
        toml::from_str(content)
            .map_err(|err| Error::new(crate::error::ErrorKind::Config, format!("invalid config: {err}")))
    }

    /// # Errors
    ///
    /// Returns the first validation failure across all sections.
    pub fn validate(&self) -> Result<(), Error> {
        self.general.validate()?;
        self.listener.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn parses_partial_toml_with_field_defaults() {
        let config = Config::load_from_str(
            r#"
            [listener]
            address = "127.0.0.1:1884"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener().address(), "127.0.0.1:1884");
        assert_eq!(config.general().message_size_limit(), 0);
    }
}
