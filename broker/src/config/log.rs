// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Logging configuration read by the binary entry point and handed to `env_logger`. Grounded on
//! `examples/RustRobotics-hebo/hebo/src/config/log.rs`'s `Log`/`LogLevel` shape, re-targeted from
//! `log4rs`'s rotating-file appenders to `env_logger`'s single-stream model — the base
//! specification's ambient logging stack names `env_logger` at the binary entry point, not a
//! full rotating-file setup.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(alias = "off")]
    Off,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "warn")]
    Warn,
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "trace")]
    Trace,
}

impl LogLevel {
    #[must_use]
    pub const fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    /// Minimum log level, used when `RUST_LOG` is not set in the environment.
    ///
    /// Default is "info".
    #[serde(default = "Log::default_level")]
    level: LogLevel,
}

impl Log {
    #[must_use]
    pub const fn default_level() -> LogLevel {
        LogLevel::Info
    }

    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Initializes `env_logger`, honoring `RUST_LOG` if set and otherwise falling back to
    /// `level`. Safe to call at most once per process; subsequent calls are a silent no-op since
    /// `env_logger` itself rejects re-initialization.
    pub fn init(&self) {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(self.level.as_filter());
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        let _ = builder.try_init();
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}
