// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

// Error taxonomy for the broker core: typed errors per concern, propagated with `?`, matching
// the codec crate's split between wire-level (`DecodeError`/`EncodeError`) and session/broker
// level failures.

use std::fmt;
use std::io;

use codec::{CodecError, DecodeError, EncodeError};

/// Represent the types of errors the broker can encounter above the wire codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error occurred while performing I/O on the client transport.
    Io,

    /// A received packet failed to decode.
    Decode,

    /// A packet was well-formed but violated a protocol rule.
    Protocol,

    /// A packet could not be serialized for transmission.
    Encode,

    /// A client sent a packet before CONNECT, or a second CONNECT.
    ConnectOutOfOrder,

    /// The outbound channel to a session's connection task was closed.
    ChannelClosed,

    /// Keep-alive deadline elapsed with no packet received from the client.
    KeepAliveTimeout,

    /// Configuration file could not be read or parsed.
    Config,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Self::new(ErrorKind::Decode, format!("{err:?}"))
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        Self::new(ErrorKind::Encode, format!("{err:?}"))
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Malformed(inner) => Self::new(ErrorKind::Decode, format!("{inner:?}")),
            CodecError::Protocol(inner) => Self::new(ErrorKind::Protocol, format!("{inner:?}")),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::new(ErrorKind::ChannelClosed, err.to_string())
    }
}
