// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! TCP accept loop: binds the configured listener and spawns one [`Connection`] task per
//! accepted socket. Grounded on `examples/RustRobotics-hebo`'s `listener/run.rs` (`accept` loop,
//! `tokio::spawn` per connection), collapsed from hebo's multi-listener/multi-transport
//! dispatcher-actor design down to a single TCP listener driving a shared [`Broker`] directly,
//! since this broker core has no session/auth/acl actors to route through (base specification
//! §6).

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::broker::Broker;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::Error;

/// Binds the configured listener address and serves connections until the process is killed.
///
/// # Errors
///
/// Returns an error if the listener address cannot be bound.
pub async fn run(config: Config) -> Result<(), Error> {
    let broker = Broker::with_max_qos(config.general().maximum_qos());
    let address = config.listener().address();
    let listener = TcpListener::bind(address).await?;
    log::info!("server: listening on {address}");

    loop {
        let (stream, peer) = listener.accept().await?;
        log::debug!("server: accepted connection from {peer}");
        let connection = Connection::new(stream, Arc::clone(&broker));
        tokio::spawn(connection.run());
    }
}
