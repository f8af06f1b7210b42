// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-client connection task: owns one `TcpStream`, speaks the wire codec over it, and
//! dispatches each decoded [`Packet`] to the matching [`Session`] operation. Grounded on
//! `examples/RustRobotics-hebo`'s `listener/run.rs`/`stream.rs` pair (one task per connection,
//! `tokio::select!` between socket reads and an mpsc command channel) generalized from hebo's
//! multi-transport `Stream` enum down to the single TCP transport the base specification scopes
//! this broker to (§6).

use std::sync::Arc;
use std::time::Duration;

use codec::{
    AuthPacket, ConnAckPacket, ConnectPacket, ConnectReturnCode, Packet, ProtocolLevel,
    PubAckPacket, PubCompPacket, PubRecPacket, PubRelPacket, ReasonCode, SubAckPacket,
    UnsubAckPacket,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::broker::Broker;
use crate::error::{Error, ErrorKind};
use crate::message::Message;
use crate::session::{OutboundEvent, Session};

/// Multiplier MQTT 3.1.1 §3.1.2.10 applies to the negotiated keep-alive interval before the
/// server is allowed to treat the client as disconnected.
const KEEP_ALIVE_GRACE: f64 = 1.5;

pub struct Connection {
    stream: TcpStream,
    buf: Vec<u8>,
    broker: Arc<Broker>,
}

impl Connection {
    #[must_use]
    pub const fn new(stream: TcpStream, broker: Arc<Broker>) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            broker,
        }
    }

    /// Drives this connection until the transport closes or a protocol error tears it down.
    /// Errors are logged, not propagated — by the time this returns, the socket and any session
    /// it registered have already been cleaned up.
    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => log::debug!("connection: closed"),
            Err(err) => log::debug!("connection: closed with error: {err}"),
        }
    }

    async fn serve(&mut self) -> Result<(), Error> {
        let connect = self.read_connect().await?;
        let level = connect.protocol_level;
        let client_id = connect.client_id.clone();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (session, session_present) = self.negotiate_session(&connect, tx);

        self.send(
            &Packet::ConnAck(ConnAckPacket {
                session_present,
                reason_code: ReasonCode::from(ConnectReturnCode::Accepted),
                properties: Vec::new(),
            }),
            level,
        )
        .await?;
        log::info!("connection: {client_id} connected (session_present={session_present})");

        let keep_alive = if connect.keep_alive == 0 {
            None
        } else {
            Some(Duration::from_millis(
                (f64::from(connect.keep_alive) * 1000.0 * KEEP_ALIVE_GRACE) as u64,
            ))
        };

        let result = self.dispatch_loop(&session, level, &mut rx, keep_alive).await;
        if let Err(err) = &result {
            self.close_with_reason(level, reason_for(err)).await;
        }
        session.disconnect();
        result
    }

    /// MQTT 5 allows the server to send a DISCONNECT carrying a reason code before closing a
    /// transport it is tearing down on error (base specification §7); MQTT 3.1.1 has no such
    /// packet in this direction, so this is a no-op below V5. Send failures are swallowed — the
    /// transport is being torn down regardless and the caller has already decided to close it.
    async fn close_with_reason(&mut self, level: ProtocolLevel, reason_code: ReasonCode) {
        if !level.has_properties() {
            return;
        }
        let packet = Packet::Disconnect(codec::DisconnectPacket {
            reason_code,
            properties: Vec::new(),
        });
        let _ = self.send(&packet, level).await;
    }

    /// Reads packets until one decodes, blocking on more socket reads as needed. `protocol_level`
    /// governs how to decode everything except CONNECT itself, which always carries its own
    /// level in the variable header regardless of what is passed here.
    async fn read_packet(&mut self, protocol_level: ProtocolLevel) -> Result<Option<Packet>, Error> {
        loop {
            match codec::decode(&self.buf, protocol_level) {
                Ok(Some((packet, consumed))) => {
                    self.buf.drain(..consumed);
                    return Ok(Some(packet));
                }
                Ok(None) => {}
                Err(err) => return Err(err.into()),
            }
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Ok(None);
            }
        }
    }

    async fn read_connect(&mut self) -> Result<ConnectPacket, Error> {
        match self.read_packet(ProtocolLevel::V311).await? {
            Some(Packet::Connect(connect)) => Ok(connect),
            Some(_) => Err(Error::new(ErrorKind::ConnectOutOfOrder, "first packet was not CONNECT")),
            None => Err(Error::new(ErrorKind::Io, "transport closed before CONNECT")),
        }
    }

    /// Implements the base specification's §4.6 CONNECT handshake: clean-start discards any
    /// existing session under this client id and starts fresh; otherwise an existing session is
    /// resumed in place (subscriptions kept, transport rewired) and a missing one is created.
    /// Returns the session to dispatch on and whether CONNACK should report `session_present`.
    fn negotiate_session(
        &self,
        connect: &ConnectPacket,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) -> (Arc<Session>, bool) {
        match self.broker.find_session(&connect.client_id) {
            Some(existing) if connect.clean_start => {
                existing.discard();
                let session = Session::new(
                    connect.client_id.clone(),
                    connect.protocol_level,
                    Arc::clone(&self.broker),
                    outbound,
                );
                session.connect();
                (session, false)
            }
            Some(existing) => {
                existing.resume(connect.protocol_level, outbound);
                (existing, true)
            }
            None => {
                let session = Session::new(
                    connect.client_id.clone(),
                    connect.protocol_level,
                    Arc::clone(&self.broker),
                    outbound,
                );
                session.connect();
                (session, false)
            }
        }
    }

    async fn dispatch_loop(
        &mut self,
        session: &Arc<Session>,
        level: ProtocolLevel,
        outbound: &mut mpsc::UnboundedReceiver<OutboundEvent>,
        keep_alive: Option<Duration>,
    ) -> Result<(), Error> {
        loop {
            let inbound = async {
                match keep_alive {
                    Some(deadline) => timeout(deadline, self.read_packet(level))
                        .await
                        .map_err(|_| Error::new(ErrorKind::KeepAliveTimeout, "no packet within keep-alive window")),
                    None => Ok(self.read_packet(level).await),
                }
            };

            tokio::select! {
                result = inbound => {
                    let packet = result??;
                    let Some(packet) = packet else { return Ok(()) };
                    if !self.handle_packet(session, level, packet).await? {
                        return Ok(());
                    }
                }
                event = outbound.recv() => {
                    match event {
                        Some(OutboundEvent::Deliver { message, packet_id, qos }) => {
                            let publish = message.to_publish(packet_id, qos);
                            self.send(&Packet::Publish(publish), level).await?;
                        }
                        Some(OutboundEvent::Disconnect) | None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Handles one decoded inbound packet. Returns `Ok(false)` when the connection should close
    /// (DISCONNECT received, or a second CONNECT arrived and the transport must be torn down).
    async fn handle_packet(&mut self, session: &Arc<Session>, level: ProtocolLevel, packet: Packet) -> Result<bool, Error> {
        match packet {
            Packet::Connect(_) => {
                return Err(Error::new(ErrorKind::ConnectOutOfOrder, "duplicate CONNECT on one transport"));
            }
            Packet::Publish(publish) => {
                let message = Message::from_publish(&publish);
                let qos = publish.qos();
                session.publish(publish.packet_id, message);
                match qos {
                    codec::QoS::AtMostOnce => {}
                    codec::QoS::AtLeastOnce => {
                        let packet_id = publish.packet_id.ok_or_else(|| {
                            Error::new(ErrorKind::Protocol, "QoS 1 PUBLISH missing packet id")
                        })?;
                        self.send(&Packet::PubAck(PubAckPacket::new(packet_id)), level).await?;
                    }
                    codec::QoS::ExactlyOnce => {
                        let packet_id = publish.packet_id.ok_or_else(|| {
                            Error::new(ErrorKind::Protocol, "QoS 2 PUBLISH missing packet id")
                        })?;
                        self.send(&Packet::PubRec(PubRecPacket::new(packet_id)), level).await?;
                    }
                }
            }
            Packet::PubAck(ack) => session.puback(ack.packet_id),
            Packet::PubRec(ack) => {
                if session.pubrec(ack.packet_id) {
                    self.send(&Packet::PubRel(PubRelPacket::new(ack.packet_id)), level).await?;
                } else {
                    log::debug!("connection: PUBREC for unknown packet id {}", ack.packet_id);
                }
            }
            Packet::PubRel(ack) => {
                if session.pubrel(ack.packet_id) {
                    self.send(&Packet::PubComp(PubCompPacket::new(ack.packet_id)), level).await?;
                } else {
                    log::debug!("connection: PUBREL for unknown packet id {}", ack.packet_id);
                }
            }
            Packet::PubComp(ack) => session.pubcomp(ack.packet_id),
            Packet::Subscribe(subscribe) => {
                let mut reason_codes = Vec::with_capacity(subscribe.filters.len());
                for (filter, options) in &subscribe.filters {
                    let granted = session.subscribe(filter, *options);
                    reason_codes.push(ReasonCode(granted.into()));
                }
                self.send(
                    &Packet::SubAck(SubAckPacket {
                        packet_id: subscribe.packet_id,
                        properties: Vec::new(),
                        reason_codes,
                    }),
                    level,
                )
                .await?;
            }
            Packet::Unsubscribe(unsubscribe) => {
                for filter in &unsubscribe.filters {
                    session.unsubscribe(filter);
                }
                let reason_codes = vec![ReasonCode::SUCCESS; unsubscribe.filters.len()];
                self.send(
                    &Packet::UnsubAck(UnsubAckPacket {
                        packet_id: unsubscribe.packet_id,
                        properties: Vec::new(),
                        reason_codes,
                    }),
                    level,
                )
                .await?;
            }
            Packet::PingReq => self.send(&Packet::PingResp, level).await?,
            Packet::PingResp => {}
            Packet::Disconnect(_) => return Ok(false),
            Packet::Auth(auth) => self.handle_auth(&auth),
            Packet::ConnAck(_) | Packet::SubAck(_) | Packet::UnsubAck(_) => {
                return Err(Error::new(ErrorKind::Protocol, "server-to-client packet received from client"));
            }
        }
        Ok(true)
    }

    /// AUTH is recognized and round-tripped but this core does not drive an extended
    /// authentication exchange (non-goal); a well-formed AUTH is logged and otherwise ignored
    /// (base specification §4.1, §7).
    fn handle_auth(&self, auth: &AuthPacket) {
        log::debug!("connection: ignoring AUTH (reason_code={:?})", auth.reason_code);
    }

    async fn send(&mut self, packet: &Packet, level: ProtocolLevel) -> Result<(), Error> {
        let mut buf = Vec::with_capacity(codec::encoded_len(packet, level) + 5);
        codec::encode(packet, level, &mut buf)?;
        self.stream.write_all(&buf).await?;
        Ok(())
    }
}

/// Maps a connection-level failure to the DISCONNECT reason code a V5 client should see before
/// its transport closes (base specification §7's error taxonomy).
fn reason_for(err: &Error) -> ReasonCode {
    match err.kind() {
        ErrorKind::Decode => ReasonCode::MALFORMED_PACKET,
        ErrorKind::Protocol | ErrorKind::ConnectOutOfOrder => ReasonCode::PROTOCOL_ERROR,
        ErrorKind::KeepAliveTimeout => ReasonCode::KEEP_ALIVE_TIMEOUT,
        ErrorKind::Io | ErrorKind::Encode | ErrorKind::ChannelClosed | ErrorKind::Config => {
            ReasonCode::UNSPECIFIED_ERROR
        }
    }
}
