// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Single-task async I/O driver.
//!
//! One `Driver` owns exactly one UDP socket and one [`Session`]. Its loop is
//! the only place in the crate that touches the socket: everything else
//! (channel writes, reads, the session state machine) is pure in-memory
//! state that the driver drains and feeds on a fixed tick.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{session::{Session, SessionState}, wire::packet::Packet};

/// Largest UDP datagram this crate will attempt to receive. Comfortably
/// above `chunk_size + packet overhead` for any configured chunk size.
const RECV_BUF_LEN: usize = 8192;

/// Drives one session's socket I/O until closed or cancelled.
pub struct Driver {
    socket: Arc<UdpSocket>,
    session: Arc<Session>,
    tick: Duration,
    cancel: CancellationToken,
}

impl Driver {
    pub async fn bind(local_addr: SocketAddr, session: Arc<Session>, tick: Duration) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(local_addr).await?);
        Ok(Self { socket, session, tick, cancel: CancellationToken::new() })
    }

    /// A token the caller can also hold to observe or trigger shutdown from
    /// outside this struct (e.g. from a `Pool::disconnect`).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A cloneable handle to the underlying socket, so a caller can send
    /// handshake packets (`HELLO`, `P2P_RDY`) from outside the driver loop
    /// while it is running.
    pub fn socket_handle(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Request shutdown. Synchronous from the caller's perspective: the
    /// actual `CLOSE` emission and socket teardown happen on the next driver
    /// tick, run the loop to completion with [`Driver::run`].
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn send(&self, packet: &Packet, to: SocketAddr) -> std::io::Result<()> {
        let encoded = packet.encode();
        self.socket.send_to(&encoded, to).await?;
        Ok(())
    }

    /// Run the receive/poll loop until the session reaches `Closing`
    /// (either via a received `CLOSE`, a fatal decode error, or `stop()`).
    /// Emits a terminal `CLOSE` to the last known peer before returning.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            if self.cancel.is_cancelled() {
                self.session.begin_close().await;
            }
            if self.session.state().await == SessionState::Closing {
                break;
            }

            match tokio::time::timeout(self.tick, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    self.on_datagram(&buf[..len], from).await;
                },
                Ok(Err(e)) => {
                    error!(error = %e, "UDP recv failed, closing session");
                    self.session.begin_close().await;
                },
                Err(_timeout) => {
                    self.on_tick().await;
                },
            }
        }

        self.emit_close().await;
    }

    async fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let packet = match Packet::parse(bytes) {
            Ok((pkt, _consumed)) => pkt,
            Err(e) => {
                warn!(error = %e, %from, "dropping undecodable datagram");
                return;
            },
        };
        debug!(%from, ?packet, "received packet");

        let replies = self.session.handle(from, packet).await;
        for reply in replies {
            if let Err(e) = self.send(&reply, from).await {
                error!(error = %e, %from, "failed to send reply packet");
            }
        }
    }

    async fn on_tick(&mut self) {
        let peer = *self.session.peer_addr.lock().await;
        let Some(peer) = peer else { return };

        let now = std::time::Instant::now();
        for channel in &self.session.channels {
            let due = channel.poll(now).await;
            for packet in due {
                if let Err(e) = self.send(&packet, peer).await {
                    error!(error = %e, %peer, "failed to send retransmission");
                }
            }
        }
    }

    async fn emit_close(&self) {
        if let Some(peer) = *self.session.peer_addr.lock().await {
            if let Err(e) = self.send(&Packet::Close, peer).await {
                warn!(error = %e, %peer, "failed to send terminal CLOSE");
            } else {
                info!(%peer, "sent terminal CLOSE");
            }
        }
    }
}
