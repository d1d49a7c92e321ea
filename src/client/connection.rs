// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single established PPPP connection: the framed-codec façade over one
//! [`Session`]'s channels, plus the `connect_any` handshake helper that
//! brings a session up against a list of candidate hosts.

use std::{
    net::SocketAddr,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    time::Duration,
};

use bytes::Bytes;
use tokio::{net::UdpSocket, sync::Notify, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::TransportConfig,
    driver::Driver,
    error::{Result, TransportError},
    session::{Session, SessionState},
    wire::{
        aabb::{self, AabbHeader, FileTransferReply},
        duid::Duid,
        packet::Packet,
        xzyh::{self, XzyhFrame, XzyhHeader},
    },
};

/// Control-plane channel carrying `XZYH` frames.
pub const CHANNEL_CONTROL: u8 = 0;
/// Application-plane channel carrying `AABB` frames.
pub const CHANNEL_APPLICATION: u8 = 1;

/// How long `connect_any` waits after offering `P2P_RDY` to a candidate
/// before giving up on it and trying the next one.
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One live PPPP connection: owns the session state, the socket, and the
/// background driver task.
pub struct PpppConnection {
    pub duid: Duid,
    session: Arc<Session>,
    socket: Arc<UdpSocket>,
    cancel: CancellationToken,
    driver_task: JoinHandle<()>,
    closed_flag: Arc<AtomicBool>,
    closed_notify: Arc<Notify>,
}

impl PpppConnection {
    /// Bind a fresh socket and driver, then attempt `P2P_RDY` against each
    /// candidate host in order until one answers with `P2P_RDY_ACK` (spec
    /// §4.8 `connect_any`).
    pub async fn connect_any(
        duid: Duid,
        candidates: &[SocketAddr],
        cfg: &TransportConfig,
    ) -> Result<Arc<Self>> {
        let session = Arc::new(Session::new(
            duid,
            cfg.retransmit_timeout,
            cfg.max_in_flight,
            cfg.chunk_size,
        ));
        let driver = Driver::bind(
            SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), 0),
            Arc::clone(&session),
            cfg.driver_tick,
        )
        .await
        .map_err(|e| TransportError::Decode(format!("failed to bind UDP socket: {e}")))?;

        let socket = driver.socket_handle();
        let cancel = driver.cancellation_token();
        let closed_flag = Arc::new(AtomicBool::new(false));
        let closed_notify = Arc::new(Notify::new());
        let driver_task = {
            let closed_flag = Arc::clone(&closed_flag);
            let closed_notify = Arc::clone(&closed_notify);
            tokio::spawn(async move {
                driver.run().await;
                closed_flag.store(true, Ordering::Release);
                closed_notify.notify_waiters();
            })
        };

        for &candidate in candidates {
            if candidate.ip() == std::net::IpAddr::V4(std::net::Ipv4Addr::BROADCAST) {
                // A unicast-only socket refuses to send to 255.255.255.255
                // without this option set.
                if let Err(e) = socket.set_broadcast(true) {
                    warn!(%candidate, error = %e, "failed to enable SO_BROADCAST for discovery candidate");
                    continue;
                }
            }
            debug!(%candidate, "offering P2P_RDY");
            if let Err(e) = socket.send_to(&Packet::P2pRdy { duid }.encode(), candidate).await {
                warn!(%candidate, error = %e, "failed to send P2P_RDY");
                continue;
            }

            let deadline = tokio::time::Instant::now() + CONNECT_ATTEMPT_TIMEOUT;
            while tokio::time::Instant::now() < deadline {
                if session.state().await == SessionState::Ready {
                    return Ok(Arc::new(Self {
                        duid,
                        session,
                        socket,
                        cancel,
                        driver_task,
                        closed_flag,
                        closed_notify,
                    }));
                }
                sleep(CONNECT_POLL_INTERVAL).await;
            }
        }

        cancel.cancel();
        let _ = driver_task.await;
        Err(TransportError::ConnectFailed)
    }

    /// Resolves once the background driver task has exited (terminal
    /// `CLOSE` emitted, socket released), whether that was triggered by
    /// `stop()`, a received `CLOSE`, or a fatal I/O error. Used by
    /// [`crate::client::pool::Pool`] to reap stale entries without the
    /// caller having to poll `state()`.
    pub async fn closed(&self) {
        loop {
            let notified = self.closed_notify.notified();
            if self.closed_flag.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    pub async fn state(&self) -> SessionState {
        self.session.state().await
    }

    fn channel(&self, index: u8) -> Result<&crate::channel::Channel> {
        self.session.channel(index).ok_or(TransportError::InvalidChannel(index))
    }

    /// Send one `XZYH`-framed payload over `channel` (default: the control
    /// channel).
    pub async fn send_xzyh(&self, channel: u8, header: XzyhHeader, payload: &[u8]) -> Result<()> {
        let ch = self.channel(channel)?;
        let frame = xzyh::build_frame(header, payload);
        ch.write(&frame, true).await?;
        Ok(())
    }

    /// Receive the next complete `XZYH` frame on `channel`.
    pub async fn recv_xzyh(&self, channel: u8) -> Result<XzyhFrame> {
        let ch = self.channel(channel)?;
        let header_bytes = ch.read(xzyh::HEADER_LEN).await?;
        let header = XzyhHeader::from_bytes(&header_bytes)?;
        let payload = ch.read(header.length as usize).await?;
        Ok(XzyhFrame { header, payload })
    }

    /// Send one `AABB`-framed request over `channel` (default: the
    /// application channel).
    pub async fn send_aabb(&self, channel: u8, header: AabbHeader, payload: &[u8]) -> Result<()> {
        let ch = self.channel(channel)?;
        let frame = aabb::build_frame(header, payload);
        ch.write(&frame, true).await?;
        Ok(())
    }

    /// Receive the next complete `AABB` frame on `channel`, verifying its
    /// trailing CRC-16.
    pub async fn recv_aabb(&self, channel: u8) -> Result<(AabbHeader, Bytes)> {
        let ch = self.channel(channel)?;
        let header_bytes = ch.read(aabb::HEADER_LEN).await?;
        let header = AabbHeader::from_bytes(&header_bytes)?;
        let body = ch.read(header.length as usize + aabb::CRC_LEN).await?;
        let payload = body.slice(0..header.length as usize);
        let crc_bytes: [u8; aabb::CRC_LEN] = body[header.length as usize..]
            .try_into()
            .map_err(|_| TransportError::Decode("AABB: short CRC trailer".into()))?;
        aabb::verify_crc(&payload, crc_bytes)?;
        Ok((header, payload))
    }

    /// Send an `AABB` request and wait for its single-byte reply, raising
    /// `TransportError::Protocol` when `check` is set and the reply is not
    /// `FileTransferReply::Ok`.
    pub async fn aabb_request(
        &self,
        channel: u8,
        header: AabbHeader,
        payload: &[u8],
        check: bool,
    ) -> Result<Bytes> {
        self.send_aabb(channel, header, payload).await?;
        let (_reply_header, reply_payload) = self.recv_aabb(channel).await?;

        if reply_payload.len() != 1 {
            return Err(TransportError::UnexpectedReply { len: reply_payload.len() });
        }

        if check {
            let code = reply_payload[0];
            match FileTransferReply::from_u8(code) {
                Some(FileTransferReply::Ok) => {},
                Some(other) => {
                    return Err(TransportError::Protocol { code, name: other.name() });
                },
                None => return Err(TransportError::Protocol { code, name: "UNKNOWN" }),
            }
        }

        Ok(reply_payload)
    }

    /// Request shutdown: the driver emits a terminal `CLOSE` on its next
    /// tick and its background task exits.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the background driver task to exit after `stop()`.
    pub async fn join(self) {
        let _ = self.driver_task.await;
    }
}
