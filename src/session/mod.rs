// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session state machine.
//!
//! Packet dispatch is one exhaustive `match` over [`Packet`] rather than a
//! duck-typed per-type handler lookup: exhaustive pattern matching makes an
//! unknown/unsupported packet type a compiler-visible gap instead of a
//! silent no-op in a dynamic dispatch table. Adding a new packet variant
//! therefore forces every dispatch site in this crate to be revisited.

use std::net::SocketAddr;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    channel::Channel,
    wire::{duid::Duid, host::HostAddr, packet::Packet},
};

/// Lifecycle of one PPPP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake not yet complete: no `P2P_RDY` observed.
    New,
    /// `P2P_RDY` observed; channels are live.
    Ready,
    /// `CLOSE` received, `stop()` called, or the driver hit a fatal codec
    /// error. The driver exits its loop once in this state.
    Closing,
}

/// Number of multiplexed reliable channels.
pub const NUM_CHANNELS: usize = 8;

/// Per-connection session state: the handshake/teardown state machine plus
/// the eight reliable channels it owns.
pub struct Session {
    pub local_duid: Duid,
    pub state: Mutex<SessionState>,
    pub peer_addr: Mutex<Option<SocketAddr>>,
    pub channels: Vec<Channel>,
}

impl Session {
    pub fn new(
        local_duid: Duid,
        retransmit_timeout: std::time::Duration,
        max_in_flight: usize,
        chunk_size: usize,
    ) -> Self {
        let channels = (0..NUM_CHANNELS as u8)
            .map(|idx| Channel::new(idx, retransmit_timeout, max_in_flight, chunk_size))
            .collect();
        Self {
            local_duid,
            state: Mutex::new(SessionState::New),
            peer_addr: Mutex::new(None),
            channels,
        }
    }

    pub fn channel(&self, index: u8) -> Option<&Channel> {
        self.channels.get(index as usize)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    async fn set_state(&self, next: SessionState) {
        let mut st = self.state.lock().await;
        if *st != next {
            debug!(from = ?*st, to = ?next, "session state transition");
        }
        *st = next;
    }

    /// Dispatch one inbound packet, updating session/channel state and
    /// returning zero or more packets to send back to `from`.
    pub async fn handle(&self, from: SocketAddr, packet: Packet) -> Vec<Packet> {
        *self.peer_addr.lock().await = Some(from);
        let state = self.state().await;

        match packet {
            Packet::Hello => match host_from_addr(from) {
                Some(host) => vec![Packet::HelloAck { host }],
                None => {
                    warn!(%from, "HELLO from non-IPv4 peer, cannot build HELLO_ACK");
                    vec![]
                },
            },

            Packet::HelloAck { .. } => vec![],

            Packet::P2pRdy { duid: peer_duid } => {
                self.set_state(SessionState::Ready).await;
                match host_from_addr(from) {
                    Some(host) => {
                        info!(peer = %peer_duid, %from, "session ready");
                        vec![Packet::P2pRdyAck { duid: self.local_duid, host }]
                    },
                    None => vec![],
                }
            },

            Packet::P2pRdyAck { .. } => {
                // The initiator side of the handshake: we sent P2P_RDY and
                // this confirms the peer accepted it.
                self.set_state(SessionState::Ready).await;
                vec![]
            },

            Packet::PunchPkt => match state {
                SessionState::New => {
                    // A punch packet arriving before the handshake settled
                    // means the peer believes a prior session is still
                    // live; tear it down and re-offer ourselves.
                    vec![Packet::Close, Packet::P2pRdy { duid: self.local_duid }]
                },
                SessionState::Ready | SessionState::Closing => vec![],
            },

            Packet::ReportSessionReady => vec![],
            Packet::SessionReady(_) => vec![],

            Packet::Alive => vec![Packet::AliveAck],
            Packet::AliveAck => vec![],

            Packet::Drw { channel, index, data } => {
                if let Some(ch) = self.channel(channel) {
                    ch.rx_drw(index, data).await;
                    vec![Packet::DrwAck { channel, acks: vec![index] }]
                } else {
                    warn!(channel, "DRW on unknown channel index");
                    vec![]
                }
            },

            Packet::DrwAck { channel, acks } => {
                if let Some(ch) = self.channel(channel) {
                    ch.rx_ack(&acks).await;
                } else {
                    warn!(channel, "DRW_ACK on unknown channel index");
                }
                vec![]
            },

            Packet::DevLgnCrc { payload } => vec![Packet::DevLgnAckCrc { payload }],
            Packet::DevLgnAckCrc { .. } => vec![],

            Packet::Close => {
                self.set_state(SessionState::Closing).await;
                self.close_channels();
                vec![]
            },

            Packet::Unknown { tag, payload } => {
                debug!(tag = format!("0x{tag:04x}"), len = payload.len(), "ignoring unrecognized packet");
                vec![]
            },
        }
    }

    /// Transition to `Closing` and release any blocked channel readers/
    /// writers, without necessarily emitting a wire `CLOSE` (that is the
    /// driver's job, so it can happen exactly once per session).
    pub async fn begin_close(&self) {
        self.set_state(SessionState::Closing).await;
        self.close_channels();
    }

    fn close_channels(&self) {
        for ch in &self.channels {
            ch.close();
        }
    }
}

fn host_from_addr(addr: SocketAddr) -> Option<HostAddr> {
    match addr {
        SocketAddr::V4(v4) => Some(HostAddr { ip: *v4.ip(), port: v4.port() }),
        SocketAddr::V6(_) => None,
    }
}
