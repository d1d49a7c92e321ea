// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared loopback-UDP test harness for the integration test binary.
//!
//! There is no external PPPP device to dial in these tests, so this harness
//! stands up a second in-process [`Session`]/[`Driver`] pair to play the
//! role of the remote printer. The session state machine already answers
//! `P2P_RDY`/`HELLO`/`ALIVE`/`DRW` correctly on its own, so the peer side
//! needs no extra code for the handshake; it only needs a small responder
//! loop for the application-level `AABB` codec, which lives above the
//! session.

use std::{net::{Ipv4Addr, SocketAddr}, sync::Arc, time::Duration};

use anyhow::Result;
use pppp_fleet_transport::{
    cfg::config::TransportConfig,
    driver::Driver,
    session::Session,
    wire::{
        aabb::{self, AabbHeader, FileTransferReply},
        duid::Duid,
    },
};
use tokio::task::JoinHandle;

pub const PEER_CHANNEL: u8 = 1;

pub fn test_config() -> TransportConfig {
    TransportConfig {
        retransmit_timeout: Duration::from_millis(100),
        driver_tick: Duration::from_millis(10),
        ..TransportConfig::default()
    }
}

fn local(port: u16) -> SocketAddr {
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Bring up a peer `Session`/`Driver` pair bound to an ephemeral loopback
/// port and return its address plus the session handle (for a responder
/// loop to read/write its channels) and the driver's join handle.
pub async fn spawn_peer(duid: Duid, cfg: &TransportConfig) -> Result<(SocketAddr, Arc<Session>, JoinHandle<()>)> {
    let session = Arc::new(Session::new(duid, cfg.retransmit_timeout, cfg.max_in_flight, cfg.chunk_size));
    let driver = Driver::bind(local(0), Arc::clone(&session), cfg.driver_tick).await?;
    let addr = driver.local_addr()?;
    let handle = tokio::spawn(driver.run());
    Ok((addr, session, handle))
}

/// Runs on the peer side: reads one `AABB` request off `PEER_CHANNEL`,
/// ignores its contents, and replies with a fixed [`FileTransferReply`].
pub async fn respond_once_with(session: Arc<Session>, reply: FileTransferReply) -> Result<()> {
    let ch = session.channel(PEER_CHANNEL).expect("application channel");

    let header_bytes = ch.read(aabb::HEADER_LEN).await?;
    let header = AabbHeader::from_bytes(&header_bytes)?;
    let _body = ch.read(header.length as usize + aabb::CRC_LEN).await?;

    let reply_header = AabbHeader { frametype: header.frametype, serial: header.serial, pos: 0, length: 0 };
    let frame = aabb::build_frame(reply_header, &[reply as u8]);
    ch.write(&frame, true).await?;
    Ok(())
}
