// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Black-box session state-machine coverage, run from the `unit` test
//! binary against the crate's public API.

use std::{net::{Ipv4Addr, SocketAddr}, time::Duration};

use pppp_fleet_transport::{
    session::{Session, SessionState},
    wire::{duid::Duid, packet::Packet},
};

fn addr(last: u8, port: u16) -> SocketAddr {
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), port)
}

fn session() -> Session {
    Session::new(Duid([3; 20]), Duration::from_millis(500), 64, 1024)
}

#[tokio::test]
async fn hole_punch_then_ready_matches_scenario_four() {
    let s = session();
    assert_eq!(s.state().await, SessionState::New);

    let peer = addr(1, 32108);
    let replies = s.handle(peer, Packet::PunchPkt).await;
    assert_eq!(replies, vec![Packet::Close, Packet::P2pRdy { duid: s.local_duid }]);
    assert_eq!(s.state().await, SessionState::New);

    let peer_duid = Duid([9; 20]);
    let replies = s.handle(peer, Packet::P2pRdy { duid: peer_duid }).await;
    assert_eq!(s.state().await, SessionState::Ready);
    assert_eq!(replies.len(), 1);
    assert!(matches!(
        &replies[0],
        Packet::P2pRdyAck { duid, host } if *duid == s.local_duid && host.ip == Ipv4Addr::new(10, 0, 0, 1)
    ));
}

#[tokio::test]
async fn peer_addr_tracks_the_most_recent_datagram_source() {
    let s = session();
    s.handle(addr(1, 32108), Packet::Hello).await;
    assert_eq!(*s.peer_addr.lock().await, Some(addr(1, 32108)));

    // A NAT-punched peer can change port transparently; the next inbound
    // datagram's source replaces the tracked address regardless of type.
    s.handle(addr(1, 40000), Packet::Alive).await;
    assert_eq!(*s.peer_addr.lock().await, Some(addr(1, 40000)));
}

#[tokio::test]
async fn dev_lgn_crc_gets_dev_lgn_ack_crc_with_same_payload() {
    use bytes::Bytes;

    let s = session();
    let payload = Bytes::from_static(b"crc-bytes");
    let replies = s
        .handle(addr(1, 32108), Packet::DevLgnCrc { payload: payload.clone() })
        .await;
    assert_eq!(replies, vec![Packet::DevLgnAckCrc { payload }]);
}

#[tokio::test]
async fn report_session_ready_produces_no_reply() {
    let s = session();
    let replies = s.handle(addr(1, 32108), Packet::ReportSessionReady).await;
    assert!(replies.is_empty(), "REPORT_SESSION_READY must not be acknowledged");
}
