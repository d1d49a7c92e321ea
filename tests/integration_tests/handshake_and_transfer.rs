// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use pppp_fleet_transport::{
    client::PpppConnection,
    error::TransportError,
    session::SessionState,
    wire::{aabb::{AabbHeader, FileTransferReply}, duid::Duid},
};

use crate::integration_tests::common::{self, PEER_CHANNEL};

#[tokio::test]
async fn connect_any_reaches_ready_against_a_responding_peer() -> Result<()> {
    let cfg = common::test_config();
    let (peer_addr, _peer_session, peer_handle) = common::spawn_peer(Duid([1; 20]), &cfg).await?;

    let client = PpppConnection::connect_any(Duid([2; 20]), &[peer_addr], &cfg).await?;
    assert_eq!(client.state().await, SessionState::Ready);

    client.stop();
    peer_handle.abort();
    Ok(())
}

#[tokio::test]
async fn aabb_request_round_trips_an_ok_reply() -> Result<()> {
    let cfg = common::test_config();
    let (peer_addr, peer_session, peer_handle) = common::spawn_peer(Duid([3; 20]), &cfg).await?;

    let client = PpppConnection::connect_any(Duid([4; 20]), &[peer_addr], &cfg).await?;

    let responder = tokio::spawn(common::respond_once_with(peer_session, FileTransferReply::Ok));

    let header = AabbHeader { frametype: 7, serial: 1, pos: 0, length: 0 };
    let reply = client.aabb_request(PEER_CHANNEL, header, b"upload-header-line", true).await?;
    assert_eq!(&reply[..], &[FileTransferReply::Ok as u8]);

    responder.await.expect("responder task panicked")?;

    client.stop();
    peer_handle.abort();
    Ok(())
}

#[tokio::test]
async fn aabb_request_with_check_surfaces_protocol_error_on_non_ok_reply() -> Result<()> {
    let cfg = common::test_config();
    let (peer_addr, peer_session, peer_handle) = common::spawn_peer(Duid([5; 20]), &cfg).await?;

    let client = PpppConnection::connect_any(Duid([6; 20]), &[peer_addr], &cfg).await?;

    let responder = tokio::spawn(common::respond_once_with(peer_session, FileTransferReply::NotFound));

    let header = AabbHeader { frametype: 7, serial: 1, pos: 0, length: 0 };
    let err = client
        .aabb_request(PEER_CHANNEL, header, b"upload-header-line", true)
        .await
        .expect_err("non-OK reply with check=true must fail");
    match err {
        TransportError::Protocol { code, name } => {
            assert_eq!(code, FileTransferReply::NotFound as u8);
            assert_eq!(name, "NOT_FOUND");
        },
        other => panic!("unexpected error {other:?}"),
    }

    responder.await.expect("responder task panicked")?;

    client.stop();
    peer_handle.abort();
    Ok(())
}

#[tokio::test]
async fn close_mid_read_unblocks_the_caller_with_closed() -> Result<()> {
    let cfg = common::test_config();
    let (peer_addr, peer_session, peer_handle) = common::spawn_peer(Duid([7; 20]), &cfg).await?;

    let client = PpppConnection::connect_any(Duid([8; 20]), &[peer_addr], &cfg).await?;

    // The peer writes fewer bytes than a complete XZYH header, so the
    // client's recv_xzyh blocks waiting for the rest.
    {
        let ch = peer_session.channel(PEER_CHANNEL).expect("application channel");
        ch.write(&[0x41u8; 10], false).await?;
    }

    let reader = tokio::spawn(async move { client.recv_xzyh(PEER_CHANNEL).await });

    // Give the 10 bytes a chance to arrive before closing.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Tear down the peer; its driver emits a terminal CLOSE which the
    // client's session observes and propagates to every blocked reader.
    peer_session.begin_close().await;
    tokio::time::timeout(Duration::from_secs(2), peer_handle)
        .await
        .expect("peer driver did not emit terminal CLOSE in time")
        .expect("peer driver task panicked");

    let result = tokio::time::timeout(Duration::from_secs(2), reader)
        .await
        .expect("read did not unblock after CLOSE")
        .expect("join");
    assert!(matches!(result, Err(TransportError::Closed)));

    Ok(())
}
