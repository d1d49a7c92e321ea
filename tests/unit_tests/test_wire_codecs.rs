// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Black-box wire codec coverage run from the `unit` test binary, exercising
//! the public API the way an external caller would (as opposed to the
//! colocated `#[cfg(test)]` modules inside `src/`, which can reach private
//! helpers).

use std::net::Ipv4Addr;

use bytes::Bytes;
use pppp_fleet_transport::wire::{
    aabb::{self, AabbHeader, FileTransferReply},
    duid::Duid,
    host::HostAddr,
    packet::Packet,
    xzyh::{self, XzyhHeader},
};

#[test]
fn p2p_rdy_round_trips_through_the_wire() {
    let duid = Duid([0x42; 20]);
    let pkt = Packet::P2pRdy { duid };
    let encoded = pkt.encode();
    let (decoded, consumed) = Packet::parse(&encoded).expect("decode");
    assert_eq!(consumed, encoded.len());
    assert_eq!(decoded, pkt);
}

#[test]
fn drw_ack_carries_multiple_selective_acks() {
    let pkt = Packet::DrwAck { channel: 2, acks: vec![5, 9, 10, 65535] };
    let encoded = pkt.encode();
    let (decoded, _) = Packet::parse(&encoded).expect("decode");
    match decoded {
        Packet::DrwAck { channel, acks } => {
            assert_eq!(channel, 2);
            assert_eq!(acks, vec![5, 9, 10, 65535]);
        },
        other => panic!("unexpected packet {other:?}"),
    }
}

#[test]
fn host_addr_survives_hello_ack_round_trip() {
    let host = HostAddr { ip: Ipv4Addr::new(203, 0, 113, 7), port: 32100 };
    let pkt = Packet::HelloAck { host };
    let (decoded, _) = Packet::parse(&pkt.encode()).expect("decode");
    assert_eq!(decoded, Packet::HelloAck { host });
}

#[test]
fn xzyh_frame_preserves_reserved_bytes_bit_exact() {
    let header = XzyhHeader {
        command: 0x0102,
        length: 0,
        channel: 4,
        unk0: 0xaa,
        unk1: 0xbb,
        sign_code: 0xcc,
        unk3: 0xdd,
        dev_type: 0xee,
    };
    let frame = xzyh::build_frame(header, b"payload");
    let decoded = XzyhHeader::from_bytes(&frame[..xzyh::HEADER_LEN]).expect("decode header");
    assert_eq!(decoded.unk0, 0xaa);
    assert_eq!(decoded.unk1, 0xbb);
    assert_eq!(decoded.sign_code, 0xcc);
    assert_eq!(decoded.unk3, 0xdd);
    assert_eq!(decoded.dev_type, 0xee);
    assert_eq!(decoded.length, 7);
    assert_eq!(&frame[xzyh::HEADER_LEN..], b"payload");
}

#[test]
fn aabb_round_trip_recovers_payload_and_rejects_corruption() {
    let header = AabbHeader { frametype: 3, serial: 1, pos: 0, length: 0 };
    let payload = b"gcode-chunk-bytes";
    let frame = aabb::build_frame(header, payload);

    let body = &frame[aabb::HEADER_LEN..aabb::HEADER_LEN + payload.len()];
    let crc: [u8; aabb::CRC_LEN] =
        frame[aabb::HEADER_LEN + payload.len()..].try_into().expect("2 bytes");
    assert!(aabb::verify_crc(body, crc).is_ok());

    let mut flipped = body.to_vec();
    flipped[0] ^= 0x01;
    assert!(aabb::verify_crc(&flipped, crc).is_err());

    let mut flipped_crc = crc;
    flipped_crc[1] ^= 0x01;
    assert!(aabb::verify_crc(body, flipped_crc).is_err());
}

#[test]
fn file_transfer_reply_symbolic_names_match_known_codes() {
    assert_eq!(FileTransferReply::from_u8(0x00).unwrap().name(), "OK");
    assert_eq!(FileTransferReply::from_u8(0x03).unwrap().name(), "NOT_FOUND");
    assert!(FileTransferReply::from_u8(0x7f).is_none());
}

#[test]
fn unknown_type_tag_decodes_to_the_catch_all_variant() {
    let raw: Vec<u8> = {
        let mut v = Vec::new();
        v.extend_from_slice(&0x9999u16.to_be_bytes());
        v.extend_from_slice(&3u16.to_be_bytes());
        v.extend_from_slice(b"abc");
        v
    };
    let (pkt, consumed) = Packet::parse(&raw).expect("decode");
    assert_eq!(consumed, raw.len());
    assert_eq!(pkt, Packet::Unknown { tag: 0x9999, payload: Bytes::from_static(b"abc") });
}
