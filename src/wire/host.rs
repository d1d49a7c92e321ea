// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::Ipv4Addr;

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16};

/// `AF_INET` as used on the wire by `HELLO_ACK` / `P2P_RDY_ACK` /
/// `SESSION_READY` `Host` records.
pub const AFAM_INET: u16 = 2;

/// Wire-format `(afam: u16, port: u16be, addr: 4 bytes)` host record.
///
/// Zero-copy over the wire representation via `zerocopy`-derived field
/// structs.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct HostAddrWire {
    afam: U16<BigEndian>,
    port: U16<BigEndian>,
    addr: [u8; 4],
}

/// The peer address last observed as the source of an inbound datagram.
/// IPv4-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl HostAddr {
    pub const WIRE_LEN: usize = 8;

    pub fn to_wire(self) -> [u8; Self::WIRE_LEN] {
        let wire = HostAddrWire {
            afam: U16::new(AFAM_INET),
            port: U16::new(self.port),
            addr: self.ip.octets(),
        };
        wire.as_bytes().try_into().expect("HostAddrWire is WIRE_LEN bytes")
    }

    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        let wire = HostAddrWire::read_from_bytes(bytes).ok()?;
        Some(Self {
            ip: Ipv4Addr::from(wire.addr),
            port: wire.port.get(),
        })
    }
}
