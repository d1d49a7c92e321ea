// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Control-packet wire codec.
//!
//! Every datagram is exactly one packet: a 2-byte big-endian type tag, a
//! 2-byte big-endian length of the remainder, then that many bytes of
//! type-specific fields. `Packet` is a tagged variant over the recognized
//! types; [`Packet::parse`] is total over the framing but returns
//! `Packet::Unknown` for an unrecognized tag so the session can
//! log-and-ignore it without a panic, and callers get an exhaustive,
//! compiler-checked match over the known types.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::{
    error::TransportError,
    wire::{duid::Duid, host::HostAddr},
};

pub const HEADER_LEN: usize = 4;

macro_rules! tags {
    ($($name:ident = $val:expr),* $(,)?) => {
        $(pub const $name: u16 = $val;)*
    };
}

tags! {
    TAG_HELLO = 0x0001,
    TAG_HELLO_ACK = 0x0002,
    TAG_P2P_RDY = 0x0003,
    TAG_P2P_RDY_ACK = 0x0004,
    TAG_PUNCH_PKT = 0x0005,
    TAG_REPORT_SESSION_READY = 0x0006,
    TAG_SESSION_READY = 0x0007,
    TAG_ALIVE = 0x0008,
    TAG_ALIVE_ACK = 0x0009,
    TAG_DRW = 0x000a,
    TAG_DRW_ACK = 0x000b,
    TAG_DEV_LGN_CRC = 0x000c,
    TAG_DEV_LGN_ACK_CRC = 0x000d,
    TAG_CLOSE = 0x000e,
}

/// Fields of an observed-but-never-sent `SESSION_READY` packet. Devices
/// construct this as a reply to `REPORT_SESSION_READY` but never transmit
/// it in practice; intent is unclear, so this crate only decodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReadyFields {
    pub duid: Duid,
    pub handle: i32,
    pub max_handles: u8,
    pub active_handles: u8,
    pub startup_ticks: u16,
    pub b1: u8,
    pub b2: u8,
    pub b3: u8,
    pub b4: u8,
    pub addr_local: HostAddr,
    pub addr_wan: HostAddr,
    pub addr_relay: HostAddr,
}

/// The recognized PPPP control-packet universe, plus a catch-all for
/// unrecognized type tags.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Hello,
    HelloAck { host: HostAddr },
    P2pRdy { duid: Duid },
    P2pRdyAck { duid: Duid, host: HostAddr },
    PunchPkt,
    ReportSessionReady,
    SessionReady(SessionReadyFields),
    Alive,
    AliveAck,
    Drw { channel: u8, index: u16, data: Bytes },
    DrwAck { channel: u8, acks: Vec<u16> },
    DevLgnCrc { payload: Bytes },
    DevLgnAckCrc { payload: Bytes },
    Close,
    /// An unrecognized type tag. The session logs this at `debug` and
    /// otherwise ignores it.
    Unknown { tag: u16, payload: Bytes },
}

fn frame(tag: u16, body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(&tag.to_be_bytes());
    buf.extend_from_slice(&(body.len() as u16).to_be_bytes());
    buf.extend_from_slice(body);
    buf
}

impl Packet {
    /// Encode this packet into a `sendto`-ready datagram.
    pub fn encode(&self) -> BytesMut {
        match self {
            Packet::Hello => frame(TAG_HELLO, &[]),
            Packet::HelloAck { host } => frame(TAG_HELLO_ACK, &host.to_wire()),
            Packet::P2pRdy { duid } => frame(TAG_P2P_RDY, duid.as_bytes()),
            Packet::P2pRdyAck { duid, host } => {
                let mut body = Vec::with_capacity(Duid::LEN + HostAddr::WIRE_LEN);
                body.extend_from_slice(duid.as_bytes());
                body.extend_from_slice(&host.to_wire());
                frame(TAG_P2P_RDY_ACK, &body)
            },
            Packet::PunchPkt => frame(TAG_PUNCH_PKT, &[]),
            Packet::ReportSessionReady => frame(TAG_REPORT_SESSION_READY, &[]),
            Packet::SessionReady(f) => frame(TAG_SESSION_READY, &encode_session_ready(f)),
            Packet::Alive => frame(TAG_ALIVE, &[]),
            Packet::AliveAck => frame(TAG_ALIVE_ACK, &[]),
            Packet::Drw { channel, index, data } => {
                let mut body = Vec::with_capacity(3 + data.len());
                body.push(*channel);
                body.extend_from_slice(&index.to_be_bytes());
                body.extend_from_slice(data);
                frame(TAG_DRW, &body)
            },
            Packet::DrwAck { channel, acks } => {
                let mut body = Vec::with_capacity(2 + 2 * acks.len());
                body.push(*channel);
                body.push(acks.len() as u8);
                for ack in acks {
                    body.extend_from_slice(&ack.to_be_bytes());
                }
                frame(TAG_DRW_ACK, &body)
            },
            Packet::DevLgnCrc { payload } => frame(TAG_DEV_LGN_CRC, payload),
            Packet::DevLgnAckCrc { payload } => frame(TAG_DEV_LGN_ACK_CRC, payload),
            Packet::Close => frame(TAG_CLOSE, &[]),
            Packet::Unknown { tag, payload } => frame(*tag, payload),
        }
    }

    /// Decode one packet from the start of `bytes`. Returns the packet and
    /// the number of bytes consumed. Parsing is total for the framing:
    /// unrecognized tags yield `Packet::Unknown` rather than an error, but
    /// a truncated header/length field is a hard decode error.
    pub fn parse(bytes: &[u8]) -> Result<(Packet, usize), TransportError> {
        if bytes.len() < HEADER_LEN {
            return Err(TransportError::Decode(format!(
                "datagram too short for header: {} bytes",
                bytes.len()
            )));
        }
        let tag = u16::from_be_bytes([bytes[0], bytes[1]]);
        let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        let total = HEADER_LEN + len;
        if bytes.len() < total {
            return Err(TransportError::Decode(format!(
                "datagram declares {len} body bytes but only {} available",
                bytes.len() - HEADER_LEN
            )));
        }
        let body = &bytes[HEADER_LEN..total];

        let pkt = match tag {
            TAG_HELLO => Packet::Hello,
            TAG_HELLO_ACK => {
                let host = HostAddr::from_wire(body)
                    .ok_or_else(|| TransportError::Decode("HELLO_ACK: bad host".into()))?;
                Packet::HelloAck { host }
            },
            TAG_P2P_RDY => {
                let duid = Duid::from_slice(body)
                    .ok_or_else(|| TransportError::Decode("P2P_RDY: bad duid".into()))?;
                Packet::P2pRdy { duid }
            },
            TAG_P2P_RDY_ACK => {
                if body.len() < Duid::LEN + HostAddr::WIRE_LEN {
                    return Err(TransportError::Decode("P2P_RDY_ACK: short body".into()));
                }
                let duid = Duid::from_slice(&body[..Duid::LEN])
                    .ok_or_else(|| TransportError::Decode("P2P_RDY_ACK: bad duid".into()))?;
                let host = HostAddr::from_wire(&body[Duid::LEN..])
                    .ok_or_else(|| TransportError::Decode("P2P_RDY_ACK: bad host".into()))?;
                Packet::P2pRdyAck { duid, host }
            },
            TAG_PUNCH_PKT => Packet::PunchPkt,
            TAG_REPORT_SESSION_READY => Packet::ReportSessionReady,
            TAG_SESSION_READY => Packet::SessionReady(decode_session_ready(body)?),
            TAG_ALIVE => Packet::Alive,
            TAG_ALIVE_ACK => Packet::AliveAck,
            TAG_DRW => {
                if body.len() < 3 {
                    return Err(TransportError::Decode("DRW: short body".into()));
                }
                let channel = body[0];
                let index = u16::from_be_bytes([body[1], body[2]]);
                let data = Bytes::copy_from_slice(&body[3..]);
                Packet::Drw { channel, index, data }
            },
            TAG_DRW_ACK => {
                if body.len() < 2 {
                    return Err(TransportError::Decode("DRW_ACK: short body".into()));
                }
                let channel = body[0];
                let count = body[1] as usize;
                if body.len() < 2 + 2 * count {
                    return Err(TransportError::Decode("DRW_ACK: ack count overruns body".into()));
                }
                let mut acks = Vec::with_capacity(count);
                for i in 0..count {
                    let off = 2 + 2 * i;
                    acks.push(u16::from_be_bytes([body[off], body[off + 1]]));
                }
                Packet::DrwAck { channel, acks }
            },
            TAG_DEV_LGN_CRC => Packet::DevLgnCrc { payload: Bytes::copy_from_slice(body) },
            TAG_DEV_LGN_ACK_CRC => {
                Packet::DevLgnAckCrc { payload: Bytes::copy_from_slice(body) }
            },
            TAG_CLOSE => Packet::Close,
            other => {
                debug!("unknown PPPP packet tag 0x{other:04x} ({len} bytes), ignoring");
                Packet::Unknown { tag: other, payload: Bytes::copy_from_slice(body) }
            },
        };

        Ok((pkt, total))
    }
}

fn encode_session_ready(f: &SessionReadyFields) -> Vec<u8> {
    let mut body = Vec::with_capacity(20 + 4 + 4 + 4 + 24);
    body.extend_from_slice(f.duid.as_bytes());
    body.extend_from_slice(&f.handle.to_be_bytes());
    body.push(f.max_handles);
    body.push(f.active_handles);
    body.extend_from_slice(&f.startup_ticks.to_be_bytes());
    body.push(f.b1);
    body.push(f.b2);
    body.push(f.b3);
    body.push(f.b4);
    body.extend_from_slice(&f.addr_local.to_wire());
    body.extend_from_slice(&f.addr_wan.to_wire());
    body.extend_from_slice(&f.addr_relay.to_wire());
    body
}

fn decode_session_ready(body: &[u8]) -> Result<SessionReadyFields, TransportError> {
    const FIXED_LEN: usize = 20 + 4 + 1 + 1 + 2 + 4 + 8 * 3;
    if body.len() < FIXED_LEN {
        return Err(TransportError::Decode("SESSION_READY: short body".into()));
    }
    let duid = Duid::from_slice(&body[0..20])
        .ok_or_else(|| TransportError::Decode("SESSION_READY: bad duid".into()))?;
    let handle = i32::from_be_bytes(body[20..24].try_into().expect("4 bytes"));
    let max_handles = body[24];
    let active_handles = body[25];
    let startup_ticks = u16::from_be_bytes([body[26], body[27]]);
    let b1 = body[28];
    let b2 = body[29];
    let b3 = body[30];
    let b4 = body[31];
    let addr_local = HostAddr::from_wire(&body[32..40])
        .ok_or_else(|| TransportError::Decode("SESSION_READY: bad addr_local".into()))?;
    let addr_wan = HostAddr::from_wire(&body[40..48])
        .ok_or_else(|| TransportError::Decode("SESSION_READY: bad addr_wan".into()))?;
    let addr_relay = HostAddr::from_wire(&body[48..56])
        .ok_or_else(|| TransportError::Decode("SESSION_READY: bad addr_relay".into()))?;
    Ok(SessionReadyFields {
        duid,
        handle,
        max_handles,
        active_handles,
        startup_ticks,
        b1,
        b2,
        b3,
        b4,
        addr_local,
        addr_wan,
        addr_relay,
    })
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn duid(seed: u8) -> Duid {
        Duid([seed; 20])
    }

    fn host(seed: u8) -> HostAddr {
        HostAddr { ip: Ipv4Addr::new(10, 0, 0, seed), port: 32108 }
    }

    #[test]
    fn hello_round_trips() {
        let encoded = Packet::Hello.encode();
        let (pkt, consumed) = Packet::parse(&encoded).expect("decode");
        assert_eq!(consumed, encoded.len());
        assert_eq!(pkt, Packet::Hello);
    }

    #[test]
    fn hello_ack_round_trips() {
        let pkt = Packet::HelloAck { host: host(1) };
        let encoded = pkt.encode();
        let (decoded, consumed) = Packet::parse(&encoded).expect("decode");
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn p2p_rdy_ack_round_trips() {
        let pkt = Packet::P2pRdyAck { duid: duid(7), host: host(2) };
        let encoded = pkt.encode();
        let (decoded, _) = Packet::parse(&encoded).expect("decode");
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn drw_round_trips_with_payload() {
        let pkt = Packet::Drw { channel: 3, index: 65535, data: Bytes::from_static(b"hello") };
        let encoded = pkt.encode();
        let (decoded, consumed) = Packet::parse(&encoded).expect("decode");
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn drw_ack_round_trips_with_multiple_acks() {
        let pkt = Packet::DrwAck { channel: 1, acks: vec![0, 1, 2, 65535] };
        let encoded = pkt.encode();
        let (decoded, _) = Packet::parse(&encoded).expect("decode");
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn session_ready_round_trips() {
        let pkt = Packet::SessionReady(SessionReadyFields {
            duid: duid(9),
            handle: -3,
            max_handles: 5,
            active_handles: 1,
            startup_ticks: 0,
            b1: 1,
            b2: 0,
            b3: 1,
            b4: 0,
            addr_local: host(0),
            addr_wan: host(0),
            addr_relay: host(0),
        });
        let encoded = pkt.encode();
        let (decoded, _) = Packet::parse(&encoded).expect("decode");
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn unknown_tag_is_ignored_not_fatal() {
        let raw = frame(0xdead, b"stuff");
        let (pkt, consumed) = Packet::parse(&raw).expect("decode");
        assert_eq!(consumed, raw.len());
        assert_eq!(pkt, Packet::Unknown { tag: 0xdead, payload: Bytes::from_static(b"stuff") });
    }

    #[test]
    fn truncated_header_is_decode_error() {
        let err = Packet::parse(&[0x00]).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn truncated_body_is_decode_error() {
        let raw = frame(TAG_HELLO, &[0u8; 10]);
        let err = Packet::parse(&raw[..raw.len() - 1]).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn close_and_alive_are_zero_length() {
        for pkt in [Packet::Close, Packet::Alive, Packet::AliveAck, Packet::PunchPkt] {
            let encoded = pkt.encode();
            assert_eq!(encoded.len(), HEADER_LEN);
        }
    }
}
