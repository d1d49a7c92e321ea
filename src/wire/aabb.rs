// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `AABB` framed application payload: a request/reply codec with a
//! payload CRC-16, carried inside a channel's reliable byte stream.
//!
//! A frame is a fixed 12-byte header followed by `length` payload bytes and
//! a trailing 2-byte CRC, with no separate magic prefix at the channel
//! level; the frame identity lives in the header's `frametype` field
//! instead. See DESIGN.md for the reconciliation against an earlier,
//! magic-prefixed reading of this layout.

use crc::{Crc, CRC_16_IBM_3740};
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16, U32};

use crate::error::TransportError;

pub const HEADER_LEN: usize = 12;
pub const CRC_LEN: usize = 2;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF), matching the dialect used
/// by the adjacent embedded framing protocol this codec was modeled on (see
/// DESIGN.md).
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct AabbWire {
    frametype: U16<BigEndian>,
    serial: U16<BigEndian>,
    pos: U32<BigEndian>,
    length: U16<BigEndian>,
    reserved: U16<BigEndian>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AabbHeader {
    pub frametype: u16,
    pub serial: u16,
    pub pos: u32,
    pub length: u16,
}

impl AabbHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let wire = AabbWire {
            frametype: U16::new(self.frametype),
            serial: U16::new(self.serial),
            pos: U32::new(self.pos),
            length: U16::new(self.length),
            reserved: U16::new(0),
        };
        wire.as_bytes().try_into().expect("AabbWire is HEADER_LEN bytes")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        let wire = AabbWire::read_from_bytes(bytes)
            .map_err(|_| TransportError::Decode("AABB: short header".into()))?;
        Ok(Self {
            frametype: wire.frametype.get(),
            serial: wire.serial.get(),
            pos: wire.pos.get(),
            length: wire.length.get(),
        })
    }
}

/// Build a complete `AABB` frame: header, payload, then CRC-16 over the
/// payload.
pub fn build_frame(mut header: AabbHeader, payload: &[u8]) -> Vec<u8> {
    header.length = payload.len() as u16;
    let crc = CRC16.checksum(payload);
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// Verify a payload against its trailing CRC-16, as `recv_aabb` does before
/// returning control to the caller.
pub fn verify_crc(payload: &[u8], crc_bytes: [u8; CRC_LEN]) -> Result<(), TransportError> {
    let expected = u16::from_be_bytes(crc_bytes);
    let actual = CRC16.checksum(payload);
    if expected != actual {
        return Err(TransportError::Corrupt);
    }
    Ok(())
}

/// The single-byte reply payload of an `AABB` file-transfer reply. Only
/// `Ok` is load-bearing on the wire; other values are surfaced with their
/// raw code when `check` rejects them, so the remaining variants here are
/// representative status codes for a file-transfer exchange rather than an
/// exhaustive, source-confirmed set (see DESIGN.md).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferReply {
    Ok = 0x00,
    Busy = 0x01,
    IllegalOp = 0x02,
    NotFound = 0x03,
    OutOfMemory = 0x04,
    ChecksumMismatch = 0x05,
}

impl FileTransferReply {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::Ok,
            0x01 => Self::Busy,
            0x02 => Self::IllegalOp,
            0x03 => Self::NotFound,
            0x04 => Self::OutOfMemory,
            0x05 => Self::ChecksumMismatch,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Busy => "BUSY",
            Self::IllegalOp => "ILLEGAL_OP",
            Self::NotFound => "NOT_FOUND",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
        }
    }
}
