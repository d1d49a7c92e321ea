// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `XZYH` framed application payload, carried inside a channel's reliable
//! byte stream. 16-byte header, bit-exact reserved bytes.

use bytes::{Bytes, BytesMut};
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16, U32};

use crate::error::TransportError;

pub const MAGIC: [u8; 4] = *b"XZYH";
pub const HEADER_LEN: usize = 16;

/// Wire layout of the 16-byte `XZYH` header. Field order and the five
/// reserved/typed trailing bytes must be preserved bit-exact.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct XzyhWire {
    magic: [u8; 4],
    command: U16<BigEndian>,
    length: U32<BigEndian>,
    channel: u8,
    unk0: u8,
    unk1: u8,
    sign_code: u8,
    unk3: u8,
    dev_type: u8,
}

/// Decoded `XZYH` header. Reserved fields default to zero unless the caller
/// supplies values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XzyhHeader {
    pub command: u16,
    pub length: u32,
    pub channel: u8,
    pub unk0: u8,
    pub unk1: u8,
    pub sign_code: u8,
    pub unk3: u8,
    pub dev_type: u8,
}

impl XzyhHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let wire = XzyhWire {
            magic: MAGIC,
            command: U16::new(self.command),
            length: U32::new(self.length),
            channel: self.channel,
            unk0: self.unk0,
            unk1: self.unk1,
            sign_code: self.sign_code,
            unk3: self.unk3,
            dev_type: self.dev_type,
        };
        wire.as_bytes().try_into().expect("XzyhWire is HEADER_LEN bytes")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        let wire = XzyhWire::read_from_bytes(bytes)
            .map_err(|_| TransportError::Decode("XZYH: short header".into()))?;
        if wire.magic != MAGIC {
            return Err(TransportError::Decode(format!(
                "XZYH: bad magic {:?}",
                wire.magic
            )));
        }
        Ok(Self {
            command: wire.command.get(),
            length: wire.length.get(),
            channel: wire.channel,
            unk0: wire.unk0,
            unk1: wire.unk1,
            sign_code: wire.sign_code,
            unk3: wire.unk3,
            dev_type: wire.dev_type,
        })
    }
}

/// Build a complete `XZYH` frame (header + payload) ready to hand to
/// `Channel::write`.
pub fn build_frame(header: XzyhHeader, payload: &[u8]) -> BytesMut {
    let mut header = header;
    header.length = payload.len() as u32;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// A fully decoded `XZYH` frame read back off a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XzyhFrame {
    pub header: XzyhHeader,
    pub payload: Bytes,
}
