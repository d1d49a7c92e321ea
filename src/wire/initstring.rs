// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Device-ID "initstring" decoding.
//!
//! The authenticated HTTPS enrollment flow that produces these strings is
//! out of scope; the transport only consumes the decoded candidate host
//! list. The on-wire shape decoded here is a base64 blob of 6-byte
//! `(ipv4: 4 bytes, port: u16be)` candidate records, one per host. Decoding
//! never touches the network; it is a pure function over an opaque string
//! whose *output shape* (a candidate list) is what the transport depends
//! on.

use base64::{Engine, engine::general_purpose::STANDARD};
use std::net::Ipv4Addr;

use crate::error::TransportError;

const RECORD_LEN: usize = 6;

/// Decode a printer bootstrap "initstring" into an ordered candidate peer
/// list. Candidates are tried in order by `Pool::connect_any`.
pub fn decode_initstring(s: &str) -> Result<Vec<(Ipv4Addr, u16)>, TransportError> {
    let raw = STANDARD
        .decode(s.trim())
        .map_err(|e| TransportError::Decode(format!("initstring: bad base64: {e}")))?;

    if raw.len() % RECORD_LEN != 0 {
        return Err(TransportError::Decode(format!(
            "initstring: {} bytes is not a multiple of {RECORD_LEN}",
            raw.len()
        )));
    }

    Ok(raw
        .chunks_exact(RECORD_LEN)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            (ip, port)
        })
        .collect())
}

/// Encode a candidate list back into an initstring. Mainly useful for tests
/// and for tooling that synthesizes fixtures.
pub fn encode_initstring(hosts: &[(Ipv4Addr, u16)]) -> String {
    let mut raw = Vec::with_capacity(hosts.len() * RECORD_LEN);
    for (ip, port) in hosts {
        raw.extend_from_slice(&ip.octets());
        raw.extend_from_slice(&port.to_be_bytes());
    }
    STANDARD.encode(raw)
}
