// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed errors surfaced across the public API.
//!
//! Wire-decode failures and session-teardown conditions are represented as
//! a small [`thiserror`]-derived enum instead of collapsing them into a
//! string, so callers can match on the failure kind. Higher-level plumbing
//! (I/O, config loading) still composes these through `anyhow::Result`.

use thiserror::Error;

/// Errors that can be surfaced to a caller of the channel / session / façade
/// layers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Unknown two-byte type tag, or a datagram too short for its declared
    /// length. Logged and dropped by the driver; only surfaced to callers
    /// when decoding an application frame explicitly (e.g. `XZYH`/`AABB`).
    #[error("failed to decode packet: {0}")]
    Decode(String),

    /// `AABB` payload CRC-16 did not match the trailing two bytes.
    #[error("AABB payload failed CRC-16 check")]
    Corrupt,

    /// An `AABB` reply payload was not exactly one byte.
    #[error("unexpected AABB reply length: {len} bytes (want 1)")]
    UnexpectedReply { len: usize },

    /// `AABB` reply byte was not `FileTransferReply::Ok` while `check` was
    /// enabled.
    #[error("AABB request failed: {name} (0x{code:02x})")]
    Protocol { code: u8, name: &'static str },

    /// The session has transitioned to `Closing`: either `CLOSE` was
    /// received, the driver hit a fatal codec error, or `stop()` was called.
    #[error("session closed")]
    Closed,

    /// No candidate host answered `P2P_RDY` within the connect attempt.
    #[error("no candidate host for device responded to P2P_RDY")]
    ConnectFailed,

    /// A channel index outside `0..NUM_CHANNELS` was requested.
    #[error("invalid channel index: {0}")]
    InvalidChannel(u8),
}

pub type Result<T> = std::result::Result<T, TransportError>;
