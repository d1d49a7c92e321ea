// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::{Ipv4Addr, SocketAddr}, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// LAN discovery/session port (`SO_BROADCAST` on 255.255.255.255).
pub const PPPP_LAN_PORT: u16 = 32108;
/// WAN relay port.
pub const PPPP_WAN_PORT: u16 = 32100;

/// The LAN discovery candidate address: `255.255.255.255:32108`.
/// `PpppConnection::connect_any` recognizes this address in its candidate
/// list and enables `SO_BROADCAST` on the socket before sending to it.
pub fn lan_broadcast_candidate() -> SocketAddr {
    SocketAddr::new(Ipv4Addr::BROADCAST.into(), PPPP_LAN_PORT)
}

/// Runtime parameters for the channel reliability layer and the I/O driver.
///
/// PPPP has no on-wire negotiation of these values: they are pure
/// client-side policy, so every field has a sensible default and a config
/// file is optional.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Per-segment retransmit timeout. Default: 500 ms.
    #[serde(with = "duration_ms", rename = "RetransmitTimeoutMs")]
    pub retransmit_timeout: Duration,

    /// Max unacknowledged segments in flight per channel. Default: 64.
    #[serde(rename = "MaxInFlight")]
    pub max_in_flight: usize,

    /// Chunk size used by `Channel::write` to split payloads. Default: 1024 B.
    #[serde(rename = "ChunkSize")]
    pub chunk_size: usize,

    /// Driver `recv` timeout per loop iteration. Default: 50 ms.
    #[serde(with = "duration_ms", rename = "DriverTickMs")]
    pub driver_tick: Duration,

    /// LAN session port.
    #[serde(rename = "LanPort")]
    pub lan_port: u16,

    /// WAN session port.
    #[serde(rename = "WanPort")]
    pub wan_port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: Duration::from_millis(500),
            max_in_flight: 64,
            chunk_size: 1024,
            driver_tick: Duration::from_millis(50),
            lan_port: PPPP_LAN_PORT,
            wan_port: PPPP_WAN_PORT,
        }
    }
}

impl TransportConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {path:?}"))?;
        Ok(cfg)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
