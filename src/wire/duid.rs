// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

/// Opaque 20-byte PPPP device identifier.
///
/// Newtyped over `[u8; 20]` rather than passed as a bare slice everywhere, so
/// call sites can't accidentally swap it for some other byte buffer at an
/// API boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duid(pub [u8; 20]);

impl Duid {
    pub const LEN: usize = 20;

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; Self::LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for Duid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duid(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Duid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
