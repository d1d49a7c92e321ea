// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Public client façade: connection establishment and framed application
//! codecs layered on top of the channel/session/driver plumbing.

pub mod connection;
pub mod pool;

pub use connection::PpppConnection;
pub use pool::Pool;
