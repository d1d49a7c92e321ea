// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection registry keyed by device id.
//!
//! `Pool` hands out `Arc<PpppConnection>`s that callers can hold onto for
//! the lifetime of a request, while the pool itself only tracks strong
//! handles in a `DashMap` for reuse across requests for the same device. A
//! `OnceCell<Weak<Self>>` self-reference lets a task spawned from inside a
//! `&self` method act on the pool later without holding a strong `Arc`
//! cycle through it.

use std::{net::SocketAddr, sync::{Arc, Weak}};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    cfg::config::TransportConfig,
    client::connection::PpppConnection,
    error::{Result, TransportError},
    wire::duid::Duid,
};

/// Shared registry of live connections, one per device id.
pub struct Pool {
    connections: DashMap<Duid, Arc<PpppConnection>>,
    cfg: TransportConfig,
    self_ref: OnceCell<Weak<Pool>>,
}

impl Pool {
    pub fn new(cfg: TransportConfig) -> Arc<Self> {
        let pool = Arc::new(Self {
            connections: DashMap::new(),
            cfg,
            self_ref: OnceCell::new(),
        });
        pool.attach_self(&pool);
        pool
    }

    fn attach_self(&self, strong: &Arc<Pool>) {
        // Ignored if already set: `Pool::new` is the only caller and calls
        // this exactly once per pool.
        let _ = self.self_ref.set(Arc::downgrade(strong));
    }

    fn upgrade_self(&self) -> Option<Arc<Pool>> {
        self.self_ref.get().and_then(Weak::upgrade)
    }

    /// Return the connection for `duid` if one is already established.
    pub fn get(&self, duid: &Duid) -> Option<Arc<PpppConnection>> {
        self.connections.get(duid).map(|entry| Arc::clone(entry.value()))
    }

    /// Establish (or reuse) a connection to `duid` by trying each candidate
    /// host in order.
    pub async fn connect_any(
        &self,
        duid: Duid,
        candidates: &[SocketAddr],
    ) -> Result<Arc<PpppConnection>> {
        if let Some(existing) = self.get(&duid) {
            return Ok(existing);
        }

        let conn = PpppConnection::connect_any(duid, candidates, &self.cfg).await?;
        self.connections.insert(duid, Arc::clone(&conn));
        info!(duid = %duid, "connection established and pooled");
        self.spawn_reaper(duid, Arc::clone(&conn));
        Ok(conn)
    }

    /// Evict `duid` from the map once its connection's driver task exits on
    /// its own (peer `CLOSE`, fatal I/O error), without the caller having to
    /// call `disconnect` explicitly.
    fn spawn_reaper(&self, duid: Duid, conn: Arc<PpppConnection>) {
        let Some(pool) = self.upgrade_self() else {
            // `Pool::new` always calls `attach_self`; reaching here would
            // mean construction bypassed it entirely.
            return;
        };
        tokio::spawn(async move {
            conn.closed().await;
            pool.connections.remove(&duid);
        });
    }

    /// Tear down and evict the connection for `duid`, if one is tracked.
    pub fn disconnect(&self, duid: &Duid) {
        if let Some((_, conn)) = self.connections.remove(duid) {
            conn.stop();
        }
    }

    /// Number of currently pooled connections. Exposed for tests/metrics.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
