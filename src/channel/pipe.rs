// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Single-producer/single-consumer byte pipe backing each channel's
//! inbound/outbound byte stream.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

use crate::error::TransportError;

#[derive(Debug, Default)]
pub struct BytePipe {
    buf: Mutex<VecDeque<u8>>,
    notify: Notify,
    closed: AtomicBool,
}

impl BytePipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and wake any reader blocked on `read_exact`.
    pub async fn write(&self, data: &[u8]) {
        {
            let mut buf = self.buf.lock().await;
            buf.extend(data);
        }
        self.notify.notify_waiters();
    }

    /// Block until exactly `n` bytes are available, or the pipe is closed
    /// with fewer than `n` bytes ever becoming available.
    pub async fn read_exact(&self, n: usize) -> Result<Bytes, TransportError> {
        loop {
            // Register for notification *before* re-checking state, so a
            // `write`/`close` racing with this check is never missed.
            let notified = self.notify.notified();
            {
                let mut buf = self.buf.lock().await;
                if buf.len() >= n {
                    let out: Vec<u8> = buf.drain(..n).collect();
                    return Ok(Bytes::from(out));
                }
                if self.closed.load(Ordering::Acquire) {
                    return Err(TransportError::Closed);
                }
            }
            notified.await;
        }
    }

    /// Mark the pipe closed and wake every blocked reader with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
