// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-index reliable byte stream.
//!
//! A `Channel` is modeled as an actor owned by the driver: the driver is the
//! sole caller of [`Channel::poll`], [`Channel::rx_ack`] and
//! [`Channel::rx_drw`], while application tasks are the sole callers of
//! [`Channel::read`] and [`Channel::write`]. Both sets of methods take
//! `&self` and coordinate through an internal `tokio::sync::Mutex` plus a
//! `Notify`, so the actor boundary is enforced by convention (one writer
//! task, one driver task) rather than by the type system.

pub mod pipe;

use std::{collections::{HashMap, HashSet, VecDeque}, time::{Duration, Instant}};

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};
use tracing::{trace, warn};

use crate::{channel::pipe::BytePipe, error::TransportError, utils::in_forward_window, wire::packet::Packet};

/// Width of the out-of-order acceptance window used by [`Channel::rx_drw`].
/// Comfortably above `max_in_flight` so legitimate reordering within one
/// window of flight is never mistaken for a stale duplicate.
pub const RX_WINDOW: u16 = 4096;

#[derive(Debug)]
struct ChannelState {
    tx_ctr: u16,
    tx_ack: u16,
    rx_ctr: u16,
    rxqueue: HashMap<u16, Bytes>,
    txqueue: Vec<(Instant, u16, Bytes)>,
    backlog: VecDeque<(Instant, u16, Bytes)>,
    acks: HashSet<u16>,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            tx_ctr: 0,
            tx_ack: 0,
            rx_ctr: 0,
            rxqueue: HashMap::new(),
            txqueue: Vec::new(),
            backlog: VecDeque::new(),
            acks: HashSet::new(),
        }
    }
}

/// One of the eight multiplexed reliable streams.
#[derive(Debug)]
pub struct Channel {
    pub index: u8,
    state: Mutex<ChannelState>,
    wake: Notify,
    pub inbound: BytePipe,
    /// Present for symmetry with the two-byte-pipes data model. `write`
    /// enqueues straight into `backlog`/`txqueue` rather than routing
    /// through this pipe; it stays unused on the send side, the same as the
    /// protocol it mirrors leaves its outbound `Wire` unused.
    pub outbound: BytePipe,
    retransmit_timeout: Duration,
    max_in_flight: usize,
    chunk_size: usize,
}

impl Channel {
    pub fn new(index: u8, retransmit_timeout: Duration, max_in_flight: usize, chunk_size: usize) -> Self {
        Self {
            index,
            state: Mutex::new(ChannelState::new()),
            wake: Notify::new(),
            inbound: BytePipe::new(),
            outbound: BytePipe::new(),
            retransmit_timeout,
            max_in_flight,
            chunk_size,
        }
    }

    /// Current transmit-ack watermark. Useful for tests/observability.
    pub async fn tx_ack(&self) -> u16 {
        self.state.lock().await.tx_ack
    }

    pub async fn tx_ctr(&self) -> u16 {
        self.state.lock().await.tx_ctr
    }

    pub async fn rx_ctr(&self) -> u16 {
        self.state.lock().await.rx_ctr
    }

    /// Split `payload` into `chunk_size` chunks, append them to the
    /// backlog, and optionally block until every chunk has been
    /// acknowledged. Returns the `[start, end)` sequence window.
    pub async fn write(&self, payload: &[u8], block: bool) -> Result<(u16, u16), TransportError> {
        let (start, end) = {
            let mut st = self.state.lock().await;
            let start = st.tx_ctr;
            let now = Instant::now();
            if payload.is_empty() {
                (start, st.tx_ctr)
            } else {
                for chunk in payload.chunks(self.chunk_size) {
                    let seq = st.tx_ctr;
                    st.backlog.push_back((now, seq, Bytes::copy_from_slice(chunk)));
                    st.tx_ctr = st.tx_ctr.wrapping_add(1);
                }
                (start, st.tx_ctr)
            }
        };

        if block {
            loop {
                let notified = self.wake.notified();
                {
                    let st = self.state.lock().await;
                    // tx_ack has reached (or passed) end: every chunk up to
                    // `end` has been acknowledged.
                    if st.tx_ack == end || in_forward_window(end, st.tx_ack, u16::MAX / 2) {
                        break;
                    }
                }
                if self.inbound.is_closed() {
                    return Err(TransportError::Closed);
                }
                notified.await;
            }
        }

        Ok((start, end))
    }

    /// Driver-only: promote backlog entries, emit due retransmissions, and
    /// wake blocked writers.
    pub async fn poll(&self, now: Instant) -> Vec<Packet> {
        let mut st = self.state.lock().await;

        self.wake.notify_waiters();

        while st.txqueue.len() < self.max_in_flight {
            match st.backlog.pop_front() {
                Some(item) => st.txqueue.push(item),
                None => break,
            }
        }
        st.txqueue.sort_by_key(|(deadline, _, _)| *deadline);

        let mut out = Vec::new();
        while let Some(&(deadline, _, _)) = st.txqueue.first() {
            if deadline >= now {
                break;
            }
            let (deadline, seq, data) = st.txqueue.remove(0);
            out.push(Packet::Drw { channel: self.index, index: seq, data: data.clone() });
            st.txqueue.push((deadline + self.retransmit_timeout, seq, data));
        }

        out
    }

    /// Driver-only: apply a received cumulative-plus-selective ACK set.
    pub async fn rx_ack(&self, acks: &[u16]) {
        let mut st = self.state.lock().await;
        let ack_set: HashSet<u16> = acks.iter().copied().collect();
        st.txqueue.retain(|(_, seq, _)| !ack_set.contains(seq));

        for &ack in acks {
            if ack == st.tx_ack || in_forward_window(st.tx_ack, ack, u16::MAX / 2) {
                st.acks.insert(ack);
            }
        }

        while st.acks.remove(&st.tx_ack) {
            st.tx_ack = st.tx_ack.wrapping_add(1);
        }
        drop(st);
        self.wake.notify_waiters();
    }

    /// Driver-only: record and reassemble a received `DRW` segment.
    pub async fn rx_drw(&self, index: u16, data: Bytes) {
        let mut st = self.state.lock().await;
        if !in_forward_window(st.rx_ctr, index, RX_WINDOW) {
            warn!(
                channel = self.index,
                index, rx_ctr = st.rx_ctr, "dropping out-of-window DRW segment"
            );
            return;
        }
        st.rxqueue.insert(index, data);

        loop {
            let rx_ctr = st.rx_ctr;
            match st.rxqueue.remove(&rx_ctr) {
                Some(chunk) => {
                    drop(st);
                    self.inbound.write(&chunk).await;
                    st = self.state.lock().await;
                    st.rx_ctr = rx_ctr.wrapping_add(1);
                },
                None => break,
            }
        }
        trace!(channel = self.index, rx_ctr = st.rx_ctr, "channel reassembly advanced");
    }

    /// Read exactly `n` bytes from the reassembled inbound stream,
    /// blocking until available.
    pub async fn read(&self, n: usize) -> Result<Bytes, TransportError> {
        self.inbound.read_exact(n).await
    }

    /// Tear down both byte pipes and wake any blocked writer with
    /// `Closed`. Called once by the driver on session teardown.
    pub fn close(&self) {
        self.inbound.close();
        self.outbound.close();
        self.wake.notify_waiters();
    }
}
