// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pool of reusable [`WirePayload`] containers.
//!
//! Each encode call checks out one container, fills it, serializes it and
//! hands it back. The guard returned by [`PayloadPool::acquire`] owns the
//! container exclusively until it is dropped, so a failed or abandoned call
//! still returns its container.
//!
//! Containers are cleared on checkout and on return; a reused container
//! never exposes entries from a previous call.

use crate::payload::WirePayload;
use crossbeam::queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of idle containers kept by a pool.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Checkouts served by a reused container.
    pub hits: u64,
    /// Checkouts that had to allocate.
    pub misses: u64,
    /// Containers handed back and kept.
    pub returns: u64,
    /// Containers handed back while the pool was full.
    pub drops: u64,
    /// Idle containers currently held.
    pub idle: usize,
}

impl PoolStats {
    /// Containers checked out and not yet handed back.
    pub fn outstanding(&self) -> u64 {
        (self.hits + self.misses).saturating_sub(self.returns + self.drops)
    }
}

pub(crate) struct PayloadPool {
    queue: ArrayQueue<Box<WirePayload>>,
    hits: AtomicU64,
    misses: AtomicU64,
    returns: AtomicU64,
    drops: AtomicU64,
}

impl PayloadPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    /// Check out a cleared container, reusing an idle one when available.
    pub(crate) fn acquire(&self) -> PooledPayload<'_> {
        let payload = match self.queue.pop() {
            Some(mut payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                payload.clear();
                payload
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Box::default()
            }
        };
        PooledPayload {
            pool: self,
            payload: Some(payload),
        }
    }

    fn release(&self, mut payload: Box<WirePayload>) {
        payload.clear();
        match self.queue.push(payload) {
            Ok(()) => {
                self.returns.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            idle: self.queue.len(),
        }
    }
}

impl Default for PayloadPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// Exclusive checkout of a pooled container; returned to the pool on drop.
pub(crate) struct PooledPayload<'p> {
    pool: &'p PayloadPool,
    payload: Option<Box<WirePayload>>,
}

impl Deref for PooledPayload<'_> {
    type Target = WirePayload;

    fn deref(&self) -> &WirePayload {
        // Only `drop` takes the payload out.
        self.payload.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledPayload<'_> {
    fn deref_mut(&mut self) -> &mut WirePayload {
        self.payload.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledPayload<'_> {
    fn drop(&mut self) {
        if let Some(payload) = self.payload.take() {
            self.pool.release(payload);
        }
    }
}
