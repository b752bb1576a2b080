//! Per-request mutual exclusion.
//!
//! Events on the same request are applied one at a time; events on
//! different requests never contend. The lock map only grows: one entry per
//! request ever touched by this process.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use ethlend_core::RequestId;

/// One mutex per request ID.
#[derive(Debug, Default)]
pub struct RequestLocks {
    locks: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex serialising events on `id`.
    ///
    /// The DashMap shard guard is released before the caller locks the
    /// returned mutex, so waiting on one request never blocks another.
    pub fn handle(&self, id: RequestId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_default().value())
    }

    /// Number of requests with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
