//! Request admission control.
//!
//! An [`AdmissionQueue`] bounds how many requests are in flight at once.
//! [`admit`](AdmissionQueue::admit) waits for a free slot and returns a
//! permit whose drop releases the slot, so a permit held across the whole
//! dispatch is the only bookkeeping a caller needs.
//!
//! Optionally the queue carries a dedupe cache: admissions tagged with an
//! identifier already in the cache are suppressed outright instead of
//! queued. The cache is bounded, oldest entry evicted first.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

struct DedupeCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DedupeCache {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Records `id`; returns `false` when it was already present.
    fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.to_owned());
        self.order.push_back(id.to_owned());
        true
    }
}

/// Bounded-concurrency gate for incoming requests.
pub struct AdmissionQueue {
    permits: Arc<Semaphore>,
    dedupe: Option<Mutex<DedupeCache>>,
}

/// A held admission slot. Dropping it frees the slot for the next waiter.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionQueue {
    /// A queue admitting at most `max_concurrent` requests at a time.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            dedupe: None,
        }
    }

    /// Like [`new`](Self::new), with a dedupe cache holding up to
    /// `cache_size` recent identifiers.
    pub fn with_dedupe(max_concurrent: usize, cache_size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            dedupe: Some(Mutex::new(DedupeCache::new(cache_size))),
        }
    }

    /// Waits for a free slot and returns the permit. `None` means the
    /// admission was suppressed: `id` was seen recently and the queue has a
    /// dedupe cache.
    pub async fn admit(&self, id: Option<&str>) -> Option<AdmissionPermit> {
        if let (Some(cache), Some(id)) = (&self.dedupe, id) {
            let fresh = cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id);
            if !fresh {
                debug!(id, "duplicate admission suppressed");
                return None;
            }
        }
        match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => Some(AdmissionPermit { _permit: permit }),
            Err(_) => {
                debug!("admission queue closed");
                None
            }
        }
    }
}
