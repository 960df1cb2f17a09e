//! Bounded LRU store with per-entry TTL.
//!
//! The eviction order lives in an index-linked list over a slot arena:
//! nodes are `Vec` slots chained by index, so there is no unsafe pointer
//! juggling and freed slots are recycled through a free list. Front is
//! most-recently-used; evictions pop the back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::lifecycle::Shutdown;

#[derive(Debug)]
struct Slot {
    key: String,
    value: Bytes,
    expires_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct LruInner {
    index: HashMap<String, usize>,
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    front: Option<usize>,
    back: Option<usize>,
}

impl LruInner {
    fn slot(&self, idx: usize) -> &Slot {
        self.slots[idx].as_ref().expect("linked slot must be occupied")
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Slot {
        self.slots[idx].as_mut().expect("linked slot must be occupied")
    }

    /// Detach a node from the list without freeing its slot.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slot(idx);
            (slot.prev, slot.next)
        };

        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.front = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.back = prev,
        }

        let slot = self.slot_mut(idx);
        slot.prev = None;
        slot.next = None;
    }

    /// Attach a detached node at the front (most-recently-used).
    fn push_front(&mut self, idx: usize) {
        let old_front = self.front;
        {
            let slot = self.slot_mut(idx);
            slot.prev = None;
            slot.next = old_front;
        }
        if let Some(f) = old_front {
            self.slot_mut(f).prev = Some(idx);
        }
        self.front = Some(idx);
        if self.back.is_none() {
            self.back = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.front == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Remove a node entirely: unlink, drop the slot, recycle it.
    fn remove(&mut self, idx: usize) {
        self.unlink(idx);
        if let Some(slot) = self.slots[idx].take() {
            self.index.remove(&slot.key);
        }
        self.free.push(idx);
    }

    fn insert_front(&mut self, key: String, value: Bytes, expires_at: Instant) {
        let slot = Slot {
            key: key.clone(),
            value,
            expires_at,
            prev: None,
            next: None,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };

        self.index.insert(key, idx);
        self.push_front(idx);
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// Shared LRU+TTL byte cache for rendered responses.
#[derive(Debug)]
pub struct ResponseCache {
    inner: RwLock<LruInner>,
    max_size: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(LruInner::default()),
            max_size,
            ttl,
        }
    }

    /// Look a key up. Expired entries are removed on access and reported
    /// as a miss; hits move to the front of the eviction order.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut inner = self.inner.write();

        let idx = *inner.index.get(key)?;
        if Instant::now() > inner.slot(idx).expires_at {
            inner.remove(idx);
            return None;
        }

        inner.move_to_front(idx);
        Some(inner.slot(idx).value.clone())
    }

    /// Insert or refresh a key. Refreshes update payload, expiry and
    /// recency in place; inserts past capacity evict the back entry.
    pub fn set(&self, key: &str, value: Bytes) {
        let expires_at = Instant::now() + self.ttl;
        let mut inner = self.inner.write();

        if let Some(&idx) = inner.index.get(key) {
            let slot = inner.slot_mut(idx);
            slot.value = value;
            slot.expires_at = expires_at;
            inner.move_to_front(idx);
            return;
        }

        inner.insert_front(key.to_string(), value, expires_at);

        if inner.len() > self.max_size {
            if let Some(back) = inner.back {
                inner.remove(back);
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.index.get(key).copied() {
            Some(idx) => {
                inner.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = LruInner::default();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry in one pass over the list.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut inner = self.inner.write();

        let mut expired = Vec::new();
        let mut cursor = inner.front;
        while let Some(idx) = cursor {
            let slot = inner.slot(idx);
            if now > slot.expires_at {
                expired.push(idx);
            }
            cursor = slot.next;
        }

        for idx in expired {
            inner.remove(idx);
        }
    }

    /// Run cleanup every `interval` until shutdown.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: &Shutdown,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => cache.cleanup(),
                    _ = stop.recv() => break,
                }
            }
        })
    }

    #[cfg(test)]
    fn force_expire(&self, key: &str) {
        let mut inner = self.inner.write();
        if let Some(&idx) = inner.index.get(key) {
            inner.slot_mut(idx).expires_at = Instant::now() - Duration::from_secs(1);
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        let inner = self.inner.read();
        let occupied = inner.slots.iter().filter(|s| s.is_some()).count();
        assert_eq!(inner.index.len(), occupied, "index and list out of sync");
        assert!(inner.index.len() <= self.max_size, "over capacity");

        // Walk the list front-to-back and make sure it covers the index.
        let mut walked = 0;
        let mut cursor = inner.front;
        while let Some(idx) = cursor {
            walked += 1;
            cursor = inner.slot(idx).next;
        }
        assert_eq!(walked, inner.index.len(), "list length mismatch");
    }
}
