//! Short-lived memoization of the topological order.
//!
//! The cache belongs to a [`crate::GraphStore`] and is cleared by the
//! graph's own node/edge mutators, so a caller can never observe an order
//! computed before a structural change.

use crate::algo::TopoOrder;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Default lifetime of a cached order.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct Entry {
    fingerprint: String,
    stored_at: Instant,
    order: TopoOrder,
}

/// Process-local topological order cache.
#[derive(Debug, Clone)]
pub struct TopoCache {
    ttl: Duration,
    entry: RefCell<Option<Entry>>,
}

impl TopoCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RefCell::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
        self.invalidate();
    }

    /// Return the cached order if it matches `fingerprint` and has not expired.
    pub fn get(&self, fingerprint: &str) -> Option<TopoOrder> {
        let entry = self.entry.borrow();
        let entry = entry.as_ref()?;
        if entry.fingerprint != fingerprint || entry.stored_at.elapsed() > self.ttl {
            log::debug!("topo cache miss");
            return None;
        }
        log::debug!("topo cache hit");
        Some(entry.order.clone())
    }

    pub fn put(&self, fingerprint: String, order: TopoOrder) {
        if self.ttl.is_zero() {
            return;
        }
        *self.entry.borrow_mut() = Some(Entry {
            fingerprint,
            stored_at: Instant::now(),
            order,
        });
    }

    pub fn invalidate(&self) {
        self.entry.borrow_mut().take();
    }

    pub fn is_empty(&self) -> bool {
        self.entry.borrow().is_none()
    }
}

impl Default for TopoCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Fingerprint of (project name, version, sorted node ids, node count).
pub fn fingerprint<'a>(project_name: &str, version: &str, node_ids: impl Iterator<Item = &'a str>) -> String {
    let mut ids: Vec<&str> = node_ids.collect();
    ids.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(project_name.as_bytes());
    hasher.update([0]);
    hasher.update(version.as_bytes());
    hasher.update([0]);
    for id in &ids {
        hasher.update(id.as_bytes());
        hasher.update([0]);
    }
    hasher.update((ids.len() as u64).to_be_bytes());
    format!("{:x}", hasher.finalize())
}
