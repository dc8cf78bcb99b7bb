//! gwcache store: keyed in-RAM object store with copy-on-write snapshots.
//!
//! Readers load the current [`Snapshot`] lock-free through `ArcSwap`; writers
//! serialize on a mutex, clone the map, apply one change and publish the new
//! snapshot atomically. A reader therefore sees a single write either fully or
//! not at all, and a `get_all` result is never touched by later writes.

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use gwcache_core::{CachedObject, ObjectKey};
use metrics::{counter, gauge};
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tracing::{debug, trace};

mod erased;
mod view;

pub use erased::{AnyObject, ErasedStore};
pub use view::{StoreError, TypedView};

/// Immutable view of a store at one revision.
pub struct Snapshot<T: ?Sized> {
    /// Bumped by one on every effective write.
    pub revision: u64,
    pub items: FxHashMap<ObjectKey, Arc<T>>,
}

impl<T: ?Sized> Snapshot<T> {
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn get(&self, key: &ObjectKey) -> Option<&Arc<T>> { self.items.get(key) }
}

impl<T: ?Sized> Clone for Snapshot<T> {
    fn clone(&self) -> Self { Self { revision: self.revision, items: self.items.clone() } }
}

impl<T: ?Sized> Default for Snapshot<T> {
    fn default() -> Self { Self { revision: 0, items: FxHashMap::default() } }
}

impl<T: ?Sized> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("revision", &self.revision).field("len", &self.items.len()).finish()
    }
}

struct Shared<T: ?Sized> {
    kind: &'static str,
    snap: ArcSwap<Snapshot<T>>,
    writer: Mutex<()>,
    revision_tx: watch::Sender<u64>,
}

/// Handle to a keyed object store. Cloning shares the underlying state.
///
/// One store per resource kind, created at startup and handed to whoever needs
/// it; there is no global instance.
pub struct Store<T: ?Sized> {
    shared: Arc<Shared<T>>,
}

impl<T: ?Sized> Clone for Store<T> {
    fn clone(&self) -> Self { Self { shared: Arc::clone(&self.shared) } }
}

impl<T: ?Sized> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.shared.snap.load();
        f.debug_struct("Store")
            .field("kind", &self.shared.kind)
            .field("revision", &snap.revision)
            .field("len", &snap.items.len())
            .finish()
    }
}

impl<T: ?Sized> Store<T> {
    /// `kind` labels logs and metrics, e.g. `"Service"`.
    pub fn new(kind: &'static str) -> Self {
        let (revision_tx, _) = watch::channel(0u64);
        Self {
            shared: Arc::new(Shared {
                kind,
                snap: ArcSwap::from_pointee(Snapshot::default()),
                writer: Mutex::new(()),
                revision_tx,
            }),
        }
    }

    pub fn kind(&self) -> &'static str { self.shared.kind }

    /// Insert or replace; last writer wins.
    pub fn upsert_arc(&self, key: ObjectKey, obj: Arc<T>) {
        let revision = self.write(|items| {
            items.insert(key.clone(), obj);
            true
        });
        counter!("gwcache_store_upsert_total", 1, "kind" => self.kind());
        debug!(kind = self.kind(), key = %key, revision = ?revision, "upsert");
    }

    pub fn get(&self, key: &ObjectKey) -> Option<Arc<T>> {
        self.shared.snap.load().items.get(key).cloned()
    }

    /// All current entries, in no particular order.
    pub fn get_all(&self) -> Vec<Arc<T>> {
        self.shared.snap.load().items.values().cloned().collect()
    }

    /// Remove `key`; a missing key is a no-op and does not bump the revision.
    pub fn delete(&self, key: &ObjectKey) {
        match self.write(|items| items.remove(key).is_some()) {
            Some(revision) => {
                counter!("gwcache_store_delete_total", 1, "kind" => self.kind());
                debug!(kind = self.kind(), key = %key, revision, "delete");
            }
            None => trace!(kind = self.kind(), key = %key, "delete of absent key"),
        }
    }

    pub fn contains(&self, key: &ObjectKey) -> bool { self.shared.snap.load().items.contains_key(key) }
    pub fn len(&self) -> usize { self.shared.snap.load().items.len() }
    pub fn is_empty(&self) -> bool { self.shared.snap.load().items.is_empty() }
    pub fn revision(&self) -> u64 { self.shared.snap.load().revision }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.shared.snap.load().items.keys().cloned().collect()
    }

    /// The whole current snapshot; consistent across keys.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> { self.shared.snap.load_full() }

    /// Receiver of the store revision, updated after every effective write.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.shared.revision_tx.subscribe() }

    /// Apply `f` to a private copy of the map and publish it if `f` reports a change.
    fn write<F>(&self, f: F) -> Option<u64>
    where
        F: FnOnce(&mut FxHashMap<ObjectKey, Arc<T>>) -> bool,
    {
        // The lock guards no data, so a poisoned lock is still usable.
        let _guard = self.shared.writer.lock().unwrap_or_else(|p| p.into_inner());
        let cur = self.shared.snap.load_full();
        let mut next = Snapshot::clone(&*cur);
        if !f(&mut next.items) {
            return None;
        }
        next.revision = cur.revision.wrapping_add(1);
        let (revision, len) = (next.revision, next.items.len());
        self.shared.snap.store(Arc::new(next));
        self.shared.revision_tx.send_replace(revision);
        gauge!("gwcache_store_objects", len as f64, "kind" => self.kind());
        Some(revision)
    }
}

impl<T> Store<T> {
    pub fn upsert(&self, key: ObjectKey, obj: T) { self.upsert_arc(key, Arc::new(obj)) }
}

impl<T: CachedObject> Store<T> {
    /// Upsert keyed by the object's own identity.
    pub fn apply(&self, obj: T) {
        let key = obj.key();
        self.upsert(key, obj)
    }
}

impl<T: Clone> Store<T> {
    /// Owned copy of the entry; mutating it never touches the store.
    pub fn get_cloned(&self, key: &ObjectKey) -> Option<T> { self.get(key).map(|o| T::clone(&o)) }
}
