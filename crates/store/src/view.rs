use std::marker::PhantomData;
use std::sync::Arc;

use gwcache_core::ObjectKey;
use metrics::counter;
use tokio::sync::watch;
use tracing::error;

use crate::{AnyObject, ErasedStore, Store};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An element of another kind sits in a typed view's store. This is a bug in
    /// whoever shares the erased store, never a condition to retry.
    #[error("kind mismatch at {key}: expected {expected}, found {found}")]
    KindMismatch { key: ObjectKey, expected: &'static str, found: &'static str },
}

/// A store narrowed to kind `K`.
///
/// Writes through the view are typed, so the view alone never inserts a foreign
/// object. Reads still check each element because the underlying [`ErasedStore`]
/// may be shared with other writers; a foreign element fails the whole read.
pub struct TypedView<K> {
    store: ErasedStore,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for TypedView<K> {
    fn clone(&self) -> Self { Self { store: self.store.clone(), _kind: PhantomData } }
}

impl<K> std::fmt::Debug for TypedView<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedView").field("kind", &std::any::type_name::<K>()).field("store", &self.store).finish()
    }
}

impl<K: AnyObject> TypedView<K> {
    pub fn new(kind: &'static str) -> Self { Self::over(Store::new(kind)) }

    pub fn over(store: ErasedStore) -> Self { Self { store, _kind: PhantomData } }

    pub fn store(&self) -> &ErasedStore { &self.store }

    pub fn upsert(&self, obj: K) {
        let key = obj.key();
        self.upsert_at(key, obj)
    }

    pub fn upsert_at(&self, key: ObjectKey, obj: K) { self.store.upsert_arc(key, Arc::new(obj)) }

    pub fn delete(&self, key: &ObjectKey) { self.store.delete(key) }

    pub fn get(&self, key: &ObjectKey) -> Result<Option<Arc<K>>, StoreError> {
        self.store.get(key).map(|o| self.downcast(key, o)).transpose()
    }

    /// All entries of one snapshot, or an error if any of them is foreign.
    pub fn get_all(&self) -> Result<Vec<Arc<K>>, StoreError> {
        let snap = self.store.snapshot();
        snap.items.iter().map(|(key, o)| self.downcast(key, Arc::clone(o))).collect()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool { self.store.contains(key) }
    pub fn len(&self) -> usize { self.store.len() }
    pub fn is_empty(&self) -> bool { self.store.is_empty() }
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.store.subscribe() }

    fn downcast(&self, key: &ObjectKey, obj: Arc<dyn AnyObject>) -> Result<Arc<K>, StoreError> {
        let found = obj.type_name();
        obj.into_any().downcast::<K>().map_err(|_| {
            let expected = std::any::type_name::<K>();
            counter!("gwcache_store_kind_mismatch_total", 1, "kind" => self.store.kind());
            error!(kind = self.store.kind(), key = %key, expected, found, "foreign object in typed store");
            StoreError::KindMismatch { key: key.clone(), expected, found }
        })
    }
}

impl<K: AnyObject + Clone> TypedView<K> {
    pub fn get_cloned(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.get(key)?.map(|o| K::clone(&o)))
    }
}
