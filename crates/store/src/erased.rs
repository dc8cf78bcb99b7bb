use std::any::Any;
use std::fmt;
use std::sync::Arc;

use gwcache_core::CachedObject;

use crate::Store;

/// Object-safe view of any cacheable value, used for stores that are shared
/// between kinds and for kind-dispatching diagnostics.
pub trait AnyObject: CachedObject + fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn type_name(&self) -> &'static str;
}

impl<T> AnyObject for T
where
    T: CachedObject + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any { self }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
    fn type_name(&self) -> &'static str { std::any::type_name::<T>() }
}

/// Store whose elements are only known by their capabilities.
pub type ErasedStore = Store<dyn AnyObject>;
