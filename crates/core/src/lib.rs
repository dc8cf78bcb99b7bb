//! gwcache core types: object identity, change detection, backend references.
//!
//! Everything in this crate is a pure function over object data. The store
//! crate builds on [`CachedObject`] and [`ObjectKey`]; any `kube::Resource`
//! is a [`CachedObject`] out of the box.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod change;
pub mod key;
pub mod meta;
pub mod reference;

pub use change::is_unchanged;
pub use key::{KeyError, ObjectKey};
pub use meta::merge_metadata;
pub use reference::{is_reference_service, is_reference_static_service, BackendRef, ParentRef, RefTarget};

/// Generation as carried in object metadata. Unset compares equal to unset.
pub type Generation = Option<i64>;

/// A value that can live in a store: exposes its identity and generation.
pub trait CachedObject {
    fn key(&self) -> ObjectKey;
    fn generation(&self) -> Generation;
}

/// Every Kubernetes object is cacheable under its namespaced name.
impl<R: kube::Resource> CachedObject for R {
    fn key(&self) -> ObjectKey {
        use kube::ResourceExt;
        ObjectKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    fn generation(&self) -> Generation { self.meta().generation }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeltaKind {
    Applied,
    Deleted,
}

/// A single observation handed over by a watch layer or manifest loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub kind: DeltaKind,
    /// Raw object as received (apiVersion, kind, metadata, spec, ...)
    pub raw: serde_json::Value,
}

impl Delta {
    pub fn applied(raw: serde_json::Value) -> Self { Self { kind: DeltaKind::Applied, raw } }
    pub fn deleted(raw: serde_json::Value) -> Self { Self { kind: DeltaKind::Deleted, raw } }

    /// `(apiVersion, kind)` of the raw object, empty strings when missing.
    pub fn type_meta(&self) -> (&str, &str) {
        let api_version = self.raw.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("");
        let kind = self.raw.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        (api_version, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn kube_objects_are_cacheable() {
        let svc = Service {
            metadata: ObjectMeta {
                namespace: Some("team-a".into()),
                name: Some("media".into()),
                generation: Some(4),
                ..ObjectMeta::default()
            },
            ..Service::default()
        };
        assert_eq!(svc.key(), ObjectKey::new("team-a", "media"));
        assert_eq!(CachedObject::generation(&svc), Some(4));
    }

    #[test]
    fn delta_type_meta() {
        let d = Delta::applied(serde_json::json!({"apiVersion": "v1", "kind": "Service"}));
        assert_eq!(d.type_meta(), ("v1", "Service"));
        assert_eq!(Delta::deleted(serde_json::json!({})).type_meta(), ("", ""));
    }
}

pub mod prelude {
    pub use super::{
        is_unchanged, merge_metadata, BackendRef, CachedObject, Delta, DeltaKind, Generation, ObjectKey, RefTarget,
    };
}
