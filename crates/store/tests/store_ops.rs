#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use gwcache_core::{is_unchanged, CachedObject, Generation, ObjectKey};
use gwcache_store::{AnyObject, ErasedStore, Store, StoreError, TypedView};

#[derive(Debug, Clone, PartialEq)]
struct Svc {
    ns: String,
    name: String,
    gen: Generation,
    ports: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
struct Cfg {
    name: String,
}

impl CachedObject for Svc {
    fn key(&self) -> ObjectKey { ObjectKey::new(self.ns.as_str(), self.name.as_str()) }
    fn generation(&self) -> Generation { self.gen }
}

impl CachedObject for Cfg {
    fn key(&self) -> ObjectKey { ObjectKey::cluster(self.name.as_str()) }
    fn generation(&self) -> Generation { None }
}

fn svc(ns: &str, name: &str, gen: i64) -> Svc {
    Svc { ns: ns.into(), name: name.into(), gen: Some(gen), ports: vec![3478] }
}

#[test]
fn upsert_then_get_returns_a_copy() {
    let store: Store<Svc> = Store::new("Service");
    let mut original = svc("x", "y", 1);
    store.apply(original.clone());

    original.ports.push(9999);
    original.gen = Some(7);

    let got = store.get(&ObjectKey::new("x", "y")).unwrap();
    assert_eq!(*got, svc("x", "y", 1));

    let mut owned = store.get_cloned(&ObjectKey::new("x", "y")).unwrap();
    owned.ports.clear();
    assert_eq!(store.get(&ObjectKey::new("x", "y")).unwrap().ports, vec![3478]);
}

#[test]
fn upsert_replaces_last_writer_wins() {
    let store: Store<Svc> = Store::new("Service");
    store.apply(svc("x", "y", 1));
    store.apply(svc("x", "y", 2));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&ObjectKey::new("x", "y")).unwrap().gen, Some(2));
}

#[test]
fn missing_and_deleted_keys_are_absent() {
    let store: Store<Svc> = Store::new("Service");
    assert!(store.get(&ObjectKey::new("x", "nope")).is_none());

    store.apply(svc("x", "y", 1));
    store.delete(&ObjectKey::new("x", "y"));
    assert!(store.get(&ObjectKey::new("x", "y")).is_none());
    assert!(store.is_empty());

    // no-op on absent
    let rev = store.revision();
    store.delete(&ObjectKey::new("x", "y"));
    assert_eq!(store.revision(), rev);
}

#[test]
fn get_all_lists_each_present_key_once() {
    let store: Store<Svc> = Store::new("Service");
    for (ns, name) in [("b", "2"), ("a", "1"), ("c", "3"), ("a", "1")] {
        store.apply(svc(ns, name, 1));
    }
    store.delete(&ObjectKey::new("c", "3"));

    let all = store.get_all();
    assert_eq!(all.len(), 2);
    let keys: BTreeSet<String> = all.iter().map(|o| o.key().to_string()).collect();
    assert_eq!(keys, BTreeSet::from(["a/1".to_string(), "b/2".to_string()]));
}

#[test]
fn get_all_is_a_snapshot() {
    let store: Store<Svc> = Store::new("Service");
    store.apply(svc("a", "1", 1));
    let before = store.get_all();
    let snap = store.snapshot();

    store.apply(svc("a", "2", 1));
    store.delete(&ObjectKey::new("a", "1"));

    assert_eq!(before.len(), 1);
    assert_eq!(before[0].name, "1");
    assert_eq!(snap.len(), 1);
    assert!(snap.get(&ObjectKey::new("a", "1")).is_some());
    assert_eq!(store.keys(), vec![ObjectKey::new("a", "2")]);
}

#[test]
fn revision_counts_effective_writes() {
    let store: Store<Svc> = Store::new("Service");
    assert_eq!(store.revision(), 0);
    store.apply(svc("a", "1", 1));
    store.apply(svc("a", "1", 1));
    store.delete(&ObjectKey::new("a", "1"));
    store.delete(&ObjectKey::new("a", "1"));
    assert_eq!(store.revision(), 3);
}

#[test]
fn clones_share_state() {
    let store: Store<Svc> = Store::new("Service");
    let other = store.clone();
    other.apply(svc("a", "1", 1));
    assert!(store.contains(&ObjectKey::new("a", "1")));

    let independent: Store<Svc> = Store::new("Service");
    assert!(independent.is_empty());
}

#[test]
fn change_detection_against_cached_copy() {
    let store: Store<Svc> = Store::new("Service");
    store.apply(svc("x", "y", 3));
    let cached = store.get(&ObjectKey::new("x", "y")).unwrap();

    assert!(is_unchanged(&*cached, &svc("x", "y", 3)));
    assert!(!is_unchanged(&*cached, &svc("x", "y", 4)));
}

#[test]
fn typed_view_roundtrip() {
    let view: TypedView<Svc> = TypedView::new("Service");
    view.upsert(svc("x", "y", 1));
    view.upsert_at(ObjectKey::new("x", "alias"), svc("x", "y", 2));

    assert_eq!(view.len(), 2);
    assert_eq!(*view.get(&ObjectKey::new("x", "y")).unwrap().unwrap(), svc("x", "y", 1));
    assert_eq!(view.get_cloned(&ObjectKey::new("x", "alias")).unwrap().unwrap().gen, Some(2));
    assert_eq!(view.get(&ObjectKey::new("x", "none")).unwrap(), None);
    assert_eq!(view.get_all().unwrap().len(), 2);

    view.delete(&ObjectKey::new("x", "y"));
    assert!(!view.contains(&ObjectKey::new("x", "y")));
}

#[test]
fn foreign_object_in_shared_store_is_reported() {
    let shared: ErasedStore = Store::new("mixed");
    let services: TypedView<Svc> = TypedView::over(shared.clone());
    let configs: TypedView<Cfg> = TypedView::over(shared);

    services.upsert(svc("x", "y", 1));
    configs.upsert(Cfg { name: "c".into() });

    let err = services.get_all().unwrap_err();
    let StoreError::KindMismatch { key, expected, found } = err;
    assert_eq!(key, ObjectKey::cluster("c"));
    assert!(expected.ends_with("Svc"), "{expected}");
    assert!(found.ends_with("Cfg"), "{found}");

    assert!(matches!(services.get(&ObjectKey::cluster("c")), Err(StoreError::KindMismatch { .. })));
    assert!(services.get(&ObjectKey::new("x", "y")).unwrap().is_some());

    // removing the foreign entry heals the view
    configs.delete(&ObjectKey::cluster("c"));
    assert_eq!(services.get_all().unwrap().len(), 1);
}

#[test]
fn erased_store_holds_any_cacheable_value() {
    let store: ErasedStore = Store::new("mixed");
    store.upsert_arc(ObjectKey::new("x", "y"), std::sync::Arc::new(svc("x", "y", 5)));
    let obj = store.get(&ObjectKey::new("x", "y")).unwrap();
    assert_eq!(obj.generation(), Some(5));
    assert!(obj.as_any().downcast_ref::<Svc>().is_some());
    assert!(obj.as_any().downcast_ref::<Cfg>().is_none());
}
