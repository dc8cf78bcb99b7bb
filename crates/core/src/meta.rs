//! Label/annotation helpers.

use std::collections::BTreeMap;

/// Merge labels or annotations; on conflict `b` wins. Always a fresh map.
pub fn merge_metadata(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = a.clone();
    out.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}
