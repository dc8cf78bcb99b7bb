//! Route references (parents and backends) and the classification of
//! backends into target kinds.
//!
//! Gateway-style defaulting applies: an absent (or empty) group means the core
//! API group, an absent kind means `Service`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ObjectKey;

/// Core API group (empty string).
pub const CORE_GROUP: &str = "";
/// Group of the custom kinds served next to the gateway API.
pub const STUNNER_GROUP: &str = "stunner.l7mp.io";
pub const SERVICE_KIND: &str = "Service";
pub const STATIC_SERVICE_KIND: &str = "StaticService";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl BackendRef {
    pub fn named(name: impl Into<String>) -> Self { Self { name: name.into(), ..Self::default() } }

    pub fn with_group(mut self, group: impl Into<String>) -> Self { self.group = Some(group.into()); self }
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self { self.kind = Some(kind.into()); self }
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self { self.namespace = Some(ns.into()); self }

    pub fn effective_group(&self) -> &str { self.group.as_deref().unwrap_or(CORE_GROUP) }
    pub fn effective_kind(&self) -> &str { self.kind.as_deref().unwrap_or(SERVICE_KIND) }

    /// Key of the referent; the namespace defaults to the referring object's.
    pub fn target_key(&self, referrer_namespace: &str) -> ObjectKey {
        ObjectKey::new(self.namespace.as_deref().unwrap_or(referrer_namespace), self.name.as_str())
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NIL: &str = "<NIL>";
        write!(
            f,
            "{{Group: {}, Kind: {}, Namespace: {}, Name: {}}}",
            self.group.as_deref().unwrap_or(NIL),
            self.kind.as_deref().unwrap_or(NIL),
            self.namespace.as_deref().unwrap_or(NIL),
            self.name
        )
    }
}

/// Reference from a route to the gateway (listener) it attaches to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    /// Listener name within the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl ParentRef {
    pub fn named(name: impl Into<String>) -> Self { Self { name: name.into(), ..Self::default() } }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self { self.namespace = Some(ns.into()); self }
    pub fn with_section(mut self, section: impl Into<String>) -> Self { self.section_name = Some(section.into()); self }

    pub fn target_key(&self, referrer_namespace: &str) -> ObjectKey {
        ObjectKey::new(self.namespace.as_deref().unwrap_or(referrer_namespace), self.name.as_str())
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NIL: &str = "<NIL>";
        write!(
            f,
            "{{Group: {}, Kind: {}, Namespace: {}, Name: {}, SectionName: {}}}",
            self.group.as_deref().unwrap_or(NIL),
            self.kind.as_deref().unwrap_or(NIL),
            self.namespace.as_deref().unwrap_or(NIL),
            self.name,
            self.section_name.as_deref().unwrap_or(NIL)
        )
    }
}

/// Closed set of kinds a backend reference may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefTarget {
    Service,
    StaticService,
}

impl RefTarget {
    pub const ALL: [RefTarget; 2] = [RefTarget::Service, RefTarget::StaticService];

    pub fn group(self) -> &'static str {
        match self {
            RefTarget::Service => CORE_GROUP,
            RefTarget::StaticService => STUNNER_GROUP,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            RefTarget::Service => SERVICE_KIND,
            RefTarget::StaticService => STATIC_SERVICE_KIND,
        }
    }

    pub fn matches(self, r: &BackendRef) -> bool {
        r.effective_group() == self.group() && r.effective_kind() == self.kind()
    }

    /// `None` means an unsupported kind, which callers must keep apart from
    /// having no reference at all.
    pub fn classify(r: &BackendRef) -> Option<RefTarget> {
        Self::ALL.into_iter().find(|t| t.matches(r))
    }
}

pub fn is_reference_service(r: &BackendRef) -> bool { RefTarget::Service.matches(r) }

pub fn is_reference_static_service(r: &BackendRef) -> bool { RefTarget::StaticService.matches(r) }
