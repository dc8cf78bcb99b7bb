//! Object identity and its string codecs.
//!
//! The plain codec renders `"<namespace>/<name>"` and decodes by splitting on
//! the first `/`. It is only an inverse pair when the namespace contains no
//! `/`; a `/` inside the name survives because the split stops at the first
//! separator. Use [`ObjectKey::to_escaped`] / [`ObjectKey::from_escaped`] when
//! fields may carry the separator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const SEPARATOR: char = '/';

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("missing '/' separator in object key: {0:?}")]
    MissingSeparator(String),
    #[error("invalid escape sequence in object key: {0:?}")]
    BadEscape(String),
}

/// Cache key of a namespaced resource. `namespace` is empty for cluster-scoped kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    pub fn cluster(name: impl Into<String>) -> Self { Self::new("", name) }

    pub fn is_cluster_scoped(&self) -> bool { self.namespace.is_empty() }

    /// Escaped form: `%` and `/` inside fields become `%25` and `%2F`.
    pub fn to_escaped(&self) -> String {
        let mut out = String::with_capacity(self.namespace.len() + self.name.len() + 1);
        escape_into(&self.namespace, &mut out);
        out.push(SEPARATOR);
        escape_into(&self.name, &mut out);
        out
    }

    pub fn from_escaped(s: &str) -> Result<Self, KeyError> {
        let (ns, name) = s.split_once(SEPARATOR).ok_or_else(|| KeyError::MissingSeparator(s.to_string()))?;
        if name.contains(SEPARATOR) {
            return Err(KeyError::BadEscape(s.to_string()));
        }
        let namespace = unescape(ns).ok_or_else(|| KeyError::BadEscape(s.to_string()))?;
        let name = unescape(name).ok_or_else(|| KeyError::BadEscape(s.to_string()))?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, SEPARATOR, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s.split_once(SEPARATOR).ok_or_else(|| KeyError::MissingSeparator(s.to_string()))?;
        Ok(Self::new(namespace, name))
    }
}

fn escape_into(field: &str, out: &mut String) {
    for c in field.chars() {
        match c {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%2F"),
            c => out.push(c),
        }
    }
}

fn unescape(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let code = rest.get(idx + 1..idx + 3)?;
        match code {
            "25" => out.push('%'),
            "2F" | "2f" => out.push(SEPARATOR),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}
