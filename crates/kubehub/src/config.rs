//! Runtime configuration document carried inside a ConfigMap, and the
//! environment-driven settings of this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::resources::ConfigMap;

/// ConfigMap data key holding the JSON document.
pub const DEFAULT_CONFIG_FILE_KEY: &str = "stunnerd.conf";
/// Replacement for every redacted value.
pub const SECRET_SENTINEL: &str = "-SECRET-";
/// Credential entries that never reach a log line.
pub const CREDENTIAL_KEYS: [&str; 3] = ["username", "password", "secret"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configmap data key {0:?} not found")]
    MissingKey(String),
    #[error("decoding configuration document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Settings read from `GWCACHE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `GWCACHE_CONFIGFILE_KEY`
    pub config_file_key: String,
    /// `GWCACHE_DUMP_PRETTY`
    pub dump_pretty: bool,
}

impl Default for Settings {
    fn default() -> Self { Self { config_file_key: DEFAULT_CONFIG_FILE_KEY.to_string(), dump_pretty: false } }
}

impl Settings {
    pub fn from_env() -> Self { Self::from_lookup(|name| std::env::var(name).ok()) }

    /// Build settings from any variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut s = Self::default();
        if let Some(key) = lookup("GWCACHE_CONFIGFILE_KEY").filter(|k| !k.is_empty()) {
            s.config_file_key = key;
        }
        s.dump_pretty = lookup("GWCACHE_DUMP_PRETTY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        s
    }
}

/// Go encoders write nil slices and maps as `null`; read that as empty.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

/// The dataplane configuration document. Fields the cache does not interpret are
/// kept verbatim in `extra` so a decode/encode pass changes nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminConfig>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auth: AuthConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub loglevel: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realm: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cert: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuntimeConfig {
    /// Replace credentials and listener key material with [`SECRET_SENTINEL`].
    pub fn redact(&mut self) {
        for k in CREDENTIAL_KEYS {
            if let Some(v) = self.auth.credentials.get_mut(k) {
                *v = SECRET_SENTINEL.to_string();
            }
        }
        for l in &mut self.listeners {
            if !l.cert.is_empty() {
                l.cert = SECRET_SENTINEL.to_string();
            }
            if !l.key.is_empty() {
                l.key = SECRET_SENTINEL.to_string();
            }
        }
    }
}

pub fn unpack_config_map(cm: &ConfigMap) -> Result<RuntimeConfig, ConfigError> {
    unpack_config_map_with_key(cm, DEFAULT_CONFIG_FILE_KEY)
}

pub fn unpack_config_map_with_key(cm: &ConfigMap, key: &str) -> Result<RuntimeConfig, ConfigError> {
    let doc = cm
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
    Ok(serde_json::from_str(doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(key: &str, doc: &str) -> ConfigMap {
        ConfigMap { data: Some(BTreeMap::from([(key.to_string(), doc.to_string())])), ..ConfigMap::default() }
    }

    const DOC: &str = r#"{
        "version": "v1",
        "admin": {"name": "gw", "loglevel": "all:INFO", "healthcheck_endpoint": "http://:8086"},
        "auth": {"type": "static", "realm": "stunner.l7mp.io", "credentials": {"username": "user", "password": "hunter2"}},
        "listeners": [{"name": "udp", "protocol": "TURN-UDP", "port": 3478, "routes": ["media"]},
                      {"name": "tls", "protocol": "TURN-TLS", "port": 443, "cert": "PEM...", "key": "KEY..."}],
        "clusters": [{"name": "media", "type": "STATIC", "endpoints": ["10.0.0.0/8"]}]
    }"#;

    #[test]
    fn unpacks_document() {
        let conf = unpack_config_map(&cm(DEFAULT_CONFIG_FILE_KEY, DOC)).unwrap();
        assert_eq!(conf.auth.auth_type, "static");
        assert_eq!(conf.auth.credentials["password"], "hunter2");
        assert_eq!(conf.listeners.len(), 2);
        assert_eq!(conf.listeners[1].cert, "PEM...");
        assert_eq!(conf.admin.as_ref().unwrap().extra["healthcheck_endpoint"], "http://:8086");
    }

    #[test]
    fn missing_key() {
        let err = unpack_config_map(&cm("other.conf", DOC)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(k) if k == DEFAULT_CONFIG_FILE_KEY));
        assert!(matches!(unpack_config_map(&ConfigMap::default()), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn custom_key() {
        assert!(unpack_config_map_with_key(&cm("alt.conf", DOC), "alt.conf").is_ok());
    }

    #[test]
    fn decode_error() {
        let err = unpack_config_map(&cm(DEFAULT_CONFIG_FILE_KEY, "{not json")).unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn null_collections_read_as_empty() {
        let doc = r#"{"version":"v1","auth":{"type":"static","credentials":{"password":"hunter2"}},
            "listeners":[{"name":"tls","cert":"PEM-CERT","key":"PEM-KEY","routes":null}],"clusters":null}"#;
        let mut conf = unpack_config_map(&cm(DEFAULT_CONFIG_FILE_KEY, doc)).unwrap();
        assert!(conf.clusters.is_empty());
        assert!(conf.listeners[0].routes.is_empty());
        conf.redact();
        assert_eq!(conf.auth.credentials["password"], SECRET_SENTINEL);
        assert_eq!(conf.listeners[0].key, SECRET_SENTINEL);

        let conf = unpack_config_map(&cm(DEFAULT_CONFIG_FILE_KEY, r#"{"auth":{"credentials":null},"listeners":null}"#)).unwrap();
        assert!(conf.auth.credentials.is_empty());
        assert!(conf.listeners.is_empty());
        let conf = unpack_config_map(&cm(DEFAULT_CONFIG_FILE_KEY, r#"{"auth":null}"#)).unwrap();
        assert_eq!(conf.auth, AuthConfig::default());
    }

    #[test]
    fn redact_replaces_only_secrets() {
        let mut conf = unpack_config_map(&cm(DEFAULT_CONFIG_FILE_KEY, DOC)).unwrap();
        let before = conf.clone();
        conf.redact();

        assert_eq!(conf.auth.credentials["username"], SECRET_SENTINEL);
        assert_eq!(conf.auth.credentials["password"], SECRET_SENTINEL);
        assert!(!conf.auth.credentials.contains_key("secret"));
        assert_eq!(conf.listeners[0].cert, "");
        assert_eq!(conf.listeners[1].cert, SECRET_SENTINEL);
        assert_eq!(conf.listeners[1].key, SECRET_SENTINEL);

        // everything else is untouched
        assert_eq!(conf.auth.realm, before.auth.realm);
        assert_eq!(conf.listeners[0], before.listeners[0]);
        assert_eq!(conf.clusters, before.clusters);
        assert_eq!(conf.admin, before.admin);
    }

    #[test]
    fn settings_default() {
        let s = Settings::default();
        assert_eq!(s.config_file_key, DEFAULT_CONFIG_FILE_KEY);
        assert!(!s.dump_pretty);
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    }

    #[test]
    fn settings_from_variables() {
        assert_eq!(Settings::from_lookup(lookup(&[])), Settings::default());

        let s = Settings::from_lookup(lookup(&[("GWCACHE_CONFIGFILE_KEY", "alt.conf"), ("GWCACHE_DUMP_PRETTY", "1")]));
        assert_eq!(s.config_file_key, "alt.conf");
        assert!(s.dump_pretty);

        let s = Settings::from_lookup(lookup(&[("GWCACHE_CONFIGFILE_KEY", ""), ("GWCACHE_DUMP_PRETTY", "TRUE")]));
        assert_eq!(s.config_file_key, DEFAULT_CONFIG_FILE_KEY);
        assert!(s.dump_pretty);

        for off in ["0", "false", "yes", ""] {
            assert!(!Settings::from_lookup(lookup(&[("GWCACHE_DUMP_PRETTY", off)])).dump_pretty, "{off}");
        }
    }
}
