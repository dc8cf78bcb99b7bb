//! Loggable renderings of cached objects.
//!
//! Only the kinds implementing [`Redact`] are sanitized. Anything else handed to
//! [`dump_object`] falls back to its `Debug` output, which is NOT redacted.

use std::collections::BTreeMap;

use gwcache_store::AnyObject;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{unpack_config_map_with_key, ConfigError, Settings, SECRET_SENTINEL};
use crate::resources::{
    ConfigMap, Dataplane, Deployment, Gateway, GatewayClass, GatewayConfig, Service, StaticService, UDPRoute,
};

pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Drop the last-applied annotation and the managed fields.
pub fn strip_metadata(meta: &mut ObjectMeta) {
    if let Some(annotations) = meta.annotations.as_mut() {
        annotations.remove(LAST_APPLIED_ANNOTATION);
        if annotations.is_empty() {
            meta.annotations = None;
        }
    }
    meta.managed_fields = None;
}

/// Rewrite the configuration document of `cm` with secrets replaced. A config
/// map without a decodable document is left alone.
pub fn redact_config_map(cm: &mut ConfigMap, key: &str) {
    let mut conf = match unpack_config_map_with_key(cm, key) {
        Ok(conf) => conf,
        Err(e @ ConfigError::MissingKey(_)) => {
            debug!(error = %e, "configmap carries no runtime config, skipping redaction");
            return;
        }
        Err(e) => {
            warn!(error = %e, key, "undecodable runtime config, dumping configmap unredacted");
            return;
        }
    };
    conf.redact();
    match serde_json::to_string(&conf) {
        Ok(doc) => cm.data = Some(BTreeMap::from([(key.to_string(), doc)])),
        Err(e) => warn!(error = %e, "re-encoding redacted runtime config"),
    }
}

/// Kinds with a known-safe dump.
pub trait Redact: Resource + Serialize + Clone {
    fn redact(&mut self, _settings: &Settings) { strip_metadata(self.meta_mut()) }
}

impl Redact for Service {}
impl Redact for Deployment {}
impl Redact for StaticService {}
impl Redact for Dataplane {}
impl Redact for GatewayClass {}
impl Redact for Gateway {}
impl Redact for UDPRoute {}

impl Redact for ConfigMap {
    fn redact(&mut self, settings: &Settings) {
        strip_metadata(&mut self.metadata);
        redact_config_map(self, &settings.config_file_key);
    }
}

impl Redact for GatewayConfig {
    fn redact(&mut self, _settings: &Settings) {
        strip_metadata(&mut self.metadata);
        for v in [&mut self.spec.username, &mut self.spec.password, &mut self.spec.shared_secret] {
            if v.is_some() {
                *v = Some(SECRET_SENTINEL.to_string());
            }
        }
    }
}

/// JSON rendering that never fails: errors turn into a placeholder.
pub fn render_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> String {
    let res = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    res.unwrap_or_else(|e| {
        warn!(error = %e, "dump serialization failed");
        format!("<dump error: {e}>")
    })
}

pub fn dump<K: Redact>(obj: &K) -> String { dump_with(obj, &Settings::default()) }

/// Redacted JSON of a copy of `obj`; the original is not touched.
pub fn dump_with<K: Redact>(obj: &K, settings: &Settings) -> String {
    let mut copy = obj.clone();
    copy.redact(settings);
    render_json(&copy, settings.dump_pretty)
}

pub fn dump_object(obj: &dyn AnyObject) -> String { dump_object_with(obj, &Settings::default()) }

/// Dispatch on the concrete kind; unknown kinds get a raw `Debug` dump.
pub fn dump_object_with(obj: &dyn AnyObject, settings: &Settings) -> String {
    let any = obj.as_any();
    macro_rules! redacted_kinds {
        ($($kind:ty),+ $(,)?) => {$(
            if let Some(o) = any.downcast_ref::<$kind>() {
                return dump_with(o, settings);
            }
        )+};
    }
    redacted_kinds!(
        Service,
        ConfigMap,
        Deployment,
        StaticService,
        GatewayConfig,
        Dataplane,
        GatewayClass,
        Gateway,
        UDPRoute,
    );

    debug!(ty = obj.type_name(), "no redaction rule, raw dump");
    format!("{obj:?}")
}
