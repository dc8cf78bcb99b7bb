//! Per-kind registry of typed views, built once and handed to workers.

use std::sync::Arc;

use gwcache_core::{BackendRef, CachedObject, Delta, DeltaKind, ObjectKey, RefTarget};
use gwcache_store::{AnyObject, StoreError, TypedView};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::resources::{
    ConfigMap, Dataplane, Deployment, Gateway, GatewayClass, GatewayConfig, Service, StaticService, UDPRoute,
};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported kind {kind:?} (apiVersion {api_version:?})")]
    UnsupportedKind { api_version: String, kind: String },
    #[error("object has no metadata.name")]
    MissingName,
    #[error("decoding {kind}: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("unsupported backend reference {0}")]
    UnsupportedRef(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A resolved backend reference.
#[derive(Debug, Clone)]
pub enum Backend {
    Service(Arc<Service>),
    StaticService(Arc<StaticService>),
}

/// One typed store per kind. Clones share the same stores.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    pub services: TypedView<Service>,
    pub config_maps: TypedView<ConfigMap>,
    pub deployments: TypedView<Deployment>,
    pub static_services: TypedView<StaticService>,
    pub gateway_configs: TypedView<GatewayConfig>,
    pub dataplanes: TypedView<Dataplane>,
    pub gateway_classes: TypedView<GatewayClass>,
    pub gateways: TypedView<Gateway>,
    pub udp_routes: TypedView<UDPRoute>,
}

impl Default for ResourceCache {
    fn default() -> Self { Self::new() }
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            services: TypedView::new("Service"),
            config_maps: TypedView::new("ConfigMap"),
            deployments: TypedView::new("Deployment"),
            static_services: TypedView::new("StaticService"),
            gateway_configs: TypedView::new("GatewayConfig"),
            dataplanes: TypedView::new("Dataplane"),
            gateway_classes: TypedView::new("GatewayClass"),
            gateways: TypedView::new("Gateway"),
            udp_routes: TypedView::new("UDPRoute"),
        }
    }

    /// Route a raw object to the view of its kind: `Applied` upserts, `Deleted` removes.
    pub fn ingest(&self, delta: Delta) -> Result<ObjectKey, IngestError> {
        let (api_version, kind) = delta.type_meta();
        let (api_version, kind) = (api_version.to_string(), kind.to_string());
        let res = if is_kind::<Service>(&api_version, &kind) {
            route(&self.services, delta)
        } else if is_kind::<ConfigMap>(&api_version, &kind) {
            route(&self.config_maps, delta)
        } else if is_kind::<Deployment>(&api_version, &kind) {
            route(&self.deployments, delta)
        } else if is_kind::<StaticService>(&api_version, &kind) {
            route(&self.static_services, delta)
        } else if is_kind::<GatewayConfig>(&api_version, &kind) {
            route(&self.gateway_configs, delta)
        } else if is_kind::<Dataplane>(&api_version, &kind) {
            route(&self.dataplanes, delta)
        } else if is_kind::<GatewayClass>(&api_version, &kind) {
            route(&self.gateway_classes, delta)
        } else if is_kind::<Gateway>(&api_version, &kind) {
            route(&self.gateways, delta)
        } else if is_kind::<UDPRoute>(&api_version, &kind) {
            route(&self.udp_routes, delta)
        } else {
            Err(IngestError::UnsupportedKind { api_version, kind })
        };
        if let Err(e) = &res {
            warn!(error = %e, "ingest rejected object");
        }
        res
    }

    /// Look up the object a backend reference points at.
    ///
    /// `Ok(None)` means the reference is well-formed but its target is not cached.
    pub fn get_backend(&self, r: &BackendRef, referrer_namespace: &str) -> Result<Option<Backend>, LookupError> {
        let key = r.target_key(referrer_namespace);
        match RefTarget::classify(r) {
            Some(RefTarget::Service) => Ok(self.services.get(&key)?.map(Backend::Service)),
            Some(RefTarget::StaticService) => Ok(self.static_services.get(&key)?.map(Backend::StaticService)),
            None => Err(LookupError::UnsupportedRef(r.to_string())),
        }
    }

    /// Object counts per kind, for status lines.
    pub fn counts(&self) -> [(&'static str, usize); 9] {
        [
            ("Service", self.services.len()),
            ("ConfigMap", self.config_maps.len()),
            ("Deployment", self.deployments.len()),
            ("StaticService", self.static_services.len()),
            ("GatewayConfig", self.gateway_configs.len()),
            ("Dataplane", self.dataplanes.len()),
            ("GatewayClass", self.gateway_classes.len()),
            ("Gateway", self.gateways.len()),
            ("UDPRoute", self.udp_routes.len()),
        ]
    }
}

fn is_kind<K: Resource<DynamicType = ()>>(api_version: &str, kind: &str) -> bool {
    K::api_version(&()) == api_version && K::kind(&()) == kind
}

fn route<K>(view: &TypedView<K>, delta: Delta) -> Result<ObjectKey, IngestError>
where
    K: AnyObject + Resource<DynamicType = ()> + DeserializeOwned,
{
    let kind = K::kind(&()).to_string();
    match delta.kind {
        DeltaKind::Applied => {
            let obj: K = serde_json::from_value(delta.raw).map_err(|source| IngestError::Decode { kind, source })?;
            if obj.meta().name.is_none() {
                return Err(IngestError::MissingName);
            }
            let key = obj.key();
            debug!(kind = %K::kind(&()), key = %key, generation = ?obj.meta().generation, "applied");
            view.upsert(obj);
            Ok(key)
        }
        DeltaKind::Deleted => {
            // deletions only need the identity; the body may be a tombstone
            let meta = delta.raw.get("metadata").cloned().unwrap_or_else(|| serde_json::json!({}));
            let meta: ObjectMeta = serde_json::from_value(meta).map_err(|source| IngestError::Decode { kind, source })?;
            let name = meta.name.ok_or(IngestError::MissingName)?;
            let key = ObjectKey::new(meta.namespace.unwrap_or_default(), name);
            debug!(kind = %K::kind(&()), key = %key, "deleted");
            view.delete(&key);
            Ok(key)
        }
    }
}
