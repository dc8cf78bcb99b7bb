//! gwcache kubehub: Kubernetes kinds, redacted dumps and the per-kind cache.
//!
//! The watch layer lives outside this crate; it hands [`gwcache_core::Delta`]s
//! to [`ResourceCache::ingest`] or writes to the typed views directly.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod redact;
pub mod resources;

pub use cache::{Backend, IngestError, LookupError, ResourceCache};
pub use config::{unpack_config_map, unpack_config_map_with_key, ConfigError, RuntimeConfig, Settings, SECRET_SENTINEL};
pub use redact::{dump, dump_object, dump_object_with, dump_with, Redact};
pub use resources::{
    is_owner, ConfigMap, Dataplane, DataplaneSpec, Deployment, Gateway, GatewayClass, GatewayClassSpec, GatewayConfig,
    GatewayConfigSpec, GatewaySpec, Service, StaticService, StaticServiceSpec, UDPRoute, UdpRouteRule, UdpRouteSpec,
};
