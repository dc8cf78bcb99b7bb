use std::io::Read;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use gwcache_core::{is_unchanged, BackendRef, CachedObject, Delta, ObjectKey, RefTarget};
use gwcache_kubehub::{dump_with, LookupError, Redact, ResourceCache, Settings};
use gwcache_store::{AnyObject, TypedView};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "gwcachectl", version, about = "Inspect cached control-plane state built from manifests")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Manifest files to load into the cache ("-" for stdin)
    #[arg(short = 'f', long = "file", global = true)]
    files: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List cached objects with their generation
    Ls,
    /// Print redacted dumps of cached objects
    Dump {
        /// Only this kind, e.g. "ConfigMap"
        #[arg(long = "kind")]
        kind: Option<String>,
    },
    /// Compare two manifest sets by identity and generation
    Changes {
        #[arg(long = "old")]
        old: Vec<String>,
        #[arg(long = "new")]
        new: Vec<String>,
    },
    /// Classify a backend reference and resolve it against the cache
    Classify {
        name: String,
        #[arg(long = "group")]
        group: Option<String>,
        #[arg(long = "kind")]
        kind: Option<String>,
        #[arg(long = "namespace")]
        namespace: Option<String>,
        /// Namespace of the referring route
        #[arg(long = "from-ns", default_value = "default")]
        from_ns: String,
    },
    /// Encode or decode object keys
    Key {
        #[command(subcommand)]
        cmd: KeyCmd,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCmd {
    Encode {
        namespace: String,
        name: String,
        /// Use the escaped form, safe for '/' inside fields
        #[arg(long = "escaped", action = ArgAction::SetTrue)]
        escaped: bool,
    },
    Decode {
        key: String,
        #[arg(long = "escaped", action = ArgAction::SetTrue)]
        escaped: bool,
    },
}

#[derive(Debug, Serialize)]
struct Row {
    kind: &'static str,
    key: String,
    generation: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
enum ChangeKind { Added, Changed, Removed, Unchanged }

#[derive(Debug, Serialize)]
struct Change {
    kind: &'static str,
    key: String,
    change: ChangeKind,
}

/// Expand `$body` once per typed view of a cache, binding the kind name and the view.
macro_rules! for_each_view {
    ($cache:expr, |$kind:ident, $view:ident| $body:block) => {{
        let c = &$cache;
        { let $kind = "Service"; let $view = &c.services; $body }
        { let $kind = "ConfigMap"; let $view = &c.config_maps; $body }
        { let $kind = "Deployment"; let $view = &c.deployments; $body }
        { let $kind = "StaticService"; let $view = &c.static_services; $body }
        { let $kind = "GatewayConfig"; let $view = &c.gateway_configs; $body }
        { let $kind = "Dataplane"; let $view = &c.dataplanes; $body }
        { let $kind = "GatewayClass"; let $view = &c.gateway_classes; $body }
        { let $kind = "Gateway"; let $view = &c.gateways; $body }
        { let $kind = "UDPRoute"; let $view = &c.udp_routes; $body }
    }};
}

fn init_tracing() {
    let env = std::env::var("GWCACHE_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn read_source(path: &str) -> Result<String> {
    if path == "-" {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s).context("reading manifests from stdin")?;
        Ok(s)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading manifests from {}", path))
    }
}

/// Load every YAML document of `paths` into a fresh cache. Unsupported kinds are skipped.
fn load(paths: &[String]) -> Result<ResourceCache> {
    let cache = ResourceCache::new();
    let (mut loaded, mut skipped) = (0usize, 0usize);
    for path in paths {
        let src = read_source(path)?;
        for doc in serde_yaml::Deserializer::from_str(&src) {
            let raw = serde_json::Value::deserialize(doc).with_context(|| format!("parsing YAML in {}", path))?;
            if raw.is_null() {
                continue;
            }
            match cache.ingest(Delta::applied(raw)) {
                Ok(key) => {
                    debug!(key = %key, "loaded");
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping document");
                    skipped += 1;
                }
            }
        }
    }
    info!(loaded, skipped, "manifests loaded");
    Ok(cache)
}

fn list_rows<K: AnyObject>(kind: &'static str, view: &TypedView<K>, out: &mut Vec<Row>) -> Result<()> {
    for o in view.get_all()? {
        out.push(Row { kind, key: o.key().to_string(), generation: o.generation() });
    }
    Ok(())
}

fn dump_view<K: AnyObject + Redact>(kind: &'static str, view: &TypedView<K>, settings: &Settings) -> Result<Vec<(String, String)>> {
    let mut objs = view.get_all()?;
    objs.sort_by_key(|o| o.key());
    Ok(objs.iter().map(|o| (format!("{} {}", kind, o.key()), dump_with(&**o, settings))).collect())
}

fn diff_view<K: AnyObject>(kind: &'static str, old: &TypedView<K>, new: &TypedView<K>, out: &mut Vec<Change>) -> Result<()> {
    for o in new.get_all()? {
        let key = o.key();
        let change = match old.get(&key)? {
            None => ChangeKind::Added,
            Some(prev) if is_unchanged(&*prev, &*o) => ChangeKind::Unchanged,
            Some(_) => ChangeKind::Changed,
        };
        out.push(Change { kind, key: key.to_string(), change });
    }
    for o in old.get_all()? {
        if !new.contains(&o.key()) {
            out.push(Change { kind, key: o.key().to_string(), change: ChangeKind::Removed });
        }
    }
    Ok(())
}

/// Whether the referent is cached; `None` for references of an unsupported kind.
fn is_cached(cache: &ResourceCache, r: &BackendRef, referrer_namespace: &str) -> Result<Option<bool>> {
    match cache.get_backend(r, referrer_namespace) {
        Ok(found) => Ok(Some(found.is_some())),
        Err(LookupError::UnsupportedRef(_)) => Ok(None),
        Err(e) => Err(e).context("resolving backend reference"),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Ls => {
            let cache = load(&cli.files)?;
            let mut rows = Vec::new();
            for_each_view!(cache, |kind, view| { list_rows(kind, view, &mut rows)?; });
            rows.sort_by(|a, b| a.kind.cmp(b.kind).then_with(|| a.key.cmp(&b.key)));
            match cli.output {
                Output::Human => {
                    for r in rows {
                        let gen = r.generation.map(|g| g.to_string()).unwrap_or_else(|| "-".into());
                        println!("{:<14} {:<48} {}", r.kind, r.key, gen);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        Commands::Dump { kind } => {
            let cache = load(&cli.files)?;
            let mut dumps = Vec::new();
            for_each_view!(cache, |k, view| {
                if kind.as_deref().map_or(true, |want| want.eq_ignore_ascii_case(k)) {
                    dumps.extend(dump_view(k, view, &settings)?);
                }
            });
            match cli.output {
                Output::Human => {
                    for (title, body) in dumps {
                        println!("# {}\n{}", title, body);
                    }
                }
                Output::Json => {
                    let docs: Vec<serde_json::Value> =
                        dumps.iter().map(|(_, body)| serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.clone()))).collect();
                    println!("{}", serde_json::to_string_pretty(&docs)?);
                }
            }
        }
        Commands::Changes { old, new } => {
            let (old, new) = (load(&old)?, load(&new)?);
            let mut changes = Vec::new();
            diff_view("Service", &old.services, &new.services, &mut changes)?;
            diff_view("ConfigMap", &old.config_maps, &new.config_maps, &mut changes)?;
            diff_view("Deployment", &old.deployments, &new.deployments, &mut changes)?;
            diff_view("StaticService", &old.static_services, &new.static_services, &mut changes)?;
            diff_view("GatewayConfig", &old.gateway_configs, &new.gateway_configs, &mut changes)?;
            diff_view("Dataplane", &old.dataplanes, &new.dataplanes, &mut changes)?;
            diff_view("GatewayClass", &old.gateway_classes, &new.gateway_classes, &mut changes)?;
            diff_view("Gateway", &old.gateways, &new.gateways, &mut changes)?;
            diff_view("UDPRoute", &old.udp_routes, &new.udp_routes, &mut changes)?;
            changes.sort_by(|a, b| a.change.cmp(&b.change).then(a.kind.cmp(b.kind)).then_with(|| a.key.cmp(&b.key)));
            match cli.output {
                Output::Human => {
                    for c in changes.iter().filter(|c| c.change != ChangeKind::Unchanged) {
                        println!("{:<9} {:<14} {}", format!("{:?}", c.change).to_lowercase(), c.kind, c.key);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
            }
        }
        Commands::Classify { name, group, kind, namespace, from_ns } => {
            let r = BackendRef { group, kind, namespace, name };
            let target = RefTarget::classify(&r);
            let key = r.target_key(&from_ns);
            let cached = if cli.files.is_empty() { None } else { is_cached(&load(&cli.files)?, &r, &from_ns)? };
            match cli.output {
                Output::Human => {
                    let t = target.map(|t| format!("{:?}", t)).unwrap_or_else(|| "unsupported".into());
                    println!("{} -> {} {}", r, t, key);
                    if let Some(found) = cached {
                        println!("cached: {}", found);
                    }
                }
                Output::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "ref": r,
                        "target": target,
                        "key": key.to_string(),
                        "cached": cached,
                    }))?
                ),
            }
        }
        Commands::Key { cmd } => match cmd {
            KeyCmd::Encode { namespace, name, escaped } => {
                let key = ObjectKey::new(namespace, name);
                println!("{}", if escaped { key.to_escaped() } else { key.to_string() });
            }
            KeyCmd::Decode { key, escaped } => {
                let parsed = if escaped { ObjectKey::from_escaped(&key)? } else { ObjectKey::from_str(&key)? };
                match cli.output {
                    Output::Human => println!("namespace={:?} name={:?}", parsed.namespace, parsed.name),
                    Output::Json => println!("{}", serde_json::to_string_pretty(&parsed)?),
                }
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwcache_kubehub::{Service, StaticService, StaticServiceSpec};
    use gwcache_store::ErasedStore;
    use std::sync::Arc;

    #[test]
    fn cached_lookup_reports_presence() {
        let cache = ResourceCache::new();
        let mut svc = Service::default();
        svc.metadata.namespace = Some("team-a".into());
        svc.metadata.name = Some("svc".into());
        cache.services.upsert(svc);

        assert_eq!(is_cached(&cache, &BackendRef::named("svc"), "team-a").unwrap(), Some(true));
        assert_eq!(is_cached(&cache, &BackendRef::named("other"), "team-a").unwrap(), Some(false));
        let foreign = BackendRef::named("svc").with_group("other.io");
        assert_eq!(is_cached(&cache, &foreign, "team-a").unwrap(), None);
    }

    #[test]
    fn cached_lookup_surfaces_store_errors() {
        let shared = ErasedStore::new("Service");
        let mut cache = ResourceCache::new();
        cache.services = TypedView::over(shared.clone());
        let stray = StaticService::new("svc", StaticServiceSpec::default());
        shared.upsert_arc(ObjectKey::new("team-a", "svc"), Arc::new(stray));

        let err = is_cached(&cache, &BackendRef::named("svc"), "team-a").unwrap_err();
        assert!(err.chain().any(|e| e.to_string().contains("StaticService")), "{err:#}");
    }
}
