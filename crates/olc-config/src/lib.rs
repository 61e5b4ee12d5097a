use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub mod secrets;
pub mod service;

pub use service::{parse_capacity, ServiceConfig, DEFAULT_CACHE_SIZE, ENV_CACHE_SIZE};

/// Known secret-like prefixes / patterns. If any leaf string value in the
/// effective config starts with one of these, loading aborts with
/// CONFIG_SECRET_DETECTED. Config files name env vars; they never carry
/// credentials themselves.
const SECRET_PREFIXES: &[&str] = &[
    "postgres://",   // connection string with inline credentials
    "postgresql://", // same, long scheme
    "sk-",           // API-key style
    "AKIA",          // AWS access key ID
    "-----BEGIN",    // PEM private keys
    "ghp_",          // GitHub PAT
    "glpat-",        // GitLab PAT
];

/// JSON-pointer prefixes the service actually reads.
///
/// Keep this in sync with `ServiceConfig::from_config_json`; a key outside
/// these prefixes is reported as unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/cache/size",
    "/daemon/bind_addr",
    "/db/url_env",
    "/db/max_connections",
    "/query/timeout_ms",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

/// Leaf keys present in the config that nothing reads.
#[derive(Debug, Clone, Serialize)]
pub struct UnusedKeyReport {
    /// JSON pointers, sorted and unique.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report every config leaf not covered by [`CONSUMED_POINTERS`].
///
/// `Fail` turns a non-empty report into a `CONFIG_UNUSED_KEYS` error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !CONSUMED_POINTERS.iter().any(|c| covers(c, ptr)))
        .collect();
    unused.sort();
    unused.dedup();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        let shown: Vec<&str> = unused.iter().take(12).map(String::as_str).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config key(s); remove them or add them to \
            CONSUMED_POINTERS. First few: {shown:?}",
            unused.len()
        );
    }

    Ok(UnusedKeyReport {
        unused_leaf_pointers: unused,
    })
}

/// `/cache/size` covers itself and `/cache/size/...`, never `/cache/sizes`.
fn covers(consumed: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(consumed) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Every scalar in `v` with its JSON pointer, in document order.
fn leaves(v: &Value) -> Vec<(String, &Value)> {
    fn walk<'a>(v: &'a Value, at: String, out: &mut Vec<(String, &'a Value)>) {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    walk(child, format!("{at}/{token}"), out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    walk(child, format!("{at}/{i}"), out);
                }
            }
            scalar if at.is_empty() => out.push(("/".to_string(), scalar)),
            scalar => out.push((at, scalar)),
        }
    }

    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

// ---------------------------------------------------------------------------
// Layered YAML loading
// ---------------------------------------------------------------------------

/// Merged config plus its stable fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 of `canonical_json`, hex.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read and merge YAML files; later paths override earlier ones.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let layer = serde_json::to_value(layer).context("yaml->json conversion failed")?;
        overlay(&mut merged, layer);
    }

    reject_secret_literals(&merged)?;

    // serde_json's default Map is key-ordered, so serialization is canonical
    // regardless of key order in the source documents.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Deep-merge `layer` into `base`. Objects merge per key; anything else
/// replaces. A null layer (an empty YAML file) leaves `base` untouched.
fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (k, v) in layer_map {
                overlay(base_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, v) => *slot = v,
    }
}

fn reject_secret_literals(v: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(v) {
        let Some(s) = leaf.as_str().map(str::trim) else {
            continue;
        };
        if s.len() >= 8 && SECRET_PREFIXES.iter().any(|p| s.starts_with(p)) {
            bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
        }
    }
    Ok(())
}
