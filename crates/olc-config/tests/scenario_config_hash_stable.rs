//! Config hash stability.
//!
//! GREEN when:
//! - `load_layered_yaml_from_strings` called twice on the same inputs returns
//!   identical config_hash.
//! - Reordering keys within YAML doesn't change the hash (canonicalization).
//! - Different values produce different hashes.
//! - Overlays take effect and the typed config reflects them.

use olc_config::{load_layered_yaml_from_strings, ServiceConfig};

const BASE_YAML: &str = r#"
cache:
  size: 10
daemon:
  bind_addr: "127.0.0.1:8899"
db:
  url_env: "OLC_DATABASE_URL"
  max_connections: 10
query:
  timeout_ms: 2000
"#;

/// Same content as BASE_YAML but with keys in different order.
const BASE_YAML_REORDERED: &str = r#"
query:
  timeout_ms: 2000
db:
  max_connections: 10
  url_env: "OLC_DATABASE_URL"
daemon:
  bind_addr: "127.0.0.1:8899"
cache:
  size: 10
"#;

const OVERLAY_YAML: &str = r#"
cache:
  size: 3
query:
  timeout_ms: 500
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash (canonicalization)"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_reaches_typed_config() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let cfg = ServiceConfig::from_config_json(&loaded.config_json).unwrap();

    assert_eq!(cfg.cache_size, 3, "overlay should override base cache.size");
    assert_eq!(cfg.query_timeout.as_millis(), 500);
    // Untouched base keys survive the merge.
    assert_eq!(cfg.db_max_connections, 10);
    assert_eq!(cfg.bind_addr.port(), 8899);
}

#[test]
fn empty_overlay_keeps_base() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
