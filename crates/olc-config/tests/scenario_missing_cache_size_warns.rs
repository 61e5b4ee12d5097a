use std::io;
use std::sync::{Arc, Mutex};

use olc_config::{ServiceConfig, DEFAULT_CACHE_SIZE, ENV_CACHE_SIZE};
use serde_json::{json, Value};

/// Validates:
/// 1) A config with no cache size falls back to the default and warns.
/// 2) An explicit null is treated the same as a missing key.
/// 3) An env override supplies the size without the warning.
/// 4) A valid YAML size is taken as-is without the warning.

#[derive(Clone, Default)]
struct LogBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a WARN-level subscriber and return what it logged.
fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buf = LogBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let out = tracing::subscriber::with_default(subscriber, f);
    let logged = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
    (out, logged)
}

fn resolve(config: Value, env: Option<&str>) -> (usize, String) {
    let (cfg, log) = capture_warnings(|| {
        ServiceConfig::from_config_with(&config, |k| {
            (k == ENV_CACHE_SIZE).then(|| env.map(str::to_string)).flatten()
        })
    });
    (cfg.unwrap().cache_size, log)
}

#[test]
fn missing_cache_size_warns_and_uses_default() {
    let (size, log) = resolve(json!({"daemon": {"bind_addr": "127.0.0.1:1"}}), None);
    assert_eq!(size, DEFAULT_CACHE_SIZE);
    assert!(log.contains("WARN"), "expected a warning, got: {log:?}");
    assert!(log.contains("cache size not configured"), "got: {log:?}");
}

#[test]
fn null_cache_size_warns_and_uses_default() {
    let (size, log) = resolve(json!({"cache": {"size": null}}), None);
    assert_eq!(size, DEFAULT_CACHE_SIZE);
    assert!(log.contains("cache size not configured"), "got: {log:?}");
}

#[test]
fn empty_config_without_env_warns() {
    let (size, log) = resolve(json!({}), None);
    assert_eq!(size, DEFAULT_CACHE_SIZE);
    assert!(log.contains("WARN"), "got: {log:?}");
}

#[test]
fn env_cache_size_is_quiet() {
    let (size, log) = resolve(json!({}), Some("4"));
    assert_eq!(size, 4);
    assert!(log.is_empty(), "unexpected log: {log:?}");
}

#[test]
fn configured_cache_size_is_quiet() {
    let (size, log) = resolve(json!({"cache": {"size": 6}}), None);
    assert_eq!(size, 6);
    assert!(log.is_empty(), "unexpected log: {log:?}");
}
