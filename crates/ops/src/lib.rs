//! Ambient operational concerns shared across the shuffle core: structured
//! logging helpers and the Prometheus metrics this process exports.

pub mod metrics;

/// Wraps a `serde::Serialize` value so it's only ever JSON-encoded when a
/// `tracing` subscriber actually asks for its `Display`/`Debug` output,
/// rather than eagerly on every log call site.
pub struct DebugJson<T>(pub T);

impl<T: serde::Serialize> std::fmt::Debug for DebugJson<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(err) => write!(f, "<DebugJson serialization error: {err}>"),
        }
    }
}

impl<T: serde::Serialize> std::fmt::Display for DebugJson<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Installs a `tracing-subscriber` formatter appropriate for the process,
/// reading `RUST_LOG` for directives the way every other Flow binary does.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_json_formats_as_json() {
        let wrapped = DebugJson(json!({"a": 1}));
        assert_eq!(format!("{wrapped:?}"), r#"{"a":1}"#);
    }
}
