//! A global `tracing` subscriber for this crate's own integration tests
//! and any standalone binary that embeds the coordination core directly,
//! rather than running under a host process that's already wired up its
//! own subscriber.

/// Install a global subscriber reading `RUST_LOG`, writing to stderr. Safe
/// to call more than once; only the first call takes effect.
pub fn init() {
    static SUBSCRIBE: std::sync::Once = std::sync::Once::new();

    SUBSCRIBE.call_once(|| {
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
