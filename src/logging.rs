//! Tracing subscriber setup
//!
//! Filter precedence: `SKILLSHEET_LOG`, then `RUST_LOG`, then the configured
//! filter. Output goes to stderr so command output on stdout stays clean.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Pick the filter directive to use
fn directive(configured: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ["SKILLSHEET_LOG", "RUST_LOG"]
        .into_iter()
        .find_map(|name| lookup(name).filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| configured.to_string())
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(configured: &str) {
    let directive = directive(configured, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
