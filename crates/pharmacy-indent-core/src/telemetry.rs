//! Tracing setup for host applications.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or blank.
pub const DEFAULT_FILTER: &str = "pharmacy_indent_core=info";

/// Install a global subscriber, honouring `RUST_LOG`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let json_layer = json.then(|| fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok()
}
