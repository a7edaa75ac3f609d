use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "info";

/// Installs the global subscriber. `RUST_LOG` overrides `directives`; `LOG_FORMAT` picks
/// `json`, `compact` or `pretty` output, anything else gives the full format.
///
/// Returns false when a subscriber was already installed.
pub fn init_tracing_with(directives: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let installed = match format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.try_init(),
    };
    installed.is_ok()
}

pub fn init_tracing() {
    init_tracing_with(DEFAULT_DIRECTIVES);
}
