//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Initializes a plain-text tracing subscriber.
///
/// `directives` follows the `EnvFilter` syntax (e.g. `"info,lakeflow=debug"`);
/// an unparseable filter falls back to `info`. Safe to call more than once:
/// only the first initialization wins.
pub fn init_tracing(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Initializes a JSON tracing subscriber for structured log shipping.
pub fn init_json_tracing(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing("debug");
        init_tracing("not a real !! filter");
        init_json_tracing("info");
        // Only the first subscriber wins; later calls must not panic.
    }
}
