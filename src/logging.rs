// Process-wide log output.
//
// Library crates only emit through the `log` and `tracing` facades. A binary
// picks one of the two initializers below; `init_tracing` also captures `log`
// records, so the two must not be combined in one process.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs `env_logger`, honouring `RUST_LOG`. Returns false when a logger
/// was already installed, so repeated calls are harmless.
pub fn init() -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .try_init()
        .is_ok()
}

/// Installs a `tracing-subscriber` formatter with an `EnvFilter` built from
/// `RUST_LOG`. Returns false when a global subscriber or logger exists.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        assert!(!init());
        // `log` is taken, so the tracing bridge cannot install either.
        assert!(!init_tracing());
    }
}
