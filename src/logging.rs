use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Installs the stdout logger. `log` records are bridged into the subscriber,
/// so the rest of the daemon only ever talks to the `log` macros.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stdout)
            .with_target(false)
            .init();
    });
}
