//! Log subscriber setup

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TERN_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install a stderr subscriber filtered by `TERN_LOG`
///
/// Falls back to `warn` when the variable is unset or unparsable. Returns
/// false when a global subscriber was already installed, which is left in
/// place.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
