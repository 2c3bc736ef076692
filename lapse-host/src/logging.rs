//! Logging bootstrap.
//!
//! `RUST_LOG` wins over the configured level when set.

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::HostConfig;

/// Install the global subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init(level: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init().is_ok()
    } else {
        registry.with(fmt::layer()).try_init().is_ok()
    };
    if installed {
        info!(level, json, "Logging initialised");
    }
    installed
}

/// Install the global subscriber from host configuration.
pub fn init_from(config: &HostConfig) -> bool {
    init(&config.log_level, config.json_logs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        // Whichever call installs first, a later one must not.
        init("debug", false);
        assert!(!init("info", true));
    }
}
