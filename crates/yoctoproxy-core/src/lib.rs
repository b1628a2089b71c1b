/*!
 * yoctoproxy core
 *
 * Shared plumbing for the yoctoproxy crates: error type, layered
 * configuration, tracing setup, a typed event bus and async helpers.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod prelude;
pub mod types;
pub mod utils;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use serde;
    pub use tokio;
    pub use tracing;
}

/// yoctoproxy core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization with the default log filter
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("yoctoproxy core {} initialized", VERSION);
    Ok(())
}

/// Library initialization driven by a loaded configuration
pub fn init_with_config(config: &config::Config) -> Result<(), error::Error> {
    config.validate()?;
    logging::init_from_config(&config.logging)?;
    tracing::info!(
        app = %config.general.app_name,
        environment = %config.general.environment,
        "yoctoproxy core {} initialized",
        VERSION
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_with_invalid_config_fails_before_logging() {
        let mut config = config::Config::default();
        config.proxy.event_capacity = 0;
        assert!(matches!(init_with_config(&config), Err(error::Error::Config(_))));
    }
}
