/*!
 * Prelude module for yoctoproxy core.
 *
 * Re-exports the commonly used types so that downstream crates can pull
 * them in with a single import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export core types
pub use crate::types::Value;

// Re-export event types
pub use crate::event::{EventBus, EventReceiver, SharedEventBus};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, HubConfig, ProxyConfig, SharedConfig};

// Re-export utility functions
pub use crate::utils::{duration_to_millis, millis_to_duration, spawn_and_log, with_retry, with_timeout};

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::{init, init_with_config};
