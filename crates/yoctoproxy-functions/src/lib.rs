/*!
 * yoctoproxy functions
 *
 * Name-based proxy objects over Yoctopuce functions. A proxy can be
 * created before its device is plugged in; it binds when a matching
 * function arrives, caches the function's settings and advertised value,
 * and remaps the library's invalid markers to proxy conventions.
 */

#![warn(missing_docs)]

pub mod functions;
pub mod hardware;
pub mod hub;
pub mod manager;
pub mod proxy;
pub mod sim;

pub use hardware::{FunctionClass, FunctionHandle, HardwareError, HardwareLibrary, PlugEvent};
pub use hub::{HubMonitor, HubMonitorHandle};
pub use manager::{ProxyManager, SharedProxyManager};
pub use proxy::{FunctionProxy, ProxyError, ProxyEvent, ProxyObject};

/// yoctoproxy functions crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging and announce the proxy layer
pub fn init() -> Result<(), yoctoproxy_core::error::Error> {
    yoctoproxy_core::init()?;
    tracing::info!("yoctoproxy functions {} initialized", VERSION);
    Ok(())
}

/// Commonly used types in one import
pub mod prelude {
    pub use yoctoproxy_core::prelude::*;

    pub use crate::functions::*;
    pub use crate::hardware::{FunctionClass, HardwareLibrary};
    pub use crate::hub::{HubMonitor, HubMonitorHandle};
    pub use crate::manager::{ProxyManager, SharedProxyManager};
    pub use crate::proxy::{FunctionProxy, OnOff, ProxyError, ProxyEvent, ProxyObject};
    pub use crate::sim::{SimModule, SimulatedLibrary};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
