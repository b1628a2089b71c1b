/*!
 * Hub monitor.
 *
 * Registers the configured hubs with the hardware library and keeps the
 * device list fresh from a background task, so that proxies bind and
 * unbind as modules come and go.
 */
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

use yoctoproxy_core::{
    config::HubConfig,
    error::Error as CoreError,
    logging::component_span,
    utils::{duration_to_millis, millis_to_duration, with_retry},
};

use crate::manager::SharedProxyManager;
use crate::proxy::Result;

/// Registers hubs and polls the library for plug events
#[derive(Debug, Clone)]
pub struct HubMonitor {
    config: HubConfig,
    manager: SharedProxyManager,
}

impl HubMonitor {
    /// Create a monitor from the `[hub]` configuration section
    pub fn new(config: HubConfig, manager: SharedProxyManager) -> Self {
        Self { config, manager }
    }

    /// The monitored manager
    pub fn manager(&self) -> &SharedProxyManager {
        &self.manager
    }

    /// Register every configured hub, concurrently.
    ///
    /// Each URL gets `register_retries` more attempts after a failure, each
    /// bounded by `register_timeout_ms`. Returns the number of hubs
    /// registered; fails only when none of them could be.
    pub async fn register_hubs(&self) -> Result<usize> {
        let timeout = millis_to_duration(self.config.register_timeout_ms);
        let retries = self.config.register_retries;

        let attempts = self.config.urls.iter().map(|url| {
            let manager = self.manager.clone();
            let url = url.clone();
            async move {
                let result = with_retry(timeout, retries, || {
                    let manager = manager.clone();
                    let url = url.clone();
                    async move {
                        tokio::task::spawn_blocking(move || manager.manager().register_hub(&url))
                            .await
                            .map_err(|e| CoreError::runtime(format!("Hub registration task failed: {}", e)))?
                            .map_err(|e| CoreError::runtime(e.to_string()))
                    }
                })
                .await;
                (url, result)
            }
        });

        let mut registered = 0;
        let mut failed = Vec::new();
        for (url, result) in join_all(attempts).await {
            match result {
                Ok(()) => registered += 1,
                Err(e) => {
                    warn!(url = %url, "Giving up on hub: {}", e);
                    failed.push(url);
                }
            }
        }

        if registered == 0 && !failed.is_empty() {
            return Err(CoreError::runtime(format!("No hub could be registered ({})", failed.join(", "))).into());
        }
        info!("Registered {} of {} hubs", registered, self.config.urls.len());
        Ok(registered)
    }

    /// Start polling the device list at the configured interval
    pub fn spawn(&self) -> HubMonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = self.manager.clone();
        let interval = millis_to_duration(self.config.poll_interval_ms);

        let task = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                debug!(interval_ms = duration_to_millis(interval), "Hub monitor started");

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let manager = manager.clone();
                            match tokio::task::spawn_blocking(move || manager.manager().update_device_list()).await {
                                Ok(Ok(0)) => {}
                                Ok(Ok(count)) => debug!(count, "Dispatched plug events"),
                                Ok(Err(e)) => warn!("Device list update failed: {}", e),
                                Err(e) => warn!("Device list task failed: {}", e),
                            }
                        }
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
                debug!("Hub monitor stopped");
            }
            .instrument(component_span("hub_monitor", None)),
        );

        HubMonitorHandle { shutdown_tx, task }
    }
}

/// Handle on a running hub monitor task
#[derive(Debug)]
pub struct HubMonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HubMonitorHandle {
    /// Whether the polling task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling and wait for the task to end
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone; the join below reports why.
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| CoreError::runtime(format!("Hub monitor task failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::functions::MotorProxy;
    use crate::hardware::FunctionClass;
    use crate::proxy::{FunctionProxy, ProxyError, ProxyObject};
    use crate::sim::{SimModule, SimulatedLibrary};

    fn monitor(urls: &[&str], retries: usize) -> (Arc<SimulatedLibrary>, HubMonitor) {
        let library = Arc::new(SimulatedLibrary::new());
        let config = HubConfig {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            poll_interval_ms: 10,
            register_timeout_ms: 1000,
            register_retries: retries,
        };
        let manager = SharedProxyManager::new(library.clone());
        (library, HubMonitor::new(config, manager))
    }

    #[tokio::test]
    async fn test_register_hubs_retries() {
        let (library, monitor) = monitor(&["usb"], 2);
        library.fail_next_hub_registrations(2);
        assert_eq!(monitor.register_hubs().await.unwrap(), 1);
        assert_eq!(library.registered_hubs(), vec!["usb".to_string()]);
    }

    #[tokio::test]
    async fn test_register_hubs_gives_up() {
        let (library, monitor) = monitor(&["usb"], 1);
        library.fail_next_hub_registrations(5);
        let err = monitor.register_hubs().await.unwrap_err();
        assert!(matches!(err, ProxyError::Core(_)));
        assert!(library.registered_hubs().is_empty());
    }

    #[tokio::test]
    async fn test_register_several_hubs() {
        let (library, monitor) = monitor(&["usb", "192.168.1.10"], 0);
        assert_eq!(monitor.register_hubs().await.unwrap(), 2);
        let mut hubs = library.registered_hubs();
        hubs.sort();
        assert_eq!(hubs, vec!["192.168.1.10".to_string(), "usb".to_string()]);
    }

    #[test_log::test(tokio::test)]
    async fn test_polling_binds_late_arrivals() {
        let (library, monitor) = monitor(&["usb"], 0);
        let proxy = MotorProxy::find(monitor.manager().manager(), "motor");
        assert!(!proxy.is_online());

        let handle = monitor.spawn();
        library.plug(SimModule::new("MOTORCTL-00001").with_function(FunctionClass::Motor, "motor"));

        for _ in 0..100 {
            if proxy.is_online() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(proxy.is_online());
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.motor");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (_library, monitor) = monitor(&["usb"], 0);
        let handle = monitor.spawn();
        assert!(!handle.is_finished());
        handle.shutdown().await.unwrap();
    }
}
