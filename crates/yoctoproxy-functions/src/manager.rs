/*!
 * Proxy manager.
 *
 * The manager owns every proxy created through it, resolves names to
 * proxies and dispatches library plug events so that proxies created before
 * their hardware bind to it when it appears.
 */
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use yoctoproxy_core::{
    config::ProxyConfig,
    event::{EventReceiver, SharedEventBus},
    logging::operation_span,
};

use crate::hardware::{FunctionClass, FunctionHandle, HardwareLibrary, PlugEvent};
use crate::proxy::{FunctionProxy, ProxyEvent, ProxyObject, Result};

/// Registry of proxies over one hardware library
pub struct ProxyManager {
    library: Arc<dyn HardwareLibrary>,
    proxies: RwLock<Vec<Arc<dyn ProxyObject>>>,
    /// Serializes lookups and arrivals so a name never gets two proxies
    lookup: Mutex<()>,
    events: SharedEventBus,
    adopt_placeholders: bool,
}

impl std::fmt::Debug for ProxyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyManager")
            .field("library", &self.library)
            .field("proxies", &self.proxy_count())
            .field("adopt_placeholders", &self.adopt_placeholders)
            .finish()
    }
}

fn is_placeholder(proxy: &dyn ProxyObject) -> bool {
    !proxy.is_bound() && proxy.instantiation_name().is_empty()
}

impl ProxyManager {
    /// Create a manager with the default proxy configuration
    pub fn new(library: Arc<dyn HardwareLibrary>) -> Self {
        Self::with_config(library, &ProxyConfig::default())
    }

    /// Create a manager from the `[proxy]` configuration section
    pub fn with_config(library: Arc<dyn HardwareLibrary>, config: &ProxyConfig) -> Self {
        Self {
            library,
            proxies: RwLock::new(Vec::new()),
            lookup: Mutex::new(()),
            events: SharedEventBus::with_capacity(config.event_capacity),
            adopt_placeholders: config.adopt_placeholders,
        }
    }

    /// The wrapped library
    pub fn library(&self) -> &Arc<dyn HardwareLibrary> {
        &self.library
    }

    /// Event bus shared by every proxy of this manager
    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Subscribe to proxy events
    pub fn subscribe(&self) -> Result<EventReceiver<ProxyEvent>> {
        Ok(self.events.subscribe::<ProxyEvent>()?)
    }

    /// Resolve a proxy by name, creating it when needed
    ///
    /// With an empty name the manager hands out, in order: an unknown
    /// placeholder of the class, any proxy of the class already bound, the
    /// proxy of the first function the library knows of. With a name it
    /// returns the proxy bound to the function the library resolves, or the
    /// proxy previously created under the same name. Otherwise a placeholder
    /// is renamed or a new proxy is created, then linked when the library
    /// knows the function.
    pub fn find<P: FunctionProxy>(&self, name: &str) -> Arc<P> {
        let _guard = self.lookup.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = self.typed::<P>();

        let handle = if name.is_empty() {
            if let Some(proxy) = existing.iter().find(|p| is_placeholder(p.as_ref())) {
                return proxy.clone();
            }
            if let Some(proxy) = existing.iter().find(|p| p.is_bound()) {
                return proxy.clone();
            }
            self.library.functions(P::CLASS).into_iter().next()
        } else {
            self.library.find_function(P::CLASS, name)
        };

        if let Some(handle) = &handle {
            let hardware_id = handle.hardware_id();
            if let Some(proxy) = existing
                .iter()
                .find(|p| p.is_bound() && p.hardware_id() == hardware_id)
            {
                return proxy.clone();
            }
        }
        if !name.is_empty() {
            if let Some(proxy) = existing.iter().find(|p| p.instantiation_name() == name) {
                return proxy.clone();
            }
        }

        let proxy = match existing.iter().find(|p| is_placeholder(p.as_ref())) {
            Some(placeholder) => {
                debug!(class = %P::CLASS, name, "Reusing placeholder proxy");
                placeholder.rename(name);
                placeholder.clone()
            }
            None => {
                debug!(class = %P::CLASS, name, "Creating proxy");
                let proxy = P::create(name, self.events.clone());
                self.proxies
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(proxy.clone());
                proxy
            }
        };

        if let Some(handle) = handle {
            if let Err(e) = proxy.link_to_hardware(&handle) {
                warn!(class = %P::CLASS, name, "Failed to link proxy: {}", e);
            }
        }
        proxy
    }

    /// Hardware ids of every function of `class`
    pub fn similar_functions(&self, class: FunctionClass) -> Vec<String> {
        self.library
            .functions(class)
            .iter()
            .map(FunctionHandle::hardware_id)
            .collect()
    }

    /// Every proxy, in creation order
    pub fn proxies(&self) -> Vec<Arc<dyn ProxyObject>> {
        self.proxies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Proxies of one class
    pub fn proxies_of(&self, class: FunctionClass) -> Vec<Arc<dyn ProxyObject>> {
        self.proxies()
            .into_iter()
            .filter(|p| p.class() == class)
            .collect()
    }

    /// Count managed proxies
    pub fn proxy_count(&self) -> usize {
        self.proxies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn typed<P: FunctionProxy>(&self) -> Vec<Arc<P>> {
        self.proxies_of(P::CLASS)
            .into_iter()
            .filter_map(|p| p.as_any().downcast::<P>().ok())
            .collect()
    }

    /// Register a hub with the library
    pub fn register_hub(&self, url: &str) -> Result<()> {
        self.library.register_hub(url)?;
        info!(url, "Registered hub");
        Ok(())
    }

    /// Unregister a hub
    pub fn unregister_hub(&self, url: &str) {
        self.library.unregister_hub(url);
        info!(url, "Unregistered hub");
    }

    /// Poll the library for plug events and dispatch them.
    /// Returns the number of events handled.
    pub fn update_device_list(&self) -> Result<usize> {
        let span = operation_span("update_device_list", "manager");
        let _enter = span.enter();

        let events = self.library.update_device_list()?;
        for event in &events {
            match event {
                PlugEvent::Arrival(serial) => self.handle_arrival(serial),
                PlugEvent::Removal(serial) => self.handle_removal(serial),
            }
        }
        Ok(events.len())
    }

    /// Notify proxies that the module `serial` appeared
    pub fn handle_arrival(&self, serial: &str) {
        let _guard = self.lookup.lock().unwrap_or_else(PoisonError::into_inner);
        info!(serial, "Module arrival");
        let proxies = self.proxies();

        for handle in self.library.module_functions(serial) {
            let class = handle.class();
            let hardware_id = handle.hardware_id();
            let mut claimed = false;

            for proxy in proxies
                .iter()
                .filter(|p| p.class() == class && p.is_bound() && p.hardware_id() == hardware_id)
            {
                proxy.function_arrival();
                claimed = true;
            }
            if claimed {
                continue;
            }

            // A function binds to one proxy at most; the hardware keeps a
            // single callback slot per function.
            let identity = handle.identity();
            for proxy in proxies.iter().filter(|p| p.class() == class) {
                let name = proxy.instantiation_name();
                if name.is_empty() || !identity.matches(&name) {
                    continue;
                }
                if proxy.is_bound() && proxy.is_online() {
                    continue;
                }
                if claimed {
                    debug!(name = %name, hardware_id = %hardware_id, "Function already claimed by another proxy");
                    continue;
                }
                match proxy.link_to_hardware(&handle) {
                    Ok(_) => claimed = true,
                    Err(e) => warn!(name = %name, "Failed to link proxy: {}", e),
                }
            }
            if claimed || !self.adopt_placeholders {
                continue;
            }

            if let Some(placeholder) = proxies
                .iter()
                .find(|p| p.class() == class && is_placeholder(p.as_ref()))
            {
                debug!(hardware_id = %hardware_id, "Placeholder adopts function");
                if let Err(e) = placeholder.link_to_hardware(&handle) {
                    warn!(hardware_id = %hardware_id, "Failed to link placeholder: {}", e);
                }
            }
        }
    }

    /// Notify proxies that the module `serial` went away
    pub fn handle_removal(&self, serial: &str) {
        info!(serial, "Module removal");
        for proxy in self.proxies() {
            if !proxy.is_bound() {
                continue;
            }
            let hardware_id = proxy.hardware_id();
            if hardware_id.split_once('.').map(|(s, _)| s) == Some(serial) {
                proxy.function_removal();
            }
        }
    }

    /// Unlink every proxy, ahead of a library shutdown
    pub fn release_all(&self) {
        let proxies = self.proxies();
        for proxy in &proxies {
            proxy.unlink();
        }
        info!("Released {} proxies", proxies.len());
    }
}

/// A shared proxy manager that can be cloned
#[derive(Debug, Clone)]
pub struct SharedProxyManager(Arc<ProxyManager>);

impl SharedProxyManager {
    /// Create a new shared manager
    pub fn new(library: Arc<dyn HardwareLibrary>) -> Self {
        Self(Arc::new(ProxyManager::new(library)))
    }

    /// Create a new shared manager from the `[proxy]` configuration section
    pub fn with_config(library: Arc<dyn HardwareLibrary>, config: &ProxyConfig) -> Self {
        Self(Arc::new(ProxyManager::with_config(library, config)))
    }

    /// Get a reference to the manager
    pub fn manager(&self) -> &ProxyManager {
        &self.0
    }
}

impl From<ProxyManager> for SharedProxyManager {
    fn from(manager: ProxyManager) -> Self {
        Self(Arc::new(manager))
    }
}

impl AsRef<ProxyManager> for SharedProxyManager {
    fn as_ref(&self) -> &ProxyManager {
        self.manager()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::motor::{MotorProxy, MotorStatus};
    use crate::functions::sensor::SensorProxy;
    use crate::proxy::ProxyObject;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, ProxyManager) {
        let library = Arc::new(SimulatedLibrary::new());
        let manager = ProxyManager::new(library.clone());
        (library, manager)
    }

    fn two_motors() -> SimModule {
        SimModule::new("MOTORCTL-00001")
            .with_named_function(FunctionClass::Motor, "motor", "leftWheel")
            .with_function(FunctionClass::Sensor, "temperature")
    }

    #[test_log::test]
    fn test_find_binds_known_hardware() {
        let (library, manager) = setup();
        library.plug(two_motors());
        manager.update_device_list().unwrap();

        let proxy = MotorProxy::find(&manager, "leftWheel");
        assert!(proxy.is_bound());
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.motor");
        assert_eq!(proxy.motor_status(), MotorStatus::Idle);

        // every name of the function resolves to the same proxy
        for name in ["leftWheel", "MOTORCTL-00001.motor", "motor", "MOTORCTL-00001.leftWheel"] {
            let again = MotorProxy::find(&manager, name);
            assert!(Arc::ptr_eq(&proxy, &again), "{} resolved elsewhere", name);
        }
        assert_eq!(manager.proxy_count(), 1);
    }

    #[test]
    fn test_empty_name_takes_first_function() {
        let (library, manager) = setup();
        library.plug(two_motors());
        manager.update_device_list().unwrap();

        let proxy = MotorProxy::find(&manager, "");
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.motor");
        let named = MotorProxy::find(&manager, "leftWheel");
        assert!(Arc::ptr_eq(&proxy, &named));
    }

    #[test]
    fn test_empty_name_reuses_placeholder() {
        let (_library, manager) = setup();
        let first = MotorProxy::find(&manager, "");
        let second = MotorProxy::find(&manager, "");
        assert!(!first.is_bound());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.proxy_count(), 1);
    }

    #[test]
    fn test_named_lookup_renames_placeholder() {
        let (_library, manager) = setup();
        let placeholder = MotorProxy::find(&manager, "");
        let named = MotorProxy::find(&manager, "rightWheel");
        assert!(Arc::ptr_eq(&placeholder, &named));
        assert_eq!(named.instantiation_name(), "rightWheel");
        assert_eq!(manager.proxy_count(), 1);
    }

    #[test_log::test]
    fn test_named_proxy_binds_on_arrival() {
        let (library, manager) = setup();
        let proxy = MotorProxy::find(&manager, "leftWheel");
        assert!(!proxy.is_bound());
        assert!(proxy.get_motor_status().is_err());

        library.plug(two_motors());
        assert_eq!(manager.update_device_list().unwrap(), 1);

        assert!(proxy.is_bound());
        assert!(proxy.is_online());
        assert_eq!(proxy.get_motor_status().unwrap(), MotorStatus::Idle);
    }

    #[test_log::test]
    fn test_two_names_share_one_binding() {
        let (library, manager) = setup();
        let by_id = MotorProxy::find(&manager, "motor");
        let by_name = MotorProxy::find(&manager, "leftWheel");
        assert!(!Arc::ptr_eq(&by_id, &by_name));

        library.plug(two_motors());
        manager.update_device_list().unwrap();

        let bound: Vec<&Arc<MotorProxy>> = [&by_id, &by_name].into_iter().filter(|p| p.is_bound()).collect();
        assert_eq!(bound.len(), 1);
        let bound = bound[0];

        // the surviving binding still gets value updates
        library.function("MOTORCTL-00001.motor").unwrap().push_value("BRAKE");
        assert_eq!(bound.motor_status(), MotorStatus::Brake);

        for name in ["motor", "leftWheel", "MOTORCTL-00001.motor"] {
            let again = MotorProxy::find(&manager, name);
            assert!(Arc::ptr_eq(bound, &again), "{} resolved elsewhere", name);
        }
        let bound_count = manager
            .proxies_of(FunctionClass::Motor)
            .iter()
            .filter(|p| p.is_bound())
            .count();
        assert_eq!(bound_count, 1);
    }

    #[test]
    fn test_placeholder_adopts_unclaimed_function() {
        let (library, manager) = setup();
        let placeholder = SensorProxy::find(&manager, "");
        library.plug(two_motors());
        manager.update_device_list().unwrap();

        assert!(placeholder.is_bound());
        assert_eq!(placeholder.hardware_id(), "MOTORCTL-00001.temperature");
    }

    #[test]
    fn test_adoption_can_be_disabled() {
        let library = Arc::new(SimulatedLibrary::new());
        let config = ProxyConfig {
            adopt_placeholders: false,
            ..ProxyConfig::default()
        };
        let manager = ProxyManager::with_config(library.clone(), &config);
        let placeholder = SensorProxy::find(&manager, "");
        library.plug(two_motors());
        manager.update_device_list().unwrap();
        assert!(!placeholder.is_bound());
    }

    #[test]
    fn test_removal_then_arrival_keeps_binding() {
        let (library, manager) = setup();
        library.plug(two_motors());
        manager.update_device_list().unwrap();
        let proxy = MotorProxy::find(&manager, "leftWheel");

        library.unplug("MOTORCTL-00001");
        manager.update_device_list().unwrap();
        assert!(proxy.is_bound());
        assert!(!proxy.is_online());

        library.replug("MOTORCTL-00001");
        manager.update_device_list().unwrap();
        assert!(proxy.is_online());
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.motor");
    }

    #[test]
    fn test_similar_functions_and_listing() {
        let (library, manager) = setup();
        library.plug(two_motors());
        library.plug(SimModule::new("MOTORCTL-00002").with_function(FunctionClass::Motor, "motor"));
        manager.update_device_list().unwrap();

        assert_eq!(
            MotorProxy::similar_functions(&manager),
            vec!["MOTORCTL-00001.motor".to_string(), "MOTORCTL-00002.motor".to_string()]
        );

        MotorProxy::find(&manager, "MOTORCTL-00002.motor");
        SensorProxy::find(&manager, "temperature");
        assert_eq!(manager.proxies_of(FunctionClass::Motor).len(), 1);
        assert_eq!(manager.proxies().len(), 2);
    }

    #[test]
    fn test_removal_is_published() {
        let (library, manager) = setup();
        library.plug(two_motors());
        manager.update_device_list().unwrap();
        let proxy = MotorProxy::find(&manager, "leftWheel");
        let mut rx = manager.subscribe().unwrap();

        library.unplug("MOTORCTL-00001");
        manager.update_device_list().unwrap();

        let event = tokio_test::block_on(rx.recv()).unwrap();
        assert!(matches!(event, ProxyEvent::Removal { class: FunctionClass::Motor, .. }));
        assert_eq!(event.hardware_id(), proxy.hardware_id());
    }

    #[test]
    fn test_release_all_unlinks() {
        let (library, manager) = setup();
        library.plug(two_motors());
        manager.update_device_list().unwrap();
        let proxy = MotorProxy::find(&manager, "motor");
        manager.release_all();
        assert!(!proxy.is_bound());
        assert!(manager.proxies().iter().all(|p| !p.is_bound()));
    }

    #[test]
    fn test_register_hub_failure_surfaces() {
        let (library, manager) = setup();
        library.fail_next_hub_registrations(1);
        assert!(manager.register_hub("usb").is_err());
        assert!(manager.register_hub("usb").is_ok());
        assert_eq!(library.registered_hubs(), vec!["usb".to_string()]);
        manager.unregister_hub("usb");
        assert!(library.registered_hubs().is_empty());
    }

    #[test]
    fn test_shared_manager() {
        let library = Arc::new(SimulatedLibrary::new());
        let shared = SharedProxyManager::new(library);
        let clone = shared.clone();
        MotorProxy::find(shared.manager(), "x");
        assert_eq!(clone.as_ref().proxy_count(), 1);
    }
}
