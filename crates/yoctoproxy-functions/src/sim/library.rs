/*!
 * Simulated hardware library.
 */
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::hardware::{
    name_matches, FunctionClass, FunctionHandle, HardwareError, HardwareFunction, HardwareLibrary,
    HwResult, PlugEvent,
};

use super::function::SimFunction;

/// Module description handed to [`SimulatedLibrary::plug`]
#[derive(Debug, Clone)]
pub struct SimModule {
    serial: String,
    product_name: String,
    logical_name: String,
    functions: Vec<(FunctionClass, String, String)>,
    attrs: Vec<(String, String, String)>,
}

impl SimModule {
    /// Module with the given serial number and no function yet
    pub fn new(serial: &str) -> Self {
        let product_name = match serial.split_once('-') {
            Some((prefix, _)) => format!("Yocto-{}", prefix),
            None => "Yocto-Device".to_string(),
        };
        Self {
            serial: serial.to_string(),
            product_name,
            logical_name: String::new(),
            functions: Vec::new(),
            attrs: Vec::new(),
        }
    }

    /// Override the product name
    pub fn product_name(mut self, name: &str) -> Self {
        self.product_name = name.to_string();
        self
    }

    /// Logical name of the module itself
    pub fn logical_name(mut self, name: &str) -> Self {
        self.logical_name = name.to_string();
        self
    }

    /// Add a function without logical name
    pub fn with_function(self, class: FunctionClass, function_id: &str) -> Self {
        self.with_named_function(class, function_id, "")
    }

    /// Add the first function of `class`, under its usual function id
    pub fn with_default_function(self, class: FunctionClass) -> Self {
        self.with_function(class, class.default_function_id())
    }

    /// Add a function with a logical name
    pub fn with_named_function(mut self, class: FunctionClass, function_id: &str, logical_name: &str) -> Self {
        self.functions
            .push((class, function_id.to_string(), logical_name.to_string()));
        self
    }

    /// Seed an attribute of one of the functions (`"module"` for the module)
    pub fn with_attr(mut self, function_id: &str, name: &str, value: &str) -> Self {
        self.attrs
            .push((function_id.to_string(), name.to_string(), value.to_string()));
        self
    }

    /// Serial number
    pub fn serial(&self) -> &str {
        &self.serial
    }
}

struct SimModuleEntry {
    serial: String,
    functions: Vec<Arc<SimFunction>>,
}

#[derive(Default)]
struct LibraryState {
    modules: Vec<SimModuleEntry>,
    pending: Vec<PlugEvent>,
    hubs: Vec<String>,
    failing_registrations: usize,
}

/// In-memory hardware library
#[derive(Default)]
pub struct SimulatedLibrary {
    state: Mutex<LibraryState>,
}

impl std::fmt::Debug for SimulatedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SimulatedLibrary")
            .field("modules", &state.modules.len())
            .field("hubs", &state.hubs)
            .finish()
    }
}

fn handle_of(function: &Arc<SimFunction>) -> FunctionHandle {
    let f = function.clone();
    match function.class() {
        FunctionClass::Cellular => FunctionHandle::Cellular(f),
        FunctionClass::DigitalIo => FunctionHandle::DigitalIo(f),
        FunctionClass::Display => FunctionHandle::Display(f),
        FunctionClass::InputCapture => FunctionHandle::InputCapture(f),
        FunctionClass::Module => FunctionHandle::Module(f),
        FunctionClass::Motor => FunctionHandle::Motor(f),
        FunctionClass::PowerOutput => FunctionHandle::PowerOutput(f),
        FunctionClass::RfidReader => FunctionHandle::RfidReader(f),
        FunctionClass::Sensor => FunctionHandle::Sensor(f),
        FunctionClass::StepperMotor => FunctionHandle::StepperMotor(f),
        FunctionClass::Watchdog => FunctionHandle::Watchdog(f),
    }
}

impl SimulatedLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LibraryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect a module. Its arrival is reported by the next device list
    /// update. Plugging a known serial number is the same as `replug`.
    pub fn plug(&self, module: SimModule) {
        let mut state = self.state();
        if let Some(entry) = state.modules.iter().find(|m| m.serial == module.serial) {
            entry.functions.iter().for_each(|f| f.set_online(true));
            state.pending.push(PlugEvent::Arrival(module.serial));
            return;
        }

        let hosted: Vec<String> = module.functions.iter().map(|(_, id, _)| id.clone()).collect();
        let mut functions = Vec::with_capacity(module.functions.len() + 1);

        let device = SimFunction::new(
            FunctionClass::Module,
            &module.serial,
            FunctionClass::Module.default_function_id(),
            &module.logical_name,
            hosted,
        );
        device.set_attr("product_name", &module.product_name);
        functions.push(Arc::new(device));

        for (class, function_id, logical_name) in &module.functions {
            functions.push(Arc::new(SimFunction::new(
                *class,
                &module.serial,
                function_id,
                logical_name,
                Vec::new(),
            )));
        }

        for (function_id, name, value) in &module.attrs {
            for f in functions.iter().filter(|f| f.id() == function_id.as_str()) {
                f.set_attr(name, value);
            }
        }
        functions.iter().for_each(|f| f.set_online(true));

        debug!(serial = %module.serial, functions = functions.len(), "Simulated module plugged");
        state.modules.push(SimModuleEntry {
            serial: module.serial.clone(),
            functions,
        });
        state.pending.push(PlugEvent::Arrival(module.serial));
    }

    /// Disconnect a module; its functions stay known but go offline
    pub fn unplug(&self, serial: &str) {
        let mut state = self.state();
        let found = match state.modules.iter().find(|m| m.serial == serial) {
            Some(entry) => {
                entry.functions.iter().for_each(|f| f.set_online(false));
                true
            }
            None => false,
        };
        if found {
            state.pending.push(PlugEvent::Removal(serial.to_string()));
        }
    }

    /// Reconnect a module unplugged earlier
    pub fn replug(&self, serial: &str) {
        let mut state = self.state();
        let found = match state.modules.iter().find(|m| m.serial == serial) {
            Some(entry) => {
                entry.functions.iter().for_each(|f| f.set_online(true));
                true
            }
            None => false,
        };
        if found {
            state.pending.push(PlugEvent::Arrival(serial.to_string()));
        }
    }

    /// Simulated function by hardware id
    pub fn function(&self, hardware_id: &str) -> Option<Arc<SimFunction>> {
        let (serial, function_id) = hardware_id.split_once('.')?;
        self.state()
            .modules
            .iter()
            .find(|m| m.serial == serial)?
            .functions
            .iter()
            .find(|f| f.id() == function_id)
            .cloned()
    }

    /// Make the next `count` hub registrations fail
    pub fn fail_next_hub_registrations(&self, count: usize) {
        self.state().failing_registrations = count;
    }

    /// Hubs currently registered
    pub fn registered_hubs(&self) -> Vec<String> {
        self.state().hubs.clone()
    }

    fn all_functions(&self) -> Vec<Arc<SimFunction>> {
        self.state()
            .modules
            .iter()
            .flat_map(|m| m.functions.iter().cloned())
            .collect()
    }
}

impl HardwareLibrary for SimulatedLibrary {
    fn register_hub(&self, url: &str) -> HwResult<()> {
        let mut state = self.state();
        if state.failing_registrations > 0 {
            state.failing_registrations -= 1;
            return Err(HardwareError::Io(format!("Cannot reach hub {}", url)));
        }
        if !state.hubs.iter().any(|h| h == url) {
            state.hubs.push(url.to_string());
        }
        Ok(())
    }

    fn unregister_hub(&self, url: &str) {
        self.state().hubs.retain(|h| h != url);
    }

    fn update_device_list(&self) -> HwResult<Vec<PlugEvent>> {
        Ok(std::mem::take(&mut self.state().pending))
    }

    fn find_function(&self, class: FunctionClass, name: &str) -> Option<FunctionHandle> {
        self.all_functions()
            .iter()
            .filter(|f| f.class() == class)
            .map(handle_of)
            .find(|h| name_matches(name, h))
    }

    fn functions(&self, class: FunctionClass) -> Vec<FunctionHandle> {
        self.all_functions()
            .iter()
            .filter(|f| f.class() == class && f.is_online())
            .map(handle_of)
            .collect()
    }

    fn module_functions(&self, serial: &str) -> Vec<FunctionHandle> {
        self.state()
            .modules
            .iter()
            .filter(|m| m.serial == serial)
            .flat_map(|m| m.functions.iter().map(handle_of))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ModuleHardware;

    #[test]
    fn test_plug_reports_arrival_once() {
        let library = SimulatedLibrary::new();
        library.plug(SimModule::new("MOTORCTL-00001").with_function(FunctionClass::Motor, "motor"));
        assert_eq!(
            library.update_device_list().unwrap(),
            vec![PlugEvent::Arrival("MOTORCTL-00001".to_string())]
        );
        assert!(library.update_device_list().unwrap().is_empty());
    }

    #[test]
    fn test_module_function_lists_hosted_ids() {
        let library = SimulatedLibrary::new();
        library.plug(
            SimModule::new("MOTORCTL-00001")
                .with_function(FunctionClass::Motor, "motor")
                .with_function(FunctionClass::Sensor, "voltage"),
        );
        let functions = library.module_functions("MOTORCTL-00001");
        assert_eq!(functions.len(), 3);
        assert_eq!(functions[0].class(), FunctionClass::Module);
        match &functions[0] {
            FunctionHandle::Module(module) => {
                assert_eq!(module.function_ids().unwrap(), vec!["motor", "voltage"]);
                assert_eq!(module.get_product_name().unwrap(), "Yocto-MOTORCTL");
            }
            other => panic!("unexpected handle {:?}", other),
        }
    }

    #[test]
    fn test_default_function_ids() {
        let library = SimulatedLibrary::new();
        library.plug(
            SimModule::new("YSENSOR1-00001")
                .with_default_function(FunctionClass::Sensor)
                .with_default_function(FunctionClass::Watchdog),
        );

        let ids: Vec<String> = library
            .module_functions("YSENSOR1-00001")
            .iter()
            .map(|h| h.hardware_id())
            .collect();
        assert_eq!(
            ids,
            vec!["YSENSOR1-00001.module", "YSENSOR1-00001.genericSensor1", "YSENSOR1-00001.watchdog1"]
        );
        assert!(library.find_function(FunctionClass::Sensor, "genericSensor1").is_some());
        assert!(library.find_function(FunctionClass::Module, "YSENSOR1-00001").is_some());
    }

    #[test]
    fn test_unplugged_functions_stay_findable() {
        let library = SimulatedLibrary::new();
        library.plug(SimModule::new("MOTORCTL-00001").with_named_function(FunctionClass::Motor, "motor", "left"));
        library.unplug("MOTORCTL-00001");

        let handle = library.find_function(FunctionClass::Motor, "left").unwrap();
        assert!(!handle.is_online());
        assert!(handle.get_logical_name().is_err());
        assert_eq!(handle.identity().logical_name, "left");
        assert!(library.functions(FunctionClass::Motor).is_empty());
        assert_eq!(
            library.update_device_list().unwrap(),
            vec![
                PlugEvent::Arrival("MOTORCTL-00001".to_string()),
                PlugEvent::Removal("MOTORCTL-00001".to_string())
            ]
        );
    }

    #[test]
    fn test_seeded_attributes() {
        let library = SimulatedLibrary::new();
        library.plug(
            SimModule::new("YSENSOR-00001")
                .with_function(FunctionClass::Sensor, "temperature")
                .with_attr("temperature", "current_value", "18.25"),
        );
        let f = library.function("YSENSOR-00001.temperature").unwrap();
        assert_eq!(f.attr("current_value").as_deref(), Some("18.25"));
    }
}
