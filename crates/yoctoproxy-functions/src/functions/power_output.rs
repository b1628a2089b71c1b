/*!
 * Power output proxy.
 */
use std::sync::Arc;

use crate::hardware::{FunctionClass, FunctionHandle, PowerOutputHardware};
use crate::proxy::{proxy_enum, CacheValue, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// Voltage delivered on the power output
    pub enum PowerOutputVoltage {
        Off = 0 => "OFF",
        Out3V3 = 1 => "OUT3V3",
        Out5V = 2 => "OUT5V",
        Out4V7 = 3 => "OUT4V7",
        Out1V8 = 4 => "OUT1V8",
    }
}

/// Cached power output properties
#[derive(Debug, Clone, Default)]
pub struct PowerOutputCache {
    voltage: PowerOutputVoltage,
}

/// Proxy of a module power output
#[derive(Debug)]
pub struct PowerOutputProxy {
    base: ProxyBase<dyn PowerOutputHardware, PowerOutputCache>,
}

impl FunctionProxy for PowerOutputProxy {
    const CLASS: FunctionClass = FunctionClass::PowerOutput;
    type Hardware = dyn PowerOutputHardware;
    type Cache = PowerOutputCache;

    fn new(base: ProxyBase<dyn PowerOutputHardware, PowerOutputCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn PowerOutputHardware, PowerOutputCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn PowerOutputHardware>> {
        match handle {
            FunctionHandle::PowerOutput(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_cache(&self) {
        self.base.refresh("voltage", |c| &mut c.voltage, |hw| {
            hw.get_voltage().map(PowerOutputVoltage::from_library)
        });
    }

    fn parse_advertised(&self, value: &str) {
        let voltage = PowerOutputVoltage::from_name(value);
        if !voltage.is_invalid() {
            self.base.store("voltage", |c| &mut c.voltage, voltage);
        }
    }
}

impl PowerOutputProxy {
    /// Read the output voltage
    pub fn get_voltage(&self) -> Result<PowerOutputVoltage> {
        self.base.read(|hw| hw.get_voltage().map(PowerOutputVoltage::from_library))
    }

    /// Change the output voltage
    pub fn set_voltage(&self, value: PowerOutputVoltage) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_voltage(v.to_library()))
    }

    /// Cached output voltage
    pub fn voltage(&self) -> PowerOutputVoltage {
        self.base.cached(|c| &c.voltage)
    }

    /// Like `set_voltage`, skipped when the value matches the cache
    pub fn apply_voltage(&self, value: PowerOutputVoltage) -> Result<()> {
        self.base.apply("voltage", |c| &mut c.voltage, value, |hw, v| hw.set_voltage(v.to_library()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::sim::{SimModule, SimulatedLibrary};

    #[test]
    fn test_voltage_codes() {
        assert_eq!(PowerOutputVoltage::Off.code(), 1);
        assert_eq!(PowerOutputVoltage::Out1V8.code(), 5);
        assert_eq!(PowerOutputVoltage::from_library(3), PowerOutputVoltage::Out4V7);
        assert_eq!(PowerOutputVoltage::from_name("OUT5V"), PowerOutputVoltage::Out5V);
    }

    #[test]
    fn test_apply_voltage_forwards_library_code() {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("YMAXCOUP-00001").with_function(FunctionClass::PowerOutput, "powerOutput"));
        let manager = ProxyManager::new(library.clone());
        let proxy = PowerOutputProxy::find(&manager, "");
        assert_eq!(proxy.voltage(), PowerOutputVoltage::Off);

        proxy.apply_voltage(PowerOutputVoltage::Out3V3).unwrap();
        let hw = library.function("YMAXCOUP-00001.powerOutput").unwrap();
        assert_eq!(hw.journal(), vec!["set_voltage(1)".to_string()]);
        assert_eq!(proxy.voltage(), PowerOutputVoltage::Out3V3);
        assert_eq!(proxy.advertised_value(), "OUT3V3");
        assert_eq!(proxy.get_voltage().unwrap(), PowerOutputVoltage::Out3V3);
    }
}
