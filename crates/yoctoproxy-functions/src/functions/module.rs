/*!
 * Module proxy.
 *
 * The module function stands for the device itself: identification,
 * flash persistence of the settings, reboot and firmware update.
 */
use std::sync::Arc;

use crate::hardware::{invalid, FunctionClass, FunctionHandle, ModuleHardware};
use crate::proxy::{proxy_enum, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// State of the settings with respect to the flash copy
    pub enum PersistentSettings {
        Loaded = 0 => "LOADED",
        Saved = 1 => "SAVED",
        Modified = 2 => "MODIFIED",
    }
}

proxy_enum! {
    /// Localization beacon
    pub enum Beacon {
        Off = 0 => "OFF",
        On = 1 => "ON",
    }
}

/// Cached module properties
#[derive(Debug, Clone)]
pub struct ModuleCache {
    product_name: String,
    firmware_release: String,
    persistent_settings: PersistentSettings,
    luminosity: i32,
    beacon: Beacon,
    user_var: i32,
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self {
            product_name: invalid::STRING.to_string(),
            firmware_release: invalid::STRING.to_string(),
            persistent_settings: PersistentSettings::Invalid,
            luminosity: invalid::INT,
            beacon: Beacon::Invalid,
            user_var: invalid::INT,
        }
    }
}

/// Proxy of a whole module
#[derive(Debug)]
pub struct ModuleProxy {
    base: ProxyBase<dyn ModuleHardware, ModuleCache>,
}

impl FunctionProxy for ModuleProxy {
    const CLASS: FunctionClass = FunctionClass::Module;
    type Hardware = dyn ModuleHardware;
    type Cache = ModuleCache;

    fn new(base: ProxyBase<dyn ModuleHardware, ModuleCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn ModuleHardware, ModuleCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn ModuleHardware>> {
        match handle {
            FunctionHandle::Module(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("persistent_settings", |c| &mut c.persistent_settings, |hw| {
            hw.get_persistent_settings().map(PersistentSettings::from_library)
        });
        b.refresh("luminosity", |c| &mut c.luminosity, |hw| hw.get_luminosity());
        b.refresh("beacon", |c| &mut c.beacon, |hw| hw.get_beacon().map(Beacon::from_library));
        b.refresh("user_var", |c| &mut c.user_var, |hw| hw.get_user_var());
    }

    fn refresh_cache(&self) {
        let b = &self.base;
        b.refresh("product_name", |c| &mut c.product_name, |hw| hw.get_product_name());
        b.refresh("firmware_release", |c| &mut c.firmware_release, |hw| hw.get_firmware_release());
    }
}

impl ModuleProxy {
    /// Read the product name
    pub fn get_product_name(&self) -> Result<String> {
        self.base.read(|hw| hw.get_product_name())
    }

    /// Cached product name
    pub fn product_name(&self) -> String {
        self.base.cached(|c| &c.product_name)
    }

    /// USB product id
    pub fn get_product_id(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_product_id())
    }

    /// Hardware release of the product
    pub fn get_product_release(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_product_release())
    }

    /// Read the firmware release
    pub fn get_firmware_release(&self) -> Result<String> {
        self.base.read(|hw| hw.get_firmware_release())
    }

    /// Cached firmware release
    pub fn firmware_release(&self) -> String {
        self.base.cached(|c| &c.firmware_release)
    }

    /// Read the persistent settings
    pub fn get_persistent_settings(&self) -> Result<PersistentSettings> {
        self.base.read(|hw| hw.get_persistent_settings().map(PersistentSettings::from_library))
    }

    /// Cached persistent settings
    pub fn persistent_settings(&self) -> PersistentSettings {
        self.base.cached(|c| &c.persistent_settings)
    }

    /// Read the luminosity of the module leds, in percent
    pub fn get_luminosity(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_luminosity())
    }

    /// Change the luminosity of the module leds
    pub fn set_luminosity(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_luminosity(v))
    }

    /// Cached luminosity of the module leds
    pub fn luminosity(&self) -> i32 {
        self.base.cached(|c| &c.luminosity)
    }

    /// Like `set_luminosity`, skipped when the value matches the cache
    pub fn apply_luminosity(&self, value: i32) -> Result<()> {
        self.base.apply("luminosity", |c| &mut c.luminosity, value, |hw, v| hw.set_luminosity(v))
    }

    /// Read the localization beacon
    pub fn get_beacon(&self) -> Result<Beacon> {
        self.base.read(|hw| hw.get_beacon().map(Beacon::from_library))
    }

    /// Change the localization beacon
    pub fn set_beacon(&self, value: Beacon) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_beacon(v.to_library()))
    }

    /// Cached localization beacon
    pub fn beacon(&self) -> Beacon {
        self.base.cached(|c| &c.beacon)
    }

    /// Like `set_beacon`, skipped when the value matches the cache
    pub fn apply_beacon(&self, value: Beacon) -> Result<()> {
        self.base.apply("beacon", |c| &mut c.beacon, value, |hw, v| hw.set_beacon(v.to_library()))
    }

    /// Read the time since the module powered up, in ms
    pub fn get_up_time(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_up_time())
    }

    /// Read the USB current draw, in mA
    pub fn get_usb_current(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_usb_current())
    }

    /// Read the seconds left before a scheduled reboot, 0 when none
    pub fn get_reboot_countdown(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_reboot_countdown())
    }

    /// Read the user variable
    pub fn get_user_var(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_user_var())
    }

    /// Change the user variable
    pub fn set_user_var(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_user_var(v))
    }

    /// Cached user variable
    pub fn user_var(&self) -> i32 {
        self.base.cached(|c| &c.user_var)
    }

    /// Like `set_user_var`, skipped when the value matches the cache
    pub fn apply_user_var(&self, value: i32) -> Result<()> {
        self.base.apply("user_var", |c| &mut c.user_var, value, |hw, v| hw.set_user_var(v))
    }

    /// Save the current settings in flash
    pub fn save_to_flash(&self) -> Result<()> {
        self.base.read(|hw| hw.save_to_flash())
    }

    /// Reload the settings saved in flash
    pub fn revert_from_flash(&self) -> Result<()> {
        self.base.read(|hw| hw.revert_from_flash())
    }

    /// Reboot the module after `seconds_before`
    pub fn reboot(&self, seconds_before: i32) -> Result<()> {
        self.base.read(|hw| hw.reboot(seconds_before))
    }

    /// Reboot the module into firmware update mode
    pub fn trigger_firmware_update(&self, seconds_before: i32) -> Result<()> {
        self.base.read(|hw| hw.trigger_firmware_update(seconds_before))
    }

    /// Function ids hosted by the module
    pub fn function_ids(&self) -> Result<Vec<String>> {
        self.base.read(|hw| hw.function_ids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::proxy::ProxyObject;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<ModuleProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(
            SimModule::new("MOTORCTL-00001")
                .product_name("Yocto-Motor-DC")
                .logical_name("cart")
                .with_function(FunctionClass::Motor, "motor")
                .with_function(FunctionClass::Sensor, "current"),
        );
        let manager = ProxyManager::new(library.clone());
        let proxy = ModuleProxy::find(&manager, "MOTORCTL-00001");
        (library, proxy)
    }

    #[test]
    fn test_bare_serial_finds_module() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.module");
        assert_eq!(proxy.product_name(), "Yocto-Motor-DC");
        assert_eq!(proxy.logical_name(), "cart");
        assert_eq!(proxy.get_serial_number().unwrap(), "MOTORCTL-00001");
        assert_eq!(proxy.function_ids().unwrap(), vec!["motor", "current"]);
    }

    #[test]
    fn test_persistence_cycle() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.persistent_settings(), PersistentSettings::Loaded);

        proxy.save_to_flash().unwrap();
        assert_eq!(proxy.persistent_settings(), PersistentSettings::Saved);

        proxy.set_luminosity(20).unwrap();
        assert_eq!(proxy.get_persistent_settings().unwrap(), PersistentSettings::Modified);

        proxy.revert_from_flash().unwrap();
        assert_eq!(proxy.persistent_settings(), PersistentSettings::Loaded);
        assert_eq!(proxy.luminosity(), 20);
    }

    #[test]
    fn test_luminosity_range_rejected() {
        let (_library, proxy) = setup();
        assert!(proxy.apply_luminosity(150).is_err());
        assert_eq!(proxy.luminosity(), 50);
    }

    #[test]
    fn test_reboot_countdown() {
        let (library, proxy) = setup();
        proxy.reboot(5).unwrap();
        assert_eq!(proxy.get_reboot_countdown().unwrap(), 5);
        let hw = library.function("MOTORCTL-00001.module").unwrap();
        assert_eq!(hw.journal(), vec!["reboot(5)".to_string()]);
    }
}
