/*!
 * DC motor proxy.
 */
use std::sync::Arc;

use crate::hardware::{FunctionClass, FunctionHandle, MotorHardware};
use crate::proxy::{proxy_enum, sentinel, CacheValue, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// Motor controller status, advertised by the device
    pub enum MotorStatus {
        Idle = 0 => "IDLE",
        Brake = 1 => "BRAKE",
        Forwd = 2 => "FORWD",
        Backwd = 3 => "BACKWD",
        Lovolt = 4 => "LOVOLT",
        Hicurr = 5 => "HICURR",
        Hiheat = 6 => "HIHEAT",
        Failsf = 7 => "FAILSF",
    }
}

/// Cached motor properties
#[derive(Debug, Clone)]
pub struct MotorCache {
    motor_status: MotorStatus,
    driving_force: f64,
    braking_force: f64,
    cut_off_voltage: f64,
    overcurrent_limit: i32,
    frequency: f64,
    starter_time: i32,
    fail_safe_timeout: i32,
}

impl Default for MotorCache {
    fn default() -> Self {
        Self {
            motor_status: MotorStatus::Invalid,
            driving_force: f64::NAN,
            braking_force: f64::NAN,
            cut_off_voltage: f64::NAN,
            overcurrent_limit: crate::hardware::invalid::INT,
            frequency: f64::NAN,
            starter_time: crate::hardware::invalid::INT,
            fail_safe_timeout: crate::hardware::invalid::INT,
        }
    }
}

/// Proxy of a DC motor controller
#[derive(Debug)]
pub struct MotorProxy {
    base: ProxyBase<dyn MotorHardware, MotorCache>,
}

impl FunctionProxy for MotorProxy {
    const CLASS: FunctionClass = FunctionClass::Motor;
    type Hardware = dyn MotorHardware;
    type Cache = MotorCache;

    fn new(base: ProxyBase<dyn MotorHardware, MotorCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn MotorHardware, MotorCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn MotorHardware>> {
        match handle {
            FunctionHandle::Motor(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("driving_force", |c| &mut c.driving_force, |hw| hw.get_driving_force().map(sentinel::double));
        b.refresh("braking_force", |c| &mut c.braking_force, |hw| hw.get_braking_force().map(sentinel::double));
        b.refresh("cut_off_voltage", |c| &mut c.cut_off_voltage, |hw| hw.get_cut_off_voltage().map(sentinel::double));
        b.refresh("overcurrent_limit", |c| &mut c.overcurrent_limit, |hw| hw.get_overcurrent_limit());
        b.refresh("frequency", |c| &mut c.frequency, |hw| hw.get_frequency().map(sentinel::double));
        b.refresh("starter_time", |c| &mut c.starter_time, |hw| hw.get_starter_time());
        b.refresh("fail_safe_timeout", |c| &mut c.fail_safe_timeout, |hw| hw.get_fail_safe_timeout());
    }

    fn refresh_cache(&self) {
        self.base.refresh("motor_status", |c| &mut c.motor_status, |hw| {
            hw.get_motor_status().map(MotorStatus::from_library)
        });
    }

    fn parse_advertised(&self, value: &str) {
        let status = MotorStatus::from_name(value);
        if !status.is_invalid() {
            self.base.store("motor_status", |c| &mut c.motor_status, status);
        }
    }
}

impl MotorProxy {
    /// Read the controller status
    pub fn get_motor_status(&self) -> Result<MotorStatus> {
        self.base.read(|hw| hw.get_motor_status().map(MotorStatus::from_library))
    }

    /// Change the controller status; only `Idle` is accepted by devices,
    /// to leave an error state
    pub fn set_motor_status(&self, value: MotorStatus) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_motor_status(v.to_library()))
    }

    /// Cached controller status
    pub fn motor_status(&self) -> MotorStatus {
        self.base.cached(|c| &c.motor_status)
    }

    /// Like `set_motor_status`, skipped when the value matches the cache
    pub fn apply_motor_status(&self, value: MotorStatus) -> Result<()> {
        self.base.apply("motor_status", |c| &mut c.motor_status, value, |hw, v| {
            hw.set_motor_status(v.to_library())
        })
    }

    /// Read the driving force, in percent (-100..100)
    pub fn get_driving_force(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_driving_force().map(sentinel::double))
    }

    /// Change the driving force
    pub fn set_driving_force(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_driving_force(v))
    }

    /// Cached driving force
    pub fn driving_force(&self) -> f64 {
        self.base.cached(|c| &c.driving_force)
    }

    /// Like `set_driving_force`, skipped when the value matches the cache
    pub fn apply_driving_force(&self, value: f64) -> Result<()> {
        self.base.apply("driving_force", |c| &mut c.driving_force, value, |hw, v| hw.set_driving_force(v))
    }

    /// Read the braking force, in percent
    pub fn get_braking_force(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_braking_force().map(sentinel::double))
    }

    /// Change the braking force
    pub fn set_braking_force(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_braking_force(v))
    }

    /// Cached braking force
    pub fn braking_force(&self) -> f64 {
        self.base.cached(|c| &c.braking_force)
    }

    /// Like `set_braking_force`, skipped when the value matches the cache
    pub fn apply_braking_force(&self, value: f64) -> Result<()> {
        self.base.apply("braking_force", |c| &mut c.braking_force, value, |hw, v| hw.set_braking_force(v))
    }

    /// Read the supply voltage under which the motor is stopped, in volts
    pub fn get_cut_off_voltage(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_cut_off_voltage().map(sentinel::double))
    }

    /// Change the supply voltage under which the motor is stopped
    pub fn set_cut_off_voltage(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_cut_off_voltage(v))
    }

    /// Cached supply voltage under which the motor is stopped
    pub fn cut_off_voltage(&self) -> f64 {
        self.base.cached(|c| &c.cut_off_voltage)
    }

    /// Like `set_cut_off_voltage`, skipped when the value matches the cache
    pub fn apply_cut_off_voltage(&self, value: f64) -> Result<()> {
        self.base.apply("cut_off_voltage", |c| &mut c.cut_off_voltage, value, |hw, v| hw.set_cut_off_voltage(v))
    }

    /// Read the current limit, in mA
    pub fn get_overcurrent_limit(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_overcurrent_limit())
    }

    /// Change the current limit
    pub fn set_overcurrent_limit(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_overcurrent_limit(v))
    }

    /// Cached current limit
    pub fn overcurrent_limit(&self) -> i32 {
        self.base.cached(|c| &c.overcurrent_limit)
    }

    /// Like `set_overcurrent_limit`, skipped when the value matches the cache
    pub fn apply_overcurrent_limit(&self, value: i32) -> Result<()> {
        self.base.apply("overcurrent_limit", |c| &mut c.overcurrent_limit, value, |hw, v| {
            hw.set_overcurrent_limit(v)
        })
    }

    /// Read the PWM frequency, in Hz
    pub fn get_frequency(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_frequency().map(sentinel::double))
    }

    /// Change the PWM frequency
    pub fn set_frequency(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_frequency(v))
    }

    /// Cached PWM frequency
    pub fn frequency(&self) -> f64 {
        self.base.cached(|c| &c.frequency)
    }

    /// Like `set_frequency`, skipped when the value matches the cache
    pub fn apply_frequency(&self, value: f64) -> Result<()> {
        self.base.apply("frequency", |c| &mut c.frequency, value, |hw, v| hw.set_frequency(v))
    }

    /// Read the duration of the starting boost, in ms
    pub fn get_starter_time(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_starter_time())
    }

    /// Change the duration of the starting boost
    pub fn set_starter_time(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_starter_time(v))
    }

    /// Cached duration of the starting boost
    pub fn starter_time(&self) -> i32 {
        self.base.cached(|c| &c.starter_time)
    }

    /// Like `set_starter_time`, skipped when the value matches the cache
    pub fn apply_starter_time(&self, value: i32) -> Result<()> {
        self.base.apply("starter_time", |c| &mut c.starter_time, value, |hw, v| hw.set_starter_time(v))
    }

    /// Read the delay after which the motor stops without `keep_alive`, in ms
    pub fn get_fail_safe_timeout(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_fail_safe_timeout())
    }

    /// Change the delay after which the motor stops without `keep_alive`
    pub fn set_fail_safe_timeout(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_fail_safe_timeout(v))
    }

    /// Cached delay after which the motor stops without `keep_alive`
    pub fn fail_safe_timeout(&self) -> i32 {
        self.base.cached(|c| &c.fail_safe_timeout)
    }

    /// Like `set_fail_safe_timeout`, skipped when the value matches the cache
    pub fn apply_fail_safe_timeout(&self, value: i32) -> Result<()> {
        self.base.apply("fail_safe_timeout", |c| &mut c.fail_safe_timeout, value, |hw, v| {
            hw.set_fail_safe_timeout(v)
        })
    }

    /// Rearm the fail-safe timer
    pub fn keep_alive(&self) -> Result<()> {
        self.base.read(|hw| hw.keep_alive())
    }

    /// Leave an error state
    pub fn reset_status(&self) -> Result<()> {
        self.base.read(|hw| hw.reset_status())
    }

    /// Ramp the driving force to `target` over `ms_duration`
    pub fn driving_force_move(&self, target: f64, ms_duration: i32) -> Result<()> {
        self.base.read(|hw| hw.driving_force_move(target, ms_duration))
    }

    /// Ramp the braking force to `target` over `ms_duration`
    pub fn braking_force_move(&self, target: f64, ms_duration: i32) -> Result<()> {
        self.base.read(|hw| hw.braking_force_move(target, ms_duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::proxy::ProxyObject;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<MotorProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("MOTORCTL-00001").with_function(FunctionClass::Motor, "motor"));
        let manager = ProxyManager::new(library.clone());
        let proxy = MotorProxy::find(&manager, "motor");
        (library, proxy)
    }

    #[test]
    fn test_arrival_fills_cache() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.motor_status(), MotorStatus::Idle);
        assert_eq!(proxy.frequency(), 20000.0);
        assert_eq!(proxy.overcurrent_limit(), 2000);
        assert_eq!(proxy.starter_time(), 100);
    }

    #[test]
    fn test_status_round_trip_and_push() {
        let (library, proxy) = setup();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();

        hw.push_value("HICURR");
        assert_eq!(proxy.motor_status(), MotorStatus::Hicurr);
        assert_eq!(proxy.motor_status().code(), 6);

        proxy.reset_status().unwrap();
        assert_eq!(proxy.motor_status(), MotorStatus::Idle);
        assert_eq!(proxy.get_motor_status().unwrap(), MotorStatus::Idle);
    }

    #[test]
    fn test_unknown_advertised_value_is_ignored() {
        let (library, proxy) = setup();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        hw.push_value("BACKWD");
        hw.push_value("garbage");
        assert_eq!(proxy.motor_status(), MotorStatus::Backwd);
        assert_eq!(proxy.advertised_value(), "garbage");
    }

    #[test]
    fn test_invalid_status_is_not_written() {
        let (library, proxy) = setup();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        proxy.set_motor_status(MotorStatus::Invalid).unwrap();
        assert!(hw.journal().is_empty());
    }

    #[test]
    fn test_library_rejection_surfaces() {
        let (_library, proxy) = setup();
        let err = proxy.set_driving_force(150.0).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(proxy.apply_driving_force(150.0).is_err());
        assert_eq!(proxy.driving_force(), 0.0);
    }

    #[test]
    fn test_commands_forwarded() {
        let (library, proxy) = setup();
        proxy.keep_alive().unwrap();
        proxy.driving_force_move(50.0, 1000).unwrap();
        proxy.braking_force_move(10.0, 200).unwrap();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        assert_eq!(
            hw.journal(),
            vec![
                "keep_alive()".to_string(),
                "driving_force_move(50, 1000)".to_string(),
                "braking_force_move(10, 200)".to_string(),
            ]
        );
        assert_eq!(proxy.get_driving_force().unwrap(), 50.0);
    }

    #[test]
    fn test_config_change_reloads() {
        let (library, proxy) = setup();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        hw.set_config_attr("frequency", 25000);
        assert_eq!(proxy.frequency(), 25000.0);
        assert!(proxy.is_online());
    }
}
