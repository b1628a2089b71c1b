/*!
 * Watchdog proxy.
 *
 * A watchdog is a relay that switches on its own when the application stops
 * calling `reset_watchdog` for longer than the trigger delay.
 */
use std::sync::Arc;

use crate::hardware::{invalid, FunctionClass, FunctionHandle, WatchdogHardware};
use crate::proxy::{proxy_enum, CacheValue, FunctionProxy, OnOff, ProxyBase, Result};

proxy_enum! {
    /// Relay position
    pub enum WatchdogState {
        A = 0 => "A",
        B = 1 => "B",
    }
}

proxy_enum! {
    /// Relay position applied when the module powers up
    pub enum StateAtPowerOn {
        Unchanged = 0 => "UNCHANGED",
        A = 1 => "A",
        B = 2 => "B",
    }
}

/// Cached watchdog properties
#[derive(Debug, Clone)]
pub struct WatchdogCache {
    state: WatchdogState,
    state_at_power_on: StateAtPowerOn,
    max_time_on_state_a: i64,
    max_time_on_state_b: i64,
    auto_start: OnOff,
    running: OnOff,
    trigger_delay: i64,
    trigger_duration: i64,
}

impl Default for WatchdogCache {
    fn default() -> Self {
        Self {
            state: WatchdogState::Invalid,
            state_at_power_on: StateAtPowerOn::Invalid,
            max_time_on_state_a: invalid::LONG,
            max_time_on_state_b: invalid::LONG,
            auto_start: OnOff::Invalid,
            running: OnOff::Invalid,
            trigger_delay: invalid::LONG,
            trigger_duration: invalid::LONG,
        }
    }
}

/// Proxy of a watchdog relay
#[derive(Debug)]
pub struct WatchdogProxy {
    base: ProxyBase<dyn WatchdogHardware, WatchdogCache>,
}

impl FunctionProxy for WatchdogProxy {
    const CLASS: FunctionClass = FunctionClass::Watchdog;
    type Hardware = dyn WatchdogHardware;
    type Cache = WatchdogCache;

    fn new(base: ProxyBase<dyn WatchdogHardware, WatchdogCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn WatchdogHardware, WatchdogCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn WatchdogHardware>> {
        match handle {
            FunctionHandle::Watchdog(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("state_at_power_on", |c| &mut c.state_at_power_on, |hw| {
            hw.get_state_at_power_on().map(StateAtPowerOn::from_library)
        });
        b.refresh("max_time_on_state_a", |c| &mut c.max_time_on_state_a, |hw| hw.get_max_time_on_state_a());
        b.refresh("max_time_on_state_b", |c| &mut c.max_time_on_state_b, |hw| hw.get_max_time_on_state_b());
        b.refresh("auto_start", |c| &mut c.auto_start, |hw| hw.get_auto_start().map(OnOff::from_library));
        b.refresh("running", |c| &mut c.running, |hw| hw.get_running().map(OnOff::from_library));
        b.refresh("trigger_delay", |c| &mut c.trigger_delay, |hw| hw.get_trigger_delay());
        b.refresh("trigger_duration", |c| &mut c.trigger_duration, |hw| hw.get_trigger_duration());
    }

    fn refresh_cache(&self) {
        self.base.refresh("state", |c| &mut c.state, |hw| hw.get_state().map(WatchdogState::from_library));
    }

    fn parse_advertised(&self, value: &str) {
        let state = WatchdogState::from_name(value);
        if !state.is_invalid() {
            self.base.store("state", |c| &mut c.state, state);
        }
    }
}

impl WatchdogProxy {
    /// Read the relay position
    pub fn get_state(&self) -> Result<WatchdogState> {
        self.base.read(|hw| hw.get_state().map(WatchdogState::from_library))
    }

    /// Change the relay position
    pub fn set_state(&self, value: WatchdogState) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_state(v.to_library()))
    }

    /// Cached relay position
    pub fn state(&self) -> WatchdogState {
        self.base.cached(|c| &c.state)
    }

    /// Like `set_state`, skipped when the value matches the cache
    pub fn apply_state(&self, value: WatchdogState) -> Result<()> {
        self.base.apply("state", |c| &mut c.state, value, |hw, v| hw.set_state(v.to_library()))
    }

    /// Read the relay state at power up
    pub fn get_state_at_power_on(&self) -> Result<StateAtPowerOn> {
        self.base.read(|hw| hw.get_state_at_power_on().map(StateAtPowerOn::from_library))
    }

    /// Change the relay state at power up
    pub fn set_state_at_power_on(&self, value: StateAtPowerOn) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_state_at_power_on(v.to_library()))
    }

    /// Cached relay state at power up
    pub fn state_at_power_on(&self) -> StateAtPowerOn {
        self.base.cached(|c| &c.state_at_power_on)
    }

    /// Like `set_state_at_power_on`, skipped when the value matches the cache
    pub fn apply_state_at_power_on(&self, value: StateAtPowerOn) -> Result<()> {
        self.base.apply("state_at_power_on", |c| &mut c.state_at_power_on, value, |hw, v| {
            hw.set_state_at_power_on(v.to_library())
        })
    }

    /// Read the longest time the relay may stay in state A, in ms (0 for no limit)
    pub fn get_max_time_on_state_a(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_max_time_on_state_a())
    }

    /// Change the longest time the relay may stay in state A
    pub fn set_max_time_on_state_a(&self, value: i64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_max_time_on_state_a(v))
    }

    /// Cached longest time the relay may stay in state A
    pub fn max_time_on_state_a(&self) -> i64 {
        self.base.cached(|c| &c.max_time_on_state_a)
    }

    /// Like `set_max_time_on_state_a`, skipped when the value matches the cache
    pub fn apply_max_time_on_state_a(&self, value: i64) -> Result<()> {
        self.base.apply("max_time_on_state_a", |c| &mut c.max_time_on_state_a, value, |hw, v| {
            hw.set_max_time_on_state_a(v)
        })
    }

    /// Read the longest time the relay may stay in state B, in ms (0 for no limit)
    pub fn get_max_time_on_state_b(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_max_time_on_state_b())
    }

    /// Change the longest time the relay may stay in state B
    pub fn set_max_time_on_state_b(&self, value: i64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_max_time_on_state_b(v))
    }

    /// Cached longest time the relay may stay in state B
    pub fn max_time_on_state_b(&self) -> i64 {
        self.base.cached(|c| &c.max_time_on_state_b)
    }

    /// Like `set_max_time_on_state_b`, skipped when the value matches the cache
    pub fn apply_max_time_on_state_b(&self, value: i64) -> Result<()> {
        self.base.apply("max_time_on_state_b", |c| &mut c.max_time_on_state_b, value, |hw, v| {
            hw.set_max_time_on_state_b(v)
        })
    }

    /// Read the output switch
    pub fn get_output(&self) -> Result<OnOff> {
        self.base.read(|hw| hw.get_output().map(OnOff::from_library))
    }

    /// Change the output switch
    pub fn set_output(&self, value: OnOff) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_output(v.to_library()))
    }

    /// Read the time left in the current pulse, in ms
    pub fn get_pulse_timer(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_pulse_timer())
    }

    /// Read the time left before a delayed pulse, in ms
    pub fn get_delayed_pulse_timer(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_delayed_pulse_timer())
    }

    /// Read the time left before the watchdog triggers, in ms
    pub fn get_countdown(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_countdown())
    }

    /// Read whether the watchdog starts running at power up
    pub fn get_auto_start(&self) -> Result<OnOff> {
        self.base.read(|hw| hw.get_auto_start().map(OnOff::from_library))
    }

    /// Change the auto start setting
    pub fn set_auto_start(&self, value: OnOff) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_auto_start(v.to_library()))
    }

    /// Cached auto start setting
    pub fn auto_start(&self) -> OnOff {
        self.base.cached(|c| &c.auto_start)
    }

    /// Like `set_auto_start`, skipped when the value matches the cache
    pub fn apply_auto_start(&self, value: OnOff) -> Result<()> {
        self.base.apply("auto_start", |c| &mut c.auto_start, value, |hw, v| hw.set_auto_start(v.to_library()))
    }

    /// Read whether the watchdog is armed
    pub fn get_running(&self) -> Result<OnOff> {
        self.base.read(|hw| hw.get_running().map(OnOff::from_library))
    }

    /// Change the armed state
    pub fn set_running(&self, value: OnOff) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_running(v.to_library()))
    }

    /// Cached armed state
    pub fn running(&self) -> OnOff {
        self.base.cached(|c| &c.running)
    }

    /// Like `set_running`, skipped when the value matches the cache
    pub fn apply_running(&self, value: OnOff) -> Result<()> {
        self.base.apply("running", |c| &mut c.running, value, |hw, v| hw.set_running(v.to_library()))
    }

    /// Read the delay without reset after which the watchdog triggers, in ms
    pub fn get_trigger_delay(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_trigger_delay())
    }

    /// Change the delay without reset after which the watchdog triggers
    pub fn set_trigger_delay(&self, value: i64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_trigger_delay(v))
    }

    /// Cached delay without reset after which the watchdog triggers
    pub fn trigger_delay(&self) -> i64 {
        self.base.cached(|c| &c.trigger_delay)
    }

    /// Like `set_trigger_delay`, skipped when the value matches the cache
    pub fn apply_trigger_delay(&self, value: i64) -> Result<()> {
        self.base.apply("trigger_delay", |c| &mut c.trigger_delay, value, |hw, v| hw.set_trigger_delay(v))
    }

    /// Read how long the relay stays switched once triggered, in ms
    pub fn get_trigger_duration(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_trigger_duration())
    }

    /// Change the relay switch duration once triggered
    pub fn set_trigger_duration(&self, value: i64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_trigger_duration(v))
    }

    /// Cached relay switch duration once triggered
    pub fn trigger_duration(&self) -> i64 {
        self.base.cached(|c| &c.trigger_duration)
    }

    /// Like `set_trigger_duration`, skipped when the value matches the cache
    pub fn apply_trigger_duration(&self, value: i64) -> Result<()> {
        self.base.apply("trigger_duration", |c| &mut c.trigger_duration, value, |hw, v| {
            hw.set_trigger_duration(v)
        })
    }

    /// Read the number of seconds since the last trigger
    pub fn get_last_trigger(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_last_trigger())
    }

    /// Switch to state B for `ms_duration`, then back to A
    pub fn pulse(&self, ms_duration: i32) -> Result<()> {
        self.base.read(|hw| hw.pulse(ms_duration))
    }

    /// Schedule a pulse after `ms_delay`
    pub fn delayed_pulse(&self, ms_delay: i32, ms_duration: i32) -> Result<()> {
        self.base.read(|hw| hw.delayed_pulse(ms_delay, ms_duration))
    }

    /// Restart the countdown
    pub fn reset_watchdog(&self) -> Result<()> {
        self.base.read(|hw| hw.reset_watchdog())
    }

    /// Swap the relay position
    pub fn toggle(&self) -> Result<()> {
        self.base.read(|hw| hw.toggle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<WatchdogProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(
            SimModule::new("YWDOGMK1-00001")
                .with_named_function(FunctionClass::Watchdog, "watchdog1", "router")
                .with_attr("watchdog1", "trigger_delay", "60000"),
        );
        let manager = ProxyManager::new(library.clone());
        let proxy = WatchdogProxy::find(&manager, "router");
        (library, proxy)
    }

    #[test]
    fn test_enum_shift() {
        assert_eq!(StateAtPowerOn::from_library(0), StateAtPowerOn::Unchanged);
        assert_eq!(StateAtPowerOn::Unchanged.code(), 1);
        assert_eq!(WatchdogState::B.to_library(), 1);
        assert_eq!(WatchdogState::from_code(2), WatchdogState::B);
    }

    #[test]
    fn test_arrival_cache() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.state(), WatchdogState::A);
        assert_eq!(proxy.state_at_power_on(), StateAtPowerOn::Unchanged);
        assert_eq!(proxy.running(), OnOff::Off);
        assert_eq!(proxy.trigger_delay(), 60000);
        assert_eq!(proxy.logical_name(), "router");
    }

    #[test]
    fn test_toggle_updates_state_through_callback() {
        let (_library, proxy) = setup();
        proxy.toggle().unwrap();
        assert_eq!(proxy.state(), WatchdogState::B);
        assert_eq!(proxy.advertised_value(), "B");
        proxy.toggle().unwrap();
        assert_eq!(proxy.state(), WatchdogState::A);
    }

    #[test]
    fn test_arm_and_reset() {
        let (library, proxy) = setup();
        proxy.apply_running(OnOff::On).unwrap();
        proxy.reset_watchdog().unwrap();
        assert_eq!(proxy.running(), OnOff::On);
        assert_eq!(proxy.get_countdown().unwrap(), 60000);

        let hw = library.function("YWDOGMK1-00001.watchdog1").unwrap();
        assert_eq!(
            hw.journal(),
            vec!["set_running(1)".to_string(), "reset_watchdog()".to_string()]
        );
    }

    #[test]
    fn test_output_is_not_cached() {
        let (_library, proxy) = setup();
        proxy.set_output(OnOff::On).unwrap();
        assert_eq!(proxy.get_output().unwrap(), OnOff::On);
        proxy.set_output(OnOff::Invalid).unwrap();
        assert_eq!(proxy.get_output().unwrap(), OnOff::On);
    }
}
