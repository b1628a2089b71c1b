/*!
 * Digital I/O port proxy.
 *
 * Port-wide attributes are bit masks, one bit per channel. The advertised
 * value is the port state in hexadecimal.
 */
use std::sync::Arc;

use crate::hardware::{invalid, DigitalIoHardware, FunctionClass, FunctionHandle};
use crate::proxy::{proxy_enum, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// Voltage source feeding the outputs
    pub enum OutputVoltage {
        Usb5V = 0 => "USB_5V",
        Usb3V = 1 => "USB_3V",
        ExtV = 2 => "EXT_V",
        Off = 3 => "OFF",
    }
}

/// Cached digital I/O properties
#[derive(Debug, Clone)]
pub struct DigitalIoCache {
    port_state: i32,
    port_direction: i32,
    port_open_drain: i32,
    port_polarity: i32,
    port_size: i32,
    output_voltage: OutputVoltage,
}

impl Default for DigitalIoCache {
    fn default() -> Self {
        Self {
            port_state: invalid::INT,
            port_direction: invalid::INT,
            port_open_drain: invalid::INT,
            port_polarity: invalid::INT,
            port_size: invalid::INT,
            output_voltage: OutputVoltage::Invalid,
        }
    }
}

/// Proxy of a digital I/O port
#[derive(Debug)]
pub struct DigitalIoProxy {
    base: ProxyBase<dyn DigitalIoHardware, DigitalIoCache>,
}

impl FunctionProxy for DigitalIoProxy {
    const CLASS: FunctionClass = FunctionClass::DigitalIo;
    type Hardware = dyn DigitalIoHardware;
    type Cache = DigitalIoCache;

    fn new(base: ProxyBase<dyn DigitalIoHardware, DigitalIoCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn DigitalIoHardware, DigitalIoCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn DigitalIoHardware>> {
        match handle {
            FunctionHandle::DigitalIo(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("port_direction", |c| &mut c.port_direction, |hw| hw.get_port_direction());
        b.refresh("port_open_drain", |c| &mut c.port_open_drain, |hw| hw.get_port_open_drain());
        b.refresh("port_polarity", |c| &mut c.port_polarity, |hw| hw.get_port_polarity());
        b.refresh("port_size", |c| &mut c.port_size, |hw| hw.get_port_size());
        b.refresh("output_voltage", |c| &mut c.output_voltage, |hw| {
            hw.get_output_voltage().map(OutputVoltage::from_library)
        });
    }

    fn refresh_cache(&self) {
        self.base.refresh("port_state", |c| &mut c.port_state, |hw| hw.get_port_state());
    }

    fn parse_advertised(&self, value: &str) {
        // 32-bit ports advertise the top bit as part of the mask
        if let Ok(state) = u32::from_str_radix(value.trim(), 16) {
            self.base.store("port_state", |c| &mut c.port_state, state as i32);
        }
    }
}

impl DigitalIoProxy {
    /// Read the state of every channel as a bit mask
    pub fn get_port_state(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_port_state())
    }

    /// Drive every output channel at once; input bits are ignored
    pub fn set_port_state(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_port_state(v))
    }

    /// Cached port state
    pub fn port_state(&self) -> i32 {
        self.base.cached(|c| &c.port_state)
    }

    /// Like `set_port_state`, skipped when the value matches the cache
    pub fn apply_port_state(&self, value: i32) -> Result<()> {
        self.base.apply("port_state", |c| &mut c.port_state, value, |hw, v| hw.set_port_state(v))
    }

    /// Read the channel directions, `1` bits are outputs
    pub fn get_port_direction(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_port_direction())
    }

    /// Change the channel directions
    pub fn set_port_direction(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_port_direction(v))
    }

    /// Cached channel directions
    pub fn port_direction(&self) -> i32 {
        self.base.cached(|c| &c.port_direction)
    }

    /// Like `set_port_direction`, skipped when the value matches the cache
    pub fn apply_port_direction(&self, value: i32) -> Result<()> {
        self.base.apply("port_direction", |c| &mut c.port_direction, value, |hw, v| hw.set_port_direction(v))
    }

    /// Read the open-drain channel mask
    pub fn get_port_open_drain(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_port_open_drain())
    }

    /// Change the open-drain channel mask
    pub fn set_port_open_drain(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_port_open_drain(v))
    }

    /// Cached open-drain channel mask
    pub fn port_open_drain(&self) -> i32 {
        self.base.cached(|c| &c.port_open_drain)
    }

    /// Like `set_port_open_drain`, skipped when the value matches the cache
    pub fn apply_port_open_drain(&self, value: i32) -> Result<()> {
        self.base.apply("port_open_drain", |c| &mut c.port_open_drain, value, |hw, v| {
            hw.set_port_open_drain(v)
        })
    }

    /// Read the channel polarities, `1` bits are inverted
    pub fn get_port_polarity(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_port_polarity())
    }

    /// Change the channel polarities
    pub fn set_port_polarity(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_port_polarity(v))
    }

    /// Cached channel polarities
    pub fn port_polarity(&self) -> i32 {
        self.base.cached(|c| &c.port_polarity)
    }

    /// Like `set_port_polarity`, skipped when the value matches the cache
    pub fn apply_port_polarity(&self, value: i32) -> Result<()> {
        self.base.apply("port_polarity", |c| &mut c.port_polarity, value, |hw, v| hw.set_port_polarity(v))
    }

    /// Read the channel diagnostics, `1` bits are in fault
    pub fn get_port_diags(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_port_diags())
    }

    /// Read the number of channels
    pub fn get_port_size(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_port_size())
    }

    /// Cached number of channels
    pub fn port_size(&self) -> i32 {
        self.base.cached(|c| &c.port_size)
    }

    /// Read the output voltage
    pub fn get_output_voltage(&self) -> Result<OutputVoltage> {
        self.base.read(|hw| hw.get_output_voltage().map(OutputVoltage::from_library))
    }

    /// Change the output voltage
    pub fn set_output_voltage(&self, value: OutputVoltage) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_output_voltage(v.to_library()))
    }

    /// Cached output voltage
    pub fn output_voltage(&self) -> OutputVoltage {
        self.base.cached(|c| &c.output_voltage)
    }

    /// Like `set_output_voltage`, skipped when the value matches the cache
    pub fn apply_output_voltage(&self, value: OutputVoltage) -> Result<()> {
        self.base.apply("output_voltage", |c| &mut c.output_voltage, value, |hw, v| {
            hw.set_output_voltage(v.to_library())
        })
    }

    /// Drive one output channel
    pub fn set_bit_state(&self, bitno: i32, state: i32) -> Result<()> {
        self.base.read(|hw| hw.set_bit_state(bitno, state))
    }

    /// Read one channel
    pub fn get_bit_state(&self, bitno: i32) -> Result<i32> {
        self.base.read(|hw| hw.get_bit_state(bitno))
    }

    /// Invert one output channel
    pub fn toggle_bit_state(&self, bitno: i32) -> Result<()> {
        self.base.read(|hw| hw.toggle_bit_state(bitno))
    }

    /// Make one channel an input (0) or an output (1)
    pub fn set_bit_direction(&self, bitno: i32, direction: i32) -> Result<()> {
        self.base.read(|hw| hw.set_bit_direction(bitno, direction))
    }

    /// Read the direction of one channel
    pub fn get_bit_direction(&self, bitno: i32) -> Result<i32> {
        self.base.read(|hw| hw.get_bit_direction(bitno))
    }

    /// Change the polarity of one channel
    pub fn set_bit_polarity(&self, bitno: i32, polarity: i32) -> Result<()> {
        self.base.read(|hw| hw.set_bit_polarity(bitno, polarity))
    }

    /// Read the polarity of one channel
    pub fn get_bit_polarity(&self, bitno: i32) -> Result<i32> {
        self.base.read(|hw| hw.get_bit_polarity(bitno))
    }

    /// Switch one channel between regular and open-drain output
    pub fn set_bit_open_drain(&self, bitno: i32, open_drain: i32) -> Result<()> {
        self.base.read(|hw| hw.set_bit_open_drain(bitno, open_drain))
    }

    /// Read whether one channel is open-drain
    pub fn get_bit_open_drain(&self, bitno: i32) -> Result<i32> {
        self.base.read(|hw| hw.get_bit_open_drain(bitno))
    }

    /// Read the diagnostic flags of one channel
    pub fn get_bit_diags(&self, bitno: i32) -> Result<i32> {
        self.base.read(|hw| hw.get_bit_diags(bitno))
    }

    /// Set an output high for `ms_duration`, then low
    pub fn pulse(&self, bitno: i32, ms_duration: i32) -> Result<()> {
        self.base.read(|hw| hw.pulse(bitno, ms_duration))
    }

    /// Schedule a pulse on one channel after `ms_delay`
    pub fn delayed_pulse(&self, bitno: i32, ms_delay: i32, ms_duration: i32) -> Result<()> {
        self.base.read(|hw| hw.delayed_pulse(bitno, ms_delay, ms_duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<DigitalIoProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("MAXIIO01-00001").with_function(FunctionClass::DigitalIo, "digitalIO"));
        let manager = ProxyManager::new(library.clone());
        let proxy = DigitalIoProxy::find(&manager, "MAXIIO01-00001.digitalIO");
        (library, proxy)
    }

    #[test]
    fn test_port_state_tracks_hex_advertised_value() {
        let (library, proxy) = setup();
        assert_eq!(proxy.port_state(), 0);
        assert_eq!(proxy.port_size(), 8);

        let hw = library.function("MAXIIO01-00001.digitalIO").unwrap();
        hw.push_value("C3");
        assert_eq!(proxy.port_state(), 0xC3);
        hw.push_value("zz");
        assert_eq!(proxy.port_state(), 0xC3);
    }

    #[test]
    fn test_port_state_keeps_top_bit() {
        let (library, proxy) = setup();
        let hw = library.function("MAXIIO01-00001.digitalIO").unwrap();
        hw.push_value("800000A5");
        assert_eq!(proxy.port_state(), 0x8000_00A5_u32 as i32);
        assert!(proxy.port_state() < 0);
    }

    #[test]
    fn test_bit_operations_update_cache() {
        let (_library, proxy) = setup();
        proxy.set_bit_state(2, 1).unwrap();
        proxy.toggle_bit_state(0).unwrap();
        assert_eq!(proxy.port_state(), 0b101);
        assert_eq!(proxy.advertised_value(), "5");
        assert_eq!(proxy.get_bit_state(2).unwrap(), 1);
        assert!(proxy.set_bit_state(32, 1).is_err());
    }

    #[test]
    fn test_output_voltage_remap() {
        let (library, proxy) = setup();
        assert_eq!(proxy.output_voltage(), OutputVoltage::Usb5V);
        proxy.apply_output_voltage(OutputVoltage::ExtV).unwrap();
        let hw = library.function("MAXIIO01-00001.digitalIO").unwrap();
        assert_eq!(hw.attr("output_voltage").as_deref(), Some("2"));
        assert_eq!(proxy.output_voltage().code(), 3);
    }

    #[test]
    fn test_pulses_forwarded() {
        let (library, proxy) = setup();
        proxy.pulse(1, 250).unwrap();
        proxy.delayed_pulse(1, 100, 250).unwrap();
        let hw = library.function("MAXIIO01-00001.digitalIO").unwrap();
        assert_eq!(
            hw.journal(),
            vec!["pulse(1, 250)".to_string(), "delayed_pulse(1, 100, 250)".to_string()]
        );
    }
}
