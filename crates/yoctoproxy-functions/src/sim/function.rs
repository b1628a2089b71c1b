/*!
 * Simulated hardware function.
 *
 * One type serves every class: attributes live in a string map in library
 * encoding, exactly as the device would report them, and every forwarded
 * command is appended to a journal that tests can inspect.
 */
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::trace;

use crate::functions::motor::MotorStatus;
use crate::functions::power_output::PowerOutputVoltage;
use crate::functions::stepper_motor::StepperMotorState;
use crate::functions::watchdog::WatchdogState;
use crate::hardware::{
    invalid, is_valid_logical_name, CalibrationPoints, CaptureData, CellRecord, CellularHardware,
    ConfigChangeCallback, DigitalIoHardware, DisplayHardware, DisplayLayerHardware,
    FunctionClass, HardwareError, HardwareFunction, HwResult, InputCaptureHardware,
    ModuleHardware, MotorHardware, PowerOutputHardware, RfidOptions, RfidReaderHardware,
    RfidTagInfo, SensorHardware, StepperMotorHardware, ValueCallback, WatchdogHardware,
};

use super::layer::SimLayer;

const TAG_BLOCK_SIZE: usize = 16;

#[derive(Debug, Clone)]
struct SimTag {
    memory: Vec<u8>,
    locked: Vec<bool>,
    afi: i32,
}

#[derive(Default)]
struct SimState {
    online: bool,
    logical_name: String,
    attrs: HashMap<String, String>,
    journal: Vec<String>,
    failure: Option<HardwareError>,
    calibration: CalibrationPoints,
    last_capture: CaptureData,
    tags: BTreeMap<String, SimTag>,
    layers: BTreeMap<i32, Arc<SimLayer>>,
}

#[derive(Default)]
struct Callbacks {
    value: Option<ValueCallback>,
    config: Option<ConfigChangeCallback>,
}

/// In-memory function of any class
pub struct SimFunction {
    class: FunctionClass,
    serial: String,
    function_id: String,
    hosted: Vec<String>,
    state: Mutex<SimState>,
    callbacks: Mutex<Callbacks>,
}

impl fmt::Debug for SimFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimFunction")
            .field("class", &self.class)
            .field("hardware_id", &self.hardware_id())
            .finish()
    }
}

/// Attributes a freshly plugged function reports
fn default_attrs(class: FunctionClass) -> &'static [(&'static str, &'static str)] {
    match class {
        FunctionClass::Cellular => &[
            ("link_quality", "72"),
            ("cell_operator", "Swisscom"),
            ("cell_identifier", "228-01-1a2b-3c4d"),
            ("cell_type", "6"),
            ("imsi", "228012345678901"),
            ("message", "Connected"),
            ("pin", ""),
            ("radio_config", "LTE-M"),
            ("locked_operator", ""),
            ("airplane_mode", "0"),
            ("enable_data", "0"),
            ("apn", "gprs.swisscom.ch"),
            ("ping_interval", "0"),
            ("data_sent", "0"),
            ("data_received", "0"),
        ],
        FunctionClass::DigitalIo => &[
            ("port_state", "0"),
            ("port_direction", "0"),
            ("port_open_drain", "0"),
            ("port_polarity", "0"),
            ("port_diags", "0"),
            ("port_size", "8"),
            ("output_voltage", "0"),
        ],
        FunctionClass::Display => &[
            ("enabled", "1"),
            ("startup_seq", ""),
            ("brightness", "50"),
            ("orientation", "1"),
            ("display_width", "128"),
            ("display_height", "32"),
            ("display_type", "0"),
            ("layer_width", "128"),
            ("layer_height", "32"),
            ("layer_count", "5"),
        ],
        FunctionClass::InputCapture => &[
            ("last_capture_time", "0"),
            ("n_samples", "1000"),
            ("sampling_rate", "5000"),
            ("capture_type", "1"),
            ("cond_value", "0"),
            ("cond_align", "50"),
            ("capture_type_at_startup", "0"),
            ("cond_value_at_startup", "0"),
        ],
        FunctionClass::Module => &[
            ("product_id", "49"),
            ("product_release", "1"),
            ("firmware_release", "60000"),
            ("persistent_settings", "0"),
            ("luminosity", "50"),
            ("beacon", "0"),
            ("up_time", "0"),
            ("usb_current", "32"),
            ("reboot_countdown", "0"),
            ("user_var", "0"),
        ],
        FunctionClass::Motor => &[
            ("motor_status", "0"),
            ("driving_force", "0"),
            ("braking_force", "0"),
            ("cut_off_voltage", "6"),
            ("overcurrent_limit", "2000"),
            ("frequency", "20000"),
            ("starter_time", "100"),
            ("fail_safe_timeout", "0"),
        ],
        FunctionClass::PowerOutput => &[("voltage", "0")],
        FunctionClass::RfidReader => &[("n_tags", "0"), ("refresh_rate", "5")],
        FunctionClass::Sensor => &[
            ("unit", "'C"),
            ("current_value", "21.5"),
            ("lowest_value", "21.5"),
            ("highest_value", "21.5"),
            ("current_raw_value", "21.5"),
            ("log_frequency", "1/s"),
            ("report_frequency", "OFF"),
            ("adv_mode", "0"),
            ("resolution", "0.1"),
            ("sensor_state", "0"),
        ],
        FunctionClass::StepperMotor => &[
            ("motor_state", "3"),
            ("diags", "0"),
            ("step_pos", "0"),
            ("speed", "0"),
            ("pullin_speed", "200"),
            ("max_accel", "1000"),
            ("max_speed", "2000"),
            ("stepping", "0"),
            ("overcurrent", "1500"),
            ("t_curr_stop", "20"),
            ("t_curr_run", "80"),
            ("alert_mode", ""),
            ("aux_mode", ""),
            ("aux_signal", "0"),
        ],
        FunctionClass::Watchdog => &[
            ("state", "0"),
            ("state_at_power_on", "0"),
            ("max_time_on_state_a", "0"),
            ("max_time_on_state_b", "0"),
            ("output", "0"),
            ("pulse_timer", "0"),
            ("delayed_pulse_timer", "0"),
            ("countdown", "0"),
            ("auto_start", "0"),
            ("running", "0"),
            ("trigger_delay", "0"),
            ("trigger_duration", "0"),
            ("last_trigger", "0"),
        ],
    }
}

/// Attribute whose changes the device advertises
fn advertised_attr(class: FunctionClass) -> Option<&'static str> {
    match class {
        FunctionClass::Cellular => Some("link_quality"),
        FunctionClass::DigitalIo => Some("port_state"),
        FunctionClass::Display => Some("enabled"),
        FunctionClass::InputCapture => Some("last_capture_time"),
        FunctionClass::Module => None,
        FunctionClass::Motor => Some("motor_status"),
        FunctionClass::PowerOutput => Some("voltage"),
        FunctionClass::RfidReader => Some("n_tags"),
        FunctionClass::Sensor => Some("current_value"),
        FunctionClass::StepperMotor => Some("motor_state"),
        FunctionClass::Watchdog => Some("state"),
    }
}

fn format_advertised(class: FunctionClass, raw: &str) -> String {
    let code = || raw.parse::<i32>().unwrap_or(invalid::ENUM);
    match class {
        FunctionClass::DigitalIo => format!("{:X}", raw.parse::<i64>().unwrap_or(0)),
        FunctionClass::Motor => MotorStatus::from_library(code()).name().to_string(),
        FunctionClass::PowerOutput => PowerOutputVoltage::from_library(code()).name().to_string(),
        FunctionClass::StepperMotor => StepperMotorState::from_library(code()).name().to_string(),
        FunctionClass::Watchdog => WatchdogState::from_library(code()).name().to_string(),
        _ => raw.to_string(),
    }
}

fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

fn from_hex(hex: &str) -> HwResult<Vec<u8>> {
    if !hex.is_ascii() {
        return Err(HardwareError::InvalidArgument(format!("Invalid hex: {}", hex)));
    }
    if hex.len() % 2 != 0 {
        return Err(HardwareError::InvalidArgument(format!("Odd hex length: {}", hex.len())));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| HardwareError::InvalidArgument(format!("Invalid hex: {}", hex)))
        })
        .collect()
}

impl SimFunction {
    pub(crate) fn new(
        class: FunctionClass,
        serial: &str,
        function_id: &str,
        logical_name: &str,
        hosted: Vec<String>,
    ) -> Self {
        let attrs = default_attrs(class)
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            class,
            serial: serial.to_string(),
            function_id: function_id.to_string(),
            hosted,
            state: Mutex::new(SimState {
                logical_name: logical_name.to_string(),
                attrs,
                ..SimState::default()
            }),
            callbacks: Mutex::new(Callbacks::default()),
        }
    }

    /// Function class
    pub fn class(&self) -> FunctionClass {
        self.class
    }

    pub(crate) fn id(&self) -> &str {
        &self.function_id
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks(&self) -> std::sync::MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    /// Commands forwarded so far, oldest first
    pub fn journal(&self) -> Vec<String> {
        self.state().journal.clone()
    }

    /// Make every call fail with `failure` until cleared with `None`
    pub fn set_failure(&self, failure: Option<HardwareError>) {
        self.state().failure = failure;
    }

    /// Raw attribute, library encoding
    pub fn attr(&self, name: &str) -> Option<String> {
        self.state().attrs.get(name).cloned()
    }

    /// Change an attribute silently, as a device-side change nobody reported
    pub fn set_attr(&self, name: &str, value: impl Display) {
        self.state().attrs.insert(name.to_string(), value.to_string());
    }

    /// Device-side change of the advertised attribute, with notification
    pub fn push_value(&self, advertised: &str) {
        if let Some(attr) = advertised_attr(self.class) {
            let raw = self.raw_from_advertised(advertised);
            self.state().attrs.insert(attr.to_string(), raw);
        }
        self.fire_value(advertised.to_string());
    }

    /// Configuration change made outside the proxy, with notification
    pub fn set_config_attr(&self, name: &str, value: impl Display) {
        self.set_attr(name, value);
        self.fire_config();
    }

    /// Put a tag in the reader field
    pub fn insert_tag(&self, tag_id: &str, memory_size: usize) {
        let count = {
            let mut state = self.state();
            let blocks = (memory_size + TAG_BLOCK_SIZE - 1) / TAG_BLOCK_SIZE;
            state.tags.insert(
                tag_id.to_string(),
                SimTag {
                    memory: vec![0; blocks * TAG_BLOCK_SIZE],
                    locked: vec![false; blocks],
                    afi: 0,
                },
            );
            state.tags.len()
        };
        self.store_attr("n_tags", count);
    }

    /// Remove a tag from the reader field
    pub fn remove_tag(&self, tag_id: &str) {
        let count = {
            let mut state = self.state();
            state.tags.remove(tag_id);
            state.tags.len()
        };
        self.store_attr("n_tags", count);
    }

    /// Store the capture returned by `get_last_capture` and advertise it
    pub fn record_capture(&self, capture: CaptureData, capture_time: i64) {
        self.state().last_capture = capture;
        self.store_attr("last_capture_time", capture_time);
    }

    /// Layers created so far through `display_layer`
    pub fn layers(&self) -> Vec<Arc<SimLayer>> {
        self.state().layers.values().cloned().collect()
    }

    fn raw_from_advertised(&self, advertised: &str) -> String {
        match self.class {
            FunctionClass::DigitalIo => i64::from_str_radix(advertised, 16)
                .map(|v| v.to_string())
                .unwrap_or_else(|_| advertised.to_string()),
            FunctionClass::Motor => MotorStatus::from_name(advertised).to_library().to_string(),
            FunctionClass::PowerOutput => PowerOutputVoltage::from_name(advertised).to_library().to_string(),
            FunctionClass::StepperMotor => StepperMotorState::from_name(advertised).to_library().to_string(),
            FunctionClass::Watchdog => WatchdogState::from_name(advertised).to_library().to_string(),
            _ => advertised.to_string(),
        }
    }

    fn fire_value(&self, advertised: String) {
        let callback = self.callbacks().value.clone();
        if let Some(callback) = callback {
            trace!(hardware_id = %self.hardware_id(), value = %advertised, "Value callback");
            callback(&advertised);
        }
    }

    fn fire_config(&self) {
        let callback = self.callbacks().config.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn check(&self) -> HwResult<()> {
        let state = self.state();
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        if !state.online {
            return Err(HardwareError::DeviceNotFound(format!(
                "{}.{} is offline",
                self.serial, self.function_id
            )));
        }
        Ok(())
    }

    fn get<T: FromStr>(&self, name: &str, fallback: T) -> HwResult<T> {
        self.check()?;
        Ok(self
            .state()
            .attrs
            .get(name)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(fallback))
    }

    fn get_int(&self, name: &str) -> HwResult<i32> {
        self.get(name, invalid::INT)
    }

    fn get_enum(&self, name: &str) -> HwResult<i32> {
        self.get(name, invalid::ENUM)
    }

    fn get_long(&self, name: &str) -> HwResult<i64> {
        self.get(name, invalid::LONG)
    }

    fn get_double(&self, name: &str) -> HwResult<f64> {
        self.get(name, invalid::DOUBLE)
    }

    fn get_string(&self, name: &str) -> HwResult<String> {
        self.check()?;
        Ok(self
            .state()
            .attrs
            .get(name)
            .cloned()
            .unwrap_or_else(|| invalid::STRING.to_string()))
    }

    /// Store an attribute, notifying when it is the advertised one
    fn store_attr(&self, name: &str, value: impl Display) {
        let raw = value.to_string();
        self.state().attrs.insert(name.to_string(), raw.clone());
        if advertised_attr(self.class) == Some(name) {
            self.fire_value(format_advertised(self.class, &raw));
        }
    }

    fn set(&self, name: &str, value: impl Display) -> HwResult<()> {
        self.check()?;
        let raw = value.to_string();
        self.state().journal.push(format!("set_{}({})", name, raw));
        self.store_attr(name, raw);
        Ok(())
    }

    fn command(&self, line: String) -> HwResult<()> {
        self.check()?;
        self.state().journal.push(line);
        Ok(())
    }

    fn modify_bits(&self, name: &str, bitno: i32, f: impl FnOnce(i64, i64) -> i64) -> HwResult<()> {
        self.check()?;
        if !(0..32).contains(&bitno) {
            return Err(HardwareError::InvalidArgument(format!("Invalid bit number: {}", bitno)));
        }
        let current: i64 = self.get(name, 0)?;
        self.set(name, f(current, 1 << bitno))
    }

    fn bit(&self, name: &str, bitno: i32) -> HwResult<i32> {
        if !(0..32).contains(&bitno) {
            return Err(HardwareError::InvalidArgument(format!("Invalid bit number: {}", bitno)));
        }
        let current: i64 = self.get(name, 0)?;
        Ok(((current >> bitno) & 1) as i32)
    }

    fn with_tag<T>(&self, tag_id: &str, f: impl FnOnce(&mut SimTag) -> HwResult<T>) -> HwResult<T> {
        self.check()?;
        let mut state = self.state();
        match state.tags.get_mut(tag_id) {
            Some(tag) => f(tag),
            None => Err(HardwareError::DeviceNotFound(format!("Tag {} not in field", tag_id))),
        }
    }

    fn tag_range(tag: &SimTag, first_block: i32, n_bytes: usize, options: &RfidOptions) -> HwResult<std::ops::Range<usize>> {
        let start = usize::try_from(first_block)
            .map_err(|_| HardwareError::InvalidArgument(format!("Invalid block: {}", first_block)))?
            * TAG_BLOCK_SIZE;
        let end = start + n_bytes;
        if start > tag.memory.len() {
            return Err(HardwareError::InvalidArgument(format!(
                "Block {} is past the end of tag memory",
                first_block
            )));
        }
        if end > tag.memory.len() && !options.disable_bounds_check {
            return Err(HardwareError::InvalidArgument(format!(
                "Access beyond tag memory ({} > {})",
                end,
                tag.memory.len()
            )));
        }
        Ok(start..end.min(tag.memory.len()))
    }

    fn read_tag(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> HwResult<Vec<u8>> {
        let n_bytes = usize::try_from(n_bytes)
            .map_err(|_| HardwareError::InvalidArgument(format!("Invalid length: {}", n_bytes)))?;
        self.with_tag(tag_id, |tag| {
            let range = Self::tag_range(tag, first_block, n_bytes, options)?;
            Ok(tag.memory[range].to_vec())
        })
    }

    fn write_tag(&self, tag_id: &str, first_block: i32, data: &[u8], options: &RfidOptions) -> HwResult<()> {
        self.with_tag(tag_id, |tag| {
            let range = Self::tag_range(tag, first_block, data.len(), options)?;
            let blocks = range.start / TAG_BLOCK_SIZE..(range.end + TAG_BLOCK_SIZE - 1) / TAG_BLOCK_SIZE;
            if tag.locked.get(blocks).map_or(false, |b| b.iter().any(|l| *l)) {
                return Err(HardwareError::InvalidArgument("Block is locked".to_string()));
            }
            if !options.enable_dry_run {
                let len = range.len();
                tag.memory[range].copy_from_slice(&data[..len]);
            }
            Ok(())
        })?;
        self.state()
            .journal
            .push(format!("tag_write({}, {}, {} bytes)", tag_id, first_block, data.len()));
        Ok(())
    }
}

impl HardwareFunction for SimFunction {
    fn hardware_id(&self) -> String {
        format!("{}.{}", self.serial, self.function_id)
    }

    fn function_id(&self) -> String {
        self.function_id.clone()
    }

    fn serial_number(&self) -> String {
        self.serial.clone()
    }

    fn is_online(&self) -> bool {
        self.state().online
    }

    fn get_logical_name(&self) -> HwResult<String> {
        self.check()?;
        Ok(self.known_logical_name())
    }

    fn known_logical_name(&self) -> String {
        self.state().logical_name.clone()
    }

    fn set_logical_name(&self, name: &str) -> HwResult<()> {
        self.check()?;
        if !is_valid_logical_name(name) {
            return Err(HardwareError::InvalidArgument(format!("Invalid logical name: {}", name)));
        }
        {
            let mut state = self.state();
            state.logical_name = name.to_string();
            state.journal.push(format!("set_logical_name({})", name));
        }
        self.fire_config();
        Ok(())
    }

    fn get_advertised_value(&self) -> HwResult<String> {
        self.check()?;
        Ok(match advertised_attr(self.class) {
            Some(attr) => {
                let raw = self.state().attrs.get(attr).cloned().unwrap_or_default();
                format_advertised(self.class, &raw)
            }
            None => String::new(),
        })
    }

    fn get_friendly_name(&self) -> HwResult<String> {
        self.check()?;
        let logical = self.state().logical_name.clone();
        let function = if logical.is_empty() { self.function_id.clone() } else { logical };
        Ok(format!("{}.{}", self.serial, function))
    }

    fn register_value_callback(&self, callback: Option<ValueCallback>) {
        self.callbacks().value = callback;
    }

    fn register_config_change_callback(&self, callback: Option<ConfigChangeCallback>) {
        self.callbacks().config = callback;
    }
}

impl ModuleHardware for SimFunction {
    fn get_product_name(&self) -> HwResult<String> {
        self.get_string("product_name")
    }

    fn get_product_id(&self) -> HwResult<i32> {
        self.get_int("product_id")
    }

    fn get_product_release(&self) -> HwResult<i32> {
        self.get_int("product_release")
    }

    fn get_firmware_release(&self) -> HwResult<String> {
        self.get_string("firmware_release")
    }

    fn get_persistent_settings(&self) -> HwResult<i32> {
        self.get_enum("persistent_settings")
    }

    fn get_luminosity(&self) -> HwResult<i32> {
        self.get_int("luminosity")
    }

    fn set_luminosity(&self, value: i32) -> HwResult<()> {
        if !(0..=100).contains(&value) {
            return Err(HardwareError::InvalidArgument(format!("Luminosity out of range: {}", value)));
        }
        self.set("luminosity", value)?;
        self.set_attr("persistent_settings", 2);
        Ok(())
    }

    fn get_beacon(&self) -> HwResult<i32> {
        self.get_enum("beacon")
    }

    fn set_beacon(&self, value: i32) -> HwResult<()> {
        self.set("beacon", value)
    }

    fn get_up_time(&self) -> HwResult<i64> {
        self.get_long("up_time")
    }

    fn get_usb_current(&self) -> HwResult<i32> {
        self.get_int("usb_current")
    }

    fn get_reboot_countdown(&self) -> HwResult<i32> {
        self.get_int("reboot_countdown")
    }

    fn get_user_var(&self) -> HwResult<i32> {
        self.get_int("user_var")
    }

    fn set_user_var(&self, value: i32) -> HwResult<()> {
        self.set("user_var", value)
    }

    fn save_to_flash(&self) -> HwResult<()> {
        self.command("save_to_flash()".to_string())?;
        self.set_config_attr("persistent_settings", 1);
        Ok(())
    }

    fn revert_from_flash(&self) -> HwResult<()> {
        self.command("revert_from_flash()".to_string())?;
        self.set_config_attr("persistent_settings", 0);
        Ok(())
    }

    fn reboot(&self, seconds_before: i32) -> HwResult<()> {
        self.command(format!("reboot({})", seconds_before))?;
        self.set_attr("reboot_countdown", seconds_before);
        Ok(())
    }

    fn trigger_firmware_update(&self, seconds_before: i32) -> HwResult<()> {
        self.command(format!("trigger_firmware_update({})", seconds_before))
    }

    fn function_ids(&self) -> HwResult<Vec<String>> {
        self.check()?;
        Ok(self.hosted.clone())
    }
}

impl SensorHardware for SimFunction {
    fn get_unit(&self) -> HwResult<String> {
        self.get_string("unit")
    }

    fn get_current_value(&self) -> HwResult<f64> {
        self.get_double("current_value")
    }

    fn get_lowest_value(&self) -> HwResult<f64> {
        self.get_double("lowest_value")
    }

    fn set_lowest_value(&self, value: f64) -> HwResult<()> {
        self.set("lowest_value", value)
    }

    fn get_highest_value(&self) -> HwResult<f64> {
        self.get_double("highest_value")
    }

    fn set_highest_value(&self, value: f64) -> HwResult<()> {
        self.set("highest_value", value)
    }

    fn get_current_raw_value(&self) -> HwResult<f64> {
        self.get_double("current_raw_value")
    }

    fn get_log_frequency(&self) -> HwResult<String> {
        self.get_string("log_frequency")
    }

    fn set_log_frequency(&self, value: &str) -> HwResult<()> {
        self.set("log_frequency", value)
    }

    fn get_report_frequency(&self) -> HwResult<String> {
        self.get_string("report_frequency")
    }

    fn set_report_frequency(&self, value: &str) -> HwResult<()> {
        self.set("report_frequency", value)
    }

    fn get_adv_mode(&self) -> HwResult<i32> {
        self.get_enum("adv_mode")
    }

    fn set_adv_mode(&self, value: i32) -> HwResult<()> {
        self.set("adv_mode", value)
    }

    fn get_resolution(&self) -> HwResult<f64> {
        self.get_double("resolution")
    }

    fn set_resolution(&self, value: f64) -> HwResult<()> {
        self.set("resolution", value)
    }

    fn get_sensor_state(&self) -> HwResult<i32> {
        self.get_int("sensor_state")
    }

    fn is_sensor_ready(&self) -> HwResult<bool> {
        Ok(self.get_int("sensor_state")? == 0)
    }

    fn start_data_logger(&self) -> HwResult<()> {
        self.command("start_data_logger()".to_string())
    }

    fn stop_data_logger(&self) -> HwResult<()> {
        self.command("stop_data_logger()".to_string())
    }

    fn calibrate_from_points(&self, raw_values: &[f64], ref_values: &[f64]) -> HwResult<()> {
        if raw_values.len() != ref_values.len() {
            return Err(HardwareError::InvalidArgument(
                "Calibration point lists differ in length".to_string(),
            ));
        }
        self.command(format!("calibrate_from_points({} points)", raw_values.len()))?;
        self.state().calibration = CalibrationPoints {
            raw_values: raw_values.to_vec(),
            ref_values: ref_values.to_vec(),
        };
        self.fire_config();
        Ok(())
    }

    fn load_calibration_points(&self) -> HwResult<CalibrationPoints> {
        self.check()?;
        Ok(self.state().calibration.clone())
    }
}

impl CellularHardware for SimFunction {
    fn get_link_quality(&self) -> HwResult<i32> {
        self.get_int("link_quality")
    }

    fn get_cell_operator(&self) -> HwResult<String> {
        self.get_string("cell_operator")
    }

    fn get_cell_identifier(&self) -> HwResult<String> {
        self.get_string("cell_identifier")
    }

    fn get_cell_type(&self) -> HwResult<i32> {
        self.get_enum("cell_type")
    }

    fn get_imsi(&self) -> HwResult<String> {
        self.get_string("imsi")
    }

    fn get_message(&self) -> HwResult<String> {
        self.get_string("message")
    }

    fn get_pin(&self) -> HwResult<String> {
        self.get_string("pin")
    }

    fn set_pin(&self, value: &str) -> HwResult<()> {
        self.set("pin", value)
    }

    fn get_radio_config(&self) -> HwResult<String> {
        self.get_string("radio_config")
    }

    fn set_radio_config(&self, value: &str) -> HwResult<()> {
        self.set("radio_config", value)
    }

    fn get_locked_operator(&self) -> HwResult<String> {
        self.get_string("locked_operator")
    }

    fn set_locked_operator(&self, value: &str) -> HwResult<()> {
        self.set("locked_operator", value)
    }

    fn get_airplane_mode(&self) -> HwResult<i32> {
        self.get_enum("airplane_mode")
    }

    fn set_airplane_mode(&self, value: i32) -> HwResult<()> {
        self.set("airplane_mode", value)
    }

    fn get_enable_data(&self) -> HwResult<i32> {
        self.get_enum("enable_data")
    }

    fn set_enable_data(&self, value: i32) -> HwResult<()> {
        self.set("enable_data", value)
    }

    fn get_apn(&self) -> HwResult<String> {
        self.get_string("apn")
    }

    fn set_apn(&self, value: &str) -> HwResult<()> {
        self.set("apn", value)
    }

    fn get_ping_interval(&self) -> HwResult<i32> {
        self.get_int("ping_interval")
    }

    fn set_ping_interval(&self, value: i32) -> HwResult<()> {
        self.set("ping_interval", value)
    }

    fn get_data_sent(&self) -> HwResult<i32> {
        self.get_int("data_sent")
    }

    fn set_data_sent(&self, value: i32) -> HwResult<()> {
        self.set("data_sent", value)
    }

    fn get_data_received(&self) -> HwResult<i32> {
        self.get_int("data_received")
    }

    fn set_data_received(&self, value: i32) -> HwResult<()> {
        self.set("data_received", value)
    }

    fn send_puk(&self, puk: &str, new_pin: &str) -> HwResult<()> {
        self.command(format!("send_puk({}, {})", puk, new_pin))?;
        self.set_attr("pin", new_pin);
        Ok(())
    }

    fn set_apn_auth(&self, username: &str, _password: &str) -> HwResult<()> {
        self.command(format!("set_apn_auth({}, ****)", username))
    }

    fn clear_data_counters(&self) -> HwResult<()> {
        self.command("clear_data_counters()".to_string())?;
        self.set_attr("data_sent", 0);
        self.set_attr("data_received", 0);
        Ok(())
    }

    fn at_command(&self, cmd: &str) -> HwResult<String> {
        self.command(format!("at_command({})", cmd))?;
        Ok("OK".to_string())
    }

    fn quick_cell_survey(&self) -> HwResult<Vec<CellRecord>> {
        let operator = self.get_cell_operator()?;
        let quality = self.get_link_quality()?;
        Ok(vec![CellRecord {
            operator,
            mcc: 228,
            mnc: 1,
            lac: 0x1a2b,
            cell_id: 0x3c4d,
            dbm: -113 + quality * 63 / 100,
        }])
    }

    fn available_operators(&self) -> HwResult<Vec<String>> {
        Ok(vec![self.get_cell_operator()?])
    }

    fn decode_plmn(&self, mccmnc: &str) -> HwResult<String> {
        self.check()?;
        Ok(match mccmnc {
            "22801" => "Swisscom".to_string(),
            other => other.to_string(),
        })
    }
}

impl DigitalIoHardware for SimFunction {
    fn get_port_state(&self) -> HwResult<i32> {
        self.get_int("port_state")
    }

    fn set_port_state(&self, value: i32) -> HwResult<()> {
        self.set("port_state", value)
    }

    fn get_port_direction(&self) -> HwResult<i32> {
        self.get_int("port_direction")
    }

    fn set_port_direction(&self, value: i32) -> HwResult<()> {
        self.set("port_direction", value)
    }

    fn get_port_open_drain(&self) -> HwResult<i32> {
        self.get_int("port_open_drain")
    }

    fn set_port_open_drain(&self, value: i32) -> HwResult<()> {
        self.set("port_open_drain", value)
    }

    fn get_port_polarity(&self) -> HwResult<i32> {
        self.get_int("port_polarity")
    }

    fn set_port_polarity(&self, value: i32) -> HwResult<()> {
        self.set("port_polarity", value)
    }

    fn get_port_diags(&self) -> HwResult<i32> {
        self.get_int("port_diags")
    }

    fn get_port_size(&self) -> HwResult<i32> {
        self.get_int("port_size")
    }

    fn get_output_voltage(&self) -> HwResult<i32> {
        self.get_enum("output_voltage")
    }

    fn set_output_voltage(&self, value: i32) -> HwResult<()> {
        self.set("output_voltage", value)
    }

    fn set_bit_state(&self, bitno: i32, state: i32) -> HwResult<()> {
        self.modify_bits("port_state", bitno, |v, mask| if state != 0 { v | mask } else { v & !mask })
    }

    fn get_bit_state(&self, bitno: i32) -> HwResult<i32> {
        self.bit("port_state", bitno)
    }

    fn toggle_bit_state(&self, bitno: i32) -> HwResult<()> {
        self.modify_bits("port_state", bitno, |v, mask| v ^ mask)
    }

    fn set_bit_direction(&self, bitno: i32, direction: i32) -> HwResult<()> {
        self.modify_bits("port_direction", bitno, |v, mask| if direction != 0 { v | mask } else { v & !mask })
    }

    fn get_bit_direction(&self, bitno: i32) -> HwResult<i32> {
        self.bit("port_direction", bitno)
    }

    fn set_bit_polarity(&self, bitno: i32, polarity: i32) -> HwResult<()> {
        self.modify_bits("port_polarity", bitno, |v, mask| if polarity != 0 { v | mask } else { v & !mask })
    }

    fn get_bit_polarity(&self, bitno: i32) -> HwResult<i32> {
        self.bit("port_polarity", bitno)
    }

    fn set_bit_open_drain(&self, bitno: i32, open_drain: i32) -> HwResult<()> {
        self.modify_bits("port_open_drain", bitno, |v, mask| if open_drain != 0 { v | mask } else { v & !mask })
    }

    fn get_bit_open_drain(&self, bitno: i32) -> HwResult<i32> {
        self.bit("port_open_drain", bitno)
    }

    fn get_bit_diags(&self, bitno: i32) -> HwResult<i32> {
        self.bit("port_diags", bitno)
    }

    fn pulse(&self, bitno: i32, ms_duration: i32) -> HwResult<()> {
        self.command(format!("pulse({}, {})", bitno, ms_duration))
    }

    fn delayed_pulse(&self, bitno: i32, ms_delay: i32, ms_duration: i32) -> HwResult<()> {
        self.command(format!("delayed_pulse({}, {}, {})", bitno, ms_delay, ms_duration))
    }
}

impl DisplayHardware for SimFunction {
    fn get_enabled(&self) -> HwResult<i32> {
        self.get_enum("enabled")
    }

    fn set_enabled(&self, value: i32) -> HwResult<()> {
        self.set("enabled", value)
    }

    fn get_startup_seq(&self) -> HwResult<String> {
        self.get_string("startup_seq")
    }

    fn set_startup_seq(&self, value: &str) -> HwResult<()> {
        self.set("startup_seq", value)
    }

    fn get_brightness(&self) -> HwResult<i32> {
        self.get_int("brightness")
    }

    fn set_brightness(&self, value: i32) -> HwResult<()> {
        self.set("brightness", value)
    }

    fn get_orientation(&self) -> HwResult<i32> {
        self.get_enum("orientation")
    }

    fn set_orientation(&self, value: i32) -> HwResult<()> {
        self.set("orientation", value)
    }

    fn get_display_width(&self) -> HwResult<i32> {
        self.get_int("display_width")
    }

    fn get_display_height(&self) -> HwResult<i32> {
        self.get_int("display_height")
    }

    fn get_display_type(&self) -> HwResult<i32> {
        self.get_enum("display_type")
    }

    fn get_layer_width(&self) -> HwResult<i32> {
        self.get_int("layer_width")
    }

    fn get_layer_height(&self) -> HwResult<i32> {
        self.get_int("layer_height")
    }

    fn get_layer_count(&self) -> HwResult<i32> {
        self.get_int("layer_count")
    }

    fn reset_all(&self) -> HwResult<()> {
        self.command("reset_all()".to_string())?;
        for layer in self.layers() {
            layer.reset()?;
        }
        Ok(())
    }

    fn fade(&self, brightness: i32, duration_ms: i32) -> HwResult<()> {
        self.command(format!("fade({}, {})", brightness, duration_ms))?;
        self.set_attr("brightness", brightness);
        Ok(())
    }

    fn new_sequence(&self) -> HwResult<()> {
        self.command("new_sequence()".to_string())
    }

    fn save_sequence(&self, name: &str) -> HwResult<()> {
        self.command(format!("save_sequence({})", name))
    }

    fn play_sequence(&self, name: &str) -> HwResult<()> {
        self.command(format!("play_sequence({})", name))
    }

    fn pause_sequence(&self, delay_ms: i32) -> HwResult<()> {
        self.command(format!("pause_sequence({})", delay_ms))
    }

    fn stop_sequence(&self) -> HwResult<()> {
        self.command("stop_sequence()".to_string())
    }

    fn upload(&self, pathname: &str, content: Bytes) -> HwResult<()> {
        self.command(format!("upload({}, {} bytes)", pathname, content.len()))
    }

    fn copy_layer_content(&self, src_layer: i32, dst_layer: i32) -> HwResult<()> {
        self.command(format!("copy_layer_content({}, {})", src_layer, dst_layer))
    }

    fn swap_layer_content(&self, layer_a: i32, layer_b: i32) -> HwResult<()> {
        self.command(format!("swap_layer_content({}, {})", layer_a, layer_b))
    }

    fn display_layer(&self, layer_id: i32) -> HwResult<Arc<dyn DisplayLayerHardware>> {
        let count = self.get_layer_count()?;
        if layer_id < 0 || layer_id >= count {
            return Err(HardwareError::InvalidArgument(format!(
                "Layer {} out of range (0..{})",
                layer_id, count
            )));
        }
        let width = self.get_int("layer_width")?;
        let height = self.get_int("layer_height")?;
        let display_width = self.get_int("display_width")?;
        let display_height = self.get_int("display_height")?;
        let mut state = self.state();
        let layer = state
            .layers
            .entry(layer_id)
            .or_insert_with(|| {
                Arc::new(SimLayer::new(layer_id, (display_width, display_height), (width, height)))
            })
            .clone();
        Ok(layer)
    }
}

impl InputCaptureHardware for SimFunction {
    fn get_last_capture_time(&self) -> HwResult<i64> {
        self.get_long("last_capture_time")
    }

    fn get_n_samples(&self) -> HwResult<i32> {
        self.get_int("n_samples")
    }

    fn set_n_samples(&self, value: i32) -> HwResult<()> {
        self.set("n_samples", value)
    }

    fn get_sampling_rate(&self) -> HwResult<i32> {
        self.get_int("sampling_rate")
    }

    fn get_capture_type(&self) -> HwResult<i32> {
        self.get_enum("capture_type")
    }

    fn set_capture_type(&self, value: i32) -> HwResult<()> {
        self.set("capture_type", value)
    }

    fn get_cond_value(&self) -> HwResult<f64> {
        self.get_double("cond_value")
    }

    fn set_cond_value(&self, value: f64) -> HwResult<()> {
        self.set("cond_value", value)
    }

    fn get_cond_align(&self) -> HwResult<i32> {
        self.get_int("cond_align")
    }

    fn set_cond_align(&self, value: i32) -> HwResult<()> {
        self.set("cond_align", value)
    }

    fn get_capture_type_at_startup(&self) -> HwResult<i32> {
        self.get_enum("capture_type_at_startup")
    }

    fn set_capture_type_at_startup(&self, value: i32) -> HwResult<()> {
        self.set("capture_type_at_startup", value)
    }

    fn get_cond_value_at_startup(&self) -> HwResult<f64> {
        self.get_double("cond_value_at_startup")
    }

    fn set_cond_value_at_startup(&self, value: f64) -> HwResult<()> {
        self.set("cond_value_at_startup", value)
    }

    fn get_last_capture(&self) -> HwResult<CaptureData> {
        self.check()?;
        Ok(self.state().last_capture.clone())
    }

    fn get_immediate_capture(&self, ms_before: i32, ms_after: i32) -> HwResult<CaptureData> {
        self.command(format!("get_immediate_capture({}, {})", ms_before, ms_after))?;
        let rate = self.get_sampling_rate()?;
        let samples = usize::try_from((ms_before + ms_after).max(0) * rate / 1000).unwrap_or(0);
        Ok(CaptureData {
            capture_type: 1,
            sampling_rate: rate,
            trigger_value: 0.0,
            trigger_position: ms_before * rate / 1000,
            trigger_time: 0.0,
            serie_names: vec!["Voltage".to_string()],
            serie_units: vec!["V".to_string()],
            series: vec![vec![0.0; samples]],
        })
    }
}

impl MotorHardware for SimFunction {
    fn get_motor_status(&self) -> HwResult<i32> {
        self.get_enum("motor_status")
    }

    fn set_motor_status(&self, value: i32) -> HwResult<()> {
        self.set("motor_status", value)
    }

    fn get_driving_force(&self) -> HwResult<f64> {
        self.get_double("driving_force")
    }

    fn set_driving_force(&self, value: f64) -> HwResult<()> {
        if !(-100.0..=100.0).contains(&value) {
            return Err(HardwareError::InvalidArgument(format!("Driving force out of range: {}", value)));
        }
        self.set("driving_force", value)
    }

    fn get_braking_force(&self) -> HwResult<f64> {
        self.get_double("braking_force")
    }

    fn set_braking_force(&self, value: f64) -> HwResult<()> {
        self.set("braking_force", value)
    }

    fn get_cut_off_voltage(&self) -> HwResult<f64> {
        self.get_double("cut_off_voltage")
    }

    fn set_cut_off_voltage(&self, value: f64) -> HwResult<()> {
        self.set("cut_off_voltage", value)
    }

    fn get_overcurrent_limit(&self) -> HwResult<i32> {
        self.get_int("overcurrent_limit")
    }

    fn set_overcurrent_limit(&self, value: i32) -> HwResult<()> {
        self.set("overcurrent_limit", value)
    }

    fn get_frequency(&self) -> HwResult<f64> {
        self.get_double("frequency")
    }

    fn set_frequency(&self, value: f64) -> HwResult<()> {
        self.set("frequency", value)
    }

    fn get_starter_time(&self) -> HwResult<i32> {
        self.get_int("starter_time")
    }

    fn set_starter_time(&self, value: i32) -> HwResult<()> {
        self.set("starter_time", value)
    }

    fn get_fail_safe_timeout(&self) -> HwResult<i32> {
        self.get_int("fail_safe_timeout")
    }

    fn set_fail_safe_timeout(&self, value: i32) -> HwResult<()> {
        self.set("fail_safe_timeout", value)
    }

    fn keep_alive(&self) -> HwResult<()> {
        self.command("keep_alive()".to_string())
    }

    fn reset_status(&self) -> HwResult<()> {
        self.command("reset_status()".to_string())?;
        self.store_attr("motor_status", 0);
        Ok(())
    }

    fn driving_force_move(&self, target: f64, ms_duration: i32) -> HwResult<()> {
        self.command(format!("driving_force_move({}, {})", target, ms_duration))?;
        self.set_attr("driving_force", target);
        Ok(())
    }

    fn braking_force_move(&self, target: f64, ms_duration: i32) -> HwResult<()> {
        self.command(format!("braking_force_move({}, {})", target, ms_duration))?;
        self.set_attr("braking_force", target);
        Ok(())
    }
}

impl PowerOutputHardware for SimFunction {
    fn get_voltage(&self) -> HwResult<i32> {
        self.get_enum("voltage")
    }

    fn set_voltage(&self, value: i32) -> HwResult<()> {
        self.set("voltage", value)
    }
}

impl RfidReaderHardware for SimFunction {
    fn get_n_tags(&self) -> HwResult<i32> {
        self.get_int("n_tags")
    }

    fn get_refresh_rate(&self) -> HwResult<i32> {
        self.get_int("refresh_rate")
    }

    fn set_refresh_rate(&self, value: i32) -> HwResult<()> {
        self.set("refresh_rate", value)
    }

    fn tag_id_list(&self) -> HwResult<Vec<String>> {
        self.check()?;
        Ok(self.state().tags.keys().cloned().collect())
    }

    fn tag_info(&self, tag_id: &str) -> HwResult<RfidTagInfo> {
        self.with_tag(tag_id, |tag| {
            let blocks = tag.locked.len() as i32;
            Ok(RfidTagInfo {
                tag_id: tag_id.to_string(),
                tag_type: 2,
                tag_type_name: "NTAG216".to_string(),
                memory_size: tag.memory.len() as i32,
                usable_size: tag.memory.len() as i32,
                block_size: TAG_BLOCK_SIZE as i32,
                first_block: 0,
                last_block: blocks - 1,
            })
        })
    }

    fn tag_lock_blocks(&self, tag_id: &str, first_block: i32, n_blocks: i32, options: &RfidOptions) -> HwResult<()> {
        self.with_tag(tag_id, |tag| {
            let first = usize::try_from(first_block)
                .map_err(|_| HardwareError::InvalidArgument(format!("Invalid block: {}", first_block)))?;
            let count = usize::try_from(n_blocks)
                .map_err(|_| HardwareError::InvalidArgument(format!("Invalid count: {}", n_blocks)))?;
            if first + count > tag.locked.len() {
                return Err(HardwareError::InvalidArgument("Lock beyond tag memory".to_string()));
            }
            if !options.enable_dry_run {
                tag.locked[first..first + count].iter_mut().for_each(|l| *l = true);
            }
            Ok(())
        })
    }

    fn tag_get_locks(&self, tag_id: &str, first_block: i32, n_blocks: i32, _options: &RfidOptions) -> HwResult<Vec<bool>> {
        self.with_tag(tag_id, |tag| {
            let first = usize::try_from(first_block).unwrap_or(0);
            let count = usize::try_from(n_blocks).unwrap_or(0);
            Ok(tag.locked.iter().skip(first).take(count).copied().collect())
        })
    }

    fn tag_read_bin(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> HwResult<Bytes> {
        Ok(Bytes::from(self.read_tag(tag_id, first_block, n_bytes, options)?))
    }

    fn tag_write_bin(&self, tag_id: &str, first_block: i32, data: &[u8], options: &RfidOptions) -> HwResult<()> {
        self.write_tag(tag_id, first_block, data, options)
    }

    fn tag_read_hex(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> HwResult<String> {
        Ok(to_hex(&self.read_tag(tag_id, first_block, n_bytes, options)?))
    }

    fn tag_write_hex(&self, tag_id: &str, first_block: i32, hex: &str, options: &RfidOptions) -> HwResult<()> {
        let data = from_hex(hex)?;
        self.write_tag(tag_id, first_block, &data, options)
    }

    fn tag_read_str(&self, tag_id: &str, first_block: i32, n_chars: i32, options: &RfidOptions) -> HwResult<String> {
        let data = self.read_tag(tag_id, first_block, n_chars, options)?;
        let text = String::from_utf8_lossy(&data);
        Ok(text.trim_end_matches('\0').to_string())
    }

    fn tag_write_str(&self, tag_id: &str, first_block: i32, text: &str, options: &RfidOptions) -> HwResult<()> {
        self.write_tag(tag_id, first_block, text.as_bytes(), options)
    }

    fn tag_get_afi(&self, tag_id: &str, _options: &RfidOptions) -> HwResult<i32> {
        self.with_tag(tag_id, |tag| Ok(tag.afi))
    }

    fn tag_set_afi(&self, tag_id: &str, afi: i32, options: &RfidOptions) -> HwResult<()> {
        self.with_tag(tag_id, |tag| {
            if !options.enable_dry_run {
                tag.afi = afi;
            }
            Ok(())
        })
    }
}

impl StepperMotorHardware for SimFunction {
    fn get_motor_state(&self) -> HwResult<i32> {
        self.get_enum("motor_state")
    }

    fn get_diags(&self) -> HwResult<i32> {
        self.get_int("diags")
    }

    fn get_step_pos(&self) -> HwResult<f64> {
        self.get_double("step_pos")
    }

    fn set_step_pos(&self, value: f64) -> HwResult<()> {
        self.set("step_pos", value)
    }

    fn get_speed(&self) -> HwResult<f64> {
        self.get_double("speed")
    }

    fn get_pullin_speed(&self) -> HwResult<f64> {
        self.get_double("pullin_speed")
    }

    fn set_pullin_speed(&self, value: f64) -> HwResult<()> {
        self.set("pullin_speed", value)
    }

    fn get_max_accel(&self) -> HwResult<f64> {
        self.get_double("max_accel")
    }

    fn set_max_accel(&self, value: f64) -> HwResult<()> {
        self.set("max_accel", value)
    }

    fn get_max_speed(&self) -> HwResult<f64> {
        self.get_double("max_speed")
    }

    fn set_max_speed(&self, value: f64) -> HwResult<()> {
        self.set("max_speed", value)
    }

    fn get_stepping(&self) -> HwResult<i32> {
        self.get_enum("stepping")
    }

    fn set_stepping(&self, value: i32) -> HwResult<()> {
        self.set("stepping", value)
    }

    fn get_overcurrent(&self) -> HwResult<i32> {
        self.get_int("overcurrent")
    }

    fn set_overcurrent(&self, value: i32) -> HwResult<()> {
        self.set("overcurrent", value)
    }

    fn get_t_curr_stop(&self) -> HwResult<i32> {
        self.get_int("t_curr_stop")
    }

    fn set_t_curr_stop(&self, value: i32) -> HwResult<()> {
        self.set("t_curr_stop", value)
    }

    fn get_t_curr_run(&self) -> HwResult<i32> {
        self.get_int("t_curr_run")
    }

    fn set_t_curr_run(&self, value: i32) -> HwResult<()> {
        self.set("t_curr_run", value)
    }

    fn get_alert_mode(&self) -> HwResult<String> {
        self.get_string("alert_mode")
    }

    fn set_alert_mode(&self, value: &str) -> HwResult<()> {
        self.set("alert_mode", value)
    }

    fn get_aux_mode(&self) -> HwResult<String> {
        self.get_string("aux_mode")
    }

    fn set_aux_mode(&self, value: &str) -> HwResult<()> {
        self.set("aux_mode", value)
    }

    fn get_aux_signal(&self) -> HwResult<i32> {
        self.get_int("aux_signal")
    }

    fn set_aux_signal(&self, value: i32) -> HwResult<()> {
        self.set("aux_signal", value)
    }

    fn reset(&self) -> HwResult<()> {
        self.command("reset()".to_string())?;
        self.store_attr("motor_state", 3);
        Ok(())
    }

    fn find_home_position(&self, speed: f64) -> HwResult<()> {
        self.command(format!("find_home_position({})", speed))?;
        self.store_attr("motor_state", 4);
        Ok(())
    }

    fn change_speed(&self, speed: f64) -> HwResult<()> {
        self.command(format!("change_speed({})", speed))?;
        self.set_attr("speed", speed);
        Ok(())
    }

    fn move_to(&self, abs_pos: f64) -> HwResult<()> {
        self.command(format!("move_to({})", abs_pos))?;
        self.set_attr("step_pos", abs_pos);
        Ok(())
    }

    fn move_rel(&self, rel_pos: f64) -> HwResult<()> {
        self.command(format!("move_rel({})", rel_pos))?;
        let pos: f64 = self.get("step_pos", 0.0)?;
        self.set_attr("step_pos", pos + rel_pos);
        Ok(())
    }

    fn move_rel_slow(&self, rel_pos: f64, max_speed: f64) -> HwResult<()> {
        self.command(format!("move_rel_slow({}, {})", rel_pos, max_speed))?;
        let pos: f64 = self.get("step_pos", 0.0)?;
        self.set_attr("step_pos", pos + rel_pos);
        Ok(())
    }

    fn pause(&self, wait_ms: i32) -> HwResult<()> {
        self.command(format!("pause({})", wait_ms))
    }

    fn emergency_stop(&self) -> HwResult<()> {
        self.command("emergency_stop()".to_string())?;
        self.store_attr("motor_state", 1);
        Ok(())
    }

    fn alert_step_out(&self) -> HwResult<()> {
        self.command("alert_step_out()".to_string())
    }

    fn alert_step_dir(&self, dir: i32) -> HwResult<()> {
        self.command(format!("alert_step_dir({})", dir))
    }

    fn abort_and_brake(&self) -> HwResult<()> {
        self.command("abort_and_brake()".to_string())?;
        self.store_attr("motor_state", 3);
        Ok(())
    }

    fn abort_and_hi_z(&self) -> HwResult<()> {
        self.command("abort_and_hi_z()".to_string())?;
        self.store_attr("motor_state", 2);
        Ok(())
    }
}

impl WatchdogHardware for SimFunction {
    fn get_state(&self) -> HwResult<i32> {
        self.get_enum("state")
    }

    fn set_state(&self, value: i32) -> HwResult<()> {
        self.set("state", value)
    }

    fn get_state_at_power_on(&self) -> HwResult<i32> {
        self.get_enum("state_at_power_on")
    }

    fn set_state_at_power_on(&self, value: i32) -> HwResult<()> {
        self.set("state_at_power_on", value)
    }

    fn get_max_time_on_state_a(&self) -> HwResult<i64> {
        self.get_long("max_time_on_state_a")
    }

    fn set_max_time_on_state_a(&self, value: i64) -> HwResult<()> {
        self.set("max_time_on_state_a", value)
    }

    fn get_max_time_on_state_b(&self) -> HwResult<i64> {
        self.get_long("max_time_on_state_b")
    }

    fn set_max_time_on_state_b(&self, value: i64) -> HwResult<()> {
        self.set("max_time_on_state_b", value)
    }

    fn get_output(&self) -> HwResult<i32> {
        self.get_enum("output")
    }

    fn set_output(&self, value: i32) -> HwResult<()> {
        self.set("output", value)
    }

    fn get_pulse_timer(&self) -> HwResult<i64> {
        self.get_long("pulse_timer")
    }

    fn get_delayed_pulse_timer(&self) -> HwResult<i64> {
        self.get_long("delayed_pulse_timer")
    }

    fn get_countdown(&self) -> HwResult<i64> {
        self.get_long("countdown")
    }

    fn get_auto_start(&self) -> HwResult<i32> {
        self.get_enum("auto_start")
    }

    fn set_auto_start(&self, value: i32) -> HwResult<()> {
        self.set("auto_start", value)
    }

    fn get_running(&self) -> HwResult<i32> {
        self.get_enum("running")
    }

    fn set_running(&self, value: i32) -> HwResult<()> {
        self.set("running", value)
    }

    fn get_trigger_delay(&self) -> HwResult<i64> {
        self.get_long("trigger_delay")
    }

    fn set_trigger_delay(&self, value: i64) -> HwResult<()> {
        self.set("trigger_delay", value)
    }

    fn get_trigger_duration(&self) -> HwResult<i64> {
        self.get_long("trigger_duration")
    }

    fn set_trigger_duration(&self, value: i64) -> HwResult<()> {
        self.set("trigger_duration", value)
    }

    fn get_last_trigger(&self) -> HwResult<i32> {
        self.get_int("last_trigger")
    }

    fn pulse(&self, ms_duration: i32) -> HwResult<()> {
        self.command(format!("pulse({})", ms_duration))?;
        self.set_attr("pulse_timer", ms_duration);
        Ok(())
    }

    fn delayed_pulse(&self, ms_delay: i32, ms_duration: i32) -> HwResult<()> {
        self.command(format!("delayed_pulse({}, {})", ms_delay, ms_duration))?;
        self.set_attr("delayed_pulse_timer", ms_delay);
        Ok(())
    }

    fn reset_watchdog(&self) -> HwResult<()> {
        self.command("reset_watchdog()".to_string())?;
        let delay: i64 = self.get("trigger_delay", 0)?;
        self.set_attr("countdown", delay);
        Ok(())
    }

    fn toggle(&self) -> HwResult<()> {
        self.command("toggle()".to_string())?;
        let state = self.get_enum("state")?;
        self.store_attr("state", if state == 1 { 0 } else { 1 });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online(class: FunctionClass, id: &str) -> SimFunction {
        let f = SimFunction::new(class, "SIM-00001", id, "", Vec::new());
        f.set_online(true);
        f
    }

    #[test]
    fn test_offline_calls_fail() {
        let f = SimFunction::new(FunctionClass::Motor, "SIM-00001", "motor", "", Vec::new());
        assert!(matches!(f.get_motor_status(), Err(HardwareError::DeviceNotFound(_))));
        f.set_online(true);
        assert_eq!(f.get_motor_status().unwrap(), 0);
    }

    #[test]
    fn test_missing_attribute_reports_sentinel() {
        let f = online(FunctionClass::Module, "module");
        assert_eq!(f.get_product_name().unwrap(), invalid::STRING);
        f.set_attr("product_name", "Yocto-Motor-DC");
        assert_eq!(f.get_product_name().unwrap(), "Yocto-Motor-DC");
    }

    #[test]
    fn test_advertised_formats() {
        let io = online(FunctionClass::DigitalIo, "digitalIO");
        io.set_port_state(0xA5).unwrap();
        assert_eq!(io.get_advertised_value().unwrap(), "A5");

        let motor = online(FunctionClass::Motor, "motor");
        motor.push_value("BRAKE");
        assert_eq!(motor.get_motor_status().unwrap(), 1);
        assert_eq!(motor.get_advertised_value().unwrap(), "BRAKE");
    }

    #[test]
    fn test_bit_operations() {
        let io = online(FunctionClass::DigitalIo, "digitalIO");
        io.set_bit_state(3, 1).unwrap();
        assert_eq!(io.get_port_state().unwrap(), 8);
        io.toggle_bit_state(0).unwrap();
        assert_eq!(io.get_bit_state(0).unwrap(), 1);
        assert!(io.set_bit_state(40, 1).is_err());
    }

    #[test]
    fn test_rfid_memory() {
        let reader = online(FunctionClass::RfidReader, "rfidReader");
        reader.insert_tag("04A1B2C3", 64);
        let options = RfidOptions::default();
        reader.tag_write_str("04A1B2C3", 1, "hello", &options).unwrap();
        assert_eq!(reader.tag_read_str("04A1B2C3", 1, 16, &options).unwrap(), "hello");
        assert_eq!(reader.tag_read_hex("04A1B2C3", 1, 2, &options).unwrap(), "6865");

        reader.tag_lock_blocks("04A1B2C3", 1, 1, &options).unwrap();
        assert!(reader.tag_write_hex("04A1B2C3", 1, "00", &options).is_err());
        assert!(reader.tag_read_bin("04A1B2C3", 3, 32, &options).is_err());
        assert_eq!(reader.get_n_tags().unwrap(), 1);
    }

    #[test]
    fn test_rfid_rejects_bad_access() {
        let reader = online(FunctionClass::RfidReader, "rfidReader");
        reader.insert_tag("04A1B2C3", 64);
        let unchecked = RfidOptions {
            disable_bounds_check: true,
            ..RfidOptions::default()
        };

        // 64 bytes is 4 blocks; block 10 starts well past the end
        assert!(matches!(
            reader.tag_read_bin("04A1B2C3", 10, 4, &unchecked),
            Err(HardwareError::InvalidArgument(_))
        ));
        assert!(reader.tag_write_bin("04A1B2C3", 10, &[1, 2], &unchecked).is_err());
        assert_eq!(reader.tag_read_bin("04A1B2C3", 3, 32, &unchecked).unwrap().len(), 16);

        let options = RfidOptions::default();
        assert!(matches!(
            reader.tag_write_hex("04A1B2C3", 0, "a\u{e9}0", &options),
            Err(HardwareError::InvalidArgument(_))
        ));
        assert!(reader.tag_write_hex("04A1B2C3", 0, "abc", &options).is_err());
        assert!(reader.tag_write_hex("04A1B2C3", 0, "ab", &options).is_ok());
    }

    #[test]
    fn test_failure_injection() {
        let f = online(FunctionClass::Sensor, "temperature");
        f.set_failure(Some(HardwareError::Timeout("no answer".into())));
        assert_eq!(f.get_current_value().unwrap_err().code(), -7);
        f.set_failure(None);
        assert_eq!(f.get_current_value().unwrap(), 21.5);
    }
}
