/*!
 * Hardware seam.
 *
 * The traits in this module describe the device-function objects of the
 * wrapped hardware library. A binding to the real library implements them;
 * [`crate::sim`] implements them in memory. Values cross this boundary in
 * library encoding: enumerations as raw `i32` codes with `-1` meaning
 * invalid, and the sentinels of [`invalid`] when no value is available.
 */
use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinels returned by the library when it has no value to report
pub mod invalid {
    /// Invalid floating point measure
    pub const DOUBLE: f64 = -1.79769313486231e308;
    /// Invalid signed integer
    pub const INT: i32 = i32::MIN;
    /// Invalid long integer (timestamps, counters)
    pub const LONG: i64 = i64::MIN;
    /// Invalid string
    pub const STRING: &str = "!INVALID!";
    /// Invalid enumeration code
    pub const ENUM: i32 = -1;
}

/// Error reported by the hardware library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// The device is not reachable (unplugged, hub down, ...)
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The function does not support the operation
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// An argument was rejected by the library or the device
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Communication failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The device did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Any other library failure
    #[error("Library error: {0}")]
    Other(String),
}

impl HardwareError {
    /// Numeric error code, as reported by the library API
    pub fn code(&self) -> i32 {
        match self {
            HardwareError::InvalidArgument(_) => -2,
            HardwareError::NotSupported(_) => -3,
            HardwareError::DeviceNotFound(_) => -4,
            HardwareError::Other(_) => -6,
            HardwareError::Timeout(_) => -7,
            HardwareError::Io(_) => -8,
        }
    }
}

/// Result type for library calls
pub type HwResult<T> = std::result::Result<T, HardwareError>;

/// Callback fired by the library with the new advertised value of a function
pub type ValueCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback fired by the library when the configuration of the hosting
/// module changes (settings saved, reloaded or modified remotely)
pub type ConfigChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Function classes covered by proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionClass {
    /// Cellular modem
    Cellular,
    /// Digital I/O port
    DigitalIo,
    /// Display screen
    Display,
    /// Input capture of analog signals
    InputCapture,
    /// The module itself
    Module,
    /// DC motor controller
    Motor,
    /// Power output on a module connector
    PowerOutput,
    /// RFID tag reader
    RfidReader,
    /// Any sensor function (temperature, voltage, ...)
    Sensor,
    /// Stepper motor controller
    StepperMotor,
    /// Watchdog relay
    Watchdog,
}

impl FunctionClass {
    /// Every class, in declaration order
    pub const ALL: [FunctionClass; 11] = [
        FunctionClass::Cellular,
        FunctionClass::DigitalIo,
        FunctionClass::Display,
        FunctionClass::InputCapture,
        FunctionClass::Module,
        FunctionClass::Motor,
        FunctionClass::PowerOutput,
        FunctionClass::RfidReader,
        FunctionClass::Sensor,
        FunctionClass::StepperMotor,
        FunctionClass::Watchdog,
    ];

    /// Class name used by the library
    pub fn name(&self) -> &'static str {
        match self {
            FunctionClass::Cellular => "Cellular",
            FunctionClass::DigitalIo => "DigitalIO",
            FunctionClass::Display => "Display",
            FunctionClass::InputCapture => "InputCapture",
            FunctionClass::Module => "Module",
            FunctionClass::Motor => "Motor",
            FunctionClass::PowerOutput => "PowerOutput",
            FunctionClass::RfidReader => "RfidReader",
            FunctionClass::Sensor => "Sensor",
            FunctionClass::StepperMotor => "StepperMotor",
            FunctionClass::Watchdog => "Watchdog",
        }
    }

    /// Function id of the first function of this class on a module
    /// (`motor`, `digitalIO`, ...). Numbered classes get a `1` suffix.
    pub fn default_function_id(&self) -> &'static str {
        match self {
            FunctionClass::Cellular => "cellular",
            FunctionClass::DigitalIo => "digitalIO",
            FunctionClass::Display => "display",
            FunctionClass::InputCapture => "inputCapture",
            FunctionClass::Module => "module",
            FunctionClass::Motor => "motor",
            FunctionClass::PowerOutput => "powerOutput",
            FunctionClass::RfidReader => "rfidReader",
            FunctionClass::Sensor => "genericSensor1",
            FunctionClass::StepperMotor => "stepperMotor1",
            FunctionClass::Watchdog => "watchdog1",
        }
    }
}

impl std::fmt::Display for FunctionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Library notification produced by a device list update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlugEvent {
    /// A module became reachable
    Arrival(String),
    /// A module disappeared
    Removal(String),
}

/// Check a logical name against the library rules: up to 19 characters
/// among `A-Z`, `a-z`, `0-9`, `_` and `-`. The empty name is valid.
pub fn is_valid_logical_name(name: &str) -> bool {
    name.len() <= 19
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Names under which a function can be addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionIdentity {
    /// Function class
    pub class: FunctionClass,
    /// `SERIAL.functionId`
    pub hardware_id: String,
    /// Serial number of the hosting module
    pub serial_number: String,
    /// Function id (`motor`, `temperature`, ...)
    pub function_id: String,
    /// User-assigned logical name, possibly empty
    pub logical_name: String,
}

impl FunctionIdentity {
    /// Whether `name` designates this function
    ///
    /// Accepted forms are the hardware id, the function id, the logical
    /// name, `serial.functionId`, `serial.logicalName` and, for modules, the
    /// bare serial number.
    pub fn matches(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if name == self.hardware_id || name == self.function_id {
            return true;
        }
        if !self.logical_name.is_empty() && name == self.logical_name {
            return true;
        }
        if self.class == FunctionClass::Module && name == self.serial_number {
            return true;
        }
        match name.split_once('.') {
            Some((serial, rest)) => {
                serial == self.serial_number
                    && (rest == self.function_id
                        || (!self.logical_name.is_empty() && rest == self.logical_name))
            }
            None => false,
        }
    }
}

/// Base trait of every hardware function object
pub trait HardwareFunction: Send + Sync + Debug {
    /// Hardware id, `SERIAL.functionId`
    fn hardware_id(&self) -> String;

    /// Function id within the module
    fn function_id(&self) -> String;

    /// Serial number of the hosting module
    fn serial_number(&self) -> String;

    /// Whether the hosting module is currently reachable
    fn is_online(&self) -> bool;

    /// Read the logical name
    fn get_logical_name(&self) -> HwResult<String>;

    /// Logical name as last seen in the library's inventory, available
    /// while the module is offline
    fn known_logical_name(&self) -> String;

    /// Change the logical name
    fn set_logical_name(&self, name: &str) -> HwResult<()>;

    /// Read the advertised value (short textual summary of the state)
    fn get_advertised_value(&self) -> HwResult<String>;

    /// Read `moduleLogicalName.functionLogicalName`, falling back to ids
    fn get_friendly_name(&self) -> HwResult<String>;

    /// Register or clear the advertised value callback
    fn register_value_callback(&self, callback: Option<ValueCallback>);

    /// Register or clear the module configuration change callback
    fn register_config_change_callback(&self, callback: Option<ConfigChangeCallback>);
}

/// Module-level hardware (`SERIAL.module`)
pub trait ModuleHardware: HardwareFunction {
    /// Read the product name
    fn get_product_name(&self) -> HwResult<String>;
    /// Read the product id
    fn get_product_id(&self) -> HwResult<i32>;
    /// Read the product release
    fn get_product_release(&self) -> HwResult<i32>;
    /// Read the firmware release
    fn get_firmware_release(&self) -> HwResult<String>;
    /// Read the persistent settings
    fn get_persistent_settings(&self) -> HwResult<i32>;
    /// Read the luminosity
    fn get_luminosity(&self) -> HwResult<i32>;
    /// Write the luminosity
    fn set_luminosity(&self, value: i32) -> HwResult<()>;
    /// Read the localization beacon
    fn get_beacon(&self) -> HwResult<i32>;
    /// Write the localization beacon
    fn set_beacon(&self, value: i32) -> HwResult<()>;
    /// Read the time since power up, in ms
    fn get_up_time(&self) -> HwResult<i64>;
    /// Read the USB current
    fn get_usb_current(&self) -> HwResult<i32>;
    /// Read the reboot countdown
    fn get_reboot_countdown(&self) -> HwResult<i32>;
    /// Read the user variable
    fn get_user_var(&self) -> HwResult<i32>;
    /// Write the user variable
    fn set_user_var(&self, value: i32) -> HwResult<()>;
    /// Persist the current settings
    fn save_to_flash(&self) -> HwResult<()>;
    /// Reload the persisted settings
    fn revert_from_flash(&self) -> HwResult<()>;
    /// Reboot the module after `seconds_before`
    fn reboot(&self, seconds_before: i32) -> HwResult<()>;
    /// Reboot the module into firmware update mode
    fn trigger_firmware_update(&self, seconds_before: i32) -> HwResult<()>;
    /// Function ids hosted by the module, excluding the module itself
    fn function_ids(&self) -> HwResult<Vec<String>>;
}

/// Calibration points stored in a sensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoints {
    /// Raw values measured by the sensor
    pub raw_values: Vec<f64>,
    /// Reference values they correspond to
    pub ref_values: Vec<f64>,
}

/// Generic sensor function
pub trait SensorHardware: HardwareFunction {
    /// Read the unit
    fn get_unit(&self) -> HwResult<String>;
    /// Read the current value
    fn get_current_value(&self) -> HwResult<f64>;
    /// Read the lowest value seen
    fn get_lowest_value(&self) -> HwResult<f64>;
    /// Write the lowest value seen
    fn set_lowest_value(&self, value: f64) -> HwResult<()>;
    /// Read the highest value seen
    fn get_highest_value(&self) -> HwResult<f64>;
    /// Write the highest value seen
    fn set_highest_value(&self, value: f64) -> HwResult<()>;
    /// Read the current raw value
    fn get_current_raw_value(&self) -> HwResult<f64>;
    /// Read the log frequency
    fn get_log_frequency(&self) -> HwResult<String>;
    /// Write the log frequency
    fn set_log_frequency(&self, value: &str) -> HwResult<()>;
    /// Read the report frequency
    fn get_report_frequency(&self) -> HwResult<String>;
    /// Write the report frequency
    fn set_report_frequency(&self, value: &str) -> HwResult<()>;
    /// Read the advertised value mode
    fn get_adv_mode(&self) -> HwResult<i32>;
    /// Write the advertised value mode
    fn set_adv_mode(&self, value: i32) -> HwResult<()>;
    /// Read the resolution
    fn get_resolution(&self) -> HwResult<f64>;
    /// Write the resolution
    fn set_resolution(&self, value: f64) -> HwResult<()>;
    /// Read the sensor state
    fn get_sensor_state(&self) -> HwResult<i32>;
    /// Whether the sensor delivers valid measures
    fn is_sensor_ready(&self) -> HwResult<bool>;
    /// Start recording measures
    fn start_data_logger(&self) -> HwResult<()>;
    /// Stop recording measures
    fn stop_data_logger(&self) -> HwResult<()>;
    /// Replace the calibration with the given pairs
    fn calibrate_from_points(&self, raw_values: &[f64], ref_values: &[f64]) -> HwResult<()>;
    /// Read back the calibration in use
    fn load_calibration_points(&self) -> HwResult<CalibrationPoints>;
}

/// One cell seen by a cellular survey
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Operator name
    pub operator: String,
    /// Mobile country code
    pub mcc: i32,
    /// Mobile network code
    pub mnc: i32,
    /// Location area code
    pub lac: i32,
    /// Cell id
    pub cell_id: i32,
    /// Received signal strength, in dBm
    pub dbm: i32,
}

/// Cellular modem function
pub trait CellularHardware: HardwareFunction {
    /// Read the link quality
    fn get_link_quality(&self) -> HwResult<i32>;
    /// Read the cell operator
    fn get_cell_operator(&self) -> HwResult<String>;
    /// Read the cell identifier
    fn get_cell_identifier(&self) -> HwResult<String>;
    /// Read the cell type
    fn get_cell_type(&self) -> HwResult<i32>;
    /// Read the IMSI
    fn get_imsi(&self) -> HwResult<String>;
    /// Read the message
    fn get_message(&self) -> HwResult<String>;
    /// Read the SIM PIN
    fn get_pin(&self) -> HwResult<String>;
    /// Write the SIM PIN
    fn set_pin(&self, value: &str) -> HwResult<()>;
    /// Read the radio technology selection
    fn get_radio_config(&self) -> HwResult<String>;
    /// Write the radio technology selection
    fn set_radio_config(&self, value: &str) -> HwResult<()>;
    /// Read the locked operator
    fn get_locked_operator(&self) -> HwResult<String>;
    /// Write the locked operator
    fn set_locked_operator(&self, value: &str) -> HwResult<()>;
    /// Read the airplane mode
    fn get_airplane_mode(&self) -> HwResult<i32>;
    /// Write the airplane mode
    fn set_airplane_mode(&self, value: i32) -> HwResult<()>;
    /// Read the data service policy
    fn get_enable_data(&self) -> HwResult<i32>;
    /// Write the data service policy
    fn set_enable_data(&self, value: i32) -> HwResult<()>;
    /// Read the APN
    fn get_apn(&self) -> HwResult<String>;
    /// Write the APN
    fn set_apn(&self, value: &str) -> HwResult<()>;
    /// Read the ping interval
    fn get_ping_interval(&self) -> HwResult<i32>;
    /// Write the ping interval
    fn set_ping_interval(&self, value: i32) -> HwResult<()>;
    /// Read the count of bytes sent
    fn get_data_sent(&self) -> HwResult<i32>;
    /// Write the count of bytes sent
    fn set_data_sent(&self, value: i32) -> HwResult<()>;
    /// Read the count of bytes received
    fn get_data_received(&self) -> HwResult<i32>;
    /// Write the count of bytes received
    fn set_data_received(&self, value: i32) -> HwResult<()>;
    /// Unlock the SIM with its PUK and set a new PIN
    fn send_puk(&self, puk: &str, new_pin: &str) -> HwResult<()>;
    /// Set the credentials used to reach the access point
    fn set_apn_auth(&self, username: &str, password: &str) -> HwResult<()>;
    /// Reset the sent and received byte counters
    fn clear_data_counters(&self) -> HwResult<()>;
    /// Send a raw AT command and return the modem answer
    fn at_command(&self, cmd: &str) -> HwResult<String>;
    /// List the cells seen around, serving cell first
    fn quick_cell_survey(&self) -> HwResult<Vec<CellRecord>>;
    /// List the operators currently in range
    fn available_operators(&self) -> HwResult<Vec<String>>;
    /// Operator name for an MCC/MNC code
    fn decode_plmn(&self, mccmnc: &str) -> HwResult<String>;
}

/// Digital I/O port function
pub trait DigitalIoHardware: HardwareFunction {
    /// Read the port state
    fn get_port_state(&self) -> HwResult<i32>;
    /// Write the port state
    fn set_port_state(&self, value: i32) -> HwResult<()>;
    /// Read the port direction
    fn get_port_direction(&self) -> HwResult<i32>;
    /// Write the port direction
    fn set_port_direction(&self, value: i32) -> HwResult<()>;
    /// Read the open-drain channel mask
    fn get_port_open_drain(&self) -> HwResult<i32>;
    /// Write the open-drain channel mask
    fn set_port_open_drain(&self, value: i32) -> HwResult<()>;
    /// Read the port polarity
    fn get_port_polarity(&self) -> HwResult<i32>;
    /// Write the port polarity
    fn set_port_polarity(&self, value: i32) -> HwResult<()>;
    /// Read the port diagnostic flags
    fn get_port_diags(&self) -> HwResult<i32>;
    /// Read the port size
    fn get_port_size(&self) -> HwResult<i32>;
    /// Read the output voltage
    fn get_output_voltage(&self) -> HwResult<i32>;
    /// Write the output voltage
    fn set_output_voltage(&self, value: i32) -> HwResult<()>;
    /// Drive one output channel
    fn set_bit_state(&self, bitno: i32, state: i32) -> HwResult<()>;
    /// Read one channel
    fn get_bit_state(&self, bitno: i32) -> HwResult<i32>;
    /// Invert one output channel
    fn toggle_bit_state(&self, bitno: i32) -> HwResult<()>;
    /// Make one channel an input (0) or an output (1)
    fn set_bit_direction(&self, bitno: i32, direction: i32) -> HwResult<()>;
    /// Read the direction of one channel
    fn get_bit_direction(&self, bitno: i32) -> HwResult<i32>;
    /// Change the polarity of one channel
    fn set_bit_polarity(&self, bitno: i32, polarity: i32) -> HwResult<()>;
    /// Read the polarity of one channel
    fn get_bit_polarity(&self, bitno: i32) -> HwResult<i32>;
    /// Switch one channel between regular and open-drain output
    fn set_bit_open_drain(&self, bitno: i32, open_drain: i32) -> HwResult<()>;
    /// Read whether one channel is open-drain
    fn get_bit_open_drain(&self, bitno: i32) -> HwResult<i32>;
    /// Read the diagnostic flags of one channel
    fn get_bit_diags(&self, bitno: i32) -> HwResult<i32>;
    /// Switch the output on for `ms_duration`
    fn pulse(&self, bitno: i32, ms_duration: i32) -> HwResult<()>;
    /// Schedule a pulse after `ms_delay`
    fn delayed_pulse(&self, bitno: i32, ms_delay: i32, ms_duration: i32) -> HwResult<()>;
}

/// Display function
pub trait DisplayHardware: HardwareFunction {
    /// Read the display power state
    fn get_enabled(&self) -> HwResult<i32>;
    /// Write the display power state
    fn set_enabled(&self, value: i32) -> HwResult<()>;
    /// Read the startup sequence
    fn get_startup_seq(&self) -> HwResult<String>;
    /// Write the startup sequence
    fn set_startup_seq(&self, value: &str) -> HwResult<()>;
    /// Read the brightness
    fn get_brightness(&self) -> HwResult<i32>;
    /// Write the brightness
    fn set_brightness(&self, value: i32) -> HwResult<()>;
    /// Read the orientation
    fn get_orientation(&self) -> HwResult<i32>;
    /// Write the orientation
    fn set_orientation(&self, value: i32) -> HwResult<()>;
    /// Read the display width
    fn get_display_width(&self) -> HwResult<i32>;
    /// Read the display height
    fn get_display_height(&self) -> HwResult<i32>;
    /// Read the display type
    fn get_display_type(&self) -> HwResult<i32>;
    /// Read the layer width
    fn get_layer_width(&self) -> HwResult<i32>;
    /// Read the layer height
    fn get_layer_height(&self) -> HwResult<i32>;
    /// Read the number of layers
    fn get_layer_count(&self) -> HwResult<i32>;
    /// Clear every layer and restore defaults
    fn reset_all(&self) -> HwResult<()>;
    /// Move the brightness to `brightness` over `duration_ms`
    fn fade(&self, brightness: i32, duration_ms: i32) -> HwResult<()>;
    /// Start recording a sequence
    fn new_sequence(&self) -> HwResult<()>;
    /// Stop recording and save the sequence under `name`
    fn save_sequence(&self, name: &str) -> HwResult<()>;
    /// Replay a saved sequence
    fn play_sequence(&self, name: &str) -> HwResult<()>;
    /// Insert a pause into the recorded sequence
    fn pause_sequence(&self, delay_ms: i32) -> HwResult<()>;
    /// Stop the sequence being played
    fn stop_sequence(&self) -> HwResult<()>;
    /// Store a file on the device
    fn upload(&self, pathname: &str, content: Bytes) -> HwResult<()>;
    /// Copy one layer over another
    fn copy_layer_content(&self, src_layer: i32, dst_layer: i32) -> HwResult<()>;
    /// Exchange the content of two layers
    fn swap_layer_content(&self, layer_a: i32, layer_b: i32) -> HwResult<()>;
    /// Drawing surface `layer_id` of this display
    fn display_layer(&self, layer_id: i32) -> HwResult<Arc<dyn DisplayLayerHardware>>;
}

/// Drawing layer of a display. Layers are not functions: they are reached
/// through the display that owns them.
pub trait DisplayLayerHardware: Send + Sync + Debug {
    /// Index of the layer
    fn layer_id(&self) -> i32;
    /// Restore defaults
    fn reset(&self) -> HwResult<()>;
    /// Erase the content
    fn clear(&self) -> HwResult<()>;
    /// Draw in a 24-bit RGB color
    fn select_color_pen(&self, color: u32) -> HwResult<()>;
    /// Draw in a gray level (0-255)
    fn select_gray_pen(&self, gray_level: i32) -> HwResult<()>;
    /// Draw in transparent color
    fn select_eraser(&self) -> HwResult<()>;
    /// Turn antialiasing on or off
    fn set_antialiasing_mode(&self, enabled: bool) -> HwResult<()>;
    /// Draw one pixel
    fn draw_pixel(&self, x: i32, y: i32) -> HwResult<()>;
    /// Draw an empty rectangle
    fn draw_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> HwResult<()>;
    /// Draw a filled rectangle
    fn draw_bar(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> HwResult<()>;
    /// Draw an empty circle
    fn draw_circle(&self, x: i32, y: i32, radius: i32) -> HwResult<()>;
    /// Draw a filled disc
    fn draw_disc(&self, x: i32, y: i32, radius: i32) -> HwResult<()>;
    /// Select the font used by text commands
    fn select_font(&self, font_name: &str) -> HwResult<()>;
    /// Draw text anchored at a point
    fn draw_text(&self, x: i32, y: i32, anchor: i32, text: &str) -> HwResult<()>;
    /// Draw an image stored on the device
    fn draw_image(&self, x: i32, y: i32, image_name: &str) -> HwResult<()>;
    /// Draw a monochrome bitmap
    fn draw_bitmap(&self, x: i32, y: i32, width: i32, bitmap: &[u8], bg_color: i32) -> HwResult<()>;
    /// Move to an absolute position
    fn move_to(&self, x: i32, y: i32) -> HwResult<()>;
    /// Draw a line from the graphic cursor, which follows
    fn line_to(&self, x: i32, y: i32) -> HwResult<()>;
    /// Print text in the console area
    fn console_out(&self, text: &str) -> HwResult<()>;
    /// Set the console area
    fn set_console_margins(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> HwResult<()>;
    /// Write the console background color
    fn set_console_background(&self, bg_col: i32) -> HwResult<()>;
    /// Turn console word wrapping on or off
    fn set_console_word_wrap(&self, word_wrap: bool) -> HwResult<()>;
    /// Blank the console area
    fn clear_console(&self) -> HwResult<()>;
    /// Move the layer, scrolling over `scroll_time`
    fn set_layer_position(&self, x: i32, y: i32, scroll_time: i32) -> HwResult<()>;
    /// Hide the layer; drawing goes on off screen
    fn hide(&self) -> HwResult<()>;
    /// Show the layer again
    fn unhide(&self) -> HwResult<()>;
    /// Read the display width
    fn get_display_width(&self) -> HwResult<i32>;
    /// Read the display height
    fn get_display_height(&self) -> HwResult<i32>;
    /// Read the layer width
    fn get_layer_width(&self) -> HwResult<i32>;
    /// Read the layer height
    fn get_layer_height(&self) -> HwResult<i32>;
}

/// Samples recorded by an input capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureData {
    /// Trigger type, library encoding
    pub capture_type: i32,
    /// Sampling rate, in samples per second
    pub sampling_rate: i32,
    /// Value that fired the trigger
    pub trigger_value: f64,
    /// Index of the trigger sample
    pub trigger_position: i32,
    /// UTC time of the trigger, in seconds
    pub trigger_time: f64,
    /// Name of each captured serie
    pub serie_names: Vec<String>,
    /// Unit of each captured serie
    pub serie_units: Vec<String>,
    /// Samples, one vector per serie
    pub series: Vec<Vec<f64>>,
}

/// Input capture function
pub trait InputCaptureHardware: HardwareFunction {
    /// Read the last capture time
    fn get_last_capture_time(&self) -> HwResult<i64>;
    /// Read the number of samples
    fn get_n_samples(&self) -> HwResult<i32>;
    /// Write the number of samples
    fn set_n_samples(&self, value: i32) -> HwResult<()>;
    /// Read the sampling rate
    fn get_sampling_rate(&self) -> HwResult<i32>;
    /// Read the capture type
    fn get_capture_type(&self) -> HwResult<i32>;
    /// Write the capture type
    fn set_capture_type(&self, value: i32) -> HwResult<()>;
    /// Read the trigger threshold
    fn get_cond_value(&self) -> HwResult<f64>;
    /// Write the trigger threshold
    fn set_cond_value(&self, value: f64) -> HwResult<()>;
    /// Read the trigger position
    fn get_cond_align(&self) -> HwResult<i32>;
    /// Write the trigger position
    fn set_cond_align(&self, value: i32) -> HwResult<()>;
    /// Read the capture type used at power up
    fn get_capture_type_at_startup(&self) -> HwResult<i32>;
    /// Write the capture type used at power up
    fn set_capture_type_at_startup(&self, value: i32) -> HwResult<()>;
    /// Read the trigger threshold used at power up
    fn get_cond_value_at_startup(&self) -> HwResult<f64>;
    /// Write the trigger threshold used at power up
    fn set_cond_value_at_startup(&self, value: f64) -> HwResult<()>;
    /// Samples of the last triggered capture
    fn get_last_capture(&self) -> HwResult<CaptureData>;
    /// Capture around now
    fn get_immediate_capture(&self, ms_before: i32, ms_after: i32) -> HwResult<CaptureData>;
}

/// DC motor function
pub trait MotorHardware: HardwareFunction {
    /// Read the motor status
    fn get_motor_status(&self) -> HwResult<i32>;
    /// Write the motor status
    fn set_motor_status(&self, value: i32) -> HwResult<()>;
    /// Read the driving force
    fn get_driving_force(&self) -> HwResult<f64>;
    /// Write the driving force
    fn set_driving_force(&self, value: f64) -> HwResult<()>;
    /// Read the braking force
    fn get_braking_force(&self) -> HwResult<f64>;
    /// Write the braking force
    fn set_braking_force(&self, value: f64) -> HwResult<()>;
    /// Read the cut-off voltage
    fn get_cut_off_voltage(&self) -> HwResult<f64>;
    /// Write the cut-off voltage
    fn set_cut_off_voltage(&self, value: f64) -> HwResult<()>;
    /// Read the overcurrent limit
    fn get_overcurrent_limit(&self) -> HwResult<i32>;
    /// Write the overcurrent limit
    fn set_overcurrent_limit(&self, value: i32) -> HwResult<()>;
    /// Read the frequency
    fn get_frequency(&self) -> HwResult<f64>;
    /// Write the frequency
    fn set_frequency(&self, value: f64) -> HwResult<()>;
    /// Read the starter time
    fn get_starter_time(&self) -> HwResult<i32>;
    /// Write the starter time
    fn set_starter_time(&self, value: i32) -> HwResult<()>;
    /// Read the fail-safe timeout
    fn get_fail_safe_timeout(&self) -> HwResult<i32>;
    /// Write the fail-safe timeout
    fn set_fail_safe_timeout(&self, value: i32) -> HwResult<()>;
    /// Reset the fail-safe timer
    fn keep_alive(&self) -> HwResult<()>;
    /// Leave an error state
    fn reset_status(&self) -> HwResult<()>;
    /// Ramp the driving force to `target`
    fn driving_force_move(&self, target: f64, ms_duration: i32) -> HwResult<()>;
    /// Ramp the braking force to `target`
    fn braking_force_move(&self, target: f64, ms_duration: i32) -> HwResult<()>;
}

/// Power output function
pub trait PowerOutputHardware: HardwareFunction {
    /// Read the voltage
    fn get_voltage(&self) -> HwResult<i32>;
    /// Write the voltage
    fn set_voltage(&self, value: i32) -> HwResult<()>;
}

/// Description of an RFID tag in the field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfidTagInfo {
    /// Tag unique identifier
    pub tag_id: String,
    /// Tag type code
    pub tag_type: i32,
    /// Tag type name
    pub tag_type_name: String,
    /// Total memory, in bytes
    pub memory_size: i32,
    /// Memory available to applications, in bytes
    pub usable_size: i32,
    /// Block size, in bytes
    pub block_size: i32,
    /// First user block
    pub first_block: i32,
    /// Last user block
    pub last_block: i32,
}

/// Access options for RFID tag operations, passed through to the library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfidOptions {
    /// Key type used for authenticated tags
    pub key_type: i32,
    /// Key, hexadecimal
    pub hex_key: String,
    /// Force single-block access
    pub force_single_block_access: bool,
    /// Force multi-block access
    pub force_multiple_block_access: bool,
    /// Allow access to raw (non-user) blocks
    pub enable_raw_access: bool,
    /// Skip the tag memory bounds check
    pub disable_bounds_check: bool,
    /// Validate the operation without writing
    pub enable_dry_run: bool,
}

/// RFID reader function
pub trait RfidReaderHardware: HardwareFunction {
    /// Read the number of tags
    fn get_n_tags(&self) -> HwResult<i32>;
    /// Read the refresh rate
    fn get_refresh_rate(&self) -> HwResult<i32>;
    /// Write the refresh rate
    fn set_refresh_rate(&self, value: i32) -> HwResult<()>;
    /// Ids of the tags in the field
    fn tag_id_list(&self) -> HwResult<Vec<String>>;
    /// Describe a tag in the field
    fn tag_info(&self, tag_id: &str) -> HwResult<RfidTagInfo>;
    /// Lock a range of blocks for good
    fn tag_lock_blocks(&self, tag_id: &str, first_block: i32, n_blocks: i32, options: &RfidOptions) -> HwResult<()>;
    /// Lock state of each block in a range
    fn tag_get_locks(&self, tag_id: &str, first_block: i32, n_blocks: i32, options: &RfidOptions) -> HwResult<Vec<bool>>;
    /// Read raw bytes from tag memory
    fn tag_read_bin(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> HwResult<Bytes>;
    /// Write raw bytes to tag memory
    fn tag_write_bin(&self, tag_id: &str, first_block: i32, data: &[u8], options: &RfidOptions) -> HwResult<()>;
    /// Read tag memory as an hexadecimal string
    fn tag_read_hex(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> HwResult<String>;
    /// Write an hexadecimal string to tag memory
    fn tag_write_hex(&self, tag_id: &str, first_block: i32, hex: &str, options: &RfidOptions) -> HwResult<()>;
    /// Read tag memory as text
    fn tag_read_str(&self, tag_id: &str, first_block: i32, n_chars: i32, options: &RfidOptions) -> HwResult<String>;
    /// Write text to tag memory
    fn tag_write_str(&self, tag_id: &str, first_block: i32, text: &str, options: &RfidOptions) -> HwResult<()>;
    /// Read the application family identifier of a tag
    fn tag_get_afi(&self, tag_id: &str, options: &RfidOptions) -> HwResult<i32>;
    /// Change the application family identifier of a tag
    fn tag_set_afi(&self, tag_id: &str, afi: i32, options: &RfidOptions) -> HwResult<()>;
}

/// Stepper motor function
pub trait StepperMotorHardware: HardwareFunction {
    /// Read the motor state
    fn get_motor_state(&self) -> HwResult<i32>;
    /// Read the diagnostic flags
    fn get_diags(&self) -> HwResult<i32>;
    /// Read the step position
    fn get_step_pos(&self) -> HwResult<f64>;
    /// Write the step position
    fn set_step_pos(&self, value: f64) -> HwResult<()>;
    /// Read the speed
    fn get_speed(&self) -> HwResult<f64>;
    /// Read the pull-in speed
    fn get_pullin_speed(&self) -> HwResult<f64>;
    /// Write the pull-in speed
    fn set_pullin_speed(&self, value: f64) -> HwResult<()>;
    /// Read the maximum acceleration
    fn get_max_accel(&self) -> HwResult<f64>;
    /// Write the maximum acceleration
    fn set_max_accel(&self, value: f64) -> HwResult<()>;
    /// Read the maximum speed
    fn get_max_speed(&self) -> HwResult<f64>;
    /// Write the maximum speed
    fn set_max_speed(&self, value: f64) -> HwResult<()>;
    /// Read the stepping mode
    fn get_stepping(&self) -> HwResult<i32>;
    /// Write the stepping mode
    fn set_stepping(&self, value: i32) -> HwResult<()>;
    /// Read the overcurrent
    fn get_overcurrent(&self) -> HwResult<i32>;
    /// Write the overcurrent
    fn set_overcurrent(&self, value: i32) -> HwResult<()>;
    /// Read the standstill current
    fn get_t_curr_stop(&self) -> HwResult<i32>;
    /// Write the standstill current
    fn set_t_curr_stop(&self, value: i32) -> HwResult<()>;
    /// Read the running current
    fn get_t_curr_run(&self) -> HwResult<i32>;
    /// Write the running current
    fn set_t_curr_run(&self, value: i32) -> HwResult<()>;
    /// Read the alert configuration
    fn get_alert_mode(&self) -> HwResult<String>;
    /// Write the alert configuration
    fn set_alert_mode(&self, value: &str) -> HwResult<()>;
    /// Read the auxiliary output mode
    fn get_aux_mode(&self) -> HwResult<String>;
    /// Write the auxiliary output mode
    fn set_aux_mode(&self, value: &str) -> HwResult<()>;
    /// Read the auxiliary output signal
    fn get_aux_signal(&self) -> HwResult<i32>;
    /// Write the auxiliary output signal
    fn set_aux_signal(&self, value: i32) -> HwResult<()>;
    /// Restore defaults
    fn reset(&self) -> HwResult<()>;
    /// Move at `speed` until the home switch triggers
    fn find_home_position(&self, speed: f64) -> HwResult<()>;
    /// Run continuously at `speed`, in steps per second
    fn change_speed(&self, speed: f64) -> HwResult<()>;
    /// Move to an absolute position
    fn move_to(&self, abs_pos: f64) -> HwResult<()>;
    /// Move by `rel_pos` steps
    fn move_rel(&self, rel_pos: f64) -> HwResult<()>;
    /// Move by `rel_pos` steps, no faster than `max_speed`
    fn move_rel_slow(&self, rel_pos: f64, max_speed: f64) -> HwResult<()>;
    /// Wait before the next queued command
    fn pause(&self, wait_ms: i32) -> HwResult<()>;
    /// Stop at once, without deceleration
    fn emergency_stop(&self) -> HwResult<()>;
    /// Move one step in the direction opposite the last move
    fn alert_step_out(&self) -> HwResult<()>;
    /// Move one step in direction `dir`
    fn alert_step_dir(&self, dir: i32) -> HwResult<()>;
    /// Stop and hold the current position
    fn abort_and_brake(&self) -> HwResult<()>;
    /// Stop and release the motor
    fn abort_and_hi_z(&self) -> HwResult<()>;
}

/// Watchdog function
pub trait WatchdogHardware: HardwareFunction {
    /// Read the relay state
    fn get_state(&self) -> HwResult<i32>;
    /// Write the relay state
    fn set_state(&self, value: i32) -> HwResult<()>;
    /// Read the relay state at power up
    fn get_state_at_power_on(&self) -> HwResult<i32>;
    /// Write the relay state at power up
    fn set_state_at_power_on(&self, value: i32) -> HwResult<()>;
    /// Read the longest time in state A
    fn get_max_time_on_state_a(&self) -> HwResult<i64>;
    /// Write the longest time in state A
    fn set_max_time_on_state_a(&self, value: i64) -> HwResult<()>;
    /// Read the longest time in state B
    fn get_max_time_on_state_b(&self) -> HwResult<i64>;
    /// Write the longest time in state B
    fn set_max_time_on_state_b(&self, value: i64) -> HwResult<()>;
    /// Read the output switch
    fn get_output(&self) -> HwResult<i32>;
    /// Write the output switch
    fn set_output(&self, value: i32) -> HwResult<()>;
    /// Read the time left in the current pulse, in ms
    fn get_pulse_timer(&self) -> HwResult<i64>;
    /// Read the time left before a delayed pulse, in ms
    fn get_delayed_pulse_timer(&self) -> HwResult<i64>;
    /// Read the countdown
    fn get_countdown(&self) -> HwResult<i64>;
    /// Read the auto start setting
    fn get_auto_start(&self) -> HwResult<i32>;
    /// Write the auto start setting
    fn set_auto_start(&self, value: i32) -> HwResult<()>;
    /// Read the armed state
    fn get_running(&self) -> HwResult<i32>;
    /// Write the armed state
    fn set_running(&self, value: i32) -> HwResult<()>;
    /// Read the trigger delay
    fn get_trigger_delay(&self) -> HwResult<i64>;
    /// Write the trigger delay
    fn set_trigger_delay(&self, value: i64) -> HwResult<()>;
    /// Read the relay switch duration once triggered
    fn get_trigger_duration(&self) -> HwResult<i64>;
    /// Write the relay switch duration once triggered
    fn set_trigger_duration(&self, value: i64) -> HwResult<()>;
    /// Read the last trigger
    fn get_last_trigger(&self) -> HwResult<i32>;
    /// Switch the output on for `ms_duration`
    fn pulse(&self, ms_duration: i32) -> HwResult<()>;
    /// Schedule a pulse after `ms_delay`
    fn delayed_pulse(&self, ms_delay: i32, ms_duration: i32) -> HwResult<()>;
    /// Restart the countdown
    fn reset_watchdog(&self) -> HwResult<()>;
    /// Flip the relay
    fn toggle(&self) -> HwResult<()>;
}

/// Typed reference to a hardware function, as handed out by the library
#[derive(Debug, Clone)]
pub enum FunctionHandle {
    /// Cellular function
    Cellular(Arc<dyn CellularHardware>),
    /// DigitalIo function
    DigitalIo(Arc<dyn DigitalIoHardware>),
    /// Display function
    Display(Arc<dyn DisplayHardware>),
    /// InputCapture function
    InputCapture(Arc<dyn InputCaptureHardware>),
    /// Module function
    Module(Arc<dyn ModuleHardware>),
    /// Motor function
    Motor(Arc<dyn MotorHardware>),
    /// PowerOutput function
    PowerOutput(Arc<dyn PowerOutputHardware>),
    /// RfidReader function
    RfidReader(Arc<dyn RfidReaderHardware>),
    /// Sensor function
    Sensor(Arc<dyn SensorHardware>),
    /// StepperMotor function
    StepperMotor(Arc<dyn StepperMotorHardware>),
    /// Watchdog function
    Watchdog(Arc<dyn WatchdogHardware>),
}

// Every arm binds a different trait object; the body only uses
// `HardwareFunction` methods, which all of them expose.
macro_rules! with_function {
    ($handle:expr, $f:ident => $body:expr) => {
        match $handle {
            FunctionHandle::Cellular($f) => $body,
            FunctionHandle::DigitalIo($f) => $body,
            FunctionHandle::Display($f) => $body,
            FunctionHandle::InputCapture($f) => $body,
            FunctionHandle::Module($f) => $body,
            FunctionHandle::Motor($f) => $body,
            FunctionHandle::PowerOutput($f) => $body,
            FunctionHandle::RfidReader($f) => $body,
            FunctionHandle::Sensor($f) => $body,
            FunctionHandle::StepperMotor($f) => $body,
            FunctionHandle::Watchdog($f) => $body,
        }
    };
}

impl FunctionHandle {
    /// Class of the referenced function
    pub fn class(&self) -> FunctionClass {
        match self {
            FunctionHandle::Cellular(_) => FunctionClass::Cellular,
            FunctionHandle::DigitalIo(_) => FunctionClass::DigitalIo,
            FunctionHandle::Display(_) => FunctionClass::Display,
            FunctionHandle::InputCapture(_) => FunctionClass::InputCapture,
            FunctionHandle::Module(_) => FunctionClass::Module,
            FunctionHandle::Motor(_) => FunctionClass::Motor,
            FunctionHandle::PowerOutput(_) => FunctionClass::PowerOutput,
            FunctionHandle::RfidReader(_) => FunctionClass::RfidReader,
            FunctionHandle::Sensor(_) => FunctionClass::Sensor,
            FunctionHandle::StepperMotor(_) => FunctionClass::StepperMotor,
            FunctionHandle::Watchdog(_) => FunctionClass::Watchdog,
        }
    }

    /// Hardware id of the referenced function
    pub fn hardware_id(&self) -> String {
        with_function!(self, f => f.hardware_id())
    }

    /// Function id of the referenced function
    pub fn function_id(&self) -> String {
        with_function!(self, f => f.function_id())
    }

    /// Serial number of the hosting module
    pub fn serial_number(&self) -> String {
        with_function!(self, f => f.serial_number())
    }

    /// Whether the hosting module is reachable
    pub fn is_online(&self) -> bool {
        with_function!(self, f => f.is_online())
    }

    /// Read the logical name
    pub fn get_logical_name(&self) -> HwResult<String> {
        with_function!(self, f => f.get_logical_name())
    }

    /// Every name the function answers to, online or not
    pub fn identity(&self) -> FunctionIdentity {
        FunctionIdentity {
            class: self.class(),
            hardware_id: self.hardware_id(),
            serial_number: self.serial_number(),
            function_id: self.function_id(),
            logical_name: with_function!(self, f => f.known_logical_name()),
        }
    }
}

/// Whether `name` designates the function behind `handle`
pub fn name_matches(name: &str, handle: &FunctionHandle) -> bool {
    handle.identity().matches(name)
}

/// Entry point of the wrapped library
pub trait HardwareLibrary: Send + Sync + Debug {
    /// Make the devices behind `url` reachable
    fn register_hub(&self, url: &str) -> HwResult<()>;

    /// Forget a hub registered earlier
    fn unregister_hub(&self, url: &str);

    /// Rescan the registered hubs and report modules that appeared or left
    fn update_device_list(&self) -> HwResult<Vec<PlugEvent>>;

    /// Resolve a function of `class` by any of its names
    fn find_function(&self, class: FunctionClass, name: &str) -> Option<FunctionHandle>;

    /// Every known function of `class`, in enumeration order
    fn functions(&self, class: FunctionClass) -> Vec<FunctionHandle>;

    /// Every function hosted by the module `serial`, the module included
    fn module_functions(&self, serial: &str) -> Vec<FunctionHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(class: FunctionClass, function_id: &str, logical_name: &str) -> FunctionIdentity {
        FunctionIdentity {
            class,
            hardware_id: format!("MOTORCTL-1A2B3.{}", function_id),
            serial_number: "MOTORCTL-1A2B3".to_string(),
            function_id: function_id.to_string(),
            logical_name: logical_name.to_string(),
        }
    }

    #[test]
    fn test_logical_name_rules() {
        assert!(is_valid_logical_name(""));
        assert!(is_valid_logical_name("left_wheel-2"));
        assert!(!is_valid_logical_name("has space"));
        assert!(!is_valid_logical_name("dotted.name"));
        assert!(!is_valid_logical_name("abcdefghijklmnopqrst"));
    }

    #[test]
    fn test_identity_matches_every_form() {
        let id = identity(FunctionClass::Motor, "motor", "leftWheel");
        assert!(id.matches("MOTORCTL-1A2B3.motor"));
        assert!(id.matches("motor"));
        assert!(id.matches("leftWheel"));
        assert!(id.matches("MOTORCTL-1A2B3.leftWheel"));
        assert!(!id.matches("OTHER-00001.motor"));
        assert!(!id.matches("rightWheel"));
        assert!(!id.matches(""));
    }

    #[test]
    fn test_module_matches_bare_serial() {
        let module = identity(FunctionClass::Module, "module", "");
        assert!(module.matches("MOTORCTL-1A2B3"));

        let motor = identity(FunctionClass::Motor, "motor", "");
        assert!(!motor.matches("MOTORCTL-1A2B3"));
    }

    #[test]
    fn test_name_matches_while_offline() {
        use crate::sim::{SimModule, SimulatedLibrary};

        let library = SimulatedLibrary::new();
        library.plug(SimModule::new("MOTORCTL-00001").with_named_function(FunctionClass::Motor, "motor", "leftWheel"));
        let handle = library.find_function(FunctionClass::Motor, "motor").unwrap();
        library.unplug("MOTORCTL-00001");

        assert!(!handle.is_online());
        assert!(name_matches("leftWheel", &handle));
        assert!(name_matches("MOTORCTL-00001.leftWheel", &handle));
        assert!(!name_matches("rightWheel", &handle));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(HardwareError::DeviceNotFound("x".into()).code(), -4);
        assert_eq!(HardwareError::InvalidArgument("x".into()).code(), -2);
        assert_eq!(HardwareError::Io("x".into()).code(), -8);
    }

    #[test]
    fn test_class_names() {
        assert_eq!(FunctionClass::DigitalIo.name(), "DigitalIO");
        assert_eq!(FunctionClass::StepperMotor.to_string(), "StepperMotor");
        assert_eq!(FunctionClass::ALL.len(), 11);
    }
}
