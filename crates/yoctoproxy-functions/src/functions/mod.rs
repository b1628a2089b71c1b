/*!
 * Proxies, one module per function class.
 */

pub mod cellular;
pub mod digital_io;
pub mod display;
pub mod display_layer;
pub mod input_capture;
pub mod module;
pub mod motor;
pub mod power_output;
pub mod rfid_reader;
pub mod sensor;
pub mod stepper_motor;
pub mod watchdog;

pub use cellular::CellularProxy;
pub use digital_io::DigitalIoProxy;
pub use display::DisplayProxy;
pub use display_layer::DisplayLayerProxy;
pub use input_capture::InputCaptureProxy;
pub use module::ModuleProxy;
pub use motor::MotorProxy;
pub use power_output::PowerOutputProxy;
pub use rfid_reader::RfidReaderProxy;
pub use sensor::SensorProxy;
pub use stepper_motor::StepperMotorProxy;
pub use watchdog::WatchdogProxy;
