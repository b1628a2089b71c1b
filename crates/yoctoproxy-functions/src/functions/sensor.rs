/*!
 * Generic sensor proxy.
 *
 * Covers every measuring function (temperature, voltage, humidity, ...).
 * The current value is kept up to date from the advertised value, which
 * sensors report as a plain decimal number.
 */
use std::sync::Arc;

use crate::hardware::{invalid, CalibrationPoints, FunctionClass, FunctionHandle, SensorHardware};
use crate::proxy::{proxy_enum, sentinel, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// Measure reported in timed notifications
    pub enum AdvMode {
        Immediate = 0 => "IMMEDIATE",
        PeriodAvg = 1 => "PERIOD_AVG",
        PeriodMin = 2 => "PERIOD_MIN",
        PeriodMax = 3 => "PERIOD_MAX",
    }
}

/// Cached sensor properties
#[derive(Debug, Clone)]
pub struct SensorCache {
    unit: String,
    current_value: f64,
    log_frequency: String,
    report_frequency: String,
    adv_mode: AdvMode,
    resolution: f64,
}

impl Default for SensorCache {
    fn default() -> Self {
        Self {
            unit: invalid::STRING.to_string(),
            current_value: f64::NAN,
            log_frequency: invalid::STRING.to_string(),
            report_frequency: invalid::STRING.to_string(),
            adv_mode: AdvMode::Invalid,
            resolution: f64::NAN,
        }
    }
}

/// Proxy of a sensor function
#[derive(Debug)]
pub struct SensorProxy {
    base: ProxyBase<dyn SensorHardware, SensorCache>,
}

impl FunctionProxy for SensorProxy {
    const CLASS: FunctionClass = FunctionClass::Sensor;
    type Hardware = dyn SensorHardware;
    type Cache = SensorCache;

    fn new(base: ProxyBase<dyn SensorHardware, SensorCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn SensorHardware, SensorCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn SensorHardware>> {
        match handle {
            FunctionHandle::Sensor(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("unit", |c| &mut c.unit, |hw| hw.get_unit());
        b.refresh("log_frequency", |c| &mut c.log_frequency, |hw| hw.get_log_frequency());
        b.refresh("report_frequency", |c| &mut c.report_frequency, |hw| hw.get_report_frequency());
        b.refresh("adv_mode", |c| &mut c.adv_mode, |hw| hw.get_adv_mode().map(AdvMode::from_library));
        b.refresh("resolution", |c| &mut c.resolution, |hw| hw.get_resolution().map(sentinel::double));
    }

    fn refresh_cache(&self) {
        self.base.refresh("current_value", |c| &mut c.current_value, |hw| {
            hw.get_current_value().map(sentinel::double)
        });
    }

    fn parse_advertised(&self, value: &str) {
        if let Ok(measure) = value.trim().parse::<f64>() {
            self.base.store("current_value", |c| &mut c.current_value, measure);
        }
    }
}

impl SensorProxy {
    /// Read the measuring unit
    pub fn get_unit(&self) -> Result<String> {
        self.base.read(|hw| hw.get_unit())
    }

    /// Cached measuring unit
    pub fn unit(&self) -> String {
        self.base.cached(|c| &c.unit)
    }

    /// Read the current measure, NaN when the sensor has none
    pub fn get_current_value(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_current_value().map(sentinel::double))
    }

    /// Cached current measure
    pub fn current_value(&self) -> f64 {
        self.base.cached(|c| &c.current_value)
    }

    /// Read the lowest value seen
    pub fn get_lowest_value(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_lowest_value().map(sentinel::double))
    }

    /// Change the lowest value seen
    pub fn set_lowest_value(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_lowest_value(v))
    }

    /// Read the highest value seen
    pub fn get_highest_value(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_highest_value().map(sentinel::double))
    }

    /// Change the highest value seen
    pub fn set_highest_value(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_highest_value(v))
    }

    /// Read the measure before calibration
    pub fn get_current_raw_value(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_current_raw_value().map(sentinel::double))
    }

    /// Read the data logger frequency (`"1/s"`, `"OFF"`, ...)
    pub fn get_log_frequency(&self) -> Result<String> {
        self.base.read(|hw| hw.get_log_frequency())
    }

    /// Change the data logger frequency
    pub fn set_log_frequency(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_log_frequency(&v))
    }

    /// Cached data logger frequency
    pub fn log_frequency(&self) -> String {
        self.base.cached(|c| &c.log_frequency)
    }

    /// Like `set_log_frequency`, skipped when the value matches the cache
    pub fn apply_log_frequency(&self, value: &str) -> Result<()> {
        self.base.apply("log_frequency", |c| &mut c.log_frequency, value.to_string(), |hw, v| {
            hw.set_log_frequency(&v)
        })
    }

    /// Read the timed notification frequency
    pub fn get_report_frequency(&self) -> Result<String> {
        self.base.read(|hw| hw.get_report_frequency())
    }

    /// Change the timed notification frequency
    pub fn set_report_frequency(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_report_frequency(&v))
    }

    /// Cached timed notification frequency
    pub fn report_frequency(&self) -> String {
        self.base.cached(|c| &c.report_frequency)
    }

    /// Like `set_report_frequency`, skipped when the value matches the cache
    pub fn apply_report_frequency(&self, value: &str) -> Result<()> {
        self.base.apply("report_frequency", |c| &mut c.report_frequency, value.to_string(), |hw, v| {
            hw.set_report_frequency(&v)
        })
    }

    /// Read the advertised value mode
    pub fn get_adv_mode(&self) -> Result<AdvMode> {
        self.base.read(|hw| hw.get_adv_mode().map(AdvMode::from_library))
    }

    /// Change the advertised value mode
    pub fn set_adv_mode(&self, value: AdvMode) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_adv_mode(v.to_library()))
    }

    /// Cached advertised value mode
    pub fn adv_mode(&self) -> AdvMode {
        self.base.cached(|c| &c.adv_mode)
    }

    /// Like `set_adv_mode`, skipped when the value matches the cache
    pub fn apply_adv_mode(&self, value: AdvMode) -> Result<()> {
        self.base.apply("adv_mode", |c| &mut c.adv_mode, value, |hw, v| hw.set_adv_mode(v.to_library()))
    }

    /// Read the resolution
    pub fn get_resolution(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_resolution().map(sentinel::double))
    }

    /// Change the resolution
    pub fn set_resolution(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_resolution(v))
    }

    /// Cached resolution
    pub fn resolution(&self) -> f64 {
        self.base.cached(|c| &c.resolution)
    }

    /// Like `set_resolution`, skipped when the value matches the cache
    pub fn apply_resolution(&self, value: f64) -> Result<()> {
        self.base.apply("resolution", |c| &mut c.resolution, value, |hw, v| hw.set_resolution(v))
    }

    /// Read the sensor state, `0` when a measure is available
    pub fn get_sensor_state(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_sensor_state())
    }

    /// Whether the sensor currently delivers valid measures
    pub fn is_sensor_ready(&self) -> Result<bool> {
        self.base.read(|hw| hw.is_sensor_ready())
    }

    /// Start recording measures
    pub fn start_data_logger(&self) -> Result<()> {
        self.base.read(|hw| hw.start_data_logger())
    }

    /// Stop recording measures
    pub fn stop_data_logger(&self) -> Result<()> {
        self.base.read(|hw| hw.stop_data_logger())
    }

    /// Store a linear interpolation calibration in the sensor
    pub fn calibrate_from_points(&self, raw_values: &[f64], ref_values: &[f64]) -> Result<()> {
        self.base.read(|hw| hw.calibrate_from_points(raw_values, ref_values))
    }

    /// Read back the calibration in use
    pub fn load_calibration_points(&self) -> Result<CalibrationPoints> {
        self.base.read(|hw| hw.load_calibration_points())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::proxy::ProxyEvent;
    use crate::sim::{SimModule, SimulatedLibrary};
    use yoctoproxy_core::types::Value;

    fn setup() -> (Arc<SimulatedLibrary>, ProxyManager) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(
            SimModule::new("YSENSOR-00001")
                .with_named_function(FunctionClass::Sensor, "temperature", "outside"),
        );
        let manager = ProxyManager::new(library.clone());
        (library, manager)
    }

    #[test_log::test]
    fn test_measure_from_advertised_value() {
        let (library, manager) = setup();
        let proxy = SensorProxy::find(&manager, "outside");
        assert_eq!(proxy.current_value(), 21.5);
        assert_eq!(proxy.unit(), "'C");

        let hw = library.function("YSENSOR-00001.temperature").unwrap();
        hw.push_value("18.75");
        assert_eq!(proxy.current_value(), 18.75);

        hw.push_value("n/a");
        assert_eq!(proxy.current_value(), 18.75);
    }

    #[test]
    fn test_unbound_sensor_reads_nan() {
        let library = Arc::new(SimulatedLibrary::new());
        let manager = ProxyManager::new(library);
        let proxy = SensorProxy::find(&manager, "nowhere");
        assert!(proxy.current_value().is_nan());
        assert_eq!(proxy.unit(), invalid::STRING);
        assert_eq!(proxy.adv_mode(), AdvMode::Invalid);
        assert!(proxy.get_current_value().is_err());
    }

    #[test]
    fn test_invalid_double_maps_to_nan() {
        let (library, manager) = setup();
        let hw = library.function("YSENSOR-00001.temperature").unwrap();
        hw.set_attr("current_value", invalid::DOUBLE);
        let proxy = SensorProxy::find(&manager, "temperature");
        assert!(proxy.get_current_value().unwrap().is_nan());
        assert!(proxy.current_value().is_nan());
    }

    #[test]
    fn test_calibration_round_trip() {
        let (_library, manager) = setup();
        let proxy = SensorProxy::find(&manager, "outside");
        proxy.calibrate_from_points(&[0.0, 100.0], &[0.5, 99.0]).unwrap();
        let points = proxy.load_calibration_points().unwrap();
        assert_eq!(points.ref_values, vec![0.5, 99.0]);
        assert!(proxy.calibrate_from_points(&[0.0], &[]).is_err());
    }

    #[tokio::test]
    async fn test_adv_mode_change_event() {
        let (_library, manager) = setup();
        let proxy = SensorProxy::find(&manager, "outside");
        let mut rx = manager.subscribe().unwrap();

        proxy.apply_adv_mode(AdvMode::PeriodMax).unwrap();
        match rx.recv().await.unwrap() {
            ProxyEvent::PropertyChanged { property, value, .. } => {
                assert_eq!(property, "adv_mode");
                assert_eq!(value, Value::Integer(4));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(proxy.get_adv_mode().unwrap(), AdvMode::PeriodMax);
    }
}
