/*!
 * Input capture proxy.
 *
 * An input capture records a burst of samples around a trigger condition.
 * The advertised value is the timestamp of the last capture, so a change
 * means new data is available through `get_last_capture`.
 */
use std::sync::Arc;

use crate::hardware::{invalid, CaptureData, FunctionClass, FunctionHandle, InputCaptureHardware};
use crate::proxy::{proxy_enum, sentinel, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// Condition that triggers a capture
    pub enum CaptureType {
        None = 0 => "NONE",
        Timed = 1 => "TIMED",
        VMax = 2 => "V_MAX",
        VMin = 3 => "V_MIN",
        IMax = 4 => "I_MAX",
        IMin = 5 => "I_MIN",
        PMax = 6 => "P_MAX",
        PMin = 7 => "P_MIN",
        PfMin = 8 => "PF_MIN",
        DpfMin = 9 => "DPF_MIN",
    }
}

/// Cached input capture properties
#[derive(Debug, Clone)]
pub struct InputCaptureCache {
    last_capture_time: i64,
    n_samples: i32,
    capture_type: CaptureType,
    cond_value: f64,
    cond_align: i32,
}

impl Default for InputCaptureCache {
    fn default() -> Self {
        Self {
            last_capture_time: invalid::LONG,
            n_samples: invalid::INT,
            capture_type: CaptureType::Invalid,
            cond_value: f64::NAN,
            cond_align: invalid::INT,
        }
    }
}

/// Proxy of an input capture function
#[derive(Debug)]
pub struct InputCaptureProxy {
    base: ProxyBase<dyn InputCaptureHardware, InputCaptureCache>,
}

impl FunctionProxy for InputCaptureProxy {
    const CLASS: FunctionClass = FunctionClass::InputCapture;
    type Hardware = dyn InputCaptureHardware;
    type Cache = InputCaptureCache;

    fn new(base: ProxyBase<dyn InputCaptureHardware, InputCaptureCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn InputCaptureHardware, InputCaptureCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn InputCaptureHardware>> {
        match handle {
            FunctionHandle::InputCapture(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("n_samples", |c| &mut c.n_samples, |hw| hw.get_n_samples());
        b.refresh("capture_type", |c| &mut c.capture_type, |hw| hw.get_capture_type().map(CaptureType::from_library));
        b.refresh("cond_value", |c| &mut c.cond_value, |hw| hw.get_cond_value().map(sentinel::double));
        b.refresh("cond_align", |c| &mut c.cond_align, |hw| hw.get_cond_align());
    }

    fn refresh_cache(&self) {
        self.base.refresh("last_capture_time", |c| &mut c.last_capture_time, |hw| hw.get_last_capture_time());
    }

    fn parse_advertised(&self, value: &str) {
        if let Ok(time) = value.trim().parse::<i64>() {
            self.base.store("last_capture_time", |c| &mut c.last_capture_time, time);
        }
    }
}

impl InputCaptureProxy {
    /// Read the time of the last capture, in ms since the module started
    pub fn get_last_capture_time(&self) -> Result<i64> {
        self.base.read(|hw| hw.get_last_capture_time())
    }

    /// Cached time of the last capture
    pub fn last_capture_time(&self) -> i64 {
        self.base.cached(|c| &c.last_capture_time)
    }

    /// Read the number of samples per capture
    pub fn get_n_samples(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_n_samples())
    }

    /// Change the number of samples per capture
    pub fn set_n_samples(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_n_samples(v))
    }

    /// Cached number of samples per capture
    pub fn n_samples(&self) -> i32 {
        self.base.cached(|c| &c.n_samples)
    }

    /// Like `set_n_samples`, skipped when the value matches the cache
    pub fn apply_n_samples(&self, value: i32) -> Result<()> {
        self.base.apply("n_samples", |c| &mut c.n_samples, value, |hw, v| hw.set_n_samples(v))
    }

    /// Read the sampling rate, in samples per second
    pub fn get_sampling_rate(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_sampling_rate())
    }

    /// Read the capture type
    pub fn get_capture_type(&self) -> Result<CaptureType> {
        self.base.read(|hw| hw.get_capture_type().map(CaptureType::from_library))
    }

    /// Change the capture type
    pub fn set_capture_type(&self, value: CaptureType) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_capture_type(v.to_library()))
    }

    /// Cached capture type
    pub fn capture_type(&self) -> CaptureType {
        self.base.cached(|c| &c.capture_type)
    }

    /// Like `set_capture_type`, skipped when the value matches the cache
    pub fn apply_capture_type(&self, value: CaptureType) -> Result<()> {
        self.base.apply("capture_type", |c| &mut c.capture_type, value, |hw, v| {
            hw.set_capture_type(v.to_library())
        })
    }

    /// Read the trigger threshold
    pub fn get_cond_value(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_cond_value().map(sentinel::double))
    }

    /// Change the trigger threshold
    pub fn set_cond_value(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_cond_value(v))
    }

    /// Cached trigger threshold
    pub fn cond_value(&self) -> f64 {
        self.base.cached(|c| &c.cond_value)
    }

    /// Like `set_cond_value`, skipped when the value matches the cache
    pub fn apply_cond_value(&self, value: f64) -> Result<()> {
        self.base.apply("cond_value", |c| &mut c.cond_value, value, |hw, v| hw.set_cond_value(v))
    }

    /// Read the position of the trigger in the capture, in percent
    pub fn get_cond_align(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_cond_align())
    }

    /// Change the position of the trigger in the capture
    pub fn set_cond_align(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_cond_align(v))
    }

    /// Cached position of the trigger in the capture
    pub fn cond_align(&self) -> i32 {
        self.base.cached(|c| &c.cond_align)
    }

    /// Like `set_cond_align`, skipped when the value matches the cache
    pub fn apply_cond_align(&self, value: i32) -> Result<()> {
        self.base.apply("cond_align", |c| &mut c.cond_align, value, |hw, v| hw.set_cond_align(v))
    }

    /// Read the capture type used at power up
    pub fn get_capture_type_at_startup(&self) -> Result<CaptureType> {
        self.base.read(|hw| hw.get_capture_type_at_startup().map(CaptureType::from_library))
    }

    /// Change the capture type used at power up
    pub fn set_capture_type_at_startup(&self, value: CaptureType) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_capture_type_at_startup(v.to_library()))
    }

    /// Read the trigger threshold used at power up
    pub fn get_cond_value_at_startup(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_cond_value_at_startup().map(sentinel::double))
    }

    /// Change the trigger threshold used at power up
    pub fn set_cond_value_at_startup(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_cond_value_at_startup(v))
    }

    /// Samples of the last triggered capture
    pub fn get_last_capture(&self) -> Result<CaptureData> {
        self.base.read(|hw| hw.get_last_capture())
    }

    /// Capture now, `ms_before` and `ms_after` around the call
    pub fn get_immediate_capture(&self, ms_before: i32, ms_after: i32) -> Result<CaptureData> {
        self.base.read(|hw| hw.get_immediate_capture(ms_before, ms_after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<InputCaptureProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("YI2CMK01-00001").with_function(FunctionClass::InputCapture, "inputCapture"));
        let manager = ProxyManager::new(library.clone());
        let proxy = InputCaptureProxy::find(&manager, "");
        (library, proxy)
    }

    #[test]
    fn test_arrival_cache() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.capture_type(), CaptureType::Timed);
        assert_eq!(proxy.n_samples(), 1000);
        assert_eq!(proxy.cond_align(), 50);
        assert_eq!(proxy.last_capture_time(), 0);
        assert_eq!(proxy.get_capture_type_at_startup().unwrap(), CaptureType::None);
    }

    #[test]
    fn test_new_capture_is_advertised() {
        let (library, proxy) = setup();
        let hw = library.function("YI2CMK01-00001.inputCapture").unwrap();
        let capture = CaptureData {
            capture_type: 2,
            sampling_rate: 5000,
            trigger_value: 12.5,
            serie_names: vec!["Voltage".to_string()],
            serie_units: vec!["V".to_string()],
            series: vec![vec![11.0, 12.5, 12.0]],
            ..CaptureData::default()
        };
        hw.record_capture(capture.clone(), 123_456);

        assert_eq!(proxy.last_capture_time(), 123_456);
        let last = proxy.get_last_capture().unwrap();
        assert_eq!(last, capture);
        assert_eq!(CaptureType::from_library(last.capture_type), CaptureType::VMax);
    }

    #[test]
    fn test_immediate_capture() {
        let (_library, proxy) = setup();
        let capture = proxy.get_immediate_capture(100, 100).unwrap();
        assert_eq!(capture.series[0].len(), 1000);
        assert_eq!(capture.trigger_position, 500);
    }

    #[test]
    fn test_startup_settings_use_same_enum() {
        let (library, proxy) = setup();
        proxy.set_capture_type_at_startup(CaptureType::PfMin).unwrap();
        let hw = library.function("YI2CMK01-00001.inputCapture").unwrap();
        assert_eq!(hw.attr("capture_type_at_startup").as_deref(), Some("8"));
    }
}
