/*!
 * Display proxy.
 */
use std::sync::Arc;

use bytes::Bytes;

use crate::hardware::{invalid, DisplayHardware, FunctionClass, FunctionHandle};
use crate::proxy::{proxy_enum, FunctionProxy, ProxyBase, Result};

use super::display_layer::DisplayLayerProxy;

proxy_enum! {
    /// Whether the screen is lit
    pub enum Enabled {
        False = 0 => "FALSE",
        True = 1 => "TRUE",
    }
}

proxy_enum! {
    /// Side of the screen that is up
    pub enum Orientation {
        Left = 0 => "LEFT",
        Up = 1 => "UP",
        Right = 2 => "RIGHT",
        Down = 3 => "DOWN",
    }
}

proxy_enum! {
    /// Screen technology
    pub enum DisplayType {
        Mono = 0 => "MONO",
        Gray = 1 => "GRAY",
        Rgb = 2 => "RGB",
    }
}

/// Cached display properties
#[derive(Debug, Clone)]
pub struct DisplayCache {
    enabled: Enabled,
    startup_seq: String,
    brightness: i32,
    orientation: Orientation,
    display_width: i32,
    display_height: i32,
    display_type: DisplayType,
    layer_count: i32,
}

impl Default for DisplayCache {
    fn default() -> Self {
        Self {
            enabled: Enabled::Invalid,
            startup_seq: invalid::STRING.to_string(),
            brightness: invalid::INT,
            orientation: Orientation::Invalid,
            display_width: invalid::INT,
            display_height: invalid::INT,
            display_type: DisplayType::Invalid,
            layer_count: invalid::INT,
        }
    }
}

/// Proxy of a display
#[derive(Debug)]
pub struct DisplayProxy {
    base: ProxyBase<dyn DisplayHardware, DisplayCache>,
}

impl FunctionProxy for DisplayProxy {
    const CLASS: FunctionClass = FunctionClass::Display;
    type Hardware = dyn DisplayHardware;
    type Cache = DisplayCache;

    fn new(base: ProxyBase<dyn DisplayHardware, DisplayCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn DisplayHardware, DisplayCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn DisplayHardware>> {
        match handle {
            FunctionHandle::Display(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("startup_seq", |c| &mut c.startup_seq, |hw| hw.get_startup_seq());
        b.refresh("brightness", |c| &mut c.brightness, |hw| hw.get_brightness());
        b.refresh("orientation", |c| &mut c.orientation, |hw| hw.get_orientation().map(Orientation::from_library));
        b.refresh("display_width", |c| &mut c.display_width, |hw| hw.get_display_width());
        b.refresh("display_height", |c| &mut c.display_height, |hw| hw.get_display_height());
        b.refresh("display_type", |c| &mut c.display_type, |hw| hw.get_display_type().map(DisplayType::from_library));
        b.refresh("layer_count", |c| &mut c.layer_count, |hw| hw.get_layer_count());
    }

    fn refresh_cache(&self) {
        self.base.refresh("enabled", |c| &mut c.enabled, |hw| hw.get_enabled().map(Enabled::from_library));
    }
}

impl DisplayProxy {
    /// Read the display power state
    pub fn get_enabled(&self) -> Result<Enabled> {
        self.base.read(|hw| hw.get_enabled().map(Enabled::from_library))
    }

    /// Change the display power state
    pub fn set_enabled(&self, value: Enabled) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_enabled(v.to_library()))
    }

    /// Cached display power state
    pub fn enabled(&self) -> Enabled {
        self.base.cached(|c| &c.enabled)
    }

    /// Like `set_enabled`, skipped when the value matches the cache
    pub fn apply_enabled(&self, value: Enabled) -> Result<()> {
        self.base.apply("enabled", |c| &mut c.enabled, value, |hw, v| hw.set_enabled(v.to_library()))
    }

    /// Read the name of the sequence played at power up
    pub fn get_startup_seq(&self) -> Result<String> {
        self.base.read(|hw| hw.get_startup_seq())
    }

    /// Change the name of the sequence played at power up
    pub fn set_startup_seq(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_startup_seq(&v))
    }

    /// Cached name of the sequence played at power up
    pub fn startup_seq(&self) -> String {
        self.base.cached(|c| &c.startup_seq)
    }

    /// Like `set_startup_seq`, skipped when the value matches the cache
    pub fn apply_startup_seq(&self, value: &str) -> Result<()> {
        self.base.apply("startup_seq", |c| &mut c.startup_seq, value.to_string(), |hw, v| {
            hw.set_startup_seq(&v)
        })
    }

    /// Read the brightness, in percent
    pub fn get_brightness(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_brightness())
    }

    /// Change the brightness
    pub fn set_brightness(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_brightness(v))
    }

    /// Cached brightness
    pub fn brightness(&self) -> i32 {
        self.base.cached(|c| &c.brightness)
    }

    /// Like `set_brightness`, skipped when the value matches the cache
    pub fn apply_brightness(&self, value: i32) -> Result<()> {
        self.base.apply("brightness", |c| &mut c.brightness, value, |hw, v| hw.set_brightness(v))
    }

    /// Read the orientation
    pub fn get_orientation(&self) -> Result<Orientation> {
        self.base.read(|hw| hw.get_orientation().map(Orientation::from_library))
    }

    /// Change the orientation
    pub fn set_orientation(&self, value: Orientation) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_orientation(v.to_library()))
    }

    /// Cached orientation
    pub fn orientation(&self) -> Orientation {
        self.base.cached(|c| &c.orientation)
    }

    /// Like `set_orientation`, skipped when the value matches the cache
    pub fn apply_orientation(&self, value: Orientation) -> Result<()> {
        self.base.apply("orientation", |c| &mut c.orientation, value, |hw, v| {
            hw.set_orientation(v.to_library())
        })
    }

    /// Read the display width
    pub fn get_display_width(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_display_width())
    }

    /// Cached display width
    pub fn display_width(&self) -> i32 {
        self.base.cached(|c| &c.display_width)
    }

    /// Read the display height
    pub fn get_display_height(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_display_height())
    }

    /// Cached display height
    pub fn display_height(&self) -> i32 {
        self.base.cached(|c| &c.display_height)
    }

    /// Read the display type
    pub fn get_display_type(&self) -> Result<DisplayType> {
        self.base.read(|hw| hw.get_display_type().map(DisplayType::from_library))
    }

    /// Cached display type
    pub fn display_type(&self) -> DisplayType {
        self.base.cached(|c| &c.display_type)
    }

    /// Read the width of a layer
    pub fn get_layer_width(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_layer_width())
    }

    /// Read the height of a layer
    pub fn get_layer_height(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_layer_height())
    }

    /// Read the number of layers
    pub fn get_layer_count(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_layer_count())
    }

    /// Cached number of layers
    pub fn layer_count(&self) -> i32 {
        self.base.cached(|c| &c.layer_count)
    }

    /// Clear every layer and restore default settings
    pub fn reset_all(&self) -> Result<()> {
        self.base.read(|hw| hw.reset_all())
    }

    /// Change the brightness gradually
    pub fn fade(&self, brightness: i32, duration_ms: i32) -> Result<()> {
        self.base.read(|hw| hw.fade(brightness, duration_ms))
    }

    /// Start recording drawing commands into a sequence
    pub fn new_sequence(&self) -> Result<()> {
        self.base.read(|hw| hw.new_sequence())
    }

    /// Stop recording and save the sequence under `name`
    pub fn save_sequence(&self, name: &str) -> Result<()> {
        self.base.read(|hw| hw.save_sequence(name))
    }

    /// Replay a saved sequence
    pub fn play_sequence(&self, name: &str) -> Result<()> {
        self.base.read(|hw| hw.play_sequence(name))
    }

    /// Insert a pause into the recorded sequence
    pub fn pause_sequence(&self, delay_ms: i32) -> Result<()> {
        self.base.read(|hw| hw.pause_sequence(delay_ms))
    }

    /// Stop the sequence being played
    pub fn stop_sequence(&self) -> Result<()> {
        self.base.read(|hw| hw.stop_sequence())
    }

    /// Store a file (font, image) in the display file system
    pub fn upload(&self, pathname: &str, content: impl Into<Bytes>) -> Result<()> {
        let content = content.into();
        self.base.read(|hw| hw.upload(pathname, content))
    }

    /// Copy one layer over another
    pub fn copy_layer_content(&self, src_layer: i32, dst_layer: i32) -> Result<()> {
        self.base.read(|hw| hw.copy_layer_content(src_layer, dst_layer))
    }

    /// Exchange the content of two layers
    pub fn swap_layer_content(&self, layer_a: i32, layer_b: i32) -> Result<()> {
        self.base.read(|hw| hw.swap_layer_content(layer_a, layer_b))
    }

    /// Drawing layer `layer_id` of the bound display
    pub fn get_display_layer(&self, layer_id: i32) -> Result<DisplayLayerProxy> {
        self.base
            .read(|hw| hw.display_layer(layer_id))
            .map(DisplayLayerProxy::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::display_layer::Align;
    use crate::hardware::DisplayLayerHardware;
    use crate::manager::ProxyManager;
    use crate::proxy::ProxyError;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<DisplayProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("YD128X32-00001").with_function(FunctionClass::Display, "display"));
        let manager = ProxyManager::new(library.clone());
        let proxy = DisplayProxy::find(&manager, "display");
        (library, proxy)
    }

    #[test]
    fn test_arrival_cache() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.enabled(), Enabled::True);
        assert_eq!(proxy.orientation(), Orientation::Up);
        assert_eq!(proxy.display_type(), DisplayType::Mono);
        assert_eq!(proxy.display_width(), 128);
        assert_eq!(proxy.layer_count(), 5);
    }

    #[test]
    fn test_layer_drawing() {
        let (library, proxy) = setup();
        let layer = proxy.get_display_layer(1).unwrap();
        assert_eq!(layer.layer_id(), 1);
        layer.select_gray_pen(255).unwrap();
        layer.draw_text(64, 16, Align::Center, "Hello").unwrap();
        assert!(layer.draw_text(0, 0, Align::Invalid, "x").is_err());

        let hw = library.function("YD128X32-00001.display").unwrap();
        let sim_layer = hw.layers().into_iter().find(|l| l.layer_id() == 1).unwrap();
        assert_eq!(
            sim_layer.commands(),
            vec!["select_gray_pen(255)".to_string(), "draw_text(64, 16, 5, Hello)".to_string()]
        );

        layer.hide().unwrap();
        assert!(sim_layer.is_hidden());
        proxy.reset_all().unwrap();
        assert!(sim_layer.commands().is_empty());
        assert!(!sim_layer.is_hidden());
    }

    #[test]
    fn test_layer_out_of_range() {
        let (_library, proxy) = setup();
        assert!(matches!(proxy.get_display_layer(5), Err(ProxyError::Hardware(_))));
    }

    #[test]
    fn test_upload_and_sequences() {
        let (library, proxy) = setup();
        proxy.upload("logo.gif", vec![0x47u8, 0x49, 0x46]).unwrap();
        proxy.new_sequence().unwrap();
        proxy.save_sequence("boot").unwrap();
        proxy.apply_startup_seq("boot").unwrap();
        assert_eq!(proxy.startup_seq(), "boot");

        let hw = library.function("YD128X32-00001.display").unwrap();
        assert_eq!(hw.journal()[0], "upload(logo.gif, 3 bytes)");
        assert_eq!(hw.journal().last().map(String::as_str), Some("set_startup_seq(boot)"));
    }

    #[test]
    fn test_disable_is_advertised() {
        let (library, proxy) = setup();
        proxy.apply_enabled(Enabled::False).unwrap();
        assert_eq!(proxy.enabled(), Enabled::False);
        let hw = library.function("YD128X32-00001.display").unwrap();
        assert_eq!(hw.attr("enabled").as_deref(), Some("0"));
    }
}
