/*!
 * Simulated display layer: records drawing commands instead of rendering.
 */
use std::sync::{Mutex, PoisonError};

use crate::hardware::{DisplayLayerHardware, HwResult};

/// Display layer recording every command it receives
#[derive(Debug)]
pub struct SimLayer {
    layer_id: i32,
    display_size: (i32, i32),
    layer_size: (i32, i32),
    commands: Mutex<Vec<String>>,
    hidden: Mutex<bool>,
}

impl SimLayer {
    pub(crate) fn new(layer_id: i32, display_size: (i32, i32), layer_size: (i32, i32)) -> Self {
        Self {
            layer_id,
            display_size,
            layer_size,
            commands: Mutex::new(Vec::new()),
            hidden: Mutex::new(false),
        }
    }

    /// Commands drawn since the last `reset` or `clear`
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the layer is hidden
    pub fn is_hidden(&self) -> bool {
        *self.hidden.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, command: String) -> HwResult<()> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        Ok(())
    }

    fn wipe(&self) -> HwResult<()> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn set_hidden(&self, hidden: bool) -> HwResult<()> {
        *self.hidden.lock().unwrap_or_else(PoisonError::into_inner) = hidden;
        Ok(())
    }
}

impl DisplayLayerHardware for SimLayer {
    fn layer_id(&self) -> i32 {
        self.layer_id
    }

    fn reset(&self) -> HwResult<()> {
        self.set_hidden(false)?;
        self.wipe()
    }

    fn clear(&self) -> HwResult<()> {
        self.wipe()
    }

    fn select_color_pen(&self, color: u32) -> HwResult<()> {
        self.record(format!("select_color_pen(0x{:06X})", color))
    }

    fn select_gray_pen(&self, gray_level: i32) -> HwResult<()> {
        self.record(format!("select_gray_pen({})", gray_level))
    }

    fn select_eraser(&self) -> HwResult<()> {
        self.record("select_eraser()".to_string())
    }

    fn set_antialiasing_mode(&self, enabled: bool) -> HwResult<()> {
        self.record(format!("set_antialiasing_mode({})", enabled))
    }

    fn draw_pixel(&self, x: i32, y: i32) -> HwResult<()> {
        self.record(format!("draw_pixel({}, {})", x, y))
    }

    fn draw_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> HwResult<()> {
        self.record(format!("draw_rect({}, {}, {}, {})", x1, y1, x2, y2))
    }

    fn draw_bar(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> HwResult<()> {
        self.record(format!("draw_bar({}, {}, {}, {})", x1, y1, x2, y2))
    }

    fn draw_circle(&self, x: i32, y: i32, radius: i32) -> HwResult<()> {
        self.record(format!("draw_circle({}, {}, {})", x, y, radius))
    }

    fn draw_disc(&self, x: i32, y: i32, radius: i32) -> HwResult<()> {
        self.record(format!("draw_disc({}, {}, {})", x, y, radius))
    }

    fn select_font(&self, font_name: &str) -> HwResult<()> {
        self.record(format!("select_font({})", font_name))
    }

    fn draw_text(&self, x: i32, y: i32, anchor: i32, text: &str) -> HwResult<()> {
        self.record(format!("draw_text({}, {}, {}, {})", x, y, anchor, text))
    }

    fn draw_image(&self, x: i32, y: i32, image_name: &str) -> HwResult<()> {
        self.record(format!("draw_image({}, {}, {})", x, y, image_name))
    }

    fn draw_bitmap(&self, x: i32, y: i32, width: i32, bitmap: &[u8], bg_color: i32) -> HwResult<()> {
        self.record(format!(
            "draw_bitmap({}, {}, {}, {} bytes, {})",
            x,
            y,
            width,
            bitmap.len(),
            bg_color
        ))
    }

    fn move_to(&self, x: i32, y: i32) -> HwResult<()> {
        self.record(format!("move_to({}, {})", x, y))
    }

    fn line_to(&self, x: i32, y: i32) -> HwResult<()> {
        self.record(format!("line_to({}, {})", x, y))
    }

    fn console_out(&self, text: &str) -> HwResult<()> {
        self.record(format!("console_out({})", text))
    }

    fn set_console_margins(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> HwResult<()> {
        self.record(format!("set_console_margins({}, {}, {}, {})", x1, y1, x2, y2))
    }

    fn set_console_background(&self, bg_col: i32) -> HwResult<()> {
        self.record(format!("set_console_background({})", bg_col))
    }

    fn set_console_word_wrap(&self, word_wrap: bool) -> HwResult<()> {
        self.record(format!("set_console_word_wrap({})", word_wrap))
    }

    fn clear_console(&self) -> HwResult<()> {
        self.record("clear_console()".to_string())
    }

    fn set_layer_position(&self, x: i32, y: i32, scroll_time: i32) -> HwResult<()> {
        self.record(format!("set_layer_position({}, {}, {})", x, y, scroll_time))
    }

    fn hide(&self) -> HwResult<()> {
        self.set_hidden(true)
    }

    fn unhide(&self) -> HwResult<()> {
        self.set_hidden(false)
    }

    fn get_display_width(&self) -> HwResult<i32> {
        Ok(self.display_size.0)
    }

    fn get_display_height(&self) -> HwResult<i32> {
        Ok(self.display_size.1)
    }

    fn get_layer_width(&self) -> HwResult<i32> {
        Ok(self.layer_size.0)
    }

    fn get_layer_height(&self) -> HwResult<i32> {
        Ok(self.layer_size.1)
    }
}
