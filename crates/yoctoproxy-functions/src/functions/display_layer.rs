/*!
 * Display layer proxy.
 *
 * Layers are drawing surfaces owned by a display. They are not functions and
 * have no name of their own, so they are not kept by the manager: a layer
 * proxy is handed out by [`super::display::DisplayProxy::get_display_layer`]
 * and stays tied to the hardware layer it was created from.
 */
use std::sync::Arc;

use crate::hardware::{DisplayLayerHardware, HardwareError};
use crate::proxy::{proxy_enum, Result};

proxy_enum! {
    /// Anchor point of drawn text, relative to the given coordinates
    pub enum Align {
        TopLeft = 0 => "TOP_LEFT",
        CenterLeft = 1 => "CENTER_LEFT",
        BaselineLeft = 2 => "BASELINE_LEFT",
        BottomLeft = 3 => "BOTTOM_LEFT",
        TopCenter = 4 => "TOP_CENTER",
        Center = 5 => "CENTER",
        BaselineCenter = 6 => "BASELINE_CENTER",
        BottomCenter = 7 => "BOTTOM_CENTER",
        TopDecimal = 8 => "TOP_DECIMAL",
        CenterDecimal = 9 => "CENTER_DECIMAL",
        BaselineDecimal = 10 => "BASELINE_DECIMAL",
        BottomDecimal = 11 => "BOTTOM_DECIMAL",
        TopRight = 12 => "TOP_RIGHT",
        CenterRight = 13 => "CENTER_RIGHT",
        BaselineRight = 14 => "BASELINE_RIGHT",
        BottomRight = 15 => "BOTTOM_RIGHT",
    }
}

/// Drawing surface of a display
#[derive(Debug, Clone)]
pub struct DisplayLayerProxy {
    layer: Arc<dyn DisplayLayerHardware>,
}

impl DisplayLayerProxy {
    pub(crate) fn new(layer: Arc<dyn DisplayLayerHardware>) -> Self {
        Self { layer }
    }

    /// Layer number within the display
    pub fn layer_id(&self) -> i32 {
        self.layer.layer_id()
    }

    /// Clear the layer and restore default drawing settings
    pub fn reset(&self) -> Result<()> {
        Ok(self.layer.reset()?)
    }

    /// Erase the content without touching drawing settings
    pub fn clear(&self) -> Result<()> {
        Ok(self.layer.clear()?)
    }

    /// Select a 24-bit RGB pen
    pub fn select_color_pen(&self, color: u32) -> Result<()> {
        Ok(self.layer.select_color_pen(color)?)
    }

    /// Draw in a gray level (0-255)
    pub fn select_gray_pen(&self, gray_level: i32) -> Result<()> {
        Ok(self.layer.select_gray_pen(gray_level)?)
    }

    /// Draw in transparent color
    pub fn select_eraser(&self) -> Result<()> {
        Ok(self.layer.select_eraser()?)
    }

    /// Turn antialiasing on or off
    pub fn set_antialiasing_mode(&self, enabled: bool) -> Result<()> {
        Ok(self.layer.set_antialiasing_mode(enabled)?)
    }

    /// Draw one pixel
    pub fn draw_pixel(&self, x: i32, y: i32) -> Result<()> {
        Ok(self.layer.draw_pixel(x, y)?)
    }

    /// Draw an empty rectangle
    pub fn draw_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<()> {
        Ok(self.layer.draw_rect(x1, y1, x2, y2)?)
    }

    /// Draw a filled rectangle
    pub fn draw_bar(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<()> {
        Ok(self.layer.draw_bar(x1, y1, x2, y2)?)
    }

    /// Draw an empty circle
    pub fn draw_circle(&self, x: i32, y: i32, radius: i32) -> Result<()> {
        Ok(self.layer.draw_circle(x, y, radius)?)
    }

    /// Draw a filled disc
    pub fn draw_disc(&self, x: i32, y: i32, radius: i32) -> Result<()> {
        Ok(self.layer.draw_disc(x, y, radius)?)
    }

    /// Select the font used by text commands
    pub fn select_font(&self, font_name: &str) -> Result<()> {
        Ok(self.layer.select_font(font_name)?)
    }

    /// Draw `text` anchored at `(x, y)`
    pub fn draw_text(&self, x: i32, y: i32, align: Align, text: &str) -> Result<()> {
        if align == Align::Invalid {
            return Err(HardwareError::InvalidArgument("Invalid text alignment".to_string()).into());
        }
        Ok(self.layer.draw_text(x, y, align.to_library(), text)?)
    }

    /// Draw an image previously uploaded to the display file system
    pub fn draw_image(&self, x: i32, y: i32, image_name: &str) -> Result<()> {
        Ok(self.layer.draw_image(x, y, image_name)?)
    }

    /// Draw a monochrome bitmap, one bit per pixel, `width` pixels per row
    pub fn draw_bitmap(&self, x: i32, y: i32, width: i32, bitmap: &[u8], bg_color: i32) -> Result<()> {
        Ok(self.layer.draw_bitmap(x, y, width, bitmap, bg_color)?)
    }

    /// Move the graphic cursor
    pub fn move_to(&self, x: i32, y: i32) -> Result<()> {
        Ok(self.layer.move_to(x, y)?)
    }

    /// Draw a line from the graphic cursor, which follows
    pub fn line_to(&self, x: i32, y: i32) -> Result<()> {
        Ok(self.layer.line_to(x, y)?)
    }

    /// Print text in the console area
    pub fn console_out(&self, text: &str) -> Result<()> {
        Ok(self.layer.console_out(text)?)
    }

    /// Set the console area
    pub fn set_console_margins(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<()> {
        Ok(self.layer.set_console_margins(x1, y1, x2, y2)?)
    }

    /// Change the console background color
    pub fn set_console_background(&self, bg_col: i32) -> Result<()> {
        Ok(self.layer.set_console_background(bg_col)?)
    }

    /// Turn console word wrapping on or off
    pub fn set_console_word_wrap(&self, word_wrap: bool) -> Result<()> {
        Ok(self.layer.set_console_word_wrap(word_wrap)?)
    }

    /// Blank the console area
    pub fn clear_console(&self) -> Result<()> {
        Ok(self.layer.clear_console()?)
    }

    /// Move the layer on screen, sliding over `scroll_time` ms
    pub fn set_layer_position(&self, x: i32, y: i32, scroll_time: i32) -> Result<()> {
        Ok(self.layer.set_layer_position(x, y, scroll_time)?)
    }

    /// Hide the layer; drawing goes on off screen
    pub fn hide(&self) -> Result<()> {
        Ok(self.layer.hide()?)
    }

    /// Show the layer again
    pub fn unhide(&self) -> Result<()> {
        Ok(self.layer.unhide()?)
    }

    /// Read the display width
    pub fn get_display_width(&self) -> Result<i32> {
        Ok(self.layer.get_display_width()?)
    }

    /// Read the display height
    pub fn get_display_height(&self) -> Result<i32> {
        Ok(self.layer.get_display_height()?)
    }

    /// Read the layer width
    pub fn get_layer_width(&self) -> Result<i32> {
        Ok(self.layer.get_layer_width()?)
    }

    /// Read the layer height
    pub fn get_layer_height(&self) -> Result<i32> {
        Ok(self.layer.get_layer_height()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_has_sixteen_values() {
        assert_eq!(Align::VARIANTS.len(), 17);
        assert_eq!(Align::TopLeft.code(), 1);
        assert_eq!(Align::BottomRight.to_library(), 15);
        assert_eq!(Align::from_name("BASELINE_DECIMAL"), Align::BaselineDecimal);
    }
}
