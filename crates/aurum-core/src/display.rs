//! Numeric price display
//!
//! The appliance shows the selected price times 100 as a fixed-width
//! integer with no decimal point, so `1234.56` reads `123456`.

use core::fmt::{Debug, Write};

use embedded_graphics::{
    Drawable,
    geometry::Point,
    mono_font::{MonoTextStyle, MonoTextStyleBuilder, ascii::FONT_10X20},
    pixelcolor::Rgb565,
    prelude::*,
    text::{Baseline, Text},
};
use heapless::String;

/// Digits on the appliance's display
pub const DISPLAY_DIGITS: u8 = 6;

/// Longest string [`format_digits`] produces
pub const MAX_DIGITS: usize = 10;

/// Renders an integer into a fixed number of digit cells.
pub trait NumericDisplay {
    type Error: Debug;

    fn show(&mut self, value: i32, digits: u8) -> Result<(), Self::Error>;
}

/// Price to display units (hundredths), rounding half away from zero.
pub fn scale_price(price: f64) -> i32 {
    let scaled = price * 100.0;
    let rounded = if scaled >= 0.0 {
        scaled + 0.5
    } else {
        scaled - 0.5
    };
    // Saturating; NaN becomes 0
    rounded as i32
}

/// Right-align `value` in `digits` cells, or fill them with dashes when it does not fit.
pub fn format_digits(value: i32, digits: u8) -> String<MAX_DIGITS> {
    let width = usize::from(digits).min(MAX_DIGITS);
    let mut text = String::new();

    let fits = {
        let magnitude = i64::from(value).unsigned_abs();
        let sign = usize::from(value < 0);
        let mut len = 1;
        let mut rest = magnitude / 10;
        while rest > 0 {
            len += 1;
            rest /= 10;
        }
        len + sign <= width
    };

    if fits {
        // Fits by construction
        let _ = write!(text, "{:>width$}", value, width = width);
    } else {
        for _ in 0..width {
            let _ = text.push('-');
        }
    }

    text
}

/// [`NumericDisplay`] drawn as monospace text on any RGB565 draw target.
///
/// Redraws only when the value or digit count changes, which keeps a fast
/// refresh interval cheap on a slow SPI panel.
pub struct NumericLcd<D> {
    target: D,
    origin: Point,
    style: MonoTextStyle<'static, Rgb565>,
    last: Option<(i32, u8)>,
}

impl<D> NumericLcd<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    /// Text cell size of the font used for the digits
    pub const CELL: Size = Size::new(10, 20);

    pub fn new(target: D, origin: Point) -> Self {
        Self::with_colors(target, origin, Rgb565::WHITE, Rgb565::BLACK)
    }

    pub fn with_colors(target: D, origin: Point, foreground: Rgb565, background: Rgb565) -> Self {
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_10X20)
            .text_color(foreground)
            .background_color(background)
            .build();

        Self {
            target,
            origin,
            style,
            last: None,
        }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut D {
        &mut self.target
    }

    /// Force the next [`NumericDisplay::show`] to redraw.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

impl<D> NumericDisplay for NumericLcd<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: Debug,
{
    type Error = D::Error;

    fn show(&mut self, value: i32, digits: u8) -> Result<(), Self::Error> {
        if self.last == Some((value, digits)) {
            return Ok(());
        }

        let text = format_digits(value, digits);
        Text::with_baseline(&text, self.origin, self.style, Baseline::Top).draw(&mut self.target)?;

        self.last = Some((value, digits));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mock_display::MockDisplay;
    use embedded_graphics::primitives::Rectangle;

    #[test]
    fn test_scale_price() {
        assert_eq!(scale_price(1000.0), 100_000);
        assert_eq!(scale_price(25.0), 2_500);
        assert_eq!(scale_price(1234.56), 123_456);
        assert_eq!(scale_price(0.004), 0);
        assert_eq!(scale_price(0.005), 1);
        assert_eq!(scale_price(-1.0), -100);
        assert_eq!(scale_price(f64::NAN), 0);
    }

    #[test]
    fn test_format_digits() {
        assert_eq!(format_digits(2_500, 6).as_str(), "  2500");
        assert_eq!(format_digits(123_456, 6).as_str(), "123456");
        assert_eq!(format_digits(-100, 6).as_str(), "  -100");
        assert_eq!(format_digits(0, 6).as_str(), "     0");
    }

    #[test]
    fn test_format_overflow_shows_dashes() {
        assert_eq!(format_digits(1_234_567, 6).as_str(), "------");
        assert_eq!(format_digits(-99_999, 6).as_str(), "-99999");
        assert_eq!(format_digits(-100_000, 6).as_str(), "------");
        assert_eq!(format_digits(i32::MIN, 6).as_str(), "------");
    }

    #[test]
    fn test_lcd_draws_full_cell_row() {
        let mut lcd = NumericLcd::new(MockDisplay::<Rgb565>::new(), Point::zero());
        lcd.show(2_500, DISPLAY_DIGITS).unwrap();

        assert_eq!(
            lcd.target().affected_area(),
            Rectangle::new(Point::zero(), Size::new(60, 20))
        );
    }

    #[test]
    fn test_lcd_skips_unchanged_value() {
        let mut lcd = NumericLcd::new(MockDisplay::<Rgb565>::new(), Point::zero());
        lcd.show(2_500, DISPLAY_DIGITS).unwrap();
        // MockDisplay panics on overdraw, so a second draw would fail here
        lcd.show(2_500, DISPLAY_DIGITS).unwrap();

        lcd.target_mut().set_allow_overdraw(true);
        lcd.show(100_000, DISPLAY_DIGITS).unwrap();
        lcd.invalidate();
        lcd.show(100_000, DISPLAY_DIGITS).unwrap();
    }
}
