//! Frame annotator.
//!
//! Draws detection results onto a single frame: a hollow box per detection,
//! a filled band above it and a `"{label}: {confidence}%"` caption inside
//! the band. Pure function of (frame, detections); no state is kept across
//! calls and frame dimensions never change.
//!
//! Boxes are drawn exactly where the detector put them. Negative or
//! out-of-bounds coordinates are not clamped; the raster primitives clip
//! per pixel, so only the visible portion lands on the frame.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::{Detection, DetectionSet};
use crate::frame::Frame;

/// Height of the filled label band above each box.
pub const LABEL_BAND_HEIGHT: i32 = 20;

/// Box outline thickness in pixels.
const BOX_THICKNESS: i32 = 2;

/// Fixed caption face: 5x7 glyphs rendered at this integer scale.
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_SCALE: i32 = 2;
/// Horizontal advance per character (glyph plus one spacing column).
const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * GLYPH_SCALE;
/// Caption top offset inside the label band.
const TEXT_INSET_Y: i32 = 3;

/// Draws detections onto frames with a fixed color scheme.
pub struct Annotator {
    box_color: Rgb<u8>,
    band_color: Rgb<u8>,
    text_color: Rgb<u8>,
}

impl Default for Annotator {
    fn default() -> Self {
        // Green boxes and band, black caption.
        Self {
            box_color: Rgb([0, 255, 0]),
            band_color: Rgb([0, 255, 0]),
            text_color: Rgb([0, 0, 0]),
        }
    }
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caption text for one detection: label plus integer percentage.
    pub fn label_text(detection: &Detection) -> String {
        format!(
            "{}: {}%",
            detection.label,
            detection.confidence.round() as i64
        )
    }

    /// Pixel size of a caption rendered with the fixed face and scale.
    pub fn text_size(text: &str) -> (i32, i32) {
        let chars = text.chars().count() as i32;
        if chars == 0 {
            return (0, GLYPH_HEIGHT * GLYPH_SCALE);
        }
        // Drop the trailing spacing column.
        (chars * GLYPH_ADVANCE - GLYPH_SCALE, GLYPH_HEIGHT * GLYPH_SCALE)
    }

    /// Draw every detection onto the frame, in detector order.
    pub fn annotate(&self, frame: &mut Frame, set: &DetectionSet) {
        if set.is_empty() {
            return;
        }

        let width = frame.width;
        let height = frame.height;
        let pixels = std::mem::take(&mut frame.pixels);
        let mut image = match RgbImage::from_raw(width, height, pixels) {
            Some(image) => image,
            None => return,
        };

        for detection in set.iter() {
            self.draw_detection(&mut image, detection);
        }

        frame.pixels = image.into_raw();
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let b = detection.bounds;

        if b.width > 0 && b.height > 0 {
            for inset in 0..BOX_THICKNESS {
                let w = b.width - 2 * inset;
                let h = b.height - 2 * inset;
                if w <= 0 || h <= 0 {
                    break;
                }
                let rect = Rect::at(b.x + inset, b.y + inset).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(image, rect, self.box_color);
            }
        }

        let text = Self::label_text(detection);
        let (text_width, _) = Self::text_size(&text);
        if text_width > 0 {
            let band = Rect::at(b.x, b.y - LABEL_BAND_HEIGHT)
                .of_size(text_width as u32, LABEL_BAND_HEIGHT as u32);
            draw_filled_rect_mut(image, band, self.band_color);
        }

        draw_caption(
            image,
            &text,
            b.x,
            b.y - LABEL_BAND_HEIGHT + TEXT_INSET_Y,
            self.text_color,
        );
    }
}

/// Rasterize a caption at (x, y) top-left, clipping at the frame edges.
fn draw_caption(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    let mut pen_x = x;
    for ch in text.chars() {
        let glyph = glyph_rows(ch);
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let base_x = pen_x + col * GLYPH_SCALE;
                let base_y = y + row as i32 * GLYPH_SCALE;
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        put_pixel_clipped(image, base_x + dx, base_y + dy, color);
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE;
    }
}

fn put_pixel_clipped(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// 5x7 glyph rows, bit 4 = leftmost column. Covers the caption alphabet:
/// lowercase letters, digits, ':', '%' and space. Anything else renders as
/// a blank advance.
fn glyph_rows(ch: char) -> [u8; 7] {
    match ch.to_ascii_lowercase() {
        'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'b' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
        'c' => [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
        'd' => [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'g' => [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'h' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
        'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        'j' => [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'l' => [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x15, 0x15],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        'q' => [0x00, 0x00, 0x0D, 0x13, 0x0F, 0x01, 0x01],
        'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
        'v' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'w' => [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A],
        'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        'y' => [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'z' => [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        _ => [0x00; 7],
    }
}
