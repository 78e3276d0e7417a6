//! Crop outlines and age/gender labels drawn onto frames in place.
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::geometry::CropRegion;

const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OUTLINE_THICKNESS: i32 = 2;
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 200, 0]);
const LABEL_FOREGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_SCALE: i32 = 2;
const LABEL_PADDING: i32 = 2;

/// Outlines a crop region with a 2-pixel rectangle.
///
/// Parts of the outline that fall outside the frame are clipped.
pub fn draw_crop_outline(frame: &mut Frame, region: &CropRegion) -> Result<(), PipelineError> {
    let mut image = rgb_view(frame)?;
    for inset in 0..OUTLINE_THICKNESS {
        let w = region.width - 2 * inset;
        let h = region.height - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(region.x + inset, region.y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(&mut image, rect, OUTLINE_COLOR);
    }
    Ok(())
}

/// Draws `text` on a filled box whose bottom-left corner sits at
/// `(x, y)`, so the label appears just above a face's top-left corner.
/// Near the top edge the box is pushed down to stay visible.
pub fn draw_label(frame: &mut Frame, x: i32, y: i32, text: &str) -> Result<(), PipelineError> {
    let (w, h) = label_size(text);
    if w == 0 {
        return Ok(());
    }
    let mut image = rgb_view(frame)?;
    let top = (y - h as i32).max(0);
    draw_filled_rect_mut(&mut image, Rect::at(x, top).of_size(w, h), LABEL_BACKGROUND);

    let mut cursor = x + LABEL_PADDING;
    for ch in text.chars() {
        draw_glyph(&mut image, cursor, top + LABEL_PADDING, ch);
        cursor += (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    }
    Ok(())
}

/// Pixel size of the label box for `text`, padding included.
pub fn label_size(text: &str) -> (u32, u32) {
    let chars = text.chars().count() as i32;
    if chars == 0 {
        return (0, 0);
    }
    let text_w = chars * (GLYPH_WIDTH + 1) * GLYPH_SCALE - GLYPH_SCALE;
    let text_h = GLYPH_HEIGHT * GLYPH_SCALE;
    (
        (text_w + 2 * LABEL_PADDING) as u32,
        (text_h + 2 * LABEL_PADDING) as u32,
    )
}

type RgbView<'a> = image::ImageBuffer<Rgb<u8>, &'a mut [u8]>;

fn rgb_view(frame: &mut Frame) -> Result<RgbView<'_>, PipelineError> {
    let channels = frame.channels();
    frame.as_rgb_image_mut().ok_or_else(|| {
        PipelineError::invalid(format!("cannot draw on a {channels}-channel frame"))
    })
}

fn draw_glyph(image: &mut RgbView<'_>, x: i32, y: i32, ch: char) {
    let rows = glyph(ch);
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                let px = x + col * GLYPH_SCALE;
                let py = y + row as i32 * GLYPH_SCALE;
                let cell = Rect::at(px, py).of_size(GLYPH_SCALE as u32, GLYPH_SCALE as u32);
                draw_filled_rect_mut(image, cell, LABEL_FOREGROUND);
            }
        }
    }
}

/// 5x7 bitmaps, one byte per row, most significant of the low 5 bits on
/// the left. Characters without a bitmap render as blanks.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        _ => [0; 7],
    }
}
