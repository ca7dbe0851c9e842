//! Animated countdown GIF rendering
//!
//! Each artifact is a fixed-size looping GIF: one frame per second of
//! countdown, starting at the time remaining when the render begins and
//! ticking down across the frames. Text is drawn with a built-in 5x7 pixel
//! font so the renderer has no font dependencies.

use async_trait::async_trait;
use chrono::Utc;
use countdown_cache::{CacheError, Renderer};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

const WIDTH: u32 = 400;
const HEIGHT: u32 = 100;
const FRAME_COUNT: i64 = 110;
const FRAME_DELAY_MS: u32 = 1000;
const TEXT_SCALE: u32 = 2;

/// Renders countdown GIFs with the `image` crate's GIF encoder.
pub struct GifRenderer;

#[async_trait]
impl Renderer for GifRenderer {
    async fn render(&self, target: i64, output: &Path) -> countdown_cache::Result<()> {
        let time_left = target - Utc::now().timestamp();
        let output = output.to_path_buf();

        debug!(target, time_left, path = ?output, "Rendering countdown GIF");

        // Encoding is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || encode_frames(time_left, FRAME_COUNT, &output))
            .await
            .map_err(|e| CacheError::Generation(format!("render task panicked: {}", e)))?
    }
}

fn encode_frames(time_left: i64, frames: i64, output: &Path) -> countdown_cache::Result<()> {
    let file = File::create(output)?;
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), 10);
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| CacheError::Generation(e.to_string()))?;

    for i in 0..frames {
        let remaining = (time_left - i).max(0);
        let frame = Frame::from_parts(
            draw_frame(remaining),
            0,
            0,
            Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1),
        );
        encoder
            .encode_frame(frame)
            .map_err(|e| CacheError::Generation(e.to_string()))?;
    }

    Ok(())
}

/// One black frame with the remaining time drawn in white.
fn draw_frame(remaining: i64) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([0, 0, 0, 255]));
    draw_text(&mut img, &countdown_text(remaining), 10, 43, TEXT_SCALE);
    img
}

fn countdown_text(remaining: i64) -> String {
    let days = remaining / 86400;
    let hours = (remaining % 86400) / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;
    format!(
        "{} days, {} hours, {} minutes, {} seconds left",
        days, hours, minutes, seconds
    )
}

/// Draw `text` starting at (x, y); pixels past the right edge are clipped.
fn draw_text(img: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32) {
    let mut cursor = x;
    for c in text.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5u32 {
                if (bits >> (4 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = cursor + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < img.width() && py < img.height() {
                            img.put_pixel(px, py, Rgba([255, 255, 255, 255]));
                        }
                    }
                }
            }
        }
        cursor += 6 * scale;
    }
}

/// 5x7 glyphs for the characters the countdown text uses; each byte is one
/// row, bit 4 leftmost. Unknown characters render blank.
fn glyph(c: char) -> [u8; 7] {
    match c {
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
        'a' => [0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111],
        'c' => [0b00000, 0b00000, 0b01110, 0b10000, 0b10000, 0b10001, 0b01110],
        'd' => [0b00001, 0b00001, 0b01101, 0b10011, 0b10001, 0b10011, 0b01101],
        'e' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        'f' => [0b00110, 0b01001, 0b01000, 0b11100, 0b01000, 0b01000, 0b01000],
        'h' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        'i' => [0b00100, 0b00000, 0b01100, 0b00100, 0b00100, 0b00100, 0b01110],
        'l' => [0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'm' => [0b00000, 0b00000, 0b11010, 0b10101, 0b10101, 0b10101, 0b10101],
        'n' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        'o' => [0b00000, 0b00000, 0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
        'r' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10000, 0b10000, 0b10000],
        's' => [0b00000, 0b00000, 0b01111, 0b10000, 0b01110, 0b00001, 0b11110],
        't' => [0b01000, 0b01000, 0b11100, 0b01000, 0b01000, 0b01001, 0b00110],
        'u' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10001, 0b10011, 0b01101],
        'y' => [0b00000, 0b00000, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00100, 0b01000],
        _ => [0; 7],
    }
}
