/*
 * @file canvas.rs
 * @brief Frame composition helpers
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Pixel operations used to compose eye frames.

use image::{Rgba, RgbaImage};

/// Darkening factor of the upper lid.
const TOP_LID_SHADE: f32 = 0.2;

/// Darkening factor of the lower lid.
const BOTTOM_LID_SHADE: f32 = 0.3;

/// Alpha-blends `iris` onto `background` with its top-left corner at `(x, y)`.
///
/// # Details
/// Parts of the iris outside the background are clipped. The iris alpha
/// channel is scaled by `opacity`; the background alpha is left untouched.
pub fn overlay_iris(background: &mut RgbaImage, iris: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (bg_w, bg_h) = (i64::from(background.width()), i64::from(background.height()));
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + i64::from(iris.width())).min(bg_w);
    let y1 = (y + i64::from(iris.height())).min(bg_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let opacity = opacity.clamp(0.0, 1.0);
    for by in y0..y1 {
        for bx in x0..x1 {
            let src = iris.get_pixel((bx - x) as u32, (by - y) as u32);
            let alpha = f32::from(src[3]) / 255.0 * opacity;
            if alpha <= 0.0 {
                continue;
            }
            let dst = background.get_pixel_mut(bx as u32, by as u32);
            for c in 0..3 {
                let blended = alpha * f32::from(src[c]) + (1.0 - alpha) * f32::from(dst[c]);
                dst[c] = blended as u8;
            }
        }
    }
}

/// Darkens the frame's edges to simulate eyelids.
///
/// # Arguments
/// * `amount` - Lid closure, `0.0` open to `1.0` closed. The upper lid covers
///   up to half the frame, the lower lid 60 % of the upper one.
pub fn blink_overlay(frame: &mut RgbaImage, amount: f32) {
    if amount <= 0.0 {
        return;
    }
    let height = frame.height();
    let close = ((height as f32 * amount * 0.5) as u32).min(height);
    if close == 0 {
        return;
    }
    shade_rows(frame, 0..close, TOP_LID_SHADE);
    let bottom = (close as f32 * 0.6) as u32;
    if bottom > 0 {
        shade_rows(frame, height - bottom..height, BOTTOM_LID_SHADE);
    }
}

fn shade_rows(frame: &mut RgbaImage, rows: std::ops::Range<u32>, factor: f32) {
    let width = frame.width();
    for y in rows {
        for x in 0..width {
            let pixel = frame.get_pixel_mut(x, y);
            for c in 0..3 {
                pixel[c] = (f32::from(pixel[c]) * factor) as u8;
            }
        }
    }
}

/// Mixes two equally sized frames.
///
/// # Arguments
/// * `from` - Outgoing frame.
/// * `to` - Incoming frame.
/// * `t` - Progress, clamped to `0.0..=1.0`.
///
/// # Returns
/// * `RgbaImage` - `from` at `t = 0`, `to` at `t = 1`. Frames of different
///   sizes yield a copy of `to`.
pub fn crossfade(from: &RgbaImage, to: &RgbaImage, t: f32) -> RgbaImage {
    if from.dimensions() != to.dimensions() {
        return to.clone();
    }
    let t = t.clamp(0.0, 1.0);
    let mut out = from.clone();
    for (dst, src) in out.pixels_mut().zip(to.pixels()) {
        for c in 0..4 {
            dst[c] = (f32::from(dst[c]) * (1.0 - t) + f32::from(src[c]) * t).round() as u8;
        }
    }
    out
}

/// Fills a rectangle, clipped to the image.
///
/// # Arguments
/// * `image` - Frame to draw on.
/// * `x`, `y` - Top-left corner in pixels.
/// * `width`, `height` - Size in pixels; parts outside the frame are skipped.
/// * `color` - Fill colour, written without blending.
pub fn fill_rect(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x1 = x.saturating_add(width).min(image.width());
    let y1 = y.saturating_add(height).min(image.height());
    for py in y..y1 {
        for px in x..x1 {
            image.put_pixel(px, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn opaque_iris_replaces_pixels() {
        let mut bg = RgbaImage::from_pixel(4, 4, WHITE);
        let iris = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        overlay_iris(&mut bg, &iris, 1, 1, 1.0);
        assert_eq!(bg.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
        assert_eq!(bg.get_pixel(2, 2), &Rgba([0, 0, 0, 255]));
        assert_eq!(bg.get_pixel(0, 0), &WHITE);
        assert_eq!(bg.get_pixel(3, 3), &WHITE);
    }

    #[test]
    fn transparency_and_opacity_blend() {
        let mut bg = RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 255]));
        let iris = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        overlay_iris(&mut bg, &iris, 0, 0, 0.5);
        assert_eq!(bg.get_pixel(0, 0), &Rgba([100, 100, 100, 255]));

        let clear = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        overlay_iris(&mut bg, &clear, 0, 0, 1.0);
        assert_eq!(bg.get_pixel(0, 0), &Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn iris_is_clipped_at_every_edge() {
        let mut bg = RgbaImage::from_pixel(3, 3, WHITE);
        let iris = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        overlay_iris(&mut bg, &iris, -1, -1, 1.0);
        assert_eq!(bg.get_pixel(0, 0)[0], 0);
        assert_eq!(bg.get_pixel(1, 1)[0], 255);
        overlay_iris(&mut bg, &iris, 2, 2, 1.0);
        assert_eq!(bg.get_pixel(2, 2)[0], 0);
        overlay_iris(&mut bg, &iris, 10, 10, 1.0);
        overlay_iris(&mut bg, &iris, -5, 0, 1.0);
    }

    #[test]
    fn blink_darkens_lids() {
        let mut frame = RgbaImage::from_pixel(2, 20, Rgba([100, 100, 100, 255]));
        blink_overlay(&mut frame, 1.0);
        // Upper lid: 10 rows at 20 %, lower lid: 6 rows at 30 %.
        assert_eq!(frame.get_pixel(0, 0)[0], 20);
        assert_eq!(frame.get_pixel(0, 9)[0], 20);
        assert_eq!(frame.get_pixel(0, 10)[0], 100);
        assert_eq!(frame.get_pixel(0, 13)[0], 100);
        assert_eq!(frame.get_pixel(0, 14)[0], 30);
        assert_eq!(frame.get_pixel(1, 19)[3], 255);
    }

    #[test]
    fn open_eye_is_untouched() {
        let original = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        let mut frame = original.clone();
        blink_overlay(&mut frame, 0.0);
        assert_eq!(frame, original);
    }

    #[test]
    fn crossfade_midpoint() {
        let a = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let b = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 255]));
        assert_eq!(crossfade(&a, &b, 0.5).get_pixel(0, 0), &Rgba([100, 50, 25, 255]));
        assert_eq!(crossfade(&a, &b, 0.0), a);
    }

    #[test]
    fn rectangles_are_clipped() {
        let mut image = RgbaImage::new(4, 4);
        fill_rect(&mut image, 2, 2, 10, 10, WHITE);
        assert_eq!(image.get_pixel(3, 3), &WHITE);
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }
}
