/*
 * @file display.rs
 * @brief Framebuffer and headless displays
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

//! Output surfaces for the eye renderers.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::error::{Result, RobotError};

/// Headless snapshots are refreshed once per this many frames.
const SNAPSHOT_INTERVAL: u64 = 30;

/// A screen the eyes are drawn on.
pub trait Display: Send {
    /// Visible resolution in pixels.
    fn size(&self) -> (u32, u32);

    /// Shows one frame. Frames of a different size are scaled to fit.
    fn present(&mut self, frame: &RgbaImage) -> Result<()>;
}

/// Pixel layout of a framebuffer device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferLayout {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Bytes per row, which may exceed `width * bytes_per_pixel`.
    pub stride: usize,
}

impl FramebufferLayout {
    /// Reads the layout from the device's sysfs directory
    /// (`virtual_size`, `bits_per_pixel`, `stride`).
    pub fn from_sysfs(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<String> {
            Ok(fs::read_to_string(dir.join(name))?.trim().to_string())
        };
        let (width, height) = parse_virtual_size(&read("virtual_size")?)
            .ok_or_else(|| RobotError::Display("malformed virtual_size".into()))?;
        let bits_per_pixel: u32 = read("bits_per_pixel")?
            .parse()
            .map_err(|_| RobotError::Display("malformed bits_per_pixel".into()))?;
        if bits_per_pixel != 32 && bits_per_pixel != 16 {
            return Err(RobotError::Display(format!(
                "unsupported framebuffer depth {bits_per_pixel} bpp"
            )));
        }
        let packed = width as usize * (bits_per_pixel as usize / 8);
        let stride = match read("stride") {
            Ok(raw) => raw.parse().unwrap_or(packed),
            Err(_) => packed,
        };
        Ok(Self {
            width,
            height,
            bits_per_pixel,
            stride: stride.max(packed),
        })
    }
}

/// Parses sysfs `virtual_size`, e.g. `"800,480"`.
fn parse_virtual_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Converts a frame into raw framebuffer bytes.
///
/// # Details
/// 32 bpp devices get BGRA, 16 bpp devices get little-endian RGB565. The
/// frame is shifted left by `x_offset` pixels; uncovered pixels stay black.
pub fn encode_frame(frame: &RgbaImage, layout: &FramebufferLayout, x_offset: u32) -> Vec<u8> {
    let bytes_per_pixel = layout.bits_per_pixel as usize / 8;
    let mut out = vec![0u8; layout.stride * layout.height as usize];
    let rows = layout.height.min(frame.height());
    for y in 0..rows {
        let row = &mut out[y as usize * layout.stride..];
        for x in 0..layout.width {
            let src_x = x + x_offset;
            if src_x >= frame.width() {
                break;
            }
            let [r, g, b, a] = frame.get_pixel(src_x, y).0;
            let at = x as usize * bytes_per_pixel;
            if bytes_per_pixel == 4 {
                row[at..at + 4].copy_from_slice(&[b, g, r, a]);
            } else {
                let packed = (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3);
                row[at..at + 2].copy_from_slice(&packed.to_le_bytes());
            }
        }
    }
    out
}

/// Scales `frame` to `size` if needed.
pub(crate) fn fit(frame: &RgbaImage, size: (u32, u32)) -> Option<RgbaImage> {
    if frame.dimensions() == size {
        None
    } else {
        Some(imageops::resize(frame, size.0, size.1, FilterType::Triangle))
    }
}

/// Linux framebuffer (`/dev/fbN`) writer.
pub struct FramebufferDisplay {
    file: File,
    layout: FramebufferLayout,
    x_offset: u32,
}

impl FramebufferDisplay {
    /// Opens `device` and reads its layout from `/sys/class/graphics`.
    ///
    /// # Arguments
    /// * `device` - Framebuffer node, e.g. `/dev/fb0`.
    /// * `x_offset` - Horizontal shift (`SCREEN_MOVEMENT`) for multi-screen rigs.
    pub fn open(device: &Path, x_offset: u32) -> Result<Self> {
        let name = device
            .file_name()
            .ok_or_else(|| RobotError::Display(format!("bad framebuffer path {}", device.display())))?;
        let sysfs = PathBuf::from("/sys/class/graphics").join(name);
        Self::open_with_layout(device, FramebufferLayout::from_sysfs(&sysfs)?, x_offset)
    }

    /// Opens `device` with a known layout, skipping sysfs.
    ///
    /// # Arguments
    /// * `device` - Framebuffer node or any writable file.
    /// * `layout` - Geometry and pixel format to encode frames with.
    /// * `x_offset` - Horizontal shift for multi-screen rigs.
    ///
    /// # Errors
    /// Returns an error if `device` cannot be opened for writing.
    pub fn open_with_layout(device: &Path, layout: FramebufferLayout, x_offset: u32) -> Result<Self> {
        let file = OpenOptions::new().write(true).open(device)?;
        info!(
            device = %device.display(),
            width = layout.width,
            height = layout.height,
            bpp = layout.bits_per_pixel,
            "framebuffer opened"
        );
        Ok(Self {
            file,
            layout,
            x_offset,
        })
    }
}

impl Display for FramebufferDisplay {
    fn size(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }

    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        let scaled = fit(frame, self.size());
        let frame = scaled.as_ref().unwrap_or(frame);
        let bytes = encode_frame(frame, &self.layout, self.x_offset);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        Ok(())
    }
}

/// Display without a screen: keeps the last frame and counts presents.
pub struct HeadlessDisplay {
    size: (u32, u32),
    frames: u64,
    last: Option<RgbaImage>,
    snapshot: Option<PathBuf>,
}

impl HeadlessDisplay {
    /// Creates a display of the given size.
    ///
    /// # Arguments
    /// * `size` - Width and height reported to renderers.
    pub fn new(size: (u32, u32)) -> Self {
        debug!(width = size.0, height = size.1, "headless display");
        Self {
            size,
            frames: 0,
            last: None,
            snapshot: None,
        }
    }

    /// Periodically writes the current frame to `path` as PNG.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    /// Number of frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last.as_ref()
    }
}

impl Display for HeadlessDisplay {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        let frame = fit(frame, self.size).unwrap_or_else(|| frame.clone());
        if let Some(path) = &self.snapshot {
            if self.frames % SNAPSHOT_INTERVAL == 0 {
                if let Err(err) = frame.save(path) {
                    warn!(%err, path = %path.display(), "snapshot failed");
                }
            }
        }
        self.last = Some(frame);
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn virtual_size_parsing() {
        assert_eq!(parse_virtual_size("800,480\n"), Some((800, 480)));
        assert_eq!(parse_virtual_size("800x480"), None);
    }

    #[test]
    fn layout_from_sysfs() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("virtual_size"), "480,320\n").expect("write");
        fs::write(dir.path().join("bits_per_pixel"), "16\n").expect("write");
        let layout = FramebufferLayout::from_sysfs(dir.path()).expect("layout");
        assert_eq!(
            layout,
            FramebufferLayout {
                width: 480,
                height: 320,
                bits_per_pixel: 16,
                stride: 960
            }
        );

        fs::write(dir.path().join("bits_per_pixel"), "24").expect("write");
        assert!(FramebufferLayout::from_sysfs(dir.path()).is_err());
    }

    #[test]
    fn encodes_bgra_with_offset() {
        let mut frame = RgbaImage::new(3, 1);
        frame.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let layout = FramebufferLayout {
            width: 2,
            height: 1,
            bits_per_pixel: 32,
            stride: 12,
        };
        let bytes = encode_frame(&frame, &layout, 1);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &[30, 20, 10, 255]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn encodes_rgb565() {
        let frame = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 255, 255]));
        let layout = FramebufferLayout {
            width: 1,
            height: 1,
            bits_per_pixel: 16,
            stride: 2,
        };
        assert_eq!(encode_frame(&frame, &layout, 0), 0xF81Fu16.to_le_bytes().to_vec());
    }

    #[test]
    fn framebuffer_writes_whole_screen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let device = dir.path().join("fb0");
        fs::write(&device, b"").expect("create");
        let layout = FramebufferLayout {
            width: 4,
            height: 2,
            bits_per_pixel: 32,
            stride: 16,
        };
        let mut display = FramebufferDisplay::open_with_layout(&device, layout, 0).expect("open");
        let frame = RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 255]));
        display.present(&frame).expect("present");
        display.present(&frame).expect("present twice");
        let written = fs::read(&device).expect("read");
        assert_eq!(written.len(), 32);
        assert!(written.iter().all(|b| *b == 255));
    }

    #[test]
    fn headless_counts_and_scales() {
        let mut display = HeadlessDisplay::new((4, 2));
        display.present(&RgbaImage::new(8, 4)).expect("present");
        assert_eq!(display.frames(), 1);
        assert_eq!(display.last_frame().map(|f| f.dimensions()), Some((4, 2)));
    }

    #[test]
    fn headless_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("eyes.png");
        let mut display = HeadlessDisplay::new((2, 2)).with_snapshot(&path);
        display.present(&RgbaImage::new(2, 2)).expect("present");
        assert!(path.exists());
    }
}
