/*
 * @file image_eyes.rs
 * @brief Image eye model
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

//! `img` eye model: an iris image wandering over a background image.

use std::path::Path;
use std::time::Instant;

use image::RgbaImage;
use rand::Rng;
use tracing::info;

use super::canvas::{blink_overlay, overlay_iris};
use super::motion::{BlinkController, EyeMovementController};
use super::{Display, EyeState, FPS_TARGET, FrameClock};
use crate::error::Result;

pub const BACKGROUND_FILE: &str = "Eye-Background.png";
pub const IRIS_FILE: &str = "Eye-Ball.png";

/// Loads the background and iris PNGs from `resources`.
///
/// # Errors
/// Fails if either file is missing or cannot be decoded.
pub fn load_eye_images(resources: &Path) -> Result<(RgbaImage, RgbaImage)> {
    let background = image::open(resources.join(BACKGROUND_FILE))?.to_rgba8();
    let iris = image::open(resources.join(IRIS_FILE))?.to_rgba8();
    info!(
        background = ?background.dimensions(),
        iris = ?iris.dimensions(),
        "loaded eye images"
    );
    Ok((background, iris))
}

/// Frame composer for the image model.
pub struct ImageEyes {
    background: RgbaImage,
    iris: RgbaImage,
    blink: BlinkController,
    movement: EyeMovementController,
}

impl ImageEyes {
    /// Creates the composer with the iris centred and fresh blink timing.
    ///
    /// # Arguments
    /// * `background` - Full-screen eye background.
    /// * `iris` - Iris image drawn on top of it.
    /// * `now` - Time of the first frame.
    /// * `rng` - Source for the blink and gaze schedules.
    pub fn new<R: Rng + ?Sized>(background: RgbaImage, iris: RgbaImage, now: Instant, rng: &mut R) -> Self {
        Self {
            background,
            iris,
            blink: BlinkController::new(now, rng),
            movement: EyeMovementController::new(now, rng),
        }
    }

    /// Composes the next frame.
    ///
    /// # Arguments
    /// * `now` - Frame timestamp.
    /// * `state` - Shared flags (talking slows blinking, blinking may be off).
    /// * `rng` - Source for blink and gaze decisions.
    ///
    /// # Returns
    /// * `RgbaImage` - Background with the iris and eyelids applied.
    pub fn render<R: Rng + ?Sized>(&mut self, now: Instant, state: &EyeState, rng: &mut R) -> RgbaImage {
        let (x, y) = self.movement.update(now, rng);
        let amount = if state.blink_enabled() {
            self.blink.update(now, state.is_talking(), rng)
        } else {
            0.0
        };
        let mut frame = self.background.clone();
        overlay_iris(&mut frame, &self.iris, i64::from(x), i64::from(y), 1.0);
        blink_overlay(&mut frame, amount);
        frame
    }
}

/// Runs the image model until `state` is stopped.
pub fn run(display: &mut dyn Display, state: &EyeState, resources: &Path) -> Result<()> {
    let (background, iris) = load_eye_images(resources)?;
    let mut rng = rand::rng();
    let mut eyes = ImageEyes::new(background, iris, Instant::now(), &mut rng);
    let mut clock = FrameClock::new(FPS_TARGET);
    info!(fps = FPS_TARGET, "eye movement started");
    while state.is_running() {
        let now = clock.begin();
        let frame = eyes.render(now, state, &mut rng);
        display.present(&frame)?;
        clock.finish();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eyes::HeadlessDisplay;
    use image::Rgba;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assets() -> (RgbaImage, RgbaImage) {
        (
            RgbaImage::from_pixel(800, 480, Rgba([255, 255, 255, 255])),
            RgbaImage::from_pixel(150, 150, Rgba([0, 0, 0, 255])),
        )
    }

    #[test]
    fn iris_starts_at_center() {
        let (bg, iris) = assets();
        let mut rng = StdRng::seed_from_u64(4);
        let now = Instant::now();
        let mut eyes = ImageEyes::new(bg, iris, now, &mut rng);
        let frame = eyes.render(now, &EyeState::default(), &mut rng);
        assert_eq!(frame.get_pixel(325, 225), &Rgba([0, 0, 0, 255]));
        assert_eq!(frame.get_pixel(474, 374), &Rgba([0, 0, 0, 255]));
        assert_eq!(frame.get_pixel(324, 225), &Rgba([255, 255, 255, 255]));
        assert_eq!(frame.get_pixel(475, 225), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn missing_assets_are_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_eye_images(dir.path()).is_err());
    }

    #[test]
    fn loads_assets_and_stops_with_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (bg, iris) = assets();
        bg.save(dir.path().join(BACKGROUND_FILE)).expect("save bg");
        iris.save(dir.path().join(IRIS_FILE)).expect("save iris");

        let state = EyeState::default();
        state.stop();
        let mut display = HeadlessDisplay::new((800, 480));
        run(&mut display, &state, dir.path()).expect("run");
        assert_eq!(display.frames(), 0);
        assert!(load_eye_images(dir.path()).is_ok());
    }
}
