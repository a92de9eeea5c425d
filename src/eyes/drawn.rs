/*
 * @file drawn.rs
 * @brief Drawn block eye model
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

//! `draw` eye model: two white blocks on black that blink periodically.

use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tracing::info;

use super::canvas::fill_rect;
use super::{Display, EyeState};
use crate::error::Result;

const RENDER_W: u32 = 480;
const RENDER_H: u32 = 320;
const EYE_SIZE: u32 = 120;
const EYE_SPACING: u32 = 60;
const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const EYE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Time each blink stage stays on screen.
const BLINK_DELAY: Duration = Duration::from_millis(250);

/// Time between blinks.
const BLINK_PAUSE: Duration = Duration::from_millis(2500);

/// Lid stages of one blink: open, half, almost shut, half, open.
const BLINK_SEQUENCE: [BlinkStage; 5] = [
    BlinkStage::Open,
    BlinkStage::Half,
    BlinkStage::Closed,
    BlinkStage::Half,
    BlinkStage::Open,
];

/// Idle polling granularity while waiting for the next blink.
const IDLE_TICK: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlinkStage {
    Open,
    Half,
    Closed,
}

impl BlinkStage {
    fn height_factor(self) -> f32 {
        match self {
            Self::Open => 1.0,
            Self::Half => 0.5,
            Self::Closed => 0.1,
        }
    }
}

/// Renders both eyes at the given blink stage.
pub fn draw_eyes(stage: BlinkStage) -> RgbaImage {
    let mut frame = RgbaImage::from_pixel(RENDER_W, RENDER_H, BACKGROUND);
    let total_width = EYE_SIZE * 2 + EYE_SPACING;
    let start_x = (RENDER_W - total_width) / 2;
    let height = (EYE_SIZE as f32 * stage.height_factor()) as u32;
    let top = RENDER_H / 2 - height / 2;
    fill_rect(&mut frame, start_x, top, EYE_SIZE, height, EYE_COLOR);
    fill_rect(&mut frame, start_x + EYE_SIZE + EYE_SPACING, top, EYE_SIZE, height, EYE_COLOR);
    frame
}

/// Runs the drawn model until `state` is stopped.
pub fn run(display: &mut dyn Display, state: &EyeState) -> Result<()> {
    let open = draw_eyes(BlinkStage::Open);
    display.present(&open)?;
    info!("drawn eyes started");
    let mut last_blink = Instant::now();
    while state.is_running() {
        if last_blink.elapsed() >= BLINK_PAUSE {
            for stage in BLINK_SEQUENCE {
                display.present(&draw_eyes(stage))?;
                std::thread::sleep(BLINK_DELAY);
            }
            last_blink = Instant::now();
        } else {
            std::thread::sleep(IDLE_TICK);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eyes::HeadlessDisplay;

    fn white_rows(frame: &RgbaImage, x: u32) -> u32 {
        (0..frame.height())
            .filter(|y| frame.get_pixel(x, *y) == &EYE_COLOR)
            .count() as u32
    }

    #[test]
    fn open_eyes_layout() {
        let frame = draw_eyes(BlinkStage::Open);
        assert_eq!(frame.dimensions(), (480, 320));
        // Eyes span x 90..210 and 270..390.
        assert_eq!(frame.get_pixel(89, 160), &BACKGROUND);
        assert_eq!(frame.get_pixel(90, 160), &EYE_COLOR);
        assert_eq!(frame.get_pixel(209, 160), &EYE_COLOR);
        assert_eq!(frame.get_pixel(230, 160), &BACKGROUND);
        assert_eq!(frame.get_pixel(270, 160), &EYE_COLOR);
        assert_eq!(frame.get_pixel(390, 160), &BACKGROUND);
        assert_eq!(white_rows(&frame, 100), 120);
    }

    #[test]
    fn blink_stages_shrink_height() {
        assert_eq!(white_rows(&draw_eyes(BlinkStage::Half), 100), 60);
        assert_eq!(white_rows(&draw_eyes(BlinkStage::Closed), 100), 12);
    }

    #[test]
    fn stopped_state_draws_once() {
        let state = EyeState::default();
        state.stop();
        let mut display = HeadlessDisplay::new((480, 320));
        run(&mut display, &state).expect("run");
        assert_eq!(display.frames(), 1);
    }
}
