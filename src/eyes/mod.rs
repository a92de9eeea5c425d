/*
 * @file mod.rs
 * @brief Eye renderer root
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

//! Eye renderers that animate the robot's face on its screen.
//!
//! Every model runs on its own thread and draws into a [`Display`]. The
//! assistant shares an [`EyeState`] with the renderer so it can mark the
//! robot as talking or ask the renderer to exit.

pub mod canvas;
pub mod display;
pub mod drawn;
pub mod image_eyes;
pub mod motion;
pub mod servo;
pub mod tracker;
pub mod video;

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::{Config, EyeModel, Settings};
use crate::error::Result;

pub use display::{Display, FramebufferDisplay, HeadlessDisplay};

/// Frame rate of the animated models.
pub const FPS_TARGET: u32 = 30;

#[derive(Debug)]
struct EyeFlags {
    running: bool,
    talking: bool,
    blink_enabled: bool,
}

/// Flags shared between the assistant and the eye thread.
#[derive(Debug)]
pub struct EyeState {
    flags: Mutex<EyeFlags>,
}

impl Default for EyeState {
    fn default() -> Self {
        Self::new(false)
    }
}

impl EyeState {
    /// Creates running flags with talking off.
    ///
    /// # Arguments
    /// * `blink_enabled` - Initial blink setting; the assistant turns it on.
    pub fn new(blink_enabled: bool) -> Self {
        Self {
            flags: Mutex::new(EyeFlags {
                running: true,
                talking: false,
                blink_enabled,
            }),
        }
    }

    /// `false` once [`EyeState::stop`] was called.
    pub fn is_running(&self) -> bool {
        self.flags.lock().running
    }

    /// Asks the renderer to leave its loop.
    pub fn stop(&self) {
        self.flags.lock().running = false;
    }

    /// Marks whether a reply is being spoken.
    pub fn set_talking(&self, talking: bool) {
        self.flags.lock().talking = talking;
    }

    pub fn is_talking(&self) -> bool {
        self.flags.lock().talking
    }

    pub fn set_blink_enabled(&self, enabled: bool) {
        self.flags.lock().blink_enabled = enabled;
    }

    pub fn blink_enabled(&self) -> bool {
        self.flags.lock().blink_enabled
    }
}

/// Sleeps away whatever is left of the current frame.
pub(crate) struct FrameClock {
    frame_time: Duration,
    started: Instant,
}

impl FrameClock {
    pub(crate) fn new(fps: u32) -> Self {
        Self {
            frame_time: Duration::from_secs(1) / fps.max(1),
            started: Instant::now(),
        }
    }

    /// Marks the start of a frame and returns its timestamp.
    pub(crate) fn begin(&mut self) -> Instant {
        self.started = Instant::now();
        self.started
    }

    pub(crate) fn finish(&self) {
        if let Some(rest) = self.frame_time.checked_sub(self.started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}

/// Opens the screen for `settings.device`.
///
/// # Details
/// Raspberry Pi profiles draw straight to the Linux framebuffer. Other
/// devices, or a framebuffer that cannot be opened, fall back to a headless
/// display that only counts frames.
pub fn open_display(settings: &Settings, config: &Config) -> Box<dyn Display> {
    let size = settings.device.display_size();
    if settings.device.has_framebuffer() {
        match FramebufferDisplay::open(&config.framebuffer, config.screen_movement) {
            Ok(display) => return Box::new(display),
            Err(err) => warn!(%err, path = %config.framebuffer.display(), "framebuffer unavailable, rendering headless"),
        }
    }
    Box::new(HeadlessDisplay::new(size))
}

/// Starts the renderer for `settings.eye_model` on a dedicated thread.
///
/// # Returns
/// `None` when no eye model is selected.
///
/// # Errors
/// Fails only if the thread cannot be spawned; renderer errors are logged
/// from inside the thread.
pub fn spawn(
    settings: &Settings,
    config: &Config,
    state: Arc<EyeState>,
) -> Result<Option<JoinHandle<()>>> {
    let model = settings.eye_model;
    if !model.is_enabled() {
        warn!("No eye model loaded, skipping eye thread");
        return Ok(None);
    }
    let mut display = open_display(settings, config);
    let config = config.clone();
    let handle = std::thread::Builder::new()
        .name("eyes".into())
        .spawn(move || {
            info!(model = model.as_str(), "eye thread started");
            if let Err(err) = run_model(model, display.as_mut(), &state, &config) {
                error!(%err, model = model.as_str(), "eye renderer stopped");
            }
            info!("eye thread exited");
        })?;
    Ok(Some(handle))
}

fn run_model(
    model: EyeModel,
    display: &mut dyn Display,
    state: &EyeState,
    config: &Config,
) -> Result<()> {
    let resources: &Path = &config.resources_dir;
    match model {
        EyeModel::Img => image_eyes::run(display, state, resources),
        EyeModel::Draw => drawn::run(display, state),
        EyeModel::Video => video::run(display, state, &resources.join(video::CLIP_DIR)),
        EyeModel::Track => tracker::run(display, state, config),
        EyeModel::Off => Ok(()),
    }
}
