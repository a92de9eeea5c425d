/*
 * @file video.rs
 * @brief Animated clip eye model
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

//! `video` eye model: looping animation clips per emotion.
//!
//! Clips are animated GIFs under `Resources/eye_videos`. Switching clips
//! cross-fades over half a second; the renderer switches to the talking
//! clip while the assistant speaks.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use tracing::{debug, info, warn};

use super::canvas::crossfade;
use super::{Display, EyeState, FPS_TARGET, FrameClock};
use crate::error::{Result, RobotError};

/// Clip directory under the resources root.
pub const CLIP_DIR: &str = "eye_videos";

/// Cross-fade speed in progress per second (0.5 s per switch).
const TRANSITION_RATE: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Clip {
    Idle,
    Talking,
    Blinking,
    LookingLeft,
    LookingRight,
}

impl Clip {
    pub const ALL: [Clip; 5] = [
        Clip::Idle,
        Clip::Talking,
        Clip::Blinking,
        Clip::LookingLeft,
        Clip::LookingRight,
    ];

    /// Name used in logs and by [`Clip::parse`].
    pub fn name(self) -> &'static str {
        match self {
            Clip::Idle => "idle",
            Clip::Talking => "talking",
            Clip::Blinking => "blinking",
            Clip::LookingLeft => "looking_left",
            Clip::LookingRight => "looking_right",
        }
    }

    /// GIF file holding this clip inside `eye_videos/`.
    pub fn file_name(self) -> &'static str {
        match self {
            Clip::Idle => "eyes_idle.gif",
            Clip::Talking => "eyes_talking.gif",
            Clip::Blinking => "eyes_blink.gif",
            Clip::LookingLeft => "eyes_left.gif",
            Clip::LookingRight => "eyes_right.gif",
        }
    }

    /// Looks up a clip by its [`Clip::name`].
    ///
    /// # Returns
    /// * `Option<Clip>` - `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|clip| clip.name() == name)
    }
}

/// Decoded frames of every clip that could be loaded.
#[derive(Default)]
pub struct ClipLibrary {
    clips: HashMap<Clip, Vec<RgbaImage>>,
}

impl ClipLibrary {
    /// Decodes every clip found in `dir`; missing or broken files are skipped.
    pub fn load(dir: &Path) -> Self {
        let mut library = Self::default();
        for clip in Clip::ALL {
            let path = dir.join(clip.file_name());
            if !path.exists() {
                warn!(clip = clip.name(), path = %path.display(), "clip not found");
                continue;
            }
            match decode_gif(&path) {
                Ok(frames) if frames.is_empty() => warn!(clip = clip.name(), "empty clip"),
                Ok(frames) => {
                    info!(clip = clip.name(), frames = frames.len(), "loaded clip");
                    library.insert(clip, frames);
                }
                Err(err) => warn!(%err, clip = clip.name(), "cannot decode clip"),
            }
        }
        info!(clips = library.clips.len(), "clip library ready");
        library
    }

    /// Adds or replaces a clip.
    ///
    /// # Arguments
    /// * `clip` - Clip to store.
    /// * `frames` - Decoded frames; an empty list is ignored.
    pub fn insert(&mut self, clip: Clip, frames: Vec<RgbaImage>) {
        if !frames.is_empty() {
            self.clips.insert(clip, frames);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn contains(&self, clip: Clip) -> bool {
        self.clips.contains_key(&clip)
    }

    /// Number of frames in `clip`, `0` when it was not loaded.
    pub fn frame_count(&self, clip: Clip) -> usize {
        self.clips.get(&clip).map_or(0, Vec::len)
    }

    /// Frame `index` of `clip`, wrapping around the clip length.
    pub fn frame(&self, clip: Clip, index: usize) -> Option<&RgbaImage> {
        let frames = self.clips.get(&clip)?;
        frames.get(index % frames.len())
    }
}

fn decode_gif(path: &Path) -> Result<Vec<RgbaImage>> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder.into_frames().collect_frames()?;
    Ok(frames.into_iter().map(|frame| frame.into_buffer()).collect())
}

/// Clip sequencer with cross-fade transitions.
pub struct VideoPlayer {
    library: ClipLibrary,
    current: Clip,
    next: Option<Clip>,
    progress: f32,
    index: usize,
    next_index: usize,
}

impl VideoPlayer {
    /// Starts on `initial`, or on any loaded clip if that one is missing.
    pub fn new(library: ClipLibrary, initial: Clip) -> Self {
        let current = if library.contains(initial) {
            initial
        } else {
            Clip::ALL
                .into_iter()
                .find(|clip| library.contains(*clip))
                .unwrap_or(initial)
        };
        Self {
            library,
            current,
            next: None,
            progress: 0.0,
            index: 0,
            next_index: 0,
        }
    }

    pub fn current(&self) -> Clip {
        self.current
    }

    pub fn is_transitioning(&self) -> bool {
        self.next.is_some()
    }

    /// Queues a cross-fade to `clip`.
    ///
    /// # Returns
    /// `false` when the clip is not loaded or already showing.
    pub fn set_clip(&mut self, clip: Clip) -> bool {
        if !self.library.contains(clip) || (self.next.is_none() && clip == self.current) {
            return false;
        }
        debug!(from = self.current.name(), to = clip.name(), "switching clip");
        self.next = Some(clip);
        self.progress = 0.0;
        self.next_index = 0;
        true
    }

    /// Advances by `dt` and returns the frame to show.
    pub fn advance(&mut self, dt: Duration) -> Option<RgbaImage> {
        if let Some(next) = self.next {
            self.progress += dt.as_secs_f32() * TRANSITION_RATE;
            if self.progress >= 1.0 {
                info!(clip = next.name(), "switched clip");
                self.current = next;
                self.index = self.next_index;
                self.next = None;
                self.progress = 0.0;
            }
        }

        let base = self.library.frame(self.current, self.index)?;
        let frame = match self.next.and_then(|next| self.library.frame(next, self.next_index)) {
            Some(incoming) => crossfade(base, incoming, self.progress),
            None => base.clone(),
        };

        self.index = (self.index + 1) % self.library.frame_count(self.current).max(1);
        if let Some(next) = self.next {
            self.next_index = (self.next_index + 1) % self.library.frame_count(next).max(1);
        }
        Some(frame)
    }
}

/// Runs the clip player until `state` is stopped.
///
/// # Errors
/// Fails when no clip at all could be loaded from `dir`.
pub fn run(display: &mut dyn Display, state: &EyeState, dir: &Path) -> Result<()> {
    let library = ClipLibrary::load(dir);
    if library.is_empty() {
        return Err(RobotError::Display(format!("no eye clips in {}", dir.display())));
    }
    let mut player = VideoPlayer::new(library, Clip::Idle);
    let mut clock = FrameClock::new(FPS_TARGET);
    let mut last = Instant::now();
    let mut talking = false;
    info!(clip = player.current().name(), "video player started");

    while state.is_running() {
        let now = clock.begin();
        let speaking = state.is_talking();
        if speaking != talking {
            talking = speaking;
            player.set_clip(if talking { Clip::Talking } else { Clip::Idle });
        }
        if let Some(frame) = player.advance(now.duration_since(last)) {
            display.present(&frame)?;
        }
        last = now;
        clock.finish();
    }
    Ok(())
}
