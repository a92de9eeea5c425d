/*
 * @file motion.rs
 * @brief Blink and gaze controllers
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

//! Blink and gaze controllers shared by the image-based eye models.
//!
//! Both controllers advance one step per rendered frame and take the
//! current time and a random source explicitly, so a seeded RNG and a
//! synthetic clock reproduce an animation exactly.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::seq::IndexedRandom;

/// Blink progress added per frame; a full blink spans 0.0..2.0.
const BLINK_SPEED: f32 = 0.15;

/// Chance that a blink is immediately followed by a second one.
const DOUBLE_BLINK_CHANCE: f64 = 0.1;

/// Transition progress added per frame.
const TRANSITION_SPEED: f32 = 0.08;

/// Chance to return to the centre after looking elsewhere.
const RETURN_TO_CENTER_CHANCE: f64 = 0.6;

/// Interval between micro-movement updates.
const MICRO_INTERVAL: Duration = Duration::from_millis(100);

/// Linear interpolation from `start` (`t = 0`) to `end` (`t = 1`).
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

/// Smoothstep easing on `0.0..=1.0`.
pub fn ease_in_out(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn random_duration<R: Rng + ?Sized>(rng: &mut R, min_secs: f64, max_secs: f64) -> Duration {
    Duration::from_secs_f64(rng.random_range(min_secs..max_secs))
}

/// Drives eyelid closure.
#[derive(Debug)]
pub struct BlinkController {
    blinking: bool,
    progress: f32,
    double_blink: bool,
    last_blink: Instant,
    interval: Duration,
}

impl BlinkController {
    /// Starts with open eyes and a first blink 2.5-5 s away.
    ///
    /// # Arguments
    /// * `now` - Reference time for the blink schedule.
    /// * `rng` - Source for the interval.
    pub fn new<R: Rng + ?Sized>(now: Instant, rng: &mut R) -> Self {
        Self {
            blinking: false,
            progress: 0.0,
            double_blink: false,
            last_blink: now,
            interval: random_duration(rng, 2.5, 5.0),
        }
    }

    /// Whether a blink is in progress.
    pub fn is_blinking(&self) -> bool {
        self.blinking
    }

    /// Advances one frame.
    ///
    /// # Arguments
    /// * `talking` - Blinks are spaced further apart (4-7 s) while speaking.
    ///
    /// # Returns
    /// Lid closure from `0.0` (open) to `1.0` (closed).
    pub fn update<R: Rng + ?Sized>(&mut self, now: Instant, talking: bool, rng: &mut R) -> f32 {
        if !self.blinking && now.duration_since(self.last_blink) >= self.interval {
            self.blinking = true;
            self.progress = 0.0;
            self.double_blink = rng.random_bool(DOUBLE_BLINK_CHANCE);
        }
        if !self.blinking {
            return 0.0;
        }

        self.progress += BLINK_SPEED;
        if self.progress >= 2.0 {
            self.progress = 0.0;
            if self.double_blink {
                self.double_blink = false;
            } else {
                self.blinking = false;
                self.last_blink = now;
                self.interval = if talking {
                    random_duration(rng, 4.0, 7.0)
                } else {
                    random_duration(rng, 2.5, 5.0)
                };
                return 0.0;
            }
        }
        if self.progress < 1.0 {
            ease_in_out(self.progress)
        } else {
            ease_in_out(2.0 - self.progress)
        }
    }
}

/// Named gaze directions with their iris positions on the eye background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gaze {
    Center,
    Right,
    Left,
    Up,
    Down,
    UpRight,
    UpLeft,
    DownRight,
    DownLeft,
}

impl Gaze {
    pub const ALL: [Gaze; 9] = [
        Gaze::Center,
        Gaze::Right,
        Gaze::Left,
        Gaze::Up,
        Gaze::Down,
        Gaze::UpRight,
        Gaze::UpLeft,
        Gaze::DownRight,
        Gaze::DownLeft,
    ];

    /// Top-left corner of the iris image for this gaze.
    pub fn position(self) -> (f32, f32) {
        match self {
            Gaze::Center => (325.0, 225.0),
            Gaze::Right => (400.0, 225.0),
            Gaze::Left => (250.0, 225.0),
            Gaze::Up => (325.0, 200.0),
            Gaze::Down => (325.0, 250.0),
            Gaze::UpRight => (380.0, 210.0),
            Gaze::UpLeft => (270.0, 210.0),
            Gaze::DownRight => (380.0, 240.0),
            Gaze::DownLeft => (270.0, 240.0),
        }
    }
}

/// Wandering gaze with eased transitions and small jitter.
#[derive(Debug)]
pub struct EyeMovementController {
    target: Gaze,
    current: (f32, f32),
    goal: (f32, f32),
    micro: (f32, f32),
    micro_at: Instant,
    transitioning: bool,
    progress: f32,
    last_move: Instant,
    hold: Duration,
}

impl EyeMovementController {
    /// Starts centred, holding still for 2-4 s.
    ///
    /// # Arguments
    /// * `now` - Reference time for the hold and micro-movements.
    /// * `rng` - Source for the hold duration.
    pub fn new<R: Rng + ?Sized>(now: Instant, rng: &mut R) -> Self {
        let center = Gaze::Center.position();
        Self {
            target: Gaze::Center,
            current: center,
            goal: center,
            micro: (0.0, 0.0),
            micro_at: now,
            transitioning: false,
            progress: 0.0,
            last_move: now,
            hold: random_duration(rng, 2.0, 4.0),
        }
    }

    /// Gaze the eye is at or moving towards.
    pub fn target(&self) -> Gaze {
        self.target
    }

    /// Whether the eye is easing towards a new gaze.
    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    /// Advances one frame and returns the iris position in pixels.
    pub fn update<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> (i32, i32) {
        if now.duration_since(self.micro_at) > MICRO_INTERVAL {
            self.micro = (rng.random_range(-2.0..=2.0), rng.random_range(-1.0..=1.0));
            self.micro_at = now;
        }

        if !self.transitioning && now.duration_since(self.last_move) >= self.hold {
            self.start_new_movement(now, rng);
        }

        if self.transitioning {
            self.progress += TRANSITION_SPEED;
            if self.progress >= 1.0 {
                self.transitioning = false;
                self.progress = 1.0;
                self.current = self.goal;
            } else {
                // Each frame closes an eased fraction of the remaining gap.
                let t = ease_in_out(self.progress);
                self.current = (
                    lerp(self.current.0, self.goal.0, t),
                    lerp(self.current.1, self.goal.1, t),
                );
            }
        }

        (
            (self.current.0 + self.micro.0) as i32,
            (self.current.1 + self.micro.1) as i32,
        )
    }

    fn start_new_movement<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) {
        let from = self.target;
        let next = if from != Gaze::Center && rng.random_bool(RETURN_TO_CENTER_CHANCE) {
            Gaze::Center
        } else {
            let others: Vec<Gaze> = Gaze::ALL.iter().copied().filter(|g| *g != from).collect();
            others.choose(rng).copied().unwrap_or(Gaze::Center)
        };
        self.begin_transition(next);
        self.last_move = now;
        self.hold = if next == Gaze::Center {
            random_duration(rng, 3.0, 5.0)
        } else {
            random_duration(rng, 2.0, 4.0)
        };
    }

    /// Starts moving towards `gaze` right away.
    pub fn look_at(&mut self, gaze: Gaze) {
        self.begin_transition(gaze);
    }

    fn begin_transition(&mut self, gaze: Gaze) {
        self.target = gaze;
        self.goal = gaze.position();
        self.transitioning = true;
        self.progress = 0.0;
    }
}
