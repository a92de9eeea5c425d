/*
 * @file tracker.rs
 * @brief Face tracking eye model
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

//! `track` eye model: the iris (and optionally the head) follows the user.
//!
//! Face detection runs outside this process and streams face centres as
//! text lines into `FACE_FEED` (a file or named pipe). Accepted lines are
//! `cx`, `cx,cy` or a JSON object with a `cx` field.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};
use image::RgbaImage;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::canvas::{blink_overlay, overlay_iris};
use super::image_eyes::load_eye_images;
use super::motion::{BlinkController, Gaze};
use super::servo::NeckServo;
use super::{Display, EyeState, FPS_TARGET, FrameClock};
use crate::config::Config;
use crate::error::Result;

const KP: f32 = 0.03;
const KI: f32 = 0.0;
const KD: f32 = 0.06;

/// Horizontal centre of the 640 px camera image.
const TARGET_X: f32 = 320.0;

/// Corrections inside this band keep the iris centred.
const GAZE_DEADBAND: i32 = 1;

/// Gap between detections after which the face counts as lost and the PID
/// starts over.
const FACE_LOST_AFTER: f32 = 1.5;

/// Face centre reported by the detector, in camera pixels.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct FacePosition {
    pub cx: f32,
    #[serde(default)]
    pub cy: Option<f32>,
}

/// Parses one feed line; blank or malformed lines yield `None`.
pub fn parse_face_line(line: &str) -> Option<FacePosition> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        return serde_json::from_str(line).ok();
    }
    let mut fields = line.split(',').map(str::trim);
    let cx = fields.next()?.parse().ok()?;
    let cy = match fields.next() {
        Some(raw) => Some(raw.parse().ok()?),
        None => None,
    };
    Some(FacePosition { cx, cy })
}

/// Source of face detections.
pub trait FaceSource {
    /// Most recent detection since the last poll, without blocking.
    fn poll(&mut self) -> Option<FacePosition>;
}

/// Reads a line feed on a background thread.
pub struct LineFeed {
    rx: Receiver<FacePosition>,
    closed: bool,
}

impl LineFeed {
    /// Follows the feed at `path`.
    ///
    /// The file is opened on the reader thread, so a named pipe without a
    /// writer does not stall rendering.
    pub fn open(path: &Path) -> Self {
        let path = path.to_path_buf();
        info!(path = %path.display(), "reading face feed");
        Self::spawn(move || File::open(&path))
    }

    /// Parses face lines from any reader.
    ///
    /// # Arguments
    /// * `reader` - Source of `x,y,w,h` lines, read on a background thread.
    ///
    /// # Returns
    /// * `LineFeed` - Closed once the reader hits end of input or an error.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::spawn(move || Ok(reader))
    }

    fn spawn<R, F>(open: F) -> Self
    where
        R: Read,
        F: FnOnce() -> std::io::Result<R> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let spawned = std::thread::Builder::new()
            .name("face-feed".into())
            .spawn(move || {
                let reader = match open() {
                    Ok(reader) => reader,
                    Err(err) => {
                        warn!(%err, "face feed unavailable, tracking disabled");
                        return;
                    }
                };
                for line in BufReader::new(reader).lines() {
                    let Ok(line) = line else { break };
                    match parse_face_line(&line) {
                        Some(face) => {
                            if tx.send(face).is_err() {
                                break;
                            }
                        }
                        None => debug!(%line, "ignoring face feed line"),
                    }
                }
            });
        if let Err(err) = spawned {
            warn!(%err, "face feed thread failed to start");
        }
        Self { rx, closed: false }
    }
}

impl FaceSource for LineFeed {
    fn poll(&mut self) -> Option<FacePosition> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(face) => latest = Some(face),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        info!("face feed closed");
                        self.closed = true;
                    }
                    break;
                }
            }
        }
        latest
    }
}

/// PID controller with time-scaled integral and derivative terms.
#[derive(Debug)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    target: f32,
    integral: f32,
    previous_error: Option<f32>,
}

impl Pid {
    /// Creates a controller with no history.
    ///
    /// # Arguments
    /// * `kp`, `ki`, `kd` - Proportional, integral and derivative gains.
    /// * `target` - Set point the measured value is steered towards.
    pub fn new(kp: f32, ki: f32, kd: f32, target: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            target,
            integral: 0.0,
            previous_error: None,
        }
    }

    /// Feeds a measurement taken `dt` seconds after the previous one.
    ///
    /// # Returns
    /// The correction. The first sample after [`Pid::new`] or
    /// [`Pid::reset`] has no derivative term.
    pub fn update(&mut self, value: f32, dt: f32) -> f32 {
        let dt = dt.max(1e-3);
        let error = value - self.target;
        self.integral += self.ki * error * dt;
        let derivative = self
            .previous_error
            .map_or(0.0, |previous| self.kd * (error - previous) / dt);
        self.previous_error = Some(error);
        self.kp * error + self.integral + derivative
    }

    /// Forgets the accumulated history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
    }
}

/// Maps face positions to a gaze and servo corrections.
pub struct FaceTracker {
    pid: Pid,
    flip: bool,
    gaze: Gaze,
    servo: Option<NeckServo>,
}

impl FaceTracker {
    /// Creates a tracker looking straight ahead.
    ///
    /// # Arguments
    /// * `flip` - Mirror the camera image (swaps left and right).
    /// * `servo` - Neck servo to drive, if one is connected.
    pub fn new(flip: bool, servo: Option<NeckServo>) -> Self {
        Self {
            pid: Pid::new(KP, KI, KD, TARGET_X),
            flip,
            gaze: Gaze::Center,
            servo,
        }
    }

    /// Current iris direction.
    pub fn gaze(&self) -> Gaze {
        self.gaze
    }

    /// Reacts to one detection.
    ///
    /// # Arguments
    /// * `face` - Detected face centre.
    /// * `dt` - Seconds since the previous detection; a gap longer than
    ///   1.5 s restarts the PID.
    ///
    /// # Returns
    /// The PID correction that was applied.
    pub fn observe(&mut self, face: FacePosition, dt: f32) -> i32 {
        if dt > FACE_LOST_AFTER {
            self.pid.reset();
        }
        let correction = self.pid.update(face.cx, dt) as i32;
        self.gaze = if correction > GAZE_DEADBAND {
            if self.flip { Gaze::Right } else { Gaze::Left }
        } else if correction < -GAZE_DEADBAND {
            if self.flip { Gaze::Left } else { Gaze::Right }
        } else {
            Gaze::Center
        };
        if let Some(servo) = self.servo.as_mut() {
            if let Err(err) = servo.nudge(correction) {
                warn!(%err, "servo update failed");
            }
        }
        correction
    }
}

/// Composes a frame with the iris at `gaze`.
fn compose(background: &RgbaImage, iris: &RgbaImage, gaze: Gaze, blink: f32) -> RgbaImage {
    let (x, y) = gaze.position();
    let mut frame = background.clone();
    overlay_iris(&mut frame, iris, x as i64, y as i64, 1.0);
    blink_overlay(&mut frame, blink);
    frame
}

/// Runs face tracking until `state` is stopped.
///
/// # Details
/// Without a `FACE_FEED` the iris stays centred. A servo is driven only
/// when `SERVO_PORT` is set and the port opens; it is centred on exit.
pub fn run(display: &mut dyn Display, state: &EyeState, config: &Config) -> Result<()> {
    let (background, iris) = load_eye_images(&config.resources_dir)?;
    let mut source: Option<Box<dyn FaceSource>> = match &config.face_feed {
        Some(path) => Some(Box::new(LineFeed::open(path))),
        None => {
            warn!("FACE_FEED is not set, iris stays centred");
            None
        }
    };
    let servo = config
        .servo_port
        .as_deref()
        .and_then(|port| match NeckServo::open(port, config.servo_baud) {
            Ok(servo) => Some(servo),
            Err(err) => {
                warn!(%err, port, "servo not available");
                None
            }
        });
    info!(
        camera = config.camera_index,
        servo = servo.is_some(),
        flip = config.camera_flip,
        "face tracking started"
    );

    let mut tracker = FaceTracker::new(config.camera_flip, servo);
    let mut rng = rand::rng();
    let mut blink = BlinkController::new(Instant::now(), &mut rng);
    let mut clock = FrameClock::new(FPS_TARGET);
    let mut last_seen = Instant::now();

    while state.is_running() {
        let now = clock.begin();
        if let Some(face) = source.as_mut().and_then(|s| s.poll()) {
            tracker.observe(face, now.duration_since(last_seen).as_secs_f32());
            last_seen = now;
        }
        let amount = if state.blink_enabled() {
            blink.update(now, state.is_talking(), &mut rng)
        } else {
            0.0
        };
        display.present(&compose(&background, &iris, tracker.gaze(), amount))?;
        clock.finish();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::{Cursor, Write};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CaptureServo(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureServo {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn feed_line_formats() {
        assert_eq!(
            parse_face_line("412"),
            Some(FacePosition { cx: 412.0, cy: None })
        );
        assert_eq!(
            parse_face_line(" 100.5, 240 "),
            Some(FacePosition {
                cx: 100.5,
                cy: Some(240.0)
            })
        );
        assert_eq!(
            parse_face_line(r#"{"cx": 320, "cy": 10}"#),
            Some(FacePosition {
                cx: 320.0,
                cy: Some(10.0)
            })
        );
        assert_eq!(parse_face_line(""), None);
        assert_eq!(parse_face_line("left"), None);
        assert_eq!(parse_face_line("10,abc"), None);
        assert_eq!(parse_face_line(r#"{"cy": 1}"#), None);
    }

    #[test]
    fn pid_terms() {
        let mut pid = Pid::new(KP, KI, KD, TARGET_X);
        // First sample: proportional only.
        assert!((pid.update(420.0, 0.5) - 3.0).abs() < 1e-4);
        // Error 100 -> 120: 0.03*120 + 0.06*20/0.5.
        assert!((pid.update(440.0, 0.5) - 6.0).abs() < 1e-4);
        // Same error again: derivative vanishes.
        assert!((pid.update(440.0, 0.5) - 3.6).abs() < 1e-4);
    }

    #[test]
    fn first_detection_has_no_derivative_kick() {
        let mut pid = Pid::new(KP, KI, KD, TARGET_X);
        assert!((pid.update(420.0, 0.033) - 3.0).abs() < 1e-4);

        let capture = CaptureServo::default();
        let mut tracker = FaceTracker::new(false, Some(NeckServo::from_writer(Box::new(capture.clone()))));
        assert_eq!(tracker.observe(FacePosition { cx: 420.0, cy: None }, 0.033), 3);
        assert_eq!(tracker.gaze(), Gaze::Left);
        // One small step instead of a jump to the clamp.
        assert_eq!(String::from_utf8_lossy(&capture.0.lock()), "$000000093");
    }

    #[test]
    fn lost_face_restarts_the_pid() {
        let face = |cx| FacePosition { cx, cy: None };
        let mut tracker = FaceTracker::new(false, None);
        assert_eq!(tracker.observe(face(420.0), 0.033), 3);
        // Long gap: treated as a fresh first sample.
        assert_eq!(tracker.observe(face(520.0), 2.0), 6);
        // Short gap: derivative applies again (0.03*300 + 0.06*100/0.5).
        assert_eq!(tracker.observe(face(620.0), 0.5), 21);
    }

    #[test]
    fn gaze_follows_face_side() {
        let face = |cx| FacePosition { cx, cy: None };

        let mut tracker = FaceTracker::new(false, None);
        assert!(tracker.observe(face(500.0), 1.0) > 1);
        assert_eq!(tracker.gaze(), Gaze::Left);
        tracker.observe(face(320.0), 1.0);
        assert_eq!(tracker.gaze(), Gaze::Right);

        let mut flipped = FaceTracker::new(true, None);
        flipped.observe(face(500.0), 1.0);
        assert_eq!(flipped.gaze(), Gaze::Right);

        let mut centred = FaceTracker::new(false, None);
        centred.observe(face(325.0), 1.0);
        assert_eq!(centred.gaze(), Gaze::Center);
    }

    #[test]
    fn line_feed_keeps_latest() {
        let mut feed = LineFeed::from_reader(Cursor::new("320\nbad\n400,200\n{\"cx\": 100}\n"));
        let mut latest = None;
        for _ in 0..200 {
            if let Some(face) = feed.poll() {
                latest = Some(face);
            }
            if latest.map(|f| f.cx) == Some(100.0) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(latest.map(|f| f.cx), Some(100.0));
    }

    #[test]
    fn missing_feed_file_just_closes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut feed = LineFeed::open(&dir.path().join("absent"));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(feed.poll(), None);
    }

    #[test]
    fn frame_has_iris_at_gaze() {
        let background = RgbaImage::from_pixel(600, 400, image::Rgba([255, 255, 255, 255]));
        let iris = RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 0, 255]));
        let frame = compose(&background, &iris, Gaze::Left, 0.0);
        assert_eq!(frame.get_pixel(250, 225)[0], 0);
        assert_eq!(frame.get_pixel(325, 225)[0], 255);
    }
}
