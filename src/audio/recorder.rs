/*
 * @file recorder.rs
 * @brief Voice-activity recording
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

//! Voice-activity recording: noise calibration, start/end hysteresis,
//! pre-roll and post-silence padding.
//!
//! Time is counted in chunks (`chunk_frames / sample_rate` seconds each), so
//! the same input always yields the same recording.

use std::collections::VecDeque;

use tracing::debug;

use super::wav::rms;
use crate::error::Result;

/// Noise floor assumed when calibration captured nothing.
const DEFAULT_NOISE_FLOOR: f32 = 50.0;

/// Lowest RMS level that may start speech.
const MIN_START_THRESHOLD: f32 = 150.0;

/// Lowest RMS level below which speech may end.
const MIN_END_THRESHOLD: f32 = 100.0;

/// End threshold as a share of the start boost.
const END_THRESHOLD_RATIO: f32 = 0.55;

/// A blocking source of fixed-size PCM chunks (a microphone or a test script).
pub trait ChunkSource {
    /// Blocks until the next chunk of `chunk_frames()` samples is available.
    fn read_chunk(&mut self) -> Result<Vec<i16>>;

    /// Samples per chunk.
    fn chunk_frames(&self) -> usize;

    /// Sample rate in Hertz.
    fn sample_rate(&self) -> u32;

    /// Drops audio captured before this call, if the source buffers any.
    fn discard_pending(&mut self) {}
}

/// Tuning for [`record_until_silence`].
#[derive(Clone, Debug, PartialEq)]
pub struct VadParams {
    /// Hard cap in seconds, not counting calibration.
    pub max_duration: f64,
    /// Seconds spent measuring ambient noise before listening.
    pub noise_calib_duration: f64,
    /// Consecutive loud chunks needed to start speech.
    pub start_frames: usize,
    /// Consecutive quiet chunks needed to end speech.
    pub end_frames: usize,
    /// Extra seconds captured after the end is detected.
    pub post_silence_hold: f64,
    /// Milliseconds of calibration audio kept before the recording.
    pub pre_roll_ms: u32,
    /// Seconds of speech required before an end may be detected.
    pub min_speech_after_start: f64,
    /// Multiplier applied to the noise floor to form the thresholds.
    pub threshold_boost: f32,
}

impl VadParams {
    /// Settings for a full user utterance.
    pub fn utterance() -> Self {
        Self {
            max_duration: 25.0,
            noise_calib_duration: 0.8,
            start_frames: 3,
            end_frames: 18,
            post_silence_hold: 0.35,
            pre_roll_ms: 350,
            min_speech_after_start: 1.8,
            threshold_boost: 3.0,
        }
    }

    /// Short window used to catch "stop" while the robot is talking.
    pub fn barge_in() -> Self {
        Self {
            max_duration: 1.3,
            noise_calib_duration: 0.0,
            start_frames: 2,
            end_frames: 8,
            post_silence_hold: 0.0,
            pre_roll_ms: 200,
            min_speech_after_start: 0.2,
            threshold_boost: 0.0,
        }
    }
}

impl Default for VadParams {
    fn default() -> Self {
        Self::utterance()
    }
}

/// Converts seconds into a whole number of chunks, rounding up.
fn seconds_to_chunks(seconds: f64, rate: u32, chunk: usize) -> usize {
    if seconds <= 0.0 || chunk == 0 {
        return 0;
    }
    (seconds * rate as f64 / chunk as f64 - 1e-4).ceil().max(0.0) as usize
}

/// Records until real silence follows speech.
///
/// # Details
/// Ambient noise is measured first; speech starts after `start_frames`
/// consecutive chunks above `max(150, floor * boost)` and ends after
/// `end_frames` consecutive chunks below `max(100, floor * boost * 0.55)`,
/// once at least `min_speech_after_start` seconds have passed.
///
/// # Returns
/// Pre-roll plus the recorded speech, or an empty vector when nobody spoke
/// before `max_duration` ran out.
///
/// # Errors
/// Propagates read failures from the source.
pub fn record_until_silence<S: ChunkSource + ?Sized>(
    source: &mut S,
    params: &VadParams,
) -> Result<Vec<i16>> {
    let rate = source.sample_rate();
    let chunk = source.chunk_frames().max(1);

    let pre_roll_samples = rate as usize * params.pre_roll_ms as usize / 1000;
    let pre_roll_chunks = (pre_roll_samples / chunk).max(1);
    let mut pre_roll: VecDeque<Vec<i16>> = VecDeque::with_capacity(pre_roll_chunks);

    let calib_chunks = seconds_to_chunks(params.noise_calib_duration, rate, chunk);
    let mut noise = Vec::with_capacity(calib_chunks);
    for _ in 0..calib_chunks {
        let data = source.read_chunk()?;
        noise.push(rms(&data));
        if pre_roll.len() == pre_roll_chunks {
            pre_roll.pop_front();
        }
        pre_roll.push_back(data);
    }

    let noise_floor = if noise.is_empty() {
        DEFAULT_NOISE_FLOOR
    } else {
        noise.iter().sum::<f32>() / noise.len() as f32
    };
    let start_threshold = MIN_START_THRESHOLD.max(noise_floor * params.threshold_boost);
    let end_threshold =
        MIN_END_THRESHOLD.max(noise_floor * params.threshold_boost * END_THRESHOLD_RATIO);
    debug!(noise_floor, start_threshold, end_threshold, "VAD calibrated");

    let max_chunks = seconds_to_chunks(params.max_duration, rate, chunk);
    let min_speech_chunks = seconds_to_chunks(params.min_speech_after_start, rate, chunk);
    let hold_samples = (rate as f64 * params.post_silence_hold) as usize;
    let hold_chunks = (hold_samples / chunk).max(1);

    let mut frames: Vec<i16> = pre_roll.into_iter().flatten().collect();
    let mut speech_start: Option<usize> = None;
    let mut over = 0;
    let mut under = 0;
    let mut read = 0;

    while read < max_chunks {
        let data = source.read_chunk()?;
        let level = rms(&data);
        frames.extend_from_slice(&data);
        let index = read;
        read += 1;

        match speech_start {
            None => {
                if level >= start_threshold {
                    over += 1;
                    if over >= params.start_frames {
                        speech_start = Some(index);
                        under = 0;
                    }
                } else {
                    over = 0;
                }
            }
            Some(start) => {
                if level < end_threshold {
                    under += 1;
                } else {
                    under = 0;
                }
                if index - start >= min_speech_chunks && under >= params.end_frames {
                    for _ in 0..hold_chunks {
                        if read >= max_chunks {
                            break;
                        }
                        frames.extend(source.read_chunk()?);
                        read += 1;
                    }
                    break;
                }
            }
        }
    }

    if speech_start.is_none() {
        debug!(chunks = read, "no speech detected");
        return Ok(Vec::new());
    }
    Ok(frames)
}

/// Records a fixed duration of audio.
///
/// # Errors
/// Propagates read failures from the source.
pub fn record_fixed<S: ChunkSource + ?Sized>(source: &mut S, seconds: f64) -> Result<Vec<i16>> {
    let chunk = source.chunk_frames().max(1);
    let total = (source.sample_rate() as f64 * seconds / chunk as f64) as usize;
    let mut frames = Vec::with_capacity(total * chunk);
    for _ in 0..total {
        frames.extend(source.read_chunk()?);
    }
    Ok(frames)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Replays a script of per-chunk amplitudes, then a constant floor.
    pub(crate) struct ScriptedSource {
        pub script: VecDeque<i16>,
        pub floor: i16,
        pub reads: usize,
        pub chunk: usize,
        pub rate: u32,
    }

    impl ScriptedSource {
        pub fn new(script: impl IntoIterator<Item = i16>, floor: i16) -> Self {
            Self {
                script: script.into_iter().collect(),
                floor,
                reads: 0,
                chunk: 100,
                rate: 1000,
            }
        }
    }

    impl ChunkSource for ScriptedSource {
        fn read_chunk(&mut self) -> Result<Vec<i16>> {
            self.reads += 1;
            let amp = self.script.pop_front().unwrap_or(self.floor);
            Ok((0..self.chunk)
                .map(|i| if i % 2 == 0 { amp } else { -amp })
                .collect())
        }

        fn chunk_frames(&self) -> usize {
            self.chunk
        }

        fn sample_rate(&self) -> u32 {
            self.rate
        }
    }

    fn script(parts: &[(i16, usize)]) -> Vec<i16> {
        parts
            .iter()
            .flat_map(|&(amp, n)| std::iter::repeat_n(amp, n))
            .collect()
    }

    #[test]
    fn silence_returns_nothing_after_max_duration() {
        let mut source = ScriptedSource::new([], 20);
        let pcm = record_until_silence(&mut source, &VadParams::utterance()).expect("record");
        assert!(pcm.is_empty());
        assert_eq!(source.reads, 8 + 250);
    }

    #[test]
    fn utterance_keeps_pre_roll_and_hold() {
        // 8 calibration chunks, 2 quiet, 30 loud, then quiet.
        let mut source = ScriptedSource::new(script(&[(20, 10), (1000, 30)]), 20);
        let pcm = record_until_silence(&mut source, &VadParams::utterance()).expect("record");
        // Speech starts at main chunk 4, ends after 18 quiet chunks (index 49),
        // then 3 hold chunks: 53 main chunks plus 3 pre-roll chunks.
        assert_eq!(source.reads, 8 + 53);
        assert_eq!(pcm.len(), (3 + 53) * 100);
    }

    #[test]
    fn short_burst_does_not_start_speech() {
        let mut source = ScriptedSource::new(script(&[(20, 10), (1000, 2)]), 20);
        let pcm = record_until_silence(&mut source, &VadParams::utterance()).expect("record");
        assert!(pcm.is_empty());
    }

    #[test]
    fn loud_room_raises_threshold() {
        // Floor of 400 puts the start threshold at 1200.
        let mut source = ScriptedSource::new(script(&[(400, 8), (1000, 20)]), 400);
        let pcm = record_until_silence(&mut source, &VadParams::utterance()).expect("record");
        assert!(pcm.is_empty());
    }

    #[test]
    fn barge_in_window_is_capped() {
        let mut source = ScriptedSource::new(script(&[(3000, 40)]), 0);
        let pcm = record_until_silence(&mut source, &VadParams::barge_in()).expect("record");
        assert_eq!(source.reads, 13);
        assert_eq!(pcm.len(), 13 * 100);
    }

    #[test]
    fn barge_in_silence_is_empty() {
        let mut source = ScriptedSource::new([], 0);
        let pcm = record_until_silence(&mut source, &VadParams::barge_in()).expect("record");
        assert!(pcm.is_empty());
        assert_eq!(source.reads, 13);
    }

    #[test]
    fn fixed_recording_reads_whole_chunks() {
        let mut source = ScriptedSource::new([], 5);
        let pcm = record_fixed(&mut source, 0.55).expect("record");
        assert_eq!(source.reads, 5);
        assert_eq!(pcm.len(), 500);
    }

    #[test]
    fn chunk_conversion_rounds_up() {
        assert_eq!(seconds_to_chunks(1.8, 1000, 100), 18);
        assert_eq!(seconds_to_chunks(0.25, 1000, 100), 3);
        assert_eq!(seconds_to_chunks(0.0, 1000, 100), 0);
        assert_eq!(seconds_to_chunks(25.0, 16_000, 256), 1563);
    }
}
