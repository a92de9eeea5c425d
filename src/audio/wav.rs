/*
 * @file wav.rs
 * @brief WAV and PCM helpers
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

//! In-memory WAV encoding/decoding and PCM helpers.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, RobotError};

/// Bits per sample for every WAV the robot writes.
const BITS_PER_SAMPLE: u16 = 16;

/// Encodes 16-bit PCM samples as a complete WAV file in memory.
///
/// # Arguments
/// * `pcm` - Interleaved signed 16-bit samples.
/// * `sample_rate` - Sample rate in Hertz.
/// * `channels` - Number of interleaved channels.
///
/// # Errors
/// Returns an error if the WAV header or samples cannot be written.
pub fn pcm_to_wav(pcm: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in pcm {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decodes a 16-bit WAV file into mono PCM.
///
/// # Details
/// Multi-channel input is averaged down to one channel.
///
/// # Returns
/// The mono samples and the file's sample rate.
///
/// # Errors
/// Returns [`RobotError::InvalidAudio`] for anything but 16-bit integer PCM.
pub fn wav_to_pcm(bytes: &[u8]) -> Result<(Vec<i16>, u32)> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.bits_per_sample != BITS_PER_SAMPLE || spec.sample_format != SampleFormat::Int {
        return Err(RobotError::InvalidAudio(format!(
            "expected 16-bit PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((downmix(&samples, spec.channels), spec.sample_rate))
}

/// Averages interleaved frames down to mono.
pub fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

/// Root-mean-square amplitude of a block of samples (0 for an empty block).
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy = samples
        .iter()
        .map(|&sample| (sample as f64).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    energy.sqrt() as f32
}

/// Multiplies every sample by `factor`, saturating at the i16 range.
pub fn scale_volume(samples: &mut [i16], factor: f32) {
    for sample in samples.iter_mut() {
        let scaled = (*sample as f32 * factor).round();
        *sample = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
}

/// Linearly resamples mono PCM from one rate to another.
pub fn resample(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    (0..output_len)
        .map(|i| sample_at_position(input, i as f64 * ratio))
        .collect()
}

/// Linear resampler for a continuous stream fed in arbitrary blocks.
///
/// # Details
/// The read position and the last input sample carry over between calls,
/// so block boundaries neither drop fractional samples nor leave seams.
#[derive(Debug)]
pub struct StreamResampler {
    step: f64,
    position: f64,
    previous: Option<i16>,
}

impl StreamResampler {
    /// Creates a resampler from `from_rate` to `to_rate` Hertz.
    ///
    /// # Arguments
    /// * `from_rate` - Rate of the incoming blocks.
    /// * `to_rate` - Rate of the produced samples.
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let step = if from_rate == 0 || to_rate == 0 {
            1.0
        } else {
            from_rate as f64 / to_rate as f64
        };
        Self {
            step,
            position: 0.0,
            previous: None,
        }
    }

    /// Resamples the next block of the stream.
    ///
    /// # Returns
    /// Every output sample whose interpolation points are already known;
    /// the rest is produced by the following call.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        if self.step == 1.0 || input.is_empty() {
            return input.to_vec();
        }
        let previous = self.previous.unwrap_or(input[0]);
        let at = |index: isize| if index < 0 { previous } else { input[index as usize] };
        let last = (input.len() - 1) as f64;
        let mut output = Vec::with_capacity((input.len() as f64 / self.step) as usize + 1);
        // Position -1 refers to the last sample of the previous block.
        while self.position < last {
            let base = self.position.floor();
            let frac = self.position - base;
            let a = f64::from(at(base as isize));
            let b = f64::from(at(base as isize + 1));
            output.push((a + (b - a) * frac).round() as i16);
            self.position += self.step;
        }
        self.position -= input.len() as f64;
        self.previous = input.last().copied();
        output
    }
}

fn sample_at_position(input: &[i16], pos: f64) -> i16 {
    let idx = pos as usize;
    if idx + 1 < input.len() {
        let frac = pos - idx as f64;
        (input[idx] as f64 * (1.0 - frac) + input[idx + 1] as f64 * frac).round() as i16
    } else {
        input.get(idx).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| (i * 10) as i16).collect()
    }

    #[test]
    fn stream_resampler_is_seamless_across_blocks() {
        for from_rate in [48_000, 24_000] {
            let input = ramp(300);
            let whole = StreamResampler::new(from_rate, 16_000).process(&input);

            let mut chunked = StreamResampler::new(from_rate, 16_000);
            let pieces: Vec<i16> = input.chunks(7).flat_map(|block| chunked.process(block)).collect();

            assert_eq!(pieces, whole);
        }
    }

    #[test]
    fn stream_resampler_keeps_fractional_phase() {
        // 24 kHz -> 16 kHz reads every 1.5 input samples.
        let input = ramp(300);
        let mut resampler = StreamResampler::new(24_000, 16_000);
        let out: Vec<i16> = input.chunks(5).flat_map(|block| resampler.process(block)).collect();
        assert_eq!(out.len(), 200);
        assert_eq!(&out[..4], &[0, 15, 30, 45]);
        assert_eq!(out[199], 2985);
    }

    #[test]
    fn stream_resampler_passes_equal_rates_through() {
        let mut resampler = StreamResampler::new(16_000, 16_000);
        assert_eq!(resampler.process(&[1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn wav_bytes_start_with_riff_header() {
        let wav = pcm_to_wav(&[0, 1000, -1000], 16_000, 1).expect("encode");
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        let (pcm, _) = wav_to_pcm(&wav).expect("decode");
        assert_eq!(pcm, vec![0, 1000, -1000]);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let wav = pcm_to_wav(&[100, 300, -200, -400], 22_050, 2).expect("encode");
        let (pcm, rate) = wav_to_pcm(&wav).expect("decode");
        assert_eq!(rate, 22_050);
        assert_eq!(pcm, vec![200, -300]);
    }

    #[test]
    fn rejects_8_bit_audio() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 8,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).expect("writer");
            writer.write_sample(5i8).expect("sample");
            writer.finalize().expect("finalize");
        }
        let result = wav_to_pcm(&cursor.into_inner());
        assert!(matches!(result, Err(RobotError::InvalidAudio(_))));
    }

    #[test]
    fn garbage_is_not_a_wav() {
        assert!(wav_to_pcm(b"not a wav file at all").is_err());
    }

    #[test]
    fn rms_matches_constant_signal() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0; 64]), 0.0);
        assert!((rms(&[-300, 300, -300, 300]) - 300.0).abs() < 0.01);
    }

    #[test]
    fn volume_scaling_saturates() {
        let mut samples = [1000, -1000, 30_000, -30_000];
        scale_volume(&mut samples, 2.0);
        assert_eq!(samples, [2000, -2000, i16::MAX, i16::MIN]);
        scale_volume(&mut samples, 0.0);
        assert_eq!(samples, [0, 0, 0, 0]);
    }

    #[test]
    fn resample_halves_length() {
        let input: Vec<i16> = (0..100).collect();
        let out = resample(&input, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        assert_eq!(out[1], 2);
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }
}
