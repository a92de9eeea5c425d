/*
 * @file error.rs
 * @brief Crate error type
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

//! Crate-level error type for the speech services, codecs and devices.
//!
//! The assistant loop itself works with [`anyhow::Result`]; the lower layers
//! return [`RobotError`] so callers can match on the failure kind.

use thiserror::Error;

/// Convenience alias used by the library modules.
pub type Result<T> = std::result::Result<T, RobotError>;

/// Failures raised by audio, speech, serial and display helpers.
#[derive(Debug, Error)]
pub enum RobotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    #[error("empty text provided")]
    EmptyText,

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("{0} is closed")]
    Closed(&'static str),
}

impl RobotError {
    /// Wraps any displayable device error (cpal has several error types).
    pub fn device<E: std::fmt::Display>(err: E) -> Self {
        RobotError::AudioDevice(err.to_string())
    }
}
