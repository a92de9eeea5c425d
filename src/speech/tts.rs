/*
 * @file tts.rs
 * @brief Text-to-speech client
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

//! Text-to-speech client for the speech server's `/tts` endpoint.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RobotError};

/// Audio encoding requested from the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AudioFormat {
    #[default]
    Wav,
    /// Raw PCM; sample details come back in `x-*` headers.
    Pcm,
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    #[serde(rename = "as")]
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

/// Turns reply text into audio bytes.
#[derive(Clone)]
pub struct TextToSpeech {
    client: reqwest::Client,
    endpoint: String,
}

impl TextToSpeech {
    /// Creates a client for `{base_url}/tts`.
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client.
    /// * `base_url` - Speech server root; a trailing slash is ignored.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/tts", base_url.trim_end_matches('/')),
        }
    }

    /// Synthesizes `text`.
    ///
    /// # Returns
    /// The audio body, which may be empty when the server had nothing to say.
    ///
    /// # Errors
    /// [`RobotError::EmptyText`] for blank input; transport and non-2xx
    /// replies are errors too.
    pub async fn synthesize(
        &self,
        text: &str,
        format: AudioFormat,
        voice: Option<&str>,
    ) -> Result<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RobotError::EmptyText);
        }
        debug!(endpoint = %self.endpoint, format = format.as_str(), chars = text.chars().count(), "sending text to TTS");

        let payload = TtsRequest {
            text,
            format: format.as_str(),
            voice: voice.filter(|v| !v.is_empty()),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .inspect_err(|err| {
                error!(%err, endpoint = %self.endpoint, "TTS request failed; is the speech server running?");
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_error_message(&body);
            error!(status = status.as_u16(), %message, "TTS error");
            return Err(RobotError::Status {
                service: "tts",
                status: status.as_u16(),
                body: message,
            });
        }

        if format == AudioFormat::Pcm {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string()
            };
            debug!(
                sample_rate = %header("x-sample-rate"),
                sample_format = %header("x-sample-format"),
                channels = %header("x-channels"),
                "TTS PCM layout"
            );
        }

        let audio = response.bytes().await?.to_vec();
        if audio.is_empty() {
            warn!("TTS returned empty audio");
        } else {
            info!(bytes = audio.len(), "TTS audio received");
        }
        Ok(audio)
    }
}

/// Pulls `error` out of a JSON error body, falling back to the raw text.
fn server_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
