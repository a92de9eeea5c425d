/*
 * @file stt.rs
 * @brief Speech-to-text client
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

//! Speech-to-text client for the speech server's `/stt` endpoint.

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{Result, RobotError};

/// Sends recorded WAV audio to the speech server and returns the transcript.
#[derive(Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    endpoint: String,
}

impl SpeechToText {
    /// # Arguments
    /// * `client` - Shared HTTP client (carries the request timeout).
    /// * `base_url` - Server root, e.g. `http://127.0.0.1:5055`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/stt", base_url.trim_end_matches('/')),
        }
    }

    /// Transcribes a WAV file.
    ///
    /// # Arguments
    /// * `wav` - Complete WAV bytes (RIFF header included).
    /// * `language` - Optional language hint such as `"ar"` or `"en"`.
    ///
    /// # Returns
    /// The `text` field of the server's JSON reply, or the reply itself when
    /// it has no such field.
    ///
    /// # Errors
    /// Fails on empty or non-WAV input, transport errors, and non-2xx replies.
    pub async fn transcribe(&self, wav: &[u8], language: Option<&str>) -> Result<String> {
        validate_wav(wav)?;
        debug!(endpoint = %self.endpoint, bytes = wav.len(), "sending audio to STT");

        let part = Part::bytes(wav.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let mut request = self
            .client
            .post(&self.endpoint)
            .multipart(Form::new().part("file", part));
        if let Some(language) = language.filter(|l| !l.is_empty()) {
            request = request.query(&[("language", language)]);
        }

        let response = request.send().await.inspect_err(|err| {
            error!(%err, endpoint = %self.endpoint, "STT request failed; is the speech server running?");
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "STT error");
            return Err(RobotError::Status {
                service: "stt",
                status: status.as_u16(),
                body,
            });
        }
        let value: Value = response.json().await?;
        let text = transcript_from_json(value);
        info!(%text, "STT transcript");
        Ok(text)
    }
}

/// Rejects empty buffers and anything without a RIFF header.
pub(crate) fn validate_wav(wav: &[u8]) -> Result<()> {
    if wav.is_empty() {
        return Err(RobotError::InvalidAudio("empty audio data".into()));
    }
    if !wav.starts_with(b"RIFF") {
        return Err(RobotError::InvalidAudio(
            "audio must be WAV (RIFF header); encode PCM with pcm_to_wav first".into(),
        ));
    }
    Ok(())
}

pub(crate) fn transcript_from_json(value: Value) -> String {
    match value {
        Value::Object(mut map) => match map.remove("text") {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::pcm_to_wav;
    use crate::testing::{MockResponse, MockServer};
    use serde_json::json;

    #[test]
    fn rejects_empty_and_headerless_audio() {
        assert!(matches!(validate_wav(b""), Err(RobotError::InvalidAudio(_))));
        assert!(matches!(validate_wav(b"\0\0\0\0"), Err(RobotError::InvalidAudio(_))));
        assert!(validate_wav(b"RIFF....WAVE").is_ok());
    }

    #[test]
    fn transcript_extraction() {
        assert_eq!(transcript_from_json(json!({"text": "hello"})), "hello");
        assert_eq!(transcript_from_json(json!({"text": 5})), "5");
        assert_eq!(transcript_from_json(json!("plain")), "plain");
        assert_eq!(transcript_from_json(json!({"other": 1})), r#"{"other":1}"#);
    }

    #[tokio::test]
    async fn posts_multipart_with_language() {
        let server = MockServer::start(vec![MockResponse::json(200, r#"{"text":"ziko stop"}"#)]);
        let stt = SpeechToText::new(reqwest::Client::new(), &format!("{}/", server.url));
        let wav = pcm_to_wav(&[0; 160], 16_000, 1).expect("wav");
        let text = stt.transcribe(&wav, Some("ar")).await.expect("transcribe");
        assert_eq!(text, "ziko stop");

        let requests = server.finish();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].request_line.starts_with("POST /stt?language=ar "));
        let content_type = requests[0].header("content-type").unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = requests[0].body_text();
        assert!(body.contains(r#"name="file"; filename="audio.wav""#));
        assert!(body.contains("audio/wav"));
    }

    #[tokio::test]
    async fn http_errors_are_reported() {
        let server = MockServer::start(vec![MockResponse::text(500, "boom")]);
        let stt = SpeechToText::new(reqwest::Client::new(), &server.url);
        let wav = pcm_to_wav(&[0; 16], 16_000, 1).expect("wav");
        let err = stt.transcribe(&wav, None).await.expect_err("status error");
        assert!(matches!(err, RobotError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn invalid_audio_never_reaches_the_network() {
        let stt = SpeechToText::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert!(matches!(
            stt.transcribe(b"", None).await,
            Err(RobotError::InvalidAudio(_))
        ));
    }
}
