/*
 * @file config.rs
 * @brief Environment configuration and run settings
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

//! Runtime configuration: `.env`/environment defaults plus command-line overrides.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::text::local_commands::LanguagePreference;

/// Default speech server serving `/stt` and `/tts`.
const DEFAULT_SERVER_API_URL: &str = "http://127.0.0.1:5055";

/// Default Linux framebuffer used by the eye renderer.
const DEFAULT_FRAMEBUFFER: &str = "/dev/fb0";

/// Default baud rate of the neck servo controller.
const DEFAULT_SERVO_BAUD: u32 = 9600;

/// Hardware profile the robot runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Device {
    Raspi5,
    Raspi0,
    Windows,
}

impl Device {
    /// Parses the `DEVICE` environment value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "raspi5" => Some(Self::Raspi5),
            "raspi0" => Some(Self::Raspi0),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Resolution the eye renderer draws at on this device.
    pub fn display_size(self) -> (u32, u32) {
        match self {
            Self::Raspi0 => (480, 320),
            Self::Raspi5 | Self::Windows => (800, 480),
        }
    }

    /// Whether a Linux framebuffer is expected to be available.
    pub fn has_framebuffer(self) -> bool {
        matches!(self, Self::Raspi5 | Self::Raspi0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raspi5 => "raspi5",
            Self::Raspi0 => "raspi0",
            Self::Windows => "windows",
        }
    }
}

/// Which eye renderer (if any) animates the robot's face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EyeModel {
    /// Background and iris images with natural movement.
    Img,
    /// Looping animation clips per emotion.
    Video,
    /// Two drawn rectangles that blink.
    Draw,
    /// Iris follows the user's face.
    Track,
    /// No eyes.
    #[value(name = "none")]
    Off,
}

impl EyeModel {
    /// Parses an eye model name; `none` maps to [`EyeModel::Off`].
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "img" => Some(Self::Img),
            "video" => Some(Self::Video),
            "draw" => Some(Self::Draw),
            "track" => Some(Self::Track),
            "none" | "" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Img => "img",
            Self::Video => "video",
            Self::Draw => "draw",
            Self::Track => "track",
            Self::Off => "none",
        }
    }
}

/// Values read from the process environment (after `.env` is loaded).
#[derive(Clone, Debug)]
pub struct Config {
    pub allow_interruption: bool,
    pub allow_wake_word: bool,
    pub device: Device,
    pub eye_model: EyeModel,
    pub server_api_url: String,
    pub n8n_url: String,
    pub http_timeout: Duration,
    pub retries: u32,
    pub rec_sample_rate: u32,
    pub rec_channels: u16,
    pub rec_width: u16,
    pub rec_chunk: usize,
    pub session_id: String,
    pub camera_index: u32,
    pub camera_flip: bool,
    pub screen_movement: u32,
    pub resources_dir: PathBuf,
    pub language: LanguagePreference,
    pub face_feed: Option<PathBuf>,
    pub servo_port: Option<String>,
    pub servo_baud: u32,
    pub framebuffer: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Details
    /// Every key has a baked-in default. Malformed numbers and unknown enum
    /// values are logged and replaced by their default so the robot still
    /// boots with a partially broken `.env`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_string());
        let flag = |key: &str| get(key).map(|v| parse_bool_flag(&v)).unwrap_or(false);

        let device = match get("DEVICE") {
            Some(raw) => Device::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown DEVICE '{}', using raspi5", raw);
                Device::Raspi5
            }),
            None => Device::Raspi5,
        };
        let eye_model = match get("EYE_MODEL") {
            Some(raw) => EyeModel::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown eye_model '{}', skipping eye initialization", raw);
                EyeModel::Off
            }),
            None => EyeModel::Img,
        };
        let language = match get("LANGUAGE") {
            Some(raw) => LanguagePreference::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown LANGUAGE '{}', using english", raw);
                LanguagePreference::English
            }),
            None => LanguagePreference::English,
        };

        Self {
            allow_interruption: flag("ALLOW_INTERRUPTION"),
            allow_wake_word: flag("ALLOW_WAKE_WORD"),
            device,
            eye_model,
            server_api_url: get("SERVER_API_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_API_URL.to_string()),
            n8n_url: get("N8N_URL").unwrap_or_default(),
            http_timeout: Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT", 60)),
            retries: parse_or(&get, "RETRIES", 3),
            rec_sample_rate: parse_or(&get, "REC_SAMPLE_RATE", 16_000),
            rec_channels: parse_or(&get, "REC_CHANNELS", 1),
            rec_width: parse_or(&get, "REC_WIDTH", 2),
            rec_chunk: parse_or(&get, "REC_CHUNK", 256),
            session_id: get("SESSION_ID")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "robot-1".to_string()),
            camera_index: parse_or(&get, "CAMERA_INDEX", 0),
            camera_flip: get("CAMERA_FLIP")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false),
            screen_movement: parse_or(&get, "SCREEN_MOVEMENT", 0),
            resources_dir: get("RESOURCES_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("Resources")),
            language,
            face_feed: get("FACE_FEED").filter(|v| !v.is_empty()).map(PathBuf::from),
            servo_port: get("SERVO_PORT").filter(|v| !v.is_empty()),
            servo_baud: parse_or(&get, "SERVO_BAUD", DEFAULT_SERVO_BAUD),
            framebuffer: get("FRAMEBUFFER")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMEBUFFER)),
        }
    }

    /// Path of a prompt sound under `Resources/voice_msgs`.
    pub fn voice_msg(&self, name: &str) -> PathBuf {
        self.resources_dir.join("voice_msgs").join(name)
    }
}

/// Parses a numeric key, warning and falling back on malformed input.
fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid {} value '{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

/// Interprets a boolean flag value: only `true` (any case) is true.
pub fn parse_bool_flag(value: &str) -> bool {
    value.trim().to_lowercase() == "true"
}

/// Final runtime switches after merging CLI flags over the environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub allow_interruption: bool,
    pub allow_wake_word: bool,
    pub device: Device,
    pub eye_model: EyeModel,
}

impl Settings {
    /// Command-line values win; anything omitted comes from the environment.
    pub fn resolve(cli: &CliArgs, config: &Config) -> Self {
        Self {
            allow_interruption: cli.allow_interruption.unwrap_or(config.allow_interruption),
            allow_wake_word: cli.allow_wake_word.unwrap_or(config.allow_wake_word),
            device: cli.device.unwrap_or(config.device),
            eye_model: cli.eye_model.unwrap_or(config.eye_model),
        }
    }

    pub fn has_eye_model(&self) -> bool {
        self.eye_model.is_enabled()
    }

    /// Logs the configuration banner shown at start-up.
    pub fn log_summary(&self) {
        info!("========= CONFIGURATION =========");
        info!("allow_interruption = {}", self.allow_interruption);
        info!("allow_wake_word    = {}", self.allow_wake_word);
        info!("device             = {}", self.device.as_str());
        info!("eye_model          = {}", self.eye_model.as_str());
        info!("has_eye_model      = {}", self.has_eye_model());
        info!("=================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_stock_robot() {
        let config = Config::default();
        assert!(!config.allow_interruption);
        assert!(!config.allow_wake_word);
        assert_eq!(config.device, Device::Raspi5);
        assert_eq!(config.eye_model, EyeModel::Img);
        assert_eq!(config.server_api_url, "http://127.0.0.1:5055");
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert_eq!(config.retries, 3);
        assert_eq!(config.rec_sample_rate, 16_000);
        assert_eq!(config.rec_chunk, 256);
        assert_eq!(config.session_id, "robot-1");
    }

    #[test]
    fn env_values_are_parsed() {
        let config = config_from(&[
            ("ALLOW_WAKE_WORD", "TRUE"),
            ("ALLOW_INTERRUPTION", "yes"),
            ("DEVICE", "windows"),
            ("EYE_MODEL", "None"),
            ("REC_CHUNK", "512"),
            ("CAMERA_FLIP", "1"),
        ]);
        assert!(config.allow_wake_word);
        assert!(!config.allow_interruption);
        assert_eq!(config.device, Device::Windows);
        assert_eq!(config.eye_model, EyeModel::Off);
        assert_eq!(config.rec_chunk, 512);
        assert!(config.camera_flip);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = config_from(&[
            ("HTTP_TIMEOUT", "soon"),
            ("EYE_MODEL", "laser"),
            ("DEVICE", "toaster"),
        ]);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert_eq!(config.eye_model, EyeModel::Off);
        assert_eq!(config.device, Device::Raspi5);
    }

    #[test]
    fn cli_overrides_environment() {
        let config = config_from(&[("ALLOW_WAKE_WORD", "true"), ("EYE_MODEL", "video")]);
        let cli = CliArgs::parse_from([
            "ziko",
            "--allow_wake_word=False",
            "--device",
            "raspi0",
            "--eye_model",
            "track",
            "--allow_interruption",
        ]);
        let settings = Settings::resolve(&cli, &config);
        assert!(!settings.allow_wake_word);
        assert!(settings.allow_interruption);
        assert_eq!(settings.device, Device::Raspi0);
        assert_eq!(settings.eye_model, EyeModel::Track);
    }

    #[test]
    fn omitted_flags_keep_environment() {
        let config = config_from(&[("ALLOW_WAKE_WORD", "true"), ("EYE_MODEL", "draw")]);
        let cli = CliArgs::parse_from(["ziko"]);
        let settings = Settings::resolve(&cli, &config);
        assert!(settings.allow_wake_word);
        assert_eq!(settings.eye_model, EyeModel::Draw);
        assert!(settings.has_eye_model());
    }

    #[test]
    fn voice_msg_paths_live_under_resources() {
        let config = Config::default();
        assert_eq!(
            config.voice_msg("bell.wav"),
            PathBuf::from("Resources/voice_msgs/bell.wav")
        );
    }

    #[test]
    fn device_profiles() {
        assert_eq!(Device::Raspi0.display_size(), (480, 320));
        assert!(Device::Raspi5.has_framebuffer());
        assert!(!Device::Windows.has_framebuffer());
    }
}
