/*
 * @file cli.rs
 * @brief Command-line flags
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

//! Command-line flags, kept compatible with the robot's launch scripts.
//!
//! ```text
//! ziko --allow_wake_word=False --device=windows --eye_model=track --allow_interruption
//! ```

use clap::Parser;

use crate::config::{Device, EyeModel, parse_bool_flag};

#[derive(Debug, Parser)]
#[command(name = "ziko", version, about = "Ziko AI System Parameters")]
pub struct CliArgs {
    /// Allow the user to interrupt playback by saying "stop" (bare flag means true)
    #[arg(
        long = "allow_interruption",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = bool_value
    )]
    pub allow_interruption: Option<bool>,

    /// Require the wake word ("Ziko") before each command
    #[arg(
        long = "allow_wake_word",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = bool_value
    )]
    pub allow_wake_word: Option<bool>,

    /// Select device type (default from .env)
    #[arg(long, value_enum)]
    pub device: Option<Device>,

    /// Select eye model type (default from .env)
    #[arg(long = "eye_model", value_enum)]
    pub eye_model: Option<EyeModel>,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "ziko=trace"
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

fn bool_value(raw: &str) -> Result<bool, String> {
    Ok(parse_bool_flag(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_explicit_values() {
        let args = CliArgs::parse_from(["ziko", "--allow_wake_word=False", "--allow_interruption=TRUE"]);
        assert_eq!(args.allow_wake_word, Some(false));
        assert_eq!(args.allow_interruption, Some(true));
    }

    #[test]
    fn bare_flag_means_true() {
        let args = CliArgs::parse_from(["ziko", "--allow_interruption", "--device", "windows"]);
        assert_eq!(args.allow_interruption, Some(true));
        assert_eq!(args.device, Some(Device::Windows));
        assert_eq!(args.allow_wake_word, None);
    }

    #[test]
    fn anything_but_true_is_false() {
        let args = CliArgs::parse_from(["ziko", "--allow_wake_word=1"]);
        assert_eq!(args.allow_wake_word, Some(false));
    }

    #[test]
    fn eye_model_none_is_accepted() {
        let args = CliArgs::parse_from(["ziko", "--eye_model", "none"]);
        assert_eq!(args.eye_model, Some(EyeModel::Off));
    }

    #[test]
    fn unknown_device_is_rejected() {
        assert!(CliArgs::try_parse_from(["ziko", "--device", "mac"]).is_err());
    }
}
