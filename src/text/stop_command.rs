/*
 * @file stop_command.rs
 * @brief Stop-command detection
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

//! Stop-command detection ("stop", "cancel", "توقف", ...), optionally after the wake word.

use regex::Regex;

use super::arabic::normalize_arabic;
use super::wake_word::WakeWordDetector;

/// Tokens that cancel whatever the robot is doing.
pub const STOP_TOKENS: &[&str] = &[
    "stop", "end", "cancel", "enough", "quit", "exit", "abort", "halt", "قف", "توقف", "وقف", "بس",
    "خلص", "خلاص", "كفايه", "كفاية", "ستوب", "وقف التشغيل", "اسكت", "كفا", "خلصنا", "خلاص كده",
];

/// Detects utterances that begin with a stop token.
pub struct StopCommandDetector {
    stop_regex: Regex,
    wake: Option<WakeWordDetector>,
}

impl StopCommandDetector {
    /// Builds a detector; pass a wake detector to also accept "Ziko stop".
    ///
    /// # Errors
    /// Returns an error if the stop pattern fails to compile.
    pub fn new(wake: Option<WakeWordDetector>) -> Result<Self, regex::Error> {
        let alternatives = STOP_TOKENS
            .iter()
            .map(|token| regex::escape(token))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?i)^\s*(?:{alternatives})(?:\s|$|[^\w\x{{0600}}-\x{{06FF}}])");
        Ok(Self {
            stop_regex: Regex::new(&pattern)?,
            wake,
        })
    }

    /// Returns `true` when the text begins with a stop token (raw or normalised).
    pub fn is_stop_command(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.stop_regex.is_match(text) || self.stop_regex.is_match(&normalize_arabic(text))
    }

    /// Like [`Self::is_stop_command`], but a leading wake word is stripped first.
    pub fn is_stop_with_optional_wake(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let candidate = self
            .wake
            .as_ref()
            .and_then(|wake| wake.extract_after_wake(text))
            .map(|m| m.remainder);
        self.is_stop_command(candidate.as_deref().unwrap_or(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StopCommandDetector {
        let wake = WakeWordDetector::standard().expect("wake patterns");
        StopCommandDetector::new(Some(wake)).expect("stop pattern")
    }

    #[test]
    fn english_stop_tokens_at_start() {
        let d = detector();
        assert!(d.is_stop_command("stop"));
        assert!(d.is_stop_command("Stop!"));
        assert!(d.is_stop_command("  cancel that please"));
        assert!(d.is_stop_command("ENOUGH."));
    }

    #[test]
    fn tokens_need_a_boundary() {
        let d = detector();
        assert!(!d.is_stop_command("ending soon"));
        assert!(!d.is_stop_command("stopwatch"));
        assert!(!d.is_stop_command("please stop"));
        assert!(!d.is_stop_command(""));
    }

    #[test]
    fn arabic_stop_tokens() {
        let d = detector();
        assert!(d.is_stop_command("توقف"));
        assert!(d.is_stop_command("خلاص يا زيكو"));
        assert!(d.is_stop_command("كفاية"));
    }

    #[test]
    fn stop_after_wake_word() {
        let d = detector();
        assert!(d.is_stop_with_optional_wake("Ziko stop"));
        assert!(d.is_stop_with_optional_wake("زيكو وقف"));
        assert!(d.is_stop_with_optional_wake("stop"));
        assert!(!d.is_stop_with_optional_wake("ziko play music"));
        assert!(!d.is_stop_command("Ziko stop"));
    }

    #[test]
    fn without_wake_detector_only_bare_stop_counts() {
        let d = StopCommandDetector::new(None).expect("stop pattern");
        assert!(!d.is_stop_with_optional_wake("Ziko stop"));
        assert!(d.is_stop_with_optional_wake("halt"));
    }
}
