/*
 * @file wake_word.rs
 * @brief Wake-word detection
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

//! Wake-word detection on transcribed text ("Ziko" / "زيكو").
//!
//! Only the start of the utterance is inspected, so "sorry, ziko open mail"
//! is not a call. Matching is table-driven with no edit-distance scoring,
//! which keeps it cheap enough for a Raspberry Pi Zero.

use std::collections::HashSet;

use regex::Regex;

use super::arabic::normalize_arabic;

/// Arabic wake word.
const AR_WAKE_WORD: &str = "زيكو";

/// Transcriptions of "Ziko" that are accepted verbatim.
const EN_WAKE_EXACT: &[&str] = &[
    "ziko", "zico", "zeeko", "zeeco", "zikko", "zeiko", "zyko", "zeko", "dziko", "dico", "zika",
    "nico", "niko", "echo",
];

/// A detected wake word and the command that followed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WakeMatch {
    /// Text after the wake word, cut from the original utterance and trimmed.
    pub remainder: String,
    /// The wake word as it was recognised.
    pub wake_form: String,
}

/// Detects a leading wake word in English or Arabic.
pub struct WakeWordDetector {
    ar_wake_word: String,
    accept: HashSet<String>,
    deny: HashSet<String>,
    en_regex: Regex,
    ar_normalized_regex: Regex,
    ar_original_regex: Regex,
}

impl WakeWordDetector {
    /// Builds the detector for "Ziko" / "زيكو".
    pub fn standard() -> Result<Self, regex::Error> {
        Self::new(AR_WAKE_WORD, EN_WAKE_EXACT.iter().copied(), std::iter::empty())
    }

    /// Builds a detector for a custom wake vocabulary.
    ///
    /// # Arguments
    /// * `ar_wake_word` - Arabic wake word (matched after normalisation).
    /// * `accept` - English tokens accepted as the wake word.
    /// * `deny` - English tokens that are never the wake word.
    ///
    /// # Errors
    /// Returns an error if the wake-word patterns fail to compile.
    pub fn new<'a, A, D>(ar_wake_word: &str, accept: A, deny: D) -> Result<Self, regex::Error>
    where
        A: IntoIterator<Item = &'a str>,
        D: IntoIterator<Item = &'a str>,
    {
        let ar_normalized = regex::escape(&normalize_arabic(ar_wake_word));
        let ar_original = regex::escape(ar_wake_word);
        Ok(Self {
            ar_wake_word: ar_wake_word.to_string(),
            accept: accept.into_iter().map(str::to_lowercase).collect(),
            deny: deny.into_iter().map(str::to_lowercase).collect(),
            en_regex: Regex::new(r"(?i)^\s*(?:(?:hey|hi|hello)\s+)?([a-z]+)[\s,،:.\-!?]*")?,
            ar_normalized_regex: Regex::new(&format!(r"(?i)^\s*(?:يا\s*)?{ar_normalized}\b[\s،,:-]*"))?,
            ar_original_regex: Regex::new(&format!(r"(?i)^\s*(?:يا\s*)?{ar_original}\b[\s،,:-]*"))?,
        })
    }

    /// Extracts the command that follows a leading wake word.
    ///
    /// # Returns
    /// * `Some(WakeMatch)` - The utterance starts with the wake word.
    /// * `None` - No wake word at the start.
    pub fn extract_after_wake(&self, user_text: &str) -> Option<WakeMatch> {
        let text = user_text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(caps) = self.en_regex.captures(text) {
            let token = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
            if self.is_english_wake_token(&token) {
                let end = caps.get(0).map_or(0, |m| m.end());
                return Some(WakeMatch {
                    remainder: text[end..].trim().to_string(),
                    wake_form: token,
                });
            }
        }

        if self.ar_normalized_regex.is_match(&normalize_arabic(text)) {
            if let Some(m) = self.ar_original_regex.find(text) {
                return Some(WakeMatch {
                    remainder: text[m.end()..].trim().to_string(),
                    wake_form: m.as_str().trim().to_string(),
                });
            }
            // Original spelling differs from the normalised form (e.g. diacritics).
            let remainder: String = text.chars().skip(self.ar_wake_word.chars().count()).collect();
            return Some(WakeMatch {
                remainder: remainder.trim().to_string(),
                wake_form: self.ar_wake_word.clone(),
            });
        }

        None
    }

    /// Convenience check used by callers that only need a yes/no answer.
    pub fn has_wake_word(&self, user_text: &str) -> bool {
        self.extract_after_wake(user_text).is_some()
    }

    fn is_english_wake_token(&self, token: &str) -> bool {
        if token.chars().count() < 2 || self.deny.contains(token) {
            return false;
        }
        if self.accept.contains(token) {
            return true;
        }
        (token.starts_with('z') || token.starts_with('d'))
            && (token.contains("iko") || token.contains("ico"))
    }
}
