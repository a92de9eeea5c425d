/*
 * @file arabic.rs
 * @brief Arabic text normalisation
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

//! Light Arabic normalisation shared by the wake-word, stop and command matchers.

/// Returns `true` for Arabic diacritics and Quranic annotation marks.
fn is_diacritic(c: char) -> bool {
    matches!(c,
        '\u{0617}'..='\u{061A}'
        | '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06ED}')
}

/// Returns `true` for characters in the Arabic Unicode block.
pub fn is_arabic_char(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Normalises Arabic text for matching.
///
/// # Details
/// Trims and lowercases the input, strips diacritics and tatweel, and folds
/// the letter variants speech recognisers tend to mix up:
/// أ إ آ ٱ → ا, ة → ه, ى → ي. Latin text passes through lowercased.
pub fn normalize_arabic(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|&c| !is_diacritic(c) && c != 'ـ')
        .map(|c| match c {
            'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
            'ة' => 'ه',
            'ى' => 'ي',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_alef_variants_and_taa_marbuta() {
        assert_eq!(normalize_arabic("أهلا"), "اهلا");
        assert_eq!(normalize_arabic("كفاية"), "كفايه");
        assert_eq!(normalize_arabic("إلى"), "الي");
    }

    #[test]
    fn strips_diacritics_and_tatweel() {
        assert_eq!(normalize_arabic("زِيكُو"), "زيكو");
        assert_eq!(normalize_arabic("زيـــكو"), "زيكو");
    }

    #[test]
    fn latin_is_lowercased_and_trimmed() {
        assert_eq!(normalize_arabic("  Ziko STOP "), "ziko stop");
    }

    #[test]
    fn detects_arabic_block() {
        assert!(is_arabic_char('ز'));
        assert!(!is_arabic_char('z'));
    }
}
