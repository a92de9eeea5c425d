/*
 * @file local_commands.rs
 * @brief Local command handling
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

//! Local command handling: intents answered on the robot without an AI round-trip.
//!
//! Greetings, farewells, thanks, small talk, help, time and date are matched
//! against fixed English and Arabic phrase tables. Anything else (or the part
//! of an utterance after a greeting) is forwarded to the AI agent.

use chrono::{Local, NaiveDateTime};
use rand::seq::IndexedRandom;
use regex::Regex;

use super::arabic::{is_arabic_char, normalize_arabic};

/// Phrase tables, one entry per intent: (intent, English phrases, Arabic phrases).
const PHRASES: &[(Intent, &[&str], &[&str])] = &[
    (
        Intent::Greeting,
        &["hello", "hi", "hey", "good morning", "good afternoon", "good evening", "howdy"],
        &["مرحبا", "هلا", "اهلا", "السلام عليكم", "صباح الخير", "مساء الخير", "اهلين"],
    ),
    (
        Intent::Goodbye,
        &["bye", "goodbye", "see you", "talk to you later", "good night", "catch you later"],
        &["مع السلامة", "الى اللقاء", "وداعا", "باي", "تصبح على خير", "بكرة نتكلم"],
    ),
    (
        Intent::ThankYou,
        &["thank you", "thanks", "thank you very much", "appreciate it", "thx"],
        &["شكرا", "شكرا لك", "شكرا جزيلا", "مشكور", "يعطيك العافية"],
    ),
    (
        Intent::Time,
        &["what time is it", "what's the time", "tell me the time", "current time", "time now"],
        &["كم الساعة", "ما الوقت", "الوقت الان", "اي ساعة الان"],
    ),
    (
        Intent::Date,
        &["what date is it", "what's the date", "today's date", "what day is it"],
        &["ما التاريخ", "التاريخ اليوم", "اي يوم اليوم", "كم التاريخ"],
    ),
    (
        Intent::Pause,
        &[
            "pause", "stop", "stop listening", "sleep mode", "go to sleep", "standby", "rest",
            "cancel", "enough", "quit", "exit", "abort", "halt",
        ],
        &[
            "قف", "توقف", "وقف", "بس", "خلص", "خلاص", "كفايه", "كفاية", "ستوب", "وقف التشغيل",
            "اسكت", "كفا", "خلصنا", "خلاص كده", "استراحة", "ارتاح",
        ],
    ),
    (
        Intent::Resume,
        &["wake up", "resume", "start listening", "are you there", "come back"],
        &["استيقظ", "استمر", "ارجع", "موجود", "يلا"],
    ),
    (
        Intent::HowAreYou,
        &["how are you", "how's it going", "how do you do", "what's up", "you okay"],
        &["كيف حالك", "كيفك", "شلونك", "ايش اخبارك", "عامل ايه"],
    ),
    (
        Intent::Help,
        &["help", "what can you do", "your capabilities", "commands", "how to use"],
        &["مساعدة", "ماذا تستطيع", "الاوامر", "كيف استخدمك", "وش تقدر تسوي"],
    ),
];

/// Words that make a short remainder look like a real request.
const QUESTION_HINTS_EN: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "would", "should",
    "is", "are", "do", "does", "please", "help", "explain", "tell", "show",
];

/// Stored in normalised form; matched against normalised text.
const QUESTION_HINTS_AR: &[&str] = &[
    "ما", "ماذا", "كيف", "لماذا", "متى", "اين", "مين", "من", "ايش", "هل", "وش", "يا ريت", "ممكن",
    "رجاء", "ساعد", "اشرح", "وضح", "قل", "اعرض",
];

const GREETING_EN: &[&str] = &[
    "Hello! How can I help you?",
    "Hi there! What can I do for you?",
    "Hey! I'm here to assist you.",
    "Good to hear from you! How may I help?",
];
const GREETING_AR: &[&str] = &[
    "مرحبا! كيف يمكنني مساعدتك؟",
    "أهلا! في خدمتك.",
    "هلا! شو احتياجك؟",
    "اهلين! كيف اقدر اخدمك؟",
];
const GOODBYE_EN: &[&str] = &[
    "Goodbye! Say 'hello' when you need me again.",
    "See you later! Just call me when you're ready.",
    "Take care! I'll be here when you need me.",
];
const GOODBYE_AR: &[&str] = &[
    "مع السلامة! قل مرحبا عندما تحتاجني.",
    "الى اللقاء! ناديني متى احتجتني.",
    "الله يسلمك! انا هنا متى احتجتني.",
];
const THANK_YOU_EN: &[&str] = &[
    "You're welcome! Happy to help.",
    "My pleasure! Anytime you need assistance.",
    "Glad I could help!",
];
const THANK_YOU_AR: &[&str] = &["عفوا! سعيد بمساعدتك.", "على الرحب والسعة!", "تشرفنا! اي خدمة."];
const HOW_ARE_YOU_EN: &[&str] = &[
    "I'm doing great, thank you! Ready to assist you.",
    "All systems running smoothly! How about you?",
    "I'm excellent! What can I help you with?",
];
const HOW_ARE_YOU_AR: &[&str] = &[
    "بخير الحمد لله! جاهز لمساعدتك.",
    "تمام! كيف حالك انت؟",
    "كويس جدا! شو احتياجك؟",
];
const PAUSE_EN: &[&str] = &[
    "Going to sleep mode. Say 'hello' or 'wake up' to resume.",
    "Entering standby. Wake me up when you need me.",
];
const PAUSE_AR: &[&str] = &["داخل وضع النوم. قل مرحبا للعودة.", "راح ارتاح. ناديني متى احتجتني."];
const RESUME_EN: &[&str] = &[
    "Hello! I'm back and ready to help you.",
    "I'm here! What do you need?",
    "Ready for action! How can I assist?",
];
const RESUME_AR: &[&str] = &[
    "مرحبا! رجعت وجاهز لمساعدتك.",
    "موجود! شو احتياجك؟",
    "جاهز! كيف اقدر اساعدك؟",
];

const HELP_EN: &str = "I can help you with many things! Here are some commands:
• Say 'bye' or 'goodbye' to pause me
• Say 'hello' or 'hi' to wake me up
• Ask 'what time is it' for current time
• Ask 'what date is it' for current date
• Say 'thank you' when I help you
• Ask me anything else and I'll use AI to help!";

const HELP_AR: &str = "يمكنني مساعدتك بأشياء كثيرة! إليك بعض الأوامر:
• قل 'مع السلامة' لإيقافي مؤقتاً
• قل 'مرحبا' لإيقاظي
• اسأل 'كم الساعة' لمعرفة الوقت
• اسأل 'ما التاريخ' لمعرفة التاريخ
• قل 'شكرا' عندما أساعدك
• اسألني أي شيء آخر وسأستخدم الذكاء الاصطناعي!";

/// Intents the robot answers locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Goodbye,
    ThankYou,
    Time,
    Date,
    Pause,
    Resume,
    HowAreYou,
    Help,
}

/// Reply language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    English,
    Arabic,
}

/// Which language replies are given in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LanguagePreference {
    /// Follow the language of each utterance.
    Auto,
    English,
    Arabic,
}

impl LanguagePreference {
    /// Reads a `LANGUAGE` value (`auto`, `english`, `arabic`).
    ///
    /// # Returns
    /// * `Option<LanguagePreference>` - `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "english" | "en" => Some(Self::English),
            "arabic" | "ar" => Some(Self::Arabic),
            _ => None,
        }
    }
}

/// Listening-state change requested by a local command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Pause,
    Resume,
}

/// Result of running an utterance through the local handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalOutcome {
    /// `true` when the AI agent should still be asked.
    pub forward: bool,
    /// Reply to speak immediately, if any.
    pub response: Option<String>,
    pub action: Option<Action>,
    /// Text to send to the AI agent (greeting stripped).
    pub passthrough: String,
}

impl LocalOutcome {
    fn handled(response: String, action: Option<Action>) -> Self {
        Self {
            forward: false,
            response: Some(response),
            action,
            passthrough: String::new(),
        }
    }

    fn forwarded(response: Option<String>, action: Option<Action>, passthrough: String) -> Self {
        Self {
            forward: true,
            response,
            action,
            passthrough,
        }
    }
}

/// Counters kept when statistics are enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandStats {
    pub total_commands: u64,
    pub local_handled: u64,
    pub api_forwarded: u64,
    pub pause_count: u64,
    pub resume_count: u64,
}

/// English and Arabic patterns for one intent.
struct PhrasePatterns {
    intent: Intent,
    english: Regex,
    arabic: Regex,
}

impl PhrasePatterns {
    fn patterns(&self) -> [&Regex; 2] {
        [&self.english, &self.arabic]
    }
}

/// Matches utterances against the local intent tables.
pub struct LocalCommandHandler {
    language: LanguagePreference,
    patterns: Vec<PhrasePatterns>,
    separators: Regex,
    paused: bool,
    stats: Option<CommandStats>,
}

impl LocalCommandHandler {
    /// Compiles the phrase tables.
    ///
    /// # Errors
    /// Returns an error if a phrase pattern fails to compile.
    pub fn new(language: LanguagePreference, enable_stats: bool) -> Result<Self, regex::Error> {
        let separators = Regex::new(r"[^\w\s\x{0600}-\x{06FF}]+")?;
        let mut patterns = Vec::with_capacity(PHRASES.len());
        for (intent, english, arabic) in PHRASES {
            patterns.push(PhrasePatterns {
                intent: *intent,
                english: compile_phrases(english, &separators)?,
                arabic: compile_phrases(arabic, &separators)?,
            });
        }
        Ok(Self {
            language,
            patterns,
            separators,
            paused: false,
            stats: enable_stats.then(CommandStats::default),
        })
    }

    /// Lowercases, folds Arabic letters, and replaces punctuation with spaces.
    pub fn normalize_text(&self, text: &str) -> String {
        normalize_with(&self.separators, text)
    }

    /// Whether the last control command put the robot to sleep.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Usage counters, when statistics are enabled.
    pub fn stats(&self) -> Option<&CommandStats> {
        self.stats.as_ref()
    }

    /// Zeroes the usage counters.
    pub fn reset_stats(&mut self) {
        if let Some(stats) = self.stats.as_mut() {
            *stats = CommandStats::default();
        }
    }

    /// Returns `true` when the text contains a phrase of the given intent.
    pub fn has_intent(&self, text: &str, intent: Intent) -> bool {
        let normalized = self.normalize_text(text);
        self.patterns
            .iter()
            .filter(|p| p.intent == intent)
            .flat_map(|p| p.patterns())
            .any(|re| re.is_match(&normalized))
    }

    /// Splits a leading greeting from the rest of the (normalised) utterance.
    ///
    /// # Returns
    /// `(Some(greeting), remainder)` when the text starts with a greeting,
    /// otherwise `(None, normalised_text)`.
    pub fn split_greeting(&self, text: &str) -> (Option<String>, String) {
        let normalized = self.normalize_text(text);
        let greeting = self.patterns.iter().find(|p| p.intent == Intent::Greeting);
        for re in greeting.into_iter().flat_map(|p| p.patterns()) {
            if let Some(m) = re.find(&normalized).filter(|m| m.start() == 0) {
                let remainder = normalized[m.end()..].trim().to_string();
                return (Some(m.as_str().to_string()), remainder);
            }
        }
        (None, normalized)
    }

    /// Handles an utterance with the current local time.
    pub fn handle(&mut self, text: &str) -> LocalOutcome {
        self.handle_at(text, Local::now().naive_local())
    }

    /// Handles an utterance, answering time and date questions from `now`.
    ///
    /// # Details
    /// Control commands (pause, goodbye, resume) win over greetings, which
    /// win over the simple queries. A greeting followed by a real request
    /// is answered locally *and* the request is forwarded.
    pub fn handle_at(&mut self, text: &str, now: NaiveDateTime) -> LocalOutcome {
        if text.trim().is_empty() {
            return LocalOutcome::forwarded(None, None, String::new());
        }
        self.count(|s| s.total_commands += 1);

        if self.has_intent(text, Intent::Pause) {
            return self.pause(self.pick_response(Intent::Pause, text));
        }
        if self.has_intent(text, Intent::Goodbye) {
            return self.pause(self.pick_response(Intent::Goodbye, text));
        }
        if self.has_intent(text, Intent::Resume) {
            self.paused = false;
            self.count(|s| {
                s.resume_count += 1;
                s.local_handled += 1;
            });
            let reply = self.pick_response(Intent::Resume, text);
            return LocalOutcome::handled(reply, Some(Action::Resume));
        }

        let (greeting, remainder) = self.split_greeting(text);
        if greeting.is_some() {
            let reply = self.pick_response(Intent::Greeting, text);
            if remainder.is_empty() || !looks_like_request(&remainder) {
                self.paused = false;
                self.count(|s| s.local_handled += 1);
                return LocalOutcome::handled(reply, Some(Action::Resume));
            }
            self.count(|s| s.api_forwarded += 1);
            return LocalOutcome::forwarded(Some(reply), Some(Action::Resume), remainder);
        }

        let language = self.reply_language(text);
        let reply = if self.has_intent(text, Intent::ThankYou) {
            Some(self.pick_response(Intent::ThankYou, text))
        } else if self.has_intent(text, Intent::HowAreYou) {
            Some(self.pick_response(Intent::HowAreYou, text))
        } else if self.has_intent(text, Intent::Help) {
            Some(match language {
                Language::English => HELP_EN.to_string(),
                Language::Arabic => HELP_AR.to_string(),
            })
        } else if self.has_intent(text, Intent::Time) {
            let time = now.format("%I:%M %p");
            Some(match language {
                Language::English => format!("The current time is {time}"),
                Language::Arabic => format!("الوقت الآن {time}"),
            })
        } else if self.has_intent(text, Intent::Date) {
            let date = now.format("%A, %B %d, %Y");
            Some(match language {
                Language::English => format!("Today is {date}"),
                Language::Arabic => format!("التاريخ اليوم {date}"),
            })
        } else {
            None
        };

        match reply {
            Some(reply) => {
                self.count(|s| s.local_handled += 1);
                LocalOutcome::handled(reply, None)
            }
            None => {
                self.count(|s| s.api_forwarded += 1);
                LocalOutcome::forwarded(None, None, text.to_string())
            }
        }
    }

    fn pause(&mut self, reply: String) -> LocalOutcome {
        self.paused = true;
        self.count(|s| {
            s.pause_count += 1;
            s.local_handled += 1;
        });
        LocalOutcome::handled(reply, Some(Action::Pause))
    }

    fn count(&mut self, update: impl FnOnce(&mut CommandStats)) {
        if let Some(stats) = self.stats.as_mut() {
            update(stats);
        }
    }

    fn reply_language(&self, text: &str) -> Language {
        match self.language {
            LanguagePreference::Auto => detect_language(text),
            LanguagePreference::English => Language::English,
            LanguagePreference::Arabic => Language::Arabic,
        }
    }

    fn pick_response(&self, intent: Intent, text: &str) -> String {
        let templates: &[&str] = match (intent, self.reply_language(text)) {
            (Intent::Greeting, Language::English) => GREETING_EN,
            (Intent::Greeting, Language::Arabic) => GREETING_AR,
            (Intent::Goodbye, Language::English) => GOODBYE_EN,
            (Intent::Goodbye, Language::Arabic) => GOODBYE_AR,
            (Intent::ThankYou, Language::English) => THANK_YOU_EN,
            (Intent::ThankYou, Language::Arabic) => THANK_YOU_AR,
            (Intent::HowAreYou, Language::English) => HOW_ARE_YOU_EN,
            (Intent::HowAreYou, Language::Arabic) => HOW_ARE_YOU_AR,
            (Intent::Pause, Language::English) => PAUSE_EN,
            (Intent::Pause, Language::Arabic) => PAUSE_AR,
            (Intent::Resume, Language::English) => RESUME_EN,
            (Intent::Resume, Language::Arabic) => RESUME_AR,
            (Intent::Help, Language::English) => &[HELP_EN],
            (Intent::Help, Language::Arabic) => &[HELP_AR],
            (Intent::Time | Intent::Date, _) => &[],
        };
        templates
            .choose(&mut rand::rng())
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

/// Guesses the language: Arabic when more than 30 % of word characters are Arabic.
pub fn detect_language(text: &str) -> Language {
    let arabic = text.chars().filter(|&c| is_arabic_char(c)).count();
    if arabic == 0 {
        return Language::English;
    }
    let word_chars = text
        .chars()
        .filter(|&c| c.is_alphanumeric() || c == '_' || is_arabic_char(c))
        .count();
    if word_chars == 0 {
        return Language::English;
    }
    if arabic as f32 / word_chars as f32 > 0.3 {
        Language::Arabic
    } else {
        Language::English
    }
}

/// Whether a remainder carries actionable content rather than filler.
pub fn looks_like_request(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    if text.contains('?') || text.split_whitespace().count() >= 2 {
        return true;
    }
    let lower = text.to_lowercase();
    if lower.split_whitespace().any(|w| QUESTION_HINTS_EN.contains(&w)) {
        return true;
    }
    let folded = normalize_arabic(text);
    QUESTION_HINTS_AR.iter().any(|hint| folded.contains(hint))
}

fn normalize_with(separators: &Regex, text: &str) -> String {
    let folded = normalize_arabic(text);
    let spaced = separators.replace_all(&folded, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds one alternation of whole-phrase patterns, longest phrase first.
fn compile_phrases(phrases: &[&str], separators: &Regex) -> Result<Regex, regex::Error> {
    let mut normalized: Vec<String> = phrases
        .iter()
        .map(|p| normalize_with(separators, p))
        .filter(|p| !p.is_empty())
        .collect();
    normalized.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
    let alternatives = normalized
        .iter()
        .map(|phrase| {
            let words: Vec<String> = phrase.split(' ').map(regex::escape).collect();
            format!(r"\b{}\b", words.join(r"\s+"))
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternatives}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn handler() -> LocalCommandHandler {
        LocalCommandHandler::new(LanguagePreference::Auto, true).expect("patterns")
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|d| d.and_hms_opt(13, 5, 0))
            .expect("valid date")
    }

    #[test]
    fn pure_greeting_is_local() {
        let mut h = handler();
        let out = h.handle_at("hello", noon());
        assert!(!out.forward);
        assert!(GREETING_EN.contains(&out.response.as_deref().unwrap_or_default()));
        assert_eq!(out.action, Some(Action::Resume));
        assert!(out.passthrough.is_empty());
    }

    #[test]
    fn arabic_greeting_gets_arabic_reply() {
        let mut h = handler();
        let out = h.handle_at("مرحبا", noon());
        assert!(!out.forward);
        assert!(GREETING_AR.contains(&out.response.as_deref().unwrap_or_default()));
    }

    #[test]
    fn greeting_with_question_forwards_remainder() {
        let mut h = handler();
        let out = h.handle_at("hello, explain repository pattern", noon());
        assert!(out.forward);
        assert!(out.response.is_some());
        assert_eq!(out.passthrough, "explain repository pattern");
    }

    #[test]
    fn control_commands_change_pause_state() {
        let mut h = handler();
        let out = h.handle_at("bye", noon());
        assert!(!out.forward);
        assert_eq!(out.action, Some(Action::Pause));
        assert!(h.is_paused());

        let out = h.handle_at("wake up", noon());
        assert_eq!(out.action, Some(Action::Resume));
        assert!(!h.is_paused());
    }

    #[test]
    fn time_and_date_use_the_clock() {
        let mut h = handler();
        let out = h.handle_at("what time is it", noon());
        assert_eq!(out.response.as_deref(), Some("The current time is 01:05 PM"));
        let out = h.handle_at("what's the date", noon());
        assert_eq!(out.response.as_deref(), Some("Today is Friday, March 14, 2025"));
    }

    #[test]
    fn arabic_time_question() {
        let mut h = handler();
        let out = h.handle_at("كم الساعة", noon());
        assert_eq!(out.response.as_deref(), Some("الوقت الآن 01:05 PM"));
    }

    #[test]
    fn thanks_and_help() {
        let mut h = handler();
        assert!(!h.handle_at("thank you", noon()).forward);
        let help = h.handle_at("what can you do", noon());
        assert_eq!(help.response.as_deref(), Some(HELP_EN));
    }

    #[test]
    fn unknown_request_is_forwarded_verbatim() {
        let mut h = handler();
        let out = h.handle_at("explain dotnet core", noon());
        assert!(out.forward);
        assert_eq!(out.response, None);
        assert_eq!(out.passthrough, "explain dotnet core");
    }

    #[test]
    fn phrases_match_whole_words_only() {
        let h = handler();
        assert!(!h.has_intent("this is history", Intent::Greeting));
        assert!(!h.has_intent("interest rates", Intent::Pause));
        assert!(h.has_intent("please stop", Intent::Pause));
    }

    #[test]
    fn stats_track_outcomes() {
        let mut h = handler();
        h.handle_at("hello", noon());
        h.handle_at("bye", noon());
        h.handle_at("explain rust lifetimes", noon());
        let stats = h.stats().cloned().unwrap_or_default();
        assert_eq!(stats.total_commands, 3);
        assert_eq!(stats.local_handled, 2);
        assert_eq!(stats.api_forwarded, 1);
        assert_eq!(stats.pause_count, 1);
        h.reset_stats();
        assert_eq!(h.stats(), Some(&CommandStats::default()));
    }

    #[test]
    fn fixed_language_preference_wins() {
        let mut h = LocalCommandHandler::new(LanguagePreference::English, false).expect("patterns");
        let out = h.handle_at("مرحبا", noon());
        assert!(GREETING_EN.contains(&out.response.as_deref().unwrap_or_default()));
        assert!(h.stats().is_none());
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("hello there"), Language::English);
        assert_eq!(detect_language("مرحبا كيف حالك"), Language::Arabic);
        assert_eq!(detect_language("ok يا"), Language::Arabic);
        assert_eq!(detect_language("hello world friend يا"), Language::English);
    }

    #[test]
    fn request_heuristics() {
        assert!(looks_like_request("why?"));
        assert!(looks_like_request("open the door"));
        assert!(looks_like_request("explain"));
        assert!(!looks_like_request("there"));
        assert!(looks_like_request("أين"));
        assert!(looks_like_request("اين"));
        assert!(looks_like_request("لماذا"));
        assert!(!looks_like_request(""));
    }

    #[test]
    fn empty_input_forwards_nothing() {
        let mut h = handler();
        let out = h.handle_at("   ", noon());
        assert!(out.forward);
        assert!(out.passthrough.is_empty());
        assert_eq!(h.stats().map(|s| s.total_commands), Some(0));
    }
}
