//! Passthrough policy: decides which MTool entries are worth a DeepL request.
//!
//! Anything without Japanese script is left alone, as are entries matching
//! one of the configured skip patterns (engine labels such as "Save" or "ON"
//! that games keep in English).

use regex::Regex;
use std::sync::OnceLock;

// Hiragana, Katakana (full and half width), CJK ideographs, iteration marks
static JAPANESE_REGEX: OnceLock<Regex> = OnceLock::new();

fn japanese_regex() -> &'static Regex {
    JAPANESE_REGEX.get_or_init(|| {
        Regex::new(r"[\p{Hiragana}\p{Katakana}\p{Han}\x{FF66}-\x{FF9F}\x{3005}\x{30FC}]")
            .expect("Invalid Japanese regex")
    })
}

/// Returns true if the text contains at least one Japanese character.
pub fn contains_japanese(text: &str) -> bool {
    japanese_regex().is_match(text)
}

#[derive(Debug, Clone)]
pub struct PassthroughFilter {
    /// Lower-cased skip patterns
    patterns: Vec<String>,
}

impl PassthroughFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Decide whether `text` should be sent to DeepL.
    pub fn needs_translation(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if !contains_japanese(text) {
            return false;
        }
        self.matching_pattern(text).is_none()
    }

    /// The first skip pattern found in `text`, if any.
    pub fn matching_pattern(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }
}

impl Default for PassthroughFilter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SKIP_PATTERNS)
    }
}
