//! Trigger word detection for ordinary chat messages.

use regex::Regex;

/// Decides whether a message contains a trigger word.
pub trait TriggerDetector: Send + Sync {
    fn matches(&self, text: &str) -> bool;
}

/// Matches any word that starts with one of the configured stems,
/// case-insensitively. Starting-with covers most inflected forms
/// ("клоуна", "дураки") without a morphological analyzer.
#[derive(Clone)]
pub struct WordListDetector {
    pattern: Option<Regex>,
}

impl WordListDetector {
    pub fn new(words: &[String]) -> Result<Self, regex::Error> {
        let stems: Vec<String> = words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .map(|w| regex::escape(&w))
            .collect();

        if stems.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\w*", stems.join("|")))?;
        Ok(Self { pattern: Some(pattern) })
    }
}

impl TriggerDetector for WordListDetector {
    fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }
}
