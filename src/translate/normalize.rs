//! Cleanup of raw model output into a single translated line.
//! Strips translator preambles ("Here is the translation:", "French:"), stray quotes
//! at either end, and anything after the first line break.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

const QUOTES: [char; 2] = ['"', '\''];

/// Language names a model tends to echo back as a label before the translation.
const LANGUAGE_LABELS: &[&str] = &[
    "English", "French", "Spanish", "German", "Italian", "Portuguese", "Russian", "Chinese",
    "Japanese", "Korean", "Arabic", "Hindi", "Bengali", "Urdu", "Turkish", "Dutch", "Swedish",
    "Norwegian", "Danish", "Finnish", "Polish", "Czech", "Hungarian", "Greek", "Hebrew", "Thai",
    "Vietnamese",
];

/// Label words that only count as a preamble when followed by a colon.
const LABEL_WORDS: &[&str] = &["Translation", "Translated", "Result", "Output", "Input"];

/// Full sentences the colon is optional for.
const PREAMBLE_PHRASES: &[&str] = &["Here is the translation", "The translation is"];

/// Applies the cleanup pipeline. Total: never fails, worst case returns an empty string.
pub struct TranslationNormalizer {
    preamble: Regex,
}

impl TranslationNormalizer {
    pub fn new() -> Self {
        let labels = LABEL_WORDS
            .iter()
            .chain(LANGUAGE_LABELS)
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let phrases = PREAMBLE_PHRASES
            .iter()
            .map(|p| regex::escape(p).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"^[^\w]*(?:(?:{phrases})\s*:?|(?:{labels})\s*:)\s*");
        Self {
            preamble: build_case_insensitive(&pattern),
        }
    }

    /// Shared instance; the preamble regex is compiled once.
    pub fn global() -> &'static TranslationNormalizer {
        static INSTANCE: OnceLock<TranslationNormalizer> = OnceLock::new();
        INSTANCE.get_or_init(TranslationNormalizer::new)
    }

    /// Clean `raw` model output translated into `target_lang`.
    ///
    /// The pipeline runs until its output stops changing, so `clean` is idempotent
    /// even when the model stacks preambles or nests quotes.
    pub fn clean(&self, raw: &str, target_lang: &str) -> String {
        let target_label = target_label_regex(target_lang);
        let mut current = raw.to_string();
        loop {
            let next = self.clean_once(&current, target_label.as_ref());
            if next == current {
                return next;
            }
            current = next;
        }
    }

    fn clean_once(&self, text: &str, target_label: Option<&Regex>) -> String {
        // Quotes may wrap the label as well as the translation.
        let mut cleaned = strip_quotes(text);

        if let Some(m) = self.preamble.find(cleaned) {
            cleaned = &cleaned[m.end()..];
        } else if let Some(m) = target_label.and_then(|re| re.find(cleaned)) {
            cleaned = &cleaned[m.end()..];
        }

        cleaned = strip_quotes(cleaned);

        if let Some(first_line) = cleaned.lines().next() {
            cleaned = first_line;
        }

        cleaned.trim().to_string()
    }
}

impl Default for TranslationNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// `"<target>:"` label for targets outside the built-in catalogue.
fn target_label_regex(target_lang: &str) -> Option<Regex> {
    let target = target_lang.trim();
    if target.is_empty() {
        return None;
    }
    let pattern = format!(r"^[^\w]*{}\s*:\s*", regex::escape(target));
    RegexBuilder::new(&pattern).case_insensitive(true).build().ok()
}

fn build_case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("preamble pattern is assembled from escaped literals")
}

/// Removes runs of straight quotes at either end, paired or not.
fn strip_quotes(text: &str) -> &str {
    text.trim().trim_matches(QUOTES).trim()
}

/// Convenience wrapper over the shared normalizer.
pub fn clean_translation(raw: &str, target_lang: &str) -> String {
    TranslationNormalizer::global().clean(raw, target_lang)
}
