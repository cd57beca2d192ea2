//! Translation pipeline: request/result types, prompt construction, response cache
//! and output normalization.

pub mod cache;
pub mod normalize;

use serde::{Deserialize, Serialize};

pub use cache::ResponseCache;
pub use normalize::{clean_translation, TranslationNormalizer};

/// Prefix carried by every translation that failed upstream.
pub const ERROR_PREFIX: &str = "Error:";

/// Translation result. Failures are carried in `translated_text` as an
/// `"Error: ..."` string rather than as an error value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub original_text: String,
    pub translated_text: String,
    pub from_language: String,
    pub to_language: String,
    pub cached: bool,
}

impl Translation {
    /// Whether `translated_text` is an error description.
    pub fn is_error(&self) -> bool {
        self.translated_text.starts_with(ERROR_PREFIX)
    }
}

/// Build the translation prompt. The trailing label primes a single-line answer.
pub fn build_prompt(text: &str, to_language: &str) -> String {
    format!(
        "Translate this exact text to {to_language}. Do not add any words, do not complete \
         sentences, do not explain anything.\nInput: {text}\nTranslation:"
    )
}

/// Caller-visible failure strings.
pub(crate) fn rate_limit_message() -> String {
    format!("{ERROR_PREFIX} Rate limit exceeded. Please try again in a moment.")
}

pub(crate) fn failure_message(detail: &str) -> String {
    format!("{ERROR_PREFIX} {detail}")
}

pub(crate) fn exhausted_message(attempts: u32) -> String {
    format!("{ERROR_PREFIX} Translation failed after {attempts} attempts")
}
