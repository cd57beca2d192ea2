//! The generation collaborator: given a prompt and sampling parameters, a hosted
//! model returns text. Implementations may fail with a rate limit or anything else.

pub mod watsonx;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::GenerationParams;
use crate::error::UpstreamError;

pub use watsonx::WatsonxClient;

/// Raw upstream response, before any cleanup.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    /// A JSON document, normally `{"results": [{"generated_text": ...}, ...]}`.
    Structured(Value),
    Text(String),
}

impl GenerationResult {
    /// Generated text of the first result. Documents without a `results` list are
    /// stringified; a `results` list without text is malformed.
    pub fn into_text(self) -> Result<String, UpstreamError> {
        match self {
            GenerationResult::Text(text) => Ok(text),
            GenerationResult::Structured(value) => match value.get("results") {
                Some(results) => results
                    .get(0)
                    .and_then(|first| first.get("generated_text"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        UpstreamError::Malformed("results carry no generated_text".into())
                    }),
                None => Ok(match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                }),
            },
        }
    }
}

impl From<String> for GenerationResult {
    fn from(text: String) -> Self {
        GenerationResult::Text(text)
    }
}

impl From<&str> for GenerationResult {
    fn from(text: &str) -> Self {
        GenerationResult::Text(text.to_string())
    }
}

/// Text-generation backend (adapter for different hosted models).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationResult, UpstreamError>;

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn takes_first_generated_text() {
        let result = GenerationResult::Structured(json!({
            "results": [{"generated_text": " Bonjour"}, {"generated_text": "ignored"}]
        }));
        assert_eq!(result.into_text().unwrap(), " Bonjour");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(GenerationResult::from("Hola").into_text().unwrap(), "Hola");
    }

    #[test]
    fn documents_without_results_are_stringified() {
        let result = GenerationResult::Structured(json!({"output": "x"}));
        assert_eq!(result.into_text().unwrap(), r#"{"output":"x"}"#);
        let bare = GenerationResult::Structured(json!("just text"));
        assert_eq!(bare.into_text().unwrap(), "just text");
    }

    #[test]
    fn empty_results_are_malformed() {
        let result = GenerationResult::Structured(json!({"results": []}));
        assert!(matches!(result.into_text(), Err(UpstreamError::Malformed(_))));
    }
}
