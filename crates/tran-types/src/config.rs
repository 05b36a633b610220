//! Resolved translation configuration sent with every translate request.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration the engine hands to the producer.
///
/// Only `max_chars` is read by the consumer; everything else is passed
/// through opaquely to the translation source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Language the text should be translated into (e.g. "English").
    pub target_language: String,
    /// System prompt template; `{{ target_language }}` is substituted.
    pub prompt_template: String,
    /// Character budget for caret-window extraction.
    pub max_chars: usize,
    /// Model identifier understood by the endpoint.
    pub model: String,
    /// Normalized API base URL (ends with `/v1`).
    pub endpoint: String,
    /// API credential. Empty means "not configured".
    #[serde(default)]
    pub api_key: String,
}

impl TranslationConfig {
    /// Returns whether a non-blank credential is present.
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("TranslationConfig")
            .field("target_language", &self.target_language)
            .field("prompt_template_len", &self.prompt_template.len())
            .field("max_chars", &self.max_chars)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &api_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(api_key: &str) -> TranslationConfig {
        TranslationConfig {
            target_language: "English".to_string(),
            prompt_template: "Translate to {{ target_language }}.".to_string(),
            max_chars: 500,
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.example.com/v1".to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[test]
    fn test_debug_never_prints_credential() {
        let rendered = format!("{:?}", sample("sk-secret-value"));
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_blank_credential_is_missing() {
        assert!(!sample("   ").has_credential());
        assert!(sample("sk-1").has_credential());
    }

    #[test]
    fn test_missing_api_key_field_deserializes_empty() {
        let json = serde_json::json!({
            "target_language": "Japanese",
            "prompt_template": "t",
            "max_chars": 10,
            "model": "m",
            "endpoint": "http://localhost/v1"
        });
        let config: TranslationConfig = serde_json::from_value(json).unwrap();
        assert!(!config.has_credential());
    }
}
