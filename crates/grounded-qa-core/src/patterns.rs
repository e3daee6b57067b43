//! Fixed-phrase classifiers used by the answer synthesizer.
//!
//! Each classifier is a case-insensitive substring match against an explicit
//! list of phrases. The lists are versioned and deserializable so callers can
//! override them from configuration or in tests.

use serde::{Deserialize, Serialize};

/// Version of the built-in lists below. Bump when any default list changes.
pub const DEFAULT_PATTERN_VERSION: u32 = 1;

/// Phrases marking adversarial instructions inside retrieved text.
pub const DEFAULT_INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "reveal secrets",
    "system prompt",
    "developer message",
    "exfiltrate",
];

/// Question terms that require strong grounding before answering.
pub const DEFAULT_SENSITIVE_TERMS: &[&str] = &[
    "phone", "number", "email", "password", "ssn", "secret", "api key",
];

/// Question terms that mark a numeric-style request.
pub const DEFAULT_NUMERIC_TERMS: &[&str] =
    &["numeric", "number", "percent", "percentage", "metric", "value"];

/// The three phrase lists, as one versioned unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSet {
    pub version: u32,
    pub injection: Vec<String>,
    pub sensitive: Vec<String>,
    pub numeric: Vec<String>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            version: DEFAULT_PATTERN_VERSION,
            injection: to_owned(DEFAULT_INJECTION_PATTERNS),
            sensitive: to_owned(DEFAULT_SENSITIVE_TERMS),
            numeric: to_owned(DEFAULT_NUMERIC_TERMS),
        }
    }
}

fn to_owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn contains_any(text: &str, patterns: &[String]) -> bool {
    let lowered = text.to_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
}

impl PatternSet {
    /// True if `sentence` contains a prompt-injection phrase.
    pub fn is_injection(&self, sentence: &str) -> bool {
        contains_any(sentence, &self.injection)
    }

    /// True if `question` asks for sensitive data.
    pub fn is_sensitive_request(&self, question: &str) -> bool {
        contains_any(question, &self.sensitive)
    }

    /// True if `question` asks for a numeric fact.
    pub fn is_numeric_request(&self, question: &str) -> bool {
        contains_any(question, &self.numeric)
    }
}
