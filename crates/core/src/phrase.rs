//! Phrase Book
//!
//! Spoken prompts are looked up by symbolic key and may carry `%` slots that
//! are filled positionally at delivery time. The book is built once at
//! startup and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Key spoken whenever a requested key is missing from the book.
pub const FALLBACK_KEY: &str = "ouch";

/// Keys the session and the listener expect to find.
pub const REQUIRED_KEYS: &[&str] = &[
    "invite-start",
    "engage",
    "accepted",
    "sit",
    "explain",
    "questions",
    "start",
    "encourage",
    "not-crossed",
    "disengaged",
    "assess-high",
    "assess-low",
    "end",
    "greetings",
    "speed",
    "aid",
    "repetition",
    "unclear",
    "not-known",
    "feedback-high",
    "feedback-medium",
    "feedback-low",
    FALLBACK_KEY,
];

#[derive(Debug, thiserror::Error)]
pub enum PhraseError {
    #[error("Unable to read phrase file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid phrase file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Phrase file contains no phrases")]
    Empty,
}

/// A positional value substituted into a `%` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParam(String);

impl SpeechParam {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeechParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for SpeechParam {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<f64> for SpeechParam {
    fn from(value: f64) -> Self {
        // Rust's float formatting is already the shortest round-trip form.
        Self(value.to_string())
    }
}

impl From<&str> for SpeechParam {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SpeechParam {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Fills the `%` slots of `template` with `params`, in order.
///
/// Without parameters the template is returned untouched, `%` included.
/// With parameters, every piece between slots is followed by the next
/// parameter still available: slots left over once they run out are
/// removed, and the first parameter without a slot lands after the last
/// piece. Any further parameters are ignored.
pub fn render_template(template: &str, params: &[SpeechParam]) -> String {
    if params.is_empty() {
        return template.to_string();
    }
    let mut rendered = String::with_capacity(template.len());
    let mut params = params.iter();
    for piece in template.split('%') {
        rendered.push_str(piece);
        if let Some(param) = params.next() {
            rendered.push_str(param.as_str());
        }
    }
    rendered
}

/// A phrase looked up in the book.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub text: &'a str,
    /// Whether the requested key itself exists, regardless of fallback.
    pub found: bool,
}

/// Immutable mapping from phrase key to template.
#[derive(Debug, Clone, Default)]
pub struct PhraseBook {
    phrases: HashMap<String, String>,
}

impl PhraseBook {
    pub fn from_map(phrases: HashMap<String, String>) -> Self {
        Self { phrases }
    }

    /// Parses a JSON object of `key -> template` pairs.
    pub fn from_json_str(json: &str) -> Result<Self, PhraseError> {
        let phrases: HashMap<String, String> = serde_json::from_str(json)?;
        if phrases.is_empty() {
            return Err(PhraseError::Empty);
        }
        let book = Self { phrases };
        for key in book.missing_keys() {
            warn!(key, "Phrase book has no entry for key");
        }
        Ok(book)
    }

    pub fn load(path: &Path) -> Result<Self, PhraseError> {
        let json = std::fs::read_to_string(path).map_err(|source| PhraseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.phrases.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.phrases.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Looks `key` up, falling back to the `"ouch"` phrase (or nothing).
    pub fn resolve(&self, key: &str) -> Resolved<'_> {
        match self.get(key) {
            Some(text) => Resolved { text, found: true },
            None => Resolved {
                text: self.get(FALLBACK_KEY).unwrap_or(""),
                found: false,
            },
        }
    }

    /// Resolves `key` and renders it with `params`.
    pub fn render(&self, key: &str, params: &[SpeechParam]) -> (String, bool) {
        let resolved = self.resolve(key);
        (render_template(resolved.text, params), resolved.found)
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| !self.contains(k))
            .collect()
    }
}
