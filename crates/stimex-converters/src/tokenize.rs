//! Text tokenizers.
//!
//! The richer [`RegexTokenizer`] is the default; [`WhitespaceTokenizer`] is
//! the fallback when no richer tokenizer is wanted. Which one a
//! transformer uses is chosen explicitly through [`TokenizerChoice`] at
//! construction, so a bad pattern surfaces there rather than mid-run.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use stimex_core::{StimexError, StimexResult};

/// Word pattern separating words, currency amounts and punctuation.
pub const DEFAULT_WORD_PATTERN: &str = r"\w+|\$[\d\.]+|\S+";

/// Splits text into tokens borrowed from the input.
pub trait Tokenizer: Send + Sync {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str>;

    /// Short description recorded in transformer provenance.
    fn describe(&self) -> String;
}

/// Splits on Unicode whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_whitespace().collect()
    }

    fn describe(&self) -> String {
        "whitespace".to_string()
    }
}

/// Emits every non-overlapping match of a pattern.
#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    pattern: Regex,
}

impl RegexTokenizer {
    pub fn new(pattern: &str) -> StimexResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| StimexError::validation(format!("Invalid token pattern '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    /// Tokenizer using [`DEFAULT_WORD_PATTERN`].
    pub fn words() -> Self {
        static WORDS: once_cell::sync::Lazy<Regex> =
            once_cell::sync::Lazy::new(|| Regex::new(DEFAULT_WORD_PATTERN).unwrap());
        Self {
            pattern: WORDS.clone(),
        }
    }
}

impl Default for RegexTokenizer {
    fn default() -> Self {
        Self::words()
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.pattern.find_iter(text).map(|m| m.as_str()).collect()
    }

    fn describe(&self) -> String {
        format!("regex:{}", self.pattern.as_str())
    }
}

/// Which tokenizer a transformer should use.
#[derive(Clone, Default)]
pub enum TokenizerChoice {
    /// [`RegexTokenizer::words`].
    #[default]
    Words,
    /// [`WhitespaceTokenizer`].
    Whitespace,
    /// A [`RegexTokenizer`] with a custom pattern.
    Pattern(String),
    /// Caller-supplied implementation.
    Custom(Arc<dyn Tokenizer>),
}

impl TokenizerChoice {
    pub fn build(&self) -> StimexResult<Arc<dyn Tokenizer>> {
        Ok(match self {
            Self::Words => Arc::new(RegexTokenizer::words()),
            Self::Whitespace => Arc::new(WhitespaceTokenizer),
            Self::Pattern(p) => Arc::new(RegexTokenizer::new(p)?),
            Self::Custom(t) => Arc::clone(t),
        })
    }
}

impl fmt::Debug for TokenizerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Words => write!(f, "Words"),
            Self::Whitespace => write!(f, "Whitespace"),
            Self::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            Self::Custom(t) => f.debug_tuple("Custom").field(&t.describe()).finish(),
        }
    }
}
