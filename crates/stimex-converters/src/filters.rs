//! Text filters.
//!
//! Filters are converters whose output has the same kind as their input:
//! a text unit stays a text unit, a document stays a document. They keep
//! the input's name and timing. Filters are not part of the conversion
//! graph; callers apply them explicitly.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use stimex_core::{
    Converter, StimexError, StimexResult, Stimulus, StimulusType, TextDocument, TextUnit,
    Transformer, TransformerDescriptor,
};

use crate::tokenize::{Tokenizer, TokenizerChoice};

/// English stopword list.
pub const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

static DEFAULT_REMOVAL: Lazy<HashSet<String>> = Lazy::new(|| {
    let punctuation = (0u8..=127)
        .map(char::from)
        .filter(char::is_ascii_punctuation)
        .map(String::from);
    ENGLISH_STOPWORDS
        .iter()
        .map(|w| w.to_string())
        .chain(punctuation)
        .collect()
});

/// Rebuild a text stimulus of the same kind with new text, keeping its
/// metadata.
fn with_text(filter: &str, stim: &Stimulus, text: String) -> StimexResult<Stimulus> {
    match stim {
        Stimulus::TextUnit(unit) => Ok(TextUnit {
            text,
            meta: unit.meta.clone(),
        }
        .into()),
        Stimulus::TextDocument(doc) => Ok(TextDocument {
            text,
            meta: doc.meta.clone(),
        }
        .into()),
        other => Err(StimexError::incompatible(filter, other.name(), other.kind())),
    }
}

fn stimulus_text<'a>(filter: &str, stim: &'a Stimulus) -> StimexResult<&'a str> {
    match stim {
        Stimulus::TextUnit(unit) => Ok(&unit.text),
        Stimulus::TextDocument(doc) => Ok(&doc.text),
        other => Err(StimexError::incompatible(filter, other.name(), other.kind())),
    }
}

macro_rules! text_filter {
    ($ty:ty) => {
        impl Transformer for $ty {
            fn descriptor(&self) -> &TransformerDescriptor {
                &self.descriptor
            }

            fn input_type(&self) -> StimulusType {
                StimulusType::AnyText
            }
        }

        impl Converter for $ty {
            fn output_type(&self) -> StimulusType {
                StimulusType::AnyText
            }

            fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
                let text = self.apply(stimulus_text(self.name(), stim)?);
                Ok(vec![with_text(self.name(), stim, text)?])
            }
        }
    };
}

/// Strips ASCII punctuation characters.
#[derive(Debug, Clone)]
pub struct PunctuationRemovalFilter {
    descriptor: TransformerDescriptor,
}

impl PunctuationRemovalFilter {
    pub const NAME: &'static str = "PunctuationRemovalFilter";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
    }
}

impl Default for PunctuationRemovalFilter {
    fn default() -> Self {
        Self::new()
    }
}

text_filter!(PunctuationRemovalFilter);

/// Drops tokens found in a removal set and rejoins the rest with spaces.
///
/// Matching is case-sensitive. The default set is [`ENGLISH_STOPWORDS`]
/// plus every ASCII punctuation character.
pub struct TokenRemovalFilter {
    descriptor: TransformerDescriptor,
    tokenizer: Arc<dyn Tokenizer>,
    tokens: HashSet<String>,
}

impl TokenRemovalFilter {
    pub const NAME: &'static str = "TokenRemovalFilter";

    pub fn new() -> Self {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(crate::tokenize::RegexTokenizer::words());
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0")
                .with_param("tokens", "english_stopwords+punctuation")
                .with_param("tokenizer", tokenizer.describe()),
            tokenizer,
            tokens: DEFAULT_REMOVAL.clone(),
        }
    }

    /// Remove a custom token set, splitting text with `choice`.
    pub fn with_tokens<I, S>(tokens: I, choice: &TokenizerChoice) -> StimexResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokenizer = choice.build()?;
        let tokens: HashSet<String> = tokens.into_iter().map(Into::into).collect();
        let recorded: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("tokens", recorded.into_iter().collect::<Vec<_>>())
            .with_param("tokenizer", tokenizer.describe());
        Ok(Self {
            descriptor,
            tokenizer,
            tokens,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        self.tokenizer
            .tokenize(text)
            .into_iter()
            .filter(|t| !self.tokens.contains(*t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for TokenRemovalFilter {
    fn default() -> Self {
        Self::new()
    }
}

text_filter!(TokenRemovalFilter);

/// Lowercases text.
#[derive(Debug, Clone)]
pub struct LowercaseFilter {
    descriptor: TransformerDescriptor,
}

impl LowercaseFilter {
    pub const NAME: &'static str = "LowercaseFilter";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        text.to_lowercase()
    }
}

impl Default for LowercaseFilter {
    fn default() -> Self {
        Self::new()
    }
}

text_filter!(LowercaseFilter);
