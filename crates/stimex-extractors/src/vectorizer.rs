//! Bag-of-words vectorization.
//!
//! The vocabulary is fitted on each batch of documents handed to the
//! extractor and is not kept between calls.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use stimex_core::{
    BatchStrategy, Extractor, ExtractorResult, FeatureValue, StimexError, StimexResult, Stimulus,
    StimulusType, Transformer, TransformerDescriptor,
};
use tracing::debug;

use crate::text::text_of;

/// Feature rows for a fitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Vectorized {
    pub features: Vec<String>,
    pub rows: Vec<Vec<FeatureValue>>,
}

/// Fits on a batch of documents and returns one row per document.
pub trait TextVectorizer: Send + Sync {
    fn fit_transform(&self, documents: &[&str]) -> StimexResult<Vectorized>;

    /// Short description recorded in extractor provenance.
    fn describe(&self) -> String;
}

/// Token counts over a sorted vocabulary.
#[derive(Debug, Clone)]
pub struct CountVectorizer {
    token_pattern: Regex,
    lowercase: bool,
    binary: bool,
    stop_words: HashSet<String>,
}

impl CountVectorizer {
    pub const DEFAULT_TOKEN_PATTERN: &'static str = r"\b\w\w+\b";

    pub fn new() -> Self {
        static PATTERN: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
            Regex::new(CountVectorizer::DEFAULT_TOKEN_PATTERN).expect("default token pattern")
        });
        Self {
            token_pattern: PATTERN.clone(),
            lowercase: true,
            binary: false,
            stop_words: HashSet::new(),
        }
    }

    pub fn with_token_pattern(mut self, pattern: &str) -> StimexResult<Self> {
        self.token_pattern = Regex::new(pattern)
            .map_err(|e| StimexError::validation(format!("Invalid token pattern '{}': {}", pattern, e)))?;
        Ok(self)
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    /// Record presence (1) instead of counts.
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    fn tokens(&self, document: &str) -> Vec<String> {
        let text = if self.lowercase {
            document.to_lowercase()
        } else {
            document.to_string()
        };
        self.token_pattern
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .filter(|t| !self.stop_words.contains(t))
            .collect()
    }
}

impl Default for CountVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextVectorizer for CountVectorizer {
    fn fit_transform(&self, documents: &[&str]) -> StimexResult<Vectorized> {
        let counts: Vec<BTreeMap<String, i64>> = documents
            .iter()
            .map(|doc| {
                let mut counts = BTreeMap::new();
                for token in self.tokens(doc) {
                    *counts.entry(token).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let vocabulary: Vec<String> = counts
            .iter()
            .flat_map(|c| c.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = counts
            .iter()
            .map(|doc| {
                vocabulary
                    .iter()
                    .map(|term| {
                        let n = doc.get(term).copied().unwrap_or(0);
                        FeatureValue::Integer(if self.binary { n.min(1) } else { n })
                    })
                    .collect()
            })
            .collect();

        Ok(Vectorized {
            features: vocabulary,
            rows,
        })
    }

    fn describe(&self) -> String {
        format!(
            "CountVectorizer(token_pattern={}, lowercase={}, binary={})",
            self.token_pattern.as_str(),
            self.lowercase,
            self.binary
        )
    }
}

/// Bag-of-words features fitted jointly over each batch.
pub struct TextVectorizerExtractor {
    descriptor: TransformerDescriptor,
    vectorizer: Arc<dyn TextVectorizer>,
    batch: BatchStrategy,
}

impl TextVectorizerExtractor {
    pub const NAME: &'static str = "TextVectorizerExtractor";

    pub fn new(vectorizer: Arc<dyn TextVectorizer>) -> Self {
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("vectorizer", vectorizer.describe());
        Self {
            descriptor,
            vectorizer,
            batch: BatchStrategy::unbounded(),
        }
    }

    /// Fitting per chunk changes the vocabulary each document sees.
    pub fn with_batch_strategy(mut self, batch: BatchStrategy) -> Self {
        self.batch = batch;
        self
    }
}

impl Default for TextVectorizerExtractor {
    fn default() -> Self {
        Self::new(Arc::new(CountVectorizer::new()))
    }
}

impl Transformer for TextVectorizerExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }

    fn batch_strategy(&self) -> Option<BatchStrategy> {
        Some(self.batch)
    }
}

impl Extractor for TextVectorizerExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let mut results = self.extract_chunk(&[stim])?;
        results
            .pop()
            .ok_or(StimexError::TaggingMismatch { expected: 1, actual: 0 })
    }

    fn extract_chunk(&self, stims: &[&Stimulus]) -> StimexResult<Vec<ExtractorResult>> {
        let documents = stims
            .iter()
            .map(|s| text_of(self.name(), s))
            .collect::<StimexResult<Vec<_>>>()?;
        let fitted = self.vectorizer.fit_transform(&documents)?;
        if fitted.rows.len() != stims.len() {
            return Err(StimexError::TaggingMismatch {
                expected: stims.len(),
                actual: fitted.rows.len(),
            });
        }
        debug!(documents = stims.len(), vocabulary = fitted.features.len(), "Fitted vectorizer");

        let Vectorized { features, rows } = fitted;
        stims
            .iter()
            .zip(rows)
            .map(|(stim, row)| ExtractorResult::new(vec![row], stim, &self.descriptor, features.clone()))
            .collect()
    }
}
