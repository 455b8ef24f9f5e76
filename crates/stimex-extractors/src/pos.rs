//! Part-of-speech tagging.

use std::collections::HashMap;
use std::sync::Arc;

use stimex_core::{
    BatchStrategy, Extractor, ExtractorResult, FeatureValue, StimexError, StimexResult, Stimulus,
    StimulusKind, StimulusType, Transformer, TransformerDescriptor,
};
use tracing::debug;

/// The Penn Treebank tag inventory.
pub const PENN_TREEBANK_TAGS: [&str; 45] = [
    "$", "''", "(", ")", ",", "--", ".", ":", "CC", "CD", "DT", "EX", "FW", "IN", "JJ", "JJR",
    "JJS", "LS", "MD", "NN", "NNP", "NNPS", "NNS", "PDT", "POS", "PRP", "PRP$", "RB", "RBR",
    "RBS", "RP", "SYM", "TO", "UH", "VB", "VBD", "VBG", "VBN", "VBP", "VBZ", "WDT", "WP", "WP$",
    "WRB", "``",
];

/// Tags a batch of words jointly.
pub trait PosTagger: Send + Sync {
    /// One tag per word, in order.
    fn tag(&self, words: &[&str]) -> StimexResult<Vec<String>>;

    /// Tagger name, recorded in extractor provenance.
    fn name(&self) -> &str;
}

/// Unigram tagger backed by a word → tag lexicon.
///
/// Unknown words are tagged `CD` when numeric, with their own symbol when
/// they are punctuation in the inventory, and with the default tag
/// otherwise.
#[derive(Debug, Clone)]
pub struct LexiconTagger {
    lexicon: HashMap<String, String>,
    default_tag: String,
}

impl LexiconTagger {
    pub fn new(lexicon: HashMap<String, String>) -> Self {
        Self {
            lexicon,
            default_tag: "NN".to_string(),
        }
    }

    pub fn with_default_tag(mut self, tag: impl Into<String>) -> Self {
        self.default_tag = tag.into();
        self
    }

    fn tag_word(&self, word: &str) -> String {
        if let Some(tag) = self
            .lexicon
            .get(word)
            .or_else(|| self.lexicon.get(&word.to_lowercase()))
        {
            return tag.clone();
        }
        if word.parse::<f64>().is_ok() {
            return "CD".to_string();
        }
        if word.chars().all(|c| c.is_ascii_punctuation()) && PENN_TREEBANK_TAGS.iter().any(|t| *t == word) {
            return word.to_string();
        }
        self.default_tag.clone()
    }
}

impl PosTagger for LexiconTagger {
    fn tag(&self, words: &[&str]) -> StimexResult<Vec<String>> {
        Ok(words.iter().map(|w| self.tag_word(w)).collect())
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// One-hot part-of-speech vector per word.
///
/// Words are tagged jointly per chunk. A tagger returning a different
/// number of tags than words is a fatal alignment error.
pub struct PartOfSpeechExtractor {
    descriptor: TransformerDescriptor,
    tagger: Arc<dyn PosTagger>,
    tagset: Vec<String>,
    batch: BatchStrategy,
}

impl PartOfSpeechExtractor {
    pub const NAME: &'static str = "PartOfSpeechExtractor";

    /// Extractor over the Penn Treebank inventory.
    pub fn new(tagger: Arc<dyn PosTagger>) -> Self {
        Self::with_tagset(tagger, PENN_TREEBANK_TAGS.iter().map(|t| t.to_string()).collect())
    }

    /// Extractor over a custom tag inventory.
    pub fn with_tagset(tagger: Arc<dyn PosTagger>, tagset: Vec<String>) -> Self {
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("tagger", tagger.name())
            .with_param("tagset_size", tagset.len());
        Self {
            descriptor,
            tagger,
            tagset,
            batch: BatchStrategy::unbounded(),
        }
    }

    pub fn with_batch_strategy(mut self, batch: BatchStrategy) -> Self {
        self.batch = batch;
        self
    }

    pub fn tagset(&self) -> &[String] {
        &self.tagset
    }
}

impl Transformer for PartOfSpeechExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::TextUnit.into()
    }

    fn batch_strategy(&self) -> Option<BatchStrategy> {
        Some(self.batch)
    }
}

impl Extractor for PartOfSpeechExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let mut results = self.extract_chunk(&[stim])?;
        results
            .pop()
            .ok_or(StimexError::TaggingMismatch { expected: 1, actual: 0 })
    }

    fn extract_chunk(&self, stims: &[&Stimulus]) -> StimexResult<Vec<ExtractorResult>> {
        let words = stims
            .iter()
            .map(|s| match s {
                Stimulus::TextUnit(unit) => Ok(unit.text.as_str()),
                other => Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
            })
            .collect::<StimexResult<Vec<_>>>()?;

        let tags = self.tagger.tag(&words)?;
        if tags.len() != words.len() {
            return Err(StimexError::TaggingMismatch {
                expected: words.len(),
                actual: tags.len(),
            });
        }
        debug!(words = words.len(), tagger = self.tagger.name(), "Tagged chunk");

        stims
            .iter()
            .zip(&tags)
            .map(|(stim, tag)| {
                let hot = self.tagset.iter().position(|t| t == tag).ok_or_else(|| {
                    StimexError::invalid_result(format!(
                        "tag '{}' for '{}' is not in the tag inventory",
                        tag,
                        stim.name()
                    ))
                })?;
                let row = (0..self.tagset.len())
                    .map(|i| FeatureValue::Integer(i64::from(i == hot)))
                    .collect();
                ExtractorResult::new(vec![row], stim, &self.descriptor, self.tagset.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimex_core::TextUnit;

    fn tagger() -> Arc<LexiconTagger> {
        let lexicon = [("the", "DT"), ("dog", "NN"), ("barks", "VBZ"), ("quickly", "RB")]
            .into_iter()
            .map(|(w, t)| (w.to_string(), t.to_string()))
            .collect();
        Arc::new(LexiconTagger::new(lexicon))
    }

    fn units(words: &[&str]) -> Vec<Stimulus> {
        words.iter().map(|w| TextUnit::new(*w).into()).collect()
    }

    #[test]
    fn test_inventory_has_45_tags() {
        let mut tags = PENN_TREEBANK_TAGS.to_vec();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), 45);
    }

    #[test]
    fn test_one_hot_rows() {
        let ext = PartOfSpeechExtractor::new(tagger());
        let results = ext.extract_many(&units(&["The", "dog", "barks", "42", "."])).unwrap();
        assert_eq!(results.len(), 5);
        let expected = ["DT", "NN", "VBZ", "CD", "."];
        for (result, tag) in results.iter().zip(expected) {
            let total: f64 = result.values()[0].iter().filter_map(FeatureValue::as_f64).sum();
            assert_eq!(total, 1.0);
            assert_eq!(result.get(tag), Some(&FeatureValue::Integer(1)));
            assert_eq!(result.features().len(), 45);
        }
    }

    #[test]
    fn test_chunked_batches_keep_order() {
        let ext = PartOfSpeechExtractor::new(tagger()).with_batch_strategy(BatchStrategy::with_size(2));
        let stims = units(&["the", "dog", "barks", "quickly", "the"]);
        let results = ext.extract_many(&stims).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.stimulus().name.clone()).collect();
        assert_eq!(names, vec!["the", "dog", "barks", "quickly", "the"]);
        assert_eq!(results[3].get("RB"), Some(&FeatureValue::Integer(1)));
    }

    #[test]
    fn test_tag_outside_inventory() {
        let ext = PartOfSpeechExtractor::with_tagset(tagger(), vec!["NN".into(), "VB".into()]);
        let err = ext.extract(&TextUnit::new("the").into()).unwrap_err();
        assert!(matches!(err, StimexError::InvalidResult(_)));
    }
}
