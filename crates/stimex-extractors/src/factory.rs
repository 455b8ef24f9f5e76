//! Factory for creating extractors.

use std::path::PathBuf;
use std::sync::Arc;

use stimex_converters::TokenizerChoice;
use stimex_core::{
    Extractor, ExtractorEntry, FeatureValue, StimexConfig, StimexError, StimexResult, StimulusKind,
    StimulusType, TransformerRegistry,
};

use crate::datasets::{DictionarySource, DirectoryDictionarySource};
use crate::dictionary::{DictionaryExtractor, DictionaryVariables, PredefinedDictionaryExtractor};
use crate::embedding::{EmbeddingTable, WordEmbeddingExtractor};
use crate::pos::{PartOfSpeechExtractor, PosTagger};
use crate::sentiment::{SentimentAnalyzer, VaderSentimentExtractor};
use crate::text::{ComplexTextExtractor, LengthExtractor, NumUniqueWordsExtractor};
use crate::vectorizer::TextVectorizerExtractor;

/// File name of the VADER lexicon inside the dictionary directory.
pub const VADER_LEXICON_FILE: &str = "vader_lexicon.txt";

/// Factory for creating feature extractors.
pub struct ExtractorFactory;

impl ExtractorFactory {
    pub fn length() -> Arc<dyn Extractor> {
        Arc::new(LengthExtractor::new())
    }

    /// Create a unique word counter. Fails on an invalid tokenizer pattern.
    pub fn num_unique_words(choice: &TokenizerChoice) -> StimexResult<Arc<dyn Extractor>> {
        Ok(Arc::new(NumUniqueWordsExtractor::new(choice)?))
    }

    pub fn complex_text() -> Arc<dyn Extractor> {
        Arc::new(ComplexTextExtractor::new())
    }

    /// Create a bag-of-words extractor with the default count vectorizer.
    pub fn vectorizer() -> Arc<dyn Extractor> {
        Arc::new(TextVectorizerExtractor::default())
    }

    pub fn part_of_speech(tagger: Arc<dyn PosTagger>) -> Arc<dyn Extractor> {
        Arc::new(PartOfSpeechExtractor::new(tagger))
    }

    pub fn word_embedding(table: Arc<dyn EmbeddingTable>) -> Arc<dyn Extractor> {
        Arc::new(WordEmbeddingExtractor::new(table))
    }

    pub fn sentiment(analyzer: Arc<dyn SentimentAnalyzer>) -> Arc<dyn Extractor> {
        Arc::new(VaderSentimentExtractor::new(analyzer))
    }

    /// Create a dictionary extractor over a TSV file.
    pub fn dictionary(
        path: impl Into<PathBuf>,
        variables: Option<Vec<String>>,
        missing: FeatureValue,
    ) -> StimexResult<Arc<dyn Extractor>> {
        Ok(Arc::new(DictionaryExtractor::from_tsv(path.into(), variables, missing)?))
    }

    /// Create a predefined dictionary extractor reading from the configured
    /// dictionary directory.
    pub fn predefined_dictionary(
        variables: DictionaryVariables,
        config: &StimexConfig,
    ) -> StimexResult<Arc<dyn Extractor>> {
        let source = DirectoryDictionarySource::from_config(config);
        Self::predefined_dictionary_from(variables, config, &source)
    }

    pub fn predefined_dictionary_from(
        variables: DictionaryVariables,
        config: &StimexConfig,
        source: &dyn DictionarySource,
    ) -> StimexResult<Arc<dyn Extractor>> {
        Ok(Arc::new(PredefinedDictionaryExtractor::new(
            variables,
            FeatureValue::Missing,
            config.case_sensitive,
            source,
        )?))
    }

    /// Create a VADER extractor from the lexicon in the dictionary directory.
    pub fn vader(config: &StimexConfig) -> StimexResult<Arc<dyn Extractor>> {
        let path = config.dictionary_dir.join(VADER_LEXICON_FILE);
        Ok(Arc::new(VaderSentimentExtractor::from_lexicon_path(path)?))
    }

    /// Create extractor by registered name, for extractors that need no
    /// collaborator.
    pub fn for_name(name: &str) -> StimexResult<Arc<dyn Extractor>> {
        match name {
            LengthExtractor::NAME => Ok(Self::length()),
            NumUniqueWordsExtractor::NAME => Self::num_unique_words(&TokenizerChoice::default()),
            ComplexTextExtractor::NAME => Ok(Self::complex_text()),
            TextVectorizerExtractor::NAME => Ok(Self::vectorizer()),
            _ => Err(StimexError::validation(format!("Unknown extractor '{}'", name))),
        }
    }

    /// Get all extractors that need no external resource.
    pub fn all() -> Vec<Arc<dyn Extractor>> {
        vec![
            Self::length(),
            Arc::new(NumUniqueWordsExtractor::with_fallback(&TokenizerChoice::default()))
                as Arc<dyn Extractor>,
            Self::complex_text(),
            Self::vectorizer(),
        ]
    }

    /// Registry entries for the resource-free extractors.
    pub fn entries() -> Vec<ExtractorEntry> {
        vec![
            ExtractorEntry::new(LengthExtractor::NAME, StimulusType::AnyText, || Ok(Self::length())),
            ExtractorEntry::new(NumUniqueWordsExtractor::NAME, StimulusType::AnyText, || {
                Self::num_unique_words(&TokenizerChoice::default())
            }),
            ExtractorEntry::new(
                ComplexTextExtractor::NAME,
                StimulusKind::TextSequence.into(),
                || Ok(Self::complex_text()),
            ),
            ExtractorEntry::new(TextVectorizerExtractor::NAME, StimulusType::AnyText, || {
                Ok(Self::vectorizer())
            }),
        ]
    }

    /// Register the resource-free extractors, plus the VADER extractor
    /// reading its lexicon from `config` when built.
    pub fn register_defaults(registry: &mut TransformerRegistry, config: &StimexConfig) {
        for entry in Self::entries() {
            registry.register_extractor(entry);
        }
        let config = config.clone();
        registry.register_extractor(ExtractorEntry::new(
            VaderSentimentExtractor::NAME,
            StimulusType::AnyText,
            move || Self::vader(&config),
        ));
    }
}
