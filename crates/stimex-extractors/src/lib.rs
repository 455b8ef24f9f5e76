//! stimex-extractors - Feature extraction for stimex.
//!
//! Provides text feature extractors (dictionary lookup, length, unique
//! words, part of speech, word embeddings, bag of words, sentiment, timed
//! words) and the pipeline that converts stimuli into the types those
//! extractors accept.
//!
//! # Example
//!
//! ```ignore
//! use stimex_extractors::{ExtractionPipeline, ExtractorFactory};
//!
//! let pipeline = ExtractionPipeline::new()
//!     .add_extractor(ExtractorFactory::length())
//!     .add_extractor(ExtractorFactory::part_of_speech(tagger))
//!     .with_providers(providers);
//! let table = pipeline.run(&[video.into()])?;
//! println!("{}", table.to_json()?);
//! ```

mod datasets;
mod dictionary;
mod embedding;
mod factory;
mod pipeline;
pub mod pos;
mod sentiment;
mod text;
mod vectorizer;

use std::sync::Once;

use stimex_core::StimexConfig;
use tracing::info;

pub use datasets::{DictionarySource, DirectoryDictionarySource, InMemoryDictionarySource};
pub use dictionary::{
    Dictionary, DictionaryExtractor, DictionaryVariables, PredefinedDictionaryExtractor,
};
pub use embedding::{EmbeddingTable, KeyedVectors, WordEmbeddingExtractor, MAX_EMBEDDING_DIM};
pub use factory::{ExtractorFactory, VADER_LEXICON_FILE};
pub use pipeline::ExtractionPipeline;
pub use pos::{LexiconTagger, PartOfSpeechExtractor, PosTagger, PENN_TREEBANK_TAGS};
pub use sentiment::{SentimentAnalyzer, SentimentScores, VaderAnalyzer, VaderSentimentExtractor};
pub use text::{ComplexTextExtractor, LengthExtractor, NumUniqueWordsExtractor};
pub use vectorizer::{CountVectorizer, TextVectorizer, TextVectorizerExtractor, Vectorized};

static INIT: Once = Once::new();

/// Register the default converters and extractors in the process-wide
/// registry, resolving resources against `config`.
///
/// Only the first call registers.
pub fn init_registry(config: &StimexConfig) {
    stimex_converters::init_registry();
    INIT.call_once(|| {
        stimex_core::register_global(|registry| ExtractorFactory::register_defaults(registry, config));
        info!("Registered default extractors");
    });
}
