//! stimex-core - Core library for stimex.
//!
//! This crate provides the stimulus type system, the transformer traits
//! every converter and extractor implements, batch execution, the result
//! model, and the registry used to resolve conversions between stimulus
//! types.
//!
//! # Example
//!
//! ```ignore
//! use stimex_core::{Extractor, Stimulus, TextUnit, ResultTable};
//!
//! let stims: Vec<Stimulus> = ["cat", "dog"].iter().map(|w| TextUnit::new(*w).into()).collect();
//! let results = extractor.extract_many(&stims)?;
//! let table = ResultTable::merge(&results);
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod registry;
pub mod result;
pub mod stimulus;
pub mod transformer;

// Re-export commonly used types
pub use batch::BatchStrategy;
pub use config::StimexConfig;
pub use error::{ErrorCode, StimexError, StimexResult};
pub use providers::{
    Dependency, MediaDecoder, Providers, SpeechRecognizer, TextRecognizer, TranscribedWord,
};
pub use registry::{
    global_registry, register_global, ConverterEntry, ConverterFn, ExtractorEntry,
    ExtractorFn, TieBreak, TransformerRegistry,
};
pub use result::{ExtractorResult, FeatureValue, LongRecord, ResultColumn, ResultRow, ResultTable};
pub use stimulus::{
    AudioClip, ImageFrame, Stimulus, StimulusKind, StimulusMeta, StimulusRef, StimulusType,
    TextDocument, TextSequence, TextUnit, TransformationStep, VideoClip, VideoFrameSequence,
};
pub use transformer::{Converter, Extractor, Params, Transformer, TransformerDescriptor};
