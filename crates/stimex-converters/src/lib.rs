//! stimex-converters - Stimulus converters for stimex.
//!
//! Converters reshape a stimulus into the type an extractor accepts:
//! video into audio or frames, audio into timed words, images into text,
//! documents into word sequences and back. Multistep chains bridge types
//! no single converter connects, and text filters clean text in place.
//!
//! Converters that depend on external collaborators (media decoding,
//! speech recognition, OCR) are built from a `Providers` bundle.
//!
//! # Example
//!
//! ```ignore
//! use stimex_converters::{init_registry, ConverterFactory};
//! use stimex_core::Providers;
//!
//! init_registry();
//! let providers = Providers::new().with_media_decoder(decoder).with_speech_recognizer(asr);
//! let chain = ConverterFactory::video_to_complex_text(&providers)?;
//! let words = chain.convert(&video)?;
//! ```

mod factory;
mod filters;
mod image;
mod iterators;
mod multistep;
mod speech;
mod text;
pub mod tokenize;
mod video;

use std::sync::Once;

use tracing::info;

pub use factory::ConverterFactory;
pub use filters::{LowercaseFilter, PunctuationRemovalFilter, TokenRemovalFilter, ENGLISH_STOPWORDS};
pub use image::ImageToTextConverter;
pub use iterators::{ComplexTextIterator, FrameSequenceIterator};
pub use multistep::{MultistepConverter, VideoToComplexTextConverter, VideoToTextConverter};
pub use speech::SpeechToTextConverter;
pub use text::{SequenceToDocumentConverter, TokenizingConverter};
pub use tokenize::{RegexTokenizer, Tokenizer, TokenizerChoice, WhitespaceTokenizer};
pub use video::{VideoFrameIterator, VideoToAudioConverter};

static INIT: Once = Once::new();

/// Register the default converters in the process-wide registry.
///
/// Safe to call any number of times; only the first call registers.
pub fn init_registry() {
    INIT.call_once(|| {
        stimex_core::register_global(ConverterFactory::register_defaults);
        info!("Registered default converters");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimex_core::Providers;

    #[test]
    fn test_init_registry_idempotent() {
        init_registry();
        let first = stimex_core::global_registry().converter_names().len();
        init_registry();
        assert_eq!(stimex_core::global_registry().converter_names().len(), first);
        assert!(stimex_core::global_registry()
            .converter("VideoToTextConverter")
            .is_some());
        assert!(!stimex_core::global_registry()
            .converter("VideoToTextConverter")
            .map(|e| e.is_available(&Providers::new()))
            .unwrap_or(true));
    }
}
