//! Factory for creating converters.

use std::sync::Arc;

use stimex_core::{
    ConverterEntry, Converter, Providers, StimexError, StimexResult, StimulusKind, StimulusType,
    TieBreak, TransformerRegistry,
};

use crate::filters::{LowercaseFilter, PunctuationRemovalFilter, TokenRemovalFilter};
use crate::image::ImageToTextConverter;
use crate::iterators::{ComplexTextIterator, FrameSequenceIterator};
use crate::multistep::{MultistepConverter, VideoToComplexTextConverter, VideoToTextConverter};
use crate::speech::SpeechToTextConverter;
use crate::text::{SequenceToDocumentConverter, TokenizingConverter};
use crate::tokenize::TokenizerChoice;
use crate::video::{VideoFrameIterator, VideoToAudioConverter};

/// Factory for creating stimulus converters.
pub struct ConverterFactory;

impl ConverterFactory {
    /// Create a video-to-audio converter.
    pub fn video_to_audio(providers: &Providers) -> StimexResult<Arc<dyn Converter>> {
        Ok(Arc::new(VideoToAudioConverter::from_providers(providers)?))
    }

    /// Create a frame sampler keeping every `every`-th frame.
    pub fn video_frames(providers: &Providers, every: usize) -> StimexResult<Arc<dyn Converter>> {
        Ok(Arc::new(VideoFrameIterator::from_providers(providers, every)?))
    }

    /// Create a speech recognition converter.
    pub fn speech_to_text(providers: &Providers) -> StimexResult<Arc<dyn Converter>> {
        Ok(Arc::new(SpeechToTextConverter::from_providers(providers)?))
    }

    /// Create an OCR converter.
    pub fn image_to_text(providers: &Providers) -> StimexResult<Arc<dyn Converter>> {
        Ok(Arc::new(ImageToTextConverter::from_providers(providers)?))
    }

    /// Create a tokenizing converter.
    pub fn tokenize(choice: &TokenizerChoice) -> StimexResult<Arc<dyn Converter>> {
        Ok(Arc::new(TokenizingConverter::new(choice)?))
    }

    pub fn sequence_to_document() -> Arc<dyn Converter> {
        Arc::new(SequenceToDocumentConverter::new())
    }

    pub fn text_units() -> Arc<dyn Converter> {
        Arc::new(ComplexTextIterator::new())
    }

    pub fn frames() -> Arc<dyn Converter> {
        Arc::new(FrameSequenceIterator::new())
    }

    /// Create the video transcript chain.
    pub fn video_to_text(providers: &Providers) -> StimexResult<Arc<MultistepConverter>> {
        Ok(Arc::new(VideoToTextConverter::build(providers)?))
    }

    /// Create the timed-words chain.
    pub fn video_to_complex_text(providers: &Providers) -> StimexResult<Arc<MultistepConverter>> {
        Ok(Arc::new(VideoToComplexTextConverter::build(providers)?))
    }

    /// Create a text filter by name.
    pub fn filter(name: &str) -> StimexResult<Arc<dyn Converter>> {
        match name {
            PunctuationRemovalFilter::NAME => Ok(Arc::new(PunctuationRemovalFilter::new())),
            TokenRemovalFilter::NAME => Ok(Arc::new(TokenRemovalFilter::new())),
            LowercaseFilter::NAME => Ok(Arc::new(LowercaseFilter::new())),
            _ => Err(StimexError::validation(format!("Unknown filter '{}'", name))),
        }
    }

    /// Registry entries for every conversion-graph converter, in
    /// registration order. Single-step converters come before chains.
    pub fn entries() -> Vec<ConverterEntry> {
        vec![
            VideoToAudioConverter::entry(),
            VideoFrameIterator::entry(),
            FrameSequenceIterator::entry(),
            SpeechToTextConverter::entry(),
            ImageToTextConverter::entry(),
            ComplexTextIterator::entry(),
            SequenceToDocumentConverter::entry(),
            TokenizingConverter::entry(),
            VideoToTextConverter::entry(),
            VideoToComplexTextConverter::entry(),
        ]
    }

    /// Register every converter in `registry`.
    pub fn register_defaults(registry: &mut TransformerRegistry) {
        for entry in Self::entries() {
            registry.register_converter(entry);
        }
    }

    /// Best available converter from `input` to `target` among the
    /// defaults, by registration order.
    pub fn for_target(
        input: StimulusKind,
        target: StimulusType,
        providers: &Providers,
    ) -> StimexResult<Arc<dyn Converter>> {
        let mut registry = TransformerRegistry::new();
        Self::register_defaults(&mut registry);
        registry
            .get_converter(input, target, &[], TieBreak::RegistrationOrder, providers)
            .ok_or_else(|| {
                StimexError::validation(format!("No available converter from {} to {}", input, target))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimex_core::Transformer;

    #[test]
    fn test_entries_unique() {
        let entries = ConverterFactory::entries();
        let mut names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), entries.len());
    }

    #[test]
    fn test_for_target_without_collaborators() {
        let conv = ConverterFactory::for_target(
            StimulusKind::TextDocument,
            StimulusKind::TextSequence.into(),
            &Providers::new(),
        )
        .unwrap();
        assert_eq!(conv.name(), "TokenizingConverter");

        assert!(ConverterFactory::for_target(
            StimulusKind::Video,
            StimulusType::AnyText,
            &Providers::new()
        )
        .is_err());
    }

    #[test]
    fn test_filter_by_name() {
        assert_eq!(
            ConverterFactory::filter("LowercaseFilter").unwrap().name(),
            "LowercaseFilter"
        );
        assert!(ConverterFactory::filter("WordStemmingFilter").is_err());
    }
}
