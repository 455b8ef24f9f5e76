//! External collaborators used by converters.
//!
//! Media decoding, speech recognition and OCR live outside the core. A
//! [`Providers`] bundle carries whichever of them a deployment has
//! configured; converters check it at construction and the registry skips
//! converters whose collaborators are absent.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::StimexResult;
use crate::stimulus::{AudioClip, ImageFrame, VideoClip};

/// A kind of external collaborator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    MediaDecoder,
    SpeechRecognizer,
    TextRecognizer,
}

/// Decodes audio tracks and frames out of video clips.
pub trait MediaDecoder: Send + Sync {
    /// Extract the audio track.
    fn decode_audio(&self, video: &VideoClip) -> StimexResult<AudioClip>;

    /// Decode frame `index` (0-based).
    fn decode_frame(&self, video: &VideoClip, index: usize) -> StimexResult<ImageFrame>;
}

/// A recognized word with optional timing relative to the audio start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribedWord {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl TranscribedWord {
    pub fn new(text: impl Into<String>, onset: Option<f64>, duration: Option<f64>) -> Self {
        Self {
            text: text.into(),
            onset,
            duration,
        }
    }
}

/// Speech-to-text service.
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe an audio clip into timed words.
    fn transcribe(&self, audio: &AudioClip) -> StimexResult<Vec<TranscribedWord>>;

    /// Service name, recorded in converter provenance.
    fn service_name(&self) -> &str;
}

/// Optical character recognition.
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text shown in an image.
    fn recognize(&self, image: &ImageFrame) -> StimexResult<String>;

    /// Engine name, recorded in converter provenance.
    fn engine_name(&self) -> &str;
}

/// The collaborators available to converters.
#[derive(Clone, Default)]
pub struct Providers {
    media_decoder: Option<Arc<dyn MediaDecoder>>,
    speech_recognizer: Option<Arc<dyn SpeechRecognizer>>,
    text_recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl Providers {
    /// No collaborators configured.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media_decoder(mut self, decoder: Arc<dyn MediaDecoder>) -> Self {
        self.media_decoder = Some(decoder);
        self
    }

    pub fn with_speech_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.speech_recognizer = Some(recognizer);
        self
    }

    pub fn with_text_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.text_recognizer = Some(recognizer);
        self
    }

    pub fn media_decoder(&self) -> Option<Arc<dyn MediaDecoder>> {
        self.media_decoder.clone()
    }

    pub fn speech_recognizer(&self) -> Option<Arc<dyn SpeechRecognizer>> {
        self.speech_recognizer.clone()
    }

    pub fn text_recognizer(&self) -> Option<Arc<dyn TextRecognizer>> {
        self.text_recognizer.clone()
    }

    /// Whether `dep` is configured.
    pub fn has(&self, dep: Dependency) -> bool {
        match dep {
            Dependency::MediaDecoder => self.media_decoder.is_some(),
            Dependency::SpeechRecognizer => self.speech_recognizer.is_some(),
            Dependency::TextRecognizer => self.text_recognizer.is_some(),
        }
    }

    /// First dependency in `deps` that is not configured.
    pub fn first_missing(&self, deps: &[Dependency]) -> Option<Dependency> {
        deps.iter().copied().find(|d| !self.has(*d))
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("media_decoder", &self.media_decoder.is_some())
            .field("speech_recognizer", &self.speech_recognizer.is_some())
            .field("text_recognizer", &self.text_recognizer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ocr;

    impl TextRecognizer for Ocr {
        fn recognize(&self, _image: &ImageFrame) -> StimexResult<String> {
            Ok("Exit".to_string())
        }
        fn engine_name(&self) -> &str {
            "fake"
        }
    }

    #[test]
    fn test_capability_check() {
        let providers = Providers::new().with_text_recognizer(Arc::new(Ocr));
        assert!(providers.has(Dependency::TextRecognizer));
        assert!(!providers.has(Dependency::MediaDecoder));
        assert_eq!(
            providers.first_missing(&[Dependency::TextRecognizer, Dependency::SpeechRecognizer]),
            Some(Dependency::SpeechRecognizer)
        );
        assert_eq!(providers.first_missing(&[Dependency::TextRecognizer]), None);
    }

    #[test]
    fn test_dependency_display() {
        assert_eq!(Dependency::SpeechRecognizer.to_string(), "speech_recognizer");
    }
}
