//! Speech recognition converter.

use std::sync::Arc;

use stimex_core::{
    ConverterEntry, Converter, Dependency, Providers, SpeechRecognizer, StimexError, StimexResult,
    Stimulus, StimulusKind, StimulusType, TextSequence, TextUnit, Transformer,
    TransformerDescriptor,
};
use tracing::debug;

/// Transcribes audio into a sequence of timed words.
///
/// Word onsets reported by the recognizer are relative to the start of the
/// clip and are shifted by the clip's own onset, so words from a clip cut
/// out of a longer recording line up with the original timeline.
pub struct SpeechToTextConverter {
    descriptor: TransformerDescriptor,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl SpeechToTextConverter {
    pub const NAME: &'static str = "SpeechToTextConverter";

    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("service", recognizer.service_name());
        Self {
            descriptor,
            recognizer,
        }
    }

    pub fn from_providers(providers: &Providers) -> StimexResult<Self> {
        let recognizer = providers
            .speech_recognizer()
            .ok_or_else(|| StimexError::MissingDependency {
                converter: Self::NAME.to_string(),
                step: 1,
                dependency: Dependency::SpeechRecognizer,
            })?;
        Ok(Self::new(recognizer))
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::Audio.into(),
            StimulusKind::TextSequence.into(),
            |providers| Ok(Arc::new(Self::from_providers(providers)?) as Arc<dyn Converter>),
        )
        .with_requires(vec![Dependency::SpeechRecognizer])
    }
}

impl Transformer for SpeechToTextConverter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::Audio.into()
    }
}

impl Converter for SpeechToTextConverter {
    fn output_type(&self) -> StimulusType {
        StimulusKind::TextSequence.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let audio = match stim {
            Stimulus::Audio(audio) => audio,
            other => return Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        };

        let offset = audio.meta.onset.unwrap_or(0.0);
        let words = self.recognizer.transcribe(audio)?;
        debug!(
            audio = %audio.meta.name,
            service = self.recognizer.service_name(),
            words = words.len(),
            "Transcribed audio"
        );

        let elements = words
            .into_iter()
            .map(|w| TextUnit::timed(w.text, w.onset.map(|o| o + offset), w.duration))
            .collect::<StimexResult<Vec<_>>>()?;

        let mut sequence = TextSequence::new(audio.meta.name.clone(), elements);
        sequence.meta.onset = audio.meta.onset;
        sequence.meta.duration = audio.meta.duration;
        Ok(vec![sequence.into()])
    }
}
