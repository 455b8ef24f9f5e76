//! Converters that unpack sequence containers into their elements.

use std::sync::Arc;

use stimex_core::{
    ConverterEntry, Converter, StimexError, StimexResult, Stimulus, StimulusKind, StimulusType,
    Transformer, TransformerDescriptor,
};

/// Splits a text sequence into its text units.
#[derive(Debug, Clone)]
pub struct ComplexTextIterator {
    descriptor: TransformerDescriptor,
}

impl ComplexTextIterator {
    pub const NAME: &'static str = "ComplexTextIterator";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::TextSequence.into(),
            StimulusKind::TextUnit.into(),
            |_| Ok(Arc::new(Self::new()) as Arc<dyn Converter>),
        )
    }
}

impl Default for ComplexTextIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for ComplexTextIterator {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::TextSequence.into()
    }
}

impl Converter for ComplexTextIterator {
    fn output_type(&self) -> StimulusType {
        StimulusKind::TextUnit.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        match stim {
            Stimulus::TextSequence(seq) => {
                Ok(seq.elements.iter().cloned().map(Stimulus::from).collect())
            }
            other => Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        }
    }
}

/// Splits a frame sequence into individual images.
#[derive(Debug, Clone)]
pub struct FrameSequenceIterator {
    descriptor: TransformerDescriptor,
}

impl FrameSequenceIterator {
    pub const NAME: &'static str = "FrameSequenceIterator";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::VideoFrames.into(),
            StimulusKind::Image.into(),
            |_| Ok(Arc::new(Self::new()) as Arc<dyn Converter>),
        )
    }
}

impl Default for FrameSequenceIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for FrameSequenceIterator {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::VideoFrames.into()
    }
}

impl Converter for FrameSequenceIterator {
    fn output_type(&self) -> StimulusType {
        StimulusKind::Image.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        match stim {
            Stimulus::VideoFrames(seq) => {
                Ok(seq.frames.iter().cloned().map(Stimulus::from).collect())
            }
            other => Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        }
    }
}
