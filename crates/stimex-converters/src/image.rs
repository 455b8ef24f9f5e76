//! Optical character recognition converter.

use std::sync::Arc;

use stimex_core::{
    ConverterEntry, Converter, Dependency, Providers, StimexError, StimexResult, Stimulus,
    StimulusKind, StimulusType, TextDocument, TextRecognizer, Transformer, TransformerDescriptor,
};
use tracing::debug;

/// Reads the text shown in an image.
///
/// The resulting document is named `text[<recognized text>]` and keeps the
/// image's onset and duration.
pub struct ImageToTextConverter {
    descriptor: TransformerDescriptor,
    recognizer: Arc<dyn TextRecognizer>,
}

impl ImageToTextConverter {
    pub const NAME: &'static str = "ImageToTextConverter";

    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("engine", recognizer.engine_name());
        Self {
            descriptor,
            recognizer,
        }
    }

    pub fn from_providers(providers: &Providers) -> StimexResult<Self> {
        let recognizer = providers
            .text_recognizer()
            .ok_or_else(|| StimexError::MissingDependency {
                converter: Self::NAME.to_string(),
                step: 1,
                dependency: Dependency::TextRecognizer,
            })?;
        Ok(Self::new(recognizer))
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::Image.into(),
            StimulusKind::TextDocument.into(),
            |providers| Ok(Arc::new(Self::from_providers(providers)?) as Arc<dyn Converter>),
        )
        .with_requires(vec![Dependency::TextRecognizer])
    }
}

impl Transformer for ImageToTextConverter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::Image.into()
    }
}

impl Converter for ImageToTextConverter {
    fn output_type(&self) -> StimulusType {
        StimulusKind::TextDocument.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let image = match stim {
            Stimulus::Image(image) => image,
            other => return Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        };

        let raw = self.recognizer.recognize(image)?;
        let text = raw.trim();
        debug!(image = %image.meta.name, chars = text.len(), "Recognized text");

        let mut doc = TextDocument::new(format!("text[{}]", text), text);
        doc.meta.onset = image.meta.onset;
        doc.meta.duration = image.meta.duration;
        Ok(vec![doc.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimex_core::ImageFrame;

    struct Sign;

    impl TextRecognizer for Sign {
        fn recognize(&self, _image: &ImageFrame) -> StimexResult<String> {
            Ok("Exit\n".to_string())
        }

        fn engine_name(&self) -> &str {
            "sign"
        }
    }

    #[test]
    fn test_recognized_text_names_document() {
        let mut image = ImageFrame::new("button.jpg", vec![0u8; 4], 2, 2, 1).unwrap();
        image.meta.onset = Some(4.2);

        let out = ImageToTextConverter::new(Arc::new(Sign))
            .convert(&image.into())
            .unwrap();
        assert_eq!(out[0].name(), "text[Exit]");
        assert_eq!(out[0].text().unwrap(), "Exit");
        assert_eq!(out[0].onset(), Some(4.2));
        assert_eq!(out[0].meta().history[0].source_name, "button.jpg");
    }
}
