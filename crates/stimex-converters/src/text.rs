//! Converters between text documents and text sequences.

use std::sync::Arc;

use stimex_core::{
    ConverterEntry, Converter, StimexError, StimexResult, Stimulus, StimulusKind, StimulusType,
    TextDocument, TextSequence, TextUnit, Transformer, TransformerDescriptor,
};

use crate::tokenize::{Tokenizer, TokenizerChoice};

/// Splits a document into a sequence of tokens.
///
/// With a `default_duration`, token `i` starts at `onset + i * duration`
/// where `onset` is the document's own onset (or zero).
pub struct TokenizingConverter {
    descriptor: TransformerDescriptor,
    tokenizer: Arc<dyn Tokenizer>,
    default_duration: Option<f64>,
}

impl TokenizingConverter {
    pub const NAME: &'static str = "TokenizingConverter";

    pub fn new(choice: &TokenizerChoice) -> StimexResult<Self> {
        let tokenizer = choice.build()?;
        Ok(Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0")
                .with_param("tokenizer", tokenizer.describe()),
            tokenizer,
            default_duration: None,
        })
    }

    pub fn with_default_duration(mut self, duration: f64) -> StimexResult<Self> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(StimexError::validation(format!(
                "default_duration must be finite and non-negative, got {}",
                duration
            )));
        }
        self.default_duration = Some(duration);
        self.descriptor = self.descriptor.with_param("default_duration", duration);
        Ok(self)
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::TextDocument.into(),
            StimulusKind::TextSequence.into(),
            |_| Ok(Arc::new(Self::new(&TokenizerChoice::default())?) as Arc<dyn Converter>),
        )
    }
}

impl Transformer for TokenizingConverter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::TextDocument.into()
    }
}

impl Converter for TokenizingConverter {
    fn output_type(&self) -> StimulusType {
        StimulusKind::TextSequence.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let doc = match stim {
            Stimulus::TextDocument(doc) => doc,
            other => return Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        };

        let start = doc.meta.onset.unwrap_or(0.0);
        let elements = self
            .tokenizer
            .tokenize(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let onset = self.default_duration.map(|d| start + i as f64 * d);
                TextUnit::timed(token, onset, self.default_duration)
            })
            .collect::<StimexResult<Vec<_>>>()?;

        let mut sequence = TextSequence::new(doc.meta.name.clone(), elements);
        sequence.meta.onset = doc.meta.onset;
        sequence.meta.duration = doc.meta.duration;
        Ok(vec![sequence.into()])
    }
}

/// Joins a sequence back into one document.
///
/// The document starts at the first timed word and spans to the end of the
/// last one; untimed sequences keep the sequence's own timing.
#[derive(Debug, Clone)]
pub struct SequenceToDocumentConverter {
    descriptor: TransformerDescriptor,
}

impl SequenceToDocumentConverter {
    pub const NAME: &'static str = "SequenceToDocumentConverter";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }

    pub fn entry() -> ConverterEntry {
        ConverterEntry::new(
            Self::NAME,
            StimulusKind::TextSequence.into(),
            StimulusKind::TextDocument.into(),
            |_| Ok(Arc::new(Self::new()) as Arc<dyn Converter>),
        )
    }
}

impl Default for SequenceToDocumentConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn span(seq: &TextSequence) -> (Option<f64>, Option<f64>) {
    let start = seq.elements.iter().filter_map(|e| e.meta.onset).reduce(f64::min);
    let end = seq
        .elements
        .iter()
        .filter_map(|e| e.meta.onset.map(|o| o + e.meta.duration.unwrap_or(0.0)))
        .reduce(f64::max);
    match (start, end) {
        (Some(start), Some(end)) => (Some(start), Some(end - start)),
        _ => (seq.meta.onset, seq.meta.duration),
    }
}

impl Transformer for SequenceToDocumentConverter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::TextSequence.into()
    }
}

impl Converter for SequenceToDocumentConverter {
    fn output_type(&self) -> StimulusType {
        StimulusKind::TextDocument.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let seq = match stim {
            Stimulus::TextSequence(seq) => seq,
            other => return Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        };
        let (onset, duration) = span(seq);
        let mut doc = TextDocument::new(seq.meta.name.clone(), seq.text());
        doc.meta = doc.meta.with_timing(onset, duration)?;
        Ok(vec![doc.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_document() {
        let conv = TokenizingConverter::new(&TokenizerChoice::Words)
            .unwrap()
            .with_default_duration(0.5)
            .unwrap();
        let mut doc = TextDocument::new("doc", "Hi, there.");
        doc.meta.onset = Some(1.0);

        let out = conv.convert(&doc.into()).unwrap();
        let Stimulus::TextSequence(seq) = &out[0] else {
            panic!("expected text sequence");
        };
        let words: Vec<_> = seq.elements.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(words, vec!["Hi", ",", "there", "."]);
        assert_eq!(seq.elements[2].meta.onset, Some(2.0));
        assert_eq!(seq.meta.onset, Some(1.0));
    }

    #[test]
    fn test_untimed_tokens_by_default() {
        let conv = TokenizingConverter::new(&TokenizerChoice::Whitespace).unwrap();
        let out = conv.convert(&TextDocument::new("d", "a b").into()).unwrap();
        let Stimulus::TextSequence(seq) = &out[0] else {
            panic!("expected text sequence");
        };
        assert!(seq.elements.iter().all(|e| e.meta.onset.is_none()));
    }

    #[test]
    fn test_rejects_negative_default_duration() {
        let conv = TokenizingConverter::new(&TokenizerChoice::Whitespace).unwrap();
        assert!(conv.with_default_duration(-1.0).is_err());
    }

    #[test]
    fn test_document_spans_words() {
        let seq = TextSequence::new(
            "transcript",
            vec![
                TextUnit::timed("hello", Some(2.0), Some(0.4)).unwrap(),
                TextUnit::timed("world", Some(2.5), Some(0.3)).unwrap(),
            ],
        );
        let out = SequenceToDocumentConverter::new().convert(&seq.into()).unwrap();
        assert_eq!(out[0].text().unwrap(), "hello world");
        assert_eq!(out[0].name(), "transcript");
        assert_eq!(out[0].onset(), Some(2.0));
        let duration = out[0].duration().unwrap();
        assert!((duration - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_untimed_sequence_keeps_own_timing() {
        let mut seq = TextSequence::from_text("s", "a b", None).unwrap();
        seq.meta.onset = Some(3.0);
        let out = SequenceToDocumentConverter::new().convert(&seq.into()).unwrap();
        assert_eq!(out[0].onset(), Some(3.0));
        assert_eq!(out[0].duration(), None);
    }
}
