//! Simple text statistics.

use std::collections::HashSet;
use std::sync::Arc;

use stimex_converters::{Tokenizer, TokenizerChoice, WhitespaceTokenizer};
use stimex_core::{
    Extractor, ExtractorResult, FeatureValue, StimexError, StimexResult, Stimulus, StimulusKind,
    StimulusType, Transformer, TransformerDescriptor,
};
use tracing::warn;

/// Text of a text unit or document.
pub(crate) fn text_of<'a>(transformer: &str, stim: &'a Stimulus) -> StimexResult<&'a str> {
    match stim {
        Stimulus::TextUnit(unit) => Ok(&unit.text),
        Stimulus::TextDocument(doc) => Ok(&doc.text),
        other => Err(StimexError::incompatible(transformer, other.name(), other.kind())),
    }
}

/// Character count of the text with surrounding whitespace stripped.
#[derive(Debug, Clone)]
pub struct LengthExtractor {
    descriptor: TransformerDescriptor,
}

impl LengthExtractor {
    pub const NAME: &'static str = "LengthExtractor";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }
}

impl Default for LengthExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for LengthExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for LengthExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let length = text_of(self.name(), stim)?.trim().chars().count();
        ExtractorResult::new(
            vec![vec![length.into()]],
            stim,
            &self.descriptor,
            vec!["text_length".to_string()],
        )
    }
}

/// Number of distinct tokens in the text.
pub struct NumUniqueWordsExtractor {
    descriptor: TransformerDescriptor,
    tokenizer: Arc<dyn Tokenizer>,
}

impl NumUniqueWordsExtractor {
    pub const NAME: &'static str = "NumUniqueWordsExtractor";

    /// Fails if `choice` names an invalid pattern.
    pub fn new(choice: &TokenizerChoice) -> StimexResult<Self> {
        let tokenizer = choice.build()?;
        Ok(Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0")
                .with_param("tokenizer", tokenizer.describe()),
            tokenizer,
        })
    }

    /// Like [`new`](Self::new), but splits on whitespace when `choice`
    /// cannot be built. The fallback is logged and recorded as a parameter.
    pub fn with_fallback(choice: &TokenizerChoice) -> Self {
        match Self::new(choice) {
            Ok(ext) => ext,
            Err(e) => {
                warn!(error = %e, "Tokenizer unavailable, falling back to whitespace splitting");
                let tokenizer: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer);
                Self {
                    descriptor: TransformerDescriptor::new(Self::NAME, "1.0")
                        .with_param("tokenizer", tokenizer.describe())
                        .with_param("fallback", true),
                    tokenizer,
                }
            }
        }
    }
}

impl Transformer for NumUniqueWordsExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for NumUniqueWordsExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let text = text_of(self.name(), stim)?;
        let unique: HashSet<&str> = self.tokenizer.tokenize(text).into_iter().collect();
        ExtractorResult::new(
            vec![vec![unique.len().into()]],
            stim,
            &self.descriptor,
            vec!["num_unique_words".to_string()],
        )
    }
}

/// Lists the words of a text sequence with their timing, one row each.
#[derive(Debug, Clone)]
pub struct ComplexTextExtractor {
    descriptor: TransformerDescriptor,
}

impl ComplexTextExtractor {
    pub const NAME: &'static str = "ComplexTextExtractor";

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(Self::NAME, "1.0"),
        }
    }
}

impl Default for ComplexTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for ComplexTextExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::TextSequence.into()
    }
}

impl Extractor for ComplexTextExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let seq = match stim {
            Stimulus::TextSequence(seq) => seq,
            other => return Err(StimexError::incompatible(self.name(), other.name(), other.kind())),
        };
        let values = seq
            .elements
            .iter()
            .map(|e| vec![FeatureValue::Text(e.text.clone())])
            .collect();
        let onsets = seq.elements.iter().map(|e| e.meta.onset).collect();
        let durations = seq.elements.iter().map(|e| e.meta.duration).collect();
        ExtractorResult::new(values, stim, &self.descriptor, vec!["word".to_string()])?
            .with_timing(onsets, durations)
    }
}
