//! Multistep conversion chains.
//!
//! A [`MultistepConverter`] runs an ordered list of converters, feeding
//! every output of step `k` into step `k + 1`. A failing step aborts the
//! whole chain with [`StimexError::Conversion`] naming the step; nothing
//! from a partially run chain is returned.
//!
//! Chains whose steps need external collaborators are assembled lazily
//! from registry entries. Every step is checked before any runs, so a
//! missing collaborator is reported as [`StimexError::MissingDependency`]
//! for that step rather than as a failure further down.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use stimex_core::{
    ConverterEntry, Converter, Dependency, Providers, StimexError, StimexResult, Stimulus,
    StimulusType, Transformer, TransformerDescriptor,
};
use tracing::{debug, warn};

use crate::speech::SpeechToTextConverter;
use crate::text::SequenceToDocumentConverter;
use crate::video::VideoToAudioConverter;

enum Steps {
    Built(Vec<Arc<dyn Converter>>),
    Lazy {
        entries: Vec<ConverterEntry>,
        providers: Providers,
        resolved: OnceCell<Vec<Arc<dyn Converter>>>,
    },
}

/// A converter composed of other converters.
pub struct MultistepConverter {
    descriptor: TransformerDescriptor,
    input: StimulusType,
    output: StimulusType,
    steps: Steps,
}

fn check_links<'a>(
    chain: &str,
    links: impl Iterator<Item = (&'a str, StimulusType, StimulusType)>,
) -> StimexResult<(StimulusType, StimulusType, Vec<String>)> {
    let mut names = Vec::new();
    let mut first: Option<StimulusType> = None;
    let mut last: Option<(String, StimulusType)> = None;
    for (name, input, output) in links {
        if let Some((prev, prev_output)) = &last {
            if !input.covers(prev_output) {
                return Err(StimexError::validation(format!(
                    "{}: {} produces {} which {} (accepting {}) cannot take",
                    chain, prev, prev_output, name, input
                )));
            }
        }
        first.get_or_insert(input);
        names.push(name.to_string());
        last = Some((name.to_string(), output));
    }
    match (first, last) {
        (Some(input), Some((_, output))) => Ok((input, output, names)),
        _ => Err(StimexError::validation(format!("{}: a chain needs at least one step", chain))),
    }
}

impl MultistepConverter {
    /// Chain already-built converters.
    pub fn from_converters(
        name: impl Into<String>,
        converters: Vec<Arc<dyn Converter>>,
    ) -> StimexResult<Self> {
        let name = name.into();
        let (input, output, names) = check_links(
            &name,
            converters
                .iter()
                .map(|c| (c.name(), c.input_type(), c.output_type())),
        )?;
        Ok(Self {
            descriptor: TransformerDescriptor::new(name, "1.0").with_param("steps", names),
            input,
            output,
            steps: Steps::Built(converters),
        })
    }

    /// Chain registry entries, building them from `providers` on first use.
    pub fn lazy(
        name: impl Into<String>,
        entries: Vec<ConverterEntry>,
        providers: Providers,
    ) -> StimexResult<Self> {
        let name = name.into();
        let (input, output, names) = check_links(
            &name,
            entries.iter().map(|e| (e.name.as_str(), e.input, e.output)),
        )?;
        Ok(Self {
            descriptor: TransformerDescriptor::new(name, "1.0").with_param("steps", names),
            input,
            output,
            steps: Steps::Lazy {
                entries,
                providers,
                resolved: OnceCell::new(),
            },
        })
    }

    /// Number of steps in the chain.
    pub fn len(&self) -> usize {
        match &self.steps {
            Steps::Built(converters) => converters.len(),
            Steps::Lazy { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The step converters, building lazy steps if needed.
    pub fn steps(&self) -> StimexResult<&[Arc<dyn Converter>]> {
        match &self.steps {
            Steps::Built(converters) => Ok(converters),
            Steps::Lazy {
                entries,
                providers,
                resolved,
            } => resolved
                .get_or_try_init(|| self.resolve(entries, providers))
                .map(Vec::as_slice),
        }
    }

    fn resolve(
        &self,
        entries: &[ConverterEntry],
        providers: &Providers,
    ) -> StimexResult<Vec<Arc<dyn Converter>>> {
        for (index, entry) in entries.iter().enumerate() {
            if let Some(dependency) = providers.first_missing(&entry.requires) {
                warn!(
                    chain = self.name(),
                    step = index + 1,
                    converter = %entry.name,
                    %dependency,
                    "Chain step lacks a collaborator"
                );
                return Err(StimexError::MissingDependency {
                    converter: self.name().to_string(),
                    step: index + 1,
                    dependency,
                });
            }
        }

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.build(providers).map_err(|e| match e {
                    StimexError::MissingDependency { dependency, .. } => {
                        StimexError::MissingDependency {
                            converter: self.name().to_string(),
                            step: index + 1,
                            dependency,
                        }
                    }
                    other => StimexError::conversion(self.name(), index + 1, &entry.name, other),
                })
            })
            .collect()
    }
}

impl Transformer for MultistepConverter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        self.input
    }
}

impl Converter for MultistepConverter {
    fn output_type(&self) -> StimulusType {
        self.output
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let steps = self.steps()?;
        let mut current = vec![stim.clone()];
        for (index, step) in steps.iter().enumerate() {
            let mut next = Vec::new();
            for item in &current {
                let outputs = step
                    .convert(item)
                    .map_err(|e| StimexError::conversion(self.name(), index + 1, step.name(), e))?;
                next.extend(outputs);
            }
            debug!(
                chain = self.name(),
                step = index + 1,
                converter = step.name(),
                outputs = next.len(),
                "Chain step complete"
            );
            current = next;
        }
        Ok(current)
    }

    // Each step stamps its own outputs.
    fn records_history(&self) -> bool {
        false
    }
}

fn chain_entry(name: &'static str, steps: fn() -> Vec<ConverterEntry>) -> ConverterEntry {
    let entries = steps();
    let mut requires: Vec<Dependency> = Vec::new();
    for dep in entries.iter().flat_map(|e| e.requires.iter().copied()) {
        if !requires.contains(&dep) {
            requires.push(dep);
        }
    }
    let input = entries.first().map(|e| e.input).unwrap_or(StimulusType::Any);
    let output = entries.last().map(|e| e.output).unwrap_or(StimulusType::Any);
    let members = entries.iter().map(|e| e.name.clone()).collect();
    ConverterEntry::new(name, input, output, move |providers| {
        Ok(Arc::new(MultistepConverter::lazy(name, steps(), providers.clone())?) as Arc<dyn Converter>)
    })
    .with_requires(requires)
    .with_chain(members)
}

/// Video to transcript document: audio track, speech recognition, join.
pub struct VideoToTextConverter;

impl VideoToTextConverter {
    pub const NAME: &'static str = "VideoToTextConverter";

    fn steps() -> Vec<ConverterEntry> {
        vec![
            VideoToAudioConverter::entry(),
            SpeechToTextConverter::entry(),
            SequenceToDocumentConverter::entry(),
        ]
    }

    pub fn build(providers: &Providers) -> StimexResult<MultistepConverter> {
        MultistepConverter::lazy(Self::NAME, Self::steps(), providers.clone())
    }

    pub fn entry() -> ConverterEntry {
        chain_entry(Self::NAME, Self::steps)
    }
}

/// Video to timed words: audio track, speech recognition.
pub struct VideoToComplexTextConverter;

impl VideoToComplexTextConverter {
    pub const NAME: &'static str = "VideoToComplexTextConverter";

    fn steps() -> Vec<ConverterEntry> {
        vec![VideoToAudioConverter::entry(), SpeechToTextConverter::entry()]
    }

    pub fn build(providers: &Providers) -> StimexResult<MultistepConverter> {
        MultistepConverter::lazy(Self::NAME, Self::steps(), providers.clone())
    }

    pub fn entry() -> ConverterEntry {
        chain_entry(Self::NAME, Self::steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterators::ComplexTextIterator;
    use crate::text::TokenizingConverter;
    use crate::tokenize::TokenizerChoice;
    use stimex_core::{StimulusKind, TextDocument};

    #[test]
    fn test_chain_equals_manual_application() {
        let tokenize: Arc<dyn Converter> =
            Arc::new(TokenizingConverter::new(&TokenizerChoice::Whitespace).unwrap());
        let split: Arc<dyn Converter> = Arc::new(ComplexTextIterator::new());
        let chain =
            MultistepConverter::from_converters("DocToUnits", vec![tokenize.clone(), split.clone()])
                .unwrap();
        assert_eq!(chain.input_type(), StimulusKind::TextDocument.into());
        assert_eq!(chain.output_type(), StimulusKind::TextUnit.into());

        let doc: Stimulus = TextDocument::new("d", "one two").into();
        let chained = chain.convert(&doc).unwrap();
        let manual = split.convert(&tokenize.convert(&doc).unwrap()[0]).unwrap();
        assert_eq!(chained, manual);
        assert_eq!(chained[0].meta().history.len(), 2);
    }

    #[test]
    fn test_incompatible_links_rejected() {
        let split: Arc<dyn Converter> = Arc::new(ComplexTextIterator::new());
        let join: Arc<dyn Converter> = Arc::new(SequenceToDocumentConverter::new());
        assert!(MultistepConverter::from_converters("Bad", vec![split, join]).is_err());
        assert!(MultistepConverter::from_converters("Empty", vec![]).is_err());
    }

    #[test]
    fn test_lazy_chain_reports_missing_step() {
        let chain = VideoToTextConverter::build(&Providers::new()).unwrap();
        assert_eq!(chain.len(), 3);
        let err = chain.steps().err().unwrap();
        assert!(matches!(
            err,
            StimexError::MissingDependency {
                step: 1,
                dependency: Dependency::MediaDecoder,
                ..
            }
        ));
    }

    #[test]
    fn test_chain_entry_declares_union_of_requirements() {
        let entry = VideoToTextConverter::entry();
        assert_eq!(entry.steps, 3);
        assert_eq!(
            entry.chain,
            vec![
                VideoToAudioConverter::NAME,
                SpeechToTextConverter::NAME,
                SequenceToDocumentConverter::NAME
            ]
        );
        assert_eq!(
            entry.requires,
            vec![Dependency::MediaDecoder, Dependency::SpeechRecognizer]
        );
        assert_eq!(entry.output, StimulusKind::TextDocument.into());
        assert_eq!(
            VideoToComplexTextConverter::entry().output,
            StimulusKind::TextSequence.into()
        );
    }
}
