//! Extraction pipeline routing stimuli through converters into extractors.

use std::collections::HashMap;
use std::sync::Arc;

use stimex_core::{
    Converter, ConverterEntry, Extractor, ExtractorResult, Providers, ResultTable, StimexConfig,
    StimexError, StimexResult, Stimulus, TieBreak, Transformer, TransformerRegistry,
};
use tracing::{debug, info};

/// Pipeline applying a set of extractors to stimuli.
///
/// A stimulus an extractor does not accept is first converted through the
/// registry: a direct converter (single step or named chain) when one is
/// available, otherwise the shortest chain of single-step converters.
/// Routes run step by step; within one `transform` call, every step
/// sequence is converted at most once and shared between extractors.
pub struct ExtractionPipeline {
    extractors: Vec<Arc<dyn Extractor>>,
    providers: Providers,
    preference: Vec<String>,
    tie_break: TieBreak,
}

impl ExtractionPipeline {
    /// Create new empty pipeline.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
            providers: Providers::new(),
            preference: Vec::new(),
            tie_break: TieBreak::default(),
        }
    }

    /// Create pipeline with every extractor that needs no external resource.
    pub fn with_defaults() -> Self {
        Self::new().with_extractors(crate::ExtractorFactory::all())
    }

    /// Add an extractor to the pipeline.
    pub fn add_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn with_extractors(mut self, extractors: impl IntoIterator<Item = Arc<dyn Extractor>>) -> Self {
        self.extractors.extend(extractors);
        self
    }

    /// Collaborators handed to converters built during resolution.
    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    /// Take converter preference and tie-break policy from `config`.
    pub fn with_config(mut self, config: &StimexConfig) -> Self {
        self.preference = config.converter_preference.clone();
        self.tie_break = config.tie_break;
        self
    }

    pub fn with_preference<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preference = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Check whether any extractor accepts `stim` without conversion.
    pub fn supports(&self, stim: &Stimulus) -> bool {
        self.extractors.iter().any(|e| e.accepts(stim))
    }

    /// Names of the registered extractors, in order.
    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Get the number of registered extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Check if the pipeline has no registered extractors.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Apply every extractor to `stim`, resolving conversions through the
    /// process-wide registry.
    pub fn transform(&self, stim: &Stimulus) -> StimexResult<Vec<ExtractorResult>> {
        stimex_converters::init_registry();
        let registry = stimex_core::global_registry();
        self.transform_with(&registry, stim)
    }

    /// Apply every extractor to `stim` using an explicit registry.
    pub fn transform_with(
        &self,
        registry: &TransformerRegistry,
        stim: &Stimulus,
    ) -> StimexResult<Vec<ExtractorResult>> {
        let mut cache = ConversionCache::default();
        let mut results = Vec::new();
        for extractor in &self.extractors {
            let units = self.convert_for(registry, extractor.as_ref(), stim, &mut cache)?;
            debug!(
                extractor = extractor.name(),
                stimulus = stim.name(),
                units = units.len(),
                "Running extractor"
            );
            results.extend(extractor.extract_many(&units)?);
        }
        Ok(results)
    }

    /// Transform every stimulus and merge the results into one table.
    pub fn run(&self, stims: &[Stimulus]) -> StimexResult<ResultTable> {
        let mut results = Vec::new();
        for stim in stims {
            results.extend(self.transform(stim)?);
        }
        let table = ResultTable::merge(&results);
        info!(
            stimuli = stims.len(),
            results = results.len(),
            rows = table.num_rows(),
            "Pipeline run complete"
        );
        Ok(table)
    }

    /// Reshape `stim` into units `extractor` accepts.
    fn convert_for(
        &self,
        registry: &TransformerRegistry,
        extractor: &dyn Extractor,
        stim: &Stimulus,
        cache: &mut ConversionCache,
    ) -> StimexResult<Vec<Stimulus>> {
        if extractor.accepts(stim) {
            return Ok(vec![stim.clone()]);
        }
        let target = extractor.input_type();
        let preference: Vec<&str> = self.preference.iter().map(String::as_str).collect();

        let (route, steps) = match registry.select_converter(
            stim.kind(),
            target,
            &preference,
            self.tie_break,
            &self.providers,
        ) {
            Some(entry) => (entry.name.clone(), registry.expand(entry)),
            None => {
                let plan = registry
                    .plan(stim.kind(), target, &self.providers)
                    .ok_or_else(|| StimexError::incompatible(extractor.name(), stim.name(), stim.kind()))?;
                (format!("planned[{} -> {}]", stim.kind(), target), plan)
            }
        };
        debug!(route = %route, extractor = extractor.name(), steps = steps.len(), "Converting stimulus");
        self.run_route(&route, &steps, stim, cache)
    }

    /// Run `steps` on `stim`, reusing outputs of step sequences already
    /// run on it. Failures inside a multi-step route name the step.
    fn run_route(
        &self,
        route: &str,
        steps: &[&ConverterEntry],
        stim: &Stimulus,
        cache: &mut ConversionCache,
    ) -> StimexResult<Vec<Stimulus>> {
        let chained = steps.len() > 1;
        let mut applied: Vec<String> = Vec::new();
        let mut current = vec![stim.clone()];

        for (index, entry) in steps.iter().enumerate() {
            applied.push(entry.name.clone());
            if let Some(outputs) = cache.outputs.get(&applied) {
                debug!(route, converter = %entry.name, "Reusing converted stimuli");
                current = outputs.clone();
                continue;
            }
            let outputs = cache.converter(entry, &self.providers).and_then(|converter| {
                Ok(converter.convert_many(&current)?.into_iter().flatten().collect::<Vec<_>>())
            });
            current = match outputs {
                Ok(outputs) => outputs,
                Err(e) if chained => return Err(step_error(route, index + 1, &entry.name, e)),
                Err(e) => return Err(e),
            };
            cache.outputs.insert(applied.clone(), current.clone());
        }
        Ok(current)
    }
}

/// Converters and converted stimuli shared across the extractors of one
/// `transform` call. Outputs are keyed by the names of the steps applied
/// to the input stimulus.
#[derive(Default)]
struct ConversionCache {
    converters: HashMap<String, Arc<dyn Converter>>,
    outputs: HashMap<Vec<String>, Vec<Stimulus>>,
}

impl ConversionCache {
    fn converter(&mut self, entry: &ConverterEntry, providers: &Providers) -> StimexResult<Arc<dyn Converter>> {
        if let Some(converter) = self.converters.get(&entry.name) {
            return Ok(converter.clone());
        }
        let converter = entry.build(providers)?;
        self.converters.insert(entry.name.clone(), converter.clone());
        Ok(converter)
    }
}

fn step_error(route: &str, step: usize, converter: &str, error: StimexError) -> StimexError {
    match error {
        StimexError::MissingDependency { dependency, .. } => StimexError::MissingDependency {
            converter: route.to_string(),
            step,
            dependency,
        },
        other => StimexError::conversion(route, step, converter, other),
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimex_converters::ConverterFactory;
    use stimex_core::{FeatureValue, StimulusKind, TextDocument, TextSequence, TextUnit, VideoClip};

    use crate::{LengthExtractor, LexiconTagger, PartOfSpeechExtractor};

    fn registry() -> TransformerRegistry {
        let mut registry = TransformerRegistry::new();
        ConverterFactory::register_defaults(&mut registry);
        registry
    }

    #[test]
    fn test_pipeline_empty() {
        let pipeline = ExtractionPipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.len(), 0);
        assert!(!pipeline.supports(&TextUnit::new("a").into()));
    }

    #[test]
    fn test_pipeline_with_defaults() {
        let pipeline = ExtractionPipeline::with_defaults();
        assert!(!pipeline.is_empty());
        assert!(pipeline.supports(&TextDocument::new("d", "hello").into()));
        assert!(pipeline.extractor_names().contains(&"LengthExtractor"));
    }

    #[test]
    fn test_direct_extraction() {
        let pipeline = ExtractionPipeline::new().add_extractor(Arc::new(LengthExtractor::new()));
        let results = pipeline
            .transform_with(&registry(), &TextUnit::new("hello").into())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("text_length"), Some(&FeatureValue::Integer(5)));
    }

    #[test]
    fn test_sequence_is_split_into_units() {
        let tagger = Arc::new(LexiconTagger::new(Default::default()));
        let pipeline = ExtractionPipeline::new().add_extractor(Arc::new(PartOfSpeechExtractor::new(tagger)));
        let seq: Stimulus = TextSequence::from_text("seq", "dogs bark loudly", Some(0.5))
            .unwrap()
            .into();
        let results = pipeline.transform_with(&registry(), &seq).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.stimulus().name.as_str()).collect();
        assert_eq!(names, vec!["dogs", "bark", "loudly"]);
        assert_eq!(results[2].stimulus().onset, Some(1.0));
        assert_eq!(results[0].stimulus().kind, StimulusKind::TextUnit);
    }

    #[test]
    fn test_unreachable_input_is_incompatible() {
        let pipeline = ExtractionPipeline::new().add_extractor(Arc::new(LengthExtractor::new()));
        let video: Stimulus = VideoClip::new("clip.mp4", 25.0, 50, 4, 4).unwrap().into();
        let err = pipeline.transform_with(&registry(), &video).unwrap_err();
        assert!(matches!(err, StimexError::IncompatibleInput { .. }));
    }
}
