//! Integration tests for configuration-driven converter resolution and
//! result merging.

use std::io::Write;
use std::sync::Arc;

use stimex_core::{
    Converter, ConverterEntry, Extractor, ExtractorResult, FeatureValue, Providers, StimexConfig,
    StimexResult, Stimulus, StimulusKind, StimulusType, TextDocument, TextSequence, TieBreak,
    Transformer, TransformerDescriptor, TransformerRegistry, ResultTable,
};

/// Splits documents into whitespace words.
struct Splitter {
    descriptor: TransformerDescriptor,
}

impl Splitter {
    fn new(name: &str) -> Self {
        Self {
            descriptor: TransformerDescriptor::new(name, "0.1"),
        }
    }
}

impl Transformer for Splitter {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusKind::TextDocument.into()
    }
}

impl Converter for Splitter {
    fn output_type(&self) -> StimulusType {
        StimulusKind::TextSequence.into()
    }

    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        let text = stim.text().unwrap_or_default();
        Ok(vec![TextSequence::from_text(stim.name(), &text, None)?.into()])
    }
}

fn splitter_entry(name: &'static str, steps: usize) -> ConverterEntry {
    ConverterEntry::new(
        name,
        StimulusKind::TextDocument.into(),
        StimulusKind::TextSequence.into(),
        move |_| Ok(Arc::new(Splitter::new(name)) as Arc<dyn Converter>),
    )
    .with_steps(steps)
}

fn registry() -> TransformerRegistry {
    let mut registry = TransformerRegistry::new();
    registry.register_converter(splitter_entry("LongRoute", 3));
    registry.register_converter(splitter_entry("ShortRoute", 1));
    registry
}

fn resolve(config: &StimexConfig) -> String {
    registry()
        .get_converter(
            StimulusKind::TextDocument,
            StimulusKind::TextSequence.into(),
            &config.preference(),
            config.tie_break,
            &Providers::new(),
        )
        .map(|c| c.name().to_string())
        .unwrap_or_default()
}

#[test]
fn test_config_file_drives_resolution() {
    assert_eq!(resolve(&StimexConfig::default()), "LongRoute");

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "tie_break: fewest_steps").unwrap();
    writeln!(file, "batch_size: 16").unwrap();
    let config = StimexConfig::from_file(file.path()).unwrap();
    assert_eq!(config.tie_break, TieBreak::FewestSteps);
    assert_eq!(config.batch_size, Some(16));
    assert_eq!(resolve(&config), "ShortRoute");

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "tie_break = \"fewest_steps\"").unwrap();
    writeln!(file, "converter_preference = [\"LongRoute\"]").unwrap();
    let config = StimexConfig::from_file(file.path()).unwrap();
    // explicit preference beats the tie-break policy
    assert_eq!(resolve(&config), "LongRoute");
}

#[test]
fn test_unknown_config_extension() {
    let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    assert!(StimexConfig::from_file(file.path()).is_err());
}

/// Reports word count and first word of a document.
struct Summary {
    descriptor: TransformerDescriptor,
}

impl Transformer for Summary {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for Summary {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let text = stim.text().unwrap_or_default();
        let words: Vec<&str> = text.split_whitespace().collect();
        let first = words
            .first()
            .map(|w| FeatureValue::Text(w.to_string()))
            .unwrap_or(FeatureValue::Missing);
        ExtractorResult::new(
            vec![vec![FeatureValue::Integer(words.len() as i64), first]],
            stim,
            &self.descriptor,
            vec!["words".into(), "first".into()],
        )
    }
}

#[test]
fn test_merge_results_from_two_extractors() {
    let a = Summary {
        descriptor: TransformerDescriptor::new("SummaryA", "1.0").with_param("variant", "a"),
    };
    let b = Summary {
        descriptor: TransformerDescriptor::new("SummaryB", "1.0"),
    };
    let stims: Vec<Stimulus> = vec![
        TextDocument::new("one", "hello world").into(),
        TextDocument::new("two", "").into(),
    ];

    let mut results = a.extract_many(&stims).unwrap();
    results.extend(b.extract_many(&stims[..1]).unwrap());
    let table = ResultTable::merge(&results);

    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.columns().len(), 4);
    assert_eq!(table.columns()[0].extractor.params["variant"], "a");
    assert_eq!(table.value(0, "SummaryB#first"), Some(&FeatureValue::Text("hello".into())));
    assert_eq!(table.value(1, "SummaryB#words"), Some(&FeatureValue::Missing));

    // missing cells are dropped from long format
    let long = table.to_long();
    assert_eq!(long.len(), 4 + 1);
    assert!(long.iter().all(|r| !r.value.is_missing()));

    let json = table.to_json().unwrap();
    let back: ResultTable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, table);
}
