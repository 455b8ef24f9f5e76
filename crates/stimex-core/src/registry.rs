//! Transformer registry.
//!
//! Maps transformer names to factories together with their declared input
//! and output types, so a pipeline can find a converter that bridges a
//! stimulus to what an extractor accepts. When no single converter does,
//! [`TransformerRegistry::plan`] searches the conversion graph for the
//! shortest chain.
//!
//! The process-wide instance is populated once at startup (see
//! `stimex_converters::init_registry`) and read many times afterwards.
//! Readers take an `Arc` snapshot and never hold a lock while working.
//! Late registration copies the registry under the write lock and swaps
//! the new snapshot in; existing snapshots are unaffected.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoEnumIterator};
use tracing::{debug, info};

use crate::error::{StimexError, StimexResult};
use crate::providers::{Dependency, Providers};
use crate::stimulus::{StimulusKind, StimulusType};
use crate::transformer::{Converter, Extractor};

/// Builds a converter from the configured collaborators.
pub type ConverterFn =
    Arc<dyn Fn(&Providers) -> StimexResult<Arc<dyn Converter>> + Send + Sync>;

/// Builds an extractor that needs no external resources.
pub type ExtractorFn = Arc<dyn Fn() -> StimexResult<Arc<dyn Extractor>> + Send + Sync>;

/// How to order several converters that can all produce the target type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First registered wins.
    #[default]
    RegistrationOrder,
    /// Shorter chains win, then registration order.
    FewestSteps,
}

/// A registered converter.
#[derive(Clone)]
pub struct ConverterEntry {
    pub name: String,
    pub input: StimulusType,
    pub output: StimulusType,
    pub requires: Vec<Dependency>,
    /// Number of single converters this entry runs (1 unless a chain).
    pub steps: usize,
    /// Registered names of the converters a chain runs, in order.
    pub chain: Vec<String>,
    factory: ConverterFn,
}

impl ConverterEntry {
    pub fn new<F>(name: impl Into<String>, input: StimulusType, output: StimulusType, factory: F) -> Self
    where
        F: Fn(&Providers) -> StimexResult<Arc<dyn Converter>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input,
            output,
            requires: Vec::new(),
            steps: 1,
            chain: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    pub fn with_requires(mut self, requires: Vec<Dependency>) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Name the registered converters this chain runs; sets `steps`.
    pub fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.steps = chain.len().max(1);
        self.chain = chain;
        self
    }

    /// Whether every collaborator this converter needs is configured.
    pub fn is_available(&self, providers: &Providers) -> bool {
        providers.first_missing(&self.requires).is_none()
    }

    /// Construct the converter, failing with
    /// [`StimexError::MissingDependency`] when a collaborator is absent.
    pub fn build(&self, providers: &Providers) -> StimexResult<Arc<dyn Converter>> {
        if let Some(dependency) = providers.first_missing(&self.requires) {
            return Err(StimexError::MissingDependency {
                converter: self.name.clone(),
                step: 1,
                dependency,
            });
        }
        (self.factory)(providers)
    }
}

impl std::fmt::Debug for ConverterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterEntry")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("requires", &self.requires)
            .field("steps", &self.steps)
            .field("chain", &self.chain)
            .finish()
    }
}

/// A registered extractor.
#[derive(Clone)]
pub struct ExtractorEntry {
    pub name: String,
    pub input: StimulusType,
    factory: ExtractorFn,
}

impl ExtractorEntry {
    pub fn new<F>(name: impl Into<String>, input: StimulusType, factory: F) -> Self
    where
        F: Fn() -> StimexResult<Arc<dyn Extractor>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input,
            factory: Arc::new(factory),
        }
    }

    pub fn build(&self) -> StimexResult<Arc<dyn Extractor>> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ExtractorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorEntry")
            .field("name", &self.name)
            .field("input", &self.input)
            .finish()
    }
}

/// Name → transformer lookup with type-directed converter resolution.
#[derive(Debug, Default, Clone)]
pub struct TransformerRegistry {
    converters: Vec<ConverterEntry>,
    extractors: Vec<ExtractorEntry>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter. Re-registering a name replaces the entry in
    /// place, keeping its original position.
    pub fn register_converter(&mut self, entry: ConverterEntry) {
        match self.converters.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => {
                debug!(name = %entry.name, input = %entry.input, output = %entry.output, "Registered converter");
                self.converters.push(entry);
            }
        }
    }

    /// Register an extractor. Re-registering a name replaces the entry.
    pub fn register_extractor(&mut self, entry: ExtractorEntry) {
        match self.extractors.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => {
                debug!(name = %entry.name, input = %entry.input, "Registered extractor");
                self.extractors.push(entry);
            }
        }
    }

    pub fn converter(&self, name: &str) -> Option<&ConverterEntry> {
        self.converters.iter().find(|e| e.name == name)
    }

    pub fn extractor(&self, name: &str) -> Option<&ExtractorEntry> {
        self.extractors.iter().find(|e| e.name == name)
    }

    pub fn converter_names(&self) -> Vec<&str> {
        self.converters.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty() && self.extractors.is_empty()
    }

    /// Build a registered extractor by name.
    pub fn create_extractor(&self, name: &str) -> StimexResult<Arc<dyn Extractor>> {
        self.extractor(name)
            .ok_or_else(|| StimexError::validation(format!("No extractor registered as '{}'", name)))?
            .build()
    }

    /// Converters accepting `input` whose output lies within `target`,
    /// ordered by `preference` first, then by `tie_break`.
    pub fn candidates(
        &self,
        input: StimulusKind,
        target: StimulusType,
        preference: &[&str],
        tie_break: TieBreak,
    ) -> Vec<&ConverterEntry> {
        let mut matches: Vec<(usize, &ConverterEntry)> = self
            .converters
            .iter()
            .enumerate()
            .filter(|(_, e)| e.input.matches(input) && target.covers(&e.output))
            .collect();
        matches.sort_by_key(|(index, entry)| {
            let preferred = preference
                .iter()
                .position(|n| *n == entry.name)
                .unwrap_or(usize::MAX);
            let steps = match tie_break {
                TieBreak::RegistrationOrder => 0,
                TieBreak::FewestSteps => entry.steps,
            };
            (preferred, steps, *index)
        });
        matches.into_iter().map(|(_, e)| e).collect()
    }

    /// Best available converter from `input` to `target`.
    ///
    /// Candidates whose collaborators are not configured, or whose
    /// construction fails, are skipped. Returns `None` when nothing is
    /// available; escalating is up to the caller.
    pub fn get_converter(
        &self,
        input: StimulusKind,
        target: StimulusType,
        preference: &[&str],
        tie_break: TieBreak,
        providers: &Providers,
    ) -> Option<Arc<dyn Converter>> {
        for entry in self.candidates(input, target, preference, tie_break) {
            if !entry.is_available(providers) {
                debug!(converter = %entry.name, "Skipping converter with unconfigured collaborators");
                continue;
            }
            match entry.build(providers) {
                Ok(converter) => return Some(converter),
                Err(e) => debug!(converter = %entry.name, error = %e, "Skipping converter that failed to build"),
            }
        }
        None
    }

    /// Best available converter entry from `input` to `target`, using the
    /// same ordering as [`Self::get_converter`] without building it.
    pub fn select_converter(
        &self,
        input: StimulusKind,
        target: StimulusType,
        preference: &[&str],
        tie_break: TieBreak,
        providers: &Providers,
    ) -> Option<&ConverterEntry> {
        self.candidates(input, target, preference, tie_break)
            .into_iter()
            .find(|entry| entry.is_available(providers))
    }

    /// The single-step entries `entry` runs: its registered chain members,
    /// or the entry itself when it is not a chain or a member is not
    /// registered.
    pub fn expand<'a>(&'a self, entry: &'a ConverterEntry) -> Vec<&'a ConverterEntry> {
        if entry.chain.is_empty() {
            return vec![entry];
        }
        entry
            .chain
            .iter()
            .map(|name| self.converter(name))
            .collect::<Option<Vec<_>>>()
            .unwrap_or_else(|| vec![entry])
    }

    /// Shortest chain of available single-step converters from `input` to
    /// a kind within `target`. An empty plan means no conversion is needed.
    pub fn plan(
        &self,
        input: StimulusKind,
        target: StimulusType,
        providers: &Providers,
    ) -> Option<Vec<&ConverterEntry>> {
        if target.matches(input) {
            return Some(Vec::new());
        }

        let mut graph: DiGraph<StimulusKind, usize> = DiGraph::new();
        let nodes: HashMap<StimulusKind, NodeIndex> = StimulusKind::iter()
            .map(|k| (k, graph.add_node(k)))
            .collect();
        for (index, entry) in self.converters.iter().enumerate() {
            if entry.steps != 1 || !entry.is_available(providers) {
                continue;
            }
            for from in entry.input.kinds() {
                for to in entry.output.kinds() {
                    if from != to {
                        graph.add_edge(nodes[&from], nodes[&to], index);
                    }
                }
            }
        }

        let (_, path) = astar(
            &graph,
            nodes[&input],
            |n| target.matches(graph[n]),
            |_| 1usize,
            |_| 0,
        )?;

        let plan = path
            .windows(2)
            .map(|pair| {
                graph
                    .edges_connecting(pair[0], pair[1])
                    .map(|e| *e.weight())
                    .min()
                    .map(|index| &self.converters[index])
            })
            .collect::<Option<Vec<_>>>()?;
        debug!(
            from = %input,
            to = %target,
            steps = ?plan.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            "Planned conversion chain"
        );
        Some(plan)
    }
}

static GLOBAL: Lazy<RwLock<Arc<TransformerRegistry>>> =
    Lazy::new(|| RwLock::new(Arc::new(TransformerRegistry::new())));

/// Snapshot of the process-wide registry.
pub fn global_registry() -> Arc<TransformerRegistry> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Mutate the process-wide registry. Writers are serialized; the updated
/// registry replaces the shared snapshot.
pub fn register_global<F>(f: F)
where
    F: FnOnce(&mut TransformerRegistry),
{
    let mut guard = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    let registry = Arc::make_mut(&mut guard);
    let before = registry.converter_names().len() + registry.extractor_names().len();
    f(registry);
    let after = registry.converter_names().len() + registry.extractor_names().len();
    info!(added = after.saturating_sub(before), total = after, "Updated transformer registry");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::Stimulus;
    use crate::transformer::{Transformer, TransformerDescriptor};

    struct Stub {
        descriptor: TransformerDescriptor,
        input: StimulusType,
        output: StimulusType,
    }

    impl Transformer for Stub {
        fn descriptor(&self) -> &TransformerDescriptor {
            &self.descriptor
        }
        fn input_type(&self) -> StimulusType {
            self.input
        }
    }

    impl Converter for Stub {
        fn output_type(&self) -> StimulusType {
            self.output
        }
        fn convert_one(&self, _stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
            Ok(Vec::new())
        }
    }

    fn entry(name: &str, input: StimulusKind, output: StimulusKind) -> ConverterEntry {
        let owned = name.to_string();
        ConverterEntry::new(name, input.into(), output.into(), move |_| {
            Ok(Arc::new(Stub {
                descriptor: TransformerDescriptor::new(owned.clone(), "1.0"),
                input: input.into(),
                output: output.into(),
            }) as Arc<dyn Converter>)
        })
    }

    fn registry() -> TransformerRegistry {
        let mut reg = TransformerRegistry::new();
        reg.register_converter(
            entry("VideoToAudio", StimulusKind::Video, StimulusKind::Audio)
                .with_requires(vec![Dependency::MediaDecoder]),
        );
        reg.register_converter(entry("AudioToWords", StimulusKind::Audio, StimulusKind::TextSequence));
        reg.register_converter(entry("WordsToUnits", StimulusKind::TextSequence, StimulusKind::TextUnit));
        reg.register_converter(entry("AltAudioToWords", StimulusKind::Audio, StimulusKind::TextSequence));
        reg
    }

    #[test]
    fn test_registration_order_default() {
        let reg = registry();
        let conv = reg
            .get_converter(
                StimulusKind::Audio,
                StimulusKind::TextSequence.into(),
                &[],
                TieBreak::RegistrationOrder,
                &Providers::new(),
            )
            .unwrap();
        assert_eq!(conv.name(), "AudioToWords");
    }

    #[test]
    fn test_preference_overrides_order() {
        let reg = registry();
        let conv = reg
            .get_converter(
                StimulusKind::Audio,
                StimulusKind::TextSequence.into(),
                &["AltAudioToWords"],
                TieBreak::RegistrationOrder,
                &Providers::new(),
            )
            .unwrap();
        assert_eq!(conv.name(), "AltAudioToWords");
    }

    #[test]
    fn test_unavailable_converter_is_skipped_silently() {
        let reg = registry();
        assert!(reg
            .get_converter(
                StimulusKind::Video,
                StimulusKind::Audio.into(),
                &[],
                TieBreak::RegistrationOrder,
                &Providers::new(),
            )
            .is_none());
    }

    #[test]
    fn test_family_target_matches() {
        let reg = registry();
        let names: Vec<_> = reg
            .candidates(StimulusKind::TextSequence, StimulusType::AnyText, &[], TieBreak::RegistrationOrder)
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["WordsToUnits"]);
    }

    #[test]
    fn test_plan_finds_shortest_chain() {
        let reg = registry();
        let plan = reg
            .plan(StimulusKind::Audio, StimulusType::AnyText, &Providers::new())
            .unwrap();
        let names: Vec<_> = plan.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["AudioToWords", "WordsToUnits"]);
    }

    #[test]
    fn test_plan_respects_availability() {
        let reg = registry();
        assert!(reg
            .plan(StimulusKind::Video, StimulusType::AnyText, &Providers::new())
            .is_none());
        assert_eq!(
            reg.plan(StimulusKind::TextUnit, StimulusType::AnyText, &Providers::new())
                .map(|p| p.len()),
            Some(0)
        );
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let mut reg = registry();
        reg.register_converter(entry("AudioToWords", StimulusKind::Audio, StimulusKind::TextSequence));
        assert_eq!(reg.converter_names().len(), 4);
        assert_eq!(reg.converter_names()[1], "AudioToWords");
    }

    #[test]
    fn test_missing_dependency_on_build() {
        let reg = registry();
        let err = reg
            .converter("VideoToAudio")
            .unwrap()
            .build(&Providers::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StimexError::MissingDependency {
                dependency: Dependency::MediaDecoder,
                ..
            }
        ));
    }

    #[test]
    fn test_expand_chain_members() {
        let mut reg = registry();
        reg.register_converter(
            entry("AudioToUnits", StimulusKind::Audio, StimulusKind::TextUnit)
                .with_chain(vec!["AudioToWords".into(), "WordsToUnits".into()]),
        );
        reg.register_converter(
            entry("Broken", StimulusKind::Audio, StimulusKind::TextUnit)
                .with_chain(vec!["AudioToWords".into(), "Unregistered".into()]),
        );

        let chain = reg.converter("AudioToUnits").unwrap();
        assert_eq!(chain.steps, 2);
        let names: Vec<_> = reg.expand(chain).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["AudioToWords", "WordsToUnits"]);

        let broken = reg.converter("Broken").unwrap();
        let names: Vec<_> = reg.expand(broken).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Broken"]);
    }

    #[test]
    fn test_select_skips_unavailable() {
        let reg = registry();
        assert!(reg
            .select_converter(
                StimulusKind::Video,
                StimulusKind::Audio.into(),
                &[],
                TieBreak::RegistrationOrder,
                &Providers::new(),
            )
            .is_none());
        let selected = reg
            .select_converter(
                StimulusKind::Audio,
                StimulusKind::TextSequence.into(),
                &["AltAudioToWords"],
                TieBreak::RegistrationOrder,
                &Providers::new(),
            )
            .unwrap();
        assert_eq!(selected.name, "AltAudioToWords");
    }

    #[test]
    fn test_snapshot_unaffected_by_later_registration() {
        let before = global_registry();
        register_global(|reg| {
            reg.register_converter(entry("LateAudioToUnits", StimulusKind::Audio, StimulusKind::TextUnit))
        });
        assert!(before.converter("LateAudioToUnits").is_none());
        assert!(global_registry().converter("LateAudioToUnits").is_some());
    }

    #[test]
    fn test_unknown_extractor() {
        assert!(TransformerRegistry::new().create_extractor("Nope").is_err());
    }
}
