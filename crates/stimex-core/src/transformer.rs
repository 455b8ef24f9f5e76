//! Transformer traits.
//!
//! Every transformation implements [`Transformer`]: a declared input type,
//! a version, and a snapshot of its configuration taken at construction.
//! [`Converter`]s map stimuli to other stimuli, [`Extractor`]s map stimuli
//! to [`ExtractorResult`]s. Both may opt into batch execution by returning
//! a [`BatchStrategy`] and overriding their `*_chunk` method.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::BatchStrategy;
use crate::error::{StimexError, StimexResult};
use crate::result::ExtractorResult;
use crate::stimulus::{Stimulus, StimulusType};

/// Configuration parameters recorded for reproducibility.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Which transformer, at which version, configured how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerDescriptor {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub params: Params,
}

impl TransformerDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            params: Params::new(),
        }
    }

    /// Record a configuration attribute.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Contract shared by converters and extractors.
pub trait Transformer: Send + Sync {
    /// Provenance snapshot taken when the transformer was configured.
    fn descriptor(&self) -> &TransformerDescriptor;

    /// Declared accepted input type.
    fn input_type(&self) -> StimulusType;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn version(&self) -> &str {
        &self.descriptor().version
    }

    /// Whether this transformer can operate on `stim`.
    fn accepts(&self, stim: &Stimulus) -> bool {
        self.input_type().matches(stim.kind())
    }

    /// Fail with [`StimexError::IncompatibleInput`] unless `stim` is accepted.
    fn check_input(&self, stim: &Stimulus) -> StimexResult<()> {
        if self.accepts(stim) {
            Ok(())
        } else {
            Err(StimexError::incompatible(self.name(), stim.name(), stim.kind()))
        }
    }

    /// Preferred batching, if this transformer is batch-capable.
    fn batch_strategy(&self) -> Option<BatchStrategy> {
        None
    }
}

/// Maps a stimulus to feature values.
pub trait Extractor: Transformer {
    /// Extract features from one accepted stimulus.
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult>;

    /// Extract features from a chunk of accepted stimuli, one result per
    /// input in input order. Batch-capable extractors override this.
    fn extract_chunk(&self, stims: &[&Stimulus]) -> StimexResult<Vec<ExtractorResult>> {
        stims.iter().map(|s| self.extract_one(s)).collect()
    }

    /// Checked single-stimulus entry point.
    fn extract(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        self.check_input(stim)?;
        debug!(extractor = self.name(), stimulus = stim.name(), "Extracting");
        if self.batch_strategy().is_some() {
            let mut results = self.extract_chunk(&[stim])?;
            if results.len() != 1 {
                return Err(StimexError::TaggingMismatch {
                    expected: 1,
                    actual: results.len(),
                });
            }
            Ok(results.remove(0))
        } else {
            self.extract_one(stim)
        }
    }

    /// Checked multi-stimulus entry point. Results keep input order; batch
    /// extractors are invoked once per chunk.
    fn extract_many(&self, stims: &[Stimulus]) -> StimexResult<Vec<ExtractorResult>> {
        for stim in stims {
            self.check_input(stim)?;
        }
        let refs: Vec<&Stimulus> = stims.iter().collect();
        match self.batch_strategy() {
            Some(strategy) => strategy.run(&refs, |chunk| self.extract_chunk(chunk)),
            None => refs.iter().map(|s| self.extract_one(s)).collect(),
        }
    }
}

/// Maps a stimulus to one or more stimuli of another type.
pub trait Converter: Transformer {
    /// Declared output type.
    fn output_type(&self) -> StimulusType;

    /// Convert one accepted stimulus. Implementations build fresh outputs
    /// and never modify `stim`.
    fn convert_one(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>>;

    /// Convert a chunk of accepted stimuli; one output group per input.
    fn convert_chunk(&self, stims: &[&Stimulus]) -> StimexResult<Vec<Vec<Stimulus>>> {
        stims.iter().map(|s| self.convert_one(s)).collect()
    }

    /// Whether this converter records itself in outputs' history. Chains
    /// leave this to their steps.
    fn records_history(&self) -> bool {
        true
    }

    /// Checked entry point; outputs carry this converter in their history.
    fn convert(&self, stim: &Stimulus) -> StimexResult<Vec<Stimulus>> {
        self.check_input(stim)?;
        debug!(converter = self.name(), stimulus = stim.name(), "Converting");
        let outputs = self.convert_one(stim)?;
        Ok(self.stamp(stim, outputs))
    }

    /// Checked multi-stimulus entry point; one output group per input.
    fn convert_many(&self, stims: &[Stimulus]) -> StimexResult<Vec<Vec<Stimulus>>> {
        for stim in stims {
            self.check_input(stim)?;
        }
        let refs: Vec<&Stimulus> = stims.iter().collect();
        let groups = match self.batch_strategy() {
            Some(strategy) => strategy.run(&refs, |chunk| self.convert_chunk(chunk))?,
            None => refs
                .iter()
                .map(|s| self.convert_one(s))
                .collect::<StimexResult<Vec<_>>>()?,
        };
        Ok(stims
            .iter()
            .zip(groups)
            .map(|(stim, outputs)| self.stamp(stim, outputs))
            .collect())
    }

    #[doc(hidden)]
    fn stamp(&self, source: &Stimulus, outputs: Vec<Stimulus>) -> Vec<Stimulus> {
        if !self.records_history() {
            return outputs;
        }
        outputs
            .into_iter()
            .map(|out| out.derived_from(source, self.descriptor()))
            .collect()
    }
}
