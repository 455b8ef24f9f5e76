//! Extraction results and the merged result table.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StimexError, StimexResult};
use crate::stimulus::{Stimulus, StimulusRef};
use crate::transformer::TransformerDescriptor;

/// A single cell value.
///
/// Serialized untagged. JSON has no NaN, so a NaN `Number` serializes as
/// `null` and reads back as `Missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Integer(i64),
    Number(f64),
    Text(String),
    /// No value; serialized as `null`.
    Missing,
}

impl FeatureValue {
    /// Numeric view of the value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<usize> for FeatureValue {
    fn from(v: usize) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One feature-extraction event: rows are sub-units of the stimulus,
/// columns are features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorResult {
    stimulus: StimulusRef,
    extractor: TransformerDescriptor,
    features: Vec<String>,
    values: Vec<Vec<FeatureValue>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    onsets: Option<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    durations: Option<Vec<Option<f64>>>,
}

impl ExtractorResult {
    /// Build a result, checking that feature names are unique and every
    /// row has one value per feature.
    pub fn new(
        values: Vec<Vec<FeatureValue>>,
        stim: &Stimulus,
        extractor: &TransformerDescriptor,
        features: Vec<String>,
    ) -> StimexResult<Self> {
        let mut seen = HashSet::with_capacity(features.len());
        for f in &features {
            if !seen.insert(f.as_str()) {
                return Err(StimexError::invalid_result(format!(
                    "duplicate feature name '{}' from {}",
                    f, extractor.name
                )));
            }
        }
        for (i, row) in values.iter().enumerate() {
            if row.len() != features.len() {
                return Err(StimexError::invalid_result(format!(
                    "row {} has {} values but {} features were declared",
                    i,
                    row.len(),
                    features.len()
                )));
            }
        }
        Ok(Self {
            stimulus: stim.to_ref(),
            extractor: extractor.clone(),
            features,
            values,
            onsets: None,
            durations: None,
        })
    }

    /// Attach per-row timing. Both sequences must match the row count.
    pub fn with_timing(
        mut self,
        onsets: Vec<Option<f64>>,
        durations: Vec<Option<f64>>,
    ) -> StimexResult<Self> {
        let rows = self.values.len();
        if onsets.len() != rows || durations.len() != rows {
            return Err(StimexError::invalid_result(format!(
                "{} rows but {} onsets and {} durations",
                rows,
                onsets.len(),
                durations.len()
            )));
        }
        self.onsets = Some(onsets);
        self.durations = Some(durations);
        Ok(self)
    }

    pub fn stimulus(&self) -> &StimulusRef {
        &self.stimulus
    }

    pub fn extractor(&self) -> &TransformerDescriptor {
        &self.extractor
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn values(&self) -> &[Vec<FeatureValue>] {
        &self.values
    }

    pub fn onsets(&self) -> Option<&[Option<f64>]> {
        self.onsets.as_deref()
    }

    pub fn durations(&self) -> Option<&[Option<f64>]> {
        self.durations.as_deref()
    }

    pub fn num_rows(&self) -> usize {
        self.values.len()
    }

    /// Value of `feature` in the first row.
    pub fn get(&self, feature: &str) -> Option<&FeatureValue> {
        let col = self.features.iter().position(|f| f == feature)?;
        self.values.first().map(|row| &row[col])
    }

    /// Timing of row `i`, falling back to the stimulus timing.
    pub fn row_timing(&self, i: usize) -> (Option<f64>, Option<f64>) {
        let onset = self
            .onsets
            .as_ref()
            .map(|o| o[i])
            .unwrap_or(self.stimulus.onset);
        let duration = self
            .durations
            .as_ref()
            .map(|d| d[i])
            .unwrap_or(self.stimulus.duration);
        (onset, duration)
    }
}

/// Provenance of a merged column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultColumn {
    /// `"{extractor}#{feature}"`, or `"{extractor}[k]#{feature}"` for the
    /// k-th instance of an extractor name.
    pub name: String,
    pub feature: String,
    pub extractor: TransformerDescriptor,
}

/// A merged row keyed by stimulus name, onset and duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub stimulus: String,
    pub onset: Option<f64>,
    pub duration: Option<f64>,
    pub values: Vec<FeatureValue>,
}

/// One (row, column) cell in long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub stimulus: String,
    pub onset: Option<f64>,
    pub duration: Option<f64>,
    pub extractor: String,
    pub feature: String,
    pub value: FeatureValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    stimulus: String,
    onset: Option<u64>,
    duration: Option<u64>,
}

impl RowKey {
    fn new(stimulus: &str, onset: Option<f64>, duration: Option<f64>) -> Self {
        Self {
            stimulus: stimulus.to_string(),
            onset: onset.map(f64::to_bits),
            duration: duration.map(f64::to_bits),
        }
    }
}

/// Aggregate of many results: one row per (stimulus, onset, duration), one
/// column per extractor feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<ResultColumn>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Merge results into wide format. Cells with no value are
    /// [`FeatureValue::Missing`].
    ///
    /// Columns belong to one extractor instance. A result whose descriptor
    /// differs from the existing instance of the same name, or whose cells
    /// that instance already filled, opens a new instance named
    /// `"{extractor}[k]#{feature}"`, so no value or provenance is
    /// overwritten.
    pub fn merge(results: &[ExtractorResult]) -> Self {
        let mut table = Self::default();
        let mut instances: HashMap<(String, usize), TransformerDescriptor> = HashMap::new();
        let mut col_index: HashMap<(String, usize, String), usize> = HashMap::new();
        let mut row_index: HashMap<RowKey, usize> = HashMap::new();
        let mut written: HashSet<(usize, usize)> = HashSet::new();

        for result in results {
            let rows: Vec<usize> = (0..result.values.len())
                .map(|i| {
                    let (onset, duration) = result.row_timing(i);
                    let key = RowKey::new(&result.stimulus.name, onset, duration);
                    *row_index.entry(key).or_insert_with(|| {
                        table.rows.push(ResultRow {
                            stimulus: result.stimulus.name.clone(),
                            onset,
                            duration,
                            values: Vec::new(),
                        });
                        table.rows.len() - 1
                    })
                })
                .collect();

            let name = &result.extractor.name;
            let mut instance = 1;
            loop {
                match instances.get(&(name.clone(), instance)) {
                    None => break,
                    Some(existing) if *existing == result.extractor => {
                        let clash = result.features.iter().any(|feature| {
                            col_index
                                .get(&(name.clone(), instance, feature.clone()))
                                .is_some_and(|&col| rows.iter().any(|&row| written.contains(&(row, col))))
                        });
                        if !clash {
                            break;
                        }
                    }
                    Some(_) => {}
                }
                instance += 1;
            }
            instances
                .entry((name.clone(), instance))
                .or_insert_with(|| result.extractor.clone());

            let cols: Vec<usize> = result
                .features
                .iter()
                .map(|feature| {
                    *col_index
                        .entry((name.clone(), instance, feature.clone()))
                        .or_insert_with(|| {
                            let column = if instance == 1 {
                                format!("{}#{}", name, feature)
                            } else {
                                format!("{}[{}]#{}", name, instance, feature)
                            };
                            table.columns.push(ResultColumn {
                                name: column,
                                feature: feature.clone(),
                                extractor: result.extractor.clone(),
                            });
                            table.columns.len() - 1
                        })
                })
                .collect();

            for (values, &row) in result.values.iter().zip(&rows) {
                let row_values = &mut table.rows[row].values;
                for (value, &col) in values.iter().zip(&cols) {
                    if row_values.len() <= col {
                        row_values.resize(col + 1, FeatureValue::Missing);
                    }
                    row_values[col] = value.clone();
                    written.insert((row, col));
                }
            }
        }

        let width = table.columns.len();
        for row in &mut table.rows {
            row.values.resize(width, FeatureValue::Missing);
        }
        debug!(
            results = results.len(),
            rows = table.rows.len(),
            columns = width,
            "Merged extractor results"
        );
        table
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position by merged name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell lookup by row position and merged column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&FeatureValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r.values[col])
    }

    /// Long format: one record per non-missing cell.
    pub fn to_long(&self) -> Vec<LongRecord> {
        let mut out = Vec::new();
        for row in &self.rows {
            for (col, value) in self.columns.iter().zip(&row.values) {
                if value.is_missing() {
                    continue;
                }
                out.push(LongRecord {
                    stimulus: row.stimulus.clone(),
                    onset: row.onset,
                    duration: row.duration,
                    extractor: col.extractor.name.clone(),
                    feature: col.feature.clone(),
                    value: value.clone(),
                });
            }
        }
        out
    }

    /// Serialize the table, provenance included, as JSON.
    pub fn to_json(&self) -> StimexResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{TextDocument, TextUnit};

    fn descriptor(name: &str) -> TransformerDescriptor {
        TransformerDescriptor::new(name, "1.0")
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let stim = Stimulus::from(TextUnit::new("a"));
        let err = ExtractorResult::new(
            vec![vec![1.0.into(), 2.0.into()]],
            &stim,
            &descriptor("X"),
            vec!["one".into()],
        )
        .unwrap_err();
        assert!(matches!(err, StimexError::InvalidResult(_)));
    }

    #[test]
    fn test_rejects_duplicate_features() {
        let stim = Stimulus::from(TextUnit::new("a"));
        let err = ExtractorResult::new(
            vec![vec![1.0.into(), 2.0.into()]],
            &stim,
            &descriptor("X"),
            vec!["f".into(), "f".into()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_timing_length_checked() {
        let stim = Stimulus::from(TextUnit::new("a"));
        let result = ExtractorResult::new(
            vec![vec![1.0.into()], vec![2.0.into()]],
            &stim,
            &descriptor("X"),
            vec!["f".into()],
        )
        .unwrap();
        assert!(result
            .clone()
            .with_timing(vec![Some(0.0)], vec![Some(1.0)])
            .is_err());
        let timed = result
            .with_timing(vec![Some(0.0), Some(1.0)], vec![Some(1.0), None])
            .unwrap();
        assert_eq!(timed.row_timing(1), (Some(1.0), None));
    }

    #[test]
    fn test_merge_aligns_columns_and_rows() {
        let a = Stimulus::from(TextUnit::timed("cat", Some(0.0), Some(0.5)).unwrap());
        let b = Stimulus::from(TextUnit::timed("dog", Some(0.5), Some(0.5)).unwrap());

        let results = vec![
            ExtractorResult::new(vec![vec![3usize.into()]], &a, &descriptor("Len"), vec!["text_length".into()]).unwrap(),
            ExtractorResult::new(vec![vec![3usize.into()]], &b, &descriptor("Len"), vec!["text_length".into()]).unwrap(),
            ExtractorResult::new(vec![vec![0.7.into()]], &a, &descriptor("Dict"), vec!["valence".into()]).unwrap(),
        ];
        let table = ResultTable::merge(&results);

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.value(0, "Dict#valence"), Some(&FeatureValue::Number(0.7)));
        assert_eq!(table.value(1, "Dict#valence"), Some(&FeatureValue::Missing));
        assert_eq!(table.rows()[1].onset, Some(0.5));
        assert_eq!(table.to_long().len(), 3);
    }

    #[test]
    fn test_merge_keeps_same_named_extractors_apart() {
        let stim = Stimulus::from(TextUnit::new("happy"));
        let first = descriptor("Dict");
        let second = descriptor("Dict").with_param("dictionary", "b.tsv");
        let results = vec![
            ExtractorResult::new(vec![vec![1.0.into()]], &stim, &first, vec!["valence".into()]).unwrap(),
            ExtractorResult::new(vec![vec![9.0.into()]], &stim, &first, vec!["valence".into()]).unwrap(),
            ExtractorResult::new(vec![vec![5.0.into()]], &stim, &second, vec!["valence".into()]).unwrap(),
        ];
        let table = ResultTable::merge(&results);

        assert_eq!(table.num_rows(), 1);
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Dict#valence", "Dict[2]#valence", "Dict[3]#valence"]);
        assert_eq!(table.value(0, "Dict#valence"), Some(&FeatureValue::Number(1.0)));
        assert_eq!(table.value(0, "Dict[2]#valence"), Some(&FeatureValue::Number(9.0)));
        assert_eq!(table.value(0, "Dict[3]#valence"), Some(&FeatureValue::Number(5.0)));
        assert_eq!(table.columns()[2].extractor.params["dictionary"], "b.tsv");
    }

    #[test]
    fn test_merge_reuses_instance_across_stimuli() {
        let a = Stimulus::from(TextUnit::new("a"));
        let b = Stimulus::from(TextUnit::new("b"));
        let desc = descriptor("Len");
        let results = vec![
            ExtractorResult::new(vec![vec![1usize.into()]], &a, &desc, vec!["text_length".into()]).unwrap(),
            ExtractorResult::new(vec![vec![1usize.into()]], &b, &desc, vec!["text_length".into()]).unwrap(),
        ];
        let table = ResultTable::merge(&results);
        assert_eq!(table.columns().len(), 1);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_nan_reads_back_as_missing() {
        let json = serde_json::to_string(&FeatureValue::Number(f64::NAN)).unwrap();
        assert_eq!(json, "null");
        let back: FeatureValue = serde_json::from_str(&json).unwrap();
        assert!(back.is_missing());
    }

    #[test]
    fn test_merge_uses_row_timing() {
        let doc = Stimulus::from(TextDocument::new("doc", "a b"));
        let result = ExtractorResult::new(
            vec![vec!["a".into()], vec!["b".into()]],
            &doc,
            &descriptor("Words"),
            vec!["word".into()],
        )
        .unwrap()
        .with_timing(vec![Some(0.0), Some(1.0)], vec![Some(1.0), Some(1.0)])
        .unwrap();
        let table = ResultTable::merge(&[result]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows()[1].onset, Some(1.0));
    }

    #[test]
    fn test_json_keeps_provenance() {
        let stim = Stimulus::from(TextUnit::new("a"));
        let desc = descriptor("Dict").with_param("missing", serde_json::Value::Null);
        let result = ExtractorResult::new(vec![vec![FeatureValue::Missing]], &stim, &desc, vec!["v".into()]).unwrap();
        let json = ResultTable::merge(&[result]).to_json().unwrap();
        assert!(json.contains("\"version\":\"1.0\""));
        assert!(json.contains("\"missing\":null"));
        let back: ResultTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.columns()[0].extractor.name, "Dict");
    }
}
