//! Dictionary lookup extractors.
//!
//! A [`Dictionary`] maps text keys to rows of named feature values. A word
//! absent from the dictionary is not an error: every requested feature is
//! filled with the extractor's `missing` value instead, and so is any
//! individually empty cell of a row that is found.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::Path;

use stimex_core::{
    Extractor, ExtractorResult, FeatureValue, StimexError, StimexResult, Stimulus, StimulusType,
    Transformer, TransformerDescriptor,
};
use tracing::{debug, warn};

use crate::datasets::DictionarySource;
use crate::text::text_of;

/// A key → feature-row lookup table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    columns: Vec<String>,
    keys: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
    index: HashMap<String, usize>,
}

fn parse_cell(cell: &str) -> FeatureValue {
    let cell = cell.trim();
    match cell {
        "" | "NA" | "NaN" | "nan" | "N/A" => FeatureValue::Missing,
        _ => {
            if let Ok(i) = cell.parse::<i64>() {
                FeatureValue::Integer(i)
            } else if let Ok(n) = cell.parse::<f64>() {
                FeatureValue::Number(n)
            } else {
                FeatureValue::Text(cell.to_string())
            }
        }
    }
}

impl Dictionary {
    /// Empty dictionary with the given feature columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Add or replace the row for `key`.
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<FeatureValue>) -> StimexResult<()> {
        let key = key.into();
        if values.len() != self.columns.len() {
            return Err(StimexError::validation(format!(
                "row '{}' has {} values but the dictionary has {} columns",
                key,
                values.len(),
                self.columns.len()
            )));
        }
        match self.index.get(&key) {
            Some(&i) => self.rows[i] = values,
            None => {
                self.index.insert(key.clone(), self.keys.len());
                self.keys.push(key);
                self.rows.push(values);
            }
        }
        Ok(())
    }

    /// Parse tab-separated data. The first line is a header; the first
    /// column of every line is the key. Empty, `NA` and `NaN` cells are
    /// missing.
    pub fn from_tsv_reader<R: BufRead>(reader: R) -> StimexResult<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(StimexError::validation("dictionary has no header row")),
        };
        let columns: Vec<String> = header
            .trim_end_matches('\r')
            .split('\t')
            .skip(1)
            .map(|c| c.trim().to_string())
            .collect();
        let mut dict = Self::new(columns);

        for (n, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let mut cells = line.split('\t');
            let key = cells.next().unwrap_or_default().to_string();
            let values: Vec<FeatureValue> = cells.map(parse_cell).collect();
            if values.len() != dict.columns.len() {
                return Err(StimexError::validation(format!(
                    "dictionary line {} has {} values, expected {}",
                    n + 2,
                    values.len(),
                    dict.columns.len()
                )));
            }
            if dict.contains(&key) {
                warn!(key = %key, line = n + 2, "Duplicate dictionary key; keeping the first row");
                continue;
            }
            dict.insert(key, values)?;
        }
        Ok(dict)
    }

    /// Read a tab-separated file.
    pub fn from_tsv_path(path: impl AsRef<Path>) -> StimexResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_tsv_reader(std::io::BufReader::new(file))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Row for `key`, in column order.
    pub fn get(&self, key: &str) -> Option<&[FeatureValue]> {
        self.index.get(key).map(|&i| self.rows[i].as_slice())
    }

    /// Keep only `variables`, in the given order.
    pub fn select(&self, variables: &[String]) -> StimexResult<Self> {
        let positions = variables
            .iter()
            .map(|v| {
                self.columns
                    .iter()
                    .position(|c| c == v)
                    .ok_or_else(|| StimexError::validation(format!("dictionary has no column '{}'", v)))
            })
            .collect::<StimexResult<Vec<_>>>()?;
        Ok(Self {
            columns: variables.to_vec(),
            keys: self.keys.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                .collect(),
            index: self.index.clone(),
        })
    }

    /// Lowercase every key. When two keys fold together the first row wins.
    pub fn lowercase_keys(self) -> Self {
        let mut folded = Self::new(self.columns);
        for (key, row) in self.keys.into_iter().zip(self.rows) {
            let key = key.to_lowercase();
            if !folded.contains(&key) {
                folded.index.insert(key.clone(), folded.keys.len());
                folded.keys.push(key);
                folded.rows.push(row);
            }
        }
        folded
    }

    /// Rename every column to `"{prefix}_{column}"`.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        for column in &mut self.columns {
            *column = format!("{}_{}", prefix, column);
        }
        self
    }

    /// Outer join on key: every key of every dictionary appears once, with
    /// columns concatenated in argument order and gaps left missing.
    pub fn outer_join(dictionaries: Vec<Dictionary>) -> StimexResult<Self> {
        let columns: Vec<String> = dictionaries
            .iter()
            .flat_map(|d| d.columns.iter().cloned())
            .collect();
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(StimexError::validation(format!("column '{}' appears in more than one dictionary", dup)));
        }

        let width = columns.len();
        let mut joined = Self::new(columns);
        let mut offset = 0;
        for dict in &dictionaries {
            for (key, row) in dict.keys.iter().zip(&dict.rows) {
                let i = match joined.index.get(key) {
                    Some(&i) => i,
                    None => {
                        joined.index.insert(key.clone(), joined.keys.len());
                        joined.keys.push(key.clone());
                        joined.rows.push(vec![FeatureValue::Missing; width]);
                        joined.keys.len() - 1
                    }
                };
                joined.rows[i][offset..offset + row.len()].clone_from_slice(row);
            }
            offset += dict.columns.len();
        }
        Ok(joined)
    }
}

/// Looks up each text stimulus in a dictionary.
#[derive(Debug, Clone)]
pub struct DictionaryExtractor {
    descriptor: TransformerDescriptor,
    data: Dictionary,
    missing: FeatureValue,
    case_sensitive: bool,
}

impl DictionaryExtractor {
    pub const NAME: &'static str = "DictionaryExtractor";

    /// Wrap `dictionary`, optionally keeping only `variables`.
    pub fn new(
        dictionary: Dictionary,
        variables: Option<Vec<String>>,
        missing: FeatureValue,
    ) -> StimexResult<Self> {
        Self::build(Self::NAME, None, dictionary, variables, missing)
    }

    /// Load the dictionary from a tab-separated file.
    pub fn from_tsv(
        path: impl AsRef<Path>,
        variables: Option<Vec<String>>,
        missing: FeatureValue,
    ) -> StimexResult<Self> {
        let path = path.as_ref();
        let dictionary = Dictionary::from_tsv_path(path)?;
        Self::build(
            Self::NAME,
            Some(path.display().to_string()),
            dictionary,
            variables,
            missing,
        )
    }

    fn build(
        name: &str,
        path: Option<String>,
        dictionary: Dictionary,
        variables: Option<Vec<String>>,
        missing: FeatureValue,
    ) -> StimexResult<Self> {
        let data = match &variables {
            Some(vars) => dictionary.select(vars)?,
            None => dictionary,
        };
        let descriptor = TransformerDescriptor::new(name, "1.0")
            .with_param("dictionary", path)
            .with_param("variables", data.columns.clone())
            .with_param("missing", serde_json::to_value(&missing)?);
        debug!(extractor = name, entries = data.len(), columns = data.columns.len(), "Loaded dictionary");
        Ok(Self {
            descriptor,
            data,
            missing,
            case_sensitive: true,
        })
    }

    /// Fold keys and lookups to lowercase when `case_sensitive` is false.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        if !case_sensitive && self.case_sensitive {
            self.data = std::mem::take(&mut self.data).lowercase_keys();
        }
        self.case_sensitive = case_sensitive;
        self.descriptor = self.descriptor.with_param("case_sensitive", case_sensitive);
        self
    }

    pub fn variables(&self) -> &[String] {
        &self.data.columns
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.data
    }

    fn lookup(&self, text: &str) -> Vec<FeatureValue> {
        let row = if self.case_sensitive {
            self.data.get(text)
        } else {
            self.data.get(&text.to_lowercase())
        };
        match row {
            Some(row) => row
                .iter()
                .map(|v| if v.is_missing() { self.missing.clone() } else { v.clone() })
                .collect(),
            None => vec![self.missing.clone(); self.data.columns.len()],
        }
    }

    fn extract_with(&self, descriptor: &TransformerDescriptor, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let text = text_of(&descriptor.name, stim)?;
        ExtractorResult::new(
            vec![self.lookup(text)],
            stim,
            descriptor,
            self.data.columns.clone(),
        )
    }
}

impl Transformer for DictionaryExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for DictionaryExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        self.extract_with(&self.descriptor, stim)
    }
}

/// Which columns to take from which predefined dictionaries.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryVariables(Vec<(String, Vec<String>)>);

impl DictionaryVariables {
    /// Parse `"source/column"` specs. A bare `"source"` takes every column.
    pub fn parse<I, S>(specs: I) -> StimexResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<(String, Vec<String>)> = Vec::new();
        for spec in specs {
            let spec = spec.as_ref();
            let (source, column) = match spec.split_once('/') {
                Some((s, c)) if !c.is_empty() && !c.contains('/') => (s, Some(c)),
                Some(_) => {
                    return Err(StimexError::validation(format!(
                        "invalid dictionary variable '{}', expected 'source/column'",
                        spec
                    )))
                }
                None => (spec, None),
            };
            if source.is_empty() {
                return Err(StimexError::validation(format!(
                    "invalid dictionary variable '{}', empty source",
                    spec
                )));
            }
            let pos = match out.iter().position(|(s, _)| s == source) {
                Some(pos) => pos,
                None => {
                    out.push((source.to_string(), Vec::new()));
                    out.len() - 1
                }
            };
            if let Some(column) = column {
                out[pos].1.push(column.to_string());
            }
        }
        Ok(Self(out))
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(s, c)| (s.as_str(), c.as_slice()))
    }
}

impl From<BTreeMap<String, Vec<String>>> for DictionaryVariables {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl From<Vec<(String, Vec<String>)>> for DictionaryVariables {
    fn from(pairs: Vec<(String, Vec<String>)>) -> Self {
        Self(pairs)
    }
}

/// Dictionary lookup over one or more named sources, outer-joined on key
/// with every column prefixed by its source name.
#[derive(Debug, Clone)]
pub struct PredefinedDictionaryExtractor {
    descriptor: TransformerDescriptor,
    inner: DictionaryExtractor,
}

impl PredefinedDictionaryExtractor {
    pub const NAME: &'static str = "PredefinedDictionaryExtractor";

    /// Fetch and join the requested sources. A source that cannot be
    /// fetched fails construction with
    /// [`StimexError::ResourceUnavailable`] naming it.
    pub fn new(
        variables: DictionaryVariables,
        missing: FeatureValue,
        case_sensitive: bool,
        source: &dyn DictionarySource,
    ) -> StimexResult<Self> {
        let mut parts = Vec::new();
        for (name, columns) in variables.sources() {
            let mut dict = source.fetch(name).map_err(|e| match e {
                StimexError::ResourceUnavailable { .. } => e,
                other => StimexError::resource(name, other.to_string()),
            })?;
            if !case_sensitive {
                dict = dict.lowercase_keys();
            }
            if !columns.is_empty() {
                dict = dict.select(columns)?;
            }
            debug!(dictionary = name, entries = dict.len(), "Fetched predefined dictionary");
            parts.push(dict.prefixed(name));
        }
        let joined = Dictionary::outer_join(parts)?;

        let recorded: BTreeMap<&str, &[String]> = variables.sources().collect();
        let inner = DictionaryExtractor::new(joined, None, missing.clone())?
            .with_case_sensitive(case_sensitive);
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("variables", serde_json::to_value(recorded)?)
            .with_param("missing", serde_json::to_value(&missing)?)
            .with_param("case_sensitive", case_sensitive);
        Ok(Self { descriptor, inner })
    }

    pub fn variables(&self) -> &[String] {
        self.inner.variables()
    }
}

impl Transformer for PredefinedDictionaryExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for PredefinedDictionaryExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        self.inner.extract_with(&self.descriptor, stim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::InMemoryDictionarySource;
    use stimex_core::TextUnit;

    const NORMS: &str = "Word\tvalence\tarousal\tcategory\n\
                         happy\t8.47\t6.05\tpositive\n\
                         sad\t2.10\t\tnegative\n\
                         Paris\t6\t4\tplace\n";

    fn norms() -> Dictionary {
        Dictionary::from_tsv_reader(NORMS.as_bytes()).unwrap()
    }

    fn unit(text: &str) -> Stimulus {
        TextUnit::new(text).into()
    }

    #[test]
    fn test_tsv_parsing() {
        let dict = norms();
        assert_eq!(dict.columns(), ["valence", "arousal", "category"]);
        assert_eq!(dict.get("Paris").unwrap()[0], FeatureValue::Integer(6));
        assert_eq!(dict.get("sad").unwrap()[1], FeatureValue::Missing);
        assert_eq!(dict.get("happy").unwrap()[2], FeatureValue::Text("positive".into()));
    }

    #[test]
    fn test_ragged_tsv_rejected() {
        let err = Dictionary::from_tsv_reader("w\ta\tb\nx\t1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_hit_fills_missing_cells() {
        let ext = DictionaryExtractor::new(norms(), None, FeatureValue::Number(-1.0)).unwrap();
        let result = ext.extract(&unit("sad")).unwrap();
        assert_eq!(result.get("valence"), Some(&FeatureValue::Number(2.1)));
        assert_eq!(result.get("arousal"), Some(&FeatureValue::Number(-1.0)));
    }

    #[test]
    fn test_miss_fills_every_variable() {
        let ext = DictionaryExtractor::new(
            norms(),
            Some(vec!["arousal".into(), "valence".into()]),
            FeatureValue::Missing,
        )
        .unwrap();
        let result = ext.extract(&unit("zebra")).unwrap();
        assert_eq!(result.features(), ["arousal", "valence"]);
        assert!(result.values()[0].iter().all(FeatureValue::is_missing));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        assert!(DictionaryExtractor::new(norms(), Some(vec!["dominance".into()]), FeatureValue::Missing).is_err());
    }

    #[test]
    fn test_case_folding() {
        let sensitive = DictionaryExtractor::new(norms(), None, FeatureValue::Missing).unwrap();
        assert!(sensitive.extract(&unit("paris")).unwrap().values()[0][0].is_missing());

        let folded = DictionaryExtractor::new(norms(), None, FeatureValue::Missing)
            .unwrap()
            .with_case_sensitive(false);
        assert_eq!(
            folded.extract(&unit("PARIS")).unwrap().get("valence"),
            Some(&FeatureValue::Integer(6))
        );
    }

    #[test]
    fn test_variable_spec_parsing() {
        let vars = DictionaryVariables::parse(["affect/V.Mean.Sum", "subtlex/Lg10WF", "affect/A.Mean.Sum", "aoa"]).unwrap();
        let sources: Vec<_> = vars.sources().map(|(s, c)| (s.to_string(), c.len())).collect();
        assert_eq!(
            sources,
            vec![("affect".to_string(), 2), ("subtlex".to_string(), 1), ("aoa".to_string(), 0)]
        );
        assert!(DictionaryVariables::parse(["a/b/c"]).is_err());
        assert!(DictionaryVariables::parse(["/b"]).is_err());
    }

    #[test]
    fn test_predefined_outer_join() {
        let mut affect = Dictionary::new(vec!["valence".into()]);
        affect.insert("happy", vec![FeatureValue::Number(8.5)]).unwrap();
        affect.insert("dog", vec![FeatureValue::Number(7.0)]).unwrap();
        let mut freq = Dictionary::new(vec!["count".into()]);
        freq.insert("dog", vec![FeatureValue::Integer(120)]).unwrap();
        freq.insert("the", vec![FeatureValue::Integer(9000)]).unwrap();
        let source = InMemoryDictionarySource::new()
            .with_dictionary("affect", affect)
            .with_dictionary("freq", freq);

        let ext = PredefinedDictionaryExtractor::new(
            DictionaryVariables::parse(["affect/valence", "freq/count"]).unwrap(),
            FeatureValue::Missing,
            true,
            &source,
        )
        .unwrap();
        assert_eq!(ext.variables(), ["affect_valence", "freq_count"]);

        let dog = ext.extract(&unit("dog")).unwrap();
        assert_eq!(dog.values()[0], vec![FeatureValue::Number(7.0), FeatureValue::Integer(120)]);
        let the = ext.extract(&unit("the")).unwrap();
        assert_eq!(the.values()[0], vec![FeatureValue::Missing, FeatureValue::Integer(9000)]);
        assert_eq!(the.extractor().name, "PredefinedDictionaryExtractor");
    }

    #[test]
    fn test_predefined_unknown_source() {
        let err = PredefinedDictionaryExtractor::new(
            DictionaryVariables::parse(["nonexistent/col"]).unwrap(),
            FeatureValue::Missing,
            true,
            &InMemoryDictionarySource::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StimexError::ResourceUnavailable { ref resource, .. } if resource == "nonexistent"
        ));
    }
}
