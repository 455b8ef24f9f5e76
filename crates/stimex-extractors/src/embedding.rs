//! Word embedding lookup.

use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::Arc;

use stimex_core::{
    Extractor, ExtractorResult, FeatureValue, StimexError, StimexResult, Stimulus, StimulusType,
    Transformer, TransformerDescriptor,
};
use tracing::info;

use crate::text::text_of;

/// A fixed-dimension key → vector table.
pub trait EmbeddingTable: Send + Sync {
    /// Vector length.
    fn dim(&self) -> usize;

    /// Vector for `key`, if present.
    fn get(&self, key: &str) -> Option<&[f32]>;
}

/// In-memory word vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedVectors {
    dim: usize,
    index: HashMap<String, usize>,
    vectors: Vec<f32>,
}

/// Largest vector length accepted from a word2vec header.
pub const MAX_EMBEDDING_DIM: usize = 1 << 16;

fn header(line: &str) -> StimexResult<(usize, usize)> {
    let mut parts = line.split_whitespace().map(str::parse::<usize>);
    match (parts.next(), parts.next()) {
        (Some(Ok(_)), Some(Ok(dim))) if dim > MAX_EMBEDDING_DIM => Err(StimexError::validation(
            format!("word2vec dimension {} exceeds the limit of {}", dim, MAX_EMBEDDING_DIM),
        )),
        (Some(Ok(count)), Some(Ok(dim))) if dim > 0 => Ok((count, dim)),
        _ => Err(StimexError::validation(format!(
            "word2vec header must be '<count> <dim>', got '{}'",
            line.trim()
        ))),
    }
}

impl KeyedVectors {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Default::default()
        }
    }

    /// Add or replace the vector for `key`.
    pub fn insert(&mut self, key: impl Into<String>, vector: &[f32]) -> StimexResult<()> {
        if vector.len() != self.dim {
            return Err(StimexError::validation(format!(
                "vector has {} dimensions, expected {}",
                vector.len(),
                self.dim
            )));
        }
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.vectors[i * self.dim..(i + 1) * self.dim].copy_from_slice(vector),
            None => {
                self.index.insert(key, self.index.len());
                self.vectors.extend_from_slice(vector);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Parse the word2vec text format: a `<count> <dim>` header followed by
    /// one `word v1 ... vdim` line per entry.
    pub fn from_text_reader<R: BufRead>(reader: R) -> StimexResult<Self> {
        let mut lines = reader.lines();
        let first = lines
            .next()
            .ok_or_else(|| StimexError::validation("empty word2vec file"))??;
        let (count, dim) = header(&first)?;
        let mut table = Self::new(dim);

        for (n, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split(' ').filter(|p| !p.is_empty());
            let word = parts.next().unwrap_or_default().to_string();
            let vector = parts
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StimexError::validation(format!("word2vec line {}: {}", n + 2, e)))?;
            table.insert(word, &vector).map_err(|e| {
                StimexError::validation(format!("word2vec line {}: {}", n + 2, e))
            })?;
        }
        if table.len() != count {
            tracing::warn!(declared = count, loaded = table.len(), "word2vec entry count differs from header");
        }
        Ok(table)
    }

    /// Parse the word2vec binary format: a text header, then per entry the
    /// word, a space, and `dim` little-endian `f32`s.
    pub fn from_binary_reader<R: BufRead>(mut reader: R) -> StimexResult<Self> {
        let mut first = String::new();
        reader.read_line(&mut first)?;
        let (count, dim) = header(&first)?;
        let mut table = Self::new(dim);
        let width = dim
            .checked_mul(std::mem::size_of::<f32>())
            .ok_or_else(|| StimexError::validation(format!("word2vec dimension {} is too large", dim)))?;
        let mut buf = vec![0u8; width];

        for _ in 0..count {
            let mut word = Vec::new();
            reader.read_until(b' ', &mut word)?;
            if word.last() == Some(&b' ') {
                word.pop();
            }
            let word = String::from_utf8_lossy(&word).trim_start_matches('\n').to_string();
            reader.read_exact(&mut buf)?;
            let vector: Vec<f32> = buf
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            table.insert(word, &vector)?;
        }
        Ok(table)
    }

    /// Load a word2vec file in text or binary format.
    pub fn load_word2vec_format(path: impl AsRef<Path>, binary: bool) -> StimexResult<Self> {
        let path = path.as_ref();
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let table = if binary {
            Self::from_binary_reader(reader)?
        } else {
            Self::from_text_reader(reader)?
        };
        info!(path = %path.display(), words = table.len(), dim = table.dim, "Loaded word vectors");
        Ok(table)
    }
}

impl EmbeddingTable for KeyedVectors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn get(&self, key: &str) -> Option<&[f32]> {
        self.index
            .get(key)
            .map(|&i| &self.vectors[i * self.dim..(i + 1) * self.dim])
    }
}

/// Embedding vector of each text stimulus. Out-of-vocabulary text gets an
/// all-zero vector.
pub struct WordEmbeddingExtractor {
    descriptor: TransformerDescriptor,
    table: Arc<dyn EmbeddingTable>,
    features: Vec<String>,
}

impl WordEmbeddingExtractor {
    pub const NAME: &'static str = "WordEmbeddingExtractor";
    pub const DEFAULT_PREFIX: &'static str = "embedding_dim";

    pub fn new(table: Arc<dyn EmbeddingTable>) -> Self {
        Self::with_prefix(table, Self::DEFAULT_PREFIX)
    }

    /// Feature names are `{prefix}{i}`.
    pub fn with_prefix(table: Arc<dyn EmbeddingTable>, prefix: &str) -> Self {
        let features = (0..table.dim()).map(|i| format!("{}{}", prefix, i)).collect();
        let descriptor = TransformerDescriptor::new(Self::NAME, "1.0")
            .with_param("prefix", prefix)
            .with_param("dim", table.dim());
        Self {
            descriptor,
            table,
            features,
        }
    }

    /// Load a word2vec file and wrap it.
    pub fn from_file(path: impl AsRef<Path>, binary: bool) -> StimexResult<Self> {
        let path = path.as_ref();
        let table = KeyedVectors::load_word2vec_format(path, binary)?;
        let mut ext = Self::new(Arc::new(table));
        ext.descriptor = ext
            .descriptor
            .with_param("embedding_file", path.display().to_string())
            .with_param("binary", binary);
        Ok(ext)
    }
}

impl Transformer for WordEmbeddingExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for WordEmbeddingExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let text = text_of(self.name(), stim)?;
        let row = match self.table.get(text) {
            Some(vector) => vector.iter().map(|&v| FeatureValue::Number(f64::from(v))).collect(),
            None => vec![FeatureValue::Number(0.0); self.table.dim()],
        };
        ExtractorResult::new(vec![row], stim, &self.descriptor, self.features.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stimex_core::TextUnit;

    const VECTORS: &str = "3 4\n\
                           cat 0.5 -1 0.25 2\n\
                           dog 0.1 0.2 0.3 0.4\n\
                           the 0 0 1 0\n";

    #[test]
    fn test_text_format() {
        let table = KeyedVectors::from_text_reader(VECTORS.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.dim(), 4);
        assert_eq!(table.get("cat"), Some(&[0.5_f32, -1.0, 0.25, 2.0][..]));
        assert!(table.get("Cat").is_none());
    }

    #[test]
    fn test_bad_header() {
        assert!(KeyedVectors::from_text_reader("cat 0.5\n".as_bytes()).is_err());
    }

    #[test]
    fn test_oversized_dimension_rejected() {
        for reader in [
            KeyedVectors::from_binary_reader("1 4611686018427387904\n".as_bytes()),
            KeyedVectors::from_text_reader("1 4611686018427387904\n".as_bytes()),
        ] {
            assert!(matches!(reader, Err(StimexError::Validation(_))));
        }
        let limit = format!("1 {}\n", MAX_EMBEDDING_DIM + 1);
        assert!(KeyedVectors::from_binary_reader(limit.as_bytes()).is_err());
    }

    #[test]
    fn test_binary_format() {
        let mut bytes = b"2 2\n".to_vec();
        for (word, v) in [("up", [1.0_f32, 0.5]), ("down", [-1.0, 0.25])] {
            bytes.extend_from_slice(word.as_bytes());
            bytes.push(b' ');
            for x in v {
                bytes.extend_from_slice(&x.to_le_bytes());
            }
            bytes.push(b'\n');
        }
        let table = KeyedVectors::from_binary_reader(&bytes[..]).unwrap();
        assert_eq!(table.get("down"), Some(&[-1.0_f32, 0.25][..]));
    }

    #[test]
    fn test_in_vocabulary_vector() {
        let table = KeyedVectors::from_text_reader(VECTORS.as_bytes()).unwrap();
        let ext = WordEmbeddingExtractor::new(Arc::new(table));
        let result = ext.extract(&TextUnit::new("cat").into()).unwrap();
        assert_eq!(result.features()[3], "embedding_dim3");
        assert_eq!(result.get("embedding_dim1"), Some(&FeatureValue::Number(-1.0)));
    }

    #[test]
    fn test_out_of_vocabulary_is_zero() {
        let table = KeyedVectors::from_text_reader(VECTORS.as_bytes()).unwrap();
        let ext = WordEmbeddingExtractor::with_prefix(Arc::new(table), "w2v_");
        let result = ext.extract(&TextUnit::new("zebra").into()).unwrap();
        assert_eq!(result.values()[0], vec![FeatureValue::Number(0.0); 4]);
        assert_eq!(result.features()[0], "w2v_0");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VECTORS.as_bytes()).unwrap();
        let ext = WordEmbeddingExtractor::from_file(file.path(), false).unwrap();
        assert_eq!(ext.descriptor().params["binary"], false);
        let result = ext.extract(&TextUnit::new("the").into()).unwrap();
        assert_eq!(result.get("embedding_dim2"), Some(&FeatureValue::Number(1.0)));
    }
}
