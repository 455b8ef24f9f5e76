//! Dictionary sources.
//!
//! A [`DictionarySource`] hands out named lookup tables. Acquisition and
//! caching of the underlying data happen elsewhere; a source only has to
//! produce a [`Dictionary`] for a known name and fail for an unknown one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stimex_core::{StimexConfig, StimexError, StimexResult};
use tracing::debug;

use crate::dictionary::Dictionary;

/// Provides named dictionaries.
pub trait DictionarySource: Send + Sync {
    /// Fetch dictionary `name`. Unknown names are an error.
    fn fetch(&self, name: &str) -> StimexResult<Dictionary>;
}

/// Reads `<dir>/<name>.tsv`.
#[derive(Debug, Clone)]
pub struct DirectoryDictionarySource {
    dir: PathBuf,
}

impl DirectoryDictionarySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Source rooted at the configured dictionary directory.
    pub fn from_config(config: &StimexConfig) -> Self {
        Self::new(&config.dictionary_dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DictionarySource for DirectoryDictionarySource {
    fn fetch(&self, name: &str) -> StimexResult<Dictionary> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StimexError::resource(name, "not a valid dictionary name"));
        }
        let path = self.dir.join(format!("{}.tsv", name));
        if !path.is_file() {
            return Err(StimexError::resource(
                name,
                format!("no dictionary file at {}", path.display()),
            ));
        }
        debug!(dictionary = name, path = %path.display(), "Loading dictionary");
        Dictionary::from_tsv_path(&path)
    }
}

/// Dictionaries held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDictionarySource {
    dictionaries: HashMap<String, Dictionary>,
}

impl InMemoryDictionarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dictionary(mut self, name: impl Into<String>, dictionary: Dictionary) -> Self {
        self.dictionaries.insert(name.into(), dictionary);
        self
    }
}

impl DictionarySource for InMemoryDictionarySource {
    fn fetch(&self, name: &str) -> StimexResult<Dictionary> {
        self.dictionaries
            .get(name)
            .cloned()
            .ok_or_else(|| StimexError::resource(name, "unknown dictionary"))
    }
}
