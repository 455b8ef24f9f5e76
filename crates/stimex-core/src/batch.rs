//! Batch execution policy.
//!
//! A transformer that benefits from seeing many stimuli at once holds a
//! [`BatchStrategy`] and overrides its `*_chunk` method. Inputs are split
//! into chunks of the configured size and each chunk is processed as one
//! unit of work: either every member gets a result or the chunk fails.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StimexError, StimexResult};

/// How many stimuli a batch-capable transformer processes per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchStrategy {
    /// Maximum chunk size; `None` processes everything in one chunk.
    pub batch_size: Option<NonZeroUsize>,
}

impl BatchStrategy {
    /// One chunk holding every input.
    pub fn unbounded() -> Self {
        Self { batch_size: None }
    }

    /// Chunks of at most `size` inputs. A size of zero means unbounded.
    pub fn with_size(size: usize) -> Self {
        Self {
            batch_size: NonZeroUsize::new(size),
        }
    }

    /// Build from an optional configured size.
    pub fn from_config(size: Option<usize>) -> Self {
        size.map(Self::with_size).unwrap_or_default()
    }

    /// Split `items` into chunks. Empty input yields no chunks.
    pub fn chunks<'a, T>(&self, items: &'a [T]) -> Box<dyn Iterator<Item = &'a [T]> + 'a> {
        match self.batch_size {
            Some(size) => Box::new(items.chunks(size.get())),
            None if items.is_empty() => Box::new(std::iter::empty()),
            None => Box::new(std::iter::once(items)),
        }
    }

    /// Run `f` once per chunk and concatenate the outputs in input order.
    ///
    /// Each chunk must yield exactly one output per member; otherwise the
    /// run aborts with [`StimexError::TaggingMismatch`] and nothing from
    /// that chunk is returned.
    pub fn run<T, R, F>(&self, items: &[T], mut f: F) -> StimexResult<Vec<R>>
    where
        F: FnMut(&[T]) -> StimexResult<Vec<R>>,
    {
        let mut out = Vec::with_capacity(items.len());
        for (index, chunk) in self.chunks(items).enumerate() {
            debug!(chunk = index, size = chunk.len(), "Processing batch chunk");
            let results = f(chunk)?;
            if results.len() != chunk.len() {
                return Err(StimexError::TaggingMismatch {
                    expected: chunk.len(),
                    actual: results.len(),
                });
            }
            out.extend(results);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_is_single_chunk() {
        let items = [1, 2, 3, 4, 5];
        let chunks: Vec<_> = BatchStrategy::unbounded().chunks(&items).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 5);
    }

    #[test]
    fn test_sized_chunks() {
        let items = [1, 2, 3, 4, 5];
        let sizes: Vec<_> = BatchStrategy::with_size(2)
            .chunks(&items)
            .map(|c| c.len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_zero_size_means_unbounded() {
        assert_eq!(BatchStrategy::with_size(0), BatchStrategy::unbounded());
        assert_eq!(BatchStrategy::from_config(None), BatchStrategy::unbounded());
    }

    #[test]
    fn test_run_preserves_order_across_chunks() {
        let items: Vec<u32> = (0..7).collect();
        let mut calls = 0;
        let out = BatchStrategy::with_size(3)
            .run(&items, |chunk| {
                calls += 1;
                Ok(chunk.iter().map(|i| i * 10).collect())
            })
            .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(out, vec![0, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_run_rejects_short_chunk() {
        let items = [1, 2, 3];
        let err = BatchStrategy::unbounded()
            .run(&items, |chunk| Ok(chunk[..1].to_vec()))
            .unwrap_err();
        assert!(matches!(
            err,
            StimexError::TaggingMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_run_empty_input() {
        let items: [u8; 0] = [];
        let out: Vec<u8> = BatchStrategy::unbounded()
            .run(&items, |_| panic!("no chunk expected"))
            .unwrap();
        assert!(out.is_empty());
    }
}
