//! Build and query configuration.
//!
//! Defaults and hard limits live here as constants; the structs are persisted
//! next to the index (`meta.json`) so that queries against a reloaded index are
//! normalized exactly like the documents were.

use serde::{Deserialize, Serialize};

/// Shortest token kept by the default normalizer profile.
pub const DEFAULT_MIN_TERM_LEN: usize = 2;

/// Token length bounds of the strict profile.
pub const STRICT_MIN_TERM_LEN: usize = 4;
pub const STRICT_MAX_TERM_LEN: usize = 10;

/// A posting is created once a term occurs this many times in a document.
pub const DEFAULT_MIN_OCCURRENCES: u32 = 1;

/// Threshold used by the batch-insert profile, which drops incidental terms.
pub const BATCH_MIN_OCCURRENCES: u32 = 10;

/// Upper bound on trie nodes before the build is refused.
pub const DEFAULT_MAX_TRIE_NODES: u64 = 50_000_000;

/// Upper bound on similarity matrix cells (n * n) before the build is refused.
///
/// At 8 bytes a cell this is 2 GiB.
pub const DEFAULT_MAX_MATRIX_CELLS: u64 = 268_435_456;

/// Number of recommendations returned when the caller does not ask for a count.
pub const DEFAULT_RECOMMENDATIONS: usize = 6;

/// Query alternatives are separated by this character.
pub const OR_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Tokens shorter than this (in characters) are discarded.
    pub min_len: usize,
    /// Tokens longer than this are discarded. `None` is unbounded.
    pub max_len: Option<usize>,
    pub stemming: bool,
    pub stopwords: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { min_len: DEFAULT_MIN_TERM_LEN, max_len: None, stemming: true, stopwords: false }
    }
}

impl NormalizerConfig {
    /// 4 to 10 character tokens, stopwords removed, stemmed.
    pub fn strict() -> Self {
        Self {
            min_len: STRICT_MIN_TERM_LEN,
            max_len: Some(STRICT_MAX_TERM_LEN),
            stemming: true,
            stopwords: true,
        }
    }

    /// Terms are the literal lowercase words of the text.
    pub fn is_lossless(&self) -> bool {
        !self.stemming && !self.stopwords && self.max_len.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub min_occurrences: u32,
    /// Rescale every term's weights so they sum to 1 across documents.
    pub normalize_weights: bool,
    pub max_nodes: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            normalize_weights: false,
            max_nodes: DEFAULT_MAX_TRIE_NODES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub max_matrix_cells: u64,
    /// Recommendations farther than this are dropped.
    pub max_distance: Option<f64>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self { max_matrix_cells: DEFAULT_MAX_MATRIX_CELLS, max_distance: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Score raw-text matches by their number of occurrences instead of 1.
    pub count_matches: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalizer: NormalizerConfig,
    pub index: IndexConfig,
    pub similarity: SimilarityConfig,
    pub search: SearchOptions,
}
