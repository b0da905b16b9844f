use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod build;
pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod pattern;
pub mod persist;
pub mod query;
pub mod similarity;
pub mod tokenizer;

pub use build::{build, BuildArtifacts};
pub use config::Config;
pub use corpus::{DocumentSource, MemoryCorpus};
pub use error::{Error, Result};
pub use index::{IndexBuilder, InvertedIndex, PostingMap};
pub use pattern::Pattern;
pub use query::{Expr, Hit, QueryEngine, SearchMode};
pub use similarity::{CentralityVector, Recommendation, SimilarityMatrix};
pub use tokenizer::Normalizer;

/// Externally assigned, strictly positive document identifier.
pub type DocId = u32;

/// Term to raw occurrence count, for one document.
pub type TermCounts = HashMap<String, u32>;

/// Descriptive fields carried alongside a document. The core never reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: String,
    pub author: Option<String>,
    pub release_date: Option<String>,
    /// Relative path to the stored full text, e.g. texts/{doc_id}.txt
    pub text_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub meta: DocMeta,
}

impl Document {
    pub fn new(id: DocId, text: impl Into<String>) -> Self {
        Self { id, text: text.into(), meta: DocMeta::default() }
    }
}
