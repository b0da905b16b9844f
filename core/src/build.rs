use crate::config::Config;
use crate::corpus::DocumentSource;
use crate::error::Result;
use crate::index::{IndexBuilder, InvertedIndex};
use crate::query::QueryEngine;
use crate::similarity::{CentralityVector, SimilarityEngine, SimilarityMatrix};
use crate::tokenizer::Normalizer;
use crate::{DocId, Document, TermCounts};
use rayon::prelude::*;

/// Everything a full-corpus pass produces. Immutable; rebuilt when the corpus changes.
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub index: InvertedIndex,
    pub matrix: SimilarityMatrix,
    pub centrality: CentralityVector,
}

impl BuildArtifacts {
    pub fn query_engine<'a, S: DocumentSource>(&'a self, corpus: &'a S, config: &Config) -> QueryEngine<'a, S> {
        QueryEngine::new(&self.index, corpus, Normalizer::new(config.normalizer.clone()), config.search.clone())
    }

    pub fn similarity_engine(&self, config: &Config) -> SimilarityEngine<'_> {
        SimilarityEngine::new(&self.matrix, &self.centrality, &config.similarity)
    }
}

/// Normalizes every document once, then builds the index and the similarity
/// structures from the same term sequences.
pub fn build(docs: &[Document], config: &Config) -> Result<BuildArtifacts> {
    let normalizer = Normalizer::new(config.normalizer.clone());
    let normalized: Vec<(DocId, Vec<String>)> = docs
        .par_iter()
        .map(|doc| (doc.id, normalizer.normalize(&doc.text)))
        .collect();
    tracing::info!(documents = normalized.len(), "normalized documents");

    let index = IndexBuilder::build_parallel(config.index.clone(), &normalized)?.finalize()?;

    let vocabularies: Vec<(DocId, TermCounts)> = normalized
        .par_iter()
        .map(|(id, terms)| {
            let mut counts = TermCounts::new();
            for term in terms {
                *counts.entry(term.clone()).or_insert(0) += 1;
            }
            (*id, counts)
        })
        .collect();
    let matrix = SimilarityMatrix::build(&vocabularies, &config.similarity)?;
    let centrality = matrix.centrality()?;

    tracing::info!(documents = docs.len(), terms = index.term_count(), "build complete");
    Ok(BuildArtifacts { index, matrix, centrality })
}
