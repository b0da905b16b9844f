//! Weighted Jaccard distance between document vocabularies, closeness
//! centrality, and the recommendations derived from both.

use crate::config::SimilarityConfig;
use crate::error::{Error, Result};
use crate::{DocId, TermCounts};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// `Σ min(a, b) / Σ max(a, b)` over the union of both vocabularies; 0 when both are empty.
pub fn similarity(a: &TermCounts, b: &TermCounts) -> Result<f64> {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let min_sum: u64 = small
        .iter()
        .filter_map(|(term, &count)| large.get(term).map(|&other| count.min(other) as u64))
        .sum();
    let total: u64 = a.values().chain(b.values()).map(|&c| c as u64).sum();
    let max_sum = total - min_sum;
    let sim = if max_sum == 0 { 0.0 } else { min_sum as f64 / max_sum as f64 };
    if !(0.0..=1.0).contains(&sim) {
        let msg = format!("similarity {sim} outside [0, 1] (min {min_sum}, max {max_sum})");
        tracing::error!(%msg, "aborting similarity computation");
        return Err(Error::InvariantViolation(msg));
    }
    Ok(sim)
}

pub fn jaccard_distance(a: &TermCounts, b: &TermCounts) -> Result<f64> {
    Ok(1.0 - similarity(a, b)?)
}

/// Symmetric document-to-document distance matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    ids: Vec<DocId>,
    positions: HashMap<DocId, usize>,
    cells: Vec<f64>,
}

impl SimilarityMatrix {
    /// Computes the `n(n-1)/2` distinct pairs on the rayon pool.
    ///
    /// Each worker owns one row and fills only the cells right of the
    /// diagonal; the lower triangle is mirrored afterwards.
    pub fn build(docs: &[(DocId, TermCounts)], config: &SimilarityConfig) -> Result<Self> {
        let ids: Vec<DocId> = docs.iter().map(|(id, _)| *id).collect();
        let positions = positions(&ids)?;
        let n = ids.len();
        let requested = (n as u64).saturating_mul(n as u64);
        if requested > config.max_matrix_cells {
            return Err(Error::ResourceExhausted {
                what: "similarity matrix cells",
                requested,
                limit: config.max_matrix_cells,
            });
        }
        let mut cells = vec![0.0; n * n];
        if n == 0 {
            return Ok(Self { ids, positions, cells });
        }
        cells.par_chunks_mut(n).enumerate().try_for_each(|(i, row)| {
            for j in i + 1..n {
                row[j] = jaccard_distance(&docs[i].1, &docs[j].1)?;
            }
            tracing::debug!(doc_id = ids[i], row = i, "similarity row done");
            Ok::<_, Error>(())
        })?;
        for i in 0..n {
            for j in i + 1..n {
                cells[j * n + i] = cells[i * n + j];
            }
        }
        tracing::info!(documents = n, pairs = n * (n - 1) / 2, "built similarity matrix");
        Ok(Self { ids, positions, cells })
    }

    /// Reassembles a matrix from rows, e.g. when reading it back from disk.
    pub fn from_rows(ids: Vec<DocId>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let positions = positions(&ids)?;
        let n = ids.len();
        if rows.len() != n || rows.iter().any(|r| r.len() != n) {
            return Err(Error::invalid(format!("matrix for {n} documents must be {n}x{n}")));
        }
        let cells: Vec<f64> = rows.into_iter().flatten().collect();
        for i in 0..n {
            for j in 0..n {
                let d = cells[i * n + j];
                if !(0.0..=1.0).contains(&d) || d != cells[j * n + i] || (i == j && d != 0.0) {
                    return Err(Error::invalid(format!("distance {d} at ({i}, {j}) breaks the matrix invariants")));
                }
            }
        }
        Ok(Self { ids, positions, cells })
    }

    pub fn ids(&self) -> &[DocId] { &self.ids }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    fn position(&self, id: DocId) -> Result<usize> {
        self.positions.get(&id).copied().ok_or(Error::NotFound(id))
    }

    pub fn distance(&self, a: DocId, b: DocId) -> Result<f64> {
        let (i, j) = (self.position(a)?, self.position(b)?);
        Ok(self.cells[i * self.len() + j])
    }

    /// Distances from `id` to every document, in [`ids`](Self::ids) order.
    pub fn row(&self, id: DocId) -> Result<&[f64]> {
        let i = self.position(id)?;
        Ok(self.row_at(i))
    }

    fn row_at(&self, i: usize) -> &[f64] {
        let n = self.len();
        &self.cells[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.len()).map(move |i| self.row_at(i))
    }

    /// Closeness centrality: `(n - 1) / Σ_j distance(i, j)`, or 0 for a zero row.
    pub fn centrality(&self) -> Result<CentralityVector> {
        let n = self.len();
        let scores = self
            .rows()
            .map(|row| {
                let sum: f64 = row.iter().sum();
                if sum == 0.0 { 0.0 } else { (n - 1) as f64 / sum }
            })
            .collect();
        CentralityVector::new(self.ids.clone(), scores)
    }
}

fn positions(ids: &[DocId]) -> Result<HashMap<DocId, usize>> {
    let mut positions = HashMap::with_capacity(ids.len());
    for (i, &id) in ids.iter().enumerate() {
        if positions.insert(id, i).is_some() {
            return Err(Error::invalid(format!("document {id} listed twice")));
        }
    }
    Ok(positions)
}

/// One centrality score per document; higher is closer to the rest of the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralityVector {
    ids: Vec<DocId>,
    scores: Vec<f64>,
    positions: HashMap<DocId, usize>,
}

impl CentralityVector {
    pub fn new(ids: Vec<DocId>, scores: Vec<f64>) -> Result<Self> {
        if ids.len() != scores.len() {
            return Err(Error::invalid(format!("{} ids for {} centrality scores", ids.len(), scores.len())));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(Error::InvariantViolation(format!("centrality {bad} is not a non-negative number")));
        }
        let positions = positions(&ids)?;
        Ok(Self { ids, scores, positions })
    }

    pub fn ids(&self) -> &[DocId] { &self.ids }

    pub fn scores(&self) -> &[f64] { &self.scores }

    pub fn get(&self, id: DocId) -> Result<f64> {
        self.positions.get(&id).map(|&i| self.scores[i]).ok_or(Error::NotFound(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub doc_id: DocId,
    pub distance: f64,
    pub centrality: f64,
}

/// Nearest-neighbour recommendations over a finished matrix.
pub struct SimilarityEngine<'a> {
    matrix: &'a SimilarityMatrix,
    centrality: &'a CentralityVector,
    max_distance: Option<f64>,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(matrix: &'a SimilarityMatrix, centrality: &'a CentralityVector, config: &SimilarityConfig) -> Self {
        Self { matrix, centrality, max_distance: config.max_distance }
    }

    /// Up to `k` other documents, nearest first; ties go to the more central one.
    pub fn recommend(&self, doc_id: DocId, k: usize) -> Result<Vec<Recommendation>> {
        let row = self.matrix.row(doc_id)?;
        let mut candidates = Vec::with_capacity(row.len().saturating_sub(1));
        for (&other, &distance) in self.matrix.ids().iter().zip(row) {
            if other == doc_id || self.max_distance.is_some_and(|max| distance > max) {
                continue;
            }
            candidates.push(Recommendation { doc_id: other, distance, centrality: self.centrality.get(other)? });
        }
        candidates.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(b.centrality.total_cmp(&a.centrality))
                .then(a.doc_id.cmp(&b.doc_id))
        });
        candidates.truncate(k);
        Ok(candidates)
    }
}
