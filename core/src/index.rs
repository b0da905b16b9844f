//! Trie-backed inverted index.
//!
//! Ingestion goes through [`IndexBuilder`], which keeps raw occurrence counts.
//! [`IndexBuilder::finalize`] needs corpus-wide statistics, so it runs once after
//! every document has been ingested and turns the counts into tf-idf weights,
//! yielding an immutable [`InvertedIndex`] that any number of readers can share.

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::pattern::Pattern;
use crate::DocId;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Document id to weight, for a single term.
pub type PostingMap = BTreeMap<DocId, f64>;

#[derive(Debug, Clone)]
struct Node<P> {
    children: BTreeMap<char, Node<P>>,
    /// Non-empty only on nodes that terminate an indexed term.
    postings: BTreeMap<DocId, P>,
}

impl<P> Default for Node<P> {
    fn default() -> Self {
        Self { children: BTreeMap::new(), postings: BTreeMap::new() }
    }
}

impl<P> Node<P> {
    fn walk(&self, term: &str) -> Option<&Node<P>> {
        let mut node = self;
        for c in term.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }

    /// Walks `term`, creating missing nodes. Fails once `*nodes` would pass `limit`.
    fn walk_or_insert(&mut self, term: &str, nodes: &mut u64, limit: u64) -> Result<&mut Node<P>> {
        let mut node = self;
        for c in term.chars() {
            if !node.children.contains_key(&c) {
                if *nodes >= limit {
                    return Err(Error::ResourceExhausted { what: "trie nodes", requested: *nodes + 1, limit });
                }
                *nodes += 1;
            }
            node = node.children.entry(c).or_default();
        }
        Ok(node)
    }

    /// Flattens the trie into `(term, postings)` pairs, consuming it.
    fn into_records(self) -> Vec<(String, BTreeMap<DocId, P>)> {
        let mut out = Vec::new();
        let mut stack = vec![(String::new(), self)];
        while let Some((term, node)) = stack.pop() {
            let Node { children, postings } = node;
            if !postings.is_empty() {
                out.push((term.clone(), postings));
            }
            for (c, child) in children {
                let mut next = term.clone();
                next.push(c);
                stack.push((next, child));
            }
        }
        out
    }
}

/// Mutable, single-writer side of the index.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    config: IndexConfig,
    root: Node<u32>,
    nodes: u64,
    doc_lengths: BTreeMap<DocId, u64>,
    document_frequency: HashMap<String, u32>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            root: Node::default(),
            nodes: 0,
            doc_lengths: BTreeMap::new(),
            document_frequency: HashMap::new(),
        }
    }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn document_count(&self) -> usize { self.doc_lengths.len() }

    pub fn node_count(&self) -> u64 { self.nodes }

    pub fn total_terms(&self, doc_id: DocId) -> Option<u64> { self.doc_lengths.get(&doc_id).copied() }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    /// Raw occurrence count of `term` in `doc_id` so far.
    pub fn count(&self, term: &str, doc_id: DocId) -> u32 {
        self.root.walk(term).and_then(|n| n.postings.get(&doc_id)).copied().unwrap_or(0)
    }

    /// Records one occurrence of `term` in `doc_id`.
    ///
    /// Low-level entry point: the occurrence counts towards the document's
    /// length, but not towards document frequency (that is `ingest`'s job).
    pub fn insert(&mut self, doc_id: DocId, term: &str) -> Result<()> {
        check_doc_id(doc_id)?;
        self.add_occurrences(doc_id, term, 1)?;
        *self.doc_lengths.entry(doc_id).or_insert(0) += 1;
        Ok(())
    }

    /// Ingests the whole normalized term sequence of one document.
    ///
    /// Terms occurring fewer than `min_occurrences` times get no posting, but
    /// still count towards the document's length.
    pub fn ingest(&mut self, doc_id: DocId, terms: &[String]) -> Result<()> {
        check_doc_id(doc_id)?;
        if self.doc_lengths.contains_key(&doc_id) {
            return Err(Error::invalid(format!("document {doc_id} ingested twice")));
        }
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for term in terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        let threshold = self.config.min_occurrences.max(1);
        for (term, count) in counts {
            if count < threshold {
                continue;
            }
            self.add_occurrences(doc_id, term, count)?;
            *self.document_frequency.entry(term.to_string()).or_insert(0) += 1;
        }
        self.doc_lengths.insert(doc_id, terms.len() as u64);
        tracing::debug!(doc_id, terms = terms.len(), "ingested document");
        Ok(())
    }

    fn add_occurrences(&mut self, doc_id: DocId, term: &str, count: u32) -> Result<()> {
        if term.is_empty() {
            return Err(Error::invalid("empty term"));
        }
        let node = self.root.walk_or_insert(term, &mut self.nodes, self.config.max_nodes)?;
        *node.postings.entry(doc_id).or_insert(0) += count;
        Ok(())
    }

    /// Folds a shard built over a disjoint set of documents into this one.
    pub fn merge(&mut self, other: IndexBuilder) -> Result<()> {
        if let Some(doc_id) = other.doc_lengths.keys().find(|d| self.doc_lengths.contains_key(d)) {
            return Err(Error::invalid(format!("document {doc_id} present in both shards")));
        }
        for (term, postings) in other.root.into_records() {
            let node = self.root.walk_or_insert(&term, &mut self.nodes, self.config.max_nodes)?;
            node.postings.extend(postings);
        }
        for (term, df) in other.document_frequency {
            *self.document_frequency.entry(term).or_insert(0) += df;
        }
        self.doc_lengths.extend(other.doc_lengths);
        Ok(())
    }

    /// Ingests pre-normalized documents on the rayon pool, one sub-trie per
    /// shard, then merges the shards.
    pub fn build_parallel(config: IndexConfig, docs: &[(DocId, Vec<String>)]) -> Result<Self> {
        let shard_len = (docs.len() / rayon::current_num_threads().max(1)).max(1);
        let merged = docs
            .par_chunks(shard_len)
            .map(|shard| {
                let mut builder = IndexBuilder::new(config.clone());
                for (doc_id, terms) in shard {
                    builder.ingest(*doc_id, terms)?;
                }
                Ok::<_, Error>(builder)
            })
            .try_reduce(
                || IndexBuilder::new(config.clone()),
                |mut left, right| {
                    left.merge(right)?;
                    Ok(left)
                },
            )?;
        tracing::info!(documents = merged.document_count(), nodes = merged.nodes, "built index shards");
        Ok(merged)
    }

    /// Computes `tf * idf` for every posting.
    ///
    /// `tf = count / total_terms(doc)` and
    /// `idf = log10((N + 1) / (df + 1)) + 1`, where `N` is the number of
    /// documents. With `normalize_weights`, each term's weights are then scaled
    /// to sum to 1.
    pub fn finalize(self) -> Result<InvertedIndex> {
        let total_documents = self.doc_lengths.len();
        let normalize = self.config.normalize_weights;
        let mut records = Vec::new();
        for (term, counts) in self.root.into_records() {
            let df = self.document_frequency.get(&term).copied().unwrap_or(counts.len() as u32);
            let idf = ((total_documents as f64 + 1.0) / (df as f64 + 1.0)).log10() + 1.0;
            let mut weights = PostingMap::new();
            for (doc_id, count) in counts {
                let total = self.doc_lengths.get(&doc_id).copied().unwrap_or(0);
                if total < count as u64 {
                    return Err(invariant(format!(
                        "term {term:?} occurs {count} times in document {doc_id} of {total} terms"
                    )));
                }
                let weight = count as f64 / total as f64 * idf;
                check_weight(&term, doc_id, weight)?;
                weights.insert(doc_id, weight);
            }
            if normalize {
                let sum: f64 = weights.values().sum();
                if sum > 0.0 {
                    weights.values_mut().for_each(|w| *w /= sum);
                }
            }
            records.push((term, weights));
        }
        let index = InvertedIndex::from_records(records, total_documents, self.config)?;
        tracing::info!(documents = index.document_count, terms = index.term_count, "finalized index");
        Ok(index)
    }
}

fn check_doc_id(doc_id: DocId) -> Result<()> {
    if doc_id == 0 {
        return Err(Error::invalid("document ids are positive"));
    }
    Ok(())
}

fn check_weight(term: &str, doc_id: DocId, weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(invariant(format!("weight {weight} for term {term:?} in document {doc_id}")));
    }
    Ok(())
}

fn invariant(msg: String) -> Error {
    tracing::error!(%msg, "aborting index build");
    Error::InvariantViolation(msg)
}

/// Finalized, read-only index.
#[derive(Debug, Clone)]
pub struct InvertedIndex {
    root: Node<f64>,
    document_count: usize,
    term_count: usize,
    config: IndexConfig,
}

impl InvertedIndex {
    /// Rebuilds an index from flattened records, e.g. after reading them back from disk.
    pub fn from_records<I>(records: I, document_count: usize, config: IndexConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (String, PostingMap)>,
    {
        let mut root = Node::default();
        let mut nodes = 0;
        let mut seen = HashSet::new();
        for (term, postings) in records {
            if term.is_empty() || postings.is_empty() {
                return Err(Error::invalid(format!("record for {term:?} has no term or no postings")));
            }
            for (&doc_id, &weight) in &postings {
                check_weight(&term, doc_id, weight)?;
            }
            let node = root.walk_or_insert(&term, &mut nodes, config.max_nodes)?;
            node.postings.extend(postings);
            seen.insert(term);
        }
        Ok(Self { root, document_count, term_count: seen.len(), config })
    }

    pub fn document_count(&self) -> usize { self.document_count }

    pub fn term_count(&self) -> usize { self.term_count }

    pub fn config(&self) -> &IndexConfig { &self.config }

    /// Postings of exactly `term`. Cost is proportional to the term's length.
    pub fn lookup_exact(&self, term: &str) -> Option<&PostingMap> {
        self.root.walk(term).map(|n| &n.postings).filter(|p| !p.is_empty())
    }

    /// Union of the postings of every term containing `fragment`, weights summed.
    ///
    /// Visits the whole trie; prefer [`lookup_exact`](Self::lookup_exact).
    pub fn lookup_substring(&self, fragment: &str) -> PostingMap {
        let pattern = Pattern::new(fragment);
        let mut merged = PostingMap::new();
        if pattern.is_empty() {
            return merged;
        }
        for (term, postings) in self.records() {
            if pattern.is_match(&term) {
                for (&doc_id, &weight) in postings {
                    *merged.entry(doc_id).or_insert(0.0) += weight;
                }
            }
        }
        merged
    }

    /// Every indexed term with its postings, in lexicographic order.
    pub fn records(&self) -> Records<'_> {
        Records { stack: vec![(String::new(), &self.root)] }
    }
}

/// Depth-first walk over an [`InvertedIndex`] with an explicit stack.
pub struct Records<'a> {
    stack: Vec<(String, &'a Node<f64>)>,
}

impl<'a> Iterator for Records<'a> {
    type Item = (String, &'a PostingMap);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((term, node)) = self.stack.pop() {
            for (c, child) in node.children.iter().rev() {
                let mut next = term.clone();
                next.push(*c);
                self.stack.push((next, child));
            }
            if !node.postings.is_empty() {
                return Some((term, &node.postings));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> { words.iter().map(|w| w.to_string()).collect() }

    fn sample() -> IndexBuilder {
        let mut b = IndexBuilder::new(IndexConfig::default());
        b.ingest(1, &terms(&["cat", "sat", "cat", "mat"])).unwrap();
        b.ingest(2, &terms(&["dog", "sat"])).unwrap();
        b
    }

    #[test]
    fn insert_counts_occurrences() {
        let mut b = IndexBuilder::new(IndexConfig::default());
        b.insert(7, "cat").unwrap();
        b.insert(7, "cat").unwrap();
        b.insert(7, "car").unwrap();
        assert_eq!(b.count("cat", 7), 2);
        assert_eq!(b.count("car", 7), 1);
        assert_eq!(b.count("ca", 7), 0);
        assert_eq!(b.total_terms(7), Some(3));
    }

    #[test]
    fn ingest_tracks_lengths_and_document_frequency() {
        let b = sample();
        assert_eq!(b.total_terms(1), Some(4));
        assert_eq!(b.document_frequency("sat"), 2);
        assert_eq!(b.document_frequency("cat"), 1);
        assert_eq!(b.count("cat", 1), 2);
    }

    #[test]
    fn rejects_duplicate_and_zero_ids() {
        let mut b = sample();
        assert!(matches!(b.ingest(1, &terms(&["x"])), Err(Error::InvalidInput(_))));
        assert!(matches!(b.ingest(0, &terms(&["x"])), Err(Error::InvalidInput(_))));
        assert!(matches!(b.insert(0, "x"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn finalize_applies_smoothed_tf_idf() {
        let index = sample().finalize().unwrap();
        let cat = index.lookup_exact("cat").unwrap();
        let expected = 2.0 / 4.0 * ((3.0f64 / 2.0).log10() + 1.0);
        assert!((cat[&1] - expected).abs() < 1e-12);

        // a term present in every document still weighs tf * 1
        let sat = index.lookup_exact("sat").unwrap();
        assert!((sat[&2] - 0.5).abs() < 1e-12);
        assert!(index.records().all(|(_, p)| p.values().all(|w| *w >= 0.0)));
    }

    #[test]
    fn normalized_weights_sum_to_one_per_term() {
        let mut b = IndexBuilder::new(IndexConfig { normalize_weights: true, ..Default::default() });
        b.ingest(1, &terms(&["sat", "cat"])).unwrap();
        b.ingest(2, &terms(&["sat", "sat", "dog"])).unwrap();
        let index = b.finalize().unwrap();
        for (_, postings) in index.records() {
            let sum: f64 = postings.values().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn threshold_drops_rare_terms() {
        let mut b = IndexBuilder::new(IndexConfig { min_occurrences: 2, ..Default::default() });
        b.ingest(1, &terms(&["cat", "cat", "dog"])).unwrap();
        let index = b.finalize().unwrap();
        assert!(index.lookup_exact("cat").is_some());
        assert!(index.lookup_exact("dog").is_none());
    }

    #[test]
    fn node_limit_is_reported() {
        let mut b = IndexBuilder::new(IndexConfig { max_nodes: 4, ..Default::default() });
        b.insert(1, "cats").unwrap();
        let err = b.insert(1, "dog").unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted { limit: 4, .. }));
    }

    #[test]
    fn only_terminal_nodes_hold_postings() {
        let index = sample().finalize().unwrap();
        assert!(index.lookup_exact("ca").is_none());
        assert!(index.lookup_exact("").is_none());
        let listed: Vec<String> = index.records().map(|(t, _)| t).collect();
        assert_eq!(listed, vec!["cat", "dog", "mat", "sat"]);
        assert_eq!(index.term_count(), 4);
    }

    #[test]
    fn substring_lookup_unions_matching_terms() {
        let index = sample().finalize().unwrap();
        let hits = index.lookup_substring("at");
        assert_eq!(hits.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(index.lookup_substring("").is_empty());
        assert!(index.lookup_substring("zz").is_empty());
    }

    #[test]
    fn merge_rejects_overlapping_shards() {
        let mut left = sample();
        let mut right = IndexBuilder::new(IndexConfig::default());
        right.ingest(2, &terms(&["owl"])).unwrap();
        assert!(matches!(left.merge(right), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let docs: Vec<(DocId, Vec<String>)> = (1..=40)
            .map(|id| (id, terms(&["common", if id % 2 == 0 { "even" } else { "odd" }, "common"])))
            .collect();
        let mut sequential = IndexBuilder::new(IndexConfig::default());
        for (id, t) in &docs {
            sequential.ingest(*id, t).unwrap();
        }
        let parallel = IndexBuilder::build_parallel(IndexConfig::default(), &docs).unwrap();
        assert_eq!(parallel.node_count(), sequential.node_count());

        let a = sequential.finalize().unwrap();
        let b = parallel.finalize().unwrap();
        let left: Vec<_> = a.records().map(|(t, p)| (t, p.clone())).collect();
        let right: Vec<_> = b.records().map(|(t, p)| (t, p.clone())).collect();
        assert_eq!(left, right);
    }
}
