//! Query parsing and evaluation.
//!
//! Three modes share one entry point, [`QueryEngine::search`]:
//!
//! * exact-term: the query is parsed into an [`Expr`] of normalized terms and
//!   answered from the inverted index alone;
//! * substring: every document's raw text is scanned, case-insensitively, for
//!   the literal query with the prefix-function automaton;
//! * pattern: the query is a regular expression matched against raw text. When
//!   the index keeps literal words, required alphabetic runs of the pattern are
//!   looked up in the index first to narrow the documents to scan.

use crate::config::{SearchOptions, OR_SEPARATOR};
use crate::corpus::DocumentSource;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, PostingMap};
use crate::pattern::Pattern;
use crate::tokenizer::Normalizer;
use crate::DocId;
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    ExactTerm,
    Substring,
    Pattern,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "exact-term" | "keyword" => Ok(SearchMode::ExactTerm),
            "substring" | "kmp" => Ok(SearchMode::Substring),
            "pattern" | "regex" => Ok(SearchMode::Pattern),
            other => Err(Error::invalid(format!("unknown search mode {other:?}"))),
        }
    }
}

/// Boolean combination of normalized terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Term(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Term(term) => write!(f, "{term}"),
            Expr::And(left, right) => write!(f, "({left} && {right})"),
            Expr::Or(left, right) => write!(f, "({left} || {right})"),
        }
    }
}

impl Expr {
    /// Alternatives separated by `|` are OR-ed; the terms of one alternative
    /// are AND-ed. Returns `None` when no term survives normalization.
    pub fn parse(query: &str, normalizer: &Normalizer) -> Option<Expr> {
        query
            .split(OR_SEPARATOR)
            .filter_map(|alternative| {
                normalizer
                    .split_query_terms(alternative)
                    .into_iter()
                    .map(Expr::Term)
                    .reduce(|l, r| Expr::And(Box::new(l), Box::new(r)))
            })
            .reduce(|l, r| Expr::Or(Box::new(l), Box::new(r)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub score: f64,
}

/// Read-only query front end over a finalized index and the raw texts.
pub struct QueryEngine<'a, S: DocumentSource> {
    index: &'a InvertedIndex,
    corpus: &'a S,
    normalizer: Normalizer,
    options: SearchOptions,
}

impl<'a, S: DocumentSource> QueryEngine<'a, S> {
    /// `normalizer` must be configured like the one that built `index`.
    pub fn new(index: &'a InvertedIndex, corpus: &'a S, normalizer: Normalizer, options: SearchOptions) -> Self {
        Self { index, corpus, normalizer, options }
    }

    /// Matching documents, highest score first. A blank query matches nothing.
    pub fn search(&self, query: &str, mode: SearchMode) -> Result<Vec<Hit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let scores = match mode {
            SearchMode::ExactTerm => self.exact(query),
            SearchMode::Substring => self.substring(query)?,
            SearchMode::Pattern => self.pattern(query)?,
        };
        tracing::debug!(query, ?mode, hits = scores.len(), "search");
        let mut hits: Vec<Hit> = scores.into_iter().map(|(doc_id, score)| Hit { doc_id, score }).collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        Ok(hits)
    }

    fn exact(&self, query: &str) -> PostingMap {
        match Expr::parse(query, &self.normalizer) {
            Some(expr) => self.evaluate(&expr),
            None => PostingMap::new(),
        }
    }

    fn evaluate(&self, expr: &Expr) -> PostingMap {
        match expr {
            Expr::Term(term) => self.index.lookup_exact(term).cloned().unwrap_or_default(),
            Expr::And(left, right) => intersect(self.evaluate(left), &self.evaluate(right)),
            Expr::Or(left, right) => union(self.evaluate(left), self.evaluate(right)),
        }
    }

    fn substring(&self, query: &str) -> Result<PostingMap> {
        let pattern = Pattern::new(&fold_case(query));
        let count = self.options.count_matches;
        self.scan(&self.corpus.ids(), |text| {
            let folded = fold_case(text);
            if count { pattern.count(&folded) } else { usize::from(pattern.is_match(&folded)) }
        })
    }

    fn pattern(&self, query: &str) -> Result<PostingMap> {
        let regex = RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::invalid(format!("invalid pattern {query:?}: {e}")))?;
        let candidates = match self.narrow(query) {
            Some(ids) => ids,
            None => self.corpus.ids(),
        };
        let count = self.options.count_matches;
        self.scan(&candidates, |text| match_count(&regex, text, count))
    }

    /// Documents that can possibly match `query`, when the index allows deciding it.
    ///
    /// Index keys went through NFKC and full lowercasing while the regex folds
    /// case per character, so the two only agree on ASCII patterns.
    fn narrow(&self, query: &str) -> Option<Vec<DocId>> {
        let lossless = self.normalizer.config().is_lossless() && self.index.config().min_occurrences <= 1;
        if !lossless || !query.is_ascii() {
            return None;
        }
        let fragments = required_fragments(query, self.normalizer.config().min_len)?;
        let mut candidates: Option<BTreeSet<DocId>> = None;
        for fragment in &fragments {
            let found: BTreeSet<DocId> = self.index.lookup_substring(fragment).into_keys().collect();
            candidates = Some(match candidates {
                Some(acc) => acc.intersection(&found).copied().collect(),
                None => found,
            });
        }
        let candidates: Vec<DocId> = candidates?.into_iter().collect();
        tracing::debug!(query, ?fragments, candidates = candidates.len(), "narrowed pattern scan");
        Some(candidates)
    }

    fn scan<F>(&self, ids: &[DocId], score: F) -> Result<PostingMap>
    where
        F: Fn(&str) -> usize + Sync,
    {
        let scored = ids
            .par_iter()
            .map(|&id| -> Result<Option<(DocId, f64)>> {
                let text = self.corpus.text(id)?;
                let n = score(&text);
                Ok((n > 0).then_some((id, n as f64)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(scored.into_iter().flatten().collect())
    }
}

/// Per-character lowercase, with final sigma folded onto `σ`.
///
/// `str::to_lowercase` picks `ς` or `σ` from the surrounding letters, which
/// would fold a query and the text it occurs in differently.
fn fold_case(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ς' { 'σ' } else { c })
        .collect()
}

fn match_count(regex: &Regex, text: &str, count: bool) -> usize {
    if count { regex.find_iter(text).count() } else { usize::from(regex.is_match(text)) }
}

fn intersect(left: PostingMap, right: &PostingMap) -> PostingMap {
    left.into_iter()
        .filter_map(|(id, w)| right.get(&id).map(|other| (id, w + other)))
        .collect()
}

fn union(mut left: PostingMap, right: PostingMap) -> PostingMap {
    for (id, w) in right {
        *left.entry(id).or_insert(0.0) += w;
    }
    left
}

/// Lowercase alphabetic runs every match of `pattern` must contain.
///
/// Only simple patterns are analysed: alternation, groups, classes and escapes
/// give `None`. A character followed by `?`, `*` or `{` is optional and is cut
/// from its run. Runs shorter than `min_len` are ignored, since words that
/// short never reach the index.
fn required_fragments(pattern: &str, min_len: usize) -> Option<Vec<String>> {
    if pattern.contains(['|', '(', ')', '[', ']', '\\']) {
        return None;
    }
    let mut fragments = Vec::new();
    let mut run = String::new();
    let mut flush = |run: &mut String| {
        if run.chars().count() >= min_len.max(1) {
            fragments.push(run.to_lowercase());
        }
        run.clear();
    };
    for c in pattern.chars() {
        if c.is_alphabetic() {
            run.push(c);
            continue;
        }
        if matches!(c, '?' | '*' | '{') {
            run.pop();
        }
        flush(&mut run);
    }
    flush(&mut run);
    (!fragments.is_empty()).then_some(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;

    fn literal() -> Normalizer {
        Normalizer::new(NormalizerConfig { stemming: false, ..Default::default() })
    }

    #[test]
    fn parses_and_within_or() {
        let expr = Expr::parse("cat sat | dog", &literal()).unwrap();
        assert_eq!(expr.to_string(), "((cat && sat) || dog)");
    }

    #[test]
    fn parse_drops_empty_alternatives() {
        assert_eq!(Expr::parse("cat | 42 |", &literal()), Some(Expr::Term("cat".into())));
        assert_eq!(Expr::parse("  | ", &literal()), None);
    }

    #[test]
    fn mode_names() {
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::ExactTerm);
        assert_eq!("KMP".parse::<SearchMode>().unwrap(), SearchMode::Substring);
        assert_eq!("regex".parse::<SearchMode>().unwrap(), SearchMode::Pattern);
        assert!(matches!("fuzzy".parse::<SearchMode>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn fragments_of_simple_patterns() {
        assert_eq!(required_fragments("whale.*ship", 2), Some(vec!["whale".into(), "ship".into()]));
        assert_eq!(required_fragments("colou?r", 2), Some(vec!["colo".into()]));
        assert_eq!(required_fragments("Moby ?Dick", 2), Some(vec!["moby".into(), "dick".into()]));
        assert_eq!(required_fragments("a.b", 2), None);
        assert_eq!(required_fragments("cat|dog", 2), None);
        assert_eq!(required_fragments("(ab)+", 2), None);
    }

    #[test]
    fn case_folding_ignores_word_position() {
        assert_eq!(fold_case("ΟΔΟΣΟΣ"), "οδοσοσ");
        assert_eq!(fold_case("οδος"), fold_case("ΟΔΟΣ"));
        assert_eq!(fold_case("Whale"), "whale");
    }

    #[test]
    fn combinators_sum_weights() {
        let left: PostingMap = [(1, 0.5), (2, 1.0)].into_iter().collect();
        let right: PostingMap = [(2, 0.25), (3, 2.0)].into_iter().collect();
        assert_eq!(intersect(left.clone(), &right), [(2, 1.25)].into_iter().collect());
        assert_eq!(union(left, right), [(1, 0.5), (2, 1.25), (3, 2.0)].into_iter().collect());
    }
}
