use crate::config::NormalizerConfig;
use crate::TermCounts;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\p{Alphabetic}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Turns raw text into normalized terms.
///
/// Steps, in order: NFKC + lowercase, split on every run of non-alphabetic
/// characters, length filter, optional stopword removal, optional English
/// suffix stripping. Holds nothing but its configuration, so one value can be
/// shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self { Self { config } }

    pub fn config(&self) -> &NormalizerConfig { &self.config }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        let lowered = text.nfkc().collect::<String>().to_lowercase();
        WORD.find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| self.keeps_length(token))
            .filter(|token| !(self.config.stopwords && is_stopword(token)))
            .map(|token| self.stem(token))
            .collect()
    }

    /// Query terms go through the same pipeline as indexed text so they meet the index keys.
    pub fn split_query_terms(&self, query: &str) -> Vec<String> { self.normalize(query) }

    pub fn term_counts(&self, text: &str) -> TermCounts {
        let mut counts = TermCounts::new();
        for term in self.normalize(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
    }

    fn keeps_length(&self, token: &str) -> bool {
        let len = token.chars().count();
        len >= self.config.min_len && self.config.max_len.map_or(true, |max| len <= max)
    }

    fn stem(&self, token: &str) -> String {
        if self.config.stemming { STEMMER.stem(token).into_owned() } else { token.to_string() }
    }
}

/// Tokenize with the default profile.
pub fn tokenize(text: &str) -> Vec<String> {
    Normalizer::default().normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn splits_on_digits_and_punctuation() {
        let n = Normalizer::new(NormalizerConfig { stemming: false, ..Default::default() });
        assert_eq!(n.normalize("alpha42beta--gamma_delta"), vec!["alpha", "beta", "gamma", "delta"]);
    }

    #[test]
    fn drops_short_tokens() {
        let n = Normalizer::new(NormalizerConfig { stemming: false, ..Default::default() });
        assert_eq!(n.normalize("a cat is here"), vec!["cat", "is", "here"]);
    }

    #[test]
    fn strict_profile_bounds_length_and_drops_stopwords() {
        let n = Normalizer::new(NormalizerConfig { stemming: false, ..NormalizerConfig::strict() });
        let words = n.normalize("These extraordinarily quiet rooms were there");
        assert_eq!(words, vec!["quiet", "rooms"]);
    }

    #[test]
    fn term_counts_accumulate() {
        let counts = Normalizer::default().term_counts("cats cat CAT dog");
        assert_eq!(counts.get("cat"), Some(&3));
        assert_eq!(counts.get("dog"), Some(&1));
    }

    #[test]
    fn same_input_same_output() {
        let n = Normalizer::default();
        let text = "The Quick brown foxes jumped";
        assert_eq!(n.normalize(text), n.normalize(text));
    }
}
