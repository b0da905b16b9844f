//! Exact substring search with a prefix-function (Knuth–Morris–Pratt) automaton.
//!
//! Patterns and texts are compared byte by byte. Since both sides are UTF-8,
//! every match starts on a character boundary and the returned offsets can be
//! used to slice the text directly.

/// A literal pattern with its precomputed failure table.
///
/// The empty pattern is valid and never matches anything.
#[derive(Debug, Clone)]
pub struct Pattern {
    needle: Vec<u8>,
    fail: Vec<isize>,
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        let needle = pattern.as_bytes().to_vec();
        let fail = failure_table(&needle);
        Self { needle, fail }
    }

    pub fn len(&self) -> usize { self.needle.len() }

    pub fn is_empty(&self) -> bool { self.needle.is_empty() }

    /// `fail[i]` is the length of the longest proper border of the prefix of
    /// length `i`; `fail[0]` is `-1`, meaning "restart from the empty prefix".
    pub fn failure_table(&self) -> &[isize] { &self.fail }

    /// Start offsets of every occurrence, overlapping ones included, left to right.
    pub fn find_all<'p, 't>(&'p self, text: &'t str) -> Matches<'p, 't> {
        Matches { pattern: self, text: text.as_bytes(), cursor: 0, matched: 0 }
    }

    pub fn find_first(&self, text: &str) -> Option<usize> { self.find_all(text).next() }

    pub fn count(&self, text: &str) -> usize { self.find_all(text).count() }

    pub fn is_match(&self, text: &str) -> bool { self.find_first(text).is_some() }
}

fn failure_table(needle: &[u8]) -> Vec<isize> {
    let mut fail = vec![0isize; needle.len() + 1];
    fail[0] = -1;
    let mut border: isize = -1;
    for (i, &byte) in needle.iter().enumerate() {
        while border >= 0 && needle[border as usize] != byte {
            border = fail[border as usize];
        }
        border += 1;
        fail[i + 1] = border;
    }
    fail
}

/// Iterator over match offsets. Consumed once; build a new one to rescan.
#[derive(Debug)]
pub struct Matches<'p, 't> {
    pattern: &'p Pattern,
    text: &'t [u8],
    cursor: usize,
    matched: usize,
}

impl Iterator for Matches<'_, '_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let needle = &self.pattern.needle;
        let fail = &self.pattern.fail;
        let m = needle.len();
        if m == 0 {
            return None;
        }
        while self.cursor < self.text.len() {
            let byte = self.text[self.cursor];
            let mut i = self.matched as isize;
            while i >= 0 && needle[i as usize] != byte {
                i = fail[i as usize];
            }
            self.matched = (i + 1) as usize;
            self.cursor += 1;
            if self.matched == m {
                // fail[m] >= 0 for a non-empty pattern
                self.matched = fail[m] as usize;
                return Some(self.cursor - m);
            }
        }
        None
    }
}

pub fn find_all(pattern: &str, text: &str) -> Vec<usize> {
    Pattern::new(pattern).find_all(text).collect()
}

pub fn find_first(pattern: &str, text: &str) -> Option<usize> {
    Pattern::new(pattern).find_first(text)
}
