use crate::error::{Error, Result};
use crate::{DocId, Document};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Supplies raw document text to the raw-text query modes.
///
/// Implementations are read concurrently by the query engine.
pub trait DocumentSource: Sync {
    /// Every document id that can be scanned, ascending.
    fn ids(&self) -> Vec<DocId>;

    /// Raw text of `id`. An unknown id is [`Error::NotFound`]; a known id
    /// without text is [`Error::MissingText`].
    fn text(&self, id: DocId) -> Result<Cow<'_, str>>;
}

/// Texts held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    texts: BTreeMap<DocId, String>,
}

impl MemoryCorpus {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, id: DocId, text: impl Into<String>) {
        self.texts.insert(id, text.into());
    }

    pub fn len(&self) -> usize { self.texts.len() }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() }
}

impl<'a> FromIterator<&'a Document> for MemoryCorpus {
    fn from_iter<I: IntoIterator<Item = &'a Document>>(docs: I) -> Self {
        Self { texts: docs.into_iter().map(|d| (d.id, d.text.clone())).collect() }
    }
}

impl DocumentSource for MemoryCorpus {
    fn ids(&self) -> Vec<DocId> { self.texts.keys().copied().collect() }

    fn text(&self, id: DocId) -> Result<Cow<'_, str>> {
        self.texts.get(&id).map(|t| Cow::Borrowed(t.as_str())).ok_or(Error::NotFound(id))
    }
}
