use crate::build::BuildArtifacts;
use crate::config::{Config, IndexConfig};
use crate::corpus::DocumentSource;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, PostingMap};
use crate::similarity::{CentralityVector, SimilarityMatrix};
use crate::{DocId, DocMeta};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    #[serde(default)]
    pub config: Config,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn word_index(&self) -> PathBuf { self.root.join("word_index.txt") }
    pub fn matrix(&self) -> PathBuf { self.root.join("jaccard_matrix.txt") }
    pub fn centrality(&self) -> PathBuf { self.root.join("closeness_centrality.txt") }
    pub fn snapshot(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }

    /// Path of a document's text relative to the root, as stored in [`DocMeta::text_path`].
    pub fn text_rel(doc_id: DocId) -> String { format!("texts/{doc_id}.txt") }
}

// --- word index: `term,docId:weight|docId:weight` ---

pub fn write_index<W: Write>(out: &mut W, index: &InvertedIndex) -> Result<()> {
    for (term, postings) in index.records() {
        let entries: Vec<String> = postings.iter().map(|(id, w)| format!("{id}:{w}")).collect();
        writeln!(out, "{term},{}", entries.join("|"))?;
    }
    Ok(())
}

pub fn read_index<R: BufRead>(input: R, document_count: usize, config: IndexConfig) -> Result<InvertedIndex> {
    const ARTIFACT: &str = "word index";
    let mut records = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let (term, rest) = line
            .split_once(',')
            .ok_or_else(|| Error::malformed(ARTIFACT, n + 1, "missing ',' after term"))?;
        let mut postings = PostingMap::new();
        for entry in rest.split('|') {
            let (id, weight) = entry
                .split_once(':')
                .ok_or_else(|| Error::malformed(ARTIFACT, n + 1, format!("posting {entry:?} lacks ':'")))?;
            let id: DocId = id.parse().map_err(|e| Error::malformed(ARTIFACT, n + 1, format!("document id {id:?}: {e}")))?;
            let weight: f64 = weight.parse().map_err(|e| Error::malformed(ARTIFACT, n + 1, format!("weight {weight:?}: {e}")))?;
            postings.insert(id, weight);
        }
        records.push((term.to_string(), postings));
    }
    InvertedIndex::from_records(records, document_count, config)
}

// --- similarity matrix: id header, then one row per document ---

pub fn write_matrix<W: Write>(out: &mut W, matrix: &SimilarityMatrix) -> Result<()> {
    writeln!(out, "{}", join(matrix.ids()))?;
    for row in matrix.rows() {
        writeln!(out, "{}", join(row))?;
    }
    Ok(())
}

pub fn read_matrix<R: BufRead>(input: R) -> Result<SimilarityMatrix> {
    const ARTIFACT: &str = "similarity matrix";
    let lines = input.lines().collect::<std::io::Result<Vec<String>>>()?;
    let mut lines = lines.iter().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let (header_line, ids): (usize, Vec<DocId>) = match lines.next() {
        Some((n, header)) => (n + 1, split(header, ARTIFACT, n + 1)?),
        None => (1, Vec::new()),
    };
    let mut rows = Vec::with_capacity(ids.len());
    for (n, line) in lines {
        let row = split::<f64>(line, ARTIFACT, n + 1)?;
        if row.len() != ids.len() {
            return Err(Error::malformed(ARTIFACT, n + 1, format!("{} values for {} documents", row.len(), ids.len())));
        }
        rows.push(row);
    }
    if rows.len() != ids.len() {
        let reason = format!("{} rows for {} documents", rows.len(), ids.len());
        return Err(Error::malformed(ARTIFACT, header_line, reason));
    }
    // remaining failures are cell invariants, reported against the header
    SimilarityMatrix::from_rows(ids, rows).map_err(|e| Error::malformed(ARTIFACT, header_line, e.to_string()))
}

// --- centrality: id header, then one value line ---

pub fn write_centrality<W: Write>(out: &mut W, centrality: &CentralityVector) -> Result<()> {
    writeln!(out, "{}", join(centrality.ids()))?;
    writeln!(out, "{}", join(centrality.scores()))?;
    Ok(())
}

pub fn read_centrality<R: BufRead>(input: R) -> Result<CentralityVector> {
    const ARTIFACT: &str = "centrality vector";
    let lines = input.lines().collect::<std::io::Result<Vec<String>>>()?;
    let ids: Vec<DocId> = match lines.first() {
        Some(header) => split(header, ARTIFACT, 1)?,
        None => Vec::new(),
    };
    let scores: Vec<f64> = match lines.get(1) {
        Some(values) => split(values, ARTIFACT, 2)?,
        None => Vec::new(),
    };
    CentralityVector::new(ids, scores).map_err(|e| Error::malformed(ARTIFACT, 2, e.to_string()))
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}

fn split<T>(line: &str, artifact: &'static str, line_no: usize) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    line.trim()
        .split(';')
        .map(|v| v.parse::<T>().map_err(|e| Error::malformed(artifact, line_no, format!("{v:?}: {e}"))))
        .collect()
}

// --- binary snapshot of the finalized index ---

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    document_count: usize,
    config: IndexConfig,
    records: Vec<(String, PostingMap)>,
}

pub fn save_index_snapshot(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let snapshot = IndexSnapshot {
        document_count: index.document_count(),
        config: index.config().clone(),
        records: index.records().map(|(t, p)| (t, p.clone())).collect(),
    };
    let mut f = BufWriter::new(File::create(paths.snapshot())?);
    bincode::serialize_into(&mut f, &snapshot)?;
    f.flush()?;
    Ok(())
}

pub fn load_index_snapshot(paths: &IndexPaths) -> Result<InvertedIndex> {
    let f = BufReader::new(File::open(paths.snapshot())?);
    let snapshot: IndexSnapshot = bincode::deserialize_from(f)?;
    InvertedIndex::from_records(snapshot.records, snapshot.document_count, snapshot.config)
}

pub fn save_docs(paths: &IndexPaths, docs: &BTreeMap<DocId, DocMeta>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.docs())?;
    let bytes = bincode::serialize(docs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<BTreeMap<DocId, DocMeta>> {
    let mut f = File::open(paths.docs())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs = bincode::deserialize(&buf)?;
    Ok(docs)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Writes the three text build outputs plus the binary index snapshot.
pub fn save_artifacts(paths: &IndexPaths, artifacts: &BuildArtifacts) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_file(&paths.word_index(), |w| write_index(w, &artifacts.index))?;
    write_file(&paths.matrix(), |w| write_matrix(w, &artifacts.matrix))?;
    write_file(&paths.centrality(), |w| write_centrality(w, &artifacts.centrality))?;
    save_index_snapshot(paths, &artifacts.index)
}

/// Loads the build outputs, preferring the binary snapshot for the index.
pub fn load_artifacts(paths: &IndexPaths, meta: &MetaFile) -> Result<BuildArtifacts> {
    let index = if paths.snapshot().exists() {
        load_index_snapshot(paths)?
    } else {
        let f = BufReader::new(File::open(paths.word_index())?);
        read_index(f, meta.num_docs as usize, meta.config.index.clone())?
    };
    let matrix = read_matrix(BufReader::new(File::open(paths.matrix())?))?;
    let centrality = read_centrality(BufReader::new(File::open(paths.centrality())?))?;
    tracing::info!(root = %paths.root.display(), documents = matrix.len(), terms = index.term_count(), "loaded index");
    Ok(BuildArtifacts { index, matrix, centrality })
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut out = BufWriter::new(File::create(path)?);
    write(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Raw texts stored under an index directory, located through [`DocMeta::text_path`].
pub struct DirectoryCorpus {
    root: PathBuf,
    docs: BTreeMap<DocId, DocMeta>,
}

impl DirectoryCorpus {
    pub fn new(paths: &IndexPaths, docs: BTreeMap<DocId, DocMeta>) -> Self {
        Self { root: paths.root.clone(), docs }
    }

    pub fn meta(&self, id: DocId) -> Option<&DocMeta> { self.docs.get(&id) }
}

impl DocumentSource for DirectoryCorpus {
    fn ids(&self) -> Vec<DocId> { self.docs.keys().copied().collect() }

    fn text(&self, id: DocId) -> Result<Cow<'_, str>> {
        let meta = self.docs.get(&id).ok_or(Error::NotFound(id))?;
        let rel = meta.text_path.as_ref().ok_or(Error::MissingText(id))?;
        match std::fs::read_to_string(self.root.join(rel)) {
            Ok(text) => Ok(Cow::Owned(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::MissingText(id)),
            Err(e) => Err(e.into()),
        }
    }
}
