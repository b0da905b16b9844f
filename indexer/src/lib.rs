use anyhow::{bail, Context, Result};
use folio::persist::{load_artifacts, load_docs, load_meta, save_artifacts, save_docs, save_meta, DirectoryCorpus, IndexPaths, MetaFile, FORMAT_VERSION};
use folio::config::{Config, SearchOptions};
use folio::{BuildArtifacts, DocId, DocMeta, Document, SearchMode};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub mod gutenberg;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: DocId,
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    body: String,
}

impl From<InputDoc> for Document {
    fn from(doc: InputDoc) -> Self {
        Document {
            id: doc.id,
            text: doc.body,
            meta: DocMeta { title: doc.title, author: doc.author, release_date: doc.release_date, text_path: None },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BuildSummary {
    pub documents: usize,
    pub terms: usize,
    pub output: PathBuf,
}

/// Reads every `.json`, `.jsonl` and `.txt` file under `input`, in path order.
pub fn load_documents(input: &Path) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl" | "txt")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }

    let mut docs = Vec::new();
    for file in files {
        let loaded = match extension(&file) {
            Some("jsonl") => read_jsonl(&file),
            Some("txt") => read_gutenberg(&file),
            _ => read_json(&file),
        }
        .with_context(|| format!("reading {}", file.display()))?;
        docs.extend(loaded);
    }
    tracing::info!(documents = docs.len(), input = %input.display(), "loaded documents");
    Ok(docs)
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

fn read_jsonl(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        docs.push(doc.into());
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value::<InputDoc>(v).map(Document::from))
            .collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value::<InputDoc>(json)?.into()],
        _ => Vec::new(),
    };
    Ok(docs)
}

/// A Gutenberg book; its id comes from the header, or else from the digits of the file name.
fn read_gutenberg(file: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(file)?;
    let book = gutenberg::parse(&raw);
    let id = book.id.filter(|id| *id > 0).or_else(|| id_from_file_name(file));
    let Some(id) = id else {
        tracing::warn!(file = %file.display(), "no ebook number found, skipping");
        return Ok(Vec::new());
    };
    let title = book.title.unwrap_or_else(|| format!("Book {id}"));
    let meta = DocMeta { title, author: book.author, release_date: book.release_date, text_path: None };
    Ok(vec![Document { id, text: book.content, meta }])
}

fn id_from_file_name(file: &Path) -> Option<DocId> {
    let stem = file.file_stem()?.to_str()?;
    let digits: String = stem.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|id| *id > 0)
}

/// Builds every artifact for `docs` and writes them, with the raw texts, under `output`.
pub fn build_index(mut docs: Vec<Document>, output: &Path, config: &Config) -> Result<BuildSummary> {
    check_ids(&docs)?;
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(out_paths.texts_dir())?;

    for doc in docs.iter_mut() {
        // Write text for raw-text search modes
        let text_rel = IndexPaths::text_rel(doc.id);
        fs::write(out_paths.root.join(&text_rel), &doc.text)?;
        doc.meta.text_path = Some(text_rel);
    }

    let artifacts = folio::build(&docs, config).context("building index")?;
    save_artifacts(&out_paths, &artifacts)?;

    let metas: BTreeMap<DocId, DocMeta> = docs.iter().map(|d| (d.id, d.meta.clone())).collect();
    save_docs(&out_paths, &metas)?;
    let meta = MetaFile {
        num_docs: docs.len() as u32,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
        config: config.clone(),
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output = %output.display(), "index build complete");
    Ok(BuildSummary { documents: docs.len(), terms: artifacts.index.term_count(), output: output.to_path_buf() })
}

/// Text files are keyed by id, so ids are checked before anything is written.
fn check_ids(docs: &[Document]) -> Result<()> {
    let mut seen = HashSet::with_capacity(docs.len());
    for doc in docs {
        if doc.id == 0 {
            bail!("document ids must be positive (title {:?})", doc.meta.title);
        }
        if !seen.insert(doc.id) {
            bail!("document id {} appears more than once", doc.id);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
    pub author: Option<String>,
    pub release_date: Option<String>,
    /// Closeness centrality of the document.
    pub relevance: f64,
}

#[derive(Debug, Serialize)]
pub struct RecommendedDoc {
    pub doc_id: DocId,
    pub distance: f64,
    pub centrality: f64,
    pub title: String,
    pub author: Option<String>,
}

/// A built index directory, loaded once and queried many times.
pub struct LoadedIndex {
    pub meta: MetaFile,
    pub artifacts: BuildArtifacts,
    pub corpus: DirectoryCorpus,
}

impl LoadedIndex {
    pub fn open(dir: &Path) -> Result<Self> {
        let paths = IndexPaths::new(dir);
        let meta = load_meta(&paths).with_context(|| format!("reading {}", paths.meta().display()))?;
        if meta.version != FORMAT_VERSION {
            bail!("index format version {} is not supported (expected {FORMAT_VERSION})", meta.version);
        }
        let artifacts = load_artifacts(&paths, &meta)?;
        let corpus = DirectoryCorpus::new(&paths, load_docs(&paths)?);
        Ok(Self { meta, artifacts, corpus })
    }

    pub fn search(&self, query: &str, mode: SearchMode, options: SearchOptions) -> Result<Vec<SearchHit>> {
        let config = Config { search: options, ..self.meta.config.clone() };
        let hits = self.artifacts.query_engine(&self.corpus, &config).search(query, mode)?;
        hits.into_iter()
            .map(|hit| -> Result<SearchHit> {
                let meta = self.corpus.meta(hit.doc_id).cloned().unwrap_or_default();
                Ok(SearchHit {
                    doc_id: hit.doc_id,
                    score: hit.score,
                    title: meta.title,
                    author: meta.author,
                    release_date: meta.release_date,
                    relevance: self.artifacts.centrality.get(hit.doc_id)?,
                })
            })
            .collect()
    }

    pub fn recommend(&self, doc_id: DocId, k: usize) -> Result<Vec<RecommendedDoc>> {
        let recs = self.artifacts.similarity_engine(&self.meta.config).recommend(doc_id, k)?;
        Ok(recs
            .into_iter()
            .map(|rec| {
                let meta = self.corpus.meta(rec.doc_id).cloned().unwrap_or_default();
                RecommendedDoc {
                    doc_id: rec.doc_id,
                    distance: rec.distance,
                    centrality: rec.centrality,
                    title: meta.title,
                    author: meta.author,
                }
            })
            .collect())
    }
}
