use folio::config::{Config, SearchOptions};
use folio::{Document, SearchMode};
use indexer::{build_index, load_documents, LoadedIndex};
use std::fs;
use tempfile::tempdir;

const MOBY: &str = "\
Title: Moby Dick
Author: Herman Melville
Release Date: June, 2001 [eBook #2701]

*** START OF THE PROJECT GUTENBERG EBOOK MOBY DICK ***
Call me Ishmael. The whale and the sea, the ship and the captain.
*** END OF THE PROJECT GUTENBERG EBOOK MOBY DICK ***
";

fn write_input(dir: &std::path::Path) {
    let jsonl = r#"{"id": 1, "title": "Sea Tales", "author": "Anon", "body": "The whale swam past the ship at sea."}
{"id": 2, "title": "Castles", "body": "A knight rode to the castle with a sword."}
"#;
    fs::write(dir.join("docs.jsonl"), jsonl).unwrap();
    fs::write(dir.join("moby.txt"), MOBY).unwrap();
    // no ebook number anywhere, so the id comes from the file name
    fs::write(dir.join("pg84.txt"), "A knight and a dragon fought near the castle tower.").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();
}

#[test]
fn builds_and_queries_a_mixed_corpus() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_input(input.path());

    let docs = load_documents(input.path()).unwrap();
    let mut ids: Vec<_> = docs.iter().map(|d| d.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 84, 2701]);

    let summary = build_index(docs, output.path(), &Config::default()).unwrap();
    assert_eq!(summary.documents, 4);
    assert!(summary.terms > 0);
    for name in ["word_index.txt", "jaccard_matrix.txt", "closeness_centrality.txt", "meta.json", "texts/2701.txt"] {
        assert!(output.path().join(name).exists(), "{name}");
    }

    let loaded = LoadedIndex::open(output.path()).unwrap();
    assert_eq!(loaded.meta.num_docs, 4);

    let hits = loaded.search("whale", SearchMode::ExactTerm, SearchOptions::default()).unwrap();
    let mut hit_ids: Vec<_> = hits.iter().map(|h| h.doc_id).collect();
    hit_ids.sort();
    assert_eq!(hit_ids, vec![1, 2701]);
    let moby = hits.iter().find(|h| h.doc_id == 2701).unwrap();
    assert_eq!(moby.title, "Moby Dick");
    assert_eq!(moby.author.as_deref(), Some("Herman Melville"));

    // license text after the END marker is not part of the stored book
    let stored = fs::read_to_string(output.path().join("texts/2701.txt")).unwrap();
    assert!(stored.starts_with("Call me Ishmael."));

    let hits = loaded.search("ISHMAEL", SearchMode::Substring, SearchOptions::default()).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, 2701);

    let recs = loaded.recommend(2, 2).unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].doc_id, 84);
    assert!(recs.iter().all(|r| r.doc_id != 2));

    assert!(loaded.recommend(999, 2).is_err());
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(load_documents(&dir.path().join("absent")).is_err());
}

#[test]
fn open_rejects_an_empty_directory() {
    let dir = tempdir().unwrap();
    assert!(LoadedIndex::open(dir.path()).is_err());
}

#[test]
fn duplicate_ids_are_refused_before_writing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("index");
    let docs = vec![Document::new(7, "first text"), Document::new(7, "second text")];
    assert!(build_index(docs, &output, &Config::default()).is_err());
    assert!(!output.join("texts").exists());

    let docs = vec![Document::new(0, "zero is not an id")];
    assert!(build_index(docs, &output, &Config::default()).is_err());
    assert!(!output.exists());
}
