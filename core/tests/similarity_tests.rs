use folio::config::{Config, SimilarityConfig};
use folio::similarity::jaccard_distance;
use folio::{build, Document, Error, Normalizer};

fn library() -> Vec<Document> {
    vec![
        Document::new(11, "whale whale sea ship captain"),
        Document::new(12, "whale sea ship captain harpoon"),
        Document::new(13, "castle knight dragon sword"),
        Document::new(14, "castle knight princess sword tower"),
        Document::new(15, "whale whale sea ship captain"),
    ]
}

#[test]
fn matrix_properties_hold_over_a_corpus() {
    let artifacts = build(&library(), &Config::default()).unwrap();
    let m = &artifacts.matrix;
    assert_eq!(m.ids(), &[11, 12, 13, 14, 15]);
    for &a in m.ids() {
        assert_eq!(m.distance(a, a).unwrap(), 0.0);
        for &b in m.ids() {
            let d = m.distance(a, b).unwrap();
            assert_eq!(d, m.distance(b, a).unwrap());
            assert!((0.0..=1.0).contains(&d));
        }
    }
    // identical vocabularies
    assert_eq!(m.distance(11, 15).unwrap(), 0.0);
    // disjoint vocabularies
    assert_eq!(m.distance(11, 13).unwrap(), 1.0);
    assert!(artifacts.centrality.scores().iter().all(|c| *c >= 0.0));
}

#[test]
fn distance_matches_direct_computation() {
    let docs = library();
    let artifacts = build(&docs, &Config::default()).unwrap();
    let n = Normalizer::default();
    let a = n.term_counts(&docs[0].text);
    let b = n.term_counts(&docs[1].text);
    assert_eq!(artifacts.matrix.distance(11, 12).unwrap(), jaccard_distance(&a, &b).unwrap());
}

#[test]
fn recommendations_prefer_near_then_central() {
    let config = Config::default();
    let artifacts = build(&library(), &config).unwrap();
    let engine = artifacts.similarity_engine(&config);

    let recs = engine.recommend(11, 3).unwrap();
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].doc_id, 15);
    assert_eq!(recs[1].doc_id, 12);
    assert!(recs.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert!(recs.iter().all(|r| r.doc_id != 11));

    // 13 and 14 are both at distance 1 from 11; the more central one comes first
    let all = engine.recommend(11, 10).unwrap();
    assert_eq!(all.len(), 4);
    let (c13, c14) = (artifacts.centrality.get(13).unwrap(), artifacts.centrality.get(14).unwrap());
    let expected_last = if c13 >= c14 { 14 } else { 13 };
    assert_eq!(all[3].doc_id, expected_last);
}

#[test]
fn unknown_document_is_not_found() {
    let config = Config::default();
    let artifacts = build(&library(), &config).unwrap();
    let err = artifacts.similarity_engine(&config).recommend(999, 3).unwrap_err();
    assert!(matches!(err, Error::NotFound(999)));
}

#[test]
fn oversized_matrix_is_refused() {
    let config = Config {
        similarity: SimilarityConfig { max_matrix_cells: 10, ..Default::default() },
        ..Default::default()
    };
    let err = build(&library(), &config).unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted { requested: 25, .. }));
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut docs = library();
    docs.push(Document::new(12, "again"));
    assert!(matches!(build(&docs, &Config::default()), Err(Error::InvalidInput(_))));
}
