use plotsim_core::tokenizer::normalize;
use plotsim_core::vectorizer::vectorize;
use plotsim_core::{DocId, Normalization, SimilarityEngine, SimilarityOptions, VectorStore, VectorizerOptions};
use std::collections::HashMap;

fn build(docs: &[(DocId, &str)], normalization: Normalization) -> (VectorStore, HashMap<DocId, String>) {
    let corpus: Vec<(DocId, Vec<String>)> = docs.iter().map(|(id, text)| (*id, normalize(text))).collect();
    let vectorized = vectorize(&corpus, VectorizerOptions { normalization }).unwrap();
    let store = VectorStore::temporary().unwrap();
    store.commit(&vectorized).unwrap();
    let labels = docs.iter().map(|(id, _)| (*id, format!("Movie {id}"))).collect();
    (store, labels)
}

const PLOTS: &[(DocId, &str)] = &[
    (1, "A retired detective hunts a serial killer through the rainy city."),
    (2, "A young detective and a retired cop hunt a killer in the city."),
    (3, "Two friends open a bakery in a small seaside town."),
    (4, "A baker in a seaside town falls in love with a fisherman."),
    (5, "The killer escapes and the detective follows him to the sea."),
    (6, "Of the 1984 and the 2001"),
];

#[test]
fn identical_documents_are_maximally_similar() {
    let (store, labels) = build(&[(1, "the cat sat"), (2, "the cat sat"), (3, "a dog ran")], Normalization::IndexTime);
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    let result = engine.top_n(1, 1).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].doc_id, 2);
    assert_eq!(result[0].label, "Movie 2");
    assert!((result[0].score - 1.0).abs() < 1e-5);

    // document 3 shares no stems with 1, so it never gets a score
    assert_eq!(engine.top_n(1, 10).unwrap().len(), 1);
}

#[test]
fn stored_vectors_have_unit_norm() {
    let (store, _) = build(PLOTS, Normalization::IndexTime);
    for id in 1..=5 {
        let norm = store.get(id).unwrap().norm();
        assert!((norm - 1.0).abs() < 1e-5, "doc {id} norm {norm}");
    }
}

#[test]
fn results_exclude_query_and_are_sorted() {
    let (store, labels) = build(PLOTS, Normalization::IndexTime);
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    for query in 1..=5 {
        let result = engine.top_n(query, 3).unwrap();
        assert!(result.len() <= 3);
        assert!(result.iter().all(|n| n.doc_id != query));
        for pair in result.windows(2) {
            assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].doc_id < pair[1].doc_id));
        }
    }
    let top = engine.top_n(1, 1).unwrap();
    assert_eq!(top[0].doc_id, 2);
}

#[test]
fn query_time_normalization_ranks_the_same() {
    let (indexed, labels) = build(PLOTS, Normalization::IndexTime);
    let (deferred, _) = build(PLOTS, Normalization::QueryTime);
    let a = SimilarityEngine::new(&indexed, &labels, SimilarityOptions::default());
    let b = SimilarityEngine::new(&deferred, &labels, SimilarityOptions::default());
    for query in 1..=5 {
        let ra = a.rank(query, 5).unwrap();
        let rb = b.rank(query, 5).unwrap();
        assert_eq!(ra.len(), rb.len());
        // near-equal scores may swap places, so compare per document
        let deferred: HashMap<DocId, f32> = rb.into_iter().collect();
        for (id, score) in ra {
            assert!((score - deferred[&id]).abs() < 1e-5, "query {query} doc {id}");
        }
    }
}

#[test]
fn unknown_query_is_empty_not_error() {
    let (store, labels) = build(PLOTS, Normalization::IndexTime);
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    assert!(engine.top_n(999, 5).unwrap().is_empty());
}

#[test]
fn stopword_only_document_has_no_neighbours() {
    let (store, labels) = build(PLOTS, Normalization::IndexTime);
    assert!(store.get(6).unwrap().is_empty());
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    assert!(engine.top_n(6, 5).unwrap().is_empty());
}

#[test]
fn result_count_is_capped_by_candidates() {
    let (store, labels) = build(&[(1, "red car chase"), (2, "red car"), (3, "car")], Normalization::IndexTime);
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    assert_eq!(engine.top_n(1, 10).unwrap().len(), 2);
    assert_eq!(engine.top_n(1, 1).unwrap().len(), 1);
    assert!(engine.top_n(1, 0).unwrap().is_empty());
}

#[test]
fn unlabelled_neighbours_are_dropped() {
    let (store, mut labels) = build(&[(1, "the cat sat"), (2, "the cat sat"), (3, "cat")], Normalization::IndexTime);
    labels.remove(&2);
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    let result = engine.top_n(1, 5).unwrap();
    assert_eq!(result.iter().map(|n| n.doc_id).collect::<Vec<_>>(), vec![3]);
}

#[test]
fn scan_cap_truncates_candidates() {
    let (store, labels) = build(&[(1, "cat"), (2, "cat"), (3, "cat")], Normalization::IndexTime);
    // each document holds one triple; the cap stops after doc 1 and doc 2
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions { max_scan_rows: 2 });
    let result = engine.rank(1, 5).unwrap();
    assert_eq!(result.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn or_empty_matches_successful_queries() {
    let (store, labels) = build(PLOTS, Normalization::IndexTime);
    let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
    assert_eq!(engine.top_n_or_empty(1, 2), engine.top_n(1, 2).unwrap());
    assert!(engine.top_n_or_empty(12345, 2).is_empty());
}

#[test]
fn engine_scores_match_reference_cosine() {
    for normalization in [Normalization::IndexTime, Normalization::QueryTime] {
        let (store, labels) = build(PLOTS, normalization);
        let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());
        let query = store.get(1).unwrap();
        let ranked = engine.rank(1, 10).unwrap();
        assert!(!ranked.is_empty());
        for (id, score) in ranked {
            let candidate = store.get(id).unwrap();
            let expected = query.dot(&candidate) / (query.norm() * candidate.norm());
            assert!((score - expected).abs() < 1e-5, "{normalization:?} doc {id}");
        }
    }
}

#[test]
fn duplicate_text_has_unit_self_cosine() {
    let (store, _) = build(&[(1, "the cat sat"), (2, "the cat sat"), (3, "a dog ran")], Normalization::IndexTime);
    let a = store.get(1).unwrap();
    let b = store.get(2).unwrap();
    assert_eq!(a, b);
    assert!((a.dot(&b) - 1.0).abs() < 1e-5);
    assert_eq!(a.dot(&store.get(3).unwrap()), 0.0);
}
