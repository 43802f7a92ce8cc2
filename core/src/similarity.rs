//! Exact top-N cosine neighbours by exhaustive scan.
//!
//! Every query streams the whole current generation out of the store and
//! accumulates a dot product for each document sharing at least one term with
//! the query. Documents with no shared term never get an accumulator and are
//! not part of the result.

use crate::catalog::LabelResolver;
use crate::error::Result;
use crate::sparse::SparseVector;
use crate::store::VectorStore;
use crate::vectorizer::Normalization;
use crate::{DocId, TermId};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

pub const DEFAULT_MAX_SCAN_ROWS: usize = 2_000_000;

#[derive(Debug, Clone, Copy)]
pub struct SimilarityOptions {
    /// Hard cap on triples read per query. Hitting it truncates the scan, so
    /// results past the cap are approximate.
    pub max_scan_rows: usize,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self { max_scan_rows: DEFAULT_MAX_SCAN_ROWS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub doc_id: DocId,
    pub label: String,
    pub score: f32,
}

struct ScanOutcome {
    scores: HashMap<DocId, f32>,
    scanned: usize,
    truncated: bool,
}

pub struct SimilarityEngine<'a, L: LabelResolver + ?Sized> {
    store: &'a VectorStore,
    labels: &'a L,
    options: SimilarityOptions,
}

impl<'a, L: LabelResolver + ?Sized> SimilarityEngine<'a, L> {
    pub fn new(store: &'a VectorStore, labels: &'a L, options: SimilarityOptions) -> Self {
        Self { store, labels, options }
    }

    /// Ranked `(doc_id, score)` pairs for `query`, without labels.
    ///
    /// An unknown or empty query document yields an empty list.
    pub fn rank(&self, query: DocId, n: usize) -> Result<Vec<(DocId, f32)>> {
        let query_vector = match self.store.get(query) {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if query_vector.is_empty() || n == 0 {
            return Ok(Vec::new());
        }
        let outcome = self.score_generation(query, &query_vector)?;
        if outcome.truncated {
            tracing::warn!(query, max_scan_rows = self.options.max_scan_rows, "scan cap reached, results may be incomplete");
        }
        tracing::debug!(query, scanned = outcome.scanned, candidates = outcome.scores.len(), "scored candidates");
        Ok(top_n(outcome.scores, n))
    }

    /// Score the current generation against `query_vector`, reading at most
    /// `max_scan_rows` triples.
    fn score_generation(&self, query: DocId, query_vector: &SparseVector) -> Result<ScanOutcome> {
        let normalization = self
            .store
            .generation_info()?
            .map(|info| info.normalization)
            .unwrap_or_default();

        let mut scan = self.store.scan_all()?;
        let mut scanned = 0usize;
        let triples = scan
            .by_ref()
            .take(self.options.max_scan_rows)
            .inspect(|_| scanned += 1);
        let scores = cosine_scores(query, query_vector, normalization, triples)?;
        // Anything left after the cap means rows were never scored.
        let truncated = scan.next().is_some();
        Ok(ScanOutcome { scores, scanned, truncated })
    }

    /// Top `n` labelled neighbours of `query`. Ids the label resolver does not
    /// know are dropped from the list.
    pub fn top_n(&self, query: DocId, n: usize) -> Result<Vec<Neighbor>> {
        let start = Instant::now();
        let ranked = self.rank(query, n)?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<DocId> = ranked.iter().map(|(id, _)| *id).collect();
        let mut names = self.labels.names_for(&ids);
        let neighbors: Vec<Neighbor> = ranked
            .into_iter()
            .filter_map(|(doc_id, score)| names.remove(&doc_id).map(|label| Neighbor { doc_id, label, score }))
            .collect();
        tracing::debug!(query, results = neighbors.len(), took_s = start.elapsed().as_secs_f64(), "similarity query");
        Ok(neighbors)
    }

    /// Like [`Self::top_n`], but a failing query is logged and answered with
    /// an empty list.
    pub fn top_n_or_empty(&self, query: DocId, n: usize) -> Vec<Neighbor> {
        match self.top_n(query, n) {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!(query, error = %e, "similarity query failed");
                Vec::new()
            }
        }
    }
}

/// Cosine similarity of `query` against every document in `triples` that
/// shares a term with it. `query_id` itself is skipped.
///
/// With [`Normalization::QueryTime`] the norms of each candidate are gathered
/// during the same pass; candidates with a zero norm are left out.
pub fn cosine_scores<I>(query_id: DocId, query: &SparseVector, normalization: Normalization, triples: I) -> Result<HashMap<DocId, f32>>
where
    I: IntoIterator<Item = Result<(DocId, TermId, f32)>>,
{
    let query_weights: HashMap<TermId, f32> = query.iter().collect();
    let mut dots: HashMap<DocId, f32> = HashMap::new();
    let mut squares: HashMap<DocId, f32> = HashMap::new();
    let track_norms = normalization == Normalization::QueryTime;

    for triple in triples {
        let (doc_id, term, weight) = triple?;
        if doc_id == query_id {
            continue;
        }
        if track_norms {
            *squares.entry(doc_id).or_insert(0.0) += weight * weight;
        }
        if let Some(q) = query_weights.get(&term) {
            *dots.entry(doc_id).or_insert(0.0) += weight * q;
        }
    }

    if track_norms {
        let query_norm = query.norm();
        dots.retain(|doc_id, dot| {
            let norm = squares.get(doc_id).copied().unwrap_or(0.0).sqrt();
            if norm == 0.0 || query_norm == 0.0 {
                return false;
            }
            *dot /= query_norm * norm;
            true
        });
    }
    Ok(dots)
}

/// Highest score first, ties by ascending id, at most `n` entries.
pub fn top_n(scores: HashMap<DocId, f32>, n: usize) -> Vec<(DocId, f32)> {
    let mut ranked: Vec<(DocId, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(rows: &[(DocId, TermId, f32)]) -> Vec<Result<(DocId, TermId, f32)>> {
        rows.iter().copied().map(Ok).collect()
    }

    #[test]
    fn query_time_scores_divide_by_both_norms() {
        let query = SparseVector::from_entries(vec![(0, 0.5)]);
        let rows = triples(&[(1, 0, 0.5), (2, 0, 0.7)]);
        let scores = cosine_scores(1, &query, Normalization::QueryTime, rows).unwrap();
        assert_eq!(scores.len(), 1);
        assert!((scores[&2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_overlap_candidates_are_omitted() {
        let query = SparseVector::from_entries(vec![(0, 1.0)]);
        let rows = triples(&[(2, 1, 1.0), (3, 0, 0.6), (3, 4, 0.8)]);
        let scores = cosine_scores(1, &query, Normalization::IndexTime, rows).unwrap();
        assert!(!scores.contains_key(&2));
        assert!((scores[&3] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let scores: HashMap<DocId, f32> = [(9, 0.5), (4, 0.5), (7, 0.9), (1, 0.1)].into_iter().collect();
        assert_eq!(top_n(scores, 3), vec![(7, 0.9), (4, 0.5), (9, 0.5)]);
    }

    fn single_term_store(ids: &[DocId]) -> VectorStore {
        let store = VectorStore::temporary().unwrap();
        let v = SparseVector::from_entries(vec![(0, 1.0)]);
        store.replace_all(ids.iter().map(|id| (*id, &v)), 1, Normalization::IndexTime).unwrap();
        store
    }

    #[test]
    fn cap_equal_to_generation_size_is_not_truncated() {
        let store = single_term_store(&[1, 2, 3]);
        let labels: HashMap<DocId, String> = HashMap::new();
        let query = store.get(1).unwrap();

        let exact = SimilarityEngine::new(&store, &labels, SimilarityOptions { max_scan_rows: 3 });
        let outcome = exact.score_generation(1, &query).unwrap();
        assert_eq!(outcome.scanned, 3);
        assert!(!outcome.truncated);
        assert_eq!(outcome.scores.len(), 2);

        let capped = SimilarityEngine::new(&store, &labels, SimilarityOptions { max_scan_rows: 2 });
        let outcome = capped.score_generation(1, &query).unwrap();
        assert_eq!(outcome.scanned, 2);
        assert!(outcome.truncated);
        assert_eq!(outcome.scores.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn corrupt_record_fails_query_but_not_session() {
        let store = single_term_store(&[1, 2]);
        store.insert_raw(&3u32.to_be_bytes(), &[1, 2, 3]).unwrap();
        let labels: HashMap<DocId, String> = [(1, "One".to_string()), (2, "Two".to_string())].into_iter().collect();
        let engine = SimilarityEngine::new(&store, &labels, SimilarityOptions::default());

        let err = engine.top_n(1, 5).unwrap_err();
        assert!(matches!(err, crate::Error::Codec { .. }), "{err}");
        assert!(engine.top_n_or_empty(1, 5).is_empty());
    }

    #[test]
    fn scan_errors_propagate() {
        let query = SparseVector::from_entries(vec![(0, 1.0)]);
        let rows = vec![Ok((2, 0, 1.0)), Err(crate::Error::NotFound(3))];
        assert!(cosine_scores(1, &query, Normalization::IndexTime, rows).is_err());
    }
}
