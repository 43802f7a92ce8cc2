//! TF-IDF weighting of a whole corpus.
//!
//! Weights use raw term counts and smoothed idf, `ln((1 + N) / (1 + df)) + 1`.
//! Term indices follow the lexicographic order of the fitted vocabulary, so a
//! given corpus always produces the same indices.

use crate::error::{Error, Result};
use crate::sparse::SparseVector;
use crate::{DocId, TermId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Where vectors are scaled to unit length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Stored weights are L2-normalized; cosine is a plain dot product.
    #[default]
    IndexTime,
    /// Raw tf-idf is stored; norms are accumulated during every query.
    QueryTime,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VectorizerOptions {
    pub normalization: Normalization,
}

/// Result of one vectorization pass.
#[derive(Debug, Clone)]
pub struct Vectorized {
    pub vocabulary: BTreeMap<String, TermId>,
    /// One vector per input document, in input order.
    pub vectors: Vec<(DocId, SparseVector)>,
    pub normalization: Normalization,
}

/// Fit the vocabulary and idf on `corpus` and weight every document.
///
/// Fails on an empty corpus or a repeated identifier. Documents without tokens
/// get an empty vector.
pub fn vectorize(corpus: &[(DocId, Vec<String>)], options: VectorizerOptions) -> Result<Vectorized> {
    if corpus.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    let mut seen_ids: HashSet<DocId> = HashSet::with_capacity(corpus.len());
    let mut term_counts: Vec<HashMap<&str, u32>> = Vec::with_capacity(corpus.len());
    let mut df: HashMap<&str, u32> = HashMap::new();
    for (doc_id, tokens) in corpus {
        if !seen_ids.insert(*doc_id) {
            return Err(Error::DuplicateDocument(*doc_id));
        }
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
        for term in counts.keys() {
            *df.entry(*term).or_insert(0) += 1;
        }
        term_counts.push(counts);
    }

    let mut terms: Vec<&str> = df.keys().copied().collect();
    terms.sort_unstable();
    let vocabulary: BTreeMap<String, TermId> = terms
        .iter()
        .enumerate()
        .map(|(i, t)| (t.to_string(), i as TermId))
        .collect();

    let n = corpus.len() as f32;
    let idf: HashMap<&str, (TermId, f32)> = terms
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let df_t = df[t] as f32;
            (*t, (i as TermId, ((1.0 + n) / (1.0 + df_t)).ln() + 1.0))
        })
        .collect();

    let mut vectors = Vec::with_capacity(corpus.len());
    for ((doc_id, _), counts) in corpus.iter().zip(term_counts) {
        let mut vector = SparseVector::from_entries(counts.into_iter().map(|(term, tf)| {
            let (tid, idf_t) = idf[&term];
            (tid, tf as f32 * idf_t)
        }));
        if options.normalization == Normalization::IndexTime {
            vector.l2_normalize();
        }
        vectors.push((*doc_id, vector));
    }

    tracing::info!(
        num_docs = corpus.len(),
        num_terms = vocabulary.len(),
        normalization = ?options.normalization,
        "vectorized corpus"
    );
    Ok(Vectorized { vocabulary, vectors, normalization: options.normalization })
}
