//! Content-based similarity over a corpus of plot summaries.
//!
//! Text goes through [`tokenizer::normalize`], the whole corpus is weighted by
//! [`vectorizer::vectorize`], the resulting [`SparseVector`]s are committed to a
//! [`store::VectorStore`] as one generation, and [`similarity::SimilarityEngine`]
//! answers top-N neighbour queries by scanning that generation.

pub mod catalog;
pub mod error;
pub mod persist;
pub mod similarity;
pub mod sparse;
pub mod store;
pub mod tokenizer;
pub mod vectorizer;

pub use catalog::{DocCatalog, DocMeta, LabelResolver};
pub use error::{Error, Result};
pub use similarity::{Neighbor, SimilarityEngine, SimilarityOptions};
pub use sparse::SparseVector;
pub use store::{GenerationInfo, VectorStore};
pub use vectorizer::{Normalization, Vectorized, VectorizerOptions};

pub type TermId = u32;
pub type DocId = u32;
