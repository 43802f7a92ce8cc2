//! Generational sparse vector store on top of sled.
//!
//! Every vectorization pass is written to its own tree, `vectors-<gen>`. The
//! pointer to the current generation lives in the default tree and is flipped
//! only after the new tree is fully written and flushed, so readers see either
//! the complete old generation or the complete new one.

use crate::error::{Error, Result};
use crate::sparse::SparseVector;
use crate::vectorizer::{Normalization, Vectorized};
use crate::{DocId, TermId};
use serde::{Deserialize, Serialize};
use std::path::Path;

const GENERATION_KEY: &[u8] = b"generation";
const INFO_KEY: &[u8] = b"generation_info";

/// Bookkeeping for one committed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub generation: u64,
    pub num_docs: u64,
    pub num_terms: u64,
    pub normalization: Normalization,
    pub created_at: String,
}

#[derive(Clone)]
pub struct VectorStore {
    db: sled::Db,
}

impl VectorStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store removed on drop. Used by tests and throwaway runs.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn generation_info(&self) -> Result<Option<GenerationInfo>> {
        match self.db.get(INFO_KEY)? {
            Some(bytes) => {
                let info = bincode::deserialize(&bytes).map_err(|source| Error::Codec { key: "generation_info".into(), source })?;
                Ok(Some(info))
            }
            None => Ok(None),
        }
    }

    fn current_generation(&self) -> Result<Option<u64>> {
        match self.db.get(GENERATION_KEY)? {
            Some(bytes) => {
                let raw = <[u8; 8]>::try_from(&bytes[..]).map_err(|_| bad_key("generation", bytes.len()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn current_tree(&self) -> Result<Option<sled::Tree>> {
        match self.current_generation()? {
            Some(generation) => Ok(Some(self.db.open_tree(tree_name(generation))?)),
            None => Ok(None),
        }
    }

    /// Commit a vectorization pass as the new current generation.
    pub fn commit(&self, vectorized: &Vectorized) -> Result<GenerationInfo> {
        self.replace_all(
            vectorized.vectors.iter().map(|(id, v)| (*id, v)),
            vectorized.vocabulary.len(),
            vectorized.normalization,
        )
    }

    /// Write every vector into a fresh generation and swap it in.
    ///
    /// The previous generation stays current until the new one is flushed, and
    /// is dropped afterwards.
    pub fn replace_all<'a, I>(&self, vectors: I, num_terms: usize, normalization: Normalization) -> Result<GenerationInfo>
    where
        I: IntoIterator<Item = (DocId, &'a SparseVector)>,
    {
        let previous = self.current_generation()?;
        let generation = previous.map_or(1, |g| g + 1);
        let name = tree_name(generation);

        // Leftovers from a pass that died before its pointer flip.
        self.db.drop_tree(&name)?;
        let tree = self.db.open_tree(&name)?;

        let mut batch = sled::Batch::default();
        let mut num_docs = 0u64;
        for (doc_id, vector) in vectors {
            let bytes = bincode::serialize(vector).map_err(|source| Error::Codec { key: format!("vector {doc_id}"), source })?;
            batch.insert(&doc_id.to_be_bytes()[..], bytes);
            num_docs += 1;
        }
        tree.apply_batch(batch)?;
        self.db.flush()?;

        let info = GenerationInfo {
            generation,
            num_docs,
            num_terms: num_terms as u64,
            normalization,
            created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        };
        let info_bytes = bincode::serialize(&info).map_err(|source| Error::Codec { key: "generation_info".into(), source })?;
        let mut pointer = sled::Batch::default();
        pointer.insert(GENERATION_KEY, &generation.to_be_bytes()[..]);
        pointer.insert(INFO_KEY, info_bytes);
        self.db.apply_batch(pointer)?;
        self.db.flush()?;

        if let Some(old) = previous {
            self.db.drop_tree(tree_name(old))?;
        }
        tracing::info!(generation, num_docs, num_terms, "committed vector generation");
        Ok(info)
    }

    /// Vector of one document. Unknown ids are `Error::NotFound`.
    pub fn get(&self, doc_id: DocId) -> Result<SparseVector> {
        let tree = self.current_tree()?.ok_or(Error::NotFound(doc_id))?;
        let bytes = tree.get(doc_id.to_be_bytes())?.ok_or(Error::NotFound(doc_id))?;
        decode_vector(doc_id, &bytes)
    }

    /// Fresh traversal of every `(doc_id, term_index, weight)` triple of the
    /// current generation, ordered by document id then term index.
    pub fn scan_all(&self) -> Result<Scan> {
        let inner = self.current_tree()?.map(|tree| tree.iter());
        Ok(Scan { inner, current: None })
    }

    /// Number of documents in the current generation.
    pub fn len(&self) -> Result<usize> {
        Ok(self.current_tree()?.map_or(0, |tree| tree.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write raw bytes into the current generation, bypassing encoding.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let tree = self.current_tree()?.ok_or(Error::NotFound(0))?;
        tree.insert(key, value)?;
        Ok(())
    }
}

/// Lazy triple iterator returned by [`VectorStore::scan_all`].
pub struct Scan {
    inner: Option<sled::Iter>,
    current: Option<(DocId, std::vec::IntoIter<(TermId, f32)>)>,
}

impl Iterator for Scan {
    type Item = Result<(DocId, TermId, f32)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((doc_id, entries)) = self.current.as_mut() {
                if let Some((term, weight)) = entries.next() {
                    return Some(Ok((*doc_id, term, weight)));
                }
            }
            let (key, value) = match self.inner.as_mut()?.next()? {
                Ok(kv) => kv,
                Err(e) => return Some(Err(e.into())),
            };
            let decoded = decode_doc_id(&key).and_then(|doc_id| Ok((doc_id, decode_vector(doc_id, &value)?)));
            match decoded {
                Ok((doc_id, vector)) => {
                    let entries: Vec<(TermId, f32)> = vector.iter().collect();
                    self.current = Some((doc_id, entries.into_iter()));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn tree_name(generation: u64) -> String {
    format!("vectors-{generation:08}")
}

fn decode_doc_id(key: &[u8]) -> Result<DocId> {
    let raw = <[u8; 4]>::try_from(key).map_err(|_| bad_key("document key", key.len()))?;
    Ok(DocId::from_be_bytes(raw))
}

fn decode_vector(doc_id: DocId, bytes: &[u8]) -> Result<SparseVector> {
    bincode::deserialize(bytes).map_err(|source| Error::Codec { key: format!("vector {doc_id}"), source })
}

fn bad_key(what: &str, len: usize) -> Error {
    Error::Codec {
        key: what.to_string(),
        source: Box::new(bincode::ErrorKind::Custom(format!("unexpected key length {len}"))),
    }
}
