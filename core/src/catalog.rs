use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: String,
    pub genres: Option<String>,
    pub release_date: Option<String>,
    pub languages: Option<String>,
    pub countries: Option<String>,
    /// Relative path to the stored summary text, e.g. texts/{doc_id}.txt
    pub text_path: Option<String>,
}

/// Resolves document ids to display labels. Unknown ids are left out.
pub trait LabelResolver {
    fn names_for(&self, ids: &[DocId]) -> HashMap<DocId, String>;
}

impl LabelResolver for HashMap<DocId, String> {
    fn names_for(&self, ids: &[DocId]) -> HashMap<DocId, String> {
        ids.iter()
            .filter_map(|id| self.get(id).map(|name| (*id, name.clone())))
            .collect()
    }
}

/// Document metadata keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocCatalog {
    docs: BTreeMap<DocId, DocMeta>,
}

impl DocCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, doc_id: DocId, meta: DocMeta) -> Option<DocMeta> {
        self.docs.insert(doc_id, meta)
    }

    pub fn get(&self, doc_id: DocId) -> Option<&DocMeta> { self.docs.get(&doc_id) }

    pub fn contains(&self, doc_id: DocId) -> bool { self.docs.contains_key(&doc_id) }

    pub fn get_mut(&mut self, doc_id: DocId) -> Option<&mut DocMeta> { self.docs.get_mut(&doc_id) }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &DocMeta)> + '_ {
        self.docs.iter().map(|(id, meta)| (*id, meta))
    }

    /// Keep only documents accepted by `keep`, returning how many were dropped.
    pub fn retain<F: FnMut(DocId) -> bool>(&mut self, mut keep: F) -> usize {
        let before = self.docs.len();
        self.docs.retain(|id, _| keep(*id));
        before - self.docs.len()
    }

    /// Case-insensitive substring match on titles, in id order.
    pub fn search_titles(&self, query: &str, limit: usize) -> Vec<(DocId, &DocMeta)> {
        let needle = query.to_lowercase();
        self.iter()
            .filter(|(_, meta)| meta.title.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }

    /// Highest ids first.
    pub fn recent(&self, limit: usize) -> Vec<(DocId, &DocMeta)> {
        self.docs.iter().rev().take(limit).map(|(id, meta)| (*id, meta)).collect()
    }
}

impl LabelResolver for DocCatalog {
    fn names_for(&self, ids: &[DocId]) -> HashMap<DocId, String> {
        ids.iter()
            .filter_map(|id| self.docs.get(id).map(|meta| (*id, meta.title.clone())))
            .collect()
    }
}
