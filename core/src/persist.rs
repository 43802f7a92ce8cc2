use crate::catalog::DocCatalog;
use crate::error::{Error, Result};
use crate::store::{GenerationInfo, VectorStore};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub num_terms: u64,
    pub generation: u64,
    pub created_at: String,
    pub version: u32,
}

impl From<&GenerationInfo> for MetaFile {
    fn from(info: &GenerationInfo) -> Self {
        Self {
            num_docs: info.num_docs,
            num_terms: info.num_terms,
            generation: info.generation,
            created_at: info.created_at.clone(),
            version: FORMAT_VERSION,
        }
    }
}

/// On-disk layout of one index directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn vectors(&self) -> PathBuf { self.root.join("vectors.sled") }
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
    fn staged_docs(&self) -> PathBuf { self.root.join("docs.bin.tmp") }
    pub fn staged_texts_dir(&self) -> PathBuf { self.root.join("texts.staging") }
    pub fn text_rel(doc_id: DocId) -> String { format!("texts/{doc_id}.txt") }
}

pub fn open_store(paths: &IndexPaths) -> Result<VectorStore> {
    create_dir_all(&paths.root)?;
    VectorStore::open(paths.vectors())
}

pub fn save_docs(paths: &IndexPaths, docs: &DocCatalog) -> Result<()> {
    stage_docs(paths, docs)?;
    publish_docs(paths)
}

/// Write the catalog beside the live file. Nothing changes for readers until
/// [`publish_docs`].
pub fn stage_docs(paths: &IndexPaths, docs: &DocCatalog) -> Result<()> {
    create_dir_all(&paths.root)?;
    let bytes = bincode::serialize(docs).map_err(|source| Error::Codec { key: "docs.bin".into(), source })?;
    let mut f = File::create(paths.staged_docs())?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    Ok(())
}

pub fn publish_docs(paths: &IndexPaths) -> Result<()> {
    std::fs::rename(paths.staged_docs(), paths.docs())?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<DocCatalog> {
    let mut f = File::open(paths.docs())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    bincode::deserialize(&buf).map_err(|source| Error::Codec { key: "docs.bin".into(), source })
}

pub fn save_text(paths: &IndexPaths, doc_id: DocId, text: &str) -> Result<String> {
    create_dir_all(paths.texts_dir())?;
    let rel = IndexPaths::text_rel(doc_id);
    std::fs::write(paths.root.join(&rel), text)?;
    Ok(rel)
}

/// Empty staging directory for the texts of the next build.
pub fn begin_text_staging(paths: &IndexPaths) -> Result<()> {
    let staging = paths.staged_texts_dir();
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    create_dir_all(&staging)?;
    Ok(())
}

/// Write a plot into the staging directory. The returned path is where the
/// text lives once published.
pub fn stage_text(paths: &IndexPaths, doc_id: DocId, text: &str) -> Result<String> {
    std::fs::write(paths.staged_texts_dir().join(format!("{doc_id}.txt")), text)?;
    Ok(IndexPaths::text_rel(doc_id))
}

/// Swap the staged texts in for the live ones.
pub fn publish_texts(paths: &IndexPaths) -> Result<()> {
    let live = paths.texts_dir();
    let retired = paths.root.join("texts.old");
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    if live.exists() {
        std::fs::rename(&live, &retired)?;
    }
    std::fs::rename(paths.staged_texts_dir(), &live)?;
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    Ok(())
}

pub fn load_text(paths: &IndexPaths, rel: &str) -> Result<String> {
    Ok(std::fs::read_to_string(paths.root.join(rel))?)
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

/// Open everything a reader needs: the catalog and the vector store.
pub fn load_index(paths: &IndexPaths) -> Result<(DocCatalog, VectorStore)> {
    let docs = load_docs(paths)?;
    let store = open_store(paths)?;
    Ok((docs, store))
}
