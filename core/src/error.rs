use crate::DocId;

/// Errors raised by the indexing and query paths.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Vectorization was asked to fit zero documents.
    #[error("cannot vectorize an empty corpus")]
    EmptyCorpus,
    /// The same identifier appeared twice in one vectorization pass.
    #[error("document {0} appears more than once in the corpus")]
    DuplicateDocument(DocId),
    #[error("document {0} not found")]
    NotFound(DocId),
    /// The embedded database could not be opened, read or written.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(#[from] sled::Error),
    /// A record could not be encoded, or a stored one could not be decoded.
    #[error("bad record {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: bincode::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid index metadata: {0}")]
    Meta(#[from] serde_json::Error),
}

impl Error {
    /// Lookups against unknown ids are "no data", not failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
