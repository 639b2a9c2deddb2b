use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf file not found: {0}")]
    MissingFile(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("document produced no chunks: {0}")]
    EmptyDocument(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index error: {0}")]
    Index(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("input text list is empty")]
    EmptyInput,

    #[error("text at index {0} is empty")]
    EmptyText(usize),

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from embedding provider: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("vector index not found: {0}")]
    IndexNotFound(String),

    #[error("vector store lock poisoned")]
    LockPoisoned,

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedError),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("dataset file not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset file is not valid JSON of the expected shape: {path}: {details}")]
    DatasetMalformed { path: String, details: String },

    #[error("invalid cutoffs: {0}")]
    InvalidCutoffs(String),

    #[error("retrieval failed for record {index}: {message}")]
    Retrieval { index: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
