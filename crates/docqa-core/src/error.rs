use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A caller-supplied query is malformed (e.g. `top_k == 0`, blank question).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No content: {0}")]
    NoContent(String),

    #[error("Empty corpus: an index cannot be built from zero vectors")]
    EmptyCorpus,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider call timed out after {0}s")]
    Timeout(u64),

    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    #[error("Text extraction failed for {path}: {message}")]
    Extract { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Coarse failure classes that callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operator must fix inputs or settings; retrying will not help.
    Configuration,
    /// An external provider call failed; the whole run may be retried.
    Provider,
    /// Persisted index and chunk store disagree or cannot be decoded.
    CorruptStore,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidRequest(_)
            | Error::NoContent(_)
            | Error::EmptyCorpus
            | Error::DimensionMismatch { .. } => ErrorKind::Configuration,
            Error::Provider(_) | Error::Timeout(_) => ErrorKind::Provider,
            Error::CorruptStore(_) => ErrorKind::CorruptStore,
            Error::Extract { .. } | Error::Io(_) | Error::Json(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
