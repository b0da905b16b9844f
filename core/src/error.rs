use crate::DocId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied something the core cannot work with (empty pattern, bad mode, duplicate id).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document {0} not found")]
    NotFound(DocId),

    /// The document is known but its raw text could not be produced.
    #[error("raw text for document {0} not found")]
    MissingText(DocId),

    /// A computed value left its mathematically valid range. Always a logic defect.
    #[error("computation invariant violated: {0}")]
    InvariantViolation(String),

    #[error("resource limit exceeded for {what}: {requested} > {limit}")]
    ResourceExhausted {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    #[error("malformed {artifact} at line {line}: {reason}")]
    Malformed {
        artifact: &'static str,
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Snapshot(#[from] bincode::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::MissingText(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub(crate) fn malformed(artifact: &'static str, line: usize, reason: impl Into<String>) -> Self {
        Error::Malformed { artifact, line, reason: reason.into() }
    }
}
