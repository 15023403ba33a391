//! Error types used by the conversion pipeline.

/// Errors raised while converting rows into graph entities and writing them out.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A data row could not be turned into entities.
    #[error("malformed row {line:?}: {reason}")]
    MalformedRow { line: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transfer of {path} failed: {reason}")]
    Transfer { path: String, reason: String },
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The other side of a channel went away before the run was complete.
    #[error("channel peer disconnected")]
    WriterGone,
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl Error {
    /// Construct a `MalformedRow` error for `line`.
    pub fn malformed<R: ToString>(line: &str, reason: R) -> Self {
        Error::MalformedRow {
            line: line.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is confined to a single row and may be skipped.
    pub fn is_malformed_row(&self) -> bool {
        matches!(self, Error::MalformedRow { .. })
    }
}
