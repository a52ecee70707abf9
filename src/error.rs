//! Error types for LFS transfer operations.

use std::fmt;

use thiserror::Error;

/// Result type for LFS transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The transfer step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The single PUT of a basic transfer.
    Upload,
    /// Fetching object content after a download negotiation.
    Download,
    /// The multipart init request.
    Init,
    /// One part upload; carries the zero-based index into the part list.
    Part(usize),
    /// The multipart commit request.
    Commit,
    /// The post-upload verify request.
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Upload => f.write_str("upload"),
            Stage::Download => f.write_str("download"),
            Stage::Init => f.write_str("init"),
            Stage::Part(index) => write!(f, "part {}", index + 1),
            Stage::Commit => f.write_str("commit"),
            Stage::Verify => f.write_str("verify"),
        }
    }
}

/// Errors that can occur during LFS operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Batch negotiation failed or returned an unusable shape
    #[error("unexpected response from LFS server: {message} (status: {status})")]
    Protocol { status: u16, message: String },

    /// The server negotiated a transfer mode this client does not implement
    #[error("unsupported transfer mode: {0}")]
    UnsupportedTransfer(String),

    /// A transfer-stage HTTP call failed.
    ///
    /// `message` is the server-supplied explanation when the response carried
    /// one; `None` means the server gave no reason beyond the status code.
    #[error("'{}' action failed with HTTP {}{}", .stage, .status, .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Transfer {
        stage: Stage,
        status: u16,
        message: Option<String>,
    },

    /// Object not found on server
    #[error("object not found: {0}")]
    NotFound(String),

    /// Downloaded content does not hash to the requested OID
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// OID parsing error
    #[error("invalid OID: {0}")]
    InvalidOid(String),

    /// HTTP request failed before a status code was available
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}
