//! Error types for the acquisition pipeline
//!
//! Every failure crosses the `Fetcher` boundary as a single descriptive
//! `FetchError`. Variants are classified as transient (worth retrying the
//! download) or fatal (retrying cannot fix) via [`FetchError::is_transient`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for modelfetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Main error type for modelfetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL failed validation (scheme not http/https, or no host)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Expected digest is not a 64-character hex string
    #[error("SHA-256 must be a 64-character hex string, got '{0}'")]
    MalformedDigest(String),

    /// Resolved destination escapes the sandbox root
    #[error("destination '{path}' resolves outside the sandbox root '{root}'")]
    SandboxEscape { path: PathBuf, root: PathBuf },

    /// Network-layer failure (DNS, connect, TLS, timeout)
    #[error("network error: {0}")]
    Transport(String),

    /// Server answered with a non-success HTTP status
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Response body looked like an error or login page, not the artifact
    #[error("server returned an error payload: {0}")]
    ErrorPayload(&'static str),

    /// Not enough free space on the destination filesystem
    #[error("not enough free space: need {required}, free {available}")]
    InsufficientSpace { required: String, available: String },

    /// Download completed with zero bytes written
    #[error("download resulted in 0 bytes; refusing to create or overwrite the destination")]
    EmptyDownload,

    /// Atomic rename kept failing with a transient lock; temp file left behind
    #[error(
        "could not finalize '{dest}' after {attempts} attempts (file lock, e.g. antivirus); \
         partial file kept at '{tmp}': {source}"
    )]
    CommitLocked {
        dest: PathBuf,
        tmp: PathBuf,
        attempts: u32,
        source: std::io::Error,
    },

    /// Computed digest does not match the expected one
    #[error("SHA-256 mismatch for '{path}'\n  expected: {expected}\n  got:      {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// All retries for transient failures were used up
    #[error("download failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<FetchError>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Returns true if the error is transient and the download attempt
    /// should be retried.
    ///
    /// Transport failures and connection-class I/O errors are transient;
    /// so are HTTP 408/429/5xx (the server may recover). Everything else
    /// is fatal: retrying cannot fix a bad request, a full disk, an error
    /// page, or a corrupt file.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::HttpStatus { status, .. } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            FetchError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            FetchError::InvalidUrl(_)
            | FetchError::MalformedDigest(_)
            | FetchError::SandboxEscape { .. }
            | FetchError::ErrorPayload(_)
            | FetchError::InsufficientSpace { .. }
            | FetchError::EmptyDownload
            | FetchError::CommitLocked { .. }
            | FetchError::DigestMismatch { .. }
            | FetchError::RetriesExhausted { .. } => false,
        }
    }
}

/// Map a ureq error into the pipeline taxonomy.
///
/// Transport errors (DNS, connect, TLS, timeout) become [`FetchError::Transport`];
/// non-success statuses become [`FetchError::HttpStatus`].
pub(crate) fn from_ureq(err: ureq::Error, url: &str) -> FetchError {
    match err {
        ureq::Error::Status(status, _) => FetchError::HttpStatus {
            status,
            url: url.to_string(),
        },
        ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
    }
}
