//! modelfetch - sandboxed HTTP(S) file acquisition
//!
//! Fetches a file from an HTTP(S) endpoint and materializes it at a
//! sanitized destination inside a bounded root directory. Partial or
//! corrupted data never becomes visible at the final path: every attempt
//! streams into a temp file beside the destination and is published with a
//! single atomic rename. Transient network failures are retried with
//! exponential backoff; content can optionally be verified against a
//! SHA-256 digest.
//!
//! ## Example
//!
//! ```no_run
//! use modelfetch::{Fetcher, FetchRequest};
//!
//! # fn main() -> modelfetch::Result<()> {
//! let fetcher = Fetcher::new("/srv/models");
//! let req = FetchRequest::new("https://example.test/model.bin", "checkpoints");
//! let path = fetcher.fetch(&req)?;
//! println!("materialized at {}", path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Known limitation
//!
//! Concurrent invocations targeting the same destination are not
//! serialized; each rename is atomic, so the last one wins, but there is
//! no mutual exclusion across invocations.

mod commit;
mod disk;
mod download;
mod error;
mod output;
mod progress;
mod request;
mod retry;
mod sandbox;
mod verify;

pub use download::TransferOutcome;
pub use error::{FetchError, Result};
pub use request::{DEFAULT_RETRIES, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FetchRequest};

use std::path::{Path, PathBuf};

/// The acquisition pipeline: validates a request, resolves the sandboxed
/// destination, downloads with bounded retry, and verifies integrity.
///
/// Holds the sandbox root as explicit configuration; there is no global
/// state. One `fetch` call is single-threaded and sequential.
#[derive(Debug, Clone)]
pub struct Fetcher {
    root: PathBuf,
}

impl Fetcher {
    /// Create a fetcher rooted at `root`. The directory is created on the
    /// first fetch if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire the file described by `req`, returning the absolute
    /// destination path.
    ///
    /// Order of operations: validate the request, resolve and prove the
    /// sandboxed destination, skip the download when the file exists and
    /// overwrite is disabled, otherwise download with retry, then verify
    /// the digest if one was supplied.
    pub fn fetch(&self, req: &FetchRequest) -> Result<PathBuf> {
        req.validate()?;

        let dest = sandbox::resolve(&self.root, &req.subfolder, &req.filename, &req.url)?;
        output::action(&format!(
            "Fetching '{}'",
            sandbox::filename_from_url(&req.url)
        ));

        // Prove containment before touching the filesystem; a rejected
        // request must not even create the root.
        sandbox::ensure_within_root(&self.root, &dest)?;
        std::fs::create_dir_all(&self.root)?;

        if dest.exists() && !req.overwrite {
            output::skip(&format!(
                "file exists, skipping download: {}",
                dest.display()
            ));
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            output::detail(&format!("downloading to {}", dest.display()));
            let outcome = retry::with_retry(req.retries, || {
                download::download_once(&req.url, &dest, req.timeout, &req.user_agent)
            })?;
            output::detail(&format!(
                "download complete: {} in {:.1}s",
                disk::format_bytes(outcome.bytes),
                outcome.elapsed.as_secs_f64()
            ));
        }

        if let Some(digest) = &req.sha256 {
            output::detail("verifying sha256");
            verify::verify_sha256(&dest, digest)?;
        }

        // dest exists at this point, so canonicalize gives the absolute path
        Ok(dest.canonicalize()?)
    }
}
