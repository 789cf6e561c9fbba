//! Acquisition request: what to fetch and where to put it
//!
//! A [`FetchRequest`] is built once per invocation and read-only afterwards.
//! Validation happens before any network or filesystem I/O.

use crate::error::{FetchError, Result};
use std::time::Duration;

/// Default network timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of retries for transient network errors
pub const DEFAULT_RETRIES: u32 = 3;

/// Default User-Agent header value
pub const DEFAULT_USER_AGENT: &str = concat!("modelfetch/", env!("CARGO_PKG_VERSION"));

/// One immutable acquisition request.
///
/// # Example
/// ```
/// use modelfetch::FetchRequest;
///
/// let req = FetchRequest::new("https://example.test/model.bin", "checkpoints")
///     .with_sha256("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
/// assert!(req.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Source URL (http or https, host required)
    pub url: String,
    /// Relative subfolder under the sandbox root (nested with `/` is fine)
    pub subfolder: String,
    /// Destination filename; derived from the URL's last path segment if empty
    pub filename: String,
    /// Re-download even if the destination already exists
    pub overwrite: bool,
    /// Optional expected SHA-256 digest (64 hex chars)
    pub sha256: Option<String>,
    /// Network timeout for one attempt
    pub timeout: Duration,
    /// Number of retries for transient network errors
    pub retries: u32,
    /// User-Agent header value
    pub user_agent: String,
}

impl FetchRequest {
    /// Create a request with default overwrite/timeout/retry/user-agent values.
    pub fn new(url: impl Into<String>, subfolder: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subfolder: subfolder.into(),
            filename: String::new(),
            overwrite: true,
            sha256: None,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set an explicit destination filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the expected SHA-256 digest for post-download verification.
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Skip the download when the destination already exists.
    pub fn keep_existing(mut self) -> Self {
        self.overwrite = false;
        self
    }

    /// Validate URL scheme/host and the expected digest's shape.
    ///
    /// Runs before any I/O so bad input never touches the network or disk.
    pub fn validate(&self) -> Result<()> {
        host_of(&self.url)?;
        if let Some(digest) = &self.sha256 {
            crate::verify::normalize_digest(digest)?;
        }
        Ok(())
    }
}

/// Extract the host component of an http(s) URL, validating the scheme.
fn host_of(url: &str) -> Result<&str> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let rest = if let Some(rest) = lower.strip_prefix("https://") {
        &url[url.len() - rest.len()..]
    } else if let Some(rest) = lower.strip_prefix("http://") {
        &url[url.len() - rest.len()..]
    } else {
        return Err(FetchError::InvalidUrl(format!(
            "URL must start with http:// or https://, got '{url}'"
        )));
    };

    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");
    if host.is_empty() {
        return Err(FetchError::InvalidUrl(format!(
            "URL appears to be missing a hostname: '{url}'"
        )));
    }
    Ok(host)
}
