//! Atomic commit protocol
//!
//! Publishes a fully-written temporary file at the destination with a
//! single rename, so observers only ever see the old content or the new
//! content. On some platforms (Windows, AV-scanned files) the rename can
//! transiently fail while another process holds the destination open; the
//! rename itself is retried briefly, never the whole download.

use crate::error::{FetchError, Result};
use std::path::Path;
use std::time::Duration;

/// Attempts to overcome transient file locks on the destination
const REPLACE_RETRY_MAX: u32 = 30;

/// Sleep between replace attempts
const REPLACE_RETRY_SLEEP: Duration = Duration::from_millis(250);

/// Atomically publish `tmp` at `dest`, retrying transient lock errors.
///
/// `tmp` must live in the same directory as `dest` so the rename stays on
/// one filesystem. On lock-retry exhaustion the temp file is left in place
/// for inspection and the returned error names it.
pub fn publish(tmp: &Path, dest: &Path) -> Result<()> {
    publish_with_policy(tmp, dest, REPLACE_RETRY_MAX, REPLACE_RETRY_SLEEP)
}

/// Internal: publish with configurable retry policy (for testing)
fn publish_with_policy(
    tmp: &Path,
    dest: &Path,
    max_attempts: u32,
    sleep: Duration,
) -> Result<()> {
    let mut attempts = 0;
    loop {
        match std::fs::rename(tmp, dest) {
            Ok(()) => return Ok(()),
            Err(e) if is_lock_error(&e) => {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(FetchError::CommitLocked {
                        dest: dest.to_path_buf(),
                        tmp: tmp.to_path_buf(),
                        attempts,
                        source: e,
                    });
                }
                std::thread::sleep(sleep);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// EBUSY is 16 on Linux and macOS; on Windows the lock surfaces as
// PermissionDenied (ERROR_ACCESS_DENIED / ERROR_SHARING_VIOLATION).
const EBUSY: i32 = 16;

/// Transient deny of a rename: the destination is held open elsewhere.
fn is_lock_error(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::PermissionDenied || e.raw_os_error() == Some(EBUSY)
}
