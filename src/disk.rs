//! Disk space utilities
//!
//! Free-space preflight for downloads with a declared content length.

use crate::error::{FetchError, Result};
use crate::output;
use std::path::Path;

/// Check that `dir` has room for `required_bytes` more data.
///
/// If the free-space probe fails (exotic filesystems, permissions), logs a
/// warning and lets the download proceed; running out of space mid-stream
/// only costs the temp file.
pub fn check_disk_space(dir: &Path, required_bytes: u64) -> Result<()> {
    match available_space(dir) {
        Some(avail) => {
            if avail < required_bytes {
                return Err(FetchError::InsufficientSpace {
                    required: format_bytes(required_bytes),
                    available: format_bytes(avail),
                });
            }
            Ok(())
        }
        None => {
            output::warning(&format!(
                "could not check free space in {}; ensure at least {} is available",
                dir.display(),
                format_bytes(required_bytes)
            ));
            Ok(())
        }
    }
}

/// Available bytes on the filesystem holding `dir`. None if the check fails.
pub fn available_space(dir: &Path) -> Option<u64> {
    let probe = if dir.exists() {
        dir
    } else {
        dir.parent().filter(|p| p.exists())?
    };
    fs2::available_space(probe).ok()
}

/// Format bytes as a human-readable string (e.g. "8.6 GiB")
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;

    if bytes >= TIB {
        format!("{:.1} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sufficient_space_passes() {
        let tmp = tempdir().unwrap();
        check_disk_space(tmp.path(), 1).unwrap();
    }

    #[test]
    fn absurd_requirement_fails() {
        let tmp = tempdir().unwrap();
        let petabyte = 1024u64 * 1024 * 1024 * 1024 * 1024;
        let result = check_disk_space(tmp.path(), 10 * petabyte);
        if let Err(e) = result {
            assert!(matches!(e, FetchError::InsufficientSpace { .. }));
        }
    }

    #[test]
    fn nonexistent_dir_uses_parent() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("does-not-exist");
        assert!(available_space(&nested).is_some());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1024), "1.0 KiB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MiB");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.5 GiB");
        assert_eq!(format_bytes(1024u64 * 1024 * 1024 * 1024), "1.0 TiB");
    }
}
