//! Path sandbox guard
//!
//! Sanitizes user-supplied subfolder/filename segments and proves the
//! resolved destination stays inside the configured root. Resolution is
//! pure path computation; the containment check only reads the filesystem.

use crate::error::{FetchError, Result};
use std::path::{Component, Path, PathBuf};

/// Placeholder filename when the URL has no usable path segment
const FALLBACK_FILENAME: &str = "download";

/// Sanitize one path segment.
///
/// Any character outside `[A-Za-z0-9._-]` becomes `_`, then leading and
/// trailing dots/underscores are stripped. An empty result becomes `_`.
pub fn safe_part(part: &str) -> String {
    let replaced: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(['.', '_']);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derive a filename from the final path segment of an http(s) URL.
///
/// Query strings and fragments are ignored; a URL with no path segment
/// falls back to a fixed placeholder name. The result is sanitized.
pub fn filename_from_url(url: &str) -> String {
    // Strip query and fragment before looking at path segments
    let clean = url.split(['?', '#']).next().unwrap_or(url);

    // Skip past "scheme://host" so a bare host never becomes a filename
    let path = clean
        .find("://")
        .map(|i| &clean[i + 3..])
        .and_then(|rest| rest.find('/').map(|i| &rest[i + 1..]))
        .unwrap_or("");

    let base = path.rsplit('/').next().filter(|s| !s.is_empty());
    safe_part(base.unwrap_or(FALLBACK_FILENAME))
}

/// Resolve the sandboxed destination path for a request.
///
/// Splits the raw subfolder on `/` and `\`, drops empty and `.` segments,
/// sanitizes the rest, and appends the sanitized filename (derived from the
/// URL when none was given). A `..` segment or an absolute subfolder is a
/// fatal sandbox escape, never silently corrected.
pub fn resolve(root: &Path, subfolder: &str, filename: &str, url: &str) -> Result<PathBuf> {
    let raw = subfolder.trim();
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(FetchError::SandboxEscape {
            path: PathBuf::from(raw),
            root: root.to_path_buf(),
        });
    }

    let mut dest = root.to_path_buf();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(FetchError::SandboxEscape {
                    path: PathBuf::from(raw),
                    root: root.to_path_buf(),
                });
            }
            p => dest.push(safe_part(p)),
        }
    }

    let fname = if filename.trim().is_empty() {
        filename_from_url(url)
    } else {
        safe_part(filename.trim())
    };
    dest.push(fname);
    Ok(dest)
}

/// Verify that `dest` is a descendant of `root`, resolving symlinks.
///
/// Canonicalizes the deepest existing ancestor of each path and re-appends
/// the remaining components, so the check works before the destination
/// exists and is robust to symlink/`..` normalization differences.
pub fn ensure_within_root(root: &Path, dest: &Path) -> Result<()> {
    let root_resolved = resolve_existing_prefix(root)?;
    let dest_resolved = resolve_existing_prefix(dest)?;
    if dest_resolved.starts_with(&root_resolved) {
        Ok(())
    } else {
        Err(FetchError::SandboxEscape {
            path: dest.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

/// Canonicalize the deepest existing ancestor of `path`, then re-append the
/// components that do not exist yet (normalizing `.` and `..` lexically).
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut pending: Vec<std::ffi::OsString> = Vec::new();

    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                pending.push(name.to_os_string());
                existing.pop();
            }
            // Ran out of named components (relative path fully nonexistent)
            None => break,
        }
    }

    let mut resolved = if existing.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        existing.canonicalize()?
    };
    for name in pending.iter().rev() {
        if name == ".." {
            resolved.pop();
        } else if name != "." {
            resolved.push(name);
        }
    }

    // Belt and braces: the rebuilt path must be free of traversal components
    debug_assert!(
        !resolved
            .components()
            .any(|c| matches!(c, Component::ParentDir)),
        "resolved path still contains '..'"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn safe_part_replaces_disallowed_chars() {
        assert_eq!(safe_part("my model?.bin"), "my_model_.bin");
        assert_eq!(safe_part("a/b"), "a_b");
        assert_eq!(safe_part("model (1).safetensors"), "model__1_.safetensors");
    }

    #[test]
    fn safe_part_strips_leading_trailing_dots_and_underscores() {
        assert_eq!(safe_part(".hidden"), "hidden");
        assert_eq!(safe_part("__x__"), "x");
        assert_eq!(safe_part("..."), "_");
        assert_eq!(safe_part(""), "_");
    }

    #[test]
    fn filename_from_url_basic() {
        assert_eq!(
            filename_from_url("https://example.test/models/model.bin"),
            "model.bin"
        );
        assert_eq!(
            filename_from_url("https://example.test/model.bin?token=abc#frag"),
            "model.bin"
        );
    }

    #[test]
    fn filename_from_url_fallback() {
        assert_eq!(filename_from_url("https://example.test"), FALLBACK_FILENAME);
        assert_eq!(filename_from_url("https://example.test/"), FALLBACK_FILENAME);
    }

    #[test]
    fn resolve_nested_subfolder() {
        let root = Path::new("/models");
        let dest = resolve(root, "controlnet/myset", "x.bin", "https://e.test/x.bin").unwrap();
        assert_eq!(dest, Path::new("/models/controlnet/myset/x.bin"));
    }

    #[test]
    fn resolve_drops_empty_and_dot_segments() {
        let root = Path::new("/models");
        let dest = resolve(root, "a//.//b", "x.bin", "https://e.test/x.bin").unwrap();
        assert_eq!(dest, Path::new("/models/a/b/x.bin"));
    }

    #[test]
    fn resolve_rejects_parent_dir_segments() {
        let root = Path::new("/models");
        let err = resolve(root, "../../etc", "passwd", "https://e.test/x").unwrap_err();
        assert!(matches!(err, FetchError::SandboxEscape { .. }));
    }

    #[test]
    fn resolve_rejects_absolute_subfolder() {
        let root = Path::new("/models");
        let err = resolve(root, "/etc", "passwd", "https://e.test/x").unwrap_err();
        assert!(matches!(err, FetchError::SandboxEscape { .. }));
    }

    #[test]
    fn resolve_derives_filename_when_empty() {
        let root = Path::new("/models");
        let dest = resolve(root, "checkpoints", "", "https://e.test/model.bin").unwrap();
        assert_eq!(dest, Path::new("/models/checkpoints/model.bin"));
    }

    #[test]
    fn ensure_within_root_accepts_descendant() {
        let tmp = tempdir().unwrap();
        let dest = tmp.path().join("sub/not/yet/created/file.bin");
        ensure_within_root(tmp.path(), &dest).unwrap();
    }

    #[test]
    fn ensure_within_root_rejects_outside_path() {
        let tmp = tempdir().unwrap();
        let other = tempdir().unwrap();
        let err = ensure_within_root(tmp.path(), &other.path().join("f")).unwrap_err();
        assert!(matches!(err, FetchError::SandboxEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn ensure_within_root_follows_symlinks() {
        let root = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let link = root.path().join("sneaky");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let err = ensure_within_root(root.path(), &link.join("file.bin")).unwrap_err();
        assert!(matches!(err, FetchError::SandboxEscape { .. }));
    }
}
