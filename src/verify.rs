//! Integrity verification
//!
//! Streams a file through SHA-256 and compares it to the expected digest.
//! A mismatch deletes the file before the error is raised: a failed
//! verification must never leave an unverified file at the trusted path.

use crate::error::{FetchError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Chunk size for reading files during hashing (1 MiB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Expected digest length in hex characters
const SHA256_HEX_LEN: usize = 64;

/// Validate the shape of an expected digest, before any file I/O.
///
/// Returns the normalized (trimmed, lowercased) digest.
pub fn normalize_digest(expected: &str) -> Result<String> {
    let d = expected.trim().to_ascii_lowercase();
    if d.len() != SHA256_HEX_LEN || !d.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FetchError::MalformedDigest(expected.to_string()));
    }
    Ok(d)
}

/// Compute the lowercase hex SHA-256 of a file by streaming its contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = f.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an expected SHA-256 digest.
///
/// On mismatch the file is deleted (best effort) and the error carries
/// both digests.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let expected = normalize_digest(expected)?;
    let actual = sha256_file(path)?;

    if actual != expected {
        let _ = std::fs::remove_file(path);
        return Err(FetchError::DigestMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}
