//! Streaming download engine
//!
//! Performs exactly one attempt to materialize the destination file:
//! free-space preflight, error-payload sniffing on the first bytes,
//! 1 MiB chunked streaming into a temp file beside the destination, and
//! handoff to the atomic commit protocol. Transient/fatal classification
//! lives on [`FetchError`]; this module only produces the errors.

use crate::commit;
use crate::disk;
use crate::error::{self, FetchError, Result};
use crate::progress::{self, ProgressGuard};
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Read size for one streaming chunk (1 MiB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// How many leading bytes to inspect for error payloads
const SNIFF_WINDOW: usize = 4096;

/// Result of one successful download attempt
#[derive(Debug, Clone, Copy)]
pub struct TransferOutcome {
    /// Total bytes written to the destination
    pub bytes: u64,
    /// Wall-clock time the attempt took
    pub elapsed: Duration,
}

/// Perform one streaming GET attempt and publish the result at `dest`.
///
/// On any failure before commit the temp file is removed; on commit-retry
/// exhaustion it is intentionally kept for inspection.
pub(crate) fn download_once(
    url: &str,
    dest: &Path,
    timeout: Duration,
    user_agent: &str,
) -> Result<TransferOutcome> {
    let start = Instant::now();
    let parent = dest.parent().ok_or_else(|| {
        FetchError::Io(std::io::Error::other("destination has no parent directory"))
    })?;

    let response = ureq::get(url)
        .timeout(timeout)
        .set("User-Agent", user_agent)
        .call()
        .map_err(|e| error::from_ureq(e, url))?;

    let content_length: Option<u64> = response
        .header("content-length")
        .and_then(|s| s.parse().ok());

    // Free-space sanity before any bytes are written. Overwriting an
    // existing file reclaims its space, so only the delta is required.
    if let Some(needed) = content_length {
        let reclaimable = dest.metadata().map(|m| m.len()).unwrap_or(0);
        disk::check_disk_space(parent, needed.saturating_sub(reclaimable))?;
    }

    let content_type = response
        .header("content-type")
        .unwrap_or("")
        .to_ascii_lowercase();

    let filename = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let pb = progress::create_spinner(&format!("downloading {filename}"));
    let _guard = ProgressGuard::new(&pb);
    if let Some(len) = content_length {
        progress::upgrade_to_bytes(&pb, len);
    }

    // Temp file beside the destination so the final rename is same-filesystem
    // and atomic. Dropped (and deleted) automatically on any early return.
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{filename}."))
        .suffix(".part")
        .tempfile_in(parent)?;

    let mut reader = response.into_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];

    // Gather the leading bytes first so an error or login page is caught
    // before the remainder is streamed.
    let mut head: Vec<u8> = Vec::with_capacity(SNIFF_WINDOW);
    while head.len() < SNIFF_WINDOW {
        let n = read_chunk(&mut reader, &mut buf[..SNIFF_WINDOW - head.len()])?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }

    if content_type.contains("text/html") || content_type.contains("application/json") {
        if let Some(reason) = error_payload_reason(&head) {
            return Err(FetchError::ErrorPayload(reason));
        }
    }

    tmp.write_all(&head)?;
    let mut total = head.len() as u64;
    pb.set_position(total);

    loop {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        tmp.write_all(&buf[..n])?;
        total += n as u64;
        pb.set_position(total);
    }
    tmp.flush()?;

    // An empty file must never be substituted for a requested artifact
    if total == 0 {
        return Err(FetchError::EmptyDownload);
    }

    let tmp_path = tmp.into_temp_path();
    match commit::publish(&tmp_path, dest) {
        Ok(()) => {
            // The rename already consumed the file at the temp path
            drop(tmp_path);
        }
        Err(e @ FetchError::CommitLocked { .. }) => {
            // Keep the fully-written temp file for operator inspection
            let _ = tmp_path.keep();
            return Err(e);
        }
        Err(e) => return Err(e),
    }

    Ok(TransferOutcome {
        bytes: total,
        elapsed: start.elapsed(),
    })
}

/// Check leading response bytes for signs of an error payload.
///
/// Returns a human-readable reason when the body starts with an HTML
/// document marker or is a JSON object with an `"error"` field within the
/// sniff window.
pub(crate) fn error_payload_reason(head: &[u8]) -> Option<&'static str> {
    let trimmed = trim_ascii_start(head);
    let window = &trimmed[..trimmed.len().min(SNIFF_WINDOW)];
    let lower = window.to_ascii_lowercase();

    if lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html") {
        return Some("server returned HTML (possibly an error or login page)");
    }
    if lower.starts_with(b"{") && contains_subslice(&lower, b"\"error\"") {
        return Some("server returned JSON with an error field");
    }
    None
}

/// Read one chunk, re-issuing the read on `Interrupted` instead of failing
/// the whole attempt over a signal.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_html_document() {
        assert!(error_payload_reason(b"<!DOCTYPE html><html>...").is_some());
        assert!(error_payload_reason(b"  \n\t<html lang=\"en\">").is_some());
    }

    #[test]
    fn sniffs_json_error_field() {
        assert!(error_payload_reason(br#"{"error": "not authorized"}"#).is_some());
        assert!(error_payload_reason(br#"{ "status": 403, "Error": "denied" }"#).is_some());
    }

    #[test]
    fn json_without_error_field_passes() {
        assert!(error_payload_reason(br#"{"status": "ok"}"#).is_none());
    }

    #[test]
    fn binary_payload_passes() {
        assert!(error_payload_reason(&[0x7f, 0x45, 0x4c, 0x46, 0x02]).is_none());
        assert!(error_payload_reason(b"").is_none());
    }

    #[test]
    fn html_marker_past_the_start_passes() {
        // Only the document start counts; an artifact can mention HTML
        assert!(error_payload_reason(b"binary data <html> more data").is_none());
    }

    struct FlakyReader {
        interruptions: u32,
        data: &'static [u8],
        pos: usize,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.interruptions > 0 {
                self.interruptions -= 1;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "signal",
                ));
            }
            let n = (self.data.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn read_chunk_absorbs_interrupted_reads() {
        let mut reader = FlakyReader {
            interruptions: 2,
            data: b"abc",
            pos: 0,
        };
        let mut buf = [0u8; 8];
        let n = read_chunk(&mut reader, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc");
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn read_chunk_propagates_real_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                ))
            }
        }
        let err = read_chunk(&mut Broken, &mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    }
}
