//! Wire-level input validation shared by both servers: filenames and
//! digests arrive as URL path segments / headers and need the same shape
//! check the original applies before anything touches the filesystem.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// No path separators or whitespace — a name is a single path segment.
    static ref FILENAME: Regex = Regex::new(r"^[^|/\s]+$").unwrap();
    /// A run of 64 hex characters, case-insensitive, anywhere in the header
    /// value — unanchored, matching `pkg/str/format.go`'s `Digest` pattern
    /// exactly. Validation only checks shape; the digest actually used for
    /// comparison is the full header value, not just the matched run.
    static ref DIGEST: Regex = Regex::new(r"(?i)[A-F0-9]{64}").unwrap();
}

pub fn is_valid_filename(name: &str) -> bool {
    FILENAME.is_match(name)
}

pub fn is_valid_digest(digest: &str) -> bool {
    DIGEST.is_match(digest)
}

/// `2xx`.
pub fn success_status(code: u16) -> bool {
    (200..=299).contains(&code)
}
