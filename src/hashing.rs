//! Document identity.
//!
//! Two independent keys are derived for every document:
//!
//! | Key | Derived from | Used for |
//! |-----|--------------|----------|
//! | [`ContentHash`] | full byte content | cache validity |
//! | [`DocumentKey`] | absolute resolved path | naming the index record |
//!
//! A record is valid for a document iff its stored content hash equals
//! [`hash_content`] of the current bytes. The document key never changes
//! when the content changes, only when the file moves.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Number of hex characters of the path digest kept in a [`DocumentKey`].
pub const PATH_HASH_LEN: usize = 12;

/// Digest of a document's full byte content (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable record name for a document: `<stem>_<12 hex chars of path digest>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes the full document byte stream.
pub fn hash_content(bytes: &[u8]) -> ContentHash {
    ContentHash(hex::encode(Sha256::digest(bytes)))
}

/// Derives the record key from an absolute, already-resolved path.
///
/// The stem is kept verbatim for discoverability in the index directory;
/// the digest suffix disambiguates same-named files in different folders.
pub fn derive_key(absolute_path: &Path) -> DocumentKey {
    let digest = hex::encode(Sha256::digest(
        absolute_path.to_string_lossy().as_bytes(),
    ));
    let stem = absolute_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    DocumentKey(format!("{}_{}", stem, &digest[..PATH_HASH_LEN]))
}
