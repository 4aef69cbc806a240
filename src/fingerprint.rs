//! BLAKE3 content fingerprints and declared-digest verification
//!
//! Resolved trees are fingerprinted over normalized (path, mode, bytes)
//! tuples in sorted path order, so the same content always produces the same
//! fingerprint regardless of how it was resolved. Declared digests on HTTP
//! sources use the `sha256:<hex>` form and are verified byte-for-byte.

use std::fmt;
use std::str::FromStr;

use blake3::Hasher;
use sha2::{Digest, Sha256};

use crate::error::{PacksmithError, Result};
use crate::tree::{Entry, Tree};

/// Prefix for BLAKE3 content fingerprints
pub const FINGERPRINT_PREFIX: &str = "blake3:";

/// Calculate the content fingerprint of a tree
///
/// Entries are hashed in sorted path order with null separators between
/// fields, so two trees with identical (path, mode, bytes) tuples always
/// fingerprint identically.
pub fn fingerprint_tree(tree: &Tree) -> String {
    let mut hasher = Hasher::new();

    for (path, entry) in tree.entries() {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        match entry {
            Entry::File { data, mode } => {
                hasher.update(&mode.to_le_bytes());
                hasher.update(b"\0");
                hasher.update(data);
            }
            Entry::Dir { mode } => {
                hasher.update(&mode.to_le_bytes());
                hasher.update(b"\0d");
            }
        }
        hasher.update(b"\0");
    }

    format!("{}{}", FINGERPRINT_PREFIX, hasher.finalize().to_hex())
}

/// A declared content digest in `<algorithm>:<hex>` form
///
/// Only `sha256` is supported; the algorithm tag is kept explicit so digest
/// strings are self-describing in specs and error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    hex: String,
}

impl ContentDigest {
    /// Compute the digest of the given bytes
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest {
            hex: hex::encode(hasher.finalize()),
        }
    }

    /// Check whether the given bytes match this digest
    pub fn matches(&self, data: &[u8]) -> bool {
        ContentDigest::of(data) == *self
    }
}

impl FromStr for ContentDigest {
    type Err = PacksmithError;

    fn from_str(s: &str) -> Result<Self> {
        let Some((algo, hex_part)) = s.split_once(':') else {
            return Err(PacksmithError::Validation {
                message: format!("digest '{s}' must have the form sha256:<hex>"),
            });
        };
        if algo != "sha256" {
            return Err(PacksmithError::Validation {
                message: format!("unsupported digest algorithm '{algo}' (only sha256)"),
            });
        }
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PacksmithError::Validation {
                message: format!("digest '{s}' is not a valid sha256 hex digest"),
            });
        }
        Ok(ContentDigest {
            hex: hex_part.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.hex)
    }
}
