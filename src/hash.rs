//! Blob content hashing, used only for deduplication indexing, never as a
//! cryptographic guarantee (SPEC_FULL.md §4.1). A single SHA-1 digest over
//! blob bytes is enough to recognize repeated content across the stream.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// A SHA-1 digest over a blob's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobHash([u8; 20]);

impl BlobHash {
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content);
        let digest: [u8; 20] = hasher.finalize().into();
        BlobHash(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Debug for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BlobHash({self})")
    }
}

impl Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for BlobHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(format!("`{s}` is not a 40-character hex digest"));
        }
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(BlobHash(out))
    }
}
