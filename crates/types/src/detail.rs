//! Content-addressed detail blobs.

use sha2::{Digest, Sha256};

/// A content identifier: the hex-encoded SHA-256 digest of a blob's bytes.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Cid(String);

impl Cid {
    /// Computes the CID of the given content.
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Cid(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cid {
    fn from(value: String) -> Self {
        Cid(value)
    }
}

/// An immutable blob of bytes referenced by its `Cid`.
#[derive(Debug, Clone)]
pub struct DetailBlob {
    /// Content identifier of `content`.
    pub cid: Cid,
    /// Raw bytes as read from disk or submitted by a caller.
    pub content: Vec<u8>,
}

impl DetailBlob {
    /// Builds a blob, computing its CID from `content`.
    pub fn new(content: Vec<u8>) -> Self {
        let cid = Cid::of(&content);
        DetailBlob { cid, content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_is_deterministic() {
        let a = Cid::of(b"hello");
        let b = Cid::of(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn cid_differs_by_content() {
        assert_ne!(Cid::of(b"hello"), Cid::of(b"world"));
    }
}
