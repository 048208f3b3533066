use docket_types::Oid;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a blob and a tree with identical bytes never share an id.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for blob objects.
    pub const BLOB: Self = Self {
        domain: "docket-blob-v1",
    };
    /// Hasher for tree objects.
    pub const TREE: Self = Self {
        domain: "docket-tree-v1",
    };
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self {
        domain: "docket-commit-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Oid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Oid::from_hash(*hasher.finalize().as_bytes())
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
