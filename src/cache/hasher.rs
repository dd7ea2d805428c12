//! Digest parsing and streamed file hashing (SHA-256 and BLAKE3).

use crate::core::cooker::CookContext;
use crate::core::error::{CacheError, CookError};
use sha2::Digest as _;
use std::fmt;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn prefix(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Length of a full digest in hex characters.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 | HashAlgorithm::Blake3 => 64,
        }
    }
}

/// Expected content digest, parsed from a `hash` parameter.
///
/// Accepts `sha256:<hex>`, `blake3:<hex>` or bare `<hex>` (SHA-256).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    algorithm: HashAlgorithm,
    hex: String,
    raw: String,
}

impl Digest {
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let (algorithm, hex) = match raw.split_once(':') {
            Some(("sha256", hex)) => (HashAlgorithm::Sha256, hex),
            Some(("blake3", hex)) => (HashAlgorithm::Blake3, hex),
            Some(_) => return Err(CacheError::InvalidHash(raw.to_string())),
            None => (HashAlgorithm::Sha256, raw),
        };
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CacheError::InvalidHash(raw.to_string()));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
            raw: raw.to_string(),
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// The parameter exactly as written; also the cache file name.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the digest is as long as the algorithm's output. Shorter or
    /// longer digests parse but can never match.
    pub fn has_full_length(&self) -> bool {
        self.hex.len() == self.algorithm.hex_len()
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Incremental hasher over either algorithm.
pub enum StreamHasher {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl StreamHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => StreamHasher::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => StreamHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamHasher::Sha256(h) => h.update(data),
            StreamHasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            StreamHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamHasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Hash a file, checking for cancellation between chunks.
pub fn hash_file(
    path: &Path,
    algorithm: HashAlgorithm,
    ctx: &CookContext,
) -> Result<String, CookError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = StreamHasher::new(algorithm);
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    loop {
        ctx.check()?;
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Hash an in-memory buffer.
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Interrupt;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_hasher_digest_forms() {
        let d = Digest::parse("sha256:ABCDEF").unwrap();
        assert_eq!(d.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(d.hex(), "abcdef");
        assert_eq!(d.as_str(), "sha256:ABCDEF");

        let d = Digest::parse("blake3:00ff").unwrap();
        assert_eq!(d.algorithm(), HashAlgorithm::Blake3);

        let d = Digest::parse("deadbeef").unwrap();
        assert_eq!(d.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(d.to_string(), "deadbeef");
    }

    #[test]
    fn test_hasher_digest_full_length() {
        assert!(!Digest::parse("deadbeef").unwrap().has_full_length());
        assert!(Digest::parse(HELLO_SHA256).unwrap().has_full_length());
        let b3 = format!("blake3:{}", blake3::hash(b"hello world").to_hex());
        assert!(Digest::parse(&b3).unwrap().has_full_length());
        let long = format!("{HELLO_SHA256}00");
        assert!(!Digest::parse(&long).unwrap().has_full_length());
    }

    #[test]
    fn test_hasher_digest_rejects_garbage() {
        for bad in ["", "sha256:", "md5:abcd", "not-hex", "../etc/passwd", "abc/def"] {
            assert!(
                matches!(Digest::parse(bad), Err(CacheError::InvalidHash(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_hasher_matches_case_insensitive() {
        let d = Digest::parse(&HELLO_SHA256.to_ascii_uppercase()).unwrap();
        assert!(d.matches(HELLO_SHA256));
        assert!(!d.matches("00"));
    }

    #[test]
    fn test_hasher_known_sha256() {
        assert_eq!(hash_bytes(b"hello world", HashAlgorithm::Sha256), HELLO_SHA256);
    }

    #[test]
    fn test_hasher_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        let data = vec![7u8; STREAM_BUF_SIZE * 2 + 13];
        std::fs::write(&path, &data).unwrap();
        let ctx = CookContext::new();
        for alg in [HashAlgorithm::Sha256, HashAlgorithm::Blake3] {
            assert_eq!(hash_file(&path, alg, &ctx).unwrap(), hash_bytes(&data, alg));
        }
        assert_eq!(
            hash_bytes(&data, HashAlgorithm::Blake3),
            blake3::hash(&data).to_hex().to_string()
        );
    }

    #[test]
    fn test_hasher_file_observes_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        std::fs::write(&path, b"data").unwrap();
        let ctx = CookContext::new();
        ctx.cancel();
        let err = hash_file(&path, HashAlgorithm::Sha256, &ctx).unwrap_err();
        assert!(matches!(err, CookError::Interrupted(Interrupt::Cancelled)));
    }

    #[test]
    fn test_hasher_missing_file_is_cache_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("nope"), HashAlgorithm::Sha256, &CookContext::new())
            .unwrap_err();
        assert!(err.is_cache_failure());
    }
}
