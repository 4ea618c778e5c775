// Evidence fingerprinting
//
// Streams capture files through a content hash in fixed-size chunks so the
// whole file is never held in memory. Supports MD5 (legacy case records),
// SHA-1, SHA-256, SHA-512 and BLAKE3.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use md5::Md5;
use sha1::{Sha1, Digest};
use sha2::{Sha256, Sha512};
use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ForensicError, ForensicResult};

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported fingerprint algorithms
/// - MD5: what older case records carry
/// - SHA1/SHA256/SHA512: NIST approved, court-accepted forensic standards
/// - BLAKE3: Modern, extremely fast cryptographic hash
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
    Blake3,
}

/// Parse algorithm name (case-insensitive, dashes optional)
impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(algorithm: &str) -> Result<Self, String> {
        match algorithm.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(format!(
                "Unsupported hash algorithm: '{}'. Supported: md5, sha1, sha256, sha512, blake3",
                algorithm
            )),
        }
    }
}

impl HashAlgorithm {
    /// Get the canonical algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Blake3 => "BLAKE3",
        }
    }

    /// Get expected hash length in hex characters
    pub fn hash_length(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
            HashAlgorithm::Blake3 => 64,
        }
    }
}

// =============================================================================
// Streaming Hasher
// =============================================================================

/// A unified streaming hasher for incremental hashing of capture files
/// Note: Blake3Hasher is boxed because it's ~1920 bytes
pub(crate) enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<Blake3Hasher>),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => StreamingHasher::Sha512(Sha512::new()),
            HashAlgorithm::Blake3 => StreamingHasher::Blake3(Box::new(Blake3Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
            StreamingHasher::Sha512(h) => Digest::update(h, data),
            StreamingHasher::Blake3(h) => { h.update(data); }
        }
    }

    /// Finalize and return the hash as a lowercase hex string
    pub fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha512(h) => hex::encode(h.finalize()),
            StreamingHasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Compute hash of in-memory data (one-shot)
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

// =============================================================================
// File Fingerprinting
// =============================================================================

/// Fingerprint any reader by pulling `chunk_size` bytes at a time
pub fn fingerprint_reader<R: Read>(
    reader: &mut R,
    algorithm: HashAlgorithm,
    chunk_size: usize,
) -> std::io::Result<(String, u64)> {
    let mut hasher = StreamingHasher::new(algorithm);
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((hasher.finalize(), total))
}

/// Fingerprint a capture file.
///
/// Fails with `ForensicError::Io` if the file cannot be opened or a read
/// fails mid-stream. The digest does not depend on `chunk_size`.
#[instrument(fields(path = %path.display(), algorithm = algorithm.name()))]
pub fn fingerprint_file(
    path: &Path,
    algorithm: HashAlgorithm,
    chunk_size: usize,
) -> ForensicResult<String> {
    let mut file = File::open(path).map_err(|e| ForensicError::io(path, e))?;
    let (hash, bytes) = fingerprint_reader(&mut file, algorithm, chunk_size)
        .map_err(|e| ForensicError::io(path, e))?;
    debug!(bytes, hash = %hash, "Fingerprint complete");
    Ok(hash)
}

// =============================================================================
// Verification
// =============================================================================

/// Compare two hashes (case-insensitive, whitespace-trimmed)
pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
    hash1.trim().eq_ignore_ascii_case(hash2.trim())
}

/// Validate that a string looks like a valid hash for the given algorithm
pub fn is_valid_hash(hash: &str, algorithm: HashAlgorithm) -> bool {
    hash.len() == algorithm.hash_length() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Outcome of re-fingerprinting a stored evidence file
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintVerification {
    pub algorithm: String,
    pub expected: String,
    pub computed: String,
    pub matches: bool,
}

/// Recompute a file's fingerprint and compare with a recorded value
pub fn verify_fingerprint(
    path: &Path,
    algorithm: HashAlgorithm,
    expected: &str,
    chunk_size: usize,
) -> ForensicResult<FingerprintVerification> {
    let computed = fingerprint_file(path, algorithm, chunk_size)?;
    let matches = hashes_match(&computed, expected);
    Ok(FingerprintVerification {
        algorithm: algorithm.name().to_string(),
        expected: expected.to_string(),
        computed,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DEFAULT_CHUNK_SIZE;
    use std::io::Write;

    fn temp_file(data: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(" blake3 ".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_compute_hash() {
        let data = b"hello world";
        assert_eq!(compute_hash(data, HashAlgorithm::Md5), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            compute_hash(data, HashAlgorithm::Sha1),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(
            compute_hash(data, HashAlgorithm::Sha256),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_fingerprint_independent_of_chunk_size() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let file = temp_file(&data);

        let expected = compute_hash(&data, HashAlgorithm::Sha256);
        for chunk in [1, 7, 4096, 65536, 1 << 20] {
            let h = fingerprint_file(file.path(), HashAlgorithm::Sha256, chunk).unwrap();
            assert_eq!(h, expected, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_fingerprint_detects_single_byte_change() {
        let mut data = vec![0xABu8; 5000];
        let a = temp_file(&data);
        data[2500] ^= 0x01;
        let b = temp_file(&data);

        let ha = fingerprint_file(a.path(), HashAlgorithm::Md5, DEFAULT_CHUNK_SIZE).unwrap();
        let hb = fingerprint_file(b.path(), HashAlgorithm::Md5, DEFAULT_CHUNK_SIZE).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn test_fingerprint_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint_file(&dir.path().join("nope.pcap"), HashAlgorithm::Sha256, DEFAULT_CHUNK_SIZE)
            .unwrap_err();
        assert_eq!(err.kind(), "IOError");
    }

    #[test]
    fn test_verify_fingerprint() {
        let file = temp_file(b"capture bytes");
        let expected = compute_hash(b"capture bytes", HashAlgorithm::Sha256).to_uppercase();
        let v = verify_fingerprint(file.path(), HashAlgorithm::Sha256, &expected, 4).unwrap();
        assert!(v.matches);
        assert!(is_valid_hash(&v.computed, HashAlgorithm::Sha256));
    }
}
