// Common utilities shared across acquisition, analysis and reporting

pub mod audit;
pub mod hash;
pub mod path_security;

// Re-exports for convenience
pub use hash::{HashAlgorithm, compute_hash, fingerprint_file, is_valid_hash, verify_fingerprint};
pub use path_security::{resolve_evidence_file, sanitize_component};

// Shared constants
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024; // 64KB read chunk for fingerprinting
