//! Path Security Utilities
//!
//! Evidence filenames arrive as user input (`analyze <filename>`,
//! `display <filename>`). They are resolved strictly inside the evidence
//! directory; anything that could escape it is rejected.

use std::path::{Component, Path, PathBuf};
use tracing::{trace, warn};

use crate::error::{ForensicError, ForensicResult};

use super::audit;

/// Check if a filename contains path traversal patterns.
///
/// Detects:
/// - `..` as a path component
/// - Absolute path indicators and Windows drive letters
/// - Null bytes
/// - URL-encoded separators
pub fn contains_traversal_pattern(filename: &str) -> bool {
    if filename.contains('\0') {
        return true;
    }

    if filename.split(['/', '\\']).any(|part| part == "..") {
        return true;
    }

    if filename.starts_with('/') || filename.starts_with('\\') {
        return true;
    }

    let bytes = filename.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }

    let lower = filename.to_lowercase();
    lower.contains("%2e%2e") || lower.contains("%2f") || lower.contains("%5c")
}

/// Sanitize one component of a generated evidence filename.
///
/// Path separators become `_`; control and Windows reserved characters are
/// dropped; leading/trailing dots and spaces are trimmed.
pub fn sanitize_component(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\0'..='\x1f' | '\x7f' => continue,
            '/' | '\\' => sanitized.push('_'),
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => continue,
            _ => sanitized.push(c),
        }
    }

    sanitized.trim_matches(|c| c == '.' || c == ' ').to_string()
}

/// Resolve a bare evidence filename inside `evidence_dir`.
///
/// Fails with `FormatError` on traversal attempts or nested paths and with
/// `NotFoundError` when the file does not exist.
pub fn resolve_evidence_file(evidence_dir: &Path, filename: &str) -> ForensicResult<PathBuf> {
    let name = filename.trim();
    let mut components = Path::new(name).components();
    let is_bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if name.is_empty() || contains_traversal_pattern(name) || !is_bare {
        warn!(target: "security", filename = name, "Rejected evidence filename");
        audit::log_security_event("path_traversal", "evidence filename rejected", Some(Path::new(name)));
        return Err(ForensicError::Format(format!(
            "'{}' is not a plain evidence filename",
            name
        )));
    }

    let path = evidence_dir.join(name);
    if !path.is_file() {
        return Err(ForensicError::not_found(format!(
            "evidence file '{}' in {}",
            name,
            evidence_dir.display()
        )));
    }

    trace!(target: "security", path = %path.display(), "Evidence path resolved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_traversal_pattern() {
        assert!(contains_traversal_pattern("../secret.pcap"));
        assert!(contains_traversal_pattern("..\\secret.pcap"));
        assert!(contains_traversal_pattern("foo/../bar"));
        assert!(contains_traversal_pattern("/etc/passwd"));
        assert!(contains_traversal_pattern("C:\\Windows"));
        assert!(contains_traversal_pattern("file\0.pcap"));
        assert!(contains_traversal_pattern("%2e%2e/secret"));

        assert!(!contains_traversal_pattern("Acme-Case1-1.pcap"));
        assert!(!contains_traversal_pattern("file..name.pcap"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Acme"), "Acme");
        assert_eq!(sanitize_component("Acme/Labs"), "Acme_Labs");
        assert_eq!(sanitize_component("case<1>?"), "case1");
        assert_eq!(sanitize_component("..hidden. "), "hidden");
    }

    #[test]
    fn test_resolve_evidence_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Acme-Case1-1.pcap"), b"x").unwrap();

        let ok = resolve_evidence_file(dir.path(), "Acme-Case1-1.pcap").unwrap();
        assert!(ok.ends_with("Acme-Case1-1.pcap"));

        let missing = resolve_evidence_file(dir.path(), "Acme-Case1-2.pcap").unwrap_err();
        assert_eq!(missing.kind(), "NotFoundError");

        let escape = resolve_evidence_file(dir.path(), "../Acme-Case1-1.pcap").unwrap_err();
        assert_eq!(escape.kind(), "FormatError");

        let nested = resolve_evidence_file(dir.path(), "sub/x.pcap").unwrap_err();
        assert_eq!(nested.kind(), "FormatError");
    }
}
