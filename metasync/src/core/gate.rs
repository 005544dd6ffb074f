//! Diff gate: decides whether a regenerated artifact needs publishing.

use sha2::{Digest, Sha256};

/// Length of the abbreviated digest used in commit messages and logs.
pub const SHORT_DIGEST_LEN: usize = 12;

/// True if `candidate` differs from the previously published content.
///
/// Comparison is exact over bytes; no line-ending or whitespace normalization
/// is applied. A missing previous version always counts as changed.
pub fn changed(candidate: &[u8], previous: Option<&[u8]>) -> bool {
    match previous {
        Some(previous) => candidate != previous,
        None => true,
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First [`SHORT_DIGEST_LEN`] characters of a hex digest.
pub fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(SHORT_DIGEST_LEN)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_is_unchanged() {
        for sample in [&b""[..], b"<meta/>", b"<meta>\n  <a>1</a>\n</meta>\n"] {
            assert!(!changed(sample, Some(sample)));
        }
    }

    #[test]
    fn distinct_content_is_changed() {
        assert!(changed(b"<meta>1</meta>", Some(b"<meta>2</meta>".as_slice())));
        assert!(changed(b"", Some(b"x".as_slice())));
    }

    #[test]
    fn comparison_is_byte_exact() {
        assert!(changed(b"<a/>\r\n", Some(b"<a/>\n".as_slice())));
        assert!(changed(b"<a/> ", Some(b"<a/>".as_slice())));
    }

    #[test]
    fn missing_previous_counts_as_changed() {
        assert!(changed(b"<meta/>", None));
        assert!(changed(b"", None));
    }

    #[test]
    fn digest_is_stable_sha256() {
        assert_eq!(
            digest_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(short_digest(&digest_hex(b"")), "e3b0c44298fc");
        assert_eq!(short_digest("abc"), "abc");
    }
}
