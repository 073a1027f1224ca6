//! Integrity marker embedded at the top of every generated lock file.

use sha2::{Digest, Sha256};

/// Prefix of the marker line.
pub const MARKER_PREFIX: &str = "# SHA256:";

/// Compute the marker line for an environment.
///
/// The digest covers the environment's own source and, in constraint order,
/// the source of every environment it transitively references. Surrounding
/// whitespace of each source is ignored.
pub fn compute_marker(source: &str, upstream: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.trim().as_bytes());
    for (name, upstream_source) in upstream {
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(upstream_source.trim().as_bytes());
    }
    format!("{}{}", MARKER_PREFIX, hex::encode(hasher.finalize()))
}

/// Find the marker line in lock file text.
pub fn find_marker(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with(MARKER_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_ignores_surrounding_whitespace() {
        let a = compute_marker("django\n", &[]);
        let b = compute_marker("\n\ndjango", &[]);
        assert_eq!(a, b);
        assert!(a.starts_with(MARKER_PREFIX));
        assert_eq!(a.len(), MARKER_PREFIX.len() + 64);
    }

    #[test]
    fn test_marker_without_upstream_is_plain_digest() {
        let expected = format!("{}{}", MARKER_PREFIX, hex::encode(Sha256::digest(b"django")));
        assert_eq!(compute_marker("django", &[]), expected);
    }

    #[test]
    fn test_marker_tracks_upstream_sources() {
        let before = compute_marker("-r base.in\npytest", &[("base", "django")]);
        let after = compute_marker("-r base.in\npytest", &[("base", "django<4")]);
        assert_ne!(before, after);
        assert_ne!(before, compute_marker("-r base.in\npytest", &[]));
    }

    #[test]
    fn test_find_marker() {
        let text = "# SHA256:abc\n#\n# header\ndjango==1.0\n";
        assert_eq!(find_marker(text), Some("# SHA256:abc"));
        assert_eq!(find_marker("django==1.0\n"), None);
    }
}
