//! Pinned requirement lines.
//!
//! A pin is a single logical requirement line as written by the compiler:
//!
//! ```text
//! django==3.2.4              # via -r requirements/base.in
//! requests==2.31.0 \
//!     --hash=sha256:58cd... \
//!     --hash=sha256:942c...
//!     # via django
//! ```

/// Column at which inline comments start in serialized pins.
const COMMENT_JUSTIFICATION: usize = 26;

/// A resolved `name==version` requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    /// Package name as written (may include extras).
    pub name: String,
    /// Version operator, `==` or `~=`.
    pub operator: String,
    /// Pinned version.
    pub version: String,
    /// Environment marker following the version (e.g. `; python_version < "3.8"`).
    pub marker: Option<String>,
    /// `--hash=` options in order of appearance.
    pub hashes: Vec<String>,
    /// Inline comment, including the leading `#`.
    pub comment: Option<String>,
    /// Indented comment lines following the pin (`# via ...`).
    pub annotations: Vec<String>,
}

impl Pin {
    /// Parse a logical line (continuations already joined).
    ///
    /// Returns `None` for anything that is not a `name==version` pin:
    /// comments, options, editable and URL requirements.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            return None;
        }

        let (body, comment) = split_comment(line);

        let mut hashes = Vec::new();
        let mut spec_parts = Vec::new();
        for token in body.split_whitespace() {
            if token.starts_with("--hash=") {
                hashes.push(token.to_string());
            } else {
                spec_parts.push(token);
            }
        }

        let first = spec_parts.first()?;
        let (idx, operator) = find_operator(first)?;
        let name = &first[..idx];
        let rest = &first[idx + 2..];
        if name.is_empty() || rest.is_empty() || name.contains('@') {
            return None;
        }

        let (version, attached_marker) = match rest.split_once(';') {
            Some((version, marker)) => (version, Some(format!(";{marker}"))),
            None => (rest, None),
        };
        if version.is_empty() {
            return None;
        }

        let mut marker_parts: Vec<String> = attached_marker.into_iter().collect();
        marker_parts.extend(spec_parts[1..].iter().map(|s| s.to_string()));
        let marker = if marker_parts.is_empty() {
            None
        } else {
            Some(marker_parts.join(" "))
        };

        Some(Self {
            name: name.to_string(),
            operator: operator.to_string(),
            version: version.to_string(),
            marker,
            hashes,
            comment: comment.map(str::to_string),
            annotations: Vec::new(),
        })
    }

    /// Canonical package name: lowercase, extras stripped, `_`/`.` as `-`.
    pub fn key(&self) -> String {
        canonical_name(&self.name)
    }

    /// Whether the version carries a post-release segment (`1.2.3.post7`).
    pub fn is_post_release(&self) -> bool {
        post_index(&self.version).is_some()
    }

    /// Strip the post-release segment and everything after it.
    pub fn drop_post(&mut self) {
        if let Some(idx) = post_index(&self.version) {
            let trimmed = self.version[..idx].trim_end_matches(['.', '-', '_']);
            self.version = trimmed.to_string();
        }
    }

    /// Switch the pin to a compatible-release constraint (`~=`).
    pub fn make_compatible(&mut self) {
        self.operator = "~=".to_string();
    }

    /// Serialize in the compiler's layout.
    pub fn serialize(&self) -> String {
        let mut spec = format!("{}{}{}", self.name, self.operator, self.version);
        if let Some(marker) = &self.marker {
            spec.push(' ');
            spec.push_str(marker);
        }

        let mut out = if self.hashes.is_empty() {
            match &self.comment {
                Some(comment) => format!("{spec:<COMMENT_JUSTIFICATION$} {comment}"),
                None => spec,
            }
        } else {
            let mut lines = vec![spec];
            lines.extend(self.hashes.iter().cloned());
            if let Some(comment) = &self.comment {
                lines.push(comment.clone());
            }
            lines.join(" \\\n    ")
        };

        for annotation in &self.annotations {
            out.push('\n');
            out.push_str(annotation);
        }
        out
    }
}

/// Canonical form of a package name, as used for comparisons.
pub fn canonical_name(name: &str) -> String {
    let base = name.split('[').next().unwrap_or(name);
    base.trim().to_lowercase().replace(['_', '.'], "-")
}

fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return (line[..i].trim_end(), Some(&line[i..]));
        }
    }
    (line, None)
}

fn find_operator(spec: &str) -> Option<(usize, &'static str)> {
    if let Some(idx) = spec.find("==") {
        if spec[idx + 2..].starts_with('=') {
            // `===` arbitrary equality is left untouched
            return None;
        }
        return Some((idx, "=="));
    }
    spec.find("~=").map(|idx| (idx, "~="))
}

/// Byte index of the post-release segment in the public part of a version.
fn post_index(version: &str) -> Option<usize> {
    let public = version.split('+').next().unwrap_or(version);
    public.to_ascii_lowercase().find("post")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_pin() {
        let pin = Pin::parse("Django==3.2.4").unwrap();
        assert_eq!(pin.name, "Django");
        assert_eq!(pin.version, "3.2.4");
        assert_eq!(pin.key(), "django");
        assert!(pin.comment.is_none());
        assert_eq!(pin.serialize(), "Django==3.2.4");
    }

    #[test]
    fn test_parse_inline_comment() {
        let pin = Pin::parse("six==1.16.0               # via python-dateutil").unwrap();
        assert_eq!(pin.comment.as_deref(), Some("# via python-dateutil"));
        let line = pin.serialize();
        assert!(line.starts_with("six==1.16.0 "));
        assert_eq!(line.find('#'), Some(COMMENT_JUSTIFICATION + 1));
        assert!(line.ends_with("# via python-dateutil"));
    }

    #[test]
    fn test_parse_hashes() {
        let pin = Pin::parse("six==1.16.0 --hash=sha256:aaa --hash=sha256:bbb").unwrap();
        assert_eq!(pin.hashes.len(), 2);
        assert_eq!(
            pin.serialize(),
            "six==1.16.0 \\\n    --hash=sha256:aaa \\\n    --hash=sha256:bbb"
        );
    }

    #[test]
    fn test_parse_environment_marker() {
        let pin = Pin::parse("typing-extensions==4.7.1 ; python_version < \"3.8\"").unwrap();
        assert_eq!(pin.version, "4.7.1");
        assert_eq!(pin.marker.as_deref(), Some("; python_version < \"3.8\""));

        let pin = Pin::parse("colorama==0.4.6;sys_platform=='win32'").unwrap();
        assert_eq!(pin.version, "0.4.6");
        assert_eq!(pin.marker.as_deref(), Some(";sys_platform=='win32'"));
    }

    #[test]
    fn test_non_pins() {
        assert!(Pin::parse("# comment").is_none());
        assert!(Pin::parse("-r base.txt").is_none());
        assert!(Pin::parse("-e git+https://example.com/repo.git#egg=pkg").is_none());
        assert!(Pin::parse("requests>=2").is_none());
        assert!(Pin::parse("pkg===1.0").is_none());
        assert!(Pin::parse("").is_none());
    }

    #[test]
    fn test_extras_in_key() {
        let pin = Pin::parse("celery[redis]==5.3.0").unwrap();
        assert_eq!(pin.key(), "celery");
        assert_eq!(canonical_name("Zope.Interface"), "zope-interface");
        assert_eq!(canonical_name("typing_extensions"), "typing-extensions");
    }

    #[test]
    fn test_post_release() {
        let mut pin = Pin::parse("pkg==1.2.3.post777").unwrap();
        assert!(pin.is_post_release());
        pin.drop_post();
        assert_eq!(pin.version, "1.2.3");
        assert!(!pin.is_post_release());

        let pin = Pin::parse("pkg==1.2.3").unwrap();
        assert!(!pin.is_post_release());

        // local version labels are not release segments
        let pin = Pin::parse("pkg==1.0+postgres").unwrap();
        assert!(!pin.is_post_release());
    }

    #[test]
    fn test_compatible() {
        let mut pin = Pin::parse("pkg==1.2.3").unwrap();
        pin.make_compatible();
        assert_eq!(pin.serialize(), "pkg~=1.2.3");
    }

    #[test]
    fn test_annotations_follow_pin() {
        let mut pin = Pin::parse("pkg==1.0").unwrap();
        pin.annotations.push("    # via app".to_string());
        assert_eq!(pin.serialize(), "pkg==1.0\n    # via app");
    }
}
