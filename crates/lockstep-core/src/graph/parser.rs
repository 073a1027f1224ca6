//! Environment specification parsing and discovery.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::options::Options;

/// One parsed environment specification (`requirements/test.in`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    /// Environment name (file stem).
    pub name: String,
    /// Path of the source specification.
    pub source_path: PathBuf,
    /// Names of referenced environments, in order of first appearance.
    pub references: Vec<String>,
    /// Ordinary requirement lines, comments and blanks removed.
    pub requirements: Vec<String>,
    /// Raw source text, used for integrity markers.
    pub source: String,
}

impl EnvironmentSpec {
    /// Parse specification text.
    pub fn parse(name: impl Into<String>, source_path: impl Into<PathBuf>, source: &str) -> Self {
        let mut references: Vec<String> = Vec::new();
        let mut requirements = Vec::new();

        for line in source.lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            match parse_reference(line) {
                Some(reference) => {
                    if !references.contains(&reference) {
                        references.push(reference);
                    }
                }
                None => requirements.push(line.to_string()),
            }
        }

        Self {
            name: name.into(),
            source_path: source_path.into(),
            references,
            requirements,
            source: source.to_string(),
        }
    }

    /// Read and parse a specification file. The name is the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Configuration(format!("cannot derive environment name from {}", path.display()))
            })?;
        let source = fs::read_to_string(path)?;
        Ok(Self::parse(name, path, &source))
    }
}

/// Find every source specification under the configured directory.
///
/// Files are returned sorted by path; this order is the declaration order
/// used to break ties in the topological order.
pub fn discover(options: &Options) -> Result<Vec<EnvironmentSpec>> {
    if !options.base_dir.is_dir() {
        return Err(Error::Configuration(format!(
            "requirements directory {} does not exist",
            options.base_dir.display()
        )));
    }

    let dir = glob::Pattern::escape(&options.base_dir.to_string_lossy());
    let pattern = format!("{}/*.{}", dir, glob::Pattern::escape(&options.in_ext));
    let entries = glob::glob(&pattern)
        .map_err(|e| Error::Configuration(format!("invalid discovery pattern {pattern}: {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::Io(e.into()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    tracing::debug!("Discovered {} environment file(s) in {}", paths.len(), options.base_dir.display());

    paths.iter().map(|path| EnvironmentSpec::from_file(path)).collect()
}

/// Extract the referenced environment name from a `-r` / `--requirement` line.
fn parse_reference(line: &str) -> Option<String> {
    let rest = if let Some(rest) = line.strip_prefix("--requirement") {
        rest.strip_prefix('=').unwrap_or(rest)
    } else {
        line.strip_prefix("-r")?
    };
    let path = rest.split_whitespace().next()?;
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(idx) => &line[..idx],
        None => line,
    }
}
