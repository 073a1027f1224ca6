//! Run configuration.
//!
//! Options are resolved once from command-line input, normalized, validated
//! and then shared read-only by every component for the rest of the run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;

use crate::error::{Error, Result};

/// Header written below the integrity marker when no custom header is set.
pub const DEFAULT_HEADER: &str = "#
# This file is autogenerated by lockstep
# To update, run:
#
#    lockstep
#
";

/// Configuration for a lockstep run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Directory holding the source specifications and lock files.
    pub base_dir: PathBuf,

    /// Extension of source specification files (without the dot).
    pub in_ext: String,

    /// Extension of generated lock files (without the dot).
    pub out_ext: String,

    /// File with custom header text for generated lock files.
    pub header_file: Option<PathBuf>,

    /// Restrict compilation to these environments and their references.
    pub include_names: Vec<String>,

    /// Blanket upgrade of every package.
    pub upgrade: bool,

    /// Upgrade only these packages.
    pub upgrade_packages: Vec<String>,

    /// Globs of packages pinned with `~=` instead of `==`.
    pub compatible_patterns: Vec<String>,

    /// Environments that must not contain post-release versions.
    pub forbid_post: BTreeSet<String>,

    /// Environments that need per-package hashes.
    pub add_hashes: BTreeSet<String>,

    /// Reuse the compiler's cache instead of rebuilding from scratch.
    pub use_cache: bool,

    /// Pin packages the compiler considers unsafe in requirements files.
    pub allow_unsafe: bool,

    /// Worker threads for independent environments (0 = one per CPU).
    pub jobs: usize,

    /// Compiler program name or path.
    pub compiler: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("requirements"),
            in_ext: "in".to_string(),
            out_ext: "txt".to_string(),
            header_file: None,
            include_names: Vec::new(),
            upgrade: true,
            upgrade_packages: Vec::new(),
            compatible_patterns: Vec::new(),
            forbid_post: BTreeSet::new(),
            add_hashes: BTreeSet::new(),
            use_cache: false,
            allow_unsafe: false,
            jobs: 0,
            compiler: PathBuf::from("pip-compile"),
        }
    }
}

impl Options {
    /// Create default options rooted at `base_dir`.
    pub fn for_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Apply cross-option rules.
    ///
    /// The compiler accepts either a blanket upgrade or a list of packages to
    /// upgrade, never both, so a non-empty package list turns the blanket
    /// upgrade off.
    pub fn normalized(mut self) -> Self {
        if !self.upgrade_packages.is_empty() {
            self.upgrade = false;
        }
        dedup_in_place(&mut self.include_names);
        dedup_in_place(&mut self.upgrade_packages);
        dedup_in_place(&mut self.compatible_patterns);
        self
    }

    /// Reject malformed configuration before anything is compiled.
    pub fn validate(&self) -> Result<()> {
        if self.in_ext.is_empty() || self.out_ext.is_empty() {
            return Err(Error::Configuration(
                "file extensions must not be empty".to_string(),
            ));
        }
        if self.in_ext == self.out_ext {
            return Err(Error::Configuration(format!(
                "input and output extensions are both '{}'",
                self.in_ext
            )));
        }
        if self.upgrade && !self.upgrade_packages.is_empty() {
            return Err(Error::Configuration(
                "--upgrade and --upgrade-package are mutually exclusive".to_string(),
            ));
        }
        for pattern in &self.compatible_patterns {
            Glob::new(&pattern.to_lowercase()).map_err(|e| {
                Error::Configuration(format!("invalid compatible pattern '{pattern}': {e}"))
            })?;
        }
        if let Some(header) = &self.header_file {
            if !header.is_file() {
                return Err(Error::Configuration(format!(
                    "header file {} does not exist",
                    header.display()
                )));
            }
        }
        Ok(())
    }

    /// Glob matching every source specification.
    pub fn source_glob(&self) -> String {
        self.base_dir
            .join(format!("*.{}", self.in_ext))
            .to_string_lossy()
            .into_owned()
    }

    /// Source specification path for an environment.
    pub fn in_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.{}", name, self.in_ext))
    }

    /// Lock file path for an environment.
    pub fn out_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.{}", name, self.out_ext))
    }

    /// File name of an environment's lock file, as used in `-r` lines.
    pub fn out_file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.out_ext)
    }

    /// Header text for generated lock files.
    ///
    /// Custom header lines that are not comments already are commented out.
    pub fn header_text(&self) -> Result<String> {
        match &self.header_file {
            Some(path) => read_header(path),
            None => Ok(DEFAULT_HEADER.to_string()),
        }
    }
}

fn read_header(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("cannot read header file {}: {e}", path.display()))
    })?;
    let mut text = String::new();
    for line in raw.lines() {
        let line = line.trim_end();
        if line.starts_with('#') {
            text.push_str(line);
        } else if line.is_empty() {
            text.push('#');
        } else {
            text.push_str("# ");
            text.push_str(line);
        }
        text.push('\n');
    }
    Ok(text)
}

fn dedup_in_place(values: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.upgrade);
        assert!(!options.use_cache);
        assert_eq!(options.in_path("base"), PathBuf::from("requirements/base.in"));
        assert_eq!(options.out_path("base"), PathBuf::from("requirements/base.txt"));
        assert_eq!(options.header_text().unwrap(), DEFAULT_HEADER);
    }

    #[test]
    fn test_upgrade_package_disables_blanket_upgrade() {
        let options = Options {
            upgrade: true,
            upgrade_packages: vec!["django".into()],
            ..Options::default()
        }
        .normalized();
        assert!(!options.upgrade);
        options.validate().unwrap();
    }

    #[test]
    fn test_no_upgrade_packages_keeps_flag() {
        let options = Options {
            upgrade: false,
            ..Options::default()
        }
        .normalized();
        assert!(!options.upgrade);

        let options = Options::default().normalized();
        assert!(options.upgrade);
    }

    #[test]
    fn test_unnormalized_conflict_is_rejected() {
        let options = Options {
            upgrade_packages: vec!["django".into()],
            ..Options::default()
        };
        assert!(matches!(options.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_same_extensions_rejected() {
        let options = Options {
            out_ext: "in".into(),
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let options = Options {
            compatible_patterns: vec!["pkg[".into()],
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let options = Options {
            include_names: vec!["test".into(), "base".into(), "test".into()],
            ..Options::default()
        }
        .normalized();
        assert_eq!(options.include_names, vec!["test", "base"]);
    }

    #[test]
    fn test_custom_header_is_commented() {
        let temp = tempfile::TempDir::new().unwrap();
        let header = temp.path().join("header.txt");
        fs::write(&header, "Managed by CI\n\n# keep\n").unwrap();

        let options = Options {
            header_file: Some(header),
            ..Options::default()
        };
        options.validate().unwrap();
        assert_eq!(options.header_text().unwrap(), "# Managed by CI\n#\n# keep\n");
    }

    #[test]
    fn test_missing_header_rejected() {
        let options = Options {
            header_file: Some(PathBuf::from("/nonexistent/header.txt")),
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }
}
