//! Compatible-release pins.
//!
//! Packages matching one of the configured globs are written as
//! `name~=version` instead of `name==version`, with any post-release segment
//! dropped, so that bugfix releases of those packages are accepted without
//! recompiling. Matching is case-insensitive.

use globset::{Glob, GlobSet, GlobSetBuilder};

use super::Feature;
use crate::error::{Error, Result};
use crate::lockfile::LockFile;

pub struct Compatible {
    patterns: GlobSet,
    enabled: bool,
}

impl Compatible {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(&pattern.to_lowercase()).map_err(|e| {
                Error::Configuration(format!("invalid compatible pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        Ok(Self {
            patterns: builder
                .build()
                .map_err(|e| Error::Configuration(format!("invalid compatible patterns: {e}")))?,
            enabled: !patterns.is_empty(),
        })
    }

    /// Whether a package name matches one of the patterns.
    pub fn matches(&self, package: &str) -> bool {
        self.enabled && self.patterns.is_match(package.to_lowercase())
    }
}

impl Feature for Compatible {
    fn name(&self) -> &'static str {
        "compatible"
    }

    fn pin_options(&self, _env: &str) -> Vec<String> {
        Vec::new()
    }

    fn transform(&self, _env: &str, lock: &mut LockFile) {
        if !self.enabled {
            return;
        }
        for pin in lock.pins_mut() {
            if self.matches(&pin.name) {
                pin.make_compatible();
                pin.drop_post();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_is_case_insensitive() {
        let feature = Compatible::new(&["mycompany-*".to_string()]).unwrap();
        assert!(feature.matches("MyCompany-Utils"));
        assert!(!feature.matches("django"));
    }

    #[test]
    fn test_transform_rewrites_matching_pins() {
        let feature = Compatible::new(&["acme-*".to_string()]).unwrap();
        let mut lock = LockFile::parse("acme-core==1.4.2.post3\ndjango==4.2\n");
        feature.transform("base", &mut lock);
        assert_eq!(lock.render(), "acme-core~=1.4.2\ndjango==4.2\n");
    }

    #[test]
    fn test_no_patterns_is_noop() {
        let feature = Compatible::new(&[]).unwrap();
        let mut lock = LockFile::parse("django==4.2.post1\n");
        feature.transform("base", &mut lock);
        assert_eq!(lock.render(), "django==4.2.post1\n");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Compatible::new(&["[".to_string()]).is_err());
    }
}
