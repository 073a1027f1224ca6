//! Reuse of the compiler's cache.
//!
//! By default the compiler runs with `--rebuild`, clearing its caches and
//! resolving from scratch. This is slow but avoids stale-cache resolution
//! errors. `--use-cache` drops the flag for considerably faster runs.

use super::Feature;

/// Use the compiler cache, or rebuild from scratch.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseCache {
    enabled: bool,
}

impl UseCache {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether the cache is used.
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Feature for UseCache {
    fn name(&self) -> &'static str {
        "use_cache"
    }

    fn pin_options(&self, _env: &str) -> Vec<String> {
        if self.enabled {
            Vec::new()
        } else {
            vec!["--rebuild".to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_by_default() {
        let feature = UseCache::default();
        assert!(!feature.enabled());
        assert_eq!(feature.pin_options("base"), vec!["--rebuild"]);
    }

    #[test]
    fn test_enabled_adds_nothing() {
        assert!(UseCache::new(true).pin_options("base").is_empty());
    }
}
