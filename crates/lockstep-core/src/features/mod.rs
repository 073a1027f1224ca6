//! Pluggable per-environment behaviours.
//!
//! Each feature is configured once from [`Options`] and then contributes:
//! - compiler arguments for an environment
//! - an optional rewrite of the written lock file
//! - optional checks of the written lock file
//!
//! Features are registered in a fixed order so the combined argument list is
//! reproducible. Overlapping flags are emitted in that order as-is.
//!
//! ```text
//! use_cache → add_hashes → allow_unsafe → upgrade → upgrade_package → compatible → forbid_post
//! ```

mod add_hashes;
mod allow_unsafe;
mod compatible;
mod forbid_post;
mod upgrade;
mod use_cache;

use std::fmt;

use crate::error::Result;
use crate::graph::EnvironmentGraph;
use crate::lockfile::LockFile;
use crate::options::Options;

pub use add_hashes::AddHashes;
pub use allow_unsafe::AllowUnsafe;
pub use compatible::Compatible;
pub use forbid_post::ForbidPost;
pub use upgrade::{Upgrade, UpgradePackage};
pub use use_cache::UseCache;

/// A problem found by a feature in a written lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Option name of the reporting feature.
    pub feature: &'static str,
    /// Human readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.feature, self.message)
    }
}

/// A togglable behaviour applied per environment.
pub trait Feature: Send + Sync {
    /// Option name identifying the feature.
    fn name(&self) -> &'static str;

    /// Compiler arguments for `env`. Irrelevant features return nothing.
    fn pin_options(&self, env: &str) -> Vec<String>;

    /// Rewrite the lock file after the compiler has written it.
    fn transform(&self, _env: &str, _lock: &mut LockFile) {}

    /// Check the lock file after it has been post-processed.
    fn validate(&self, _env: &str, _lock: &LockFile) -> Vec<Violation> {
        Vec::new()
    }
}

/// Ordered collection of configured features.
pub struct FeatureRegistry {
    features: Vec<Box<dyn Feature>>,
}

impl FeatureRegistry {
    /// Configure every built-in feature from options.
    ///
    /// The graph is needed to expand environment-scoped options, such as
    /// hash generation, to whole reference clusters.
    pub fn from_options(options: &Options, graph: &EnvironmentGraph) -> Result<Self> {
        let features: Vec<Box<dyn Feature>> = vec![
            Box::new(UseCache::new(options.use_cache)),
            Box::new(AddHashes::for_graph(&options.add_hashes, graph)?),
            Box::new(AllowUnsafe::new(options.allow_unsafe)),
            Box::new(Upgrade::new(options.upgrade)),
            Box::new(UpgradePackage::new(options.upgrade_packages.clone())),
            Box::new(Compatible::new(&options.compatible_patterns)?),
            Box::new(ForbidPost::new(options.forbid_post.iter().cloned())),
        ];
        Ok(Self { features })
    }

    /// Build a registry from explicit features, in the given order.
    pub fn with_features(features: Vec<Box<dyn Feature>>) -> Self {
        Self { features }
    }

    /// Option names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    /// Concatenated compiler arguments for an environment.
    pub fn collect_options(&self, env: &str) -> Vec<String> {
        self.features
            .iter()
            .flat_map(|feature| feature.pin_options(env))
            .collect()
    }

    /// Apply every feature's rewrite hook.
    pub fn transform(&self, env: &str, lock: &mut LockFile) {
        for feature in &self.features {
            feature.transform(env, lock);
        }
    }

    /// Run every feature's checks and aggregate the violations.
    pub fn validate(&self, env: &str, lock: &LockFile) -> Vec<Violation> {
        self.features
            .iter()
            .flat_map(|feature| feature.validate(env, lock))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EnvironmentSpec;

    fn graph() -> EnvironmentGraph {
        EnvironmentGraph::build(vec![
            EnvironmentSpec::parse("base", "base.in", "django\n"),
            EnvironmentSpec::parse("test", "test.in", "-r base.in\npytest\n"),
            EnvironmentSpec::parse("docs", "docs.in", "sphinx\n"),
        ])
        .unwrap()
    }

    #[test]
    fn test_registration_order() {
        let registry = FeatureRegistry::from_options(&Options::default(), &graph()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "use_cache",
                "add_hashes",
                "allow_unsafe",
                "upgrade",
                "upgrade_package",
                "compatible",
                "forbid_post"
            ]
        );
    }

    #[test]
    fn test_default_options() {
        let registry = FeatureRegistry::from_options(&Options::default(), &graph()).unwrap();
        assert_eq!(registry.collect_options("base"), vec!["--rebuild", "--upgrade"]);
    }

    #[test]
    fn test_use_cache_removes_rebuild() {
        let options = Options {
            use_cache: true,
            ..Options::default()
        };
        let registry = FeatureRegistry::from_options(&options, &graph()).unwrap();
        for env in ["base", "test", "docs"] {
            assert!(!registry.collect_options(env).contains(&"--rebuild".to_string()));
        }
    }

    #[test]
    fn test_combined_options_follow_registration_order() {
        let options = Options {
            add_hashes: ["test".to_string()].into(),
            allow_unsafe: true,
            upgrade_packages: vec!["django".into(), "pytest".into()],
            ..Options::default()
        }
        .normalized();
        let registry = FeatureRegistry::from_options(&options, &graph()).unwrap();

        assert_eq!(
            registry.collect_options("base"),
            vec![
                "--rebuild",
                "--generate-hashes",
                "--allow-unsafe",
                "--upgrade-package",
                "django",
                "--upgrade-package",
                "pytest"
            ]
        );
        assert!(!registry.collect_options("docs").contains(&"--generate-hashes".to_string()));
    }

    #[test]
    fn test_validate_aggregates() {
        let options = Options {
            forbid_post: ["test".to_string()].into(),
            ..Options::default()
        };
        let registry = FeatureRegistry::from_options(&options, &graph()).unwrap();
        let lock = LockFile::parse("pkg==1.0.post1\nother==2.0.post3\n");

        let violations = registry.validate("test", &lock);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].to_string().starts_with("[forbid_post]"));
        assert!(registry.validate("base", &lock).is_empty());
    }
}
