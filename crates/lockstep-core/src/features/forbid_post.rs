//! Rejection of post-release versions.
//!
//! Environments listed here must not pin any `1.2.3.postN` version. The check
//! runs on the written lock file; offending pins are reported as violations
//! and fail the environment even though the compiler succeeded.

use std::collections::BTreeSet;

use super::{Feature, Violation};
use crate::lockfile::LockFile;

#[derive(Debug, Clone, Default)]
pub struct ForbidPost {
    environments: BTreeSet<String>,
}

impl ForbidPost {
    pub fn new(environments: impl IntoIterator<Item = String>) -> Self {
        Self {
            environments: environments.into_iter().collect(),
        }
    }
}

impl Feature for ForbidPost {
    fn name(&self) -> &'static str {
        "forbid_post"
    }

    fn pin_options(&self, _env: &str) -> Vec<String> {
        Vec::new()
    }

    fn validate(&self, env: &str, lock: &LockFile) -> Vec<Violation> {
        if !self.environments.contains(env) {
            return Vec::new();
        }
        lock.pins()
            .filter(|pin| pin.is_post_release())
            .map(|pin| Violation {
                feature: self.name(),
                message: format!(
                    "{}{}{} is a post-release version, forbidden in {}",
                    pin.name, pin.operator, pin.version, env
                ),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_release_rejected_in_listed_env() {
        let feature = ForbidPost::new(["test".to_string()]);
        let lock = LockFile::parse("pkg==1.2.3.post777\nclean==1.0\n");

        let violations = feature.validate("test", &lock);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("pkg==1.2.3.post777"));
    }

    #[test]
    fn test_other_envs_unaffected() {
        let feature = ForbidPost::new(["test".to_string()]);
        let lock = LockFile::parse("pkg==1.2.3.post777\n");
        assert!(feature.validate("base", &lock).is_empty());
        assert!(feature.pin_options("test").is_empty());
    }
}
