//! Upgrade policies.
//!
//! The compiler keeps versions already present in an existing lock file
//! unless asked to upgrade. Upgrading either applies to every package
//! (`--upgrade`) or to a list of named packages (`--upgrade-package`), and the
//! two are mutually exclusive: options normalization turns the blanket
//! upgrade off when packages are named.

use super::Feature;

/// Blanket upgrade of every package.
#[derive(Debug, Clone, Copy)]
pub struct Upgrade {
    enabled: bool,
}

impl Upgrade {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for Upgrade {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Feature for Upgrade {
    fn name(&self) -> &'static str {
        "upgrade"
    }

    fn pin_options(&self, _env: &str) -> Vec<String> {
        if self.enabled {
            vec!["--upgrade".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Upgrade only the named packages; everything else stays pinned.
#[derive(Debug, Clone, Default)]
pub struct UpgradePackage {
    packages: Vec<String>,
}

impl UpgradePackage {
    pub fn new(packages: Vec<String>) -> Self {
        Self { packages }
    }
}

impl Feature for UpgradePackage {
    fn name(&self) -> &'static str {
        "upgrade_package"
    }

    fn pin_options(&self, _env: &str) -> Vec<String> {
        self.packages
            .iter()
            .flat_map(|package| ["--upgrade-package".to_string(), package.clone()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_default_on() {
        assert_eq!(Upgrade::default().pin_options("base"), vec!["--upgrade"]);
        assert!(Upgrade::new(false).pin_options("base").is_empty());
    }

    #[test]
    fn test_upgrade_packages() {
        let feature = UpgradePackage::new(vec!["django".into(), "celery".into()]);
        assert_eq!(
            feature.pin_options("test"),
            vec!["--upgrade-package", "django", "--upgrade-package", "celery"]
        );
        assert!(UpgradePackage::default().pin_options("test").is_empty());
    }
}
