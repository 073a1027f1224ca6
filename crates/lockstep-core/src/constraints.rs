//! Constraint propagation between environments.
//!
//! Pins resolved for an upstream environment are fed to the compiler as
//! constraints of every downstream environment, and are removed again from
//! the downstream lock file afterwards since they arrive through `-r` lines.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::graph::EnvironmentGraph;
use crate::lockfile::LockFile;

/// Lock file paths of every transitive reference of `name`, deduplicated and
/// in topological order.
pub fn resolve_constraints(
    name: &str,
    graph: &EnvironmentGraph,
    lockfile_path: impl Fn(&str) -> PathBuf,
) -> Result<Vec<PathBuf>> {
    Ok(graph
        .transitive_references(name)?
        .into_iter()
        .map(lockfile_path)
        .collect())
}

/// Packages pinned by upstream lock files, by canonical name.
#[derive(Debug, Default, Clone)]
pub struct UpstreamPins {
    pins: BTreeMap<String, UpstreamPin>,
}

#[derive(Debug, Clone)]
struct UpstreamPin {
    env: String,
    operator: String,
    version: String,
}

impl UpstreamPin {
    /// Whether a downstream resolution to `version` agrees with this pin.
    fn accepts(&self, version: &str) -> bool {
        if self.version == version {
            return true;
        }
        self.operator == "~=" && satisfies_compatible(&self.version, version)
    }
}

impl UpstreamPins {
    /// Collect pins from upstream lock files on disk.
    ///
    /// `upstream` pairs each environment name with its lock file path.
    pub fn load<'a>(upstream: impl IntoIterator<Item = (&'a str, PathBuf)>) -> Result<Self> {
        let mut pins = Self::default();
        for (env, path) in upstream {
            let lock = LockFile::read(&path)?;
            pins.extend(env, &lock);
        }
        Ok(pins)
    }

    /// Record every pin of `lock` as coming from `env`. Earlier entries win.
    pub fn extend(&mut self, env: &str, lock: &LockFile) {
        for pin in lock.pins() {
            self.pins
                .entry(pin.key())
                .or_insert_with(|| UpstreamPin {
                    env: env.to_string(),
                    operator: pin.operator.clone(),
                    version: pin.version.clone(),
                });
        }
    }

    /// Whether no upstream pins are known.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Remove pins already provided upstream from `lock`.
    ///
    /// Returns one violation per package that was resolved to a different
    /// version than upstream.
    pub fn strip(&self, lock: &mut LockFile) -> Vec<String> {
        let mut violations = Vec::new();
        lock.retain_pins(|pin| match self.pins.get(&pin.key()) {
            Some(upstream) => {
                if !upstream.accepts(&pin.version) {
                    violations.push(format!(
                        "{} was resolved to {} but {} pins {}{}",
                        pin.name, pin.version, upstream.env, upstream.operator, upstream.version
                    ));
                }
                false
            }
            None => true,
        });
        violations
    }
}

/// Numeric release segments of a version (`1.4.2.post3` gives `[1, 4, 2]`).
fn release(version: &str) -> Option<Vec<u64>> {
    let public = version.split('+').next().unwrap_or(version);
    let end = public
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(public.len());
    public[..end]
        .trim_end_matches('.')
        .split('.')
        .map(|segment| segment.parse().ok())
        .collect()
}

/// Compatible-release check: `candidate` matches `~=base`, i.e. it is at
/// least `base` and shares every release segment of `base` but the last.
fn satisfies_compatible(base: &str, candidate: &str) -> bool {
    let (Some(base), Some(candidate)) = (release(base), release(candidate)) else {
        return false;
    };
    if base.len() < 2 || candidate.len() < base.len() - 1 {
        return false;
    }
    let prefix = base.len() - 1;
    candidate[..prefix] == base[..prefix] && candidate >= base
}

/// Fail if an upstream lock file a node depends on is missing.
pub fn ensure_present(env: &str, constraints: &[PathBuf]) -> Result<()> {
    for path in constraints {
        if !path.is_file() {
            return Err(Error::LockFile {
                path: path.clone(),
                message: format!("required by {env} but not generated"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EnvironmentSpec;

    fn graph() -> EnvironmentGraph {
        EnvironmentGraph::build(vec![
            EnvironmentSpec::parse("a", "a.in", "django\n"),
            EnvironmentSpec::parse("b", "b.in", "-r a.in\ncelery\n"),
            EnvironmentSpec::parse("c", "c.in", "-r b.in\n-r a.in\npytest\n"),
        ])
        .unwrap()
    }

    #[test]
    fn test_constraints_are_transitive_and_deduplicated() {
        let graph = graph();
        let paths = resolve_constraints("c", &graph, |n| PathBuf::from(format!("{n}.txt"))).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);

        let paths = resolve_constraints("a", &graph, |n| PathBuf::from(format!("{n}.txt"))).unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_strip_upstream_pins() {
        let mut upstream = UpstreamPins::default();
        upstream.extend("base", &LockFile::parse("Django==4.2\nsqlparse==0.4.4\n"));

        let mut lock = LockFile::parse("django==4.2\n    # via -r test.in\npytest==7.4.0\n");
        let violations = upstream.strip(&mut lock);
        assert!(violations.is_empty());
        assert_eq!(lock.render(), "pytest==7.4.0\n");
    }

    #[test]
    fn test_conflicting_upstream_pin_is_reported() {
        let mut upstream = UpstreamPins::default();
        upstream.extend("base", &LockFile::parse("django==4.2\n"));

        let mut lock = LockFile::parse("django==5.0\npytest==7.4.0\n");
        let violations = upstream.strip(&mut lock);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("base pins ==4.2"));
    }

    #[test]
    fn test_compatible_upstream_pin_accepts_matching_release() {
        let mut upstream = UpstreamPins::default();
        upstream.extend("base", &LockFile::parse("acme-core~=1.4.2\n"));

        let mut lock = LockFile::parse("acme-core==1.4.2.post3\npytest==7.4.0\n");
        assert!(upstream.strip(&mut lock).is_empty());
        assert_eq!(lock.render(), "pytest==7.4.0\n");

        let mut lock = LockFile::parse("acme-core==1.4.9\n");
        assert!(upstream.strip(&mut lock).is_empty());

        let mut lock = LockFile::parse("acme-core==1.5.0\n");
        let violations = upstream.strip(&mut lock);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("base pins ~=1.4.2"));
    }

    #[test]
    fn test_compatible_release_check() {
        assert!(satisfies_compatible("1.4.2", "1.4.2"));
        assert!(satisfies_compatible("1.4.2", "1.4.2.post3"));
        assert!(satisfies_compatible("1.4", "1.9.1"));
        assert!(!satisfies_compatible("1.4.2", "1.4.1"));
        assert!(!satisfies_compatible("1.4", "2.0"));
        assert!(!satisfies_compatible("1", "1.2"));
    }

    #[test]
    fn test_ensure_present() {
        let temp = tempfile::TempDir::new().unwrap();
        let present = temp.path().join("base.txt");
        std::fs::write(&present, "django==4.2\n").unwrap();

        ensure_present("test", std::slice::from_ref(&present)).unwrap();
        let err = ensure_present("test", &[temp.path().join("docs.txt")]).unwrap_err();
        assert!(matches!(err, Error::LockFile { .. }));
    }
}
