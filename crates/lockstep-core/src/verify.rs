//! Lock file verification.
//!
//! Checks that every lock file was regenerated after the last change to its
//! source specification (or to any upstream specification) by comparing the
//! integrity marker embedded in the lock file with a freshly computed one.
//! Nothing is resolved: the check is cheap enough for every CI run.
//!
//! # Invariants
//!
//! - Never writes to disk
//! - Deterministic: two runs without intervening changes agree

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::graph::EnvironmentGraph;
use crate::lockfile::{compute_marker, find_marker};
use crate::options::Options;

/// Outcome of verifying one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Environment name.
    pub env: String,
    /// Lock file that was checked.
    pub lock_path: PathBuf,
    /// Marker computed from the current sources.
    pub expected: String,
    /// Marker found in the lock file, if any.
    pub found: Option<String>,
}

impl VerificationResult {
    /// Whether the lock file is up to date.
    pub fn passed(&self) -> bool {
        self.found.as_deref() == Some(self.expected.as_str())
    }
}

/// Integrity marker an environment's lock file should carry.
pub fn expected_marker(graph: &EnvironmentGraph, name: &str) -> Result<String> {
    let spec = graph
        .get(name)
        .ok_or_else(|| Error::Configuration(format!("unknown environment '{name}'")))?;

    let upstream: Vec<(&str, &str)> = graph
        .transitive_references(name)?
        .into_iter()
        .filter_map(|r| graph.get(r).map(|s| (s.name.as_str(), s.source.as_str())))
        .collect();

    Ok(compute_marker(&spec.source, &upstream))
}

/// Verify one environment against its lock file.
pub fn verify_environment(
    graph: &EnvironmentGraph,
    options: &Options,
    name: &str,
) -> Result<VerificationResult> {
    let expected = expected_marker(graph, name)?;
    let lock_path = options.out_path(name);
    let found = fs::read_to_string(&lock_path)
        .ok()
        .and_then(|text| find_marker(&text).map(str::to_string));

    Ok(VerificationResult {
        env: name.to_string(),
        lock_path,
        expected,
        found,
    })
}

/// Verify every selected environment, logging one line per environment.
pub fn verify_environments(
    graph: &EnvironmentGraph,
    options: &Options,
) -> Result<Vec<VerificationResult>> {
    let mut results = Vec::new();
    for name in graph.select(options.include_names.as_slice())? {
        let result = verify_environment(graph, options, name)?;
        let source = graph
            .get(name)
            .map(|spec| spec.source_path.display().to_string())
            .unwrap_or_default();

        if result.passed() {
            tracing::info!("OK - {} was generated from {}.", result.lock_path.display(), source);
        } else {
            tracing::error!(
                "ERROR! {} was not regenerated after changes in {}.",
                result.lock_path.display(),
                source
            );
            tracing::error!("Expecting: {}", result.expected);
            tracing::error!("Found:     {}", result.found.as_deref().unwrap_or("<none>"));
        }
        results.push(result);
    }
    Ok(results)
}

/// Whether every result passed.
pub fn verify_all(results: &[VerificationResult]) -> bool {
    results.iter().all(VerificationResult::passed)
}

/// Discover environments and verify them all.
pub fn verify(options: &Options) -> Result<Vec<VerificationResult>> {
    options.validate()?;
    let graph = EnvironmentGraph::discover(options)?;
    verify_environments(&graph, options)
}
