//! Per-package integrity hashes.
//!
//! Installers switch to hash-checking mode as soon as one requirement carries
//! a hash, and then require hashes for every requirement. Environments
//! installed together through `-r` references must therefore agree, so
//! asking for hashes in one environment enables them for its whole reference
//! cluster.

use std::collections::BTreeSet;

use super::Feature;
use crate::error::Result;
use crate::graph::EnvironmentGraph;

#[derive(Debug, Clone, Default)]
pub struct AddHashes {
    environments: BTreeSet<String>,
}

impl AddHashes {
    /// Hashes for exactly the given environments.
    pub fn new(environments: impl IntoIterator<Item = String>) -> Self {
        Self {
            environments: environments.into_iter().collect(),
        }
    }

    /// Hashes for the reference clusters of the requested environments.
    pub fn for_graph(requested: &BTreeSet<String>, graph: &EnvironmentGraph) -> Result<Self> {
        let mut environments = BTreeSet::new();
        for name in requested {
            environments.extend(graph.reference_cluster(name)?);
        }
        if environments.len() > requested.len() {
            tracing::debug!("Generating hashes for reference cluster: {:?}", environments);
        }
        Ok(Self { environments })
    }

    /// Whether `env` gets hashes.
    pub fn applies_to(&self, env: &str) -> bool {
        self.environments.contains(env)
    }
}

impl Feature for AddHashes {
    fn name(&self) -> &'static str {
        "add_hashes"
    }

    fn pin_options(&self, env: &str) -> Vec<String> {
        if self.applies_to(env) {
            vec!["--generate-hashes".to_string()]
        } else {
            Vec::new()
        }
    }
}
