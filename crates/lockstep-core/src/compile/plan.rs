//! Per-environment compilation plans.

use std::path::PathBuf;

use crate::constraints::resolve_constraints;
use crate::error::Result;
use crate::features::FeatureRegistry;
use crate::graph::{EnvironmentGraph, EnvironmentSpec};
use crate::options::Options;
use crate::verify::expected_marker;

/// Everything needed to compile one environment.
#[derive(Debug, Clone)]
pub struct CompilationPlan {
    /// The environment being compiled.
    pub spec: EnvironmentSpec,
    /// Lock files of every transitive reference, in topological order.
    pub constraints: Vec<PathBuf>,
    /// Names of every transitive reference, parallel to `constraints`.
    pub upstream: Vec<String>,
    /// Full compiler argument list.
    pub args: Vec<String>,
    /// Lock file written by the compiler.
    pub output_path: PathBuf,
    /// Integrity marker stamped on the lock file.
    pub marker: String,
}

impl CompilationPlan {
    /// Environment name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Direct references of the environment.
    pub fn references(&self) -> &[String] {
        &self.spec.references
    }
}

/// Assemble the compiler argument list for an environment.
///
/// Order: fixed flags and output file, feature contributions in registration
/// order, one `--constraint` per upstream lock file, then the source file.
pub fn assemble_args(
    spec: &EnvironmentSpec,
    output_path: &std::path::Path,
    constraints: &[PathBuf],
    registry: &FeatureRegistry,
) -> Vec<String> {
    let mut args = vec![
        "--no-header".to_string(),
        "--output-file".to_string(),
        output_path.display().to_string(),
    ];
    args.extend(registry.collect_options(&spec.name));
    for constraint in constraints {
        args.push("--constraint".to_string());
        args.push(constraint.display().to_string());
    }
    args.push(spec.source_path.display().to_string());
    args
}

/// Build plans for the selected environments in topological order.
pub fn build_plans(
    graph: &EnvironmentGraph,
    options: &Options,
    registry: &FeatureRegistry,
) -> Result<Vec<CompilationPlan>> {
    let selected = graph.select(options.include_names.as_slice())?;
    let mut plans = Vec::with_capacity(selected.len());

    for name in selected {
        let Some(spec) = graph.get(name) else {
            continue;
        };
        let constraints = resolve_constraints(name, graph, |n| options.out_path(n))?;
        let upstream: Vec<String> = graph
            .transitive_references(name)?
            .into_iter()
            .map(str::to_string)
            .collect();
        let output_path = options.out_path(name);
        let args = assemble_args(spec, &output_path, &constraints, registry);
        let marker = expected_marker(graph, name)?;

        tracing::debug!("Plan for {}: {}", name, args.join(" "));

        plans.push(CompilationPlan {
            spec: spec.clone(),
            constraints,
            upstream,
            args,
            output_path,
            marker,
        });
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(options: &Options) -> (EnvironmentGraph, FeatureRegistry) {
        let specs = vec![
            EnvironmentSpec::parse("base", options.in_path("base"), "django\n"),
            EnvironmentSpec::parse("docs", options.in_path("docs"), "sphinx\n"),
            EnvironmentSpec::parse("test", options.in_path("test"), "-r base.in\npytest\n"),
        ];
        let graph = EnvironmentGraph::build(specs).unwrap();
        let registry = FeatureRegistry::from_options(options, &graph).unwrap();
        (graph, registry)
    }

    #[test]
    fn test_test_is_constrained_by_base() {
        let options = Options::default();
        let (graph, registry) = setup(&options);
        let plans = build_plans(&graph, &options, &registry).unwrap();

        let names: Vec<_> = plans.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["base", "docs", "test"]);

        let test = &plans[2];
        assert_eq!(test.constraints, vec![options.out_path("base")]);
        assert_eq!(test.upstream, vec!["base"]);
        assert_eq!(
            test.args,
            vec![
                "--no-header",
                "--output-file",
                "requirements/test.txt",
                "--rebuild",
                "--upgrade",
                "--constraint",
                "requirements/base.txt",
                "requirements/test.in",
            ]
        );
        assert!(!plans[0].args.contains(&"--constraint".to_string()));
    }

    #[test]
    fn test_only_name_pulls_in_references() {
        let options = Options {
            include_names: vec!["test".into()],
            ..Options::default()
        };
        let (graph, registry) = setup(&options);
        let plans = build_plans(&graph, &options, &registry).unwrap();
        let names: Vec<_> = plans.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["base", "test"]);
    }

    #[test]
    fn test_use_cache_in_every_plan() {
        let options = Options::default();
        let (graph, registry) = setup(&options);
        for plan in build_plans(&graph, &options, &registry).unwrap() {
            assert!(plan.args.contains(&"--rebuild".to_string()));
        }

        let options = Options {
            use_cache: true,
            ..Options::default()
        };
        let (graph, registry) = setup(&options);
        for plan in build_plans(&graph, &options, &registry).unwrap() {
            assert!(!plan.args.contains(&"--rebuild".to_string()));
        }
    }
}
