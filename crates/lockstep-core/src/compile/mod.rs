//! Lock file compilation pipeline.
//!
//! This module provides:
//! - Compilation plans (compiler arguments, constraints, markers)
//! - The external compiler seam (`pip-compile` or a test double)
//! - Post-processing of written lock files
//! - Level-parallel orchestration with per-subtree failure isolation
//!
//! # Architecture
//!
//! ```text
//! *.in ──► EnvironmentGraph ──► build_plans ──► Orchestrator
//!                                                   │
//!                                level by level ────┤
//!                                                   ├── Compiler (pip-compile) ──► *.txt
//!                                                   └── PostProcessor ──► strip upstream pins,
//!                                                                         features, marker
//! ```

mod compiler;
mod orchestrator;
mod plan;
mod postprocess;

use std::sync::Arc;

pub use compiler::{Compiler, CompilerOutput, PipCompile};
pub use orchestrator::{CompileCallback, CompileOutcome, CompileReport, Orchestrator};
pub use plan::{CompilationPlan, assemble_args, build_plans};
pub use postprocess::PostProcessor;

use crate::error::Result;
use crate::features::FeatureRegistry;
use crate::graph::EnvironmentGraph;
use crate::options::Options;

/// Compile every selected environment with `compiler`.
///
/// Configuration problems (invalid options, unknown references, cycles)
/// are returned as errors before the compiler runs even once. Per-environment
/// failures are reported in the returned [`CompileReport`] instead.
pub fn recompile(
    options: &Options,
    compiler: &dyn Compiler,
    callback: Option<Arc<dyn CompileCallback>>,
) -> Result<CompileReport> {
    let options = options.clone().normalized();
    options.validate()?;

    let graph = EnvironmentGraph::discover(&options)?;
    let registry = FeatureRegistry::from_options(&options, &graph)?;
    tracing::debug!("Features: {}", registry.names().join(", "));

    let plans = build_plans(&graph, &options, &registry)?;
    tracing::debug!("Compiling {} of {} environments", plans.len(), graph.len());

    let header = options.header_text()?;
    let post = PostProcessor::new(&options, &registry, header);
    let mut orchestrator = Orchestrator::new(compiler, &graph, post).with_jobs(options.jobs);
    if let Some(callback) = callback {
        orchestrator = orchestrator.with_callback(callback);
    }
    orchestrator.run(plans)
}
