//! Compilation orchestrator.
//!
//! Compiles plans level by level using Rayon. Environments within a level
//! have no references to each other and run concurrently; levels run
//! sequentially, so an environment never starts before everything it
//! references has been written.
//!
//! A failure only affects its own subtree: siblings already running finish,
//! and every environment downstream of the failure is skipped.

use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::compiler::Compiler;
use super::plan::CompilationPlan;
use super::postprocess::PostProcessor;
use crate::constraints::ensure_present;
use crate::error::{Error, Result};
use crate::graph::EnvironmentGraph;

/// Result of compiling one environment.
#[derive(Debug)]
pub enum CompileOutcome {
    /// Lock file written and post-processed.
    Compiled,
    /// Compiler or post-write checks failed.
    Failed(Error),
    /// Not attempted because an upstream environment failed.
    Skipped { upstream: String },
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Compiled)
    }
}

/// Outcomes of a run, in plan order.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub outcomes: Vec<(String, CompileOutcome)>,
}

impl CompileReport {
    /// Whether every environment compiled.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    /// Names of environments that compiled.
    pub fn compiled(&self) -> Vec<&str> {
        self.filter(|outcome| matches!(outcome, CompileOutcome::Compiled))
    }

    /// Names of environments that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.filter(|outcome| matches!(outcome, CompileOutcome::Failed(_)))
    }

    /// Names of environments skipped because of an upstream failure.
    pub fn skipped(&self) -> Vec<&str> {
        self.filter(|outcome| matches!(outcome, CompileOutcome::Skipped { .. }))
    }

    /// Outcome for one environment.
    pub fn outcome(&self, env: &str) -> Option<&CompileOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == env)
            .map(|(_, outcome)| outcome)
    }

    fn filter(&self, pred: impl Fn(&CompileOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Callback trait for compilation progress reporting.
pub trait CompileCallback: Send + Sync {
    /// Called when an environment starts compiling.
    fn on_env_started(&self, env: &str);

    /// Called when an environment's lock file has been written.
    fn on_env_completed(&self, env: &str);

    /// Called when an environment fails.
    fn on_env_failed(&self, env: &str, error: &Error);

    /// Called when an environment is skipped because `upstream` failed.
    fn on_env_skipped(&self, _env: &str, _upstream: &str) {}

    /// Called when a level starts.
    fn on_level_started(&self, _level: usize, _env_count: usize) {}

    /// Called when a level completes.
    fn on_level_completed(&self, _level: usize) {}
}

/// Runs compilation plans against a compiler.
pub struct Orchestrator<'a> {
    compiler: &'a dyn Compiler,
    graph: &'a EnvironmentGraph,
    post: PostProcessor<'a>,
    jobs: usize,
    callback: Option<Arc<dyn CompileCallback>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        compiler: &'a dyn Compiler,
        graph: &'a EnvironmentGraph,
        post: PostProcessor<'a>,
    ) -> Self {
        Self {
            compiler,
            graph,
            post,
            jobs: 0,
            callback: None,
        }
    }

    /// Limit concurrently compiled environments (0 = one per CPU).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the progress callback.
    pub fn with_callback(mut self, callback: Arc<dyn CompileCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Compile every plan, honoring reference order.
    pub fn run(&self, plans: Vec<CompilationPlan>) -> Result<CompileReport> {
        let names: Vec<&str> = plans.iter().map(|plan| plan.name()).collect();
        let levels = self.graph.topological_levels(names.as_slice())?;
        let by_name: FxHashMap<&str, &CompilationPlan> =
            plans.iter().map(|plan| (plan.name(), plan)).collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot start worker pool: {e}")))?;

        // Failed or skipped environments, mapped to the root failure they trace back to.
        let mut broken: FxHashMap<String, String> = FxHashMap::default();
        let mut outcomes: FxHashMap<String, CompileOutcome> = FxHashMap::default();

        for (level_idx, level) in levels.iter().enumerate() {
            if level.is_empty() {
                continue;
            }
            if let Some(ref callback) = self.callback {
                callback.on_level_started(level_idx, level.len());
            }

            let results: Vec<(&str, CompileOutcome)> = pool.install(|| {
                level
                    .par_iter()
                    .filter_map(|&name| by_name.get(name))
                    .map(|plan| (plan.name(), self.compile_one(plan, &broken)))
                    .collect()
            });

            for (name, outcome) in results {
                match &outcome {
                    CompileOutcome::Failed(_) => {
                        broken.insert(name.to_string(), name.to_string());
                    }
                    CompileOutcome::Skipped { upstream } => {
                        broken.insert(name.to_string(), upstream.clone());
                    }
                    CompileOutcome::Compiled => {}
                }
                outcomes.insert(name.to_string(), outcome);
            }

            if let Some(ref callback) = self.callback {
                callback.on_level_completed(level_idx);
            }
        }

        Ok(CompileReport {
            outcomes: plans
                .iter()
                .filter_map(|plan| {
                    outcomes
                        .remove(plan.name())
                        .map(|outcome| (plan.name().to_string(), outcome))
                })
                .collect(),
        })
    }

    fn compile_one(
        &self,
        plan: &CompilationPlan,
        broken: &FxHashMap<String, String>,
    ) -> CompileOutcome {
        let env = plan.name();

        let failed_upstream = plan
            .references()
            .iter()
            .find_map(|reference| broken.get(reference));
        if let Some(root) = failed_upstream {
            tracing::warn!("Skipping {} because {} failed", env, root);
            if let Some(ref callback) = self.callback {
                callback.on_env_skipped(env, root);
            }
            return CompileOutcome::Skipped {
                upstream: root.clone(),
            };
        }

        if let Some(ref callback) = self.callback {
            callback.on_env_started(env);
        }
        tracing::info!(
            "Locking {} to {}. References: {:?}",
            plan.spec.source_path.display(),
            plan.output_path.display(),
            plan.upstream
        );

        match self.compile_and_process(plan) {
            Ok(()) => {
                if let Some(ref callback) = self.callback {
                    callback.on_env_completed(env);
                }
                CompileOutcome::Compiled
            }
            Err(error) => {
                log_failure(&error);
                if let Some(ref callback) = self.callback {
                    callback.on_env_failed(env, &error);
                }
                CompileOutcome::Failed(error)
            }
        }
    }

    fn compile_and_process(&self, plan: &CompilationPlan) -> Result<()> {
        ensure_present(plan.name(), &plan.constraints)?;
        let output = self.compiler.compile(plan)?;
        if !output.stderr.is_empty() {
            tracing::debug!("{}", output.stderr.trim_end());
        }
        self.post.process(plan)?;
        Ok(())
    }
}

fn log_failure(error: &Error) {
    match error {
        Error::Compilation {
            env,
            command,
            status,
            output,
        } => {
            tracing::error!("ERROR executing {}", command);
            tracing::error!("Exit status for {}: {}", env, status);
            for line in output.lines() {
                tracing::error!("{}", line);
            }
        }
        Error::Validation { env, violations } => {
            for violation in violations {
                tracing::error!("{}: {}", env, violation);
            }
        }
        other => tracing::error!("{}", other),
    }
}
