//! Lock file post-processing after a successful compiler run.

use crate::constraints::UpstreamPins;
use crate::error::{Error, Result};
use crate::features::FeatureRegistry;
use crate::lockfile::LockFile;
use crate::options::Options;

use super::plan::CompilationPlan;

/// Rewrites compiler output into the final lock file layout.
pub struct PostProcessor<'a> {
    options: &'a Options,
    registry: &'a FeatureRegistry,
    header: String,
}

impl<'a> PostProcessor<'a> {
    pub fn new(options: &'a Options, registry: &'a FeatureRegistry, header: String) -> Self {
        Self {
            options,
            registry,
            header,
        }
    }

    /// Post-process the lock file written for `plan`.
    ///
    /// Steps: apply feature rewrites, drop pins provided by upstream
    /// environments, run feature checks, then write marker, header, references
    /// and body. A lock file that fails the checks is still written, but
    /// without a marker, so `verify` keeps flagging it.
    pub fn process(&self, plan: &CompilationPlan) -> Result<LockFile> {
        let env = plan.name();
        let mut lock = LockFile::read(&plan.output_path)?;

        let upstream = UpstreamPins::load(
            plan.upstream
                .iter()
                .map(String::as_str)
                .zip(plan.constraints.iter().cloned()),
        )?;
        self.registry.transform(env, &mut lock);
        let mut violations = upstream.strip(&mut lock);
        violations.extend(
            self.registry
                .validate(env, &lock)
                .into_iter()
                .map(|violation| violation.to_string()),
        );

        lock.set_header(&self.header);
        lock.set_references(
            plan.references()
                .iter()
                .map(|reference| self.options.out_file_name(reference)),
        );

        if !violations.is_empty() {
            lock.marker = None;
            lock.write(&plan.output_path)?;
            return Err(Error::Validation {
                env: env.to_string(),
                violations,
            });
        }

        lock.marker = Some(plan.marker.clone());
        lock.write(&plan.output_path)?;
        Ok(lock)
    }
}
