//! External compiler invocation.
//!
//! The version resolution itself is delegated to `pip-compile`, run as a
//! subprocess once per environment.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::plan::CompilationPlan;
use crate::error::{Error, Result};

/// Captured output of a successful compiler run.
#[derive(Debug, Clone, Default)]
pub struct CompilerOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Something that turns a compilation plan into a written lock file.
///
/// Implementations must write `plan.output_path` on success and return a
/// [`Error::Compilation`] carrying the command and captured output otherwise.
pub trait Compiler: Send + Sync {
    fn compile(&self, plan: &CompilationPlan) -> Result<CompilerOutput>;
}

/// `pip-compile` located on `PATH` or at an explicit path.
#[derive(Debug, Clone)]
pub struct PipCompile {
    program: PathBuf,
}

impl PipCompile {
    /// Locate the compiler program.
    pub fn locate(program: &Path) -> Result<Self> {
        let program = which::which(program).map_err(|e| {
            Error::Toolchain(format!("{} not found: {}", program.display(), e))
        })?;
        tracing::debug!("Using compiler {}", program.display());
        Ok(Self { program })
    }

    /// Path of the compiler program.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command_line(&self, plan: &CompilationPlan) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(plan.args.iter().cloned());
        parts.join(" ")
    }
}

impl Compiler for PipCompile {
    fn compile(&self, plan: &CompilationPlan) -> Result<CompilerOutput> {
        let command = self.command_line(plan);
        tracing::debug!("Running {}", command);

        let output = Command::new(&self.program)
            .args(&plan.args)
            .output()
            .map_err(|e| Error::Compilation {
                env: plan.name().to_string(),
                command: command.clone(),
                status: "spawn failure".to_string(),
                output: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Error::Compilation {
                env: plan.name().to_string(),
                command,
                status: output.status.to_string(),
                output: format!("{stdout}{stderr}"),
            });
        }

        Ok(CompilerOutput { stdout, stderr })
    }
}
