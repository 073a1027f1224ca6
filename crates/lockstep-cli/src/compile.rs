//! Default command: compile every environment's lock file.

use std::sync::Arc;
use std::time::Instant;

use lockstep_core::{CompileCallback, Error, Options, PipCompile, recompile};

use crate::colors;

/// Progress callback that prints one line per environment event.
///
/// Environments in a level finish in any order, so every event is printed
/// as a complete line.
pub struct ProgressCallback {
    verbose: bool,
}

impl ProgressCallback {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl CompileCallback for ProgressCallback {
    fn on_env_started(&self, env: &str) {
        println!(
            "{}  ▶ Locking{} {}{}{}",
            colors::CYAN,
            colors::RESET,
            colors::BOLD,
            env,
            colors::RESET
        );
    }

    fn on_env_completed(&self, env: &str) {
        println!("{}  ✓{} {}", colors::GREEN, colors::RESET, env);
    }

    fn on_env_failed(&self, env: &str, error: &Error) {
        println!("{}  ✗{} {}", colors::RED, colors::RESET, env);
        eprintln!("{}    Error:{} {}", colors::RED, colors::RESET, error.with_hint());
    }

    fn on_env_skipped(&self, env: &str, upstream: &str) {
        println!(
            "{}  - Skipped{} {} ({} failed)",
            colors::YELLOW,
            colors::RESET,
            env,
            upstream
        );
    }

    fn on_level_started(&self, level: usize, env_count: usize) {
        if self.verbose && env_count > 1 {
            println!(
                "{}Level {}:{} {} environments (parallel)",
                colors::DIM,
                level,
                colors::RESET,
                env_count
            );
        }
    }
}

/// Compile lock files. Returns whether every environment succeeded.
pub fn execute(options: &Options, verbose: bool) -> anyhow::Result<bool> {
    let start = Instant::now();
    let compiler = PipCompile::locate(&options.compiler)?;
    let callback = Arc::new(ProgressCallback::new(verbose));

    let report = recompile(options, &compiler, Some(callback))?;

    let compiled = report.compiled().len();
    let failed = report.failed();
    let skipped = report.skipped();

    if report.is_success() {
        println!(
            "{}Locked{} {} environments in {:.2}s",
            colors::GREEN,
            colors::RESET,
            compiled,
            start.elapsed().as_secs_f64()
        );
    } else {
        println!(
            "{}Locked{} {} environments, {}{} failed{}, {} skipped",
            colors::YELLOW,
            colors::RESET,
            compiled,
            colors::RED,
            failed.len(),
            colors::RESET,
            skipped.len()
        );
        if !failed.is_empty() {
            eprintln!("Failed: {}", failed.join(", "));
        }
        if !skipped.is_empty() {
            eprintln!("Skipped: {}", skipped.join(", "));
        }
    }

    Ok(report.is_success())
}
