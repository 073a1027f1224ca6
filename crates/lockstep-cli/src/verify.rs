//! `verify` command: check lock files are fresh without compiling anything.

use lockstep_core::{Options, verify, verify_all};

use crate::colors;

/// Verify every selected environment. Returns whether all passed.
pub fn execute(options: &Options) -> anyhow::Result<bool> {
    let results = verify(options)?;
    let passed = verify_all(&results);

    let stale: Vec<&str> = results
        .iter()
        .filter(|result| !result.passed())
        .map(|result| result.env.as_str())
        .collect();

    if passed {
        println!(
            "{}All {} lock files are up to date{}",
            colors::GREEN,
            results.len(),
            colors::RESET
        );
    } else {
        println!(
            "{}Stale lock files:{} {}",
            colors::RED,
            colors::RESET,
            stale.join(", ")
        );
    }

    Ok(passed)
}
