//! Core engine for lockstep, a multi-environment requirement locker.
//!
//! This crate provides:
//! - Discovery of environment specifications and their reference graph
//! - Compilation of lock files in reference order, constrained by upstream locks
//! - Pluggable per-environment features (hashes, upgrades, compatible pins, ...)
//! - Integrity markers and cheap verification that lock files are fresh

pub mod compile;
pub mod constraints;
pub mod error;
pub mod features;
pub mod graph;
pub mod lockfile;
pub mod options;
pub mod verify;

pub use compile::{
    CompilationPlan, CompileCallback, CompileOutcome, CompileReport, Compiler, CompilerOutput,
    Orchestrator, PipCompile, PostProcessor, build_plans, recompile,
};
pub use error::{Error, Result};
pub use features::{Feature, FeatureRegistry, Violation};
pub use graph::{EnvironmentGraph, EnvironmentSpec};
pub use lockfile::{LockFile, Pin};
pub use options::{DEFAULT_HEADER, Options};
pub use verify::{VerificationResult, verify, verify_all};
