//! Environment graph.
//!
//! This module provides:
//! - Discovery and parsing of environment specifications
//! - Reference graph construction
//! - Stable topological ordering and dependency levels
//! - Cycle detection with the offending cycle named in the error

mod parser;
mod types;

pub use parser::{EnvironmentSpec, discover};
pub use types::EnvironmentGraph;
