//! Error types for lockstep-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for lockstep-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lockstep-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cyclic reference detected between environments.
    #[error("cyclic reference detected: {0}")]
    CyclicReference(String),

    /// The external compiler failed for an environment.
    #[error("compilation failed for {env}: `{command}` exited with {status}")]
    Compilation {
        env: String,
        command: String,
        status: String,
        output: String,
    },

    /// The compiler succeeded but post-write checks rejected the lock file.
    #[error("validation failed for {env}: {}", violations.join("; "))]
    Validation { env: String, violations: Vec<String> },

    /// A lock file could not be read or understood.
    #[error("lock file {}: {message}", path.display())]
    LockFile { path: PathBuf, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The compiler binary is not available.
    #[error("toolchain error: {0}")]
    Toolchain(String),
}

impl Error {
    /// Whether this error is a fatal pre-flight error raised before any
    /// compiler invocation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::CyclicReference(_) | Self::Toolchain(_)
        )
    }

    /// Environment the error is attached to, if any.
    pub fn env(&self) -> Option<&str> {
        match self {
            Self::Compilation { env, .. } | Self::Validation { env, .. } => Some(env),
            _ => None,
        }
    }

    /// Recovery hint suitable for showing to users.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CyclicReference(_) => {
                Some("remove one of the `-r` lines so references form a tree")
            }
            Self::Toolchain(_) => Some("install pip-tools or pass --compiler <path>"),
            Self::Validation { .. } => {
                Some("add constraints to the source file to pin an acceptable version")
            }
            Self::Compilation { .. } => {
                Some("rerun without --use-cache, or with --verbose to see the full command")
            }
            _ => None,
        }
    }

    /// Format the error followed by its hint, if there is one.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(Error::CyclicReference("a -> b -> a".into()).is_configuration());
        assert!(Error::Configuration("bad".into()).is_configuration());
        assert!(
            !Error::Validation {
                env: "test".into(),
                violations: vec![]
            }
            .is_configuration()
        );
    }

    #[test]
    fn test_validation_message_joins_violations() {
        let err = Error::Validation {
            env: "test".into(),
            violations: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "validation failed for test: a; b");
        assert_eq!(err.env(), Some("test"));
    }

    #[test]
    fn test_with_hint() {
        let err = Error::CyclicReference("a -> a".into());
        assert!(err.with_hint().contains("hint:"));

        let err = Error::Configuration("x".into());
        assert_eq!(err.with_hint(), "configuration error: x");
    }
}
