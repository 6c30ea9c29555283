use crate::safety::SafetyViolation;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MkcdError {
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("path '{path}' rejected: {violation}")]
    Safety {
        path: String,
        violation: SafetyViolation,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("failed to {action} {path}: {source}")]
    Fs {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed in {path}: {message}")]
    Vcs {
        command: String,
        path: PathBuf,
        message: String,
    },

    #[error("editor error: {0}")]
    Editor(String),

    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<MkcdError>,
    },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

impl MkcdError {
    /// Wrap an `io::Error` with the filesystem operation and path that produced it.
    pub fn fs(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MkcdError::Fs {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        MkcdError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MkcdError>;
