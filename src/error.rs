//! Error types for taskweave.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for core graph and persistence operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input. Never retried.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown identifier, or a prefix matching zero or several tasks.
    #[error("task not found: {0}")]
    NotFound(String),

    /// An operation that needs a DAG found a cycle.
    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// A structural precondition of a graph operation failed.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// A filesystem step failed, after `attempts` tries.
    #[error("file operation '{op}' failed on {} after {attempts} attempt(s): {source}", .path.display())]
    FileOperation {
        op: &'static str,
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Wrap an I/O failure from a single, non-retried attempt.
    pub(crate) fn file(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileOperation {
            op,
            path: path.into(),
            attempts: 1,
            source,
        }
    }

    /// Returns the cycle path if this is a circular dependency error.
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            Error::CircularDependency { cycle } => Some(cycle),
            _ => None,
        }
    }
}

/// Validation errors for tasks and graph input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("title exceeds {max} characters")]
    TitleTooLong { max: usize },

    #[error("description exceeds {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("title contains control characters")]
    InvalidCharacters,

    #[error("checklist text must be 1-{max} characters")]
    InvalidItemText { max: usize },

    #[error("no checklist item with id {0}")]
    UnknownItem(String),

    #[error("task id already exists: {0}")]
    DuplicateId(String),

    #[error("invalid task id: {0}")]
    InvalidId(String),

    #[error("edge references unknown task: {0}")]
    DanglingEdge(String),

    #[error("cannot create edge from {0} to itself")]
    SelfEdge(String),

    #[error("cannot merge task {0} into itself")]
    SelfMerge(String),

    #[error("content to write is empty")]
    EmptyContent,

    #[error("task {id} is {status}, only in_review tasks can be approved")]
    NotReadyForApproval { id: String, status: String },

    #[error("updated_at cannot be before created_at")]
    InvalidTimestamp,
}

/// Structural precondition failures, each naming what was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("inserted task {0} cannot be one of the edge endpoints")]
    InsertedIsEndpoint(String),

    #[error("edge endpoints must differ, got {0} twice")]
    SameEndpoints(String),

    #[error("no edge {from} -> {to} exists")]
    MissingEdge { from: String, to: String },

    #[error("task {blocked} does not list {blocker} as a blocker")]
    MissingBlocker { blocker: String, blocked: String },

    #[error("edge {from} -> {to} already exists")]
    EdgeExists { from: String, to: String },

    #[error("a dependency rationale is required for {0}")]
    MissingRationale(String),

    #[error("edge {from} -> {to} would create a cycle")]
    WouldCreateCycle { from: String, to: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_shows_path() {
        let err = Error::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular dependency: a -> b -> a");
        assert_eq!(err.cycle().map(<[String]>::len), Some(3));
    }

    #[test]
    fn test_file_operation_keeps_source() {
        let err = Error::file("rename", "/tmp/x.json", io::Error::other("boom"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
        assert!(err.to_string().contains("after 1 attempt(s)"));
    }

    #[test]
    fn test_precondition_names_violation() {
        let err: Error = PreconditionError::MissingEdge {
            from: "a".into(),
            to: "c".into(),
        }
        .into();
        assert_eq!(err.to_string(), "precondition failed: no edge a -> c exists");
    }
}
