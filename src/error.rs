//! Error types for schema definition, build-time derivation, and processing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading or parsing a schema definition document.
#[derive(Debug, Error)]
pub enum DefinitionError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Definition errors (exit code 2)
    #[error("invalid definition at {path}: {message}")]
    Invalid { path: String, message: String },

    #[error("unknown property kind \"{kind}\" at {path}")]
    UnknownKind { kind: String, path: String },

    #[error("unknown schema \"{name}\" referenced at {path}")]
    UnknownSchema { name: String, path: String },
}

impl DefinitionError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Definition-time defects raised while deriving per-version artifacts.
///
/// These are always fatal at build time and are never deferred to
/// request processing.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("version \"{version}\" not declared for schema \"{schema}\"")]
    VersionNotFound { schema: String, version: String },

    #[error("property \"{property}\" not found in schema \"{schema}\"")]
    PropertyNotFound { schema: String, property: String },

    #[error("duplicate target path \"{path}\"")]
    DuplicateTargetPath { path: String },

    #[error("name \"{name}\" collides with a reserved mapping key")]
    ReservedName { name: String },

    #[error("map override inside array element at \"{path}\" is not supported")]
    ElementMap { path: String },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
}

impl BuildError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors during payload processing.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ProcessError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Build(e) => e.exit_code(),
            ProcessError::Invalid { .. } => 1,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// Slash-separated path to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
