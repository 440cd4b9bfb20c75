//! Error taxonomy for the generation pipeline
//!
//! Every stage raises on the first violation it finds. Nothing here is
//! recoverable: a malformed class model must never produce partially valid
//! generated code, so the driver maps each variant to a category string and a
//! process exit code and stops.

use crate::template::RenderingError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = GenerationError> = std::result::Result<T, E>;

/// Fatal errors raised while deriving models or emitting artifacts
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A property class whose declared alias marker disagrees with its structure
    #[error(
        "classification conflict: `{class}` (reached via {path}) is declared {declared} but is structurally {actual}"
    )]
    ClassificationConflict {
        class: String,
        path: String,
        declared: AliasStatus,
        actual: AliasStatus,
    },

    /// A type, parent or link naming a class absent from the model
    #[error("unresolved reference: `{referrer}` refers to unknown class `{name}`")]
    UnresolvedReference { name: String, referrer: String },

    /// Two entries colliding on an identity key that must be unique
    #[error("duplicate {family} key `{key}` (produced by `{first}` and `{second}`)")]
    DuplicateKey {
        family: &'static str,
        key: String,
        first: String,
        second: String,
    },

    /// A class or property name that cannot be emitted as a Rust identifier
    #[error("invalid name `{name}` for {context}: expected an identifier such as `VirtualNetwork`")]
    InvalidName { name: String, context: String },

    /// Two classes declared with the same name
    #[error("class `{0}` is declared more than once")]
    DuplicateClass(String),

    /// A declared containment link that contradicts the child's parent
    #[error(
        "containment mismatch: `{container}` declares containment of `{child}`, whose parent is {actual}"
    )]
    ContainmentMismatch {
        container: String,
        child: String,
        actual: String,
    },

    /// Parent links that loop back on themselves
    #[error("containment cycle through `{0}`")]
    ContainmentCycle(String),

    #[error("failed to render `{template}`: {source}")]
    Render {
        template: String,
        #[source]
        source: RenderingError,
    },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The post-emission workflow hook failed
    #[error("workflow generator `{hook}` failed: {source}")]
    Workflow {
        hook: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Alias status as declared by a schema or computed by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasStatus {
    Alias,
    NonAlias,
}

impl AliasStatus {
    pub fn from_flag(alias: bool) -> Self {
        if alias {
            AliasStatus::Alias
        } else {
            AliasStatus::NonAlias
        }
    }
}

impl std::fmt::Display for AliasStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AliasStatus::Alias => write!(f, "alias"),
            AliasStatus::NonAlias => write!(f, "non-alias"),
        }
    }
}

impl GenerationError {
    pub fn unresolved(name: impl Into<String>, referrer: impl Into<String>) -> Self {
        GenerationError::UnresolvedReference {
            name: name.into(),
            referrer: referrer.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenerationError::Io {
            path: path.into(),
            source,
        }
    }

    /// Category used in logs and in the process exit message
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::ClassificationConflict { .. } => "classification_conflict",
            GenerationError::UnresolvedReference { .. } => "unresolved_reference",
            GenerationError::DuplicateKey { .. } | GenerationError::DuplicateClass(_) => {
                "duplicate_key"
            }
            GenerationError::InvalidName { .. }
            | GenerationError::ContainmentMismatch { .. }
            | GenerationError::ContainmentCycle(_) => "model_error",
            GenerationError::Render { .. } => "render_error",
            GenerationError::Io { .. } => "io_error",
            GenerationError::Workflow { .. } => "workflow_error",
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            "classification_conflict" => 3,
            "unresolved_reference" => 4,
            "duplicate_key" => 5,
            "model_error" => 6,
            "render_error" => 7,
            "io_error" => 8,
            _ => 9,
        }
    }
}
