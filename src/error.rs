//! Error types for the endpoint planner.
//!
//! This module provides the error hierarchy for every stage of planning:
//! configuration, external lookups, graph assembly, and plan handoff.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the endpoint planner.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External lookup errors (artifact registry, bucket grants).
    #[error("Lookup failure: {0}")]
    Lookup(#[from] LookupError),

    /// Graph assembly errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Plan handoff errors.
    #[error("Handoff error: {0}")]
    Handoff(#[from] HandoffError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an artifact identifier nor an artifact group was supplied.
    #[error(
        "artifact resolution: either model_package_arn or model_package_group_name is required \
         for deployment '{deployment_id}'"
    )]
    MissingArtifactSource {
        /// Deployment the request was for.
        deployment_id: String,
    },

    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Failures of the external collaborators consulted while planning.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The artifact group has no approved artifact.
    #[error("artifact resolution: no approved artifact in group '{group}' ({region})")]
    NoApprovedArtifact {
        /// Region that was queried.
        region: String,
        /// Artifact group that was queried.
        group: String,
    },

    /// The registry request itself failed.
    #[error("artifact resolution: registry request for group '{group}' failed: {message}")]
    RegistryRequestFailed {
        /// Artifact group that was queried.
        group: String,
        /// Description of the failure.
        message: String,
    },

    /// Granting read access on the asset bucket failed.
    #[error("role resolution: read grant on bucket '{bucket}' failed: {message}")]
    BucketGrantFailed {
        /// Bucket the grant targeted.
        bucket: String,
        /// Description of the failure.
        message: String,
    },
}

/// Graph assembly errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A node references a node that is not planned before it.
    #[error("Failed to resolve dependencies: {message}")]
    DependencyResolutionFailed {
        /// Description of the dependency issue.
        message: String,
    },

    /// Two nodes share an identifier.
    #[error("Duplicate node '{node}' in plan")]
    DuplicateNode {
        /// The duplicated node identifier.
        node: String,
    },
}

/// Plan handoff errors.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// The storage backend rejected the operation.
    #[error("Plan storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The plan could not be serialized.
    #[error("Plan serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// A stored plan could not be read back.
    #[error("Stored plan is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if a caller may reasonably retry the whole plan invocation.
    ///
    /// The planner never retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Lookup(LookupError::RegistryRequestFailed { .. })
                | Self::Handoff(HandoffError::Storage { .. })
        )
    }

    /// Returns true if this is the missing-artifact configuration error.
    #[must_use]
    pub const fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::Config(ConfigError::MissingArtifactSource { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl LookupError {
    /// Creates a registry request failure.
    #[must_use]
    pub fn registry(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegistryRequestFailed {
            group: group.into(),
            message: message.into(),
        }
    }
}

impl HandoffError {
    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
