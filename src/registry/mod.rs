//! Artifact registry lookups.
//!
//! The planner resolves "latest approved artifact of a group" through the
//! [`ArtifactRegistry`] trait:
//! - [`SageMakerRegistry`]: queries the model registry through the AWS SDK
//! - [`StaticRegistry`]: serves pinned group-to-artifact mappings

mod lookup;
mod sagemaker;

pub use lookup::{ArtifactRegistry, StaticRegistry};
pub use sagemaker::SageMakerRegistry;

#[cfg(test)]
pub use lookup::MockArtifactRegistry;
