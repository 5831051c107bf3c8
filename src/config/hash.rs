//! Request fingerprinting.
//!
//! Each plan is stamped with a deterministic hash of the request it was built
//! from, so operators can tell whether two plans answer the same request.

use sha2::{Digest, Sha256};

use super::spec::DeploymentRequest;

/// Hasher for computing request fingerprints.
#[derive(Debug, Default)]
pub struct RequestHasher;

impl RequestHasher {
    /// Creates a new request hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the whole deployment request.
    #[must_use]
    pub fn hash_request(&self, request: &DeploymentRequest) -> String {
        let mut hasher = Sha256::new();

        update_field(&mut hasher, &request.id);
        update_field(&mut hasher, &request.context.partition);
        update_field(&mut hasher, &request.context.region);
        update_field(&mut hasher, &request.context.account_id);

        update_optional(&mut hasher, request.execution_role_arn.as_deref());
        update_optional(&mut hasher, request.model_package_arn.as_deref());
        update_optional(&mut hasher, request.model_package_group_name.as_deref());
        update_optional(&mut hasher, request.model_artifacts_bucket_arn.as_deref());
        update_optional(&mut hasher, request.ecr_repo_arn.as_deref());

        update_field(&mut hasher, &request.network.vpc_id);
        update_optional(&mut hasher, request.network.vpc_cidr.as_deref());
        update_count(&mut hasher, request.network.subnet_ids.len());
        for subnet in &request.network.subnet_ids {
            update_field(&mut hasher, subnet);
        }

        // BTreeMap iteration is already key-ordered
        update_count(&mut hasher, request.variant.len());
        for (key, value) in &request.variant {
            update_field(&mut hasher, key);
            update_field(&mut hasher, &value.to_string());
        }

        let tags = request.resource_tags();
        update_count(&mut hasher, tags.len());
        for (key, value) in &tags {
            update_field(&mut hasher, key);
            update_field(&mut hasher, value);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

/// Feeds a field prefixed with its byte length so adjacent fields cannot run together.
fn update_field(hasher: &mut Sha256, value: &str) {
    update_count(hasher, value.len());
    hasher.update(value.as_bytes());
}

/// Feeds a length or entry count as a fixed-width big-endian integer.
fn update_count(hasher: &mut Sha256, count: usize) {
    hasher.update((count as u64).to_be_bytes());
}

/// Feeds an optional field with a presence marker so `None` and `""` differ.
fn update_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            update_field(hasher, v);
        }
        None => hasher.update([0u8]),
    }
}
