//! Resource node builders.
//!
//! Each function turns resolved inputs into one [`ResourceNode`] with the
//! property bag and dependency edges the provisioning engine expects.

use serde_json::{Value, json};
use tracing::warn;

use super::plan::{Dependency, ResourceKind, ResourceNode, attribute_ref};
use super::role::{ResolvedRole, RoleDefinition};
use crate::config::{DeploymentContext, NetworkConfig};
use crate::error::{PlannerError, Result};

const KEY_DESCRIPTION: &str = "Key used for encryption of data in Amazon SageMaker Endpoint";

/// Variant key the planner always owns.
pub const MODEL_NAME_KEY: &str = "model_name";

/// Builds the node of a synthesized role.
///
/// # Errors
///
/// Returns an error if the statements cannot be serialized.
pub fn role_node(role: &RoleDefinition) -> Result<ResourceNode> {
    let statements = serde_json::to_value(&role.statements)
        .map_err(|e| PlannerError::internal(format!("role statements: {e}")))?;

    Ok(ResourceNode::new(ResourceKind::Role, role.name.clone())
        .with_property("role_name", role.name.clone())
        .with_property(
            "assume_role_policy",
            json!({ "principal": { "service": role.assumed_by } }),
        )
        .with_property("policy_statements", statements))
}

/// Builds the security group.
///
/// All outbound traffic is allowed; inbound is all TCP from the network's
/// address range. A missing range becomes a lookup the engine resolves.
#[must_use]
pub fn security_group_node(name: String, network: &NetworkConfig) -> ResourceNode {
    let source = network.vpc_cidr.as_deref().filter(|c| !c.trim().is_empty()).map_or_else(
        || json!({ "lookup": { "vpc_id": network.vpc_id, "attribute": "cidr_block" } }),
        |cidr| Value::String(cidr.to_string()),
    );

    ResourceNode::new(ResourceKind::SecurityGroup, name.clone())
        .with_property("group_name", name)
        .with_property("vpc_id", network.vpc_id.clone())
        .with_property("allow_all_outbound", true)
        .with_property(
            "ingress",
            json!([{
                "protocol": "tcp",
                "from_port": 0,
                "to_port": 65535,
                "source_cidr": source,
            }]),
        )
}

/// Builds the encryption key.
#[must_use]
pub fn encryption_key_node(name: String, context: &DeploymentContext) -> ResourceNode {
    ResourceNode::new(ResourceKind::EncryptionKey, name.clone())
        .with_property("alias", name)
        .with_property("description", KEY_DESCRIPTION)
        .with_property("enable_key_rotation", true)
        .with_property(
            "grants",
            json!([{
                "principal": context.account_root(),
                "operations": ["encrypt", "decrypt"],
            }]),
        )
}

/// Builds the model.
///
/// Depends on the role when it is synthesized, and always on the security
/// group.
#[must_use]
pub fn model_node(
    name: String,
    role: &ResolvedRole,
    artifact_arn: &str,
    network: &NetworkConfig,
) -> ResourceNode {
    let mut node = ResourceNode::new(ResourceKind::Model, name.clone())
        .with_property("model_name", name)
        .with_property("execution_role_arn", role.arn_value())
        .with_property("containers", json!([{ "model_package_name": artifact_arn }]))
        .with_property(
            "vpc_config",
            json!({
                "security_group_ids": [attribute_ref(ResourceKind::SecurityGroup, "group_id")],
                "subnets": network.subnet_ids,
            }),
        );

    if !role.is_reference() {
        node = node.depending_on(Dependency::on(ResourceKind::Role));
    }
    node.depending_on(Dependency::on(ResourceKind::SecurityGroup))
}

/// Builds the endpoint configuration.
///
/// The variant map is copied verbatim; the planner's model name replaces
/// any caller-supplied `model_name`.
#[must_use]
pub fn endpoint_config_node(
    name: String,
    model_name: &str,
    variant: &std::collections::BTreeMap<String, Value>,
) -> ResourceNode {
    let mut production_variant: serde_json::Map<String, Value> =
        variant.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    if let Some(previous) =
        production_variant.insert(MODEL_NAME_KEY.to_string(), Value::String(model_name.to_string()))
    {
        warn!("Variant model_name {previous} replaced by planned model {model_name}");
    }

    ResourceNode::new(ResourceKind::EndpointConfig, name.clone())
        .with_property("endpoint_config_name", name)
        .with_property("kms_key_id", attribute_ref(ResourceKind::EncryptionKey, "key_id"))
        .with_property(
            "production_variants",
            Value::Array(vec![Value::Object(production_variant)]),
        )
        .depending_on(Dependency::on(ResourceKind::Model))
        .depending_on(Dependency::on(ResourceKind::EncryptionKey))
}

/// Builds the endpoint. It refers to its configuration by name only.
#[must_use]
pub fn endpoint_node(name: String, config_name: &str) -> ResourceNode {
    ResourceNode::new(ResourceKind::Endpoint, name.clone())
        .with_property("endpoint_name", name)
        .with_property("endpoint_config_name", config_name)
        .depending_on(Dependency::by_name(ResourceKind::EndpointConfig, config_name))
}
